use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{MonitorError, Result};
use crate::models::Provider;

/// Name of the directory under `$HOME` holding monitor state.
pub const STATE_DIR_NAME: &str = ".genai-code-usage-monitor";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Real-time usage monitoring for generative-AI API spend
#[derive(Parser, Debug, Clone)]
#[command(
    name = "genai-monitor",
    about = "Real-time terminal dashboard for Codex and Claude API spend",
    version
)]
pub struct Settings {
    /// Which providers to monitor
    #[arg(long, default_value = "all", value_parser = ["codex", "claude", "all"])]
    pub platform: String,

    /// Plan governing limits and alerts
    #[arg(long, default_value = "custom", value_parser = ["free", "payg", "tier1", "tier2", "pro", "max5", "max20", "custom"])]
    pub plan: String,

    /// Override the token limit (custom plan only)
    #[arg(long)]
    pub custom_limit_tokens: Option<u64>,

    /// Override the cost limit in USD (custom plan only)
    #[arg(long)]
    pub custom_limit_cost: Option<f64>,

    /// Driver tick period in seconds (1-60)
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..=60))]
    pub refresh_rate: u32,

    /// Display timezone (auto-detected if not specified; UTC internally)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Hour of day (0-23) at which daily view buckets roll
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=23))]
    pub reset_hour: Option<u8>,

    /// Display theme
    #[arg(long, default_value = "auto", value_parser = ["light", "dark", "auto"])]
    pub theme: String,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

impl Settings {
    /// Reject flag combinations the engine cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.plan != "custom" {
            if self.custom_limit_tokens.is_some() {
                return Err(MonitorError::Config(
                    "--custom-limit-tokens requires --plan custom".to_string(),
                ));
            }
            if self.custom_limit_cost.is_some() {
                return Err(MonitorError::Config(
                    "--custom-limit-cost requires --plan custom".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The providers selected by `--platform`.
    pub fn platforms(&self) -> Vec<Provider> {
        match self.platform.as_str() {
            "codex" => vec![Provider::Codex],
            "claude" => vec![Provider::Claude],
            _ => vec![Provider::Codex, Provider::Claude],
        }
    }

    /// Parse CLI arguments, merge with last-used params where no explicit
    /// value was given, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Full implementation with injectable args and config path for tests.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        // Raw matches first so explicit CLI values can be told apart from
        // defaults.
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            let _ = LastUsedParams::clear_at(config_path);
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins; plan and platform are never merged from disk.
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "theme") {
            if let Some(v) = last.theme {
                settings.theme = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "refresh_rate") {
            if let Some(v) = last.refresh_rate {
                settings.refresh_rate = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "reset_hour") && settings.reset_hour.is_none() {
            settings.reset_hour = last.reset_hour;
        }
        if !is_arg_explicitly_set(&matches, "custom_limit_tokens")
            && settings.custom_limit_tokens.is_none()
        {
            settings.custom_limit_tokens = last.custom_limit_tokens;
        }
        if !is_arg_explicitly_set(&matches, "custom_limit_cost")
            && settings.custom_limit_cost.is_none()
        {
            settings.custom_limit_cost = last.custom_limit_cost;
        }

        settings = Self::resolve_auto_values(settings);

        let params = LastUsedParams::from(&settings);
        let _ = params.save_to(config_path);

        settings
    }

    /// Resolve `"auto"` sentinel values and the `--debug` override.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters, saved to
/// `~/.genai-code-usage-monitor/last_used.json`. Absence is not an error.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_hour: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_limit_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_limit_cost: Option<f64>,
}

impl LastUsedParams {
    /// Default path of the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(STATE_DIR_NAME).join("last_used.json")
    }

    /// Load persisted params; `Default` when absent or unparseable.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params, creating parent directories if needed.
    pub fn save_to(&self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        // Temp-file rename keeps a concurrent reader from seeing a torn file.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at `path` if it exists.
    pub fn clear_at(path: &std::path::Path) -> std::io::Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            theme: Some(s.theme.clone()),
            timezone: Some(s.timezone.clone()),
            refresh_rate: Some(s.refresh_rate),
            reset_hour: s.reset_hour,
            custom_limit_tokens: s.custom_limit_tokens,
            custom_limit_cost: s.custom_limit_cost,
        }
    }
}

/// `true` when `name` was supplied explicitly on the command line.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    // ── defaults ──────────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["genai-monitor"]);
        assert_eq!(settings.platform, "all");
        assert_eq!(settings.plan, "custom");
        assert!(settings.custom_limit_tokens.is_none());
        assert!(settings.custom_limit_cost.is_none());
        assert_eq!(settings.refresh_rate, 10);
        assert_eq!(settings.timezone, "auto");
        assert!(settings.reset_hour.is_none());
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.debug);
        assert!(!settings.clear);
    }

    #[test]
    fn test_platforms_selection() {
        let all = Settings::parse_from(["genai-monitor"]);
        assert_eq!(all.platforms(), vec![Provider::Codex, Provider::Claude]);

        let codex = Settings::parse_from(["genai-monitor", "--platform", "codex"]);
        assert_eq!(codex.platforms(), vec![Provider::Codex]);

        let claude = Settings::parse_from(["genai-monitor", "--platform", "claude"]);
        assert_eq!(claude.platforms(), vec![Provider::Claude]);
    }

    // ── validation ────────────────────────────────────────────────────────

    #[test]
    fn test_validate_custom_limits_require_custom_plan() {
        let bad = Settings::parse_from([
            "genai-monitor",
            "--plan",
            "free",
            "--custom-limit-tokens",
            "50000",
        ]);
        let err = bad.validate().unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));

        let bad = Settings::parse_from([
            "genai-monitor",
            "--plan",
            "pro",
            "--custom-limit-cost",
            "25.0",
        ]);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_validate_custom_plan_accepts_overrides() {
        let ok = Settings::parse_from([
            "genai-monitor",
            "--plan",
            "custom",
            "--custom-limit-tokens",
            "75000",
            "--custom-limit-cost",
            "80.0",
        ]);
        assert!(ok.validate().is_ok());
        assert_eq!(ok.custom_limit_tokens, Some(75_000));
    }

    // ── last-used persistence ─────────────────────────────────────────────

    #[test]
    fn test_last_used_save_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            theme: Some("dark".to_string()),
            timezone: Some("Europe/Berlin".to_string()),
            refresh_rate: Some(5),
            reset_hour: Some(9),
            custom_limit_tokens: Some(50_000),
            custom_limit_cost: Some(75.0),
        };
        params.save_to(&path).unwrap();

        let loaded = LastUsedParams::load_from(&path);
        assert_eq!(loaded.timezone, Some("Europe/Berlin".to_string()));
        assert_eq!(loaded.refresh_rate, Some(5));
        assert_eq!(loaded.reset_hour, Some(9));
        assert_eq!(loaded.custom_limit_tokens, Some(50_000));
        assert_eq!(loaded.custom_limit_cost, Some(75.0));
    }

    #[test]
    fn test_last_used_default_when_missing() {
        let tmp = TempDir::new().unwrap();
        let loaded = LastUsedParams::load_from(&tmp_config_path(&tmp));
        assert!(loaded.timezone.is_none());
        assert!(loaded.custom_limit_tokens.is_none());
    }

    #[test]
    fn test_load_with_last_used_merges_persisted_refresh_rate() {
        let tmp = TempDir::new().unwrap();
        let path = tmp_config_path(&tmp);
        LastUsedParams {
            refresh_rate: Some(3),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
        .save_to(&path)
        .unwrap();

        let settings =
            Settings::load_with_last_used_impl(vec!["genai-monitor".into()], &path);
        assert_eq!(settings.refresh_rate, 3);
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().unwrap();
        let path = tmp_config_path(&tmp);
        LastUsedParams {
            refresh_rate: Some(3),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
        .save_to(&path)
        .unwrap();

        let settings = Settings::load_with_last_used_impl(
            vec!["genai-monitor".into(), "--refresh-rate".into(), "30".into()],
            &path,
        );
        assert_eq!(settings.refresh_rate, 30);
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp_config_path(&tmp);
        LastUsedParams {
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
        .save_to(&path)
        .unwrap();

        Settings::load_with_last_used_impl(
            vec!["genai-monitor".into(), "--clear".into()],
            &path,
        );
        assert!(!path.exists());
    }

    #[test]
    fn test_load_with_last_used_persists_after_run() {
        let tmp = TempDir::new().unwrap();
        let path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            vec![
                "genai-monitor".into(),
                "--timezone".into(),
                "Europe/Warsaw".into(),
            ],
            &path,
        );

        let loaded = LastUsedParams::load_from(&path);
        assert_eq!(loaded.timezone, Some("Europe/Warsaw".to_string()));
    }

    #[test]
    fn test_debug_flag_overrides_log_level() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load_with_last_used_impl(
            vec!["genai-monitor".into(), "--debug".into()],
            &tmp_config_path(&tmp),
        );
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_timezone_auto_is_resolved() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load_with_last_used_impl(
            vec!["genai-monitor".into()],
            &tmp_config_path(&tmp),
        );
        assert_ne!(settings.timezone, "auto");
    }
}
