use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use monitor_core::settings::STATE_DIR_NAME;

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure the `~/.genai-code-usage-monitor/` hierarchy exists.
///
/// Creates the state directory and its `logs/` subdirectory, including any
/// missing parents.
pub fn ensure_directories() -> anyhow::Result<()> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    let state_dir = home.join(STATE_DIR_NAME);
    std::fs::create_dir_all(&state_dir)?;
    std::fs::create_dir_all(state_dir.join("logs"))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// Output goes to stderr so it never fights the dashboard for stdout; with
/// `--log-file` it goes to the file instead, without ANSI colour.
pub fn setup_logging(log_level: &str, log_file: Option<&PathBuf>) -> anyhow::Result<()> {
    let upper = log_level.to_uppercase();
    let directive = match upper.as_str() {
        "DEBUG" => "debug",
        "WARNING" => "warn",
        "ERROR" => "error",
        _ => "info",
    };

    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(std::sync::Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ensure_directories() {
        let tmp = TempDir::new().expect("tempdir");

        let original_home = std::env::var_os("HOME");
        std::env::set_var("HOME", tmp.path());

        let result = ensure_directories();

        match original_home {
            Some(v) => std::env::set_var("HOME", v),
            None => std::env::remove_var("HOME"),
        }

        result.expect("ensure_directories should succeed");

        let state_dir = tmp.path().join(STATE_DIR_NAME);
        assert!(state_dir.is_dir());
        assert!(state_dir.join("logs").is_dir());
    }
}
