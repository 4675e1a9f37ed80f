mod bootstrap;

use std::process::ExitCode;
use std::time::Duration;

use monitor_core::models::Provider;
use monitor_core::plans::PlanType;
use monitor_core::settings::Settings;
use monitor_data::claude::ClaudeSource;
use monitor_data::codex::CodexSource;
use monitor_runtime::driver::{DriverConfig, MonitorDriver};
use monitor_ui::app::App;

/// Exit codes: 0 normal shutdown, 1 unrecoverable configuration error,
/// 2 source directory missing for a required platform.
#[tokio::main]
async fn main() -> ExitCode {
    let settings = Settings::load_with_last_used();

    if let Err(e) = settings.validate() {
        eprintln!("{e}");
        return ExitCode::from(1);
    }

    if let Err(e) = bootstrap::ensure_directories() {
        eprintln!("failed to create state directory: {e}");
        return ExitCode::from(1);
    }
    if let Err(e) = bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref()) {
        eprintln!("failed to initialise logging: {e}");
        return ExitCode::from(1);
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        platform = %settings.platform,
        plan = %settings.plan,
        refresh_rate = settings.refresh_rate,
        "genai-monitor starting"
    );

    let plan = match settings.plan.parse::<PlanType>() {
        Ok(plan) => plan,
        Err(e) => {
            // Unreachable through clap's value parser, but the settings
            // struct can be built programmatically too.
            eprintln!("{e}");
            return ExitCode::from(1);
        }
    };

    let mut driver = MonitorDriver::new(DriverConfig {
        tick_period: Duration::from_secs(u64::from(settings.refresh_rate)),
        plan,
        custom_limit_tokens: settings.custom_limit_tokens,
        custom_limit_cost: settings.custom_limit_cost,
        reset_hour: settings.reset_hour.unwrap_or(0),
        ..Default::default()
    });

    for provider in settings.platforms() {
        match provider {
            Provider::Claude => match ClaudeSource::discover_root() {
                Some(root) => {
                    tracing::info!(root = %root.display(), "tailing Claude projects");
                    driver.add_source(Box::new(ClaudeSource::new(root)));
                }
                None => {
                    eprintln!(
                        "Claude projects directory not found \
                         (checked $CLAUDE_CONFIG_DIR, ~/.config/claude/projects, ~/.claude/projects)"
                    );
                    return ExitCode::from(2);
                }
            },
            Provider::Codex => {
                let source = CodexSource::with_default_path();
                tracing::info!(log = %source.log_path().display(), "tailing Codex usage log");
                driver.add_source(Box::new(source));
            }
        }
    }

    let (rx, handle) = driver.start();
    let app = App::new(&settings.theme, &settings.timezone);

    // The TUI owns the terminal; Ctrl-C is also caught at the OS level so
    // raw mode is restored even when the key never reaches the event loop.
    let outcome = tokio::select! {
        result = app.run(rx) => {
            handle.abort();
            result
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl-C received; shutting down");
            handle.abort();
            Ok(())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("terminal error: {e}");
            ExitCode::from(1)
        }
    }
}
