use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the usage monitor.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// A source directory or log file is missing or unreadable.
    ///
    /// Surfaced to the UI as a banner; never fatal to the tick loop.
    #[error("Source error at {path}: {message}")]
    Source { path: PathBuf, message: String },

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A timestamp string did not match any recognised format.
    #[error("Invalid timestamp format: {0}")]
    TimestampParse(String),

    /// A usage record carried impossible data (e.g. negative token counts).
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A plan name string is not one of the recognised plan types.
    #[error("Invalid plan type: {0}")]
    InvalidPlan(String),

    /// A platform name string is not one of the recognised providers.
    #[error("Invalid platform: {0}")]
    InvalidPlatform(String),

    /// A configuration value or flag combination is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error originating from the terminal / TUI layer.
    #[error("Terminal error: {0}")]
    Terminal(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the monitor crates.
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_source() {
        let err = MonitorError::Source {
            path: PathBuf::from("/home/u/.claude/projects"),
            message: "permission denied".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Source error"));
        assert!(msg.contains(".claude/projects"));
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = MonitorError::FileRead {
            path: PathBuf::from("/some/usage.jsonl"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/some/usage.jsonl"));
    }

    #[test]
    fn test_error_display_invalid_record() {
        let err = MonitorError::InvalidRecord("negative input_tokens".to_string());
        assert_eq!(err.to_string(), "Invalid record: negative input_tokens");
    }

    #[test]
    fn test_error_display_invalid_plan() {
        let err = MonitorError::InvalidPlan("enterprise".to_string());
        assert_eq!(err.to_string(), "Invalid plan type: enterprise");
    }

    #[test]
    fn test_error_display_invalid_platform() {
        let err = MonitorError::InvalidPlatform("gemini".to_string());
        assert_eq!(err.to_string(), "Invalid platform: gemini");
    }

    #[test]
    fn test_error_display_config() {
        let err = MonitorError::Config("--custom-limit-tokens requires --plan custom".to_string());
        assert!(err.to_string().starts_with("Configuration error:"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: MonitorError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: MonitorError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
