//! CLI error types and exit codes

use peoplesync_engine::sync::{ConfigError, SyncError};
use thiserror::Error;

/// Exit codes for the CLI
/// - 0: Success
/// - 1: One or more sync sets failed
/// - 2: Configuration or startup error
/// - 3: An alert could not be delivered
pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ConfigError),

    #[error("Unable to set up connectors: {0}")]
    Setup(SyncError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("{failed} of {total} sync sets failed")]
    SyncFailed { failed: usize, total: usize },

    #[error("Alert delivery failed: {0}")]
    AlertDelivery(String),
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::SyncFailed { .. } => 1,
            CliError::Config(_)
            | CliError::Validation(_)
            | CliError::Setup(_)
            | CliError::Logging(_) => 2,
            CliError::AlertDelivery(_) => 3,
        }
    }

    /// Print the error with formatting
    pub fn print(&self) {
        let use_color = std::env::var("NO_COLOR").is_err();

        if use_color {
            eprintln!("\x1b[31mError:\x1b[0m {}", self);
        } else {
            eprintln!("Error: {}", self);
        }

        if let Some(suggestion) = self.suggestion() {
            if use_color {
                eprintln!("\n\x1b[33mSuggestion:\x1b[0m {}", suggestion);
            } else {
                eprintln!("\nSuggestion: {}", suggestion);
            }
        }
    }

    /// Get a suggested action for this error
    fn suggestion(&self) -> Option<&'static str> {
        match self {
            CliError::Config(_) => {
                Some("Check the path given by --config or PEOPLESYNC_CONFIG and the YAML syntax.")
            }
            CliError::Validation(_) => {
                Some("Run 'peoplesync validate' after fixing the configuration.")
            }
            CliError::Setup(_) => {
                Some("Check the source and destination 'type' and options, including per-set overrides.")
            },
            CliError::SyncFailed { .. } => Some("See the log output for the failing sync sets."),
            CliError::AlertDelivery(_) => Some("Check the 'alerts' SMTP settings."),
            CliError::Logging(_) => None,
        }
    }
}

impl From<SyncError> for CliError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Configuration(e) => CliError::Validation(e),
            other => CliError::Setup(other),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Config(err.to_string())
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        CliError::Config(format!("invalid YAML: {err}"))
    }
}
