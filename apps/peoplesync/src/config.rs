//! Configuration file loading and overrides.
//!
//! The file holds the sync configuration at its top level, plus the
//! `logging` and `alerts` sections only the binary cares about:
//!
//! ```yaml
//! source:
//!   type: rest
//!   base_url: https://hr.example.org/api
//! destination:
//!   type: rest
//!   base_url: https://directory.example.org/api
//! attribute_map:
//!   - source: mail
//!     destination: email
//!     required: true
//! sync_sets:
//!   - name: staff
//! runtime:
//!   dry_run: false
//!   verbosity: info
//! logging:
//!   format: pretty
//! alerts:
//!   host: smtp.example.org
//!   from: peoplesync@example.org
//!   to: [it-ops@example.org]
//! ```

use peoplesync_engine::sync::{SyncConfig, Verbosity};
use serde::Deserialize;
use std::path::Path;

use crate::error::{CliError, CliResult};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "./config/peoplesync.yaml";

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "PEOPLESYNC_CONFIG";

/// Environment variable forcing dry-run mode on or off.
pub const DRY_RUN_ENV: &str = "PEOPLESYNC_DRY_RUN";

/// Environment variable holding the SMTP password.
pub const SMTP_PASSWORD_ENV: &str = "PEOPLESYNC_SMTP_PASSWORD";

/// Root configuration of the binary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// SMTP delivery for alerts. Alerts are only logged when absent.
    #[serde(default)]
    pub alerts: Option<SmtpConfig>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    #[default]
    Starttls,
    Tls,
    None,
}

/// SMTP settings for alert e-mail.
#[derive(Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,

    #[serde(default = "default_smtp_port")]
    pub port: u16,

    #[serde(default)]
    pub security: SmtpSecurity,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    pub from: String,

    #[serde(default)]
    pub to: Vec<String>,

    #[serde(default = "default_smtp_timeout")]
    pub timeout_secs: u64,
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_timeout() -> u64 {
    30
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

impl SmtpConfig {
    /// Check the settings that cannot be defaulted.
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("alerts.host is empty".to_string());
        }
        if self.from.trim().is_empty() {
            return Err("alerts.from is empty".to_string());
        }
        if self.to.is_empty() {
            return Err("alerts.to needs at least one recipient".to_string());
        }
        if self.password.is_some() && self.username.is_none() {
            return Err("alerts.password is set without alerts.username".to_string());
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from a YAML file and apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> CliResult<Self> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CliResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CliError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(content: &str) -> CliResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| CliError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> CliResult<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> CliResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(DRY_RUN_ENV) {
            self.sync.runtime.dry_run = parse_bool(&value).ok_or_else(|| {
                CliError::Config(format!("{DRY_RUN_ENV} must be true or false, got '{value}'"))
            })?;
        }
        if let Some(password) = lookup(SMTP_PASSWORD_ENV) {
            if let Some(alerts) = self.alerts.as_mut() {
                alerts.password = Some(password);
            }
        }
        Ok(())
    }

    /// Apply command-line flags, which win over the file and the environment.
    pub fn apply_cli_overrides(&mut self, dry_run: bool, verbosity: Option<Verbosity>) {
        if dry_run {
            self.sync.runtime.dry_run = true;
        }
        if let Some(verbosity) = verbosity {
            self.sync.runtime.verbosity = verbosity;
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const YAML: &str = r#"
source:
  type: rest
  base_url: https://hr.example.org/api
destination:
  type: rest
  base_url: https://directory.example.org/api
  batch_size: 5
attribute_map:
  - source: mail
    destination: email
    required: true
sync_sets:
  - name: staff
  - name: contractors
    disable: true
runtime:
  verbosity: debug
logging:
  format: pretty
alerts:
  host: smtp.example.org
  username: peoplesync
  from: peoplesync@example.org
  to:
    - it-ops@example.org
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_full_config() {
        let config = AppConfig::from_yaml(YAML).unwrap();

        assert_eq!(config.sync.source.kind, "rest");
        assert_eq!(config.sync.destination.options["batch_size"], 5);
        assert_eq!(config.sync.attribute_map.len(), 1);
        assert_eq!(config.sync.enabled_sync_sets().count(), 1);
        assert_eq!(config.sync.runtime.verbosity, Verbosity::Debug);
        assert!(!config.sync.runtime.dry_run);
        assert_eq!(config.logging.format, LogFormat::Pretty);

        let alerts = config.alerts.unwrap();
        assert_eq!(alerts.port, 587);
        assert_eq!(alerts.security, SmtpSecurity::Starttls);
        assert!(alerts.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_yaml("sync_sets: []").unwrap();
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.alerts.is_none());
        assert_eq!(config.sync.runtime.verbosity, Verbosity::Info);
    }

    #[test]
    fn test_invalid_yaml() {
        let err = AppConfig::from_yaml("source: [unterminated").unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::from_yaml(YAML).unwrap();
        config
            .apply_overrides_from(env(&[
                (DRY_RUN_ENV, "yes"),
                (SMTP_PASSWORD_ENV, "s3cret"),
            ]))
            .unwrap();

        assert!(config.sync.runtime.dry_run);
        assert_eq!(
            config.alerts.as_ref().unwrap().password.as_deref(),
            Some("s3cret")
        );
    }

    #[test]
    fn test_invalid_dry_run_env() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides_from(env(&[(DRY_RUN_ENV, "maybe")]))
            .unwrap_err();
        assert!(err.to_string().contains(DRY_RUN_ENV));
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut config = AppConfig::from_yaml(YAML).unwrap();
        config.apply_overrides_from(env(&[(DRY_RUN_ENV, "false")])).unwrap();
        config.apply_cli_overrides(true, Some(Verbosity::Trace));

        assert!(config.sync.runtime.dry_run);
        assert_eq!(config.sync.runtime.verbosity, Verbosity::Trace);

        config.apply_cli_overrides(false, None);
        assert!(config.sync.runtime.dry_run);
        assert_eq!(config.sync.runtime.verbosity, Verbosity::Trace);
    }

    #[test]
    fn test_smtp_validation() {
        let mut alerts = AppConfig::from_yaml(YAML).unwrap().alerts.unwrap();
        alerts.to.clear();
        assert!(alerts.validate().unwrap_err().contains("recipient"));
    }

    #[test]
    fn test_smtp_debug_redacts_password() {
        let mut alerts = AppConfig::from_yaml(YAML).unwrap().alerts.unwrap();
        alerts.password = Some("s3cret".to_string());
        let debug = format!("{alerts:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("REDACTED"));
    }
}
