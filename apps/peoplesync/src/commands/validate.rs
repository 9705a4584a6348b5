//! Check a configuration file without syncing anything

use clap::Args;
use peoplesync_engine::sync::SyncRunner;

use crate::alert::build_alert_sink;
use crate::commands::connector_registry;
use crate::config::AppConfig;
use crate::error::{CliError, CliResult};

/// Validate the configuration and build the connectors without contacting them
#[derive(Args, Debug)]
pub struct ValidateArgs {}

/// Counts reported by a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationReport {
    pub attributes: usize,
    pub sync_sets: usize,
    pub enabled_sync_sets: usize,
    pub smtp_alerts: bool,
}

/// Execute the validate command
pub fn execute(config: &AppConfig) -> CliResult<()> {
    let report = check(config)?;

    println!("Configuration is valid.");
    println!("  Attribute mappings: {}", report.attributes);
    println!(
        "  Sync sets: {} ({} enabled)",
        report.sync_sets, report.enabled_sync_sets
    );
    println!(
        "  Alerts: {}",
        if report.smtp_alerts { "SMTP" } else { "log only" }
    );
    Ok(())
}

/// Run every startup check `run` would, short of touching the network.
pub fn check(config: &AppConfig) -> CliResult<ValidationReport> {
    let attribute_map = config.sync.validate()?;

    // Building the connectors validates their types, options and per-set overrides.
    let _ = SyncRunner::from_config(&config.sync, &connector_registry())?;
    let _ = build_alert_sink(config.alerts.as_ref())
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(ValidationReport {
        attributes: attribute_map.len(),
        sync_sets: config.sync.sync_sets.len(),
        enabled_sync_sets: config.sync.enabled_sync_sets().count(),
        smtp_alerts: config.alerts.is_some(),
    })
}
