//! Run every enabled sync set once

use clap::Args;
use peoplesync_engine::sync::{RunSummary, SetOutcome, SyncRunner};
use tracing::error;

use crate::alert::build_alert_sink;
use crate::commands::connector_registry;
use crate::config::AppConfig;
use crate::error::{CliError, CliResult};

/// Synchronize people from the source to the destination
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Compute and report change sets without writing to the destination
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the run command
pub async fn execute(config: &AppConfig) -> CliResult<()> {
    let summary = sync(config).await?;

    for line in summary_lines(&summary) {
        println!("{line}");
    }

    outcome(&summary)
}

/// Build the connectors and run every sync set.
pub async fn sync(config: &AppConfig) -> CliResult<RunSummary> {
    let registry = connector_registry();
    let builder = SyncRunner::from_config(&config.sync, &registry)?;

    let alert_sink = build_alert_sink(config.alerts.as_ref())
        .map_err(|e| CliError::Config(e.to_string()))?;

    let mut runner = builder.alert_sink(alert_sink).build();
    Ok(runner.run().await)
}

/// Map a finished run to the process result.
///
/// Undelivered alerts take precedence: a failure nobody hears about is worse
/// than one that was reported.
pub fn outcome(summary: &RunSummary) -> CliResult<()> {
    if !summary.alerts_delivered() {
        for failure in &summary.alert_failures {
            error!(error = %failure, "Alert was not delivered");
        }
        return Err(CliError::AlertDelivery(summary.alert_failures.join("; ")));
    }

    let failed = summary.failures().count();
    if failed > 0 {
        return Err(CliError::SyncFailed {
            failed,
            total: summary.sets.len(),
        });
    }

    Ok(())
}

/// Human-readable run report, one line per sync set.
pub fn summary_lines(summary: &RunSummary) -> Vec<String> {
    let width = summary
        .sets
        .iter()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(0);

    let mut lines = vec![format!("Run {}", summary.run_id)];
    for set in &summary.sets {
        let status = match &set.outcome {
            SetOutcome::Skipped => "skipped (disabled)".to_string(),
            SetOutcome::DryRun { planned } => format!(
                "dry run: would create {}, update {}, delete {}",
                planned.create, planned.update, planned.delete
            ),
            SetOutcome::Applied {
                planned,
                results,
                problems,
            } => {
                let mut status = format!(
                    "created {}/{}, updated {}/{}, deleted {}/{}",
                    results.created,
                    planned.create,
                    results.updated,
                    planned.update,
                    results.deleted,
                    planned.delete
                );
                if *problems > 0 {
                    status.push_str(&format!(", {problems} problem(s) reported"));
                }
                status
            }
            SetOutcome::Failed(e) => format!("failed: {e}"),
        };
        lines.push(format!("  {:<width$}  {status}", set.name));
    }

    let totals = summary.totals();
    lines.push(format!(
        "Total: {} created, {} updated, {} deleted",
        totals.created, totals.updated, totals.deleted
    ));
    lines
}
