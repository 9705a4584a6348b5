//! Sync-set orchestration.
//!
//! [`SyncRunner`] processes sync-sets one after another, reusing the same
//! source and destination connectors. Within a set:
//!
//! ```text
//! for_set → list source → remap → list destination → diff → dry report | apply
//! ```
//!
//! Set-level failures end that set only. Alert-worthy failures are collected
//! and sent in a single alert once every set has run.

use peoplesync_connector::config::SyncSetConfig;
use peoplesync_connector::events::{EventLog, EventLogItem, Severity, DEFAULT_EVENT_BUFFER};
use peoplesync_connector::person::{ChangeResults, ChangeSet, Person};
use peoplesync_connector::registry::ConnectorRegistry;
use peoplesync_connector::traits::{BoxedDestination, BoxedSource};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use super::change::ChangeSetBuilder;
use super::config::{CompiledAttributeMap, SyncConfig};
use super::error::{Side, SyncError, SyncResult};
use super::mapper::AttributeMapper;
use super::status::{PhaseTracker, SyncPhase};
use crate::alert::{Alert, AlertSink, LogAlertSink};

/// Sizes of a computed change set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlannedChanges {
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl From<&ChangeSet> for PlannedChanges {
    fn from(changes: &ChangeSet) -> Self {
        Self {
            create: changes.create.len(),
            update: changes.update.len(),
            delete: changes.delete.len(),
        }
    }
}

/// How a sync-set ended.
#[derive(Debug)]
pub enum SetOutcome {
    /// Disabled in configuration.
    Skipped,
    /// Change set computed and reported, nothing written.
    DryRun { planned: PlannedChanges },
    /// Change set applied. `problems` counts alert-worthy write events.
    Applied {
        planned: PlannedChanges,
        results: ChangeResults,
        problems: usize,
    },
    /// The set stopped early.
    Failed(SyncError),
}

/// Report for one sync-set.
#[derive(Debug)]
pub struct SetReport {
    pub name: String,
    pub phases: Vec<SyncPhase>,
    pub outcome: SetOutcome,
    /// Set when the per-set alert could not be delivered.
    pub alert_error: Option<String>,
}

impl SetReport {
    fn skipped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            phases: Vec::new(),
            outcome: SetOutcome::Skipped,
            alert_error: None,
        }
    }

    /// The error that ended this set, if any.
    #[must_use]
    pub fn error(&self) -> Option<&SyncError> {
        match &self.outcome {
            SetOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.error().is_some()
    }

    /// Applied results, zero for anything but an applied set.
    #[must_use]
    pub fn results(&self) -> ChangeResults {
        match &self.outcome {
            SetOutcome::Applied { results, .. } => *results,
            _ => ChangeResults::default(),
        }
    }
}

/// Result of a whole run.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub sets: Vec<SetReport>,
    /// Delivery errors for any alert sent during the run.
    pub alert_failures: Vec<String>,
}

impl RunSummary {
    /// Sets that stopped early.
    pub fn failures(&self) -> impl Iterator<Item = &SetReport> {
        self.sets.iter().filter(|s| s.is_failure())
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Applied results summed over all sets.
    #[must_use]
    pub fn totals(&self) -> ChangeResults {
        self.sets.iter().fold(ChangeResults::default(), |acc, s| {
            let r = s.results();
            ChangeResults {
                created: acc.created + r.created,
                updated: acc.updated + r.updated,
                deleted: acc.deleted + r.deleted,
            }
        })
    }

    /// Whether every alert of the run was delivered.
    #[must_use]
    pub fn alerts_delivered(&self) -> bool {
        self.alert_failures.is_empty()
    }

    /// Look up a set's report by name.
    #[must_use]
    pub fn set(&self, name: &str) -> Option<&SetReport> {
        self.sets.iter().find(|s| s.name == name)
    }
}

/// Runs sync-sets against one source and one destination.
pub struct SyncRunner {
    source: BoxedSource,
    destination: BoxedDestination,
    attribute_map: CompiledAttributeMap,
    sync_sets: Vec<SyncSetConfig>,
    dry_run: bool,
    alert_sink: Arc<dyn AlertSink>,
    event_buffer: usize,
}

impl SyncRunner {
    /// Start building a runner.
    #[must_use]
    pub fn builder(
        source: BoxedSource,
        destination: BoxedDestination,
        attribute_map: CompiledAttributeMap,
    ) -> SyncRunnerBuilder {
        SyncRunnerBuilder::new(source, destination, attribute_map)
    }

    /// Validate `config` and build its connectors through `registry`.
    ///
    /// Nothing touches the network here; connectors only do I/O once the run
    /// starts.
    pub fn from_config(
        config: &SyncConfig,
        registry: &ConnectorRegistry,
    ) -> SyncResult<SyncRunnerBuilder> {
        let attribute_map = config.validate()?;

        let source = registry
            .build_source(&config.source)
            .map_err(|e| SyncError::connector(Side::Source, e))?;
        let destination = registry
            .build_destination(&config.destination)
            .map_err(|e| SyncError::connector(Side::Destination, e))?;

        for set in &config.sync_sets {
            source
                .validate_set(set)
                .map_err(|e| SyncError::connector(Side::Source, e))?;
            destination
                .validate_set(set)
                .map_err(|e| SyncError::connector(Side::Destination, e))?;
        }

        info!(
            source = source.display_name(),
            destination = destination.display_name(),
            attributes = attribute_map.len(),
            sync_sets = config.sync_sets.len(),
            "Connectors ready"
        );

        Ok(Self::builder(source, destination, attribute_map)
            .sync_sets(config.sync_sets.clone())
            .dry_run(config.runtime.dry_run))
    }

    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Run every configured sync-set in order.
    pub async fn run(&mut self) -> RunSummary {
        let run_id = Uuid::new_v4();
        info!(%run_id, sets = self.sync_sets.len(), dry_run = self.dry_run, "Starting sync run");

        let sync_sets = self.sync_sets.clone();
        let mut reports = Vec::with_capacity(sync_sets.len());

        for set in &sync_sets {
            if set.disable {
                info!(set = %set.name, "Sync set disabled, skipping");
                reports.push(SetReport::skipped(&set.name));
                continue;
            }

            let span = info_span!("sync_set", %run_id, set = %set.name);
            let report = self.run_set(run_id, set).instrument(span).await;
            reports.push(report);
        }

        let mut alert_failures: Vec<String> = reports
            .iter()
            .filter_map(|r| r.alert_error.clone())
            .collect();

        let failures: Vec<(String, String)> = reports
            .iter()
            .filter_map(|r| match r.error() {
                Some(e) if e.send_alert() => Some((r.name.clone(), e.to_string())),
                _ => None,
            })
            .collect();

        if !failures.is_empty() {
            let alert = Alert::sync_failures(run_id, &failures);
            if let Err(e) = self.alert_sink.send(&alert).await {
                error!(%run_id, error = %e, "Unable to deliver sync failure alert");
                alert_failures.push(e.to_string());
            }
        }

        let summary = RunSummary {
            run_id,
            sets: reports,
            alert_failures,
        };

        let totals = summary.totals();
        info!(
            %run_id,
            failed = summary.failures().count(),
            created = totals.created,
            updated = totals.updated,
            deleted = totals.deleted,
            "Sync run finished"
        );

        summary
    }

    async fn run_set(&mut self, run_id: Uuid, set: &SyncSetConfig) -> SetReport {
        let mut tracker = PhaseTracker::new();
        info!("Starting sync set");

        let (outcome, problems) = match self.sync_set(set, &mut tracker).await {
            Ok(done) => done,
            Err(e) => {
                tracker.enter(SyncPhase::Error);
                if e.send_alert() {
                    error!(error = %e, code = e.error_code(), "Sync set failed");
                } else {
                    warn!(error = %e, code = e.error_code(), "Sync set failed, not alerting");
                }
                (SetOutcome::Failed(e), Vec::new())
            }
        };

        let mut alert_error = None;
        if !problems.is_empty() {
            let alert = Alert::write_failures(run_id, &set.name, &problems);
            if let Err(e) = self.alert_sink.send(&alert).await {
                error!(error = %e, "Unable to deliver write failure alert");
                alert_error = Some(e.to_string());
            }
        }

        SetReport {
            name: set.name.clone(),
            phases: tracker.into_history(),
            outcome,
            alert_error,
        }
    }

    async fn sync_set(
        &mut self,
        set: &SyncSetConfig,
        tracker: &mut PhaseTracker,
    ) -> SyncResult<(SetOutcome, Vec<EventLogItem>)> {
        self.source
            .for_set(set)
            .await
            .map_err(|e| SyncError::connector(Side::Source, e))?;
        self.destination
            .for_set(set)
            .await
            .map_err(|e| SyncError::connector(Side::Destination, e))?;

        tracker.enter(SyncPhase::FetchSource);
        let source_people = self
            .source
            .list_users(&self.attribute_map.source_attributes())
            .await
            .map_err(|e| SyncError::fetch(Side::Source, e))?;
        info!(
            count = source_people.len(),
            source = self.source.display_name(),
            "Fetched source people"
        );
        if source_people.is_empty() {
            return Err(SyncError::no_source_people(&set.name));
        }

        tracker.enter(SyncPhase::Remap);
        let remapped = AttributeMapper::new(&self.attribute_map).remap(&source_people);

        tracker.enter(SyncPhase::FetchDestination);
        let destination_people = self
            .destination
            .list_users(&self.attribute_map.destination_attributes())
            .await
            .map_err(|e| SyncError::fetch(Side::Destination, e))?;
        info!(
            count = destination_people.len(),
            destination = self.destination.display_name(),
            "Fetched destination people"
        );

        tracker.enter(SyncPhase::Diff);
        let changes = ChangeSetBuilder::new(
            self.attribute_map.case_sensitivity(),
            self.destination.id_field(),
        )
        .build(&remapped, &destination_people);
        let planned = PlannedChanges::from(&changes);
        info!(
            create = planned.create,
            update = planned.update,
            delete = planned.delete,
            "Computed change set"
        );

        if self.dry_run {
            tracker.enter(SyncPhase::DryReport);
            report_dry_run(&changes);
            tracker.enter(SyncPhase::Reconcile);
            tracker.enter(SyncPhase::Done);
            return Ok((SetOutcome::DryRun { planned }, Vec::new()));
        }

        tracker.enter(SyncPhase::Apply);
        let (results, problems) = if changes.is_empty() {
            info!("Destination already up to date");
            (ChangeResults::default(), Vec::new())
        } else {
            self.apply(&changes).await
        };

        tracker.enter(SyncPhase::Reconcile);
        let attempted = planned.create + planned.update + planned.delete;
        if results.total() < attempted as u64 {
            warn!(
                attempted,
                succeeded = results.total(),
                problems = problems.len(),
                "Some changes were not applied"
            );
        }
        info!(
            created = results.created,
            updated = results.updated,
            deleted = results.deleted,
            "Sync set applied"
        );
        tracker.enter(SyncPhase::Done);

        Ok((
            SetOutcome::Applied {
                planned,
                results,
                problems: problems.len(),
            },
            problems,
        ))
    }

    /// Apply through the destination while a single consumer drains the
    /// event log. Returns the results and every alert-worthy event.
    #[instrument(skip_all, fields(changes = changes.len()))]
    async fn apply(&self, changes: &ChangeSet) -> (ChangeResults, Vec<EventLogItem>) {
        let (events, mut receiver) = EventLog::channel(self.event_buffer);

        let consumer = tokio::spawn(
            async move {
                let mut problems = Vec::new();
                while let Some(item) = receiver.recv().await {
                    log_event(&item);
                    if item.severity.is_alert_worthy() {
                        problems.push(item);
                    }
                }
                problems
            }
            .in_current_span(),
        );

        // The destination drops its last sender before returning, which ends
        // the consumer loop.
        let results = self.destination.apply_change_set(changes, events).await;

        let problems = match consumer.await {
            Ok(problems) => problems,
            Err(e) => {
                error!(error = %e, "Event log consumer failed");
                Vec::new()
            }
        };

        (results, problems)
    }
}

fn report_dry_run(changes: &ChangeSet) {
    info!(
        create = changes.create.len(),
        update = changes.update.len(),
        delete = changes.delete.len(),
        "Dry run, no changes applied"
    );
    info!(people = ?names(&changes.create), "Would create");
    info!(people = ?names(&changes.update), "Would update");
    info!(people = ?names(&changes.delete), "Would delete");
}

fn names(people: &[Person]) -> Vec<&str> {
    people.iter().map(|p| p.compare_value.as_str()).collect()
}

fn log_event(item: &EventLogItem) {
    match item.severity {
        Severity::Emergency | Severity::Alert | Severity::Critical | Severity::Error => {
            error!(severity = %item.severity, "{}", item.message);
        }
        Severity::Warning => warn!(severity = %item.severity, "{}", item.message),
        Severity::Notice | Severity::Info => info!(severity = %item.severity, "{}", item.message),
        Severity::Debug => debug!(severity = %item.severity, "{}", item.message),
    }
}

/// Builder for [`SyncRunner`].
pub struct SyncRunnerBuilder {
    source: BoxedSource,
    destination: BoxedDestination,
    attribute_map: CompiledAttributeMap,
    sync_sets: Vec<SyncSetConfig>,
    dry_run: bool,
    alert_sink: Option<Arc<dyn AlertSink>>,
    event_buffer: usize,
}

impl SyncRunnerBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new(
        source: BoxedSource,
        destination: BoxedDestination,
        attribute_map: CompiledAttributeMap,
    ) -> Self {
        Self {
            source,
            destination,
            attribute_map,
            sync_sets: Vec::new(),
            dry_run: false,
            alert_sink: None,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Set the sync-sets to run, in order.
    #[must_use]
    pub fn sync_sets(mut self, sync_sets: Vec<SyncSetConfig>) -> Self {
        self.sync_sets = sync_sets;
        self
    }

    /// Enable dry-run mode.
    ///
    /// In dry-run mode change sets are computed and logged but the
    /// destination is never written to.
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Set the alert sink. Defaults to logging alerts.
    #[must_use]
    pub fn alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alert_sink = Some(sink);
        self
    }

    /// Set the event log buffer size.
    #[must_use]
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    /// Build the runner.
    #[must_use]
    pub fn build(self) -> SyncRunner {
        SyncRunner {
            source: self.source,
            destination: self.destination,
            attribute_map: self.attribute_map,
            sync_sets: self.sync_sets,
            dry_run: self.dry_run,
            alert_sink: self
                .alert_sink
                .unwrap_or_else(|| Arc::new(LogAlertSink)),
            event_buffer: self.event_buffer,
        }
    }
}
