//! Concurrent, paced application of a change set.
//!
//! Destinations implement [`PersonWriter`] for single-person writes and call
//! [`apply_change_set`] from their `Destination::apply_change_set`. The driver
//! spawns one task per person per operation kind. Dispatch is gated: the
//! loop waits on a single [`BatchPacer`] before each spawn, and the tasks
//! themselves never touch the pacer. Successes are counted atomically and
//! every attempt is reported on the event log.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};

use crate::error::{ConnectorError, ConnectorResult};
use crate::events::{EventLog, EventLogItem, Severity};
use crate::pacer::BatchPacer;
use crate::person::{ChangeCounters, ChangeResults, ChangeSet, Person};

/// Kind of write performed for one person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

impl ChangeKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }

    fn past_tense(&self) -> &'static str {
        match self {
            ChangeKind::Create => "created",
            ChangeKind::Update => "updated",
            ChangeKind::Delete => "deleted",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-person write capability of a destination.
#[async_trait]
pub trait PersonWriter: Send + Sync + 'static {
    /// Whether the destination can delete people at all.
    fn supports_delete(&self) -> bool {
        true
    }

    async fn create_person(&self, person: &Person) -> ConnectorResult<()>;

    /// `person.id` carries the destination identifier.
    async fn update_person(&self, person: &Person) -> ConnectorResult<()>;

    async fn delete_person(&self, person: &Person) -> ConnectorResult<()>;
}

/// Pacing parameters, usually taken from the destination's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOptions {
    /// Writes dispatched per window. Zero disables pacing.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Length of a window in seconds.
    #[serde(default = "default_batch_delay_seconds")]
    pub batch_delay_seconds: u64,
}

fn default_batch_size() -> usize {
    10
}

fn default_batch_delay_seconds() -> u64 {
    3
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_seconds: default_batch_delay_seconds(),
        }
    }
}

impl ApplyOptions {
    #[must_use]
    pub fn new(batch_size: usize, batch_delay_seconds: u64) -> Self {
        Self {
            batch_size,
            batch_delay_seconds,
        }
    }

    /// No pacing at all.
    #[must_use]
    pub fn unpaced() -> Self {
        Self::new(0, 0)
    }
}

/// Event reported for a failed write.
///
/// Transient failures (destination temporarily unavailable) are warnings;
/// anything else needs a human and is raised as an alert.
#[must_use]
pub fn failure_event(kind: ChangeKind, person: &Person, error: &ConnectorError) -> EventLogItem {
    let severity = if error.is_transient() {
        Severity::Warning
    } else {
        Severity::Alert
    };
    EventLogItem::new(
        severity,
        format!("unable to {kind} {}: {error}", person.compare_value),
    )
}

/// Apply every change in `changes` through `writer`.
///
/// Returns once all spawned writes have finished.
#[instrument(
    skip_all,
    fields(
        create = changes.create.len(),
        update = changes.update.len(),
        delete = changes.delete.len(),
        batch_size = options.batch_size,
    )
)]
pub async fn apply_change_set<W: PersonWriter>(
    writer: Arc<W>,
    changes: &ChangeSet,
    options: ApplyOptions,
    events: EventLog,
) -> ChangeResults {
    let pacer = BatchPacer::new(options.batch_size, options.batch_delay_seconds);
    let counters = Arc::new(ChangeCounters::new());
    let mut workers = JoinSet::new();

    info!("Applying change set");

    let mut planned = plan(ChangeKind::Create, &changes.create);
    planned.extend(plan(ChangeKind::Update, &changes.update));

    if writer.supports_delete() {
        planned.extend(plan(ChangeKind::Delete, &changes.delete));
    } else if !changes.delete.is_empty() {
        events
            .record(EventLogItem::new(
                Severity::Notice,
                format!(
                    "destination does not support delete, skipped {} deletions",
                    changes.delete.len()
                ),
            ))
            .await;
    }

    for (kind, person) in planned {
        pacer.tick().await;
        debug!(kind = %kind, person = %person.compare_value, "Dispatching write");

        let writer = Arc::clone(&writer);
        let counters = Arc::clone(&counters);
        let events = events.clone();

        workers.spawn(async move {
            let outcome = match kind {
                ChangeKind::Create => writer.create_person(&person).await,
                ChangeKind::Update => writer.update_person(&person).await,
                ChangeKind::Delete => writer.delete_person(&person).await,
            };

            match outcome {
                Ok(()) => {
                    match kind {
                        ChangeKind::Create => counters.record_created(),
                        ChangeKind::Update => counters.record_updated(),
                        ChangeKind::Delete => counters.record_deleted(),
                    }
                    events
                        .record(EventLogItem::info(format!(
                            "{} {}",
                            kind.past_tense(),
                            person.compare_value
                        )))
                        .await;
                }
                Err(e) => events.record(failure_event(kind, &person, &e)).await,
            }
        });
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            events
                .record(EventLogItem::alert(format!("write worker aborted: {e}")))
                .await;
        }
    }

    let results = counters.snapshot();
    info!(results = %results, "Change set applied");
    results
}

fn plan(kind: ChangeKind, people: &[Person]) -> Vec<(ChangeKind, Person)> {
    people.iter().map(|person| (kind, person.clone())).collect()
}
