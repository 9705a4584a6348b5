//! Event log for the apply phase.
//!
//! Every create/update/delete attempt is reported as an [`EventLogItem`] on a
//! bounded multi-producer/single-consumer channel. The consumer logs every
//! item and escalates alert-worthy ones.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tracing::warn;

/// Default channel capacity used when a caller doesn't pick one.
pub const DEFAULT_EVENT_BUFFER: usize = 50;

/// Syslog-style severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    Info,
    Debug,
}

impl Severity {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Emergency => "emergency",
            Severity::Alert => "alert",
            Severity::Critical => "critical",
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Notice => "notice",
            Severity::Info => "info",
            Severity::Debug => "debug",
        }
    }

    /// Items at alert or emergency severity notify a human.
    #[must_use]
    pub fn is_alert_worthy(&self) -> bool {
        matches!(self, Severity::Emergency | Severity::Alert)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the apply-phase event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogItem {
    pub severity: Severity,
    pub message: String,
}

impl EventLogItem {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn alert(message: impl Into<String>) -> Self {
        Self::new(Severity::Alert, message)
    }
}

impl fmt::Display for EventLogItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.message)
    }
}

/// Producer half of the event log. Cheap to clone into each worker.
#[derive(Debug, Clone)]
pub struct EventLog {
    tx: mpsc::Sender<EventLogItem>,
}

/// Consumer half of the event log.
pub type EventReceiver = mpsc::Receiver<EventLogItem>;

impl EventLog {
    /// Create a bounded event log channel.
    ///
    /// The receiver must be drained while workers run; the buffer only
    /// absorbs bursts.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Record an event, waiting for buffer space if needed.
    pub async fn record(&self, item: EventLogItem) {
        if let Err(e) = self.tx.send(item).await {
            // Receiver gone; keep the event visible in the process log.
            warn!(event = %e.0, "Event log closed, event dropped from channel");
        }
    }
}
