//! Transport-neutral alert delivery.
//!
//! The engine composes alerts; binaries decide how they reach a human
//! (e-mail in the CLI, a log line when nothing is configured).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use peoplesync_connector::events::EventLogItem;
use serde::Serialize;
use std::fmt::Write as _;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Alert delivery errors.
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert transport misconfigured: {message}")]
    Configuration { message: String },

    #[error("alert transport failed: {message}")]
    Transport { message: String },
}

impl AlertError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

/// A message for a human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub subject: String,
    pub body: String,
    pub run_id: Uuid,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(run_id: Uuid, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            run_id,
            raised_at: Utc::now(),
        }
    }

    /// One alert covering every failed sync-set of a run.
    #[must_use]
    pub fn sync_failures(run_id: Uuid, failures: &[(String, String)]) -> Self {
        let mut body = format!("{} sync set(s) failed in run {run_id}:\n\n", failures.len());
        for (set, message) in failures {
            let _ = writeln!(body, "- {set}: {message}");
        }
        Self::new(
            run_id,
            format!("peoplesync: {} sync set(s) failed", failures.len()),
            body,
        )
    }

    /// One alert covering the alert-worthy events of a sync-set's apply phase.
    #[must_use]
    pub fn write_failures(run_id: Uuid, set: &str, items: &[EventLogItem]) -> Self {
        let mut body = format!("Sync set '{set}' reported {} problem(s):\n\n", items.len());
        for item in items {
            let _ = writeln!(body, "- {item}");
        }
        Self::new(
            run_id,
            format!("peoplesync: {} problem(s) in sync set '{set}'", items.len()),
            body,
        )
    }
}

/// Delivers alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), AlertError>;
}

/// Writes alerts to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
        error!(
            run_id = %alert.run_id,
            subject = %alert.subject,
            body = %alert.body,
            "Alert raised"
        );
        Ok(())
    }
}
