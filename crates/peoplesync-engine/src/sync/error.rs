//! Sync error types.

use peoplesync_connector::error::ConnectorError;
use std::fmt;
use thiserror::Error;

/// Which side of the sync an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Source,
    Destination,
}

impl Side {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Source => "source",
            Side::Destination => "destination",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration validation failures, raised before any connector is used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing source type")]
    MissingSourceType,

    #[error("missing destination type")]
    MissingDestinationType,

    #[error("attribute map is empty")]
    EmptyAttributeMap,

    #[error("attribute map entry {index} has an empty {field} name")]
    EmptyAttributeName { index: usize, field: &'static str },

    #[error("invalid expression for attribute '{destination}': {message}")]
    InvalidExpression {
        destination: String,
        message: String,
    },

    #[error("no sync sets configured")]
    NoSyncSets,

    #[error("sync set at position {index} has no name")]
    UnnamedSyncSet { index: usize },

    #[error("duplicate sync set name: {name}")]
    DuplicateSyncSet { name: String },

    #[error("{message}")]
    Invalid { message: String },
}

impl ConfigError {
    /// Create a free-form validation error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Errors that end a sync-set (or the run, for configuration errors).
///
/// Per-person write failures never become a `SyncError`; they are reported
/// on the event log instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Bad or missing configuration.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Listing people failed.
    #[error("unable to fetch people from {side}: {source}")]
    Fetch {
        side: Side,
        #[source]
        source: ConnectorError,
    },

    /// The source returned nobody. Treated as a broken feed rather than an
    /// instruction to empty the destination.
    #[error("no people found in source for sync set '{set}'")]
    NoSourcePeople { set: String },

    /// A connector rejected its per-set configuration.
    #[error("{side} connector error: {source}")]
    Connector {
        side: Side,
        #[source]
        source: ConnectorError,
    },

    /// Alert delivery failed.
    #[error("alert delivery failed: {message}")]
    Alert { message: String },
}

impl SyncError {
    /// Create a fetch error.
    pub fn fetch(side: Side, source: ConnectorError) -> Self {
        Self::Fetch { side, source }
    }

    /// Create a connector error.
    pub fn connector(side: Side, source: ConnectorError) -> Self {
        Self::Connector { side, source }
    }

    /// Create a no-source-people error.
    pub fn no_source_people(set: impl Into<String>) -> Self {
        Self::NoSourcePeople { set: set.into() }
    }

    /// Create an alert delivery error.
    pub fn alert(message: impl Into<String>) -> Self {
        Self::Alert {
            message: message.into(),
        }
    }

    /// Whether a human should be notified.
    ///
    /// Transient connector conditions (service unavailable, timeouts) are
    /// only logged; they usually clear up by the next run.
    #[must_use]
    pub fn send_alert(&self) -> bool {
        match self {
            SyncError::Configuration(_) | SyncError::NoSourcePeople { .. } => true,
            SyncError::Fetch { source, .. } | SyncError::Connector { source, .. } => {
                !source.is_transient()
            }
            SyncError::Alert { .. } => false,
        }
    }

    /// Stable error code for logs and reports.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::Configuration(_) => "CONFIGURATION",
            SyncError::Fetch { .. } => "FETCH_FAILED",
            SyncError::NoSourcePeople { .. } => "NO_SOURCE_PEOPLE",
            SyncError::Connector { .. } => "CONNECTOR",
            SyncError::Alert { .. } => "ALERT_DELIVERY",
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
