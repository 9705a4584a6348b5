//! # Connector Framework
//!
//! Core abstractions for reading people from one system and writing them to
//! another.
//!
//! The sync engine never talks to a vendor API directly. Adapters implement
//! [`Source`](traits::Source) and [`Destination`](traits::Destination) and are
//! built by type name through the [`ConnectorRegistry`](registry::ConnectorRegistry).
//!
//! ## Example
//!
//! ```ignore
//! use peoplesync_connector::prelude::*;
//!
//! let mut registry = ConnectorRegistry::new();
//! registry.register_source("rest", |settings| Ok(Box::new(RestSource::from_settings(settings)?) as BoxedSource));
//!
//! let mut source = registry.build_source(&settings)?;
//! source.for_set(&sync_set).await?;
//! let people = source.list_users(&["email".to_string()]).await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`person`] - `Person`, compound attribute keys, change sets and counters
//! - [`traits`] - `Source` / `Destination` capability traits
//! - [`apply`] - Concurrent paced application of a change set
//! - [`pacer`] - Burst-then-wait batch throttle
//! - [`events`] - Apply-phase event log channel
//! - [`filter`] - Regex attribute filters
//! - [`config`] - Connector settings and per-sync-set options
//! - [`error`] - Error types with transient/permanent classification
//! - [`registry`] - Connector factories keyed by type

pub mod apply;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod pacer;
pub mod person;
pub mod registry;
pub mod traits;

/// Prelude module for convenient imports.
///
/// ```
/// use peoplesync_connector::prelude::*;
/// ```
pub mod prelude {
    // Error handling
    pub use crate::error::{ConnectorError, ConnectorResult};

    // People and changes
    pub use crate::person::{
        compound_key, AttributeKey, Attributes, ChangeCounters, ChangeResults, ChangeSet, Person,
    };

    // Traits
    pub use crate::traits::{BoxedDestination, BoxedSource, Connector, Destination, Source};

    // Apply
    pub use crate::apply::{apply_change_set, ApplyOptions, ChangeKind, PersonWriter};
    pub use crate::pacer::BatchPacer;

    // Events
    pub use crate::events::{EventLog, EventLogItem, EventReceiver, Severity};

    // Configuration
    pub use crate::config::{ConnectorSettings, SyncSetConfig};
    pub use crate::filter::{Filter, Filters};

    // Registry
    pub use crate::registry::{ConnectorRegistry, DestinationFactory, SourceFactory};
}

// Re-export async_trait for connector implementors
pub use async_trait::async_trait;
