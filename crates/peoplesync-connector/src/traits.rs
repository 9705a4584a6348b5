//! Connector capability traits.
//!
//! The sync core only talks to vendor systems through [`Source`] and
//! [`Destination`]. Adapters are reused across sync-sets and reconfigured with
//! `for_set` before each one; sync-sets run one after another, so `for_set`
//! takes `&mut self`.

use async_trait::async_trait;

use crate::config::SyncSetConfig;
use crate::error::ConnectorResult;
use crate::events::EventLog;
use crate::person::{ChangeResults, ChangeSet, Person};

/// Base trait for all connectors.
pub trait Connector: Send + Sync {
    /// Registry key of this adapter (e.g. "rest").
    fn connector_type(&self) -> &str;

    /// Human readable name for logs.
    fn display_name(&self) -> &str;
}

/// A system people are read from.
#[async_trait]
pub trait Source: Connector {
    /// Check the sync-set's overrides without applying them.
    ///
    /// Called for every sync-set at startup, so anything `for_set` would
    /// reject must be rejected here too.
    fn validate_set(&self, _set: &SyncSetConfig) -> ConnectorResult<()> {
        Ok(())
    }

    /// Reconfigure for the given sync-set. Safe to call repeatedly.
    async fn for_set(&mut self, set: &SyncSetConfig) -> ConnectorResult<()>;

    /// Return the complete list of in-scope people.
    ///
    /// `desired_attrs` are source attribute names; adapters may use them to
    /// limit what they fetch. Pagination is the adapter's concern.
    async fn list_users(&self, desired_attrs: &[String]) -> ConnectorResult<Vec<Person>>;
}

/// A system people are written to.
#[async_trait]
pub trait Destination: Connector {
    /// Attribute of a listed destination person that holds its identifier.
    fn id_field(&self) -> &str;

    /// Check the sync-set's overrides without applying them.
    fn validate_set(&self, _set: &SyncSetConfig) -> ConnectorResult<()> {
        Ok(())
    }

    /// Reconfigure for the given sync-set. Safe to call repeatedly.
    async fn for_set(&mut self, set: &SyncSetConfig) -> ConnectorResult<()>;

    /// Return the complete list of people currently in the destination.
    ///
    /// `desired_attrs` are destination attribute names.
    async fn list_users(&self, desired_attrs: &[String]) -> ConnectorResult<Vec<Person>>;

    /// Apply every change, reporting each attempt on `events`.
    ///
    /// Must return only after all dispatched work has finished. Individual
    /// failures are reported as events, never returned.
    async fn apply_change_set(&self, changes: &ChangeSet, events: EventLog) -> ChangeResults;
}

/// Boxed source as produced by the registry.
pub type BoxedSource = Box<dyn Source>;

/// Boxed destination as produced by the registry.
pub type BoxedDestination = Box<dyn Destination>;
