//! Full-reconciliation sync between a source and a destination.
//!
//! Every run recomputes the complete change set from scratch; nothing is
//! carried over between runs.
//!
//! ## Key Components
//!
//! - [`AttributeMapper`] - Remaps source attributes into destination keys
//! - [`Comparator`] - Attribute equality with per-attribute case sensitivity
//! - [`ChangeSetBuilder`] - Create/update/delete partition
//! - [`SyncRunner`] - Drives each sync-set through its phases
//!
//! ## Sync Flow
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────┐   ┌──────────────────┐
//! │ Source       │──►│ AttributeMapper │──►│ ChangeSetBuilder │◄── Destination.list_users
//! │ .list_users  │   └─────────────────┘   └────────┬─────────┘
//! └──────────────┘                                  │
//!                                     dry run ◄─────┴────► Destination.apply_change_set
//!                                                                  │
//!                                                          event log ──► logs / alerts
//! ```

pub mod change;
pub mod comparator;
pub mod config;
pub mod error;
pub mod mapper;
pub mod pipeline;
pub mod status;

// Re-exports for convenience
pub use change::ChangeSetBuilder;
pub use comparator::{AttributeDifference, Comparator};
pub use config::{
    AttributeMap, AttributeRule, CaseSensitivity, CompiledAttributeMap, RuntimeConfig, SyncConfig,
    Verbosity,
};
pub use error::{ConfigError, Side, SyncError, SyncResult};
pub use mapper::{remap, AttributeMapper};
pub use pipeline::{
    PlannedChanges, RunSummary, SetOutcome, SetReport, SyncRunner, SyncRunnerBuilder,
};
pub use status::{PhaseTracker, SyncPhase};
