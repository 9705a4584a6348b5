//! # Sync Engine
//!
//! Reconciliation core for peoplesync.
//!
//! This crate provides:
//! - Attribute remapping with required fields and regex substitutions
//! - Case-aware attribute comparison
//! - Create/update/delete change-set generation
//! - Sync-set orchestration with dry-run support and batched alerting
//!
//! Vendor systems are reached only through the `Source` and `Destination`
//! traits of `peoplesync-connector`.
//!
//! ## Example
//!
//! ```ignore
//! use peoplesync_engine::sync::SyncRunner;
//!
//! let mut runner = SyncRunner::from_config(&config, &registry)?
//!     .alert_sink(alert_sink)
//!     .build();
//!
//! let summary = runner.run().await;
//! println!("{} sync sets failed", summary.failures().count());
//! ```

pub mod alert;
pub mod sync;

pub use alert::{Alert, AlertError, AlertSink, LogAlertSink};
pub use sync::{RunSummary, SyncConfig, SyncError, SyncResult, SyncRunner};
