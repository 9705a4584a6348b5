//! Sync-set lifecycle phases.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Phase of one sync-set run.
///
/// ```text
/// Init → FetchSource → Remap → FetchDestination → Diff → DryReport ─┐
///                                                    └─→ Apply ─────┴→ Reconcile → Done
/// ```
///
/// `Error` is reachable from any phase and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Init,
    FetchSource,
    Remap,
    FetchDestination,
    Diff,
    DryReport,
    Apply,
    Reconcile,
    Done,
    Error,
}

impl SyncPhase {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Init => "init",
            SyncPhase::FetchSource => "fetch_source",
            SyncPhase::Remap => "remap",
            SyncPhase::FetchDestination => "fetch_destination",
            SyncPhase::Diff => "diff",
            SyncPhase::DryReport => "dry_report",
            SyncPhase::Apply => "apply",
            SyncPhase::Reconcile => "reconcile",
            SyncPhase::Done => "done",
            SyncPhase::Error => "error",
        }
    }

    /// Check if no further transitions are possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncPhase::Done | SyncPhase::Error)
    }

    /// Check if `next` is a legal successor of this phase.
    #[must_use]
    pub fn can_transition_to(&self, next: SyncPhase) -> bool {
        if next == SyncPhase::Error {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (SyncPhase::Init, SyncPhase::FetchSource)
                | (SyncPhase::FetchSource, SyncPhase::Remap)
                | (SyncPhase::Remap, SyncPhase::FetchDestination)
                | (SyncPhase::FetchDestination, SyncPhase::Diff)
                | (SyncPhase::Diff, SyncPhase::DryReport | SyncPhase::Apply)
                | (SyncPhase::DryReport | SyncPhase::Apply, SyncPhase::Reconcile)
                | (SyncPhase::Reconcile, SyncPhase::Done)
        )
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Records the phases a sync-set went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTracker {
    history: Vec<SyncPhase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    /// Start in `Init`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            history: vec![SyncPhase::Init],
        }
    }

    /// The current phase.
    #[must_use]
    pub fn current(&self) -> SyncPhase {
        self.history.last().copied().unwrap_or(SyncPhase::Init)
    }

    /// Move to `next`, logging the transition.
    ///
    /// Out-of-order transitions are still recorded so the history shows what
    /// actually happened.
    pub fn enter(&mut self, next: SyncPhase) {
        let from = self.current();
        if from.can_transition_to(next) {
            debug!(from = %from, to = %next, "Sync phase transition");
        } else {
            debug!(from = %from, to = %next, "Unexpected sync phase transition");
        }
        self.history.push(next);
    }

    /// Every phase entered so far, starting with `Init`.
    #[must_use]
    pub fn history(&self) -> &[SyncPhase] {
        &self.history
    }

    #[must_use]
    pub fn into_history(self) -> Vec<SyncPhase> {
        self.history
    }
}
