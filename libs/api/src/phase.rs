//! Coarse lifecycle phase of a scan request.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// High-level status of a scan request.
///
/// One-shot requests move `Pending → Running → {Completed, Failed}`;
/// recurring requests alternate between `Scheduled` and `Suspended` with no
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum ScanPhase {
    /// No workload has been created yet.
    #[default]
    Pending,

    /// A one-shot workload exists and has neither succeeded nor failed.
    Running,

    /// A recurring workload exists and is active.
    Scheduled,

    /// A recurring workload exists but its schedule is paused.
    Suspended,

    /// The one-shot workload reported at least one success. Terminal.
    Completed,

    /// The one-shot workload reported at least one failure. Terminal.
    Failed,
}

impl ScanPhase {
    /// Terminal phases are never left except by an explicit switch to
    /// recurring mode (see [`ScanPhase::permits`]).
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanPhase::Completed | ScanPhase::Failed)
    }

    /// Whether a transition from `self` to `next` is legal.
    ///
    /// `Completed` and `Failed` admit only the recurring-mode phases: adding
    /// a schedule to a finished request reactivates it, but the one-shot
    /// outcome is never recomputed. `Pending` is the creation default and is
    /// never re-entered.
    pub fn permits(self, next: ScanPhase) -> bool {
        use ScanPhase::*;
        match (self, next) {
            (Completed | Failed, next) => matches!(next, Scheduled | Suspended),
            (_, Completed | Failed) => matches!(self, Running),
            (_, Pending) => false,
            _ => true,
        }
    }
}

impl std::fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScanPhase::Pending => "Pending",
            ScanPhase::Running => "Running",
            ScanPhase::Scheduled => "Scheduled",
            ScanPhase::Suspended => "Suspended",
            ScanPhase::Completed => "Completed",
            ScanPhase::Failed => "Failed",
        };
        f.write_str(s)
    }
}
