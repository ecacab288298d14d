//! Admission rejection reasons.

use scanward_api::ImageRefError;
use thiserror::Error;

/// A rule violation that prevents the write from being committed.
///
/// Every message names the offending field and the rule, since it is shown
/// verbatim to the user who issued the write.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// `image` must always be set (defaulting normally guarantees this).
    #[error("image cannot be empty")]
    EmptyImage,

    /// With neither a target nor a command the workload would do nothing.
    #[error("nothing to run: target and command are both empty")]
    NothingToRun,

    /// `schedule` failed to parse as a five-field cron expression.
    #[error("invalid cron schedule format: {detail}")]
    InvalidCron { detail: String },

    /// `target` is not a structurally valid image reference.
    #[error("target {target:?} is not a well-formed image reference: {source}")]
    MalformedTarget {
        target: String,
        #[source]
        source: ImageRefError,
    },

    /// `command` contains a destructive invocation.
    #[error("command contains destructive operation marker {marker:?}")]
    DestructiveCommand { marker: &'static str },

    /// `target` may not change once the scan has reached a terminal phase.
    #[error("target is immutable after a scan has completed; delete and recreate the ScanRequest to change it")]
    TargetImmutableAfterCompletion,

    /// `image`, `target`, and `command` are frozen while a scan is running.
    #[error("{field} cannot be changed while a scan is running")]
    MutationWhileRunning { field: &'static str },
}
