//! The ScanRequest custom resource.

use chrono::{DateTime, Utc};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::conditions::Condition;
use crate::phase::ScanPhase;

/// API group the ScanRequest CRD is registered under.
pub const API_GROUP: &str = "scans.scanward.io";

/// Label linking derived objects back to their owning request by name.
pub const NAME_LABEL: &str = "scans.scanward.io/name";

/// Desired state of a scan: which image to run, against what, and whether it
/// runs once or on a schedule.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "scans.scanward.io",
    version = "v1alpha1",
    kind = "ScanRequest",
    namespaced,
    status = "ScanRequestStatus",
    shortname = "scan",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Schedule","type":"string","jsonPath":".spec.schedule"}"#,
    printcolumn = r#"{"name":"Last Run","type":"date","jsonPath":".status.lastRunTime"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequestSpec {
    /// Container image of the scanner to run. Defaulted by admission when
    /// empty.
    #[serde(default)]
    pub image: String,

    /// Image reference to scan. Ignored when `command` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Explicit entrypoint override. Takes precedence over `target`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    /// Five-field cron expression. Presence selects recurring mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,

    /// Pause the schedule. Only meaningful in recurring mode.
    #[serde(default)]
    pub suspend: bool,
}

impl ScanRequestSpec {
    /// Recurring mode is selected solely by a non-empty schedule.
    pub fn is_recurring(&self) -> bool {
        self.schedule
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

/// Observed state, written only by the reconciliation loop.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequestStatus {
    /// Fine-grained typed observations, keyed by condition type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// When the scan workload most recently completed (one-shot) or was
    /// last triggered (recurring).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_time: Option<DateTime<Utc>>,

    /// Name of the most recently created run-once workload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_job_name: Option<String>,

    /// Coarse lifecycle phase.
    #[serde(default)]
    pub phase: ScanPhase,

    /// Name of the artifact holding the captured scan output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_artifact: Option<String>,

    /// Terminal exit code of the scan container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_exit_code: Option<i32>,
}

impl ScanRequest {
    /// Deterministic name of the run-once workload.
    pub fn job_name(&self) -> String {
        format!("{}-job", self.name_any())
    }

    /// Deterministic name of the recurring workload.
    pub fn cron_name(&self) -> String {
        format!("{}-cron", self.name_any())
    }

    /// Deterministic name of the result artifact.
    pub fn results_name(&self) -> String {
        format!("{}-results", self.name_any())
    }

    /// Current phase, defaulting to `Pending` when status is unset.
    pub fn phase(&self) -> ScanPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }
}
