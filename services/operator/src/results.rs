//! Persistence of completed scan output.
//!
//! Invoked only on the Running → Completed transition. Missing pods and
//! unreadable logs are non-fatal: the phase transition is already known, so
//! capture degrades to a warning notification instead of failing the
//! reconciliation. Only object-store write failures propagate.

use std::collections::BTreeMap;

use chrono::Utc;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Pod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{Resource, ResourceExt};
use scanward_api::{ScanRequest, ScanRequestStatus, NAME_LABEL};
use tracing::{info, warn};

use crate::error::Error;
use crate::events::EventSeverity;
use crate::reconciler::Context;

/// Capture the output of a successful run-once workload into the result
/// artifact and record the artifact name and exit code in `status`.
pub async fn capture_scan_results(
    scan: &ScanRequest,
    job: &Job,
    namespace: &str,
    ctx: &Context,
    status: &mut ScanRequestStatus,
) -> Result<(), Error> {
    let pods = ctx.store.list_job_pods(namespace, &job.name_any()).await?;
    let Some(pod) = pods.first() else {
        warn!(job = %job.name_any(), "no pods found for completed job, skipping result capture");
        ctx.events
            .publish(
                scan,
                EventSeverity::Warning,
                "NoPodsFound",
                "job completed but no pods were found for result collection",
            )
            .await;
        return Ok(());
    };

    let pod_name = pod.name_any();
    let output = match ctx.store.pod_logs(namespace, &pod_name).await {
        Ok(output) => output,
        Err(error) => {
            warn!(pod = %pod_name, error = %error, "failed to retrieve pod logs");
            ctx.events
                .publish(
                    scan,
                    EventSeverity::Warning,
                    "LogRetrievalFailed",
                    &format!("could not retrieve logs from pod {pod_name}"),
                )
                .await;
            return Ok(());
        }
    };

    let artifact_name = scan.results_name();
    let artifact = build_results_artifact(scan, &artifact_name, namespace, &output)?;
    match ctx.store.get_config_map(namespace, &artifact_name).await? {
        None => {
            ctx.store.create_config_map(namespace, &artifact).await?;
            ctx.events
                .publish(
                    scan,
                    EventSeverity::Normal,
                    "ResultsStored",
                    &format!("scan results stored in {artifact_name}"),
                )
                .await;
        }
        Some(mut existing) => {
            // Re-run after a prior capture: overwrite the payload in place.
            existing.data = artifact.data.clone();
            ctx.store.update_config_map(namespace, &existing).await?;
        }
    }
    info!(artifact = %artifact_name, "captured scan results");

    status.results_artifact = Some(artifact_name);
    status.scan_exit_code = Some(first_container_exit_code(pod));
    Ok(())
}

fn build_results_artifact(
    scan: &ScanRequest,
    name: &str,
    namespace: &str,
    output: &str,
) -> Result<ConfigMap, Error> {
    let owner = scan
        .controller_owner_ref(&())
        .ok_or(Error::IncompleteMetadata("missing name or uid for owner reference"))?;

    let labels = BTreeMap::from([
        ("app".to_string(), "scanward".to_string()),
        (NAME_LABEL.to_string(), scan.name_any()),
    ]);
    let data = BTreeMap::from([
        ("scan-output.txt".to_string(), output.to_string()),
        ("scanner".to_string(), scan.spec.image.clone()),
        (
            "target".to_string(),
            scan.spec.target.clone().unwrap_or_default(),
        ),
        ("timestamp".to_string(), Utc::now().to_rfc3339()),
    ]);

    Ok(ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        data: Some(data),
        ..Default::default()
    })
}

fn first_container_exit_code(pod: &Pod) -> i32 {
    pod.status
        .as_ref()
        .and_then(|status| status.container_statuses.as_ref())
        .and_then(|statuses| statuses.first())
        .and_then(|container| container.state.as_ref())
        .and_then(|state| state.terminated.as_ref())
        .map(|terminated| terminated.exit_code)
        .unwrap_or(0)
}
