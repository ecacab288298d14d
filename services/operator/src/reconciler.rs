//! Reconciliation of ScanRequest objects into scan workloads.
//!
//! Each pass drives one request toward its desired state: a run-once
//! workload for one-shot requests, a recurring workload otherwise, with
//! status derived from the workload's reported outcome. Every step is
//! idempotent; re-invocation after any partial write converges to the same
//! state. Transport errors propagate to the dispatcher for backoff, the loop
//! itself never retries.

use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::batch::v1::{CronJob, CronJobSpec, Job, JobSpec, JobTemplateSpec};
use k8s_openapi::api::core::v1::{Container, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use scanward_api::{
    set_condition, Condition, ConditionStatus, ScanPhase, ScanRequest, ScanRequestStatus,
};
use tracing::{debug, info, instrument, warn};

use crate::error::Error;
use crate::events::{EventSeverity, EventSink};
use crate::results::capture_scan_results;
use crate::store::ObjectStore;

/// Requeue immediately after creating a run-once workload, whose status is
/// not yet known.
const CREATED_REQUEUE: Duration = Duration::from_secs(1);

/// Backup poll while a one-shot scan runs; the workload watch is the primary
/// re-trigger.
const RUNNING_REQUEUE: Duration = Duration::from_secs(30);

/// Recurring requests re-check for last-trigger drift periodically.
const SCHEDULED_REQUEUE: Duration = Duration::from_secs(60);

/// Shared dependencies for every reconciliation, wired at construction.
pub struct Context {
    pub store: Arc<dyn ObjectStore>,
    pub events: Arc<dyn EventSink>,
}

/// Drive one scan request toward convergence with its spec.
#[instrument(skip(scan, ctx), fields(scan = %scan.name_any()))]
pub async fn reconcile(scan: Arc<ScanRequest>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = scan.namespace().ok_or(Error::MissingNamespace)?;

    if scan.spec.is_recurring() {
        reconcile_recurring(&scan, &namespace, &ctx).await
    } else {
        reconcile_run_once(&scan, &namespace, &ctx).await
    }
}

/// Requeue policy on failure: transport errors back off and retry, malformed
/// objects wait for the user to change them.
pub fn error_policy(scan: Arc<ScanRequest>, error: &Error, _ctx: Arc<Context>) -> Action {
    warn!(
        scan = %scan.name_any(),
        error = %error,
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(Duration::from_secs(30))
    } else {
        Action::await_change()
    }
}

/// One-shot path: `Pending → Running → {Completed, Failed}`.
async fn reconcile_run_once(
    scan: &ScanRequest,
    namespace: &str,
    ctx: &Context,
) -> Result<Action, Error> {
    let phase = scan.phase();
    if phase.is_terminal() {
        debug!(%phase, "scan already finished");
        return Ok(Action::await_change());
    }

    let job_name = scan.job_name();
    let Some(job) = ctx.store.get_job(namespace, &job_name).await? else {
        // The deterministic name guarantees a later pass finds this workload
        // instead of creating a second one.
        let job = build_scan_job(scan, &job_name, namespace)?;
        ctx.store.create_job(namespace, &job).await?;
        ctx.events
            .publish(
                scan,
                EventSeverity::Normal,
                "JobCreated",
                "one-off scan job created",
            )
            .await;
        info!(job = %job_name, "created scan job");

        let mut status = scan.status.clone().unwrap_or_default();
        status.last_job_name = Some(job_name);
        set_phase(&mut status, ScanPhase::Running);
        ctx.store
            .update_status(namespace, &scan.name_any(), &status)
            .await?;
        return Ok(Action::requeue(CREATED_REQUEUE));
    };

    let mut status = scan.status.clone().unwrap_or_default();
    set_phase(&mut status, ScanPhase::Running);

    let succeeded = job.status.as_ref().and_then(|s| s.succeeded).unwrap_or(0);
    let failed = job.status.as_ref().and_then(|s| s.failed).unwrap_or(0);

    let condition = if succeeded > 0 {
        capture_scan_results(scan, &job, namespace, ctx, &mut status).await?;
        if let Some(finished) = job.status.as_ref().and_then(|s| s.completion_time.as_ref()) {
            status.last_run_time = Some(finished.0);
        }
        set_phase(&mut status, ScanPhase::Completed);
        info!(job = %job_name, "scan completed");
        Condition::new(
            "Ready",
            ConditionStatus::True,
            "Completed",
            "scan completed successfully",
        )
    } else if failed > 0 {
        set_phase(&mut status, ScanPhase::Failed);
        warn!(job = %job_name, failed, "scan job failed");
        Condition::new(
            "Ready",
            ConditionStatus::False,
            "Failed",
            "scan job failed",
        )
    } else {
        Condition::new(
            "Ready",
            ConditionStatus::False,
            "Running",
            "scan is in progress",
        )
    };

    if status.last_job_name.as_deref() != Some(job_name.as_str()) {
        status.last_job_name = Some(job_name);
    }
    set_condition(&mut status.conditions, condition);
    ctx.store
        .update_status(namespace, &scan.name_any(), &status)
        .await?;

    Ok(if status.phase.is_terminal() {
        Action::await_change()
    } else {
        Action::requeue(RUNNING_REQUEUE)
    })
}

/// Recurring path: `Scheduled ⇄ Suspended`, perpetual.
async fn reconcile_recurring(
    scan: &ScanRequest,
    namespace: &str,
    ctx: &Context,
) -> Result<Action, Error> {
    // Dispatch guarantees a schedule on this path.
    let schedule = scan.spec.schedule.clone().unwrap_or_default();
    let cron_name = scan.cron_name();

    let Some(mut cron_job) = ctx.store.get_cron_job(namespace, &cron_name).await? else {
        let cron_job = build_scan_cron_job(scan, &cron_name, namespace, &schedule)?;
        ctx.store.create_cron_job(namespace, &cron_job).await?;
        ctx.events
            .publish(
                scan,
                EventSeverity::Normal,
                "Scheduled",
                &format!("recurring scan created with schedule {schedule}"),
            )
            .await;
        info!(cron_job = %cron_name, %schedule, "created recurring scan");

        let mut status = scan.status.clone().unwrap_or_default();
        set_phase(&mut status, ScanPhase::Scheduled);
        ctx.store
            .update_status(namespace, &scan.name_any(), &status)
            .await?;
        return Ok(Action::requeue(SCHEDULED_REQUEUE));
    };

    let live_schedule = cron_job
        .spec
        .as_ref()
        .map(|s| s.schedule.clone())
        .unwrap_or_default();
    let live_suspend = cron_job
        .spec
        .as_ref()
        .and_then(|s| s.suspend)
        .unwrap_or(false);

    if live_schedule != schedule || live_suspend != scan.spec.suspend {
        if let Some(spec) = cron_job.spec.as_mut() {
            spec.schedule = schedule.clone();
            spec.suspend = Some(scan.spec.suspend);
        }
        ctx.store.update_cron_job(namespace, &cron_job).await?;
        ctx.events
            .publish(
                scan,
                EventSeverity::Normal,
                "Updated",
                "recurring scan configuration updated",
            )
            .await;
        info!(cron_job = %cron_name, %schedule, suspend = scan.spec.suspend, "updated recurring scan");
    }

    let mut status = scan.status.clone().unwrap_or_default();
    set_phase(
        &mut status,
        if scan.spec.suspend {
            ScanPhase::Suspended
        } else {
            ScanPhase::Scheduled
        },
    );
    if let Some(last) = cron_job
        .status
        .as_ref()
        .and_then(|s| s.last_schedule_time.as_ref())
    {
        if status.last_run_time != Some(last.0) {
            status.last_run_time = Some(last.0);
        }
    }

    // Converged state needs no write.
    if scan.status.as_ref() != Some(&status) {
        ctx.store
            .update_status(namespace, &scan.name_any(), &status)
            .await?;
    }

    Ok(Action::requeue(SCHEDULED_REQUEUE))
}

/// Apply a phase transition, leaving the phase untouched if the transition
/// is not permitted by the state machine.
fn set_phase(status: &mut ScanRequestStatus, next: ScanPhase) {
    if status.phase.permits(next) {
        status.phase = next;
    }
}

fn scan_pod_template(scan: &ScanRequest) -> PodTemplateSpec {
    PodTemplateSpec {
        spec: Some(PodSpec {
            restart_policy: Some("OnFailure".to_string()),
            containers: vec![Container {
                name: "scanner".to_string(),
                image: Some(scan.spec.image.clone()),
                command: (!scan.spec.command.is_empty()).then(|| scan.spec.command.clone()),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn owned_metadata(scan: &ScanRequest, name: &str, namespace: &str) -> Result<ObjectMeta, Error> {
    let owner = scan
        .controller_owner_ref(&())
        .ok_or(Error::IncompleteMetadata("missing name or uid for owner reference"))?;
    Ok(ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        owner_references: Some(vec![owner]),
        ..Default::default()
    })
}

fn build_scan_job(scan: &ScanRequest, name: &str, namespace: &str) -> Result<Job, Error> {
    Ok(Job {
        metadata: owned_metadata(scan, name, namespace)?,
        spec: Some(JobSpec {
            template: scan_pod_template(scan),
            ..Default::default()
        }),
        status: None,
    })
}

fn build_scan_cron_job(
    scan: &ScanRequest,
    name: &str,
    namespace: &str,
    schedule: &str,
) -> Result<CronJob, Error> {
    Ok(CronJob {
        metadata: owned_metadata(scan, name, namespace)?,
        spec: Some(CronJobSpec {
            schedule: schedule.to_string(),
            suspend: Some(scan.spec.suspend),
            job_template: JobTemplateSpec {
                spec: Some(JobSpec {
                    template: scan_pod_template(scan),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        }),
        status: None,
    })
}
