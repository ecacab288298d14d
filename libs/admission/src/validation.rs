//! Validation rules for ScanRequest writes.
//!
//! Stateless rules apply to every create and update; update-only rules also
//! see the prior object and enforce the post-start immutability contract.

use std::str::FromStr;

use scanward_api::{
    scanner_family, ImageRef, ScanPhase, ScanRequest, ScanRequestSpec, KNOWN_SCANNERS,
};

use crate::error::ValidationError;

/// Command markers that indicate a destructive invocation rather than a scan.
const DESTRUCTIVE_MARKERS: &[&str] = &["rm -rf", "rm -fr", "mkfs.", "dd of=/dev/"];

/// Argument counts above this draw a plausibility warning.
const MAX_COMMAND_ARGS: usize = 50;

/// Validate a new object. Returns non-blocking warnings on acceptance.
pub fn validate_create(scan: &ScanRequest) -> Result<Vec<String>, ValidationError> {
    validate_spec(&scan.spec)
}

/// Validate a mutation, enforcing the immutability rules that depend on the
/// prior object's phase in addition to every stateless rule.
pub fn validate_update(
    old: &ScanRequest,
    new: &ScanRequest,
) -> Result<Vec<String>, ValidationError> {
    let mut warnings = validate_spec(&new.spec)?;

    let old_phase = old.phase();
    let old_target = old.spec.target.as_deref().filter(|t| !t.trim().is_empty());
    let target_changed = old.spec.target != new.spec.target;

    if old_phase.is_terminal() && old_target.is_some() && target_changed {
        return Err(ValidationError::TargetImmutableAfterCompletion);
    }

    if old_phase == ScanPhase::Running {
        if old.spec.image != new.spec.image {
            return Err(ValidationError::MutationWhileRunning { field: "image" });
        }
        if target_changed {
            return Err(ValidationError::MutationWhileRunning { field: "target" });
        }
        if old.spec.command != new.spec.command {
            return Err(ValidationError::MutationWhileRunning { field: "command" });
        }
    }

    if old_phase == ScanPhase::Pending && old_target.is_some() && target_changed {
        warnings.push(
            "target changed before the scan started; verify the new target is intended"
                .to_string(),
        );
    }

    if let Some(old_family) = scanner_family(&old.spec.image) {
        let new_family = scanner_family(&new.spec.image);
        if new_family != Some(old_family) {
            warnings.push(format!(
                "scanner family changed from {old_family} to {}; earlier results may not be comparable",
                new_family.unwrap_or("an unrecognized scanner"),
            ));
        }
    }

    if old.spec.is_recurring() != new.spec.is_recurring() {
        warnings.push(if new.spec.is_recurring() {
            "schedule added: the request switches from one-shot to recurring mode".to_string()
        } else {
            "schedule removed: the request switches from recurring to one-shot mode".to_string()
        });
    }

    Ok(warnings)
}

fn validate_spec(spec: &ScanRequestSpec) -> Result<Vec<String>, ValidationError> {
    let mut warnings = Vec::new();

    if spec.image.trim().is_empty() {
        return Err(ValidationError::EmptyImage);
    }

    let target = spec.target.as_deref().filter(|t| !t.trim().is_empty());
    if target.is_none() && spec.command.is_empty() {
        return Err(ValidationError::NothingToRun);
    }

    if let Ok(image) = ImageRef::parse(&spec.image) {
        if !image.has_explicit_version() {
            warnings.push(format!(
                "image {:?} has no explicit tag or digest; the version being run is ambiguous",
                spec.image
            ));
        }
    }

    if target.is_some() && !spec.command.is_empty() {
        warnings.push(
            "both target and command are set; command takes precedence and target is ignored"
                .to_string(),
        );
    }

    if let Some(schedule) = spec.schedule.as_deref().filter(|s| !s.trim().is_empty()) {
        if let Some(warning) = validate_schedule(schedule)? {
            warnings.push(warning);
        }
    }

    if let Some(target) = target {
        if let Err(source) = ImageRef::parse(target) {
            return Err(ValidationError::MalformedTarget {
                target: target.to_string(),
                source,
            });
        }
    }

    if !spec.command.is_empty() {
        let joined = spec.command.join(" ");
        if let Some(marker) = DESTRUCTIVE_MARKERS
            .iter()
            .copied()
            .find(|marker| joined.contains(*marker))
        {
            return Err(ValidationError::DestructiveCommand { marker });
        }
        if spec.command.len() > MAX_COMMAND_ARGS {
            warnings.push(format!(
                "command has {} arguments; this is implausibly large for a scanner invocation",
                spec.command.len()
            ));
        }
    }

    if spec.image.ends_with(":latest") {
        warnings.push("image uses the floating latest tag; pin a version for reproducible scans".to_string());
    }
    if target.is_some_and(|t| t.ends_with(":latest")) {
        warnings.push(
            "target uses the floating latest tag; the scanned version is not reproducible"
                .to_string(),
        );
    }

    if scanner_family(&spec.image).is_none() {
        warnings.push(format!(
            "image {:?} does not match a known scanner ({})",
            spec.image,
            KNOWN_SCANNERS.join(", ")
        ));
    }

    if spec.suspend && !spec.is_recurring() {
        warnings.push(
            "suspend is set but schedule is empty; suspend has no effect outside recurring mode"
                .to_string(),
        );
    }

    Ok(warnings)
}

/// Check a schedule: exactly five fields, parseable, and not minutely.
///
/// The cron parser wants a seconds field, so one is pinned to zero for
/// parsing only; the stored expression stays five-field.
fn validate_schedule(schedule: &str) -> Result<Option<String>, ValidationError> {
    let fields: Vec<&str> = schedule.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(ValidationError::InvalidCron {
            detail: format!("expected 5 fields, found {}", fields.len()),
        });
    }

    let with_seconds = format!("0 {schedule}");
    cron::Schedule::from_str(&with_seconds).map_err(|e| ValidationError::InvalidCron {
        detail: e.to_string(),
    })?;

    Ok((fields[0] == "*").then(|| {
        format!("schedule {schedule:?} fires every minute; consider a coarser schedule")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use scanward_api::ScanRequestStatus;

    /// A request that passes validation with zero warnings.
    fn baseline() -> ScanRequest {
        ScanRequest::new(
            "nightly",
            ScanRequestSpec {
                image: "aquasec/trivy:0.58.1".to_string(),
                command: vec!["trivy".into(), "image".into(), "nginx:1.25".into()],
                ..Default::default()
            },
        )
    }

    fn with_phase(mut scan: ScanRequest, phase: ScanPhase) -> ScanRequest {
        scan.status = Some(ScanRequestStatus {
            phase,
            ..Default::default()
        });
        scan
    }

    #[test]
    fn baseline_is_clean() {
        let warnings = validate_create(&baseline()).unwrap();
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn empty_image_is_rejected() {
        let mut scan = baseline();
        scan.spec.image = String::new();
        let err = validate_create(&scan).unwrap_err();
        assert_eq!(err.to_string(), "image cannot be empty");
    }

    #[test]
    fn nothing_to_run_is_rejected() {
        let mut scan = baseline();
        scan.spec.command.clear();
        scan.spec.target = None;
        assert!(matches!(
            validate_create(&scan),
            Err(ValidationError::NothingToRun)
        ));
    }

    #[rstest]
    #[case("invalid cron")]
    #[case("* * * *")]
    #[case("* * * * * *")]
    #[case("61 * * * *")]
    fn bad_schedules_are_rejected(#[case] schedule: &str) {
        let mut scan = baseline();
        scan.spec.schedule = Some(schedule.to_string());
        let err = validate_create(&scan).unwrap_err();
        assert!(
            err.to_string().contains("invalid cron schedule format"),
            "unexpected message: {err}"
        );
    }

    #[test]
    fn five_field_schedule_is_accepted_without_warnings() {
        let mut scan = baseline();
        scan.spec.schedule = Some("*/5 * * * *".to_string());
        let warnings = validate_create(&scan).unwrap();
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn every_minute_schedule_draws_a_frequency_warning() {
        let mut scan = baseline();
        scan.spec.schedule = Some("* * * * *".to_string());
        let warnings = validate_create(&scan).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("every minute"));
    }

    #[rstest]
    #[case("nginx latest")]
    #[case("nginx:1.25@sha256:aa")]
    #[case("nginx@sha256:aa@sha256:bb")]
    #[case("team/MyApp")]
    fn malformed_targets_are_rejected(#[case] target: &str) {
        let mut scan = baseline();
        scan.spec.command.clear();
        scan.spec.target = Some(target.to_string());
        let err = validate_create(&scan).unwrap_err();
        assert!(
            err.to_string().contains("not a well-formed image reference"),
            "unexpected message: {err}"
        );
    }

    #[rstest]
    #[case(&["sh", "-c", "rm -rf /"])]
    #[case(&["sh", "-c", "mkfs.ext4 /dev/sda1"])]
    #[case(&["dd", "of=/dev/sda"])]
    fn destructive_commands_are_rejected(#[case] command: &[&str]) {
        let mut scan = baseline();
        scan.spec.command = command.iter().map(|s| s.to_string()).collect();
        assert!(matches!(
            validate_create(&scan),
            Err(ValidationError::DestructiveCommand { .. })
        ));
    }

    #[test]
    fn oversized_command_draws_a_warning() {
        let mut scan = baseline();
        scan.spec.command = (0..51).map(|i| format!("arg{i}")).collect();
        let warnings = validate_create(&scan).unwrap();
        assert!(warnings.iter().any(|w| w.contains("51 arguments")));
    }

    #[test]
    fn untagged_image_draws_a_warning() {
        let mut scan = baseline();
        scan.spec.image = "aquasec/trivy".to_string();
        let warnings = validate_create(&scan).unwrap();
        assert!(warnings.iter().any(|w| w.contains("no explicit tag")));
    }

    #[test]
    fn latest_tags_draw_warnings_for_image_and_target() {
        let mut scan = baseline();
        scan.spec.image = "aquasec/trivy:latest".to_string();
        scan.spec.target = Some("nginx:latest".to_string());
        let warnings = validate_create(&scan).unwrap();
        assert!(warnings.iter().any(|w| w.contains("image uses the floating latest tag")));
        assert!(warnings.iter().any(|w| w.contains("target uses the floating latest tag")));
        // target alongside command also warns about precedence
        assert!(warnings.iter().any(|w| w.contains("command takes precedence")));
    }

    #[test]
    fn unknown_scanner_draws_a_hint() {
        let mut scan = baseline();
        scan.spec.image = "busybox:1.36".to_string();
        let warnings = validate_create(&scan).unwrap();
        assert!(warnings.iter().any(|w| w.contains("known scanner")));
    }

    #[test]
    fn suspend_without_schedule_draws_a_warning() {
        let mut scan = baseline();
        scan.spec.suspend = true;
        let warnings = validate_create(&scan).unwrap();
        assert!(warnings.iter().any(|w| w.contains("suspend has no effect")));
    }

    #[test]
    fn target_change_after_completion_is_rejected() {
        let mut old = baseline();
        old.spec.target = Some("nginx:1.25".to_string());
        let old = with_phase(old, ScanPhase::Completed);

        let mut new = old.clone();
        new.spec.target = Some("nginx:1.26".to_string());

        let err = validate_update(&old, &new).unwrap_err();
        assert!(err.to_string().contains("immutable"), "unexpected message: {err}");
    }

    #[test]
    fn target_change_while_pending_is_accepted_with_warning() {
        let mut old = baseline();
        old.spec.target = Some("nginx:1.25".to_string());
        let old = with_phase(old, ScanPhase::Pending);

        let mut new = old.clone();
        new.spec.target = Some("nginx:1.26".to_string());

        let warnings = validate_update(&old, &new).unwrap();
        assert!(warnings.iter().any(|w| w.contains("before the scan started")));
    }

    #[rstest]
    #[case("image")]
    #[case("target")]
    #[case("command")]
    fn running_scans_freeze_workload_fields(#[case] field: &str) {
        let mut old = baseline();
        old.spec.target = Some("nginx:1.25".to_string());
        let old = with_phase(old, ScanPhase::Running);

        let mut new = old.clone();
        match field {
            "image" => new.spec.image = "anchore/grype:0.80.0".to_string(),
            "target" => new.spec.target = Some("nginx:1.26".to_string()),
            _ => new.spec.command.push("--debug".to_string()),
        }

        let err = validate_update(&old, &new).unwrap_err();
        assert!(
            err.to_string().contains("cannot be changed while a scan is running"),
            "unexpected message: {err}"
        );
    }

    #[test]
    fn other_fields_may_change_while_running() {
        let old = with_phase(baseline(), ScanPhase::Running);
        let mut new = old.clone();
        new.spec.schedule = Some("0 0 * * *".to_string());

        let warnings = validate_update(&old, &new).unwrap();
        assert!(warnings.iter().any(|w| w.contains("one-shot to recurring")));
    }

    #[test]
    fn scanner_family_change_draws_a_warning() {
        let old = with_phase(baseline(), ScanPhase::Completed);
        let mut new = old.clone();
        new.spec.image = "anchore/grype:0.80.0".to_string();
        new.spec.command = vec!["grype".into(), "nginx:1.25".into()];

        let warnings = validate_update(&old, &new).unwrap();
        assert!(warnings.iter().any(|w| w.contains("scanner family changed from trivy to grype")));
    }

    #[test]
    fn schedule_removal_warns_about_mode_switch() {
        let mut old = baseline();
        old.spec.schedule = Some("*/5 * * * *".to_string());
        let new = baseline();

        let warnings = validate_update(&old, &new).unwrap();
        assert!(warnings.iter().any(|w| w.contains("recurring to one-shot")));
    }

    #[test]
    fn unchanged_update_is_clean() {
        let old = with_phase(baseline(), ScanPhase::Running);
        let warnings = validate_update(&old, &old.clone()).unwrap();
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }
}
