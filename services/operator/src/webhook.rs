//! Admission webhook endpoints.
//!
//! A thin HTTP shim over `scanward-admission`: the mutate route applies
//! defaults and answers with a JSON Patch, the validate route answers
//! allowed or denied plus warnings. The envelope types mirror the
//! `admission.k8s.io/v1` AdmissionReview wire format.

use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use scanward_admission::{apply_defaults, validate_create, validate_update};
use scanward_api::ScanRequest;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Incoming review envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    #[serde(default)]
    pub request: Option<AdmissionRequest>,
}

/// The request half of a review.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    pub uid: String,
    pub operation: String,
    #[serde(default)]
    pub object: Option<ScanRequest>,
    #[serde(default)]
    pub old_object: Option<ScanRequest>,
}

/// Routes served by the webhook listener.
pub fn admission_router() -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/mutate-v1alpha1-scanrequest", post(mutate))
        .route("/validate-v1alpha1-scanrequest", post(validate))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn mutate(Json(review): Json<AdmissionReview>) -> Json<Value> {
    let Some(request) = review.request else {
        return denied("", "admission review carried no request");
    };
    let Some(scan) = request.object else {
        // Nothing to default on e.g. DELETE.
        return allowed(&request.uid, &[]);
    };

    let mut defaulted = scan.spec.clone();
    apply_defaults(&mut defaulted);

    let mut operations = Vec::new();
    if defaulted.image != scan.spec.image {
        operations.push(json!({ "op": "add", "path": "/spec/image", "value": defaulted.image }));
    }
    if defaulted.command != scan.spec.command {
        operations.push(json!({ "op": "add", "path": "/spec/command", "value": defaulted.command }));
    }
    debug!(operations = operations.len(), "defaulting complete");

    patched(&request.uid, &operations)
}

async fn validate(Json(review): Json<AdmissionReview>) -> Json<Value> {
    let Some(request) = review.request else {
        return denied("", "admission review carried no request");
    };

    match request.operation.as_str() {
        "CREATE" => {
            let Some(scan) = request.object else {
                return denied(&request.uid, "create request carried no object");
            };
            respond_to_verdict(&request.uid, validate_create(&scan))
        }
        "UPDATE" => {
            let (Some(old), Some(new)) = (request.old_object, request.object) else {
                return denied(&request.uid, "update request carried no objects");
            };
            respond_to_verdict(&request.uid, validate_update(&old, &new))
        }
        // Deletion is never blocked here; cleanup is the garbage
        // collector's job.
        _ => allowed(&request.uid, &[]),
    }
}

fn respond_to_verdict(
    uid: &str,
    verdict: Result<Vec<String>, scanward_admission::ValidationError>,
) -> Json<Value> {
    match verdict {
        Ok(warnings) => allowed(uid, &warnings),
        Err(rejection) => denied(uid, &rejection.to_string()),
    }
}

fn respond(response: Value) -> Json<Value> {
    Json(json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "response": response,
    }))
}

fn allowed(uid: &str, warnings: &[String]) -> Json<Value> {
    let mut response = json!({ "uid": uid, "allowed": true });
    if !warnings.is_empty() {
        response["warnings"] = json!(warnings);
    }
    respond(response)
}

fn denied(uid: &str, message: &str) -> Json<Value> {
    respond(json!({
        "uid": uid,
        "allowed": false,
        "status": { "message": message, "code": 403 },
    }))
}

fn patched(uid: &str, operations: &[Value]) -> Json<Value> {
    let mut response = json!({ "uid": uid, "allowed": true });
    if !operations.is_empty() {
        match serde_json::to_vec(operations) {
            Ok(bytes) => {
                response["patch"] = json!(BASE64.encode(bytes));
                response["patchType"] = json!("JSONPatch");
            }
            Err(error) => {
                // Admit unpatched rather than block the write; validation
                // still runs against the unpatched object.
                warn!(error = %error, "failed to serialize admission patch");
            }
        }
    }
    respond(response)
}
