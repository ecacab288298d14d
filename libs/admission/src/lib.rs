//! # scanward-admission
//!
//! The admission policy engine for `ScanRequest` objects: defaulting applied
//! before validation, and validation applied before a write is committed.
//!
//! Everything in this crate is a pure function over the candidate (and, for
//! updates, the prior) object. No I/O, no client, no state; the webhook
//! server in `services/operator` is a thin HTTP shim over these calls.
//!
//! Validation returns `Ok(warnings)` for accepted writes (warnings are
//! surfaced to the caller but never block) or a single [`ValidationError`]
//! naming the offending field and rule, which prevents the write entirely.

mod defaulting;
mod error;
mod validation;

pub use defaulting::apply_defaults;
pub use error::ValidationError;
pub use validation::{validate_create, validate_update};

/// Scanner image used when a request does not name one.
pub const DEFAULT_SCANNER_IMAGE: &str = "aquasec/trivy:0.58.1";
