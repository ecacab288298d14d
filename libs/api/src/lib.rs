//! # scanward-api
//!
//! Resource types for the scanward operator's `ScanRequest` custom resource.
//!
//! ## Design Principles
//!
//! - The spec carries user intent only; status is derived and written solely
//!   by the reconciliation loop
//! - `ScanPhase` is a closed enum with an explicit transition predicate, so
//!   illegal phase values and illegal transitions are unrepresentable
//! - Child objects (job, cron job, results artifact) are named
//!   deterministically from the owning request, never generated
//! - Everything here is pure data; no client, no I/O

mod conditions;
mod image;
mod phase;
mod request;

pub use conditions::{set_condition, Condition, ConditionStatus};
pub use image::{scanner_family, ImageRef, ImageRefError, KNOWN_SCANNERS};
pub use phase::ScanPhase;
pub use request::{ScanRequest, ScanRequestSpec, ScanRequestStatus, API_GROUP, NAME_LABEL};
