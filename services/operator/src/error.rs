//! Operator error types.

use thiserror::Error;

/// Errors surfaced by a reconciliation attempt.
#[derive(Debug, Error)]
pub enum Error {
    /// Object-store round trip failed (other than not-found, which every
    /// lookup reports as `Ok(None)`).
    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),

    /// The request carried no namespace; derived objects are namespaced.
    #[error("scan request has no namespace")]
    MissingNamespace,

    /// The request lacks the metadata needed to derive owned objects.
    #[error("scan request metadata is incomplete: {0}")]
    IncompleteMetadata(&'static str),
}

impl Error {
    /// Transport and API-server errors may succeed on retry; a malformed
    /// object only changes when the user edits it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Kube(_))
    }
}
