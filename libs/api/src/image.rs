//! Container image reference parsing.
//!
//! Scan targets are user-supplied image references; this module splits them
//! into repository, tag, and digest and enforces the structural rules the
//! registry protocol imposes (lowercase repository paths, tag and digest
//! mutually exclusive).

use thiserror::Error;

/// Scanner tools the admission engine recognizes, matched by substring
/// against the scanner image.
pub const KNOWN_SCANNERS: &[&str] = &["trivy", "grype", "snyk", "kube-bench", "kube-hunter"];

/// Detect which known scanner tool an image refers to, if any.
pub fn scanner_family(image: &str) -> Option<&'static str> {
    KNOWN_SCANNERS.iter().copied().find(|tool| image.contains(tool))
}

/// Structural errors in an image reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageRefError {
    /// The reference is empty or whitespace-only.
    #[error("reference is empty")]
    Empty,

    /// The reference contains embedded whitespace.
    #[error("reference contains embedded whitespace")]
    EmbeddedWhitespace,

    /// More than one `@` digest marker.
    #[error("reference contains more than one digest marker")]
    MultipleDigestMarkers,

    /// Both a tag and a digest were supplied.
    #[error("reference has both a tag and a digest")]
    TagAndDigest,

    /// A repository path segment contains uppercase characters.
    #[error("repository path segment {0:?} is not lowercase")]
    UppercaseRepository(String),
}

/// A parsed image reference: `repository[:tag][@digest]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageRef {
    /// Parse and structurally validate a reference.
    ///
    /// A leading registry-host segment (recognized by containing `.` or `:`)
    /// is exempt from the lowercase rule; hostnames are case-insensitive,
    /// repository paths are not.
    pub fn parse(reference: &str) -> Result<Self, ImageRefError> {
        if reference.trim().is_empty() {
            return Err(ImageRefError::Empty);
        }
        if reference.chars().any(char::is_whitespace) {
            return Err(ImageRefError::EmbeddedWhitespace);
        }

        let (name, digest) = match reference.split_once('@') {
            Some((name, digest)) => {
                if digest.contains('@') {
                    return Err(ImageRefError::MultipleDigestMarkers);
                }
                (name, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        // A tag is a ':' suffix on the final path segment; earlier colons
        // belong to a registry host port.
        let last_segment = name.rsplit_once('/').map_or(name, |(_, last)| last);
        let tag = last_segment.split_once(':').map(|(_, tag)| tag.to_string());

        if tag.is_some() && digest.is_some() {
            return Err(ImageRefError::TagAndDigest);
        }

        let repository = match &tag {
            Some(tag) => name[..name.len() - tag.len() - 1].to_string(),
            None => name.to_string(),
        };

        let segments: Vec<&str> = repository.split('/').collect();
        let host_prefix =
            segments.len() > 1 && (segments[0].contains('.') || segments[0].contains(':'));
        for segment in segments.iter().skip(usize::from(host_prefix)) {
            if segment.chars().any(|c| c.is_ascii_uppercase()) {
                return Err(ImageRefError::UppercaseRepository(segment.to_string()));
            }
        }

        Ok(Self {
            repository,
            tag,
            digest,
        })
    }

    /// Whether the reference pins a version via tag or digest.
    pub fn has_explicit_version(&self) -> bool {
        self.tag.is_some() || self.digest.is_some()
    }

    /// Whether the reference uses the floating `latest` tag.
    pub fn uses_latest_tag(&self) -> bool {
        self.tag.as_deref() == Some("latest")
    }
}
