//! Mutating defaults applied before validation.

use scanward_api::{scanner_family, ScanRequestSpec};

use crate::DEFAULT_SCANNER_IMAGE;

/// Fill in defaults on a candidate spec.
///
/// An empty `image` becomes the default scanner. An empty `command` is
/// synthesized as `<tool> image <target>` when there is a target to scan and
/// the image is a recognized scanner tool; a command the user supplied is
/// never overwritten.
pub fn apply_defaults(spec: &mut ScanRequestSpec) {
    if spec.image.trim().is_empty() {
        spec.image = DEFAULT_SCANNER_IMAGE.to_string();
    }

    if spec.command.is_empty() {
        let target = spec.target.as_deref().filter(|t| !t.trim().is_empty());
        if let (Some(target), Some(tool)) = (target, scanner_family(&spec.image)) {
            spec.command = vec![tool.to_string(), "image".to_string(), target.to_string()];
        }
    }
}
