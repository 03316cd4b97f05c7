use std::fmt;

use sha2::{Digest, Sha256};

use super::turn::TaskKind;

const DIGEST_HEX_CHARS: usize = 16;

/// Fingerprint of an uploaded image and the task it was submitted for.
///
/// Only used to suppress re-processing of the same upload event. The digest is
/// truncated, so two different uploads can collide; that is accepted here and
/// the marker must not be used for content addressing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageMarker(String);

impl ImageMarker {
    pub fn for_upload(bytes: &[u8], task: TaskKind) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        let digest = hex::encode(hasher.finalize());
        Self(format!("{}_{}", task.as_str(), &digest[..DIGEST_HEX_CHARS]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
