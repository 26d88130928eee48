//! Configuration fingerprints used for duplicate detection.

use serde::Serialize;
use sha1::{Digest, Sha1};

use crate::error::{ReleaseError, ReleaseResult};

/// Hex SHA-1 of the JSON encoding of `value`.
pub fn fingerprint<T: Serialize + ?Sized>(value: &T) -> ReleaseResult<String> {
    let bytes = serde_json::to_vec(value).map_err(|e| ReleaseError::Snapshot(e.to_string()))?;
    Ok(hex::encode(Sha1::digest(&bytes)))
}

/// Fingerprints of a gathered configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signatures {
    pub secrets: String,
    pub services: String,
}

impl Signatures {
    pub fn compute<S: Serialize, V: Serialize>(secrets: &[S], services: &[V]) -> ReleaseResult<Self> {
        Ok(Self {
            secrets: fingerprint(secrets)?,
            services: fingerprint(services)?,
        })
    }
}
