//! Versioned envelope for persisted data.
//!
//! Every stored dataset is wrapped in `{ "version": N, "payload": ... }` so
//! the on-disk format can evolve. Readers check the version before decoding
//! the payload.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sigflow_workflow::DatasetStoreError;

/// The envelope version written by this build.
pub const CURRENT_VERSION: u32 = 1;

/// A versioned wrapper around a serialized payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub version: u32,
    pub payload: T,
}

/// Just the version field, read before the payload.
#[derive(Deserialize)]
struct VersionHeader {
    version: u32,
}

impl<T> Envelope<T> {
    /// Wraps `payload` at the current version.
    #[must_use]
    pub fn new(payload: T) -> Self {
        Self {
            version: CURRENT_VERSION,
            payload,
        }
    }

    #[must_use]
    pub fn into_payload(self) -> T {
        self.payload
    }
}

impl<T: Serialize> Envelope<T> {
    /// Serializes the envelope to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetStoreError::Codec`] if the payload cannot be
    /// serialized.
    pub fn encode(&self) -> Result<Vec<u8>, DatasetStoreError> {
        serde_json::to_vec(self).map_err(codec)
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Decodes an envelope, rejecting versions this build cannot read.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetStoreError::UnsupportedVersion`] for an unknown
    /// version and [`DatasetStoreError::Codec`] for malformed bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, DatasetStoreError> {
        let header: VersionHeader = serde_json::from_slice(bytes).map_err(codec)?;
        if header.version != CURRENT_VERSION {
            return Err(DatasetStoreError::UnsupportedVersion {
                version: header.version,
            });
        }
        serde_json::from_slice(bytes).map_err(codec)
    }
}

fn codec(err: serde_json::Error) -> DatasetStoreError {
    DatasetStoreError::Codec {
        message: err.to_string(),
    }
}
