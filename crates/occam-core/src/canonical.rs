//! # Canonical JSON
//!
//! Run-context and integrity-report checksums are taken over RFC 8785 (JCS)
//! bytes, so two encodings of the same value hash alike however their maps
//! were ordered in memory. [`CanonicalBytes`] can only be produced by
//! [`CanonicalBytes::new()`], and [`crate::sha256_hex()`] accepts nothing
//! else.
//!
//! Fractional numbers are normal here (embeddings, confidence scores, drift
//! scores). JCS prints every finite `f64` in its shortest round-trip form;
//! `serde_json` has already turned non-finite floats into `null`.

use serde::Serialize;

use crate::error::CanonicalizationError;

/// JCS-encoded bytes of a serializable value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// # Errors
    ///
    /// `SerializationFailed` when `value` has no JSON form, e.g. a map with
    /// non-string keys.
    pub fn new<T: Serialize + ?Sized>(value: &T) -> Result<Self, CanonicalizationError> {
        // Go through a Value first so struct field order cannot leak into
        // the output.
        let tree = serde_json::to_value(value)?;
        Ok(Self(serde_jcs::to_vec(&tree)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
