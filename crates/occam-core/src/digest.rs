//! SHA-256 checksums over [`CanonicalBytes`], rendered as lowercase hex.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::CanonicalizationError;

/// Hex SHA-256 of canonical bytes.
pub fn sha256_hex(data: &CanonicalBytes) -> String {
    format!("{:x}", Sha256::digest(data.as_bytes()))
}

/// Canonicalize `value` and hash it.
pub fn checksum_of<T: Serialize + ?Sized>(value: &T) -> Result<String, CanonicalizationError> {
    Ok(sha256_hex(&CanonicalBytes::new(value)?))
}
