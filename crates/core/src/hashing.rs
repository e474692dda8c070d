//! Shared SHA-256 hex digest utility.
//!
//! Used by the `audit` module for the integrity chain and by callers that
//! need to derive a signature attestation when the signer supplies none.

use sha2::{Digest, Sha256};

use crate::types::{EntityId, Timestamp};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Derive an attestation digest binding a signer to a specific step of a
/// specific flow at a point in time.
pub fn signature_attestation(
    flow_id: EntityId,
    step_id: EntityId,
    signer_id: &str,
    signed_at: Timestamp,
) -> String {
    let material = format!("{flow_id}|{step_id}|{signer_id}|{}", signed_at.to_rfc3339());
    sha256_hex(material.as_bytes())
}
