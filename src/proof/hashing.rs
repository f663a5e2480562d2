//! Content and proof hashes
//!
//! These produce the opaque values the proof assembler consumes.

use crate::models::{EligibilityEvaluation, LoanApplication};
use crate::Result;
use base32::Alphabet;
use sha2::{Digest, Sha256};
use std::io::Write;

/// SHA-256 hex of the application's canonical JSON.
/// Streams the JSON straight into the hasher.
pub fn content_hash(application: &LoanApplication) -> Result<String> {
    let mut hasher = Sha256::new();
    serde_json::to_writer(&mut HashWriter(&mut hasher), application)?;
    Ok(hex::encode(hasher.finalize()))
}

/// SHA-256 hex of `"{content_hash}:{proof_id}:{evaluation json}"`
pub fn proof_hash(
    content_hash: &str,
    proof_id: &str,
    evaluation: &EligibilityEvaluation,
) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(content_hash.as_bytes());
    hasher.update(b":");
    hasher.update(proof_id.as_bytes());
    hasher.update(b":");
    serde_json::to_writer(&mut HashWriter(&mut hasher), evaluation)?;
    Ok(hex::encode(hasher.finalize()))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// CIDv1-looking reference: `bafybei` + lowercase unpadded base32 of the
/// blob's SHA-256
pub fn content_id(blob: &[u8]) -> String {
    let digest = Sha256::digest(blob);
    let encoded = base32::encode(Alphabet::RFC4648 { padding: false }, &digest);
    format!("bafybei{}", encoded.to_ascii_lowercase())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
