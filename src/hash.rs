//! Content hashing for tamper evidence
//!
//! The digest is always taken over the original file bytes, before any mark
//! is applied, so a verifier can recompute it from the unstamped document.

use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};

/// Label used in the watermark text and on the second QR payload line
const DOCUMENT_HASH_LABEL: &str = "Document hash";

/// Label used on the first QR payload line
const PDF_HASH_LABEL: &str = "PDF Hash";

/// Compute the SHA-256 hash of `data` and return it as a lowercase hex string
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hash the full contents of a file
///
/// The file is read into memory in one go.
pub fn hash_file(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read(path)?;
    let digest = hash_bytes(&content);
    debug!(bytes = content.len(), %digest, "Hashed {}", path.display());

    Ok(digest)
}

/// Verify that a file still matches the digest it was stamped with
pub fn verify_file(path: &Path, expected_hex: &str) -> Result<()> {
    let actual = hash_file(path)?;
    if actual.eq_ignore_ascii_case(expected_hex.trim()) {
        Ok(())
    } else {
        Err(Error::DigestMismatch {
            expected: expected_hex.to_owned(),
            actual,
        })
    }
}

/// Text repeated across the page by the watermark
pub fn watermark_text(digest: &str) -> String {
    format!("{}: {}", DOCUMENT_HASH_LABEL, digest)
}

/// Text encoded into the QR symbol
pub fn qr_payload(digest: &str) -> String {
    format!("{}: {}\n{}", PDF_HASH_LABEL, digest, watermark_text(digest))
}
