//! Ledger domain types.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fmt;

/// Content-derived deduplication key.
///
/// A SHA-256 digest over attachment bytes only; filename and source message
/// never contribute, so byte-identical content always collides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentFingerprint(String);

impl ContentFingerprint {
    /// Computes the fingerprint of a byte buffer.
    #[must_use]
    pub fn of(content: &[u8]) -> Self {
        let digest = Sha256::digest(content);
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            use std::fmt::Write as _;
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    /// Reconstructs a fingerprint from its stored hex form.
    #[must_use]
    pub const fn from_stored(hex: String) -> Self {
        Self(hex)
    }

    /// The fingerprint as lowercase hex.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A recorded upload: proof that content with this fingerprint reached the
/// remote library and its album.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Content fingerprint.
    pub fingerprint: ContentFingerprint,
    /// When the upload was confirmed.
    pub uploaded_at: DateTime<Utc>,
    /// Remote content handle returned by the photo library.
    pub remote_handle: String,
}
