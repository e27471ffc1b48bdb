//! Content addressing using SHA-256.
//!
//! [`content_address`] is the one place ids are derived. The object store,
//! staging, the reconciler and merge classification all compare content
//! through it.

use sha2::{Digest, Sha256};

/// Length of a full object id in hex characters.
pub const ID_LEN: usize = 64;

/// Abbreviated id length used for display.
pub const SHORT_ID_LEN: usize = 7;

/// Compute the content address of arbitrary bytes, as lowercase hex.
pub fn content_address(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// True if `s` could be an id or id prefix: non-empty and all hex digits.
pub fn is_hex_id(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Abbreviate an id for display.
pub fn short_id(id: &str) -> &str {
    &id[..SHORT_ID_LEN.min(id.len())]
}
