//! # Hashing Utilities
//!
//! BLAKE3 is the only hash the runtime uses. Identifiers are derived from
//! domain-separated preimages so that two derivations fed the same bytes for
//! different purposes still land on different outputs.

use crate::config::ID_LENGTH;

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; ID_LENGTH] {
    *blake3::hash(data).as_bytes()
}

/// Hash a sequence of parts under a domain tag.
///
/// Each part is length-prefixed (`u64` little-endian) so that
/// `["ab", "c"]` and `["a", "bc"]` never produce the same preimage.
pub fn hash_with_domain(domain: &[u8], parts: &[&[u8]]) -> [u8; ID_LENGTH] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(domain.len() as u64).to_le_bytes());
    hasher.update(domain);
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}
