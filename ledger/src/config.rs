//! # Runtime Constants
//!
//! Every magic number the ledger runtime relies on. Identifiers are derived
//! by hashing, and each derivation gets its own domain tag so that an
//! address can never collide with an object id built from the same bytes.

/// Length in bytes of every identifier (objects, addresses, digests).
/// BLAKE3 output, no truncation.
pub const ID_LENGTH: usize = 32;

/// Number of hex characters shown by the `Debug` impls of identifiers.
/// Enough to tell objects apart in a log line without drowning it.
pub const ID_DEBUG_PREFIX: usize = 12;

/// Domain tag for deriving an [`Address`](crate::object::Address) from a
/// human-readable label.
pub const ADDRESS_DOMAIN: &[u8] = b"ferrum/address/v1";

/// Domain tag for deriving an [`ObjectId`](crate::object::ObjectId) from a
/// transaction digest and a creation counter.
pub const OBJECT_DOMAIN: &[u8] = b"ferrum/object/v1";

/// Domain tag for deriving a [`TxDigest`](crate::object::TxDigest) from the
/// ledger sequence number and the sender.
pub const TX_DOMAIN: &[u8] = b"ferrum/tx/v1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains_are_distinct() {
        assert_ne!(ADDRESS_DOMAIN, OBJECT_DOMAIN);
        assert_ne!(ADDRESS_DOMAIN, TX_DOMAIN);
        assert_ne!(OBJECT_DOMAIN, TX_DOMAIN);
    }

    #[test]
    fn debug_prefix_fits_in_hex_id() {
        assert!(ID_DEBUG_PREFIX <= ID_LENGTH * 2);
    }
}
