//! # Objects & Identities
//!
//! Everything the ledger tracks is an object with a 32-byte [`ObjectId`].
//! Accounts are [`Address`]es and every transaction gets a [`TxDigest`].
//! All three are content-derived BLAKE3 hashes, hex-encoded on the wire.
//!
//! A live object carries a [`Uid`]. `Uid` is deliberately not `Clone`: the
//! only way to get one is [`TxContext::new_uid`](crate::tx::TxContext::new_uid)
//! and the only way to get rid of one is
//! [`TxContext::delete`](crate::tx::TxContext::delete). Anything holding a
//! `Uid` is therefore unique by construction.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::{ADDRESS_DOMAIN, ID_DEBUG_PREFIX, ID_LENGTH, OBJECT_DOMAIN, TX_DOMAIN};
use crate::hash::hash_with_domain;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Generates a 32-byte identifier newtype with hex encoding, `0x`-prefixed
/// `Display`, and serde as a hex string (so identifiers work as JSON keys).
macro_rules! hex_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; ID_LENGTH]);

        impl $name {
            /// Wraps raw identifier bytes.
            pub const fn from_bytes(bytes: [u8; ID_LENGTH]) -> Self {
                Self(bytes)
            }

            /// Returns the raw identifier bytes.
            pub fn as_bytes(&self) -> &[u8; ID_LENGTH] {
                &self.0
            }

            /// Hex encoding without the `0x` prefix.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parses a hex string, with or without a `0x` prefix.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(s)?;
                let arr: [u8; ID_LENGTH] = bytes
                    .try_into()
                    .map_err(|_| hex::FromHexError::InvalidStringLength)?;
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    "{}({}..)",
                    stringify!($name),
                    &self.to_hex()[..ID_DEBUG_PREFIX]
                )
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_id!(
    /// Unique identity of a ledger object.
    ObjectId
);

hex_id!(
    /// An account on the ledger. Transactions are sent by addresses and
    /// owned objects belong to exactly one address.
    Address
);

hex_id!(
    /// Identity of a single transaction.
    TxDigest
);

impl ObjectId {
    /// Derives the id of the `index`-th object created by transaction `digest`.
    pub fn derive(digest: &TxDigest, index: u64) -> Self {
        Self(hash_with_domain(
            OBJECT_DOMAIN,
            &[digest.as_bytes(), &index.to_le_bytes()],
        ))
    }
}

impl Address {
    /// Derives an address from a human-readable label, e.g. `"alice"`.
    pub fn from_label(label: &str) -> Self {
        Self(hash_with_domain(ADDRESS_DOMAIN, &[label.as_bytes()]))
    }
}

impl TxDigest {
    /// Derives the digest of the transaction at ledger position `sequence`.
    pub fn derive(sequence: u64, sender: &Address) -> Self {
        Self(hash_with_domain(
            TX_DOMAIN,
            &[&sequence.to_le_bytes(), sender.as_bytes()],
        ))
    }
}

// ---------------------------------------------------------------------------
// Uid & Key
// ---------------------------------------------------------------------------

/// The identity handle embedded in every live object.
///
/// Not `Clone`, not `Copy`, not constructible outside this crate.
#[derive(Debug, PartialEq, Eq)]
pub struct Uid {
    id: ObjectId,
}

impl Uid {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self { id }
    }

    /// The object id this handle stands for.
    pub fn id(&self) -> ObjectId {
        self.id
    }
}

/// An object the ledger can own, share, and destroy.
pub trait Key: Send + 'static {
    /// The object's identity handle.
    fn uid(&self) -> &Uid;

    /// Shorthand for `self.uid().id()`.
    fn id(&self) -> ObjectId {
        self.uid().id()
    }

    /// The resource this object is bound to, if any. Capabilities return
    /// the id of the resource they govern; the registry indexes on it.
    fn bound_to(&self) -> Option<ObjectId> {
        None
    }

    /// Type tag recorded in the registry.
    fn type_tag() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

// ---------------------------------------------------------------------------
// Registry records
// ---------------------------------------------------------------------------

/// Who holds an object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Owner {
    /// Exclusively owned by one account.
    Address(Address),
    /// Shared: any transaction may reference it, mutations are serialized.
    Shared,
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Address(address) => write!(f, "address {}", address),
            Owner::Shared => write!(f, "shared"),
        }
    }
}

/// The registry entry for a live object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Object identity.
    pub id: ObjectId,
    /// Rust type name of the object.
    pub type_tag: String,
    /// Current holder.
    pub owner: Owner,
    /// Governed resource, for capabilities.
    pub bound_to: Option<ObjectId>,
    /// Bumped every time ownership changes. Starts at 1.
    pub version: u64,
    /// Transaction that created the object.
    pub created_in: TxDigest,
    /// Timestamp of the last ownership change.
    pub updated_at: DateTime<Utc>,
}
