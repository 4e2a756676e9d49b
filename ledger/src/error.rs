//! Error type for the ledger runtime.
//!
//! Every runtime primitive that can fail returns a [`LedgerError`]. Contract
//! crates wrap it in their own error enums via `#[from]`.

use thiserror::Error;

use crate::object::{Address, ObjectId, Owner};

/// Errors raised by the ledger runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The transaction sender does not own the presented object.
    #[error("{sender} does not own object {object} (held by {owner})")]
    NotOwner {
        /// The object that was presented.
        object: ObjectId,
        /// The sender of the transaction.
        sender: Address,
        /// The registered holder.
        owner: Owner,
    },

    /// The object is not (or no longer) in the registry.
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// Only objects created in the current transaction can be shared.
    #[error("object {0} was not created in this transaction and cannot be shared")]
    ShareExisting(ObjectId),

    /// A shared object cannot be taken back while other handles exist.
    #[error("shared object {0} is still referenced elsewhere")]
    ObjectInUse(ObjectId),

    /// The transaction created or unwrapped objects and left them without
    /// an owner. Nothing was committed.
    #[error("transaction left {} object(s) without an owner: {:?}", .0.len(), .0)]
    UnboundObjects(Vec<ObjectId>),

    /// A balance addition would exceed `u64::MAX`.
    #[error("balance overflow: current {current}, credit {credit}")]
    Overflow {
        /// Balance before the failed addition.
        current: u64,
        /// Amount that caused the overflow.
        credit: u64,
    },

    /// A balance split asked for more than the balance holds.
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Current balance.
        available: u64,
        /// Requested amount.
        requested: u64,
    },

    /// Only empty balances can be destroyed.
    #[error("cannot destroy a non-zero balance of {0}")]
    NonZeroBalance(u64),
}
