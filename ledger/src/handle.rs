//! # Object Handles
//!
//! Once an object leaves the transaction that created it, it is held in one
//! of two ways:
//!
//! - [`Owned<T>`]: exclusively owned by an address. The only constructor is
//!   [`TxContext::transfer`](crate::tx::TxContext::transfer), so holding an
//!   `Owned<T>` means the registry already names its owner. Using it requires
//!   the transaction sender to *be* that owner.
//! - [`Shared<T>`]: shared; any transaction may reference it, and mutations
//!   are serialized by a per-object lock. Locking inside a transaction
//!   checkpoints the object in the ledger's journal, so an abort restores it.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::error::LedgerError;
use crate::journal::{Journal, Rollback};
use crate::object::{Address, Key, ObjectId, Owner};
use crate::tx::TxContext;

// ---------------------------------------------------------------------------
// Owned
// ---------------------------------------------------------------------------

/// An object whose ownership is bound to an address.
#[derive(Debug)]
pub struct Owned<T> {
    object: T,
    owner: Address,
}

impl<T: Key> Owned<T> {
    pub(crate) fn new(object: T, owner: Address) -> Self {
        Self { object, owner }
    }

    /// The address this object is bound to.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// The object's id.
    pub fn id(&self) -> ObjectId {
        self.object.id()
    }

    /// Read-only view of the object's public data.
    ///
    /// This is *not* an authorization. Operations that require possession
    /// take `&Owned<T>` and call [`check`](Self::check).
    pub fn object(&self) -> &T {
        &self.object
    }

    /// Proves possession: succeeds only when the transaction sender is the
    /// owner and the registry agrees.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotOwner`] if the sender is not the owner, or
    /// [`LedgerError::ObjectNotFound`] if the object is no longer live.
    pub fn check(&self, ctx: &TxContext<'_>) -> Result<&T, LedgerError> {
        let id = self.id();
        let record = ctx.record(id).ok_or(LedgerError::ObjectNotFound(id))?;
        if ctx.sender() != self.owner || record.owner != Owner::Address(self.owner) {
            return Err(LedgerError::NotOwner {
                object: id,
                sender: ctx.sender(),
                owner: record.owner,
            });
        }
        Ok(&self.object)
    }

    pub(crate) fn into_inner(self) -> T {
        self.object
    }
}

// ---------------------------------------------------------------------------
// Shared
// ---------------------------------------------------------------------------

/// A shared object. Cloning the handle does not clone the object.
pub struct Shared<T> {
    id: ObjectId,
    inner: Arc<Mutex<T>>,
    journal: Arc<Journal>,
}

impl<T> Shared<T> {
    pub(crate) fn new(id: ObjectId, object: T, journal: Arc<Journal>) -> Self {
        Self {
            id,
            inner: Arc::new(Mutex::new(object)),
            journal,
        }
    }

    /// The shared object's id.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Number of live handles to this object, this one included.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Takes the object back if this is the last handle.
    pub(crate) fn try_into_inner(self) -> Result<T, Self> {
        let Self { id, inner, journal } = self;
        Arc::try_unwrap(inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { id, inner, journal })
    }
}

impl<T: Rollback + Send + 'static> Shared<T> {
    /// Acquires the per-object lock. One writer at a time.
    ///
    /// The first lock inside a transaction checkpoints the object; if the
    /// transaction aborts, every change made through this guard is undone.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        let guard = self.inner.lock();
        self.journal.record(self.id, &*guard, Arc::downgrade(&self.inner));
        guard
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            inner: Arc::clone(&self.inner),
            journal: Arc::clone(&self.journal),
        }
    }
}

impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shared({:?})", self.id)
    }
}
