//! # Shared-Object Journal
//!
//! Shared objects are mutated in place through their lock, so an aborted
//! transaction has to put them back by hand. The first time a transaction
//! locks a shared object, the journal keeps a [`Rollback::checkpoint`] of
//! it. A commit drops the checkpoints; an abort restores them, newest first.
//!
//! An object taken back with [`TxContext::unshare`](crate::tx::TxContext::unshare)
//! is no longer behind a handle and cannot be restored.

use std::collections::HashSet;
use std::fmt;
use std::sync::Weak;

use parking_lot::Mutex;

use crate::object::ObjectId;

/// State that an aborted transaction can restore.
pub trait Rollback {
    /// Everything [`rollback`](Self::rollback) needs to restore the state
    /// as of [`checkpoint`](Self::checkpoint).
    type Checkpoint: Send + 'static;

    fn checkpoint(&self) -> Self::Checkpoint;

    /// Restores `checkpoint`. Only the ledger can produce a [`Revert`], so
    /// this only runs while an aborted transaction is being undone.
    fn rollback(&mut self, checkpoint: Self::Checkpoint, revert: &Revert);
}

/// Proof that the ledger is undoing an aborted transaction.
#[derive(Debug)]
pub struct Revert {
    _private: (),
}

type Undo = Box<dyn FnOnce(&Revert) + Send>;

#[derive(Default)]
struct Entries {
    active: bool,
    touched: HashSet<ObjectId>,
    undo: Vec<Undo>,
}

/// Checkpoints of the shared objects touched by the running transaction.
#[derive(Default)]
pub(crate) struct Journal {
    entries: Mutex<Entries>,
}

impl Journal {
    pub(crate) fn begin(&self) {
        let mut entries = self.entries.lock();
        entries.active = true;
        entries.touched.clear();
        entries.undo.clear();
    }

    /// Keeps a checkpoint of `object` unless this transaction already has
    /// one. Outside a transaction this does nothing.
    pub(crate) fn record<T>(&self, id: ObjectId, object: &T, cell: Weak<Mutex<T>>)
    where
        T: Rollback + Send + 'static,
    {
        let mut entries = self.entries.lock();
        if !entries.active || !entries.touched.insert(id) {
            return;
        }
        let checkpoint = object.checkpoint();
        entries.undo.push(Box::new(move |revert: &Revert| {
            if let Some(cell) = cell.upgrade() {
                cell.lock().rollback(checkpoint, revert);
            }
        }));
    }

    /// Keeps every change. Returns the number of objects touched.
    pub(crate) fn commit(&self) -> usize {
        let mut entries = self.entries.lock();
        entries.active = false;
        entries.touched.clear();
        std::mem::take(&mut entries.undo).len()
    }

    /// Restores every touched object. Returns how many were restored.
    pub(crate) fn revert(&self) -> usize {
        // Object locks are taken after the journal lock is released.
        let undo = {
            let mut entries = self.entries.lock();
            entries.active = false;
            entries.touched.clear();
            std::mem::take(&mut entries.undo)
        };
        let restored = undo.len();
        let revert = Revert { _private: () };
        for step in undo.into_iter().rev() {
            step(&revert);
        }
        restored
    }
}

impl fmt::Debug for Journal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("Journal")
            .field("active", &entries.active)
            .field("checkpoints", &entries.undo.len())
            .finish()
    }
}
