//! # Ledger
//!
//! The object registry plus the event log, behind a single lock. Every
//! mutation goes through [`Ledger::execute`], which gives the caller a
//! [`TxContext`], and commits the buffered effects only if the closure
//! succeeds *and* no object was left without an owner. Otherwise nothing is
//! applied: no registry change, no event, and every shared object the
//! transaction locked is restored from the [`journal`](crate::journal).
//!
//! Transactions are serialized. Shared objects carry their own lock on top
//! of that; the order is always ledger first, object second. Starting a
//! transaction from inside another one deadlocks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::LedgerError;
use crate::event::Event;
use crate::journal::Journal;
use crate::object::{Address, ObjectId, ObjectRecord, Owner, TxDigest};
use crate::tx::{Effects, TxContext};

#[derive(Debug, Default)]
struct LedgerState {
    objects: HashMap<ObjectId, ObjectRecord>,
    events: Vec<Event>,
    /// Number of transactions executed, committed or not.
    sequence: u64,
}

impl LedgerState {
    fn apply(&mut self, effects: Effects) {
        for id in &effects.deleted {
            self.objects.remove(id);
        }
        self.objects.extend(effects.written);
        self.events.extend(effects.events);
    }
}

/// The in-memory ledger runtime.
#[derive(Debug, Default)]
pub struct Ledger {
    state: Mutex<LedgerState>,
    journal: Arc<Journal>,
}

impl Ledger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one transaction on behalf of `sender`.
    ///
    /// The closure's effects are committed only if it returns `Ok` and every
    /// object it created or unwrapped ended up transferred, shared, or
    /// deleted.
    ///
    /// # Errors
    ///
    /// The closure's own error, or [`LedgerError::UnboundObjects`] converted
    /// into `E`. In both cases nothing is committed and the shared objects
    /// the closure locked are back in their prior state.
    pub fn execute<R, E, F>(&self, sender: Address, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut TxContext<'_>) -> Result<R, E>,
        E: From<LedgerError> + fmt::Display,
    {
        let mut state = self.state.lock();
        let digest = TxDigest::derive(state.sequence, &sender);
        state.sequence += 1;
        self.journal.begin();

        let outcome = {
            let mut ctx = TxContext::new(sender, digest, &state.objects, &self.journal);
            match f(&mut ctx) {
                Ok(value) => ctx
                    .into_effects()
                    .map(|effects| (value, effects))
                    .map_err(E::from),
                Err(err) => Err(err),
            }
        };

        match outcome {
            Ok((value, effects)) => {
                let touched = self.journal.commit();
                debug!(
                    %digest,
                    %sender,
                    written = effects.written.len(),
                    deleted = effects.deleted.len(),
                    events = effects.events.len(),
                    touched,
                    "transaction committed"
                );
                state.apply(effects);
                Ok(value)
            }
            Err(err) => {
                let restored = self.journal.revert();
                warn!(%digest, %sender, restored, error = %err, "transaction aborted");
                Err(err)
            }
        }
    }

    /// Registry record for `id`, if the object is live.
    pub fn object(&self, id: ObjectId) -> Option<ObjectRecord> {
        self.state.lock().objects.get(&id).cloned()
    }

    /// Current holder of `id`, if the object is live.
    pub fn owner_of(&self, id: ObjectId) -> Option<Owner> {
        self.state.lock().objects.get(&id).map(|r| r.owner)
    }

    /// Live objects of type `type_tag` bound to `resource`.
    pub fn live_bound(&self, type_tag: &str, resource: ObjectId) -> Vec<ObjectId> {
        let state = self.state.lock();
        let mut ids: Vec<ObjectId> = state
            .objects
            .values()
            .filter(|r| r.type_tag == type_tag && r.bound_to == Some(resource))
            .map(|r| r.id)
            .collect();
        ids.sort();
        ids
    }

    /// Number of live objects.
    pub fn object_count(&self) -> usize {
        self.state.lock().objects.len()
    }

    /// Every committed event, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    /// Committed events of one kind, oldest first.
    pub fn events_of_kind(&self, kind: &str) -> Vec<Event> {
        self.state
            .lock()
            .events
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    /// Number of transactions executed so far, committed or aborted.
    pub fn sequence(&self) -> u64 {
        self.state.lock().sequence
    }
}
