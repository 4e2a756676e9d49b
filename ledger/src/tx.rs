//! # Transaction Context
//!
//! A [`TxContext`] is handed to the closure passed to
//! [`Ledger::execute`](crate::ledger::Ledger::execute). It reads the
//! committed registry and buffers every effect: created, transferred,
//! shared and deleted objects, plus emitted events. Nothing reaches the
//! registry until the ledger commits, and the ledger refuses to commit a
//! transaction that leaves an object without an owner.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::trace;
use uuid::Uuid;

use crate::error::LedgerError;
use crate::event::Event;
use crate::handle::{Owned, Shared};
use crate::journal::Journal;
use crate::object::{Address, Key, ObjectId, ObjectRecord, Owner, TxDigest, Uid};

/// Buffered effects of a transaction, applied atomically on commit.
#[derive(Debug, Default)]
pub(crate) struct Effects {
    /// New or updated registry records.
    pub(crate) written: HashMap<ObjectId, ObjectRecord>,
    /// Committed objects destroyed by this transaction.
    pub(crate) deleted: HashSet<ObjectId>,
    /// Ids allocated by this transaction (and not since deleted).
    pub(crate) created: HashSet<ObjectId>,
    /// Objects currently held by value with no owner: freshly created,
    /// unwrapped from `Owned`, or taken back from `Shared`.
    pub(crate) unbound: BTreeSet<ObjectId>,
    /// Events in emission order.
    pub(crate) events: Vec<Event>,
}

/// Per-transaction view of the ledger.
pub struct TxContext<'a> {
    sender: Address,
    digest: TxDigest,
    timestamp: DateTime<Utc>,
    committed: &'a HashMap<ObjectId, ObjectRecord>,
    journal: &'a Arc<Journal>,
    effects: Effects,
    ids_created: u64,
}

impl<'a> TxContext<'a> {
    pub(crate) fn new(
        sender: Address,
        digest: TxDigest,
        committed: &'a HashMap<ObjectId, ObjectRecord>,
        journal: &'a Arc<Journal>,
    ) -> Self {
        Self {
            sender,
            digest,
            timestamp: Utc::now(),
            committed,
            journal,
            effects: Effects::default(),
            ids_created: 0,
        }
    }

    /// The account that signed this transaction.
    pub fn sender(&self) -> Address {
        self.sender
    }

    /// This transaction's digest.
    pub fn digest(&self) -> TxDigest {
        self.digest
    }

    /// Timestamp fixed at the start of the transaction.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The registry record for `id` as this transaction sees it.
    pub fn record(&self, id: ObjectId) -> Option<&ObjectRecord> {
        if self.effects.deleted.contains(&id) {
            return None;
        }
        self.effects
            .written
            .get(&id)
            .or_else(|| self.committed.get(&id))
    }

    /// Whether `id` names a live object, including objects created earlier
    /// in this transaction that have no owner yet.
    pub fn is_known(&self, id: ObjectId) -> bool {
        self.effects.created.contains(&id) || self.record(id).is_some()
    }

    /// Live objects of type `type_tag` bound to `resource`.
    pub fn live_bound(&self, type_tag: &str, resource: ObjectId) -> Vec<ObjectId> {
        let matches = |r: &ObjectRecord| r.type_tag == type_tag && r.bound_to == Some(resource);

        let mut ids: BTreeSet<ObjectId> = self
            .committed
            .values()
            .filter(|r| matches(r))
            .map(|r| r.id)
            .collect();
        for record in self.effects.written.values() {
            if matches(record) {
                ids.insert(record.id);
            } else {
                ids.remove(&record.id);
            }
        }
        ids.retain(|id| !self.effects.deleted.contains(id));
        ids.into_iter().collect()
    }

    // -----------------------------------------------------------------------
    // Object lifecycle
    // -----------------------------------------------------------------------

    /// Allocates a fresh object identity. The object it ends up in must be
    /// transferred, shared, or deleted before the transaction ends.
    pub fn new_uid(&mut self) -> Uid {
        let id = ObjectId::derive(&self.digest, self.ids_created);
        self.ids_created += 1;
        self.effects.created.insert(id);
        self.effects.unbound.insert(id);
        trace!(object = %id, "object id allocated");
        Uid::new(id)
    }

    /// Binds `object` to `recipient` and returns the owned handle.
    pub fn transfer<T: Key>(&mut self, object: T, recipient: Address) -> Owned<T> {
        self.write_record(&object, Owner::Address(recipient));
        trace!(object = %object.id(), %recipient, "object transferred");
        Owned::new(object, recipient)
    }

    /// Shares `object`. Only objects created in this transaction can be
    /// shared.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ShareExisting`] for an object created earlier.
    pub fn share<T: Key>(&mut self, object: T) -> Result<Shared<T>, LedgerError> {
        let id = object.id();
        if !self.effects.created.contains(&id) {
            return Err(LedgerError::ShareExisting(id));
        }
        self.write_record(&object, Owner::Shared);
        trace!(object = %id, "object shared");
        Ok(Shared::new(id, object, Arc::clone(self.journal)))
    }

    /// Takes an owned object out of its handle so it can be re-transferred
    /// or destroyed. Only the owner can do this.
    ///
    /// # Errors
    ///
    /// Whatever [`Owned::check`] reports.
    pub fn unwrap_owned<T: Key>(&mut self, owned: Owned<T>) -> Result<T, LedgerError> {
        owned.check(self)?;
        let object = owned.into_inner();
        self.effects.unbound.insert(object.id());
        Ok(object)
    }

    /// Takes a shared object back, for destruction. Requires that no other
    /// handle to it is alive.
    ///
    /// # Errors
    ///
    /// [`LedgerError::ObjectInUse`] if other handles exist.
    pub fn unshare<T: Key>(&mut self, shared: Shared<T>) -> Result<T, LedgerError> {
        let id = shared.id();
        let object = shared
            .try_into_inner()
            .map_err(|_| LedgerError::ObjectInUse(id))?;
        self.effects.unbound.insert(id);
        Ok(object)
    }

    /// Destroys an object identity.
    pub fn delete(&mut self, uid: Uid) {
        self.forget(uid.id());
    }

    /// Deletes an owned object without taking it out of its handle. Only the
    /// owner can do this. Once the deletion commits, [`Owned::check`] on the
    /// handle fails with `ObjectNotFound`; if the transaction aborts, the
    /// handle is as good as before.
    ///
    /// Objects that hold value should be unwrapped and destroyed instead.
    ///
    /// # Errors
    ///
    /// Whatever [`Owned::check`] reports.
    pub fn delete_owned<T: Key>(&mut self, owned: &Owned<T>) -> Result<(), LedgerError> {
        owned.check(self)?;
        self.forget(owned.id());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    /// Buffers an event. It is appended to the log only if the transaction
    /// commits.
    pub fn emit(
        &mut self,
        kind: &str,
        resource_id: ObjectId,
        capability_id: Option<ObjectId>,
        amounts: &[(&str, u64)],
    ) {
        let amounts: BTreeMap<String, u64> = amounts
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect();
        self.effects.events.push(Event {
            id: Uuid::new_v4(),
            tx_digest: self.digest,
            sender: self.sender,
            kind: kind.to_string(),
            resource_id,
            capability_id,
            amounts,
            timestamp: self.timestamp,
        });
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn forget(&mut self, id: ObjectId) {
        self.effects.unbound.remove(&id);
        self.effects.written.remove(&id);
        if !self.effects.created.remove(&id) {
            self.effects.deleted.insert(id);
        }
        trace!(object = %id, "object deleted");
    }

    fn write_record<T: Key>(&mut self, object: &T, owner: Owner) {
        let id = object.id();
        let (version, created_in) = match self.record(id) {
            Some(existing) => (existing.version + 1, existing.created_in),
            None => (1, self.digest),
        };
        let record = ObjectRecord {
            id,
            type_tag: T::type_tag().to_string(),
            owner,
            bound_to: object.bound_to(),
            version,
            created_in,
            updated_at: self.timestamp,
        };
        self.effects.unbound.remove(&id);
        self.effects.written.insert(id, record);
    }

    /// Consumes the context. Fails if any object was left unbound.
    pub(crate) fn into_effects(self) -> Result<Effects, LedgerError> {
        if !self.effects.unbound.is_empty() {
            return Err(LedgerError::UnboundObjects(
                self.effects.unbound.into_iter().collect(),
            ));
        }
        Ok(self.effects)
    }
}
