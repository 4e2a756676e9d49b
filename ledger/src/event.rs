//! # Event Log
//!
//! Append-only log of structured events, one per mutating operation.
//! Events are buffered in the transaction and appended only on commit, so an
//! aborted transaction never shows up here. The JSON form of [`Event`] is the
//! contract with off-chain indexers; keep field names stable.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::object::{Address, ObjectId, TxDigest};

/// A structured event emitted by a committed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event id.
    pub id: Uuid,
    /// Transaction that emitted the event.
    pub tx_digest: TxDigest,
    /// Sender of that transaction.
    pub sender: Address,
    /// Event kind, e.g. `"deposit"`. Chosen by the emitting contract.
    pub kind: String,
    /// The resource the event is about (vault, farm, balance manager).
    pub resource_id: ObjectId,
    /// The capability involved, if any.
    pub capability_id: Option<ObjectId>,
    /// Named amounts, e.g. `{"amount": 100, "fee": 3}`.
    pub amounts: BTreeMap<String, u64>,
    /// Transaction timestamp.
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Returns the named amount, or `None` if the event does not carry it.
    pub fn amount(&self, name: &str) -> Option<u64> {
        self.amounts.get(name).copied()
    }

    /// Serializes the event to a JSON line for indexers.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_keeps_schema() {
        let sender = Address::from_label("alice");
        let mut amounts = BTreeMap::new();
        amounts.insert("amount".to_string(), 42);
        let event = Event {
            id: Uuid::new_v4(),
            tx_digest: TxDigest::derive(7, &sender),
            sender,
            kind: "deposit".into(),
            resource_id: ObjectId::from_bytes([1; 32]),
            capability_id: None,
            amounts,
            timestamp: Utc::now(),
        };

        let json = event.to_json().unwrap();
        assert!(json.contains("\"kind\":\"deposit\""));
        assert!(json.contains("\"capability_id\":null"));

        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.amount("amount"), Some(42));
        assert_eq!(back.amount("fee"), None);
    }
}
