//! Event kinds emitted by the contracts.
//!
//! Each mutating operation emits exactly one ledger event
//! `{kind, resource_id, capability_id?, amounts}`. The kind strings are part
//! of the indexer contract.

use std::fmt;

use ferrum_ledger::{ObjectId, TxContext};
use serde::{Deserialize, Serialize};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    VaultCreated,
    VaultClosed,
    FarmCreated,
    CapabilityIssued,
    CapabilityBurned,
    CapabilityTransferred,
    Deposit,
    Withdraw,
    FeesSwept,
    FeeRateUpdated,
    CapitalAllocated,
    CapitalRecalled,
    TradeIn,
    TradeOut,
    Staked,
    Unstaked,
    FarmPauseChanged,
    RewardPolicyChanged,
}

impl EventKind {
    /// The wire name, identical to the serde representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::VaultCreated => "vault_created",
            EventKind::VaultClosed => "vault_closed",
            EventKind::FarmCreated => "farm_created",
            EventKind::CapabilityIssued => "capability_issued",
            EventKind::CapabilityBurned => "capability_burned",
            EventKind::CapabilityTransferred => "capability_transferred",
            EventKind::Deposit => "deposit",
            EventKind::Withdraw => "withdraw",
            EventKind::FeesSwept => "fees_swept",
            EventKind::FeeRateUpdated => "fee_rate_updated",
            EventKind::CapitalAllocated => "capital_allocated",
            EventKind::CapitalRecalled => "capital_recalled",
            EventKind::TradeIn => "trade_in",
            EventKind::TradeOut => "trade_out",
            EventKind::Staked => "staked",
            EventKind::Unstaked => "unstaked",
            EventKind::FarmPauseChanged => "farm_pause_changed",
            EventKind::RewardPolicyChanged => "reward_policy_changed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn emit(
    ctx: &mut TxContext<'_>,
    kind: EventKind,
    resource_id: ObjectId,
    capability_id: Option<ObjectId>,
    amounts: &[(&str, u64)],
) {
    ctx.emit(kind.as_str(), resource_id, capability_id, amounts);
}
