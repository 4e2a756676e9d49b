//! # Yield Farm
//!
//! A [`Farm<LP>`] holds staked LP balances under the same capability
//! discipline as the vault: the farm and its [`FarmCap`] are created in one
//! transaction and the capability is bound to the creator before anything is
//! returned.
//!
//! Reward accrual is delegated to a [`RewardPolicy`], which is notified of
//! every stake and unstake. The farm ships [`NoRewards`]; real reward curves
//! plug in from outside.

use std::collections::HashMap;
use std::fmt;

use ferrum_ledger::{
    Address, AnyCoin, Asset, Balance, Coin, Key, LedgerError, ObjectId, Owned, Revert, Rollback,
    Shared, TxContext, TypeMismatch, Uid,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::capability::{self, CapabilityError, FarmCap};
use crate::events::{self, EventKind};

/// Errors that can occur during farm operations.
#[derive(Debug, Error)]
pub enum FarmError {
    /// A coin of another asset was offered. The coin is inside.
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatch),

    /// The caller does not hold this farm's capability.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The farm already has a live capability.
    #[error("farm capability already issued for farm {0}")]
    AlreadyIssued(ObjectId),

    /// Unstaking more than the caller's stake.
    #[error("insufficient stake: requested {requested}, staked {staked}")]
    InsufficientStake {
        /// Amount asked for.
        requested: u64,
        /// The caller's stake.
        staked: u64,
    },

    /// Zero-value stakes and unstakes are rejected.
    #[error("amount must be non-zero")]
    ZeroAmount,

    /// Staking is suspended.
    #[error("farm {0} is paused")]
    Paused(ObjectId),

    /// Underlying runtime failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<CapabilityError> for FarmError {
    fn from(err: CapabilityError) -> Self {
        match err {
            CapabilityError::Unauthorized(reason) => FarmError::Unauthorized(reason),
            CapabilityError::AlreadyIssued { resource, .. } => FarmError::AlreadyIssued(resource),
            CapabilityError::ResourceNotCommitted(id) => {
                FarmError::Ledger(LedgerError::ObjectNotFound(id))
            }
            CapabilityError::Ledger(err) => FarmError::Ledger(err),
        }
    }
}

// ---------------------------------------------------------------------------
// Reward policy
// ---------------------------------------------------------------------------

/// Reward accrual strategy, notified after every stake movement.
///
/// `total_staked` is the farm total after the movement. A policy is copied
/// with [`clone_box`](Self::clone_box) when a transaction first touches its
/// farm, and the copy is put back if the transaction aborts.
pub trait RewardPolicy: Send + fmt::Debug {
    /// Short name for logs and events.
    fn name(&self) -> &str;

    fn clone_box(&self) -> Box<dyn RewardPolicy>;

    fn on_stake(&mut self, staker: Address, amount: u64, total_staked: u64);

    fn on_unstake(&mut self, staker: Address, amount: u64, total_staked: u64);
}

/// Accrues nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRewards;

impl RewardPolicy for NoRewards {
    fn name(&self) -> &str {
        "none"
    }

    fn clone_box(&self) -> Box<dyn RewardPolicy> {
        Box::new(*self)
    }

    fn on_stake(&mut self, _staker: Address, _amount: u64, _total_staked: u64) {}

    fn on_unstake(&mut self, _staker: Address, _amount: u64, _total_staked: u64) {}
}

// ---------------------------------------------------------------------------
// Farm
// ---------------------------------------------------------------------------

/// A staking pool over LP token `LP`.
pub struct Farm<LP: Asset> {
    id: Uid,
    staked: Balance<LP>,
    stakes: HashMap<Address, u64>,
    cap_id: ObjectId,
    paused: bool,
    policy: Box<dyn RewardPolicy>,
}

impl<LP: Asset> Key for Farm<LP> {
    fn uid(&self) -> &Uid {
        &self.id
    }
}

/// Farm state as of a transaction's first lock on it.
pub struct FarmCheckpoint {
    staked: u64,
    stakes: HashMap<Address, u64>,
    cap_id: ObjectId,
    paused: bool,
    policy: Box<dyn RewardPolicy>,
}

impl<LP: Asset> Rollback for Farm<LP> {
    type Checkpoint = FarmCheckpoint;

    fn checkpoint(&self) -> FarmCheckpoint {
        FarmCheckpoint {
            staked: self.staked.checkpoint(),
            stakes: self.stakes.clone(),
            cap_id: self.cap_id,
            paused: self.paused,
            policy: self.policy.clone_box(),
        }
    }

    fn rollback(&mut self, checkpoint: FarmCheckpoint, revert: &Revert) {
        self.staked.rollback(checkpoint.staked, revert);
        self.stakes = checkpoint.stakes;
        self.cap_id = checkpoint.cap_id;
        self.paused = checkpoint.paused;
        self.policy = checkpoint.policy;
    }
}

impl<LP: Asset> fmt::Debug for Farm<LP> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Farm")
            .field("id", &self.id.id())
            .field("staked", &self.staked)
            .field("stakers", &self.stakes.len())
            .field("cap_id", &self.cap_id)
            .field("paused", &self.paused)
            .field("policy", &self.policy)
            .finish()
    }
}

impl<LP: Asset> Farm<LP> {
    /// Creates a farm without rewards, owned by the transaction sender.
    pub fn create(ctx: &mut TxContext<'_>) -> Result<(Shared<Self>, Owned<FarmCap>), FarmError> {
        Self::create_with_policy(Box::new(NoRewards), ctx)
    }

    /// Creates a farm with the given reward policy. The `FarmCap` is bound
    /// to the sender in the same transaction.
    pub fn create_with_policy(
        policy: Box<dyn RewardPolicy>,
        ctx: &mut TxContext<'_>,
    ) -> Result<(Shared<Self>, Owned<FarmCap>), FarmError> {
        let owner = ctx.sender();
        let id = ctx.new_uid();
        let farm_id = id.id();

        let cap = capability::issue::<FarmCap>(farm_id, owner, ctx)?;
        let farm = Self {
            id,
            staked: Balance::zero(),
            stakes: HashMap::new(),
            cap_id: cap.id(),
            paused: false,
            policy,
        };

        events::emit(ctx, EventKind::FarmCreated, farm_id, Some(cap.id()), &[]);
        info!(
            farm = %farm_id,
            lp = LP::type_tag(),
            %owner,
            policy = farm.policy.name(),
            "farm created"
        );

        let farm = ctx.share(farm)?;
        Ok((farm, cap))
    }

    fn check_cap(&self, cap: &Owned<FarmCap>, ctx: &TxContext<'_>) -> Result<(), FarmError> {
        let cap = cap.check(ctx).map_err(capability::unauthorized)?;
        if cap.farm_id() != self.id() || cap.id() != self.cap_id {
            return Err(FarmError::Unauthorized(format!(
                "farm capability {} does not govern farm {}",
                cap.id(),
                self.id()
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Sum of every stake.
    pub fn total_staked(&self) -> u64 {
        self.staked.value()
    }

    /// Amount `account` has staked.
    pub fn stake_of(&self, account: &Address) -> u64 {
        self.stakes.get(account).copied().unwrap_or(0)
    }

    /// Whether staking is suspended.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Id of the live `FarmCap`.
    pub fn cap_id(&self) -> ObjectId {
        self.cap_id
    }

    /// The installed reward policy.
    pub fn policy(&self) -> &dyn RewardPolicy {
        self.policy.as_ref()
    }

    // -----------------------------------------------------------------------
    // Staking
    // -----------------------------------------------------------------------

    /// Stakes `coin` for the sender. Returns the sender's new stake.
    ///
    /// # Errors
    ///
    /// `Paused` while staking is suspended, `ZeroAmount` for an empty coin.
    pub fn stake(&mut self, coin: Coin<LP>, ctx: &mut TxContext<'_>) -> Result<u64, FarmError> {
        if self.paused {
            return Err(FarmError::Paused(self.id()));
        }
        let amount = coin.value();
        if amount == 0 {
            return Err(FarmError::ZeroAmount);
        }
        let staker = ctx.sender();
        let current = self.stake_of(&staker);
        let stake = current.checked_add(amount).ok_or(LedgerError::Overflow {
            current,
            credit: amount,
        })?;
        let total = self
            .staked
            .value()
            .checked_add(amount)
            .ok_or(LedgerError::Overflow {
                current: self.staked.value(),
                credit: amount,
            })?;

        self.staked.join(coin.into_balance())?;
        self.stakes.insert(staker, stake);
        self.policy.on_stake(staker, amount, total);

        events::emit(
            ctx,
            EventKind::Staked,
            self.id(),
            None,
            &[("amount", amount), ("stake", stake), ("total_staked", total)],
        );
        debug!(farm = %self.id(), %staker, amount, total, "staked");
        Ok(stake)
    }

    /// Stakes a coin whose type is only known at runtime.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if the coin is not an `LP`; the coin comes back inside
    /// the error.
    pub fn stake_any(&mut self, coin: AnyCoin, ctx: &mut TxContext<'_>) -> Result<u64, FarmError> {
        let coin = coin.downcast::<LP>()?;
        self.stake(coin, ctx)
    }

    /// Returns `amount` of the sender's own stake. Allowed while paused.
    ///
    /// # Errors
    ///
    /// `ZeroAmount` for zero, `InsufficientStake` above the sender's stake.
    pub fn unstake(&mut self, amount: u64, ctx: &mut TxContext<'_>) -> Result<Coin<LP>, FarmError> {
        if amount == 0 {
            return Err(FarmError::ZeroAmount);
        }
        let staker = ctx.sender();
        let staked = self.stake_of(&staker);
        if amount > staked {
            return Err(FarmError::InsufficientStake {
                requested: amount,
                staked,
            });
        }

        let out = self.staked.split(amount)?;
        let remaining = staked - amount;
        if remaining == 0 {
            self.stakes.remove(&staker);
        } else {
            self.stakes.insert(staker, remaining);
        }
        let total = self.staked.value();
        self.policy.on_unstake(staker, amount, total);

        events::emit(
            ctx,
            EventKind::Unstaked,
            self.id(),
            None,
            &[("amount", amount), ("stake", remaining), ("total_staked", total)],
        );
        debug!(farm = %self.id(), %staker, amount, total, "unstaked");
        Ok(out.into_coin())
    }

    // -----------------------------------------------------------------------
    // FarmCap-gated administration
    // -----------------------------------------------------------------------

    /// Suspends or resumes staking.
    pub fn set_paused(
        &mut self,
        cap: &Owned<FarmCap>,
        paused: bool,
        ctx: &mut TxContext<'_>,
    ) -> Result<(), FarmError> {
        self.check_cap(cap, ctx)?;
        self.paused = paused;
        events::emit(
            ctx,
            EventKind::FarmPauseChanged,
            self.id(),
            Some(cap.id()),
            &[("paused", u64::from(paused))],
        );
        info!(farm = %self.id(), paused, "farm pause changed");
        Ok(())
    }

    /// Swaps the reward policy. The previous policy is returned.
    pub fn set_reward_policy(
        &mut self,
        cap: &Owned<FarmCap>,
        policy: Box<dyn RewardPolicy>,
        ctx: &mut TxContext<'_>,
    ) -> Result<Box<dyn RewardPolicy>, FarmError> {
        self.check_cap(cap, ctx)?;
        let previous = std::mem::replace(&mut self.policy, policy);
        events::emit(
            ctx,
            EventKind::RewardPolicyChanged,
            self.id(),
            Some(cap.id()),
            &[],
        );
        info!(
            farm = %self.id(),
            from = previous.name(),
            to = self.policy.name(),
            "reward policy changed"
        );
        Ok(previous)
    }

    /// Burns `cap` and binds a fresh `FarmCap` to `new_owner`. The old handle
    /// goes stale once the rotation commits.
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless `cap` is this farm's and held by the sender.
    /// The handle stays usable after a refusal.
    pub fn rotate_cap(
        &mut self,
        cap: &Owned<FarmCap>,
        new_owner: Address,
        ctx: &mut TxContext<'_>,
    ) -> Result<Owned<FarmCap>, FarmError> {
        self.check_cap(cap, ctx)?;
        let rotated = capability::rotate(cap, new_owner, ctx)?;
        self.cap_id = rotated.id();
        info!(farm = %self.id(), %new_owner, cap = %rotated.id(), "farm capability rotated");
        Ok(rotated)
    }
}
