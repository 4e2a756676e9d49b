//! # Custodial Vault
//!
//! A [`Vault<A>`] holds a balance of exactly one asset type `A`. The asset is
//! a parameter of the vault's own type, so `deposit` only accepts a
//! `Coin<A>`; at the dynamic boundary, [`Vault::deposit_any`] rejects any
//! other coin with `TypeMismatch` before touching state.
//!
//! The lifecycle is:
//!
//! 1. **Create**: the vault, its balance manager, the bound `AdminCap` and
//!    the single `TradeCap` all come into existence in one transaction.
//! 2. **Deposit / Withdraw**: depositors move their own principal in and out.
//!    Withdrawals crystallise the performance fee (see [`crate::fees`]).
//! 3. **Operate**: the admin sweeps fees, allocates capital to trading,
//!    recalls it, and tunes the fee rate.
//! 4. **Close**: an empty vault is destroyed together with its balance
//!    manager and admin capability.
//!
//! Every operation validates fully before it mutates, so a failed call
//! leaves the vault unchanged. When a later step of the same transaction
//! fails, the ledger restores the vault from its [`Rollback`] checkpoint.
//! Calls that can be refused borrow the caller's capability, and a refused
//! [`Vault::close`] hands the vault handle back inside [`CloseRefused`].

use std::collections::HashMap;
use std::fmt;

use ferrum_ledger::{
    Address, AnyCoin, Asset, Balance, Coin, Key, LedgerError, ObjectId, Owned, Revert, Rollback,
    Shared, TxContext, TypeMismatch, Uid,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::balance_manager::{self, BalanceManager, BalanceManagerError};
use crate::capability::{self, AdminCap, CapabilityError, TradeCap};
use crate::config::{ConfigError, VaultConfig};
use crate::events::{self, EventKind};
use crate::fees::FeeAccrual;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// A coin of another asset was offered. The coin is inside.
    #[error(transparent)]
    TypeMismatch(#[from] TypeMismatch),

    /// The caller lacks the required capability or principal.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The vault's TradeCap was already minted.
    #[error("trade capability already issued for vault {0}")]
    AlreadyIssued(ObjectId),

    /// The vault does not hold enough liquid balance.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Amount the operation needs.
        requested: u64,
        /// Liquid balance.
        available: u64,
    },

    /// Zero-value deposits, withdrawals and transfers are rejected.
    #[error("amount must be non-zero")]
    ZeroAmount,

    /// Only an empty vault can be closed.
    #[error("vault not empty: balance {balance}, deployed {deployed}, accrued fees {accrued_fees}")]
    NotEmpty {
        /// Liquid balance.
        balance: u64,
        /// Capital in the balance manager.
        deployed: u64,
        /// Unswept fees.
        accrued_fees: u64,
    },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Underlying runtime failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<CapabilityError> for VaultError {
    fn from(err: CapabilityError) -> Self {
        match err {
            CapabilityError::Unauthorized(reason) => VaultError::Unauthorized(reason),
            CapabilityError::AlreadyIssued { resource, .. } => VaultError::AlreadyIssued(resource),
            CapabilityError::ResourceNotCommitted(id) => {
                VaultError::Ledger(LedgerError::ObjectNotFound(id))
            }
            CapabilityError::Ledger(err) => VaultError::Ledger(err),
        }
    }
}

/// A refused [`Vault::close`]. The vault handle rides back inside, so the
/// caller can fix the cause and retry.
#[derive(Error)]
#[error("vault close refused: {error}")]
pub struct CloseRefused<A: Asset> {
    /// Why the close was refused.
    #[source]
    pub error: VaultError,
    vault: Option<Shared<Vault<A>>>,
}

impl<A: Asset> CloseRefused<A> {
    /// Hands the vault handle back. `None` only when the ledger refused the
    /// transaction after the vault was already taken apart.
    pub fn into_vault(self) -> Option<Shared<Vault<A>>> {
        self.vault
    }
}

impl<A: Asset> From<LedgerError> for CloseRefused<A> {
    fn from(err: LedgerError) -> Self {
        Self {
            error: VaultError::Ledger(err),
            vault: None,
        }
    }
}

impl<A: Asset> fmt::Debug for CloseRefused<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloseRefused")
            .field("error", &self.error)
            .field("vault", &self.vault)
            .finish()
    }
}

impl From<BalanceManagerError> for VaultError {
    fn from(err: BalanceManagerError) -> Self {
        match err {
            BalanceManagerError::Unauthorized(reason) => VaultError::Unauthorized(reason),
            BalanceManagerError::AlreadyIssued(vault) => VaultError::AlreadyIssued(vault),
            BalanceManagerError::InsufficientBalance {
                requested,
                available,
            } => VaultError::InsufficientBalance {
                requested,
                available,
            },
            BalanceManagerError::Capability(err) => err.into(),
            BalanceManagerError::Ledger(err) => VaultError::Ledger(err),
        }
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How a withdrawal is authorized.
#[derive(Debug, Clone, Copy)]
pub enum Authorization<'a> {
    /// The sender withdraws from their own principal.
    Depositor,
    /// The vault admin withdraws any available amount.
    Admin(&'a Owned<AdminCap>),
}

/// Serializable point-in-time view of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultSnapshot {
    pub id: ObjectId,
    pub asset: String,
    pub balance: u64,
    pub deployed: u64,
    pub accrued_fees: u64,
    pub valuation: u64,
    pub high_water_mark: u64,
    pub performance_fee_bps: u64,
    pub trade_cap_issued: bool,
    pub balance_manager_id: ObjectId,
    pub depositors: usize,
}

/// A custodial vault over asset `A`.
pub struct Vault<A: Asset> {
    id: Uid,
    balance: Balance<A>,
    accrued_fees: Balance<A>,
    balance_manager: Shared<BalanceManager<A>>,
    trade_cap_issued: bool,
    accrual: FeeAccrual,
    positions: HashMap<Address, u64>,
}

impl<A: Asset> Key for Vault<A> {
    fn uid(&self) -> &Uid {
        &self.id
    }
}

/// Vault state as of a transaction's first lock on it.
pub struct VaultCheckpoint {
    balance: u64,
    accrued_fees: u64,
    trade_cap_issued: bool,
    accrual: FeeAccrual,
    positions: HashMap<Address, u64>,
}

impl<A: Asset> Rollback for Vault<A> {
    type Checkpoint = VaultCheckpoint;

    fn checkpoint(&self) -> VaultCheckpoint {
        VaultCheckpoint {
            balance: self.balance.checkpoint(),
            accrued_fees: self.accrued_fees.checkpoint(),
            trade_cap_issued: self.trade_cap_issued,
            accrual: self.accrual,
            positions: self.positions.clone(),
        }
    }

    fn rollback(&mut self, checkpoint: VaultCheckpoint, revert: &Revert) {
        self.balance.rollback(checkpoint.balance, revert);
        self.accrued_fees.rollback(checkpoint.accrued_fees, revert);
        self.trade_cap_issued = checkpoint.trade_cap_issued;
        self.accrual = checkpoint.accrual;
        self.positions = checkpoint.positions;
    }
}

impl<A: Asset> fmt::Debug for Vault<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault")
            .field("id", &self.id.id())
            .field("asset", &A::SYMBOL)
            .field("balance", &self.balance)
            .field("accrued_fees", &self.accrued_fees)
            .field("balance_manager", &self.balance_manager)
            .field("trade_cap_issued", &self.trade_cap_issued)
            .field("accrual", &self.accrual)
            .field("depositors", &self.positions.len())
            .finish()
    }
}

fn checked_credit(current: u64, credit: u64) -> Result<u64, VaultError> {
    current
        .checked_add(credit)
        .ok_or(VaultError::Ledger(LedgerError::Overflow { current, credit }))
}

fn ensure_available(requested: u64, available: u64) -> Result<(), VaultError> {
    if requested > available {
        return Err(VaultError::InsufficientBalance {
            requested,
            available,
        });
    }
    Ok(())
}

impl<A: Asset> Vault<A> {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Creates a vault owned by the transaction sender.
    ///
    /// Returns the shared vault, the sender's `AdminCap` and the vault's only
    /// `TradeCap`, both already bound to the sender. If any step fails the
    /// transaction aborts and nothing is created.
    ///
    /// # Errors
    ///
    /// `Config` for an invalid configuration; capability or runtime errors
    /// from the binding steps.
    pub fn create(
        config: &VaultConfig,
        ctx: &mut TxContext<'_>,
    ) -> Result<(Shared<Self>, Owned<AdminCap>, Owned<TradeCap>), VaultError> {
        config.validate()?;

        let owner = ctx.sender();
        let id = ctx.new_uid();
        let vault_id = id.id();

        let manager = BalanceManager::<A>::new(vault_id, ctx);
        let balance_manager = ctx.share(manager)?;

        let admin_cap = capability::issue::<AdminCap>(vault_id, owner, ctx)?;

        let mut vault = Self {
            id,
            balance: Balance::zero(),
            accrued_fees: Balance::zero(),
            balance_manager,
            trade_cap_issued: false,
            accrual: FeeAccrual::new(config.performance_fee_bps),
            positions: HashMap::new(),
        };
        let trade_cap = vault.issue_trade_cap(owner, ctx)?;

        events::emit(
            ctx,
            EventKind::VaultCreated,
            vault_id,
            Some(admin_cap.id()),
            &[("performance_fee_bps", config.performance_fee_bps)],
        );
        info!(
            vault = %vault_id,
            asset = A::SYMBOL,
            %owner,
            performance_fee_bps = config.performance_fee_bps,
            "vault created"
        );

        let vault = ctx.share(vault)?;
        Ok((vault, admin_cap, trade_cap))
    }

    fn issue_trade_cap(
        &mut self,
        recipient: Address,
        ctx: &mut TxContext<'_>,
    ) -> Result<Owned<TradeCap>, VaultError> {
        let vault_id = self.id.id();
        let manager = self.balance_manager.lock();
        let cap = balance_manager::mint_trade_cap(
            &mut self.trade_cap_issued,
            &manager,
            vault_id,
            recipient,
            ctx,
        )?;
        Ok(cap)
    }

    fn check_admin(&self, cap: &Owned<AdminCap>, ctx: &TxContext<'_>) -> Result<(), VaultError> {
        let cap = cap.check(ctx).map_err(capability::unauthorized)?;
        if cap.vault_id() != self.id() {
            return Err(VaultError::Unauthorized(format!(
                "admin capability governs {}, not {}",
                cap.vault_id(),
                self.id()
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Liquid balance.
    pub fn balance(&self) -> u64 {
        self.balance.value()
    }

    /// Fees accrued and not yet swept.
    pub fn accrued_fees(&self) -> u64 {
        self.accrued_fees.value()
    }

    /// Capital held by the balance manager.
    pub fn deployed(&self) -> u64 {
        self.balance_manager.lock().balance()
    }

    /// Liquid balance plus deployed capital. Accrued fees are excluded.
    ///
    /// # Errors
    ///
    /// `Ledger(Overflow)` if the sum exceeds `u64::MAX`.
    pub fn valuation(&self) -> Result<u64, VaultError> {
        checked_credit(self.balance(), self.deployed())
    }

    /// Principal `account` may withdraw as a depositor.
    pub fn position_of(&self, account: &Address) -> u64 {
        self.positions.get(account).copied().unwrap_or(0)
    }

    /// Whether the vault's single `TradeCap` has been minted.
    pub fn trade_cap_issued(&self) -> bool {
        self.trade_cap_issued
    }

    /// Performance fee rate in basis points.
    pub fn performance_fee_bps(&self) -> u64 {
        self.accrual.rate_bps()
    }

    /// Valuation below which no profit is charged.
    pub fn high_water_mark(&self) -> u64 {
        self.accrual.high_water_mark()
    }

    /// Handle to the vault's balance manager.
    pub fn balance_manager(&self) -> Shared<BalanceManager<A>> {
        self.balance_manager.clone()
    }

    /// Point-in-time view for logs and indexers.
    ///
    /// # Errors
    ///
    /// `Ledger(Overflow)` if the valuation exceeds `u64::MAX`.
    pub fn snapshot(&self) -> Result<VaultSnapshot, VaultError> {
        let deployed = self.deployed();
        Ok(VaultSnapshot {
            id: self.id(),
            asset: A::SYMBOL.to_string(),
            balance: self.balance(),
            deployed,
            accrued_fees: self.accrued_fees(),
            valuation: checked_credit(self.balance(), deployed)?,
            high_water_mark: self.high_water_mark(),
            performance_fee_bps: self.performance_fee_bps(),
            trade_cap_issued: self.trade_cap_issued,
            balance_manager_id: self.balance_manager.id(),
            depositors: self.positions.len(),
        })
    }

    // -----------------------------------------------------------------------
    // Depositor operations
    // -----------------------------------------------------------------------

    /// Deposits `coin` and credits it to the sender's principal. Returns the
    /// new balance.
    ///
    /// # Errors
    ///
    /// `ZeroAmount` for an empty coin, `Ledger(Overflow)` if a total would
    /// overflow.
    pub fn deposit(&mut self, coin: Coin<A>, ctx: &mut TxContext<'_>) -> Result<u64, VaultError> {
        let amount = coin.value();
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }
        let depositor = ctx.sender();
        let position = checked_credit(self.position_of(&depositor), amount)?;
        checked_credit(self.balance.value(), amount)?;

        let balance = self.balance.join(coin.into_balance())?;
        self.positions.insert(depositor, position);
        self.accrual.record_deposit(amount);

        events::emit(
            ctx,
            EventKind::Deposit,
            self.id(),
            None,
            &[("amount", amount), ("balance", balance)],
        );
        debug!(vault = %self.id(), %depositor, amount, balance, "deposit");
        Ok(balance)
    }

    /// Deposits a coin whose type is only known at runtime.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if the coin is not an `A`; the coin is returned inside
    /// the error and the vault is untouched.
    pub fn deposit_any(&mut self, coin: AnyCoin, ctx: &mut TxContext<'_>) -> Result<u64, VaultError> {
        let coin = coin.downcast::<A>()?;
        self.deposit(coin, ctx)
    }

    /// Withdraws `amount`, charging the performance fee on profit above the
    /// high-water-mark. Pays out `amount` minus the caller's share of the fee.
    ///
    /// # Errors
    ///
    /// - `ZeroAmount` for zero.
    /// - `Unauthorized` when a depositor asks for more than their principal,
    ///   or the admin capability does not govern this vault.
    /// - `InsufficientBalance` when the liquid balance cannot cover the
    ///   payout and the fee.
    pub fn withdraw(
        &mut self,
        amount: u64,
        authorization: Authorization<'_>,
        ctx: &mut TxContext<'_>,
    ) -> Result<Coin<A>, VaultError> {
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }

        let sender = ctx.sender();
        // Only a depositor's own withdrawal draws down principal.
        let (capability_id, remaining) = match authorization {
            Authorization::Depositor => {
                let position = self.position_of(&sender);
                if amount > position {
                    return Err(VaultError::Unauthorized(format!(
                        "{sender} may withdraw at most its principal of {position}"
                    )));
                }
                (None, Some(position - amount))
            }
            Authorization::Admin(cap) => {
                self.check_admin(cap, ctx)?;
                (Some(cap.id()), None)
            }
        };
        ensure_available(amount, self.balance.value())?;

        let quote = self.accrual.preview_withdrawal(self.valuation()?, amount);
        let required = checked_credit(quote.fee, quote.net)?;
        ensure_available(required, self.balance.value())?;
        checked_credit(self.accrued_fees.value(), quote.fee)?;

        let fee = self.balance.split(quote.fee)?;
        self.accrued_fees.join(fee)?;
        let payout = self.balance.split(quote.net)?;
        self.accrual.apply(&quote);
        match remaining {
            Some(0) => {
                self.positions.remove(&sender);
            }
            Some(remaining) => {
                self.positions.insert(sender, remaining);
            }
            None => {}
        }

        events::emit(
            ctx,
            EventKind::Withdraw,
            self.id(),
            capability_id,
            &[
                ("amount", amount),
                ("fee", quote.fee),
                ("fee_attributable", quote.fee_attributable),
                ("net", quote.net),
                ("balance", self.balance.value()),
            ],
        );
        debug!(
            vault = %self.id(),
            %sender,
            amount,
            profit = quote.profit,
            fee = quote.fee,
            net = quote.net,
            "withdraw"
        );
        Ok(payout.into_coin())
    }

    // -----------------------------------------------------------------------
    // Admin operations
    // -----------------------------------------------------------------------

    /// Pays every accrued fee to the admin and resets accrued fees to zero.
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless the sender holds the `AdminCap` of this vault.
    pub fn sweep_fees(
        &mut self,
        cap: &Owned<AdminCap>,
        ctx: &mut TxContext<'_>,
    ) -> Result<Coin<A>, VaultError> {
        self.check_admin(cap, ctx)?;

        let fees = self.accrued_fees.withdraw_all();
        let amount = fees.value();
        events::emit(
            ctx,
            EventKind::FeesSwept,
            self.id(),
            Some(cap.id()),
            &[("amount", amount)],
        );
        info!(vault = %self.id(), amount, admin = %ctx.sender(), "fees swept");
        Ok(fees.into_coin())
    }

    /// The guarded adapter entry. The TradeCap is minted during
    /// [`create`](Self::create), so this fails `AlreadyIssued` for every
    /// vault that exists.
    ///
    /// # Errors
    ///
    /// `Unauthorized` without this vault's `AdminCap`, else `AlreadyIssued`.
    pub fn mint_trade_cap(
        &mut self,
        cap: &Owned<AdminCap>,
        ctx: &mut TxContext<'_>,
    ) -> Result<Owned<TradeCap>, VaultError> {
        self.check_admin(cap, ctx)?;
        self.issue_trade_cap(ctx.sender(), ctx)
    }

    /// Moves `amount` of liquid balance into the balance manager.
    pub fn allocate(
        &mut self,
        cap: &Owned<AdminCap>,
        amount: u64,
        ctx: &mut TxContext<'_>,
    ) -> Result<u64, VaultError> {
        self.check_admin(cap, ctx)?;
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }
        ensure_available(amount, self.balance.value())?;

        let vault_id = self.id();
        let deployed = {
            let mut manager = self.balance_manager.lock();
            manager.ensure_owner(vault_id)?;
            checked_credit(manager.balance(), amount)?;
            let capital = self.balance.split(amount)?;
            manager.deposit_from_owner(vault_id, capital)?
        };

        events::emit(
            ctx,
            EventKind::CapitalAllocated,
            vault_id,
            Some(cap.id()),
            &[("amount", amount), ("deployed", deployed)],
        );
        debug!(vault = %vault_id, amount, deployed, "capital allocated");
        Ok(deployed)
    }

    /// Moves `amount` of deployed capital back into the vault.
    pub fn recall(
        &mut self,
        cap: &Owned<AdminCap>,
        amount: u64,
        ctx: &mut TxContext<'_>,
    ) -> Result<u64, VaultError> {
        self.check_admin(cap, ctx)?;
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }
        checked_credit(self.balance.value(), amount)?;

        let vault_id = self.id();
        let capital = self.balance_manager.lock().withdraw_to_owner(vault_id, amount)?;
        let balance = self.balance.join(capital)?;

        events::emit(
            ctx,
            EventKind::CapitalRecalled,
            vault_id,
            Some(cap.id()),
            &[("amount", amount), ("balance", balance)],
        );
        debug!(vault = %vault_id, amount, balance, "capital recalled");
        Ok(balance)
    }

    /// Changes the performance fee rate.
    ///
    /// # Errors
    ///
    /// `Config(FeeRateTooHigh)` above the maximum rate.
    pub fn set_performance_fee(
        &mut self,
        cap: &Owned<AdminCap>,
        rate_bps: u64,
        ctx: &mut TxContext<'_>,
    ) -> Result<(), VaultError> {
        self.check_admin(cap, ctx)?;
        VaultConfig::with_performance_fee(rate_bps).validate()?;

        let previous = self.accrual.rate_bps();
        self.accrual.set_rate(rate_bps);
        events::emit(
            ctx,
            EventKind::FeeRateUpdated,
            self.id(),
            Some(cap.id()),
            &[("previous_bps", previous), ("rate_bps", rate_bps)],
        );
        info!(vault = %self.id(), previous, rate_bps, "performance fee updated");
        Ok(())
    }

    /// Replaces the admin capability with a fresh one held by `new_owner`.
    /// The old capability is burned in the same transaction; its handle goes
    /// stale once the rotation commits.
    ///
    /// # Errors
    ///
    /// `Unauthorized` unless `cap` is this vault's and held by the sender.
    /// The handle stays usable after a refusal.
    pub fn rotate_admin(
        &self,
        cap: &Owned<AdminCap>,
        new_owner: Address,
        ctx: &mut TxContext<'_>,
    ) -> Result<Owned<AdminCap>, VaultError> {
        self.check_admin(cap, ctx)?;
        let rotated = capability::rotate(cap, new_owner, ctx)?;
        info!(vault = %self.id(), %new_owner, cap = %rotated.id(), "admin rotated");
        Ok(rotated)
    }

    /// Destroys an empty vault, its balance manager and the admin capability.
    ///
    /// `vault` must be the last handle to the vault, and the vault's handle
    /// must be the last one to its balance manager. Every check runs before
    /// anything is taken apart. A destroyed vault cannot be restored, so
    /// close last if a later step in the transaction could still fail.
    ///
    /// # Errors
    ///
    /// `Unauthorized` without the admin capability, `NotEmpty` while any
    /// value remains, `Ledger(ObjectInUse)` if other handles are alive. The
    /// vault handle comes back inside the error and `cap` stays usable.
    pub fn close(
        vault: Shared<Self>,
        cap: &Owned<AdminCap>,
        ctx: &mut TxContext<'_>,
    ) -> Result<(), CloseRefused<A>> {
        if let Err(error) = Self::check_closable(&vault, cap, ctx) {
            return Err(CloseRefused {
                error,
                vault: Some(vault),
            });
        }
        Self::dismantle(vault, cap, ctx).map_err(|error| CloseRefused { error, vault: None })
    }

    fn check_closable(
        vault: &Shared<Self>,
        cap: &Owned<AdminCap>,
        ctx: &TxContext<'_>,
    ) -> Result<(), VaultError> {
        let guard = vault.lock();
        guard.check_admin(cap, ctx)?;
        let (balance, deployed, accrued_fees) =
            (guard.balance(), guard.deployed(), guard.accrued_fees());
        if balance != 0 || deployed != 0 || accrued_fees != 0 {
            return Err(VaultError::NotEmpty {
                balance,
                deployed,
                accrued_fees,
            });
        }
        if vault.handle_count() > 1 {
            return Err(LedgerError::ObjectInUse(vault.id()).into());
        }
        if guard.balance_manager.handle_count() > 1 {
            return Err(LedgerError::ObjectInUse(guard.balance_manager.id()).into());
        }
        Ok(())
    }

    fn dismantle(
        vault: Shared<Self>,
        cap: &Owned<AdminCap>,
        ctx: &mut TxContext<'_>,
    ) -> Result<(), VaultError> {
        let vault = ctx.unshare(vault)?;
        let vault_id = vault.id();
        let Self {
            id,
            balance,
            accrued_fees,
            balance_manager,
            ..
        } = vault;

        let manager = ctx.unshare(balance_manager)?;
        manager.destroy(ctx)?;
        balance.destroy_zero()?;
        accrued_fees.destroy_zero()?;
        AdminCap::burn(cap, ctx)?;
        ctx.delete(id);

        events::emit(ctx, EventKind::VaultClosed, vault_id, Some(cap.id()), &[]);
        info!(vault = %vault_id, "vault closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrum_ledger::{Ledger, Supply, Usdc};

    fn owner() -> Address {
        Address::from_label("owner")
    }

    fn setup(ledger: &Ledger) -> (Shared<Vault<Usdc>>, Owned<AdminCap>, Owned<TradeCap>) {
        ledger
            .execute(owner(), |ctx| Vault::<Usdc>::create(&VaultConfig::default(), ctx))
            .unwrap()
    }

    #[test]
    fn create_binds_everything_to_sender() {
        let ledger = Ledger::new();
        let (vault, admin, trade) = setup(&ledger);

        let guard = vault.lock();
        assert!(guard.trade_cap_issued());
        assert_eq!(guard.balance(), 0);
        assert_eq!(admin.object().vault_id(), vault.id());
        assert_eq!(trade.object().balance_manager_id(), guard.balance_manager().id());
        assert_eq!(admin.owner(), owner());
        assert_eq!(trade.owner(), owner());
        // vault, balance manager, admin cap, trade cap
        assert_eq!(ledger.object_count(), 4);
    }

    #[test]
    fn depositor_limited_to_principal() {
        let ledger = Ledger::new();
        let (vault, _admin, _trade) = setup(&ledger);
        let mut supply = Supply::<Usdc>::new();
        let alice = Address::from_label("alice");

        let coin = supply.mint(1_000).unwrap();
        ledger
            .execute(alice, |ctx| vault.lock().deposit(coin, ctx))
            .unwrap();

        let bob = Address::from_label("bob");
        let result = ledger.execute(bob, |ctx| {
            vault.lock().withdraw(1, Authorization::Depositor, ctx)
        });
        assert!(matches!(result, Err(VaultError::Unauthorized(_))));

        let result = ledger.execute(alice, |ctx| {
            vault.lock().withdraw(1_001, Authorization::Depositor, ctx)
        });
        assert!(matches!(result, Err(VaultError::Unauthorized(_))));
        assert_eq!(vault.lock().balance(), 1_000);
        assert_eq!(vault.lock().position_of(&alice), 1_000);
    }

    #[test]
    fn zero_amounts_rejected() {
        let ledger = Ledger::new();
        let (vault, _admin, _trade) = setup(&ledger);

        let result = ledger.execute(owner(), |ctx| vault.lock().deposit(Coin::zero(), ctx));
        assert!(matches!(result, Err(VaultError::ZeroAmount)));

        let result = ledger.execute(owner(), |ctx| {
            vault.lock().withdraw(0, Authorization::Depositor, ctx)
        });
        assert!(matches!(result, Err(VaultError::ZeroAmount)));
    }

    #[test]
    fn allocate_and_recall_keep_valuation() {
        let ledger = Ledger::new();
        let (vault, admin, _trade) = setup(&ledger);
        let mut supply = Supply::<Usdc>::new();

        let coin = supply.mint(10_000).unwrap();
        ledger
            .execute(owner(), |ctx| vault.lock().deposit(coin, ctx))
            .unwrap();

        ledger
            .execute(owner(), |ctx| vault.lock().allocate(&admin, 4_000, ctx))
            .unwrap();
        {
            let guard = vault.lock();
            assert_eq!(guard.balance(), 6_000);
            assert_eq!(guard.deployed(), 4_000);
            assert_eq!(guard.valuation().unwrap(), 10_000);
        }

        let result = ledger.execute(owner(), |ctx| vault.lock().recall(&admin, 5_000, ctx));
        assert!(matches!(
            result,
            Err(VaultError::InsufficientBalance {
                requested: 5_000,
                available: 4_000
            })
        ));

        ledger
            .execute(owner(), |ctx| vault.lock().recall(&admin, 4_000, ctx))
            .unwrap();
        assert_eq!(vault.lock().deployed(), 0);
        assert_eq!(vault.lock().balance(), 10_000);
    }

    #[test]
    fn fee_rate_bounded() {
        let ledger = Ledger::new();
        let (vault, admin, _trade) = setup(&ledger);

        let result = ledger.execute(owner(), |ctx| {
            vault.lock().set_performance_fee(&admin, 5_001, ctx)
        });
        assert!(matches!(
            result,
            Err(VaultError::Config(ConfigError::FeeRateTooHigh { .. }))
        ));

        ledger
            .execute(owner(), |ctx| vault.lock().set_performance_fee(&admin, 2_000, ctx))
            .unwrap();
        assert_eq!(vault.lock().performance_fee_bps(), 2_000);
    }

    #[test]
    fn snapshot_serializes() {
        let ledger = Ledger::new();
        let (vault, _admin, _trade) = setup(&ledger);

        let snapshot = vault.lock().snapshot().unwrap();
        assert_eq!(snapshot.asset, "USDC");
        assert!(snapshot.trade_cap_issued);

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: VaultSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
