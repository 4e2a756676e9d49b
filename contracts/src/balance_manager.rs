//! # Balance Manager
//!
//! The shared trading balance a vault deploys capital into. A balance
//! manager belongs to exactly one vault; the vault moves capital in and out
//! directly, and trading is delegated through a single [`TradeCap`].
//!
//! ## Adapter Contract
//!
//! [`mint_trade_cap`] is the only path that mints a `TradeCap`. It consults
//! the owning vault's `trade_cap_issued` flag before minting and sets it
//! afterwards, so a vault can mint at most one over its lifetime. The
//! manager also refuses any vault id other than its owner.

use ferrum_ledger::{
    Address, Asset, Balance, Coin, Key, LedgerError, ObjectId, Owned, Revert, Rollback, TxContext,
    Uid,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::capability::{self, CapabilityError, TradeCap};
use crate::events::{self, EventKind};

/// Errors raised by the balance manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceManagerError {
    /// Caller is not the owning vault, or does not hold the TradeCap.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The vault already minted its TradeCap.
    #[error("trade capability already issued for vault {0}")]
    AlreadyIssued(ObjectId),

    /// Not enough deployed capital.
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Amount asked for.
        requested: u64,
        /// Amount held.
        available: u64,
    },

    /// Capability issuance failed.
    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Underlying runtime failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A trading balance owned by one vault.
pub struct BalanceManager<A: Asset> {
    id: Uid,
    owner: ObjectId,
    balance: Balance<A>,
}

impl<A: Asset> Key for BalanceManager<A> {
    fn uid(&self) -> &Uid {
        &self.id
    }
}

impl<A: Asset> Rollback for BalanceManager<A> {
    type Checkpoint = u64;

    fn checkpoint(&self) -> u64 {
        self.balance.checkpoint()
    }

    fn rollback(&mut self, checkpoint: u64, revert: &Revert) {
        self.balance.rollback(checkpoint, revert);
    }
}

impl<A: Asset> std::fmt::Debug for BalanceManager<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BalanceManager")
            .field("id", &self.id.id())
            .field("owner", &self.owner)
            .field("balance", &self.balance)
            .finish()
    }
}

impl<A: Asset> BalanceManager<A> {
    /// An empty balance manager owned by `owner`. The caller shares it.
    pub(crate) fn new(owner: ObjectId, ctx: &mut TxContext<'_>) -> Self {
        Self {
            id: ctx.new_uid(),
            owner,
            balance: Balance::zero(),
        }
    }

    /// Id of the owning vault.
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    /// Deployed capital.
    pub fn balance(&self) -> u64 {
        self.balance.value()
    }

    /// Fails unless `vault_id` is the owning vault.
    pub fn ensure_owner(&self, vault_id: ObjectId) -> Result<(), BalanceManagerError> {
        if vault_id != self.owner {
            return Err(BalanceManagerError::Unauthorized(format!(
                "vault {} does not own balance manager {}",
                vault_id,
                self.id()
            )));
        }
        Ok(())
    }

    fn ensure_available(&self, amount: u64) -> Result<(), BalanceManagerError> {
        if amount > self.balance.value() {
            return Err(BalanceManagerError::InsufficientBalance {
                requested: amount,
                available: self.balance.value(),
            });
        }
        Ok(())
    }

    fn check_trade_cap(
        &self,
        cap: &Owned<TradeCap>,
        ctx: &TxContext<'_>,
    ) -> Result<(), BalanceManagerError> {
        let cap = cap.check(ctx).map_err(capability::unauthorized)?;
        if cap.balance_manager_id() != self.id() {
            return Err(BalanceManagerError::Unauthorized(format!(
                "trade capability is bound to {}, not {}",
                cap.balance_manager_id(),
                self.id()
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Owner-vault capital movements
    // -----------------------------------------------------------------------

    pub(crate) fn deposit_from_owner(
        &mut self,
        vault_id: ObjectId,
        capital: Balance<A>,
    ) -> Result<u64, BalanceManagerError> {
        self.ensure_owner(vault_id)?;
        let total = self.balance.join(capital)?;
        Ok(total)
    }

    pub(crate) fn withdraw_to_owner(
        &mut self,
        vault_id: ObjectId,
        amount: u64,
    ) -> Result<Balance<A>, BalanceManagerError> {
        self.ensure_owner(vault_id)?;
        self.ensure_available(amount)?;
        Ok(self.balance.split(amount)?)
    }

    /// Destroys an empty manager.
    pub(crate) fn destroy(self, ctx: &mut TxContext<'_>) -> Result<(), BalanceManagerError> {
        let Self { id, balance, .. } = self;
        balance.destroy_zero()?;
        ctx.delete(id);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // TradeCap-gated fills
    // -----------------------------------------------------------------------

    /// Pays `amount` out to the trader, modelling capital sent to the
    /// market.
    ///
    /// # Errors
    ///
    /// `Unauthorized` without the bound TradeCap, `InsufficientBalance` if
    /// the manager holds less than `amount`.
    pub fn trade_out(
        &mut self,
        cap: &Owned<TradeCap>,
        amount: u64,
        ctx: &mut TxContext<'_>,
    ) -> Result<Coin<A>, BalanceManagerError> {
        self.check_trade_cap(cap, ctx)?;
        self.ensure_available(amount)?;

        let out = self.balance.split(amount)?;
        events::emit(
            ctx,
            EventKind::TradeOut,
            self.id(),
            Some(cap.id()),
            &[("amount", amount), ("balance", self.balance.value())],
        );
        debug!(manager = %self.id(), amount, remaining = self.balance.value(), "trade out");
        Ok(out.into_coin())
    }

    /// Receives the proceeds of a fill.
    ///
    /// # Errors
    ///
    /// `Unauthorized` without the bound TradeCap, `Ledger(Overflow)` if the
    /// balance would overflow.
    pub fn trade_in(
        &mut self,
        cap: &Owned<TradeCap>,
        proceeds: Coin<A>,
        ctx: &mut TxContext<'_>,
    ) -> Result<u64, BalanceManagerError> {
        self.check_trade_cap(cap, ctx)?;

        let amount = proceeds.value();
        let total = self.balance.join(proceeds.into_balance())?;
        events::emit(
            ctx,
            EventKind::TradeIn,
            self.id(),
            Some(cap.id()),
            &[("amount", amount), ("balance", total)],
        );
        debug!(manager = %self.id(), amount, total, "trade in");
        Ok(total)
    }
}

/// Mints the TradeCap for `vault_id` through `manager`.
///
/// `issued` is the vault's `trade_cap_issued` flag; it is checked first and
/// set only after the capability is bound to `recipient`.
pub(crate) fn mint_trade_cap<A: Asset>(
    issued: &mut bool,
    manager: &BalanceManager<A>,
    vault_id: ObjectId,
    recipient: Address,
    ctx: &mut TxContext<'_>,
) -> Result<Owned<TradeCap>, BalanceManagerError> {
    if *issued {
        return Err(BalanceManagerError::AlreadyIssued(vault_id));
    }
    manager.ensure_owner(vault_id)?;

    let cap = capability::issue::<TradeCap>(manager.id(), recipient, ctx)?;
    *issued = true;
    info!(vault = %vault_id, manager = %manager.id(), cap = %cap.id(), "trade capability minted");
    Ok(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrum_ledger::{Ledger, Shared, Supply, Usdc};

    fn operator() -> Address {
        Address::from_label("operator")
    }

    fn vault_id() -> ObjectId {
        ObjectId::from_bytes([0x11; 32])
    }

    fn shared_manager(ledger: &Ledger) -> Shared<BalanceManager<Usdc>> {
        ledger
            .execute(operator(), |ctx| {
                let manager = BalanceManager::<Usdc>::new(vault_id(), ctx);
                ctx.share(manager)
            })
            .unwrap()
    }

    #[test]
    fn trade_cap_minted_once() {
        let ledger = Ledger::new();
        let manager = shared_manager(&ledger);
        let mut issued = false;

        let cap = ledger
            .execute(operator(), |ctx| {
                mint_trade_cap(&mut issued, &manager.lock(), vault_id(), operator(), ctx)
            })
            .unwrap();
        assert!(issued);
        assert_eq!(cap.object().balance_manager_id(), manager.id());

        let again = ledger.execute(operator(), |ctx| {
            mint_trade_cap(&mut issued, &manager.lock(), vault_id(), operator(), ctx)
        });
        assert_eq!(
            again.unwrap_err(),
            BalanceManagerError::AlreadyIssued(vault_id())
        );
        assert_eq!(
            ledger.live_bound(TradeCap::type_tag(), manager.id()),
            vec![cap.id()]
        );
    }

    #[test]
    fn foreign_vault_refused() {
        let ledger = Ledger::new();
        let manager = shared_manager(&ledger);
        let mut issued = false;
        let stranger = ObjectId::from_bytes([0x22; 32]);

        let result = ledger.execute(operator(), |ctx| {
            mint_trade_cap(&mut issued, &manager.lock(), stranger, operator(), ctx)
        });
        assert!(matches!(result, Err(BalanceManagerError::Unauthorized(_))));
        assert!(!issued);
        assert!(ledger
            .live_bound(TradeCap::type_tag(), manager.id())
            .is_empty());
    }

    #[test]
    fn trading_requires_bound_cap() {
        let ledger = Ledger::new();
        let manager = shared_manager(&ledger);
        let mut issued = false;
        let cap = ledger
            .execute(operator(), |ctx| {
                mint_trade_cap(&mut issued, &manager.lock(), vault_id(), operator(), ctx)
            })
            .unwrap();

        let mut supply = Supply::<Usdc>::new();
        let proceeds = supply.mint(5_000).unwrap();

        let total = ledger
            .execute(operator(), |ctx| manager.lock().trade_in(&cap, proceeds, ctx))
            .unwrap();
        assert_eq!(total, 5_000);

        let thief = Address::from_label("thief");
        let stolen = ledger.execute(thief, |ctx| manager.lock().trade_out(&cap, 1_000, ctx));
        assert!(matches!(stolen, Err(BalanceManagerError::Unauthorized(_))));
        assert_eq!(manager.lock().balance(), 5_000);

        let out = ledger
            .execute(operator(), |ctx| manager.lock().trade_out(&cap, 2_000, ctx))
            .unwrap();
        assert_eq!(out.value(), 2_000);
        assert_eq!(manager.lock().balance(), 3_000);
        assert_eq!(ledger.events_of_kind("trade_out").len(), 1);
    }

    #[test]
    fn failed_fill_undoes_earlier_fill() {
        let ledger = Ledger::new();
        let manager = shared_manager(&ledger);
        let mut issued = false;
        let cap = ledger
            .execute(operator(), |ctx| {
                mint_trade_cap(&mut issued, &manager.lock(), vault_id(), operator(), ctx)
            })
            .unwrap();

        let proceeds = Supply::<Usdc>::new().mint(1_000).unwrap();
        let result = ledger.execute(operator(), |ctx| {
            manager.lock().trade_in(&cap, proceeds, ctx)?;
            manager.lock().trade_out(&cap, 1_500, ctx)
        });
        assert!(matches!(
            result,
            Err(BalanceManagerError::InsufficientBalance {
                requested: 1_500,
                available: 1_000
            })
        ));
        assert_eq!(manager.lock().balance(), 0);
        assert!(ledger.events_of_kind("trade_in").is_empty());
    }

    #[test]
    fn owner_capital_movements() {
        let ledger = Ledger::new();
        let manager = shared_manager(&ledger);
        let mut supply = Supply::<Usdc>::new();
        let capital = supply.mint(10_000).unwrap().into_balance();

        let mut guard = manager.lock();
        assert_eq!(guard.deposit_from_owner(vault_id(), capital).unwrap(), 10_000);

        let err = guard
            .withdraw_to_owner(ObjectId::from_bytes([0x33; 32]), 1)
            .unwrap_err();
        assert!(matches!(err, BalanceManagerError::Unauthorized(_)));

        let err = guard.withdraw_to_owner(vault_id(), 10_001).unwrap_err();
        assert_eq!(
            err,
            BalanceManagerError::InsufficientBalance {
                requested: 10_001,
                available: 10_000,
            }
        );

        let back = guard.withdraw_to_owner(vault_id(), 4_000).unwrap();
        assert_eq!(back.value(), 4_000);
        assert_eq!(guard.balance(), 6_000);
        supply.burn(back.into_coin());
    }
}
