//! # Typed Assets
//!
//! Every asset is a zero-sized marker type implementing [`Asset`]. Value is
//! carried by [`Balance<A>`] (stored inside objects) and [`Coin<A>`] (handed
//! between accounts). Neither is `Clone`; splitting and joining are the only
//! ways to change how value is partitioned, and both are checked.
//!
//! The asset is part of the type. A function that takes `Coin<Usdc>` cannot
//! be called with a `Coin<Sui>`; that check happens at compile time.
//!
//! At the dynamic boundary, where a call is assembled from arguments whose
//! types are only known at runtime, coins travel as [`AnyCoin`]. Turning an
//! `AnyCoin` back into a typed coin is the single place a wrong asset can be
//! offered, and it fails with [`TypeMismatch`] before any state is touched.
//! The rejected coin rides back inside the error.
//!
//! ## Pre-defined Assets
//!
//! [`Usdc`], [`Sui`], and the LP token family [`Lp<A, B>`].

use std::any::{type_name, TypeId};
use std::fmt;
use std::marker::PhantomData;

use thiserror::Error;

use crate::error::LedgerError;
use crate::journal::{Revert, Rollback};

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// Marker trait for asset types.
pub trait Asset: Send + Sync + 'static {
    /// Ticker symbol, for display.
    const SYMBOL: &'static str;
    /// Decimal places, for display. Arithmetic never divides by it.
    const DECIMALS: u8;

    /// Fully qualified type name; unique per asset type.
    fn type_tag() -> &'static str {
        type_name::<Self>()
    }
}

/// USD Coin, 6 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usdc;

impl Asset for Usdc {
    const SYMBOL: &'static str = "USDC";
    const DECIMALS: u8 = 6;
}

/// SUI, 9 decimals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sui;

impl Asset for Sui {
    const SYMBOL: &'static str = "SUI";
    const DECIMALS: u8 = 9;
}

/// Liquidity-provider token for the `A`/`B` pool. `Lp<Usdc, Sui>` and
/// `Lp<Sui, Usdc>` are different assets.
pub struct Lp<A, B>(PhantomData<fn() -> (A, B)>);

impl<A: Asset, B: Asset> Asset for Lp<A, B> {
    const SYMBOL: &'static str = "LP";
    const DECIMALS: u8 = 9;
}

// ---------------------------------------------------------------------------
// Balance
// ---------------------------------------------------------------------------

/// An amount of asset `A`, stored inside an object.
#[must_use = "a balance holds value; join it somewhere or destroy it when empty"]
pub struct Balance<A: Asset> {
    value: u64,
    _asset: PhantomData<fn() -> A>,
}

impl<A: Asset> Balance<A> {
    /// An empty balance.
    pub fn zero() -> Self {
        Self {
            value: 0,
            _asset: PhantomData,
        }
    }

    fn with_value(value: u64) -> Self {
        Self {
            value,
            _asset: PhantomData,
        }
    }

    /// Amount held.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Merges `other` into `self` and returns the new amount.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Overflow`] if the sum exceeds `u64::MAX`.
    pub fn join(&mut self, other: Balance<A>) -> Result<u64, LedgerError> {
        let credit = other.value;
        self.value = self
            .value
            .checked_add(credit)
            .ok_or(LedgerError::Overflow {
                current: self.value,
                credit,
            })?;
        Ok(self.value)
    }

    /// Splits `amount` off into a new balance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientBalance`] if `amount` exceeds the balance.
    pub fn split(&mut self, amount: u64) -> Result<Balance<A>, LedgerError> {
        if amount > self.value {
            return Err(LedgerError::InsufficientBalance {
                available: self.value,
                requested: amount,
            });
        }
        self.value -= amount;
        Ok(Self::with_value(amount))
    }

    /// Moves the whole amount out, leaving zero behind.
    pub fn withdraw_all(&mut self) -> Balance<A> {
        let value = std::mem::take(&mut self.value);
        Self::with_value(value)
    }

    /// Destroys an empty balance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NonZeroBalance`] if anything is left.
    pub fn destroy_zero(self) -> Result<(), LedgerError> {
        if self.value != 0 {
            return Err(LedgerError::NonZeroBalance(self.value));
        }
        Ok(())
    }

    /// Wraps the balance in a coin.
    pub fn into_coin(self) -> Coin<A> {
        Coin { balance: self }
    }
}

impl<A: Asset> Rollback for Balance<A> {
    type Checkpoint = u64;

    fn checkpoint(&self) -> u64 {
        self.value
    }

    fn rollback(&mut self, checkpoint: u64, _revert: &Revert) {
        self.value = checkpoint;
    }
}

impl<A: Asset> fmt::Debug for Balance<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Balance<{}>({})", A::SYMBOL, self.value)
    }
}

// ---------------------------------------------------------------------------
// Coin
// ---------------------------------------------------------------------------

/// A transferable amount of asset `A`.
#[must_use = "a coin holds value; deposit it, join it, or burn it"]
pub struct Coin<A: Asset> {
    balance: Balance<A>,
}

impl<A: Asset> Coin<A> {
    /// A zero-value coin.
    pub fn zero() -> Self {
        Balance::zero().into_coin()
    }

    /// Amount held.
    pub fn value(&self) -> u64 {
        self.balance.value()
    }

    /// Unwraps the coin into its balance.
    pub fn into_balance(self) -> Balance<A> {
        self.balance
    }

    /// Splits `amount` off into a new coin.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientBalance`] if `amount` exceeds the value.
    pub fn split(&mut self, amount: u64) -> Result<Coin<A>, LedgerError> {
        self.balance.split(amount).map(Balance::into_coin)
    }

    /// Merges `other` into this coin.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Overflow`] if the sum exceeds `u64::MAX`.
    pub fn join(&mut self, other: Coin<A>) -> Result<u64, LedgerError> {
        self.balance.join(other.balance)
    }

    /// Erases the asset type for the dynamic call boundary.
    pub fn into_any(self) -> AnyCoin {
        AnyCoin {
            type_id: TypeId::of::<A>(),
            type_tag: A::type_tag(),
            symbol: A::SYMBOL,
            value: self.balance.value,
        }
    }
}

impl<A: Asset> fmt::Debug for Coin<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coin<{}>({})", A::SYMBOL, self.value())
    }
}

// ---------------------------------------------------------------------------
// AnyCoin
// ---------------------------------------------------------------------------

/// A coin whose asset type is known only at runtime.
///
/// Only constructible from a typed [`Coin`], so the recorded type is always
/// the real one.
#[must_use = "an erased coin still holds value"]
#[derive(Debug)]
pub struct AnyCoin {
    type_id: TypeId,
    type_tag: &'static str,
    symbol: &'static str,
    value: u64,
}

impl AnyCoin {
    /// Amount held.
    pub fn value(&self) -> u64 {
        self.value
    }

    /// Type name of the underlying asset.
    pub fn type_tag(&self) -> &'static str {
        self.type_tag
    }

    /// Ticker of the underlying asset.
    pub fn symbol(&self) -> &'static str {
        self.symbol
    }

    /// Whether this coin holds asset `A`.
    pub fn is<A: Asset>(&self) -> bool {
        self.type_id == TypeId::of::<A>()
    }

    /// Recovers the typed coin.
    ///
    /// # Errors
    ///
    /// [`TypeMismatch`] if the coin holds a different asset. The coin is
    /// returned inside the error.
    pub fn downcast<A: Asset>(self) -> Result<Coin<A>, TypeMismatch> {
        if !self.is::<A>() {
            return Err(TypeMismatch {
                expected: A::type_tag(),
                found: self.type_tag,
                coin: self,
            });
        }
        Ok(Balance::with_value(self.value).into_coin())
    }
}

/// An asset of the wrong type was offered.
#[derive(Debug, Error)]
#[error("type mismatch: expected {expected}, found {found}")]
pub struct TypeMismatch {
    /// Asset type the callee is declared over.
    pub expected: &'static str,
    /// Asset type that was offered.
    pub found: &'static str,
    coin: AnyCoin,
}

impl TypeMismatch {
    /// The rejected coin, unchanged.
    pub fn coin(&self) -> &AnyCoin {
        &self.coin
    }

    /// Hands the rejected coin back to the caller.
    pub fn into_coin(self) -> AnyCoin {
        self.coin
    }
}

// ---------------------------------------------------------------------------
// Supply
// ---------------------------------------------------------------------------

/// Minting authority for asset `A`; tracks total supply.
#[derive(Debug)]
pub struct Supply<A: Asset> {
    total: u64,
    _asset: PhantomData<fn() -> A>,
}

impl<A: Asset> Supply<A> {
    /// A fresh supply with nothing minted.
    pub fn new() -> Self {
        Self {
            total: 0,
            _asset: PhantomData,
        }
    }

    /// Total amount in circulation.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Mints `amount` new units.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Overflow`] if total supply would exceed `u64::MAX`.
    pub fn mint(&mut self, amount: u64) -> Result<Coin<A>, LedgerError> {
        self.total = self
            .total
            .checked_add(amount)
            .ok_or(LedgerError::Overflow {
                current: self.total,
                credit: amount,
            })?;
        Ok(Balance::with_value(amount).into_coin())
    }

    /// Burns a coin and returns the amount removed from circulation.
    pub fn burn(&mut self, coin: Coin<A>) -> u64 {
        let amount = coin.value();
        self.total = self.total.saturating_sub(amount);
        amount
    }
}

impl<A: Asset> Default for Supply<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mint_split_join_conserve_value() {
        let mut usdc = Supply::<Usdc>::new();
        let mut coin = usdc.mint(1_000).unwrap();
        let part = coin.split(300).unwrap();
        assert_eq!(coin.value(), 700);
        assert_eq!(part.value(), 300);

        coin.join(part).unwrap();
        assert_eq!(coin.value(), 1_000);
        assert_eq!(usdc.total(), 1_000);

        assert_eq!(usdc.burn(coin), 1_000);
        assert_eq!(usdc.total(), 0);
    }

    #[test]
    fn split_more_than_held_rejected() {
        let mut balance = Supply::<Usdc>::new().mint(10).unwrap().into_balance();
        let err = balance.split(11).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                available: 10,
                requested: 11
            }
        );
        assert_eq!(balance.value(), 10);
    }

    #[test]
    fn join_overflow_rejected() {
        let mut supply = Supply::<Sui>::new();
        let mut big = supply.mint(u64::MAX).unwrap().into_balance();
        let mut other = Supply::<Sui>::new();
        let one = other.mint(1).unwrap().into_balance();
        assert!(matches!(big.join(one), Err(LedgerError::Overflow { .. })));
        assert_eq!(big.value(), u64::MAX);
    }

    #[test]
    fn supply_overflow_rejected() {
        let mut supply = Supply::<Sui>::new();
        let _all = supply.mint(u64::MAX).unwrap();
        assert!(supply.mint(1).is_err());
    }

    #[test]
    fn destroy_zero_only_when_empty() {
        let mut balance = Supply::<Usdc>::new().mint(5).unwrap().into_balance();
        let drained = balance.withdraw_all();
        assert_eq!(drained.value(), 5);
        assert!(balance.destroy_zero().is_ok());
        assert_eq!(drained.destroy_zero(), Err(LedgerError::NonZeroBalance(5)));
    }

    #[test]
    fn downcast_to_same_asset_succeeds() {
        let coin = Supply::<Usdc>::new().mint(42).unwrap().into_any();
        assert!(coin.is::<Usdc>());
        assert_eq!(coin.symbol(), "USDC");
        let typed: Coin<Usdc> = coin.downcast().unwrap();
        assert_eq!(typed.value(), 42);
    }

    #[test]
    fn downcast_to_other_asset_returns_coin() {
        let coin = Supply::<Sui>::new().mint(500_000).unwrap().into_any();
        let err = coin.downcast::<Usdc>().unwrap_err();
        assert_eq!(err.expected, Usdc::type_tag());
        assert_eq!(err.found, Sui::type_tag());

        let back = err.into_coin();
        assert_eq!(back.value(), 500_000);
        assert!(back.is::<Sui>());
    }

    #[test]
    fn lp_pairs_are_distinct_assets() {
        let coin = Supply::<Lp<Usdc, Sui>>::new().mint(1).unwrap().into_any();
        assert!(coin.is::<Lp<Usdc, Sui>>());
        assert!(!coin.is::<Lp<Sui, Usdc>>());
    }
}
