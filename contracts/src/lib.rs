// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Ferrum Contracts
//!
//! A custodial vault and a companion yield farm on the Ferrum ledger. Value
//! is a typed object; authority is a capability object that an account
//! either holds or does not.
//!
//! - **Capability**: issuance and binding of `AdminCap`, `FarmCap` and
//!   `TradeCap`. A capability is never handed out before the registry names
//!   its owner, and at most one of each kind is live per resource.
//! - **Vault**: holds exactly one declared asset type. Deposits, withdrawals
//!   with a performance fee, fee sweeps, capital allocation to trading.
//! - **Farm**: staked LP balances under the same capability discipline,
//!   with a pluggable reward policy.
//! - **Balance Manager**: the trading balance a vault delegates to through a
//!   single `TradeCap`, minted at most once per vault.
//! - **Fees**: high-water-mark performance fee accrual.
//!
//! ## Design Principles
//!
//! 1. The asset is part of the vault's type. A wrong token is a compile
//!    error, or a `TypeMismatch` at the dynamic boundary, never a branch.
//! 2. Checks first, then mutations. A failed call leaves state untouched,
//!    and a refused call leaves the caller's handles usable for a retry.
//! 3. Every stored field has a reader and a writer. No dormant state.
//! 4. All monetary arithmetic is checked or widened to `u128`.

pub mod balance_manager;
pub mod capability;
pub mod config;
pub mod events;
pub mod farm;
pub mod fees;
pub mod vault;

pub use balance_manager::{BalanceManager, BalanceManagerError};
pub use capability::{AdminCap, Capability, CapabilityError, CapabilityKind, FarmCap, TradeCap};
pub use config::{ConfigError, VaultConfig};
pub use events::EventKind;
pub use farm::{Farm, FarmError, NoRewards, RewardPolicy};
pub use fees::{FeeAccrual, WithdrawalQuote};
pub use vault::{Authorization, CloseRefused, Vault, VaultError, VaultSnapshot};
