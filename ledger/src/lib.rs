// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Ferrum Ledger: Resource-Oriented Runtime
//!
//! The host runtime the Ferrum contracts execute on. Value lives in unique,
//! non-duplicable objects; authority lives in capability objects that an
//! account either holds or does not. This crate supplies exactly the
//! primitives the contracts consume:
//!
//! - **object**: identities (`ObjectId`, `Address`, `TxDigest`), the
//!   non-`Clone` [`Uid`](object::Uid), and the ownership registry record.
//! - **handle**: [`Owned`](handle::Owned) and [`Shared`](handle::Shared),
//!   the only two ways an object can be held once it leaves a transaction.
//! - **tx**: the per-transaction context that buffers every effect.
//! - **journal**: checkpoints of the shared objects a transaction locks, so
//!   an abort can put them back.
//! - **ledger**: the registry, the event log, and `execute`, which commits
//!   a transaction in full or not at all.
//! - **asset**: typed balances and coins. A `Coin<Usdc>` is not a
//!   `Coin<Sui>`, and the compiler is the one saying so.
//! - **event**: the append-only log consumed by off-chain indexers.
//! - **config**: runtime constants.
//! - **logging**: `tracing` subscriber setup.
//!
//! ## Ground Rules
//!
//! 1. Nothing half-happens. A transaction that fails, or that leaves a
//!    freshly created object without an owner, commits nothing, and the
//!    shared objects it changed are restored.
//! 2. Objects are not `Clone`. Duplicating a coin or a capability is a
//!    type error, not a policy violation.
//! 3. Amounts are `u64` in the smallest unit and every addition is checked.

pub mod asset;
pub mod config;
pub mod error;
pub mod event;
pub mod handle;
pub mod hash;
pub mod journal;
pub mod ledger;
pub mod logging;
pub mod object;
pub mod tx;

pub use asset::{AnyCoin, Asset, Balance, Coin, Lp, Sui, Supply, TypeMismatch, Usdc};
pub use error::LedgerError;
pub use event::Event;
pub use handle::{Owned, Shared};
pub use journal::{Revert, Rollback};
pub use ledger::Ledger;
pub use object::{Address, Key, ObjectId, ObjectRecord, Owner, TxDigest, Uid};
pub use tx::TxContext;
