//! # Performance Fee Accrual
//!
//! A vault charges a performance fee on realised profit, measured against a
//! single high-water-mark (HWM). Deposits raise the HWM by the deposited
//! amount, so new capital is never counted as profit. Losses are never
//! charged, and a fee is never larger than the profit it is taken from.
//!
//! All intermediate products are computed in `u128`.

use serde::{Deserialize, Serialize};

use crate::config::RATE_DENOMINATOR;

/// `floor(profit * rate_bps / RATE_DENOMINATOR)`, capped at `profit`.
pub fn compute_fee(profit: u64, rate_bps: u64) -> u64 {
    let fee = u128::from(profit) * u128::from(rate_bps) / u128::from(RATE_DENOMINATOR);
    // Only binds for rates above 100%.
    fee.min(u128::from(profit)) as u64
}

/// `floor(value * numerator / denominator)`, or 0 when the denominator is 0.
fn pro_rata(value: u64, numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    let share = u128::from(value) * u128::from(numerator) / u128::from(denominator);
    share.min(u128::from(value)) as u64
}

/// The fee outcome of one withdrawal, computed before anything moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalQuote {
    /// Valuation above the high-water-mark.
    pub profit: u64,
    /// Fee crystallised into accrued fees by this withdrawal.
    pub fee: u64,
    /// Part of `fee` borne by the withdrawer.
    pub fee_attributable: u64,
    /// Amount paid out: `amount - fee_attributable`.
    pub net: u64,
    /// High-water-mark after the withdrawal.
    pub next_high_water_mark: u64,
}

/// Fee rate and high-water-mark of one vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeAccrual {
    rate_bps: u64,
    high_water_mark: u64,
}

impl FeeAccrual {
    /// Fresh accrual state. The rate must already be validated.
    pub fn new(rate_bps: u64) -> Self {
        Self {
            rate_bps,
            high_water_mark: 0,
        }
    }

    /// Performance fee rate in basis points.
    pub fn rate_bps(&self) -> u64 {
        self.rate_bps
    }

    /// Current high-water-mark.
    pub fn high_water_mark(&self) -> u64 {
        self.high_water_mark
    }

    pub(crate) fn set_rate(&mut self, rate_bps: u64) {
        self.rate_bps = rate_bps;
    }

    /// Raises the high-water-mark by a deposit.
    pub(crate) fn record_deposit(&mut self, amount: u64) {
        self.high_water_mark = self.high_water_mark.saturating_add(amount);
    }

    /// Computes the fee split for withdrawing `amount` out of a vault whose
    /// valuation (balance plus deployed capital, fees excluded) is
    /// `valuation`.
    ///
    /// The caller must ensure `amount <= valuation`.
    pub fn preview_withdrawal(&self, valuation: u64, amount: u64) -> WithdrawalQuote {
        let profit = valuation.saturating_sub(self.high_water_mark);
        let fee = compute_fee(profit, self.rate_bps);

        let fee_attributable = pro_rata(fee, amount, valuation);
        let net = amount - fee_attributable;

        // The fee is crystallised: the post-fee valuation becomes the new
        // baseline, which then shrinks with the withdrawn share.
        let baseline = self.high_water_mark.max(valuation - fee);
        let next_high_water_mark = baseline - pro_rata(baseline, amount, valuation);

        WithdrawalQuote {
            profit,
            fee,
            fee_attributable,
            net,
            next_high_water_mark,
        }
    }

    /// Commits a quote produced by [`preview_withdrawal`](Self::preview_withdrawal).
    pub(crate) fn apply(&mut self, quote: &WithdrawalQuote) {
        self.high_water_mark = quote.next_high_water_mark;
    }
}
