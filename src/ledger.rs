// 3.0: global ledger. protocol-wide debt counters and the three monotonic
// weight accumulators. earmark and redemption never touch a position, they
// only move these weights forward. positions catch up in sync.rs.
//
// the survival accumulator is kept per earmark epoch. an epoch closes once
// the earmark weight has grown by EPOCH_WEIGHT_SPAN inside it, which a full
// depletion always does, so survival within an epoch never underflows.

use crate::decay::{survival_or_one, weight_increment, Accumulator, Fraction, Weight, U256};
use crate::types::BlockNumber;
use serde::{Deserialize, Serialize};

/// Earmark weight an epoch may span before it is closed.
pub const EPOCH_WEIGHT_SPAN: Weight = Weight::from_raw(U256::from_parts(64, 0));

/// Global weights a position checkpoints against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightSnapshot {
    pub epoch: u32,
    // earmark weight when the epoch opened
    pub epoch_start: Weight,
    pub earmark_weight: Weight,
    pub redemption_weight: Weight,
    pub collateral_weight: Weight,
    pub survival_accumulator: Accumulator,
}

impl WeightSnapshot {
    /// Earmark survival since the epoch opened, read as one when it has
    /// fully decayed.
    pub fn epoch_survival(&self) -> Fraction {
        survival_or_one(self.earmark_weight.saturating_sub(self.epoch_start))
    }

    /// The opening snapshot of the epoch that follows this closing one.
    pub fn next_epoch(&self) -> WeightSnapshot {
        WeightSnapshot {
            epoch: self.epoch + 1,
            epoch_start: self.earmark_weight,
            survival_accumulator: Accumulator::ZERO,
            ..*self
        }
    }
}

/** 3.1: the singleton ledger. all amounts in debt-token units except
total_locked, which is in vault shares */
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalLedger {
    pub total_debt: u128,
    pub cumulative_earmarked: u128,
    // sum of every position's raw lock, in shares
    pub total_locked: u128,
    pub last_earmark_block: BlockNumber,
    pub last_redemption_block: BlockNumber,
    // redemption authority collateral balance at the last observation
    pub last_authority_balance: u128,
    pub earmark_weight: Weight,
    pub redemption_weight: Weight,
    pub collateral_weight: Weight,
    // compounded earmark-then-redemption history of the current epoch
    pub survival_accumulator: Accumulator,
    pub epoch: u32,
    pub epoch_start: Weight,
    // closing snapshot of every finished epoch, indexed by epoch
    pub epoch_ends: Vec<WeightSnapshot>,
}

impl GlobalLedger {
    pub fn new(genesis: BlockNumber) -> Self {
        Self {
            last_earmark_block: genesis,
            last_redemption_block: genesis,
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> WeightSnapshot {
        WeightSnapshot {
            epoch: self.epoch,
            epoch_start: self.epoch_start,
            earmark_weight: self.earmark_weight,
            redemption_weight: self.redemption_weight,
            collateral_weight: self.collateral_weight,
            survival_accumulator: self.survival_accumulator,
        }
    }

    /// Closing snapshots of `epoch` and every later finished epoch.
    pub fn epoch_ends_since(&self, epoch: u32) -> &[WeightSnapshot] {
        self.epoch_ends.get(epoch as usize..).unwrap_or(&[])
    }

    pub fn unearmarked_debt(&self) -> u128 {
        self.total_debt.saturating_sub(self.cumulative_earmarked)
    }

    // 3.2: classify `amount` of unearmarked debt as earmarked. returns the
    // amount actually applied after clamping.
    pub fn record_earmark(&mut self, amount: u128) -> u128 {
        let unearmarked = self.unearmarked_debt();
        let amount = amount.min(unearmarked);

        if amount > 0 && unearmarked > 0 {
            let previous_survival = self.snapshot().epoch_survival();
            let earmarked_share = Fraction::from_ratio(amount, unearmarked);
            self.survival_accumulator.add(previous_survival.mul(earmarked_share));
            self.earmark_weight.accumulate(weight_increment(amount, unearmarked));
            self.cumulative_earmarked += amount;

            if self.earmark_weight.saturating_sub(self.epoch_start) >= EPOCH_WEIGHT_SPAN {
                self.close_epoch();
            }
        }

        amount
    }

    // 3.3: retire `amount` of earmarked debt. returns the amount applied.
    pub fn record_redemption(&mut self, amount: u128) -> u128 {
        let live = self.cumulative_earmarked;
        let amount = amount.min(live);

        if amount > 0 && live > 0 {
            let surviving = Fraction::from_ratio(live - amount, live);
            self.survival_accumulator = self.survival_accumulator.decay(surviving);
            self.redemption_weight.accumulate(weight_increment(amount, live));
        }

        self.cumulative_earmarked -= amount;
        self.total_debt = self.total_debt.saturating_sub(amount);
        self.clamp();
        amount
    }

    // 3.4: shares leaving the locked pool for redemption payouts
    pub fn release_locked_collateral(&mut self, shares: u128) -> u128 {
        let removed = shares.min(self.total_locked);
        if removed > 0 {
            self.collateral_weight.accumulate(weight_increment(removed, self.total_locked));
            self.total_locked -= removed;
        }
        removed
    }

    // 3.5: positions checkpointed in the closing epoch settle up to this
    // snapshot first, then continue from the next epoch's opening
    fn close_epoch(&mut self) {
        let closing = self.snapshot();
        let opening = closing.next_epoch();
        self.epoch_ends.push(closing);
        self.epoch = opening.epoch;
        self.epoch_start = opening.epoch_start;
        self.survival_accumulator = opening.survival_accumulator;
    }

    /// Swaps one position's stale raw lock for its recomputed one.
    pub fn restate_lock(&mut self, old_raw: u128, new_raw: u128) {
        self.total_locked = self.total_locked.saturating_sub(old_raw).saturating_add(new_raw);
    }

    pub fn clamp(&mut self) {
        if self.cumulative_earmarked > self.total_debt {
            self.cumulative_earmarked = self.total_debt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decay::{scale_by_weight_delta, survival_from_weight};

    fn ledger_with_debt(debt: u128) -> GlobalLedger {
        let mut ledger = GlobalLedger::new(BlockNumber(0));
        ledger.total_debt = debt;
        ledger
    }

    #[test]
    fn earmark_clamps_to_unearmarked() {
        let mut ledger = ledger_with_debt(1_000);
        assert_eq!(ledger.record_earmark(600), 600);
        assert_eq!(ledger.record_earmark(600), 400);
        assert_eq!(ledger.cumulative_earmarked, 1_000);
        assert_eq!(ledger.record_earmark(1), 0);
    }

    #[test]
    fn earmark_advances_weight_and_accumulator() {
        let mut ledger = ledger_with_debt(1_000);
        ledger.record_earmark(100);

        let consumed = scale_by_weight_delta(1_000, ledger.earmark_weight);
        assert!((99..=101).contains(&consumed));
        assert_eq!(ledger.survival_accumulator, Accumulator::from(Fraction::from_ratio(1, 10)));
        assert_eq!(ledger.epoch, 0);
    }

    #[test]
    fn full_depletion_closes_epoch() {
        let mut ledger = ledger_with_debt(1_000);
        ledger.record_earmark(300);
        ledger.record_earmark(5_000);

        assert_eq!(ledger.cumulative_earmarked, 1_000);
        assert_eq!(ledger.epoch, 1);
        assert_eq!(ledger.epoch_start, ledger.earmark_weight);
        assert_eq!(ledger.survival_accumulator, Accumulator::ZERO);

        let closing = &ledger.epoch_ends[0];
        assert_eq!(closing.epoch, 0);
        // one, plus the upward rounding of the first survival
        let closing_sum = closing.survival_accumulator.raw();
        assert_eq!(closing_sum.hi(), 1);
        assert!(closing_sum.lo() < 1 << 8);
        assert_eq!(ledger.epoch_ends_since(0).len(), 1);
        assert!(ledger.epoch_ends_since(1).is_empty());
    }

    #[test]
    fn new_epoch_compounds_from_full_survival() {
        let mut ledger = ledger_with_debt(1_000);
        ledger.record_earmark(1_000);
        ledger.total_debt += 500;

        ledger.record_earmark(100);
        assert_eq!(ledger.survival_accumulator, Accumulator::from(Fraction::from_ratio(1, 5)));
        ledger.record_earmark(100);
        // 0.2 + 0.8 * 0.25
        let expected = Fraction::from_ratio(2, 5).raw();
        assert!(ledger.survival_accumulator.raw().lo().abs_diff(expected.lo()) <= 1 << 8);
    }

    #[test]
    fn earmark_on_empty_ledger_is_noop() {
        let mut ledger = ledger_with_debt(0);
        assert_eq!(ledger.record_earmark(50), 0);
        assert_eq!(ledger.earmark_weight, Weight::ZERO);
    }

    #[test]
    fn redemption_reduces_debt_and_earmarked() {
        let mut ledger = ledger_with_debt(1_000);
        ledger.record_earmark(100);
        assert_eq!(ledger.record_redemption(50), 50);

        assert_eq!(ledger.total_debt, 950);
        assert_eq!(ledger.cumulative_earmarked, 50);
        let survival = survival_from_weight(ledger.redemption_weight);
        assert_eq!(survival, Fraction::from_ratio(1, 2));
    }

    #[test]
    fn redemption_clamps_to_earmarked() {
        let mut ledger = ledger_with_debt(1_000);
        ledger.record_earmark(100);
        assert_eq!(ledger.record_redemption(500), 100);
        assert_eq!(ledger.total_debt, 900);
        assert_eq!(ledger.cumulative_earmarked, 0);
        assert_eq!(ledger.redemption_weight, Weight::FULL_DEPLETION);
    }

    #[test]
    fn collateral_release_tracks_locked_pool() {
        let mut ledger = ledger_with_debt(0);
        ledger.total_locked = 1_000;
        assert_eq!(ledger.release_locked_collateral(250), 250);
        assert_eq!(ledger.total_locked, 750);
        let removed = scale_by_weight_delta(1_000, ledger.collateral_weight);
        assert!((249..=251).contains(&removed));

        assert_eq!(ledger.release_locked_collateral(5_000), 750);
        assert_eq!(ledger.total_locked, 0);
    }

    #[test]
    fn restate_lock_saturates() {
        let mut ledger = ledger_with_debt(0);
        ledger.total_locked = 10;
        ledger.restate_lock(25, 4);
        assert_eq!(ledger.total_locked, 4);
    }
}
