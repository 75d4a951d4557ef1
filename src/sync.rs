// 4.0: position sync. replays every global earmark, redemption and
// collateral removal since a position's checkpoint in O(1) by comparing
// weights. pure: the engine decides whether to commit the result.

use crate::decay::{scale_by_weight_delta, survival_from_weight};
use crate::ledger::{GlobalLedger, WeightSnapshot};
use crate::position::Position;

/// Outcome of settling one position against the current global weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub collateral: u128,
    pub debt: u128,
    pub earmarked: u128,
    // shares paid out to redemptions since the checkpoint
    pub collateral_removed: u128,
    // debt retired by redemptions since the checkpoint
    pub redeemed: u128,
    // newly earmarked since the checkpoint and still unredeemed
    pub newly_earmarked: u128,
}

impl Settlement {
    pub fn is_noop(&self, position: &Position) -> bool {
        self.collateral == position.collateral
            && self.debt == position.debt
            && self.earmarked == position.earmarked
    }
}

#[derive(Debug, Clone, Copy)]
struct DebtState {
    debt: u128,
    earmarked: u128,
}

// 4.1: settle a position against the ledger's current weights. a checkpoint
// from a finished epoch is first carried to the end of each epoch it missed.
pub fn settle(position: &Position, ledger: &GlobalLedger) -> Settlement {
    let checkpoint = &position.checkpoint;
    let now = ledger.snapshot();

    // collateral paid out of the locked pool since the checkpoint
    let collateral_delta = now.collateral_weight.saturating_sub(checkpoint.collateral_weight);
    let collateral_removed = scale_by_weight_delta(position.raw_locked, collateral_delta).min(position.collateral);

    let mut state = DebtState {
        debt: position.debt,
        earmarked: position.earmarked,
    };
    let mut from = *checkpoint;
    for closing in ledger.epoch_ends_since(checkpoint.epoch) {
        state = settle_within_epoch(state, &from, closing);
        from = closing.next_epoch();
    }
    let state = settle_within_epoch(state, &from, &now);

    // what is left of the checkpoint's own earmark
    let redemption_delta = now.redemption_weight.saturating_sub(checkpoint.redemption_weight);
    let prior_surviving = survival_from_weight(redemption_delta).apply_ceil(position.earmarked);

    Settlement {
        collateral: position.collateral - collateral_removed,
        debt: state.debt,
        earmarked: state.earmarked,
        collateral_removed,
        redeemed: position.debt - state.debt,
        newly_earmarked: state.earmarked.saturating_sub(prior_surviving),
    }
}

// 4.2: `from` and `to` belong to the same epoch
fn settle_within_epoch(state: DebtState, from: &WeightSnapshot, to: &WeightSnapshot) -> DebtState {
    let redemption_delta = to.redemption_weight.saturating_sub(from.redemption_weight);
    let survival_ratio = survival_from_weight(redemption_delta);

    // debt that was still unearmarked at `from`
    let exposure = state.debt.saturating_sub(state.earmarked);
    let earmark_delta = to.earmark_weight.saturating_sub(from.earmark_weight);
    let earmark_raw = scale_by_weight_delta(exposure, earmark_delta);

    // 4.3: how much of that fresh earmark redemptions have not yet consumed
    let decayed_prior = from.survival_accumulator.decay(survival_ratio);
    let survival_diff = to.survival_accumulator.saturating_sub(decayed_prior);
    let unredeemed_ratio = survival_diff.ratio_to(from.epoch_survival());
    let earmarked_unredeemed = unredeemed_ratio.apply_ceil(exposure).min(earmark_raw);

    // 4.4: the existing earmark after redemption decay
    let exposure_survival = survival_ratio.apply_ceil(state.earmarked);

    let redeemed = (state.earmarked - exposure_survival) + (earmark_raw - earmarked_unredeemed);
    let debt = state.debt.saturating_sub(redeemed);
    DebtState {
        debt,
        earmarked: (exposure_survival + earmarked_unredeemed).min(debt),
    }
}
