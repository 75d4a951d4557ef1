//! Global earmark and redemption. Both only move ledger weights, positions
//! catch up on their next sync.

use super::core::{Effect, Engine};
use super::results::{EngineError, RedemptionResult};
use crate::events::{EarmarkEvent, EventPayload, RedemptionEvent};
use crate::types::{AccountId, BlockNumber};
use tracing::{debug, info, warn};

/// Earmark the next call would apply, computed without touching state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct PendingEarmark {
    pub from_block: BlockNumber,
    pub demand: u128,
    pub cover: u128,
    pub amount: u128,
}

impl Engine {
    /// Earmarks redemption demand accrued since the last earmark block.
    /// Idempotent within a block. Returns the debt newly earmarked.
    pub fn earmark(&mut self) -> Result<u128, EngineError> {
        self.transact(&[], |engine| Ok(engine.apply_earmark()))
    }

    pub(super) fn pending_earmark(&self) -> Option<PendingEarmark> {
        if self.ledger.total_debt == 0 || self.current_block <= self.ledger.last_earmark_block {
            return None;
        }

        let from_block = self.ledger.last_earmark_block.next();
        let demand = self.authority.query_graph(from_block, self.current_block);
        let cover_shares = self
            .authority
            .collateral_balance()
            .saturating_sub(self.ledger.last_authority_balance);
        let cover = self.yield_to_debt(cover_shares);

        Some(PendingEarmark {
            from_block,
            demand,
            cover,
            amount: demand.saturating_sub(cover),
        })
    }

    // 8.4: earmark, always the first step of every entry point
    pub(super) fn apply_earmark(&mut self) -> u128 {
        let Some(pending) = self.pending_earmark() else {
            return 0;
        };

        self.observe_cover();
        let earmarked = self.ledger.record_earmark(pending.amount);
        self.ledger.last_earmark_block = self.current_block;

        if pending.demand > 0 || pending.cover > 0 {
            self.emit_event(EventPayload::Earmark(EarmarkEvent {
                from_block: pending.from_block,
                demand: pending.demand,
                cover: pending.cover,
                earmarked,
                earmark_weight: self.ledger.earmark_weight,
            }));
            debug!(
                block = %self.current_block,
                demand = pending.demand,
                cover = pending.cover,
                earmarked,
                weight = %self.ledger.earmark_weight,
                epoch = self.ledger.epoch,
                "earmark: applied"
            );
        }

        earmarked
    }

    /// Shares the authority gained since the last observation. Re-baselines
    /// the observation either way.
    pub(super) fn observe_cover(&mut self) -> u128 {
        let balance = self.authority.collateral_balance();
        let last = self.ledger.last_authority_balance;
        if balance < last {
            warn!(balance, last, "earmark: redemption authority balance decreased, no cover");
        }
        self.ledger.last_authority_balance = balance;
        balance.saturating_sub(last)
    }

    // 8.5: retire earmarked debt and pay the matching collateral out of the
    // locked pool
    pub fn redeem(&mut self, caller: AccountId, amount: u128) -> Result<RedemptionResult, EngineError> {
        if caller != self.params.redemption_authority {
            return Err(EngineError::NotRedemptionAuthority(caller));
        }
        if amount == 0 {
            return Err(EngineError::ZeroAmount);
        }

        self.transact(&[], |engine| {
            engine.apply_earmark();

            let live = engine.ledger.cumulative_earmarked;
            let amount = amount.min(live);
            let cover_shares = engine.observe_cover();
            let cover = engine.yield_to_debt(cover_shares).min(live - amount);

            let redeemed = engine.ledger.record_redemption(amount + cover);
            engine.ledger.last_redemption_block = engine.current_block;

            // only the net principal is paid in collateral, cover already arrived
            let collateral_out = engine.debt_to_yield(amount);
            let fee = engine.params.protocol_fee.apply(collateral_out);
            let removed = engine.ledger.release_locked_collateral(collateral_out + fee);
            let shares_out = collateral_out.min(removed);
            let fee_shares = removed - shares_out;

            engine.deposited_shares = engine.deposited_shares.saturating_sub(removed);
            engine.pay_protocol_fee(fee_shares);
            engine.queue(Effect::SharesToAuthority(shares_out));
            // the payout itself must not read as cover next time
            engine.ledger.last_authority_balance = engine.authority.collateral_balance() + shares_out;

            engine.emit_event(EventPayload::Redemption(RedemptionEvent {
                requested: amount,
                cover,
                redeemed,
                shares_out,
                fee_shares,
                redemption_weight: engine.ledger.redemption_weight,
                collateral_weight: engine.ledger.collateral_weight,
            }));
            info!(
                redeemed,
                cover,
                shares_out,
                fee_shares,
                total_debt = engine.ledger.total_debt,
                "redeem: applied"
            );

            Ok(RedemptionResult {
                redeemed,
                cover,
                shares_out,
                fee_shares,
            })
        })
    }

    pub(super) fn pay_protocol_fee(&mut self, shares: u128) {
        if shares == 0 {
            return;
        }
        self.protocol_fees_collected += shares;
        let receiver = self.params.protocol_fee_receiver;
        self.queue(Effect::Shares { to: receiver, shares });
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{Engine, EngineConfig, EngineError};
    use crate::external::MockCollaborators;
    use crate::types::{AccountId, BlockNumber};

    const OWNER: AccountId = AccountId(1);

    fn funded(debt: u128) -> (Engine, MockCollaborators, AccountId) {
        let (mut engine, mocks) = Engine::with_mocks(EngineConfig::default()).unwrap();
        let id = engine.deposit(OWNER, debt * 2, None).unwrap();
        engine.mint(OWNER, id, debt, OWNER).unwrap();
        let authority = engine.params().redemption_authority;
        (engine, mocks, authority)
    }

    #[test]
    fn earmark_is_idempotent_per_block() {
        let (mut engine, mocks, _) = funded(1_000);
        mocks.authority.schedule_demand(BlockNumber(1), 100);
        engine.advance_block(1);

        assert_eq!(engine.earmark(), Ok(100));
        assert_eq!(engine.earmark(), Ok(0));
        assert_eq!(engine.ledger().cumulative_earmarked, 100);
    }

    #[test]
    fn cover_nets_out_demand() {
        let (mut engine, mocks, _) = funded(1_000);
        mocks.authority.schedule_demand(BlockNumber(1), 100);
        mocks.authority.add_cover(30);
        engine.advance_block(1);

        assert_eq!(engine.earmark(), Ok(70));
    }

    #[test]
    fn authority_balance_drop_is_not_cover() {
        let (mut engine, mocks, _) = funded(1_000);
        mocks.authority.add_cover(50);
        engine.advance_block(1);
        engine.earmark().unwrap();

        mocks.authority.withdraw(40);
        mocks.authority.schedule_demand(BlockNumber(2), 100);
        engine.advance_block(1);
        assert_eq!(engine.earmark(), Ok(100));
        assert_eq!(engine.ledger().last_authority_balance, 10);
    }

    #[test]
    fn redeem_is_restricted() {
        let (mut engine, _, authority) = funded(1_000);
        assert_eq!(engine.redeem(OWNER, 10), Err(EngineError::NotRedemptionAuthority(OWNER)));
        assert_eq!(engine.redeem(authority, 0), Err(EngineError::ZeroAmount));
    }

    #[test]
    fn redeem_pays_authority_and_fee() {
        let (mut engine, mocks, authority) = funded(1_000);
        mocks.authority.schedule_demand(BlockNumber(1), 100);
        engine.advance_block(1);

        let result = engine.redeem(authority, 50).unwrap();
        assert_eq!(result.redeemed, 50);
        assert_eq!(result.shares_out, 50);
        // 1% of 50 rounds down to nothing
        assert_eq!(result.fee_shares, 0);
        assert_eq!(mocks.authority.balance(), 50);
        assert_eq!(engine.ledger().total_debt, 950);
        assert_eq!(engine.ledger().cumulative_earmarked, 50);

        // the payout is not treated as cover
        engine.advance_block(1);
        mocks.authority.schedule_demand(BlockNumber(2), 10);
        assert_eq!(engine.earmark(), Ok(10));
    }

    #[test]
    fn redeem_clamps_to_earmarked() {
        let (mut engine, mocks, authority) = funded(1_000);
        mocks.authority.schedule_demand(BlockNumber(1), 100);
        engine.advance_block(1);

        let result = engine.redeem(authority, 5_000).unwrap();
        assert_eq!(result.redeemed, 100);
        assert_eq!(engine.ledger().cumulative_earmarked, 0);
    }

    #[test]
    fn redeem_folds_cover_into_total() {
        let (mut engine, mocks, authority) = funded(1_000);
        mocks.authority.schedule_demand(BlockNumber(1), 100);
        engine.advance_block(1);
        engine.earmark().unwrap();

        mocks.authority.add_cover(20);
        let result = engine.redeem(authority, 50).unwrap();
        assert_eq!(result.cover, 20);
        assert_eq!(result.redeemed, 70);
        assert_eq!(result.shares_out, 50);
        assert_eq!(engine.ledger().cumulative_earmarked, 30);
    }
}
