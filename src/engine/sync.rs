//! Position settlement: committing sync, poke, and side-effect-free quotes.

use super::core::Engine;
use super::results::EngineError;
use crate::position::PositionView;
use crate::sync::{settle, Settlement};
use crate::decay::mul_div;
use crate::types::{PositionId, FIXED_POINT_SCALAR};
use tracing::trace;

impl Engine {
    // 8.6: settle a position against the current weights and commit it.
    // callers must have applied the earmark for this block first.
    pub(super) fn sync_position(&mut self, id: PositionId) -> Result<Settlement, EngineError> {
        let settlement = settle(self.require(id)?, &self.ledger);
        let now = self.ledger.snapshot();
        let new_raw_locked = self.lock_for_debt(settlement.debt)?;
        let block = self.current_block;

        let position = self.require_mut(id)?;
        // the removed slice already left the global pool in redeem
        let stale_lock = position.raw_locked.saturating_sub(settlement.collateral_removed);
        position.commit(&settlement, now, new_raw_locked, block);
        self.ledger.restate_lock(stale_lock, new_raw_locked);

        if settlement.redeemed > 0 || settlement.collateral_removed > 0 || settlement.newly_earmarked > 0 {
            trace!(
                position = %id,
                redeemed = settlement.redeemed,
                collateral_removed = settlement.collateral_removed,
                newly_earmarked = settlement.newly_earmarked,
                debt = settlement.debt,
                earmarked = settlement.earmarked,
                "sync: settled"
            );
        }
        Ok(settlement)
    }

    /// Earmark and sync without any other mutation.
    pub fn poke(&mut self, id: PositionId) -> Result<(), EngineError> {
        self.ensure_exists(id)?;
        self.transact(&[id], |engine| {
            engine.apply_earmark();
            engine.sync_position(id)?;
            Ok(())
        })
    }

    // 8.7: what sync would produce right now, from a cloned ledger
    pub fn quote(&self, id: PositionId) -> Result<Settlement, EngineError> {
        self.ensure_exists(id)?;
        let mut ledger = self.ledger.clone();
        if let Some(pending) = self.pending_earmark() {
            ledger.record_earmark(pending.amount);
        }
        Ok(settle(self.require(id)?, &ledger))
    }

    pub fn get_position_view(&self, id: PositionId) -> Result<PositionView, EngineError> {
        let settlement = self.quote(id)?;
        Ok(PositionView {
            id,
            collateral: settlement.collateral,
            debt: settlement.debt,
            earmarked: settlement.earmarked,
        })
    }

    /// Debt the position could still mint at the minimum collateralization.
    pub fn max_borrowable(&self, id: PositionId) -> Result<u128, EngineError> {
        let view = self.get_position_view(id)?;
        let value = self.yield_to_debt(view.collateral);
        let capacity = mul_div(value, FIXED_POINT_SCALAR, self.params.minimum_collateralization.scaled())
            .ok_or(EngineError::AmountOverflow)?;
        Ok(capacity.saturating_sub(view.debt))
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{Engine, EngineConfig};
    use crate::external::MockCollaborators;
    use crate::types::{AccountId, BlockNumber, PositionId};

    const OWNER: AccountId = AccountId(1);

    fn borrower(collateral: u128, debt: u128) -> (Engine, MockCollaborators, PositionId) {
        let (mut engine, mocks) = Engine::with_mocks(EngineConfig::default()).unwrap();
        let id = engine.deposit(OWNER, collateral, None).unwrap();
        engine.mint(OWNER, id, debt, OWNER).unwrap();
        (engine, mocks, id)
    }

    #[test]
    fn quote_matches_poke_without_mutating() {
        let (mut engine, mocks, id) = borrower(2_000, 1_000);
        mocks.authority.schedule_demand(BlockNumber(1), 100);
        engine.advance_block(1);

        let ledger_before = engine.ledger().clone();
        let quoted = engine.get_position_view(id).unwrap();
        assert_eq!(engine.ledger(), &ledger_before);
        assert_eq!(quoted.debt, 1_000);
        assert_eq!(quoted.earmarked, 100);

        engine.poke(id).unwrap();
        let stored = engine.get_position(id).unwrap();
        assert_eq!((stored.debt, stored.earmarked), (quoted.debt, quoted.earmarked));
    }

    #[test]
    fn poke_is_idempotent() {
        let (mut engine, mocks, id) = borrower(2_000, 1_000);
        mocks.authority.schedule_demand(BlockNumber(1), 250);
        engine.advance_block(1);
        engine.poke(id).unwrap();
        let first = engine.get_position(id).unwrap().clone();

        engine.poke(id).unwrap();
        let second = engine.get_position(id).unwrap();
        assert_eq!(first.debt, second.debt);
        assert_eq!(first.earmarked, second.earmarked);
        assert_eq!(first.collateral, second.collateral);
    }

    #[test]
    fn max_borrowable_at_minimum_collateralization() {
        let (engine, _, id) = borrower(2_000, 1_000);
        // 2000 / 1.111111111111111111 is just under 1800
        let capacity = engine.max_borrowable(id).unwrap();
        assert!((799..=800).contains(&capacity), "capacity {capacity}");
    }

    #[test]
    fn borrowing_after_full_earmark_settles_exactly() {
        let (mut engine, mocks, first) = borrower(2_000, 1_000);
        let late = AccountId(2);
        mocks.authority.schedule_demand(BlockNumber(1), 5_000);
        engine.advance_block(1);
        let second = engine.deposit(late, 1_000, None).unwrap();
        engine.mint(late, second, 500, late).unwrap();
        assert_eq!(engine.ledger().cumulative_earmarked, 1_000);

        mocks.authority.schedule_demand(BlockNumber(2), 100);
        engine.advance_block(1);
        let view = engine.get_position_view(second).unwrap();
        assert_eq!((view.debt, view.earmarked), (500, 100));

        engine.poke(second).unwrap();
        let stored = engine.get_position(second).unwrap();
        assert_eq!((stored.debt, stored.earmarked), (500, 100));
        assert_eq!(engine.ledger().cumulative_earmarked, 1_100);

        let first_view = engine.get_position_view(first).unwrap();
        assert_eq!((first_view.debt, first_view.earmarked), (1_000, 1_000));
    }

    #[test]
    fn quote_of_missing_position_fails() {
        let (engine, _, _) = borrower(2_000, 1_000);
        assert!(engine.quote(PositionId(77)).is_err());
    }
}
