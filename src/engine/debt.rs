//! Mint, burn and repay. Lock accounting moves with the debt.

use super::core::{Effect, Engine};
use super::results::{EngineError, RepayResult};
use crate::events::{BurnEvent, EventPayload, MintEvent, RepayEvent};
use crate::lock;
use crate::position::ReducedDebt;
use crate::types::{AccountId, PositionId};
use tracing::debug;

impl Engine {
    // 8.8: borrow against free collateral
    pub fn mint(
        &mut self,
        caller: AccountId,
        id: PositionId,
        amount: u128,
        recipient: AccountId,
    ) -> Result<u128, EngineError> {
        if amount == 0 {
            return Err(EngineError::ZeroAmount);
        }
        self.ensure_owner(caller, id)?;

        self.transact(&[id], |engine| {
            engine.apply_earmark();
            engine.sync_position(id)?;
            let new_debt = engine.add_debt(id, amount)?;

            let block = engine.current_block;
            let position = engine.require_mut(id)?;
            position.last_mint_block = Some(block);
            position.updated_at = block;
            engine.queue(Effect::MintDebt { to: recipient, amount });

            engine.emit_event(EventPayload::Mint(MintEvent {
                position_id: id,
                recipient,
                amount,
                new_debt,
            }));
            debug!(position = %id, amount, new_debt, "mint: issued");
            Ok(new_debt)
        })
    }

    // 8.9: pay down unearmarked debt with debt tokens
    pub fn burn(&mut self, caller: AccountId, id: PositionId, amount: u128) -> Result<u128, EngineError> {
        if amount == 0 {
            return Err(EngineError::ZeroAmount);
        }
        self.ensure_exists(id)?;

        self.transact(&[id], |engine| {
            engine.apply_earmark();
            engine.sync_position(id)?;
            engine.ensure_repayable(id)?;

            let unearmarked = engine.require(id)?.unearmarked_debt();
            let credit = amount.min(unearmarked);
            if credit == 0 {
                return Err(EngineError::InsufficientUnearmarkedDebt { position: id, requested: amount });
            }

            let reduced = engine.release_debt(id, credit, false)?;
            let new_debt = engine.require(id)?.debt;
            // inline and last: a failed burn aborts the whole operation
            engine.debt_token.burn(caller, reduced.total)?;

            engine.emit_event(EventPayload::Burn(BurnEvent {
                position_id: id,
                amount: reduced.total,
                new_debt,
            }));
            debug!(position = %id, amount = reduced.total, new_debt, "burn: repaid");
            Ok(reduced.total)
        })
    }

    // 8.10: pay down debt with vault shares. anyone may repay any position.
    pub fn repay(&mut self, _caller: AccountId, id: PositionId, shares: u128) -> Result<RepayResult, EngineError> {
        if shares == 0 {
            return Err(EngineError::ZeroAmount);
        }
        self.ensure_exists(id)?;

        self.transact(&[id], |engine| {
            engine.apply_earmark();
            engine.sync_position(id)?;
            engine.ensure_repayable(id)?;

            let debt = engine.require(id)?.debt;
            let credit = engine.yield_to_debt(shares).min(debt);
            let reduced = engine.release_debt(id, credit, true)?;

            let shares_paid = engine.debt_to_yield(reduced.total);
            let fee_shares = engine.params.protocol_fee.apply(shares_paid);
            let position = engine.require_mut(id)?;
            if position.collateral < fee_shares {
                return Err(EngineError::InsufficientCollateral {
                    position: id,
                    required: fee_shares,
                    available: position.collateral,
                });
            }
            position.collateral -= fee_shares;
            engine.deposited_shares = engine.deposited_shares.saturating_sub(fee_shares);
            engine.pay_protocol_fee(fee_shares);
            engine.queue(Effect::SharesToAuthority(shares_paid));

            engine.emit_event(EventPayload::Repay(RepayEvent {
                position_id: id,
                debt_credit: reduced.total,
                shares_paid,
                fee_shares,
            }));
            debug!(
                position = %id,
                credit = reduced.total,
                from_earmarked = reduced.from_earmarked,
                shares_paid,
                fee_shares,
                "repay: applied"
            );

            Ok(RepayResult {
                debt_credit: reduced.total,
                shares_paid,
                fee_shares,
            })
        })
    }

    fn ensure_repayable(&self, id: PositionId) -> Result<(), EngineError> {
        let position = self.require(id)?;
        if position.minted_in(self.current_block) {
            return Err(EngineError::RepayOnMintBlock(id));
        }
        if position.debt == 0 {
            return Err(EngineError::NoDebt(id));
        }
        Ok(())
    }

    // 6.1: grow the lock by the new debt, then the debt itself
    fn add_debt(&mut self, id: PositionId, amount: u128) -> Result<u128, EngineError> {
        let total_debt = self
            .ledger
            .total_debt
            .checked_add(amount)
            .ok_or(EngineError::AmountOverflow)?;
        let position = self.require(id)?;
        let new_debt = position.debt.checked_add(amount).ok_or(EngineError::AmountOverflow)?;
        let old_raw = position.raw_locked;
        let new_raw = self.lock_for_debt(new_debt)?;

        let position = self.require(id)?;
        lock::reserve(position.collateral, old_raw, new_raw.saturating_sub(old_raw)).map_err(|_| {
            EngineError::Undercollateralized {
                position: id,
                requested: amount,
                available: position.free_collateral(old_raw),
            }
        })?;

        let position = self.require_mut(id)?;
        position.debt = new_debt;
        position.raw_locked = new_raw;
        self.ledger.restate_lock(old_raw, new_raw);
        self.ledger.total_debt = total_debt;
        Ok(new_debt)
    }

    // 6.2: shrink debt and free the matching lock. earmarked debt repaid here
    // also leaves the global earmarked total.
    pub(super) fn release_debt(
        &mut self,
        id: PositionId,
        amount: u128,
        earmarked_first: bool,
    ) -> Result<ReducedDebt, EngineError> {
        let position = self.require_mut(id)?;
        let old_raw = position.raw_locked;
        let reduced = if earmarked_first {
            position.reduce_debt(amount)
        } else {
            position.reduce_unearmarked(amount)
        };
        let new_debt = position.debt;
        let new_raw = self.lock_for_debt(new_debt)?;

        let freed = lock::release(self.ledger.total_locked, old_raw.saturating_sub(new_raw));
        self.ledger.total_locked -= freed;
        self.require_mut(id)?.raw_locked = new_raw;

        self.ledger.total_debt = self.ledger.total_debt.saturating_sub(reduced.total);
        self.ledger.cumulative_earmarked = self
            .ledger
            .cumulative_earmarked
            .saturating_sub(reduced.from_earmarked);
        self.ledger.clamp();
        Ok(reduced)
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{Engine, EngineConfig, EngineError};
    use crate::external::{DebtToken, MockCollaborators};
    use crate::types::{AccountId, BlockNumber, PositionId};

    const OWNER: AccountId = AccountId(1);
    const OTHER: AccountId = AccountId(2);

    fn open(collateral: u128) -> (Engine, MockCollaborators, PositionId) {
        let (mut engine, mocks) = Engine::with_mocks(EngineConfig::default()).unwrap();
        let id = engine.deposit(OWNER, collateral, None).unwrap();
        (engine, mocks, id)
    }

    #[test]
    fn mint_locks_collateral_and_issues_tokens() {
        let (mut engine, mocks, id) = open(2_000);
        assert_eq!(engine.mint(OWNER, id, 1_000, OTHER), Ok(1_000));

        let position = engine.get_position(id).unwrap();
        assert_eq!(position.raw_locked, 1_111);
        assert_eq!(engine.ledger().total_locked, 1_111);
        assert_eq!(engine.ledger().total_debt, 1_000);
        assert_eq!(mocks.debt_token.balance_of(OTHER), 1_000);
    }

    #[test]
    fn mint_rejects_when_collateral_short() {
        let (mut engine, mocks, id) = open(1_000);
        let err = engine.mint(OWNER, id, 1_000, OWNER).unwrap_err();
        assert!(matches!(err, EngineError::Undercollateralized { available: 1_000, .. }));
        assert_eq!(engine.ledger().total_debt, 0);
        assert_eq!(mocks.debt_token.total_supply(), 0);
    }

    #[test]
    fn mint_requires_owner() {
        let (mut engine, _, id) = open(2_000);
        assert_eq!(
            engine.mint(OTHER, id, 10, OTHER),
            Err(EngineError::NotOwner { position: id, caller: OTHER })
        );
    }

    #[test]
    fn burn_rejected_in_mint_block() {
        let (mut engine, _, id) = open(2_000);
        engine.mint(OWNER, id, 1_000, OWNER).unwrap();
        assert_eq!(engine.burn(OWNER, id, 100), Err(EngineError::RepayOnMintBlock(id)));
        engine.advance_block(1);
        assert_eq!(engine.burn(OWNER, id, 100), Ok(100));
    }

    #[test]
    fn burn_frees_lock_and_tokens() {
        let (mut engine, mocks, id) = open(2_000);
        engine.mint(OWNER, id, 1_000, OWNER).unwrap();
        engine.advance_block(1);

        assert_eq!(engine.burn(OWNER, id, 5_000), Ok(1_000));
        assert_eq!(engine.get_position(id).unwrap().debt, 0);
        assert_eq!(engine.ledger().total_locked, 0);
        assert_eq!(mocks.debt_token.total_supply(), 0);
        assert_eq!(engine.burn(OWNER, id, 1), Err(EngineError::NoDebt(id)));
    }

    #[test]
    fn burn_skips_earmarked_debt() {
        let (mut engine, mocks, id) = open(2_000);
        engine.mint(OWNER, id, 1_000, OWNER).unwrap();
        mocks.authority.schedule_demand(BlockNumber(1), 1_000);
        engine.advance_block(1);

        assert_eq!(
            engine.burn(OWNER, id, 100),
            Err(EngineError::InsufficientUnearmarkedDebt { position: id, requested: 100 })
        );
    }

    #[test]
    fn failed_token_burn_rolls_back() {
        let (mut engine, mocks, id) = open(2_000);
        engine.mint(OWNER, id, 1_000, OWNER).unwrap();
        mocks.debt_token.transfer(OWNER, OTHER, 1_000).unwrap();
        engine.advance_block(1);

        let ledger_before = engine.ledger().clone();
        assert!(matches!(engine.burn(OWNER, id, 100), Err(EngineError::Token(_))));
        assert_eq!(engine.ledger(), &ledger_before);
        assert_eq!(engine.get_position(id).unwrap().debt, 1_000);
    }

    #[test]
    fn repay_consumes_earmarked_first_and_pays_authority() {
        let (mut engine, mocks, id) = open(20_000);
        engine.mint(OWNER, id, 10_000, OWNER).unwrap();
        mocks.authority.schedule_demand(BlockNumber(1), 1_000);
        engine.advance_block(1);

        let result = engine.repay(OTHER, id, 3_000).unwrap();
        assert_eq!(result.debt_credit, 3_000);
        assert_eq!(result.shares_paid, 3_000);
        assert_eq!(result.fee_shares, 30);

        let position = engine.get_position(id).unwrap();
        assert_eq!(position.debt, 7_000);
        assert_eq!(position.earmarked, 0);
        assert_eq!(position.collateral, 19_970);
        assert_eq!(engine.ledger().cumulative_earmarked, 0);
        assert_eq!(mocks.authority.balance(), 3_000);
        assert_eq!(engine.protocol_fees_collected(), 30);
    }

    #[test]
    fn repay_credit_capped_at_debt() {
        let (mut engine, _, id) = open(2_000);
        engine.mint(OWNER, id, 500, OWNER).unwrap();
        engine.advance_block(1);

        let result = engine.repay(OWNER, id, 10_000).unwrap();
        assert_eq!(result.debt_credit, 500);
        assert_eq!(result.shares_paid, 500);
        assert_eq!(engine.ledger().total_debt, 0);
    }
}
