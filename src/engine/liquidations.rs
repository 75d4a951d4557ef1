// 8.11 engine/liquidations.rs: liquidation orchestration.
// earmarked debt is force-repaid from the position's own collateral first.
// only if that leaves the position at or below the lower bound does the
// liquidation formula seize collateral.

use super::core::{Effect, Engine};
use super::results::{EngineError, LiquidationResult};
use crate::events::{EventPayload, ForceRepayEvent, LiquidationEvent};
use crate::liquidation::calculate_liquidation;
use crate::types::{AccountId, PositionId, FIXED_POINT_SCALAR};
use tracing::{debug, info, warn};

impl Engine {
    /// Liquidates `id` if it sits at or below the lower bound. A healthy or
    /// debt-free position returns an empty result instead of an error.
    pub fn liquidate(&mut self, caller: AccountId, id: PositionId) -> Result<LiquidationResult, EngineError> {
        self.ensure_exists(id)?;
        self.transact(&[id], |engine| {
            engine.apply_earmark();
            engine.sync_position(id)?;
            engine.liquidate_synced(caller, id)
        })
    }

    /// Liquidates every listed position in one transaction. Unknown ids and
    /// healthy positions are skipped.
    pub fn batch_liquidate(
        &mut self,
        caller: AccountId,
        ids: &[PositionId],
    ) -> Result<Vec<LiquidationResult>, EngineError> {
        let known: Vec<PositionId> = ids.iter().copied().filter(|id| self.ensure_exists(*id).is_ok()).collect();

        self.transact(&known, |engine| {
            engine.apply_earmark();
            let mut results = Vec::new();
            for id in &known {
                engine.sync_position(*id)?;
                let result = engine.liquidate_synced(caller, *id)?;
                if !result.is_empty() {
                    results.push(result);
                }
            }
            info!(requested = ids.len(), liquidated = results.len(), "liquidate: batch done");
            Ok(results)
        })
    }

    fn liquidate_synced(&mut self, caller: AccountId, id: PositionId) -> Result<LiquidationResult, EngineError> {
        let position = self.require(id)?;
        let (collateral, debt, earmarked) = (position.collateral, position.debt, position.earmarked);
        let mut result = LiquidationResult::none(id);

        if debt == 0 {
            return Ok(result);
        }
        if self.vault.convert_to_assets(FIXED_POINT_SCALAR) == 0 {
            warn!(position = %id, "liquidate: vault shares are worthless, skipped");
            return Ok(result);
        }
        if self.collateralization_of(collateral, debt) > self.params.collateralization_lower_bound {
            return Ok(result);
        }

        if earmarked > 0 {
            let (repaid_debt, repaid_shares) = self.force_repay(id, earmarked)?;
            result.repaid_shares = repaid_shares;
            result.debt_burned = repaid_debt;

            let position = self.require(id)?;
            let (collateral, debt) = (position.collateral, position.debt);
            if debt == 0 || self.collateralization_of(collateral, debt) > self.params.collateralization_lower_bound {
                let fee_shares = self.params.repayment_fee.apply(repaid_shares).min(collateral);
                self.take_collateral(id, fee_shares)?;
                if fee_shares > 0 {
                    self.queue(Effect::Shares { to: caller, shares: fee_shares });
                }
                result.fee_shares = fee_shares;
                self.emit_liquidation(caller, &result);
                return Ok(result);
            }
        }

        self.seize(caller, id, &mut result)?;
        Ok(result)
    }

    // 8.12: repay earmarked debt out of the position's own collateral.
    // returns the debt retired and the shares sent to the authority.
    fn force_repay(&mut self, id: PositionId, amount: u128) -> Result<(u128, u128), EngineError> {
        let reduced = self.release_debt(id, amount, true)?;
        if reduced.total == 0 {
            return Ok((0, 0));
        }

        let collateral = self.require(id)?.collateral;
        let shares = self.debt_to_yield(reduced.total).min(collateral);
        self.take_collateral(id, shares)?;

        let mut fee_shares = self.params.protocol_fee.apply(shares);
        if self.require(id)?.collateral > fee_shares {
            self.take_collateral(id, fee_shares)?;
            self.pay_protocol_fee(fee_shares);
        } else {
            fee_shares = 0;
        }
        self.queue(Effect::SharesToAuthority(shares));

        self.emit_event(EventPayload::ForceRepay(ForceRepayEvent {
            position_id: id,
            debt_credit: reduced.total,
            shares_paid: shares,
            fee_shares,
        }));
        debug!(position = %id, credit = reduced.total, shares, fee_shares, "liquidate: force repaid");
        Ok((reduced.total, shares))
    }

    // 8.13: the liquidation formula against what force repayment left
    fn seize(&mut self, caller: AccountId, id: PositionId, result: &mut LiquidationResult) -> Result<(), EngineError> {
        let position = self.require(id)?;
        let (collateral, debt) = (position.collateral, position.debt);
        let quote = calculate_liquidation(
            self.yield_to_debt(collateral),
            debt,
            self.params.minimum_collateralization,
            self.global_collateralization(),
            self.params.global_minimum_collateralization,
            self.params.liquidator_fee,
        );

        let seized = self.debt_to_yield(quote.collateral_to_seize).min(collateral);
        let fee_shares = self.debt_to_yield(quote.base_fee).min(seized);
        let reduced = self.release_debt(id, quote.debt_to_burn, true)?;
        self.take_collateral(id, seized)?;

        if seized > fee_shares {
            self.queue(Effect::SharesToAuthority(seized - fee_shares));
        }
        if fee_shares > 0 {
            self.queue(Effect::Shares { to: caller, shares: fee_shares });
        }

        let mut fee_underlying = 0;
        if quote.outsourced_fee > 0 {
            let owed = self.debt_to_underlying(quote.outsourced_fee);
            fee_underlying = self.fee_reserve.withdraw_up_to(owed);
            if fee_underlying < owed {
                warn!(position = %id, owed, paid = fee_underlying, "liquidate: fee reserve short");
            }
            if fee_underlying > 0 {
                self.queue(Effect::Underlying { to: caller, amount: fee_underlying });
            }
        }

        result.seized_shares = seized;
        result.debt_burned += reduced.total;
        result.fee_shares += fee_shares;
        result.fee_underlying = fee_underlying;
        if !result.is_empty() {
            self.emit_liquidation(caller, result);
        }
        Ok(())
    }

    fn take_collateral(&mut self, id: PositionId, shares: u128) -> Result<(), EngineError> {
        let block = self.current_block;
        let position = self.require_mut(id)?;
        position.collateral = position.collateral.saturating_sub(shares);
        position.updated_at = block;
        self.deposited_shares = self.deposited_shares.saturating_sub(shares);
        Ok(())
    }

    fn emit_liquidation(&mut self, liquidator: AccountId, result: &LiquidationResult) {
        self.emit_event(EventPayload::Liquidation(LiquidationEvent {
            position_id: result.position_id,
            liquidator,
            debt_burned: result.debt_burned,
            shares_seized: result.seized_shares,
            fee_shares: result.fee_shares,
            fee_underlying: result.fee_underlying,
        }));
        info!(
            position = %result.position_id,
            liquidator = %liquidator,
            debt_burned = result.debt_burned,
            repaid_shares = result.repaid_shares,
            seized_shares = result.seized_shares,
            fee_shares = result.fee_shares,
            fee_underlying = result.fee_underlying,
            "liquidate: executed"
        );
    }
}
