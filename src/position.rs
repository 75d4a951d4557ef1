// 5.0: one collateral/debt account. collateral in vault shares, debt and
// earmarked in debt-token units. earmarked is the slice of debt already
// committed to redemption.
// 5.1 has the checkpoint commit used after sync at the bottom.

use crate::ledger::WeightSnapshot;
use crate::sync::Settlement;
use crate::types::{BlockNumber, PositionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub collateral: u128,
    pub debt: u128,
    pub earmarked: u128,
    // point-in-time collateral lock for the current debt
    pub raw_locked: u128,
    pub checkpoint: WeightSnapshot,
    // burn and repay are rejected in this block
    pub last_mint_block: Option<BlockNumber>,
    pub updated_at: BlockNumber,
}

impl Position {
    pub fn new(id: PositionId, checkpoint: WeightSnapshot, block: BlockNumber) -> Self {
        Self {
            id,
            collateral: 0,
            debt: 0,
            earmarked: 0,
            raw_locked: 0,
            checkpoint,
            last_mint_block: None,
            updated_at: block,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.collateral == 0 && self.debt == 0
    }

    pub fn unearmarked_debt(&self) -> u128 {
        self.debt - self.earmarked
    }

    pub fn minted_in(&self, block: BlockNumber) -> bool {
        self.last_mint_block == Some(block)
    }

    /// Collateral above `locked`, the lock required by the current debt.
    pub fn free_collateral(&self, locked: u128) -> u128 {
        self.collateral.saturating_sub(locked)
    }

    // 5.1: adopt a settlement and move every checkpoint to `now`
    pub fn commit(&mut self, settlement: &Settlement, now: WeightSnapshot, raw_locked: u128, block: BlockNumber) {
        self.collateral = settlement.collateral;
        self.debt = settlement.debt;
        self.earmarked = settlement.earmarked;
        self.raw_locked = raw_locked;
        self.checkpoint = now;
        self.updated_at = block;
    }

    /// Debt reduction: earmarked debt is consumed first.
    pub fn reduce_debt(&mut self, amount: u128) -> ReducedDebt {
        let amount = amount.min(self.debt);
        let from_earmarked = amount.min(self.earmarked);
        self.earmarked -= from_earmarked;
        self.debt -= amount;
        ReducedDebt { total: amount, from_earmarked }
    }

    /// Debt reduction that leaves earmarked debt alone.
    pub fn reduce_unearmarked(&mut self, amount: u128) -> ReducedDebt {
        let amount = amount.min(self.unearmarked_debt());
        self.debt -= amount;
        ReducedDebt { total: amount, from_earmarked: 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReducedDebt {
    pub total: u128,
    pub from_earmarked: u128,
}

/// Read-only view of a position as sync would leave it right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    pub id: PositionId,
    pub collateral: u128,
    pub debt: u128,
    pub earmarked: u128,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(debt: u128, earmarked: u128) -> Position {
        let mut position = Position::new(PositionId(1), WeightSnapshot::default(), BlockNumber(1));
        position.debt = debt;
        position.earmarked = earmarked;
        position
    }

    #[test]
    fn new_position_is_empty() {
        let position = position(0, 0);
        assert!(position.is_empty());
        assert!(!position.minted_in(BlockNumber(1)));
    }

    #[test]
    fn reduce_debt_hits_earmarked_first() {
        let mut position = position(1_000, 100);
        let reduced = position.reduce_debt(150);
        assert_eq!(reduced, ReducedDebt { total: 150, from_earmarked: 100 });
        assert_eq!(position.debt, 850);
        assert_eq!(position.earmarked, 0);
    }

    #[test]
    fn reduce_debt_clamps_to_debt() {
        let mut position = position(40, 10);
        let reduced = position.reduce_debt(1_000);
        assert_eq!(reduced.total, 40);
        assert_eq!(position.debt, 0);
    }

    #[test]
    fn reduce_unearmarked_keeps_earmark() {
        let mut position = position(1_000, 900);
        let reduced = position.reduce_unearmarked(500);
        assert_eq!(reduced.total, 100);
        assert_eq!(position.debt, 900);
        assert_eq!(position.earmarked, 900);
    }

    #[test]
    fn free_collateral_saturates() {
        let mut position = position(0, 0);
        position.collateral = 100;
        assert_eq!(position.free_collateral(30), 70);
        assert_eq!(position.free_collateral(300), 0);
    }
}
