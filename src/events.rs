// 11.0: every state change produces an event. used for audit trails and for
// reconstructing how a position got to its current state. amounts are raw
// token units: shares for collateral, debt-token units for debt.

use crate::decay::Weight;
use crate::types::{AccountId, BlockNumber, PositionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub block: BlockNumber,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, block: BlockNumber, payload: EventPayload) -> Self {
        Self { id, block, payload }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    // Position lifecycle
    PositionOpened(PositionOpenedEvent),
    Deposit(DepositEvent),
    Withdraw(WithdrawEvent),

    // Debt
    Mint(MintEvent),
    Burn(BurnEvent),
    Repay(RepayEvent),
    ForceRepay(ForceRepayEvent),

    // Global decay
    Earmark(EarmarkEvent),
    Redemption(RedemptionEvent),

    // Risk
    Liquidation(LiquidationEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub position_id: PositionId,
    pub owner: AccountId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositEvent {
    pub position_id: PositionId,
    pub shares: u128,
    pub new_collateral: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawEvent {
    pub position_id: PositionId,
    pub recipient: AccountId,
    pub shares: u128,
    pub new_collateral: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintEvent {
    pub position_id: PositionId,
    pub recipient: AccountId,
    pub amount: u128,
    pub new_debt: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurnEvent {
    pub position_id: PositionId,
    pub amount: u128,
    pub new_debt: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepayEvent {
    pub position_id: PositionId,
    pub debt_credit: u128,
    pub shares_paid: u128,
    pub fee_shares: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForceRepayEvent {
    pub position_id: PositionId,
    pub debt_credit: u128,
    pub shares_paid: u128,
    pub fee_shares: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarmarkEvent {
    pub from_block: BlockNumber,
    pub demand: u128,
    pub cover: u128,
    pub earmarked: u128,
    pub earmark_weight: Weight,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionEvent {
    pub requested: u128,
    pub cover: u128,
    pub redeemed: u128,
    pub shares_out: u128,
    pub fee_shares: u128,
    pub redemption_weight: Weight,
    pub collateral_weight: Weight,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub position_id: PositionId,
    pub liquidator: AccountId,
    pub debt_burned: u128,
    pub shares_seized: u128,
    pub fee_shares: u128,
    pub fee_underlying: u128,
}
