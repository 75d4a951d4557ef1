// 8.0.2: result types and errors for engine operations.

use crate::config::ConfigError;
use crate::external::TokenError;
use crate::lock::LockError;
use crate::types::{AccountId, PositionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepayResult {
    pub debt_credit: u128,
    pub shares_paid: u128,
    pub fee_shares: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedemptionResult {
    // earmarked debt retired, cover included
    pub redeemed: u128,
    pub cover: u128,
    pub shares_out: u128,
    pub fee_shares: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationResult {
    pub position_id: PositionId,
    // shares force-repaid against earmarked debt
    pub repaid_shares: u128,
    // shares seized by the liquidation formula, fee included
    pub seized_shares: u128,
    pub debt_burned: u128,
    pub fee_shares: u128, // paid to the liquidator
    pub fee_underlying: u128, // outsourced, from the fee reserve
}

impl LiquidationResult {
    pub fn none(position_id: PositionId) -> Self {
        Self {
            position_id,
            repaid_shares: 0,
            seized_shares: 0,
            debt_burned: 0,
            fee_shares: 0,
            fee_underlying: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.repaid_shares == 0 && self.seized_shares == 0 && self.debt_burned == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Amount must be non-zero")]
    ZeroAmount,

    #[error("Position id {0} is reserved")]
    InvalidPositionId(PositionId),

    #[error("Position {0} not found")]
    PositionNotFound(PositionId),

    #[error("Position {position} undercollateralized: requested {requested}, free {available}")]
    Undercollateralized { position: PositionId, requested: u128, available: u128 },

    #[error("Position {0} has no debt")]
    NoDebt(PositionId),

    #[error("Position {0} minted in this block")]
    RepayOnMintBlock(PositionId),

    #[error("Position {position} has no unearmarked debt for a burn of {requested}")]
    InsufficientUnearmarkedDebt { position: PositionId, requested: u128 },

    #[error("Position {position} holds {available} shares, needs {required}")]
    InsufficientCollateral { position: PositionId, required: u128, available: u128 },

    #[error("{caller} does not own position {position}")]
    NotOwner { position: PositionId, caller: AccountId },

    #[error("{0} is not the redemption authority")]
    NotRedemptionAuthority(AccountId),

    #[error("Amount overflow")]
    AmountOverflow,

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}
