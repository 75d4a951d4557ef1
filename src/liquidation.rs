//! Liquidation policy.
//!
//! A position is liquidatable once its collateralization falls to or below
//! the lower bound. This module holds the pure decision function that sizes
//! a liquidation, and the fee reserve that tops up liquidator fees when a
//! position has no collateral surplus left to pay them from.

use crate::decay::mul_div;
use crate::types::{Bps, Ratio, FIXED_POINT_SCALAR};
use serde::{Deserialize, Serialize};

/// Sizing of one liquidation. Collateral and fees are in debt-token value,
/// the engine converts them to shares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationQuote {
    // includes base_fee
    pub collateral_to_seize: u128,
    pub debt_to_burn: u128,
    // paid from the seized collateral
    pub base_fee: u128,
    // paid from the fee reserve
    pub outsourced_fee: u128,
}

impl LiquidationQuote {
    pub fn is_full_seizure(&self, collateral: u128) -> bool {
        self.collateral_to_seize >= collateral && self.collateral_to_seize > 0
    }
}

/// Sizes a liquidation that brings the position back to `target`.
///
/// Underwater positions and positions in an undercollateralized system are
/// seized outright and their fee is outsourced. Otherwise the fee comes out
/// of the collateral surplus and just enough debt is burned to restore the
/// target ratio.
pub fn calculate_liquidation(
    collateral: u128,
    debt: u128,
    target: Ratio,
    system: Ratio,
    system_minimum: Ratio,
    fee: Bps,
) -> LiquidationQuote {
    if debt >= collateral {
        return LiquidationQuote {
            collateral_to_seize: collateral,
            debt_to_burn: debt,
            base_fee: 0,
            outsourced_fee: fee.apply(debt),
        };
    }

    // global health breach overrides individual health
    if system < system_minimum {
        return LiquidationQuote {
            collateral_to_seize: debt,
            debt_to_burn: debt,
            base_fee: 0,
            outsourced_fee: fee.apply(debt),
        };
    }

    let surplus = collateral - debt;
    let base_fee = fee.apply(surplus);
    let adjusted_collateral = collateral - base_fee;

    let minimum_collateral = target.apply(debt).unwrap_or(u128::MAX);
    if minimum_collateral <= adjusted_collateral {
        return LiquidationQuote {
            base_fee,
            ..LiquidationQuote::default()
        };
    }

    let denominator = target.scaled().saturating_sub(FIXED_POINT_SCALAR);
    let shortfall = minimum_collateral - adjusted_collateral;
    let debt_to_burn = match mul_div(shortfall, FIXED_POINT_SCALAR, denominator) {
        Some(burn) => burn.min(debt),
        // a target at or below 1.0 can only be met by clearing the debt
        None => debt,
    };

    LiquidationQuote {
        collateral_to_seize: (debt_to_burn + base_fee).min(collateral),
        debt_to_burn,
        base_fee,
        outsourced_fee: 0,
    }
}

/// External pool that funds outsourced liquidation fees, in underlying units.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeReserve {
    pub balance: u128,
    pub total_deposits: u128,
    pub total_payouts: u128,
}

impl FeeReserve {
    pub fn new(initial_balance: u128) -> Self {
        Self {
            balance: initial_balance,
            total_deposits: initial_balance,
            total_payouts: 0,
        }
    }

    pub fn deposit(&mut self, amount: u128) {
        self.balance += amount;
        self.total_deposits += amount;
    }

    /// Pays out up to `amount`, limited by the balance.
    pub fn withdraw_up_to(&mut self, amount: u128) -> u128 {
        let paid = amount.min(self.balance);
        self.balance -= paid;
        self.total_payouts += paid;
        paid
    }

    pub fn can_cover(&self, amount: u128) -> bool {
        self.balance >= amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: Ratio = Ratio::from_scaled(1_100_000_000_000_000_000);

    fn healthy_system() -> Ratio {
        Ratio::from_scaled(2 * FIXED_POINT_SCALAR)
    }

    #[test]
    fn underwater_position_is_fully_seized() {
        let quote = calculate_liquidation(90, 100, TARGET, healthy_system(), Ratio::ONE, Bps::new(500));
        assert_eq!(
            quote,
            LiquidationQuote {
                collateral_to_seize: 90,
                debt_to_burn: 100,
                base_fee: 0,
                outsourced_fee: 5,
            }
        );
        assert!(quote.is_full_seizure(90));
    }

    #[test]
    fn system_breach_seizes_debt_worth() {
        let system = Ratio::from_scaled(1_050_000_000_000_000_000);
        let quote = calculate_liquidation(150, 100, TARGET, system, TARGET, Bps::new(500));
        assert_eq!(quote.collateral_to_seize, 100);
        assert_eq!(quote.debt_to_burn, 100);
        assert_eq!(quote.base_fee, 0);
        assert_eq!(quote.outsourced_fee, 5);
    }

    #[test]
    fn healthy_after_fee_burns_nothing() {
        let quote = calculate_liquidation(150, 100, TARGET, healthy_system(), Ratio::ONE, Bps::new(500));
        assert_eq!(
            quote,
            LiquidationQuote {
                collateral_to_seize: 0,
                debt_to_burn: 0,
                base_fee: 2,
                outsourced_fee: 0,
            }
        );
    }

    #[test]
    fn partial_liquidation_restores_target() {
        // surplus 5 -> fee 0, need 110 of collateral against 100 of debt
        let quote = calculate_liquidation(105, 100, TARGET, healthy_system(), Ratio::ONE, Bps::new(500));
        assert_eq!(quote.base_fee, 0);
        // (110 - 105) / 0.1 = 50
        assert_eq!(quote.debt_to_burn, 50);
        assert_eq!(quote.collateral_to_seize, 50);

        let remaining_collateral = 105 - quote.collateral_to_seize;
        let remaining_debt = 100 - quote.debt_to_burn;
        assert!(Ratio::of(remaining_collateral, remaining_debt) >= TARGET);
    }

    #[test]
    fn fee_reserve_pays_up_to_balance() {
        let mut reserve = FeeReserve::new(100);
        reserve.deposit(20);
        assert_eq!(reserve.balance, 120);
        assert!(reserve.can_cover(120));

        assert_eq!(reserve.withdraw_up_to(50), 50);
        assert_eq!(reserve.withdraw_up_to(500), 70);
        assert_eq!(reserve.balance, 0);
        assert_eq!(reserve.total_payouts, 120);
    }
}
