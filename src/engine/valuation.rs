//! Share/debt conversions and collateralization.

use super::core::Engine;
use super::results::EngineError;
use crate::lock::required_lock;
use crate::types::{PositionId, Ratio};

impl Engine {
    /// Debt-token value of `shares`.
    pub fn yield_to_debt(&self, shares: u128) -> u128 {
        self.vault
            .convert_to_assets(shares)
            .saturating_mul(self.params.underlying_conversion_factor)
    }

    /// Shares worth `debt` debt tokens.
    pub fn debt_to_yield(&self, debt: u128) -> u128 {
        self.vault
            .convert_to_shares(debt / self.params.underlying_conversion_factor)
    }

    /// Underlying units of a debt amount, for payouts from the fee reserve.
    pub fn debt_to_underlying(&self, debt: u128) -> u128 {
        debt / self.params.underlying_conversion_factor
    }

    /// Shares that must stay locked behind `debt`.
    pub fn lock_for_debt(&self, debt: u128) -> Result<u128, EngineError> {
        Ok(required_lock(self.debt_to_yield(debt), self.params.minimum_collateralization)?)
    }

    /// Debt-token value of a position's stored collateral.
    pub fn total_value(&self, id: PositionId) -> Result<u128, EngineError> {
        Ok(self.yield_to_debt(self.require(id)?.collateral))
    }

    /// Protocol-wide collateral value over total debt.
    pub fn global_collateralization(&self) -> Ratio {
        Ratio::of(self.yield_to_debt(self.deposited_shares), self.ledger.total_debt)
    }

    pub(super) fn collateralization_of(&self, collateral: u128, debt: u128) -> Ratio {
        Ratio::of(self.yield_to_debt(collateral), debt)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ProtocolConfig;
    use crate::engine::{Engine, EngineConfig};
    use crate::types::{AccountId, Ratio, FIXED_POINT_SCALAR};

    #[test]
    fn six_decimal_underlying_scales_conversions() {
        let protocol = ProtocolConfig { underlying_decimals: 6, ..ProtocolConfig::default() };
        let (engine, mocks) = Engine::with_mocks(EngineConfig::with_protocol(protocol)).unwrap();
        mocks.vault.set_share_price(Ratio::from_scaled(2 * FIXED_POINT_SCALAR));

        // one share is two underlying units, 2e12 debt units
        assert_eq!(engine.yield_to_debt(1), 2_000_000_000_000);
        assert_eq!(engine.debt_to_yield(2_000_000_000_000), 1);
        assert_eq!(engine.debt_to_underlying(5_000_000_000_000), 5);
    }

    #[test]
    fn global_collateralization_without_debt_is_unbounded() {
        let (mut engine, _) = Engine::with_mocks(EngineConfig::default()).unwrap();
        engine.deposit(AccountId(1), 1_000, None).unwrap();
        assert_eq!(engine.global_collateralization(), Ratio::MAX);
    }
}
