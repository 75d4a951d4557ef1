// 7.0 config.rs: every protocol knob in one place. ratios, fees, decimals.
// 7.1 human-readable ProtocolConfig resolves into integer ProtocolParams.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Bps, Ratio};

/// Largest supported underlying decimals. Debt tokens carry 18.
pub const DEBT_DECIMALS: u8 = 18;

/** 7.2: protocol settings. ratios as decimals (1.1 = 110%), fees in bps */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    // Collateral that must stay locked per unit of debt
    pub minimum_collateralization: Decimal,
    // Positions at or below this ratio may be liquidated
    pub collateralization_lower_bound: Decimal,
    // Below this protocol-wide ratio every liquidation seizes fully
    pub global_minimum_collateralization: Decimal,
    // Charged on redeemed and repaid collateral
    pub protocol_fee_bps: u32,
    // Liquidator reward on full liquidations
    pub liquidator_fee_bps: u32,
    // Liquidator reward when force repayment alone restores health
    pub repayment_fee_bps: u32,
    // Decimals of the vault's underlying token
    pub underlying_decimals: u8,
    // Only account allowed to call redeem
    pub redemption_authority: AccountId,
    // Receives protocol fees
    pub protocol_fee_receiver: AccountId,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            minimum_collateralization: dec!(1.111111111111111111), // 90% LTV
            collateralization_lower_bound: dec!(1.052631578947368421), // 95% LTV
            global_minimum_collateralization: dec!(1.111111111111111111),
            protocol_fee_bps: 100,   // 1%
            liquidator_fee_bps: 300, // 3%
            repayment_fee_bps: 100,  // 1%
            underlying_decimals: 18,
            redemption_authority: AccountId(1_000_000),
            protocol_fee_receiver: AccountId(1_000_001),
        }
    }
}

impl ProtocolConfig {
    // Testnet: fee-free redemptions, loose thresholds
    pub fn testnet() -> Self {
        Self {
            minimum_collateralization: dec!(1.5),
            collateralization_lower_bound: dec!(1.2),
            global_minimum_collateralization: dec!(1.2),
            protocol_fee_bps: 0,
            ..Self::default()
        }
    }

    // Mainnet preset with conservative ratios
    pub fn mainnet_conservative() -> Self {
        Self {
            minimum_collateralization: dec!(2),
            collateralization_lower_bound: dec!(1.5),
            global_minimum_collateralization: dec!(1.5),
            liquidator_fee_bps: 500,
            ..Self::default()
        }
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minimum_collateralization <= Decimal::ONE {
            return Err(ConfigError::InvalidRatio {
                reason: "minimum collateralization must exceed 1".to_string(),
            });
        }

        if self.collateralization_lower_bound < Decimal::ONE
            || self.collateralization_lower_bound > self.minimum_collateralization
        {
            return Err(ConfigError::InvalidRatio {
                reason: "lower bound must be within [1, minimum collateralization]".to_string(),
            });
        }

        if self.global_minimum_collateralization < Decimal::ONE {
            return Err(ConfigError::InvalidRatio {
                reason: "global minimum collateralization must be at least 1".to_string(),
            });
        }

        for (name, bps) in [
            ("protocol", self.protocol_fee_bps),
            ("liquidator", self.liquidator_fee_bps),
            ("repayment", self.repayment_fee_bps),
        ] {
            if !Bps::new(bps).is_valid() {
                return Err(ConfigError::InvalidFee {
                    reason: format!("{name} fee {bps} exceeds 10000 bps"),
                });
            }
        }

        if self.underlying_decimals > DEBT_DECIMALS {
            return Err(ConfigError::InvalidDecimals(self.underlying_decimals));
        }

        Ok(())
    }

    /// Validates and converts to the integer form the engine runs on.
    pub fn resolve(&self) -> Result<ProtocolParams, ConfigError> {
        self.validate()?;
        Ok(ProtocolParams {
            minimum_collateralization: to_ratio("minimum collateralization", self.minimum_collateralization)?,
            collateralization_lower_bound: to_ratio("lower bound", self.collateralization_lower_bound)?,
            global_minimum_collateralization: to_ratio(
                "global minimum collateralization",
                self.global_minimum_collateralization,
            )?,
            protocol_fee: Bps::new(self.protocol_fee_bps),
            liquidator_fee: Bps::new(self.liquidator_fee_bps),
            repayment_fee: Bps::new(self.repayment_fee_bps),
            underlying_conversion_factor: 10u128.pow(u32::from(DEBT_DECIMALS - self.underlying_decimals)),
            redemption_authority: self.redemption_authority,
            protocol_fee_receiver: self.protocol_fee_receiver,
        })
    }
}

fn to_ratio(name: &str, value: Decimal) -> Result<Ratio, ConfigError> {
    Ratio::from_decimal(value).ok_or_else(|| ConfigError::InvalidRatio {
        reason: format!("{name} {value} is not representable at 18 decimals"),
    })
}

/// Resolved protocol parameters. Ratios scaled by 1e18.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParams {
    pub minimum_collateralization: Ratio,
    pub collateralization_lower_bound: Ratio,
    pub global_minimum_collateralization: Ratio,
    pub protocol_fee: Bps,
    pub liquidator_fee: Bps,
    pub repayment_fee: Bps,
    // 10^(18 - underlying decimals)
    pub underlying_conversion_factor: u128,
    pub redemption_authority: AccountId,
    pub protocol_fee_receiver: AccountId,
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid ratio: {reason}")]
    InvalidRatio { reason: String },

    #[error("invalid fee: {reason}")]
    InvalidFee { reason: String },

    #[error("underlying decimals {0} exceed 18")]
    InvalidDecimals(u8),
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> ProtocolConfig {
        match self {
            Environment::Development => ProtocolConfig::default(),
            Environment::Testnet => ProtocolConfig::testnet(),
            Environment::Mainnet => ProtocolConfig::mainnet_conservative(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = ProtocolConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_testnet_config_valid() {
        let config = ProtocolConfig::testnet();
        assert!(config.validate().is_ok());
        assert_eq!(config.protocol_fee_bps, 0);
    }

    #[test]
    fn test_mainnet_config_valid() {
        let config = ProtocolConfig::mainnet_conservative();
        assert!(config.validate().is_ok());
        assert_eq!(config.minimum_collateralization, dec!(2));
    }

    #[test]
    fn test_resolve_scales_ratios() {
        let params = ProtocolConfig::default().resolve().unwrap();
        assert_eq!(params.minimum_collateralization.scaled(), 1_111_111_111_111_111_111);
        assert_eq!(params.underlying_conversion_factor, 1);

        let six_decimals = ProtocolConfig { underlying_decimals: 6, ..ProtocolConfig::default() };
        assert_eq!(six_decimals.resolve().unwrap().underlying_conversion_factor, 1_000_000_000_000);
    }

    #[test]
    fn test_invalid_minimum() {
        let config = ProtocolConfig { minimum_collateralization: dec!(1), ..ProtocolConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRatio { .. })));
    }

    #[test]
    fn test_lower_bound_above_minimum() {
        let config = ProtocolConfig { collateralization_lower_bound: dec!(3), ..ProtocolConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRatio { .. })));
    }

    #[test]
    fn test_invalid_fee() {
        let config = ProtocolConfig { liquidator_fee_bps: 10_001, ..ProtocolConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidFee { .. })));
    }

    #[test]
    fn test_invalid_decimals() {
        let config = ProtocolConfig { underlying_decimals: 19, ..ProtocolConfig::default() };
        assert_eq!(config.validate(), Err(ConfigError::InvalidDecimals(19)));
    }

    #[test]
    fn test_environment_presets() {
        assert!(Environment::Development.config().validate().is_ok());
        assert!(Environment::Testnet.config().validate().is_ok());
        assert!(Environment::Mainnet.config().validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = ProtocolConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: ProtocolConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
