// 1.0: primitives. ids, blocks, 1e18 ratios, basis points. each is a newtype
// so a position id never gets passed where an account id belongs.
// token amounts are plain u128 integer units.

use crate::decay::mul_div;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 10^18, the scale of every `Ratio`.
pub const FIXED_POINT_SCALAR: u128 = 1_000_000_000_000_000_000;

/// 10000 basis points = 100%.
pub const BPS_SCALE: u32 = 10_000;

// 1.1: position identity. 0 is reserved and never minted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionId(pub u64);

impl PositionId {
    pub const NONE: Self = Self(0);

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// 1.2: caller identity (owner, liquidator, redemption authority)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acct:{}", self.0)
    }
}

// 1.3: block height. earmark is idempotent per block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockNumber(pub u64);

impl BlockNumber {
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 1.4: ratio scaled by 1e18. collateralization, health thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ratio(u128);

impl Ratio {
    pub const ONE: Self = Self(FIXED_POINT_SCALAR);
    pub const MAX: Self = Self(u128::MAX);

    pub const fn from_scaled(scaled: u128) -> Self {
        Self(scaled)
    }

    pub const fn scaled(&self) -> u128 {
        self.0
    }

    /// Exact conversion from a human-readable decimal such as `1.1`.
    /// Negative values and more than 18 decimal places are rejected.
    pub fn from_decimal(value: Decimal) -> Option<Self> {
        if value.is_sign_negative() {
            return None;
        }
        let scaled = value.checked_mul(Decimal::from(FIXED_POINT_SCALAR as u64))?;
        if scaled.fract() != Decimal::ZERO {
            return None;
        }
        scaled.to_u128().map(Self)
    }

    /// Lossy when the ratio exceeds Decimal's 96-bit mantissa.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::try_from_i128_with_scale(self.0 as i128, 18).unwrap_or(Decimal::MAX)
    }

    /// `numerator / denominator` as a ratio, `MAX` for a zero denominator.
    pub fn of(numerator: u128, denominator: u128) -> Self {
        if denominator == 0 {
            return Self::MAX;
        }
        Self(mul_div(numerator, FIXED_POINT_SCALAR, denominator).unwrap_or(u128::MAX))
    }

    /// `floor(value * self)`, `None` on overflow.
    pub fn apply(&self, value: u128) -> Option<u128> {
        mul_div(value, self.0, FIXED_POINT_SCALAR)
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::MAX {
            write!(f, "inf")
        } else {
            write!(f, "{}", self.to_decimal().normalize())
        }
    }
}

// 1.5: basis points. 100 bps = 1%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Bps(u32);

impl Bps {
    pub const ZERO: Self = Self(0);

    pub fn new(bps: u32) -> Self {
        Self(bps)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    pub fn as_fraction(&self) -> Decimal {
        Decimal::new(self.0 as i64, 4)
    }

    /// `floor(amount * bps / 10000)`.
    pub fn apply(&self, amount: u128) -> u128 {
        mul_div(amount, u128::from(self.0), u128::from(BPS_SCALE)).unwrap_or(u128::MAX)
    }

    pub fn is_valid(&self) -> bool {
        self.0 <= BPS_SCALE
    }
}

impl fmt::Display for Bps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}bps", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn position_zero_is_reserved() {
        assert!(!PositionId::NONE.is_valid());
        assert!(PositionId(1).is_valid());
    }

    #[test]
    fn ratio_decimal_conversion() {
        let ratio = Ratio::from_decimal(dec!(1.1)).unwrap();
        assert_eq!(ratio.scaled(), 1_100_000_000_000_000_000);
        assert_eq!(ratio.to_decimal(), dec!(1.1));
        assert!(Ratio::from_decimal(dec!(-1)).is_none());
        assert!(Ratio::from_decimal(dec!(0.0000000000000000001)).is_none());
    }

    #[test]
    fn ratio_of_amounts() {
        assert_eq!(Ratio::of(150, 100), Ratio::from_scaled(1_500_000_000_000_000_000));
        assert_eq!(Ratio::of(1, 0), Ratio::MAX);
        assert_eq!(Ratio::ONE.apply(42), Some(42));
    }

    #[test]
    fn bps_conversion() {
        let hundred_bps = Bps::new(100);
        assert_eq!(hundred_bps.as_fraction(), dec!(0.01)); // 1%
        assert_eq!(hundred_bps.apply(10_000), 100);

        let fifty_bps = Bps::new(50);
        assert_eq!(fifty_bps.as_fraction(), dec!(0.005)); // 0.5%
        assert_eq!(fifty_bps.apply(199), 0);

        assert!(!Bps::new(10_001).is_valid());
    }
}
