// 2.0: decay math. repeated multiplicative shrinkage kept as additive
// log2 weights so a position can catch up on any number of global events
// with one exponentiation.
//
// weights are Q128.128 (integer part in the high limb), fractions are Q0.128
// held in a U256 so exactly 1.0 is representable.

pub mod wide;
mod exp2;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use wide::{mul_div, mul_div_up, U256};

/// Weight recorded when an entire quantity is consumed: `-log2(2^-128)`.
const FULL_DEPLETION_BITS: u128 = 128;

// 2.0.1: monotonic Q128.128 log weight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Weight(U256);

impl Weight {
    pub const ZERO: Self = Self(U256::ZERO);
    pub const FULL_DEPLETION: Self = Self(U256::from_parts(FULL_DEPLETION_BITS, 0));

    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Adds an increment to an accumulator. Overflow is an implementation
    /// defect, the accumulator would need 2^128 full depletions to get there.
    pub fn accumulate(&mut self, increment: Weight) {
        self.0 = match self.0.checked_add(increment.0) {
            Some(sum) => sum,
            None => panic!("weight accumulator overflow"),
        };
    }

    pub fn saturating_sub(self, earlier: Weight) -> Weight {
        Self(self.0.saturating_sub(earlier.0))
    }

    /// Lossy view for logs and reports.
    pub fn as_f64(&self) -> f64 {
        self.0.hi() as f64 + self.0.lo() as f64 / 2f64.powi(128)
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.12}", self.as_f64())
    }
}

// 2.0.2: Q0.128 fraction in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fraction(U256);

impl Fraction {
    pub const ZERO: Self = Self(U256::ZERO);
    pub const ONE: Self = Self(U256::from_parts(1, 0));

    pub fn from_raw(raw: U256) -> Self {
        assert!(raw <= Self::ONE.0, "fraction above one");
        Self(raw)
    }

    pub const fn raw(&self) -> U256 {
        self.0
    }

    /// `numerator / denominator`, rounded down.
    pub fn from_ratio(numerator: u128, denominator: u128) -> Self {
        assert!(denominator != 0, "fraction with zero denominator");
        assert!(numerator <= denominator, "fraction above one");
        if numerator == denominator {
            return Self::ONE;
        }
        let (quotient, _) = U256::from_parts(numerator, 0).div_rem_u128(denominator);
        Self(quotient)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_one(&self) -> bool {
        *self == Self::ONE
    }

    // below one the value is entirely in the low limb
    fn bits(&self) -> u128 {
        self.0.lo()
    }

    /// Product of two fractions, rounded down.
    pub fn mul(self, other: Fraction) -> Fraction {
        if self.is_one() {
            return other;
        }
        if other.is_one() {
            return self;
        }
        Self(U256::from_u128(U256::full_mul(self.bits(), other.bits()).hi()))
    }

    /// `floor(value * self)`.
    pub fn apply(self, value: u128) -> u128 {
        if self.is_one() {
            return value;
        }
        U256::full_mul(value, self.bits()).hi()
    }

    /// `ceil(value * self)`.
    pub fn apply_ceil(self, value: u128) -> u128 {
        if self.is_one() {
            return value;
        }
        let product = U256::full_mul(value, self.bits());
        product.hi() + (product.lo() != 0) as u128
    }

    pub fn as_f64(&self) -> f64 {
        if self.is_one() {
            1.0
        } else {
            self.bits() as f64 / 2f64.powi(128)
        }
    }
}

impl fmt::Display for Fraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.12}", self.as_f64())
    }
}

// 2.0.3: running Q128.128 sum of survival-weighted earmark shares. rounding
// can carry it past one, so unlike Fraction it is never capped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Accumulator(U256);

impl Accumulator {
    pub const ZERO: Self = Self(U256::ZERO);

    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> U256 {
        self.0
    }

    pub fn add(&mut self, share: Fraction) {
        self.0 = match self.0.checked_add(share.0) {
            Some(sum) => sum,
            None => panic!("survival accumulator overflow"),
        };
    }

    /// `self * survival`, rounded down.
    pub fn decay(self, survival: Fraction) -> Accumulator {
        if survival.is_one() {
            return self;
        }
        let bits = survival.bits();
        let whole = U256::full_mul(self.0.hi(), bits);
        let part = U256::full_mul(self.0.lo(), bits).hi();
        // the product never exceeds self
        match whole.checked_add(U256::from_u128(part)) {
            Some(product) => Self(product),
            None => self,
        }
    }

    pub fn saturating_sub(self, other: Accumulator) -> Accumulator {
        Self(self.0.saturating_sub(other.0))
    }

    /// `self / base` as a fraction, capped at one.
    pub fn ratio_to(self, base: Fraction) -> Fraction {
        if self.0 >= base.0 {
            return Fraction::ONE;
        }
        // self < base <= 1, so the value sits in the low limb
        if base.is_one() {
            return Fraction(self.0);
        }
        let (quotient, _) = U256::from_parts(self.0.lo(), 0).div_rem_u128(base.bits());
        Fraction(quotient)
    }

    pub fn as_f64(&self) -> f64 {
        self.0.hi() as f64 + self.0.lo() as f64 / 2f64.powi(128)
    }
}

impl From<Fraction> for Accumulator {
    fn from(fraction: Fraction) -> Self {
        Self(fraction.0)
    }
}

impl fmt::Display for Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.12}", self.as_f64())
    }
}

// 2.1: weight contributed by removing `reduced` out of `total`
pub fn weight_increment(reduced: u128, total: u128) -> Weight {
    assert!(reduced <= total, "decay: reduced {reduced} exceeds total {total}");

    if reduced == 0 {
        return Weight::ZERO;
    }
    if reduced == total {
        return Weight::FULL_DEPLETION;
    }

    let remaining = Fraction::from_ratio(total - reduced, total);
    if remaining.is_zero() {
        return Weight::FULL_DEPLETION;
    }

    Weight(exp2::log2_neg_frac(remaining.bits()))
}

// 2.2: 2^-weight. zero weight is exact full survival.
pub fn survival_from_weight(weight: Weight) -> Fraction {
    if weight.is_zero() {
        return Fraction::ONE;
    }
    Fraction(exp2::exp2_neg_frac(weight.0))
}

/// Survival used as a normaliser. A fully decayed weight reads as one so
/// callers never divide by zero.
pub fn survival_or_one(weight: Weight) -> Fraction {
    let survival = survival_from_weight(weight);
    if survival.is_zero() {
        Fraction::ONE
    } else {
        survival
    }
}

// 2.3: portion of `value` consumed by a weight delta
pub fn scale_by_weight_delta(value: u128, delta: Weight) -> u128 {
    if delta.is_zero() {
        return 0;
    }
    value - survival_from_weight(delta).apply(value)
}
