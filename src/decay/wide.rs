// 2.1: 256-bit unsigned integer. just enough surface for Q128.128 weights,
// full u128 products, and mul_div on token amounts.

use serde::{Deserialize, Serialize};

const LOW_MASK: u128 = u64::MAX as u128;

/// Unsigned 256-bit integer stored as two u128 limbs. Field order makes the
/// derived `Ord` compare the high limb first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct U256 {
    hi: u128,
    lo: u128,
}

impl U256 {
    pub const ZERO: Self = Self { hi: 0, lo: 0 };
    pub const MAX: Self = Self { hi: u128::MAX, lo: u128::MAX };

    pub const fn from_u128(value: u128) -> Self {
        Self { hi: 0, lo: value }
    }

    pub const fn from_parts(hi: u128, lo: u128) -> Self {
        Self { hi, lo }
    }

    pub const fn hi(&self) -> u128 {
        self.hi
    }

    pub const fn lo(&self) -> u128 {
        self.lo
    }

    pub fn is_zero(&self) -> bool {
        self.hi == 0 && self.lo == 0
    }

    /// Narrows to u128 when the high limb is empty.
    pub fn to_u128(&self) -> Option<u128> {
        if self.hi == 0 {
            Some(self.lo)
        } else {
            None
        }
    }

    // schoolbook product on 64-bit halves, every partial fits a u128
    pub fn full_mul(a: u128, b: u128) -> Self {
        let (a1, a0) = (a >> 64, a & LOW_MASK);
        let (b1, b0) = (b >> 64, b & LOW_MASK);

        let p00 = a0 * b0;
        let p01 = a0 * b1;
        let p10 = a1 * b0;
        let p11 = a1 * b1;

        let mid = (p00 >> 64) + (p01 & LOW_MASK) + (p10 & LOW_MASK);
        let lo = (p00 & LOW_MASK) | ((mid & LOW_MASK) << 64);
        let hi = p11 + (p01 >> 64) + (p10 >> 64) + (mid >> 64);

        Self { hi, lo }
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        let (lo, carry) = self.lo.overflowing_add(other.lo);
        let hi = self.hi.checked_add(other.hi)?.checked_add(carry as u128)?;
        Some(Self { hi, lo })
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        if self <= other {
            return Self::ZERO;
        }
        let (lo, borrow) = self.lo.overflowing_sub(other.lo);
        Self {
            hi: self.hi - other.hi - borrow as u128,
            lo,
        }
    }

    pub fn shr(self, bits: u32) -> Self {
        match bits {
            0 => self,
            1..=127 => Self {
                hi: self.hi >> bits,
                lo: (self.lo >> bits) | (self.hi << (128 - bits)),
            },
            128..=255 => Self {
                hi: 0,
                lo: self.hi >> (bits - 128),
            },
            _ => Self::ZERO,
        }
    }

    // bits shifted past the top are dropped
    pub fn shl(self, bits: u32) -> Self {
        match bits {
            0 => self,
            1..=127 => Self {
                hi: (self.hi << bits) | (self.lo >> (128 - bits)),
                lo: self.lo << bits,
            },
            128..=255 => Self {
                hi: self.lo << (bits - 128),
                lo: 0,
            },
            _ => Self::ZERO,
        }
    }

    fn bit(&self, index: u32) -> bool {
        if index >= 128 {
            (self.hi >> (index - 128)) & 1 == 1
        } else {
            (self.lo >> index) & 1 == 1
        }
    }

    fn set_bit(&mut self, index: u32) {
        if index >= 128 {
            self.hi |= 1u128 << (index - 128);
        } else {
            self.lo |= 1u128 << index;
        }
    }

    /// Restoring long division by a u128 divisor. Panics on a zero divisor.
    pub fn div_rem_u128(self, divisor: u128) -> (Self, u128) {
        assert!(divisor != 0, "division by zero");

        let mut quotient = Self::ZERO;
        let mut remainder: u128 = 0;

        for index in (0..256).rev() {
            // remainder < divisor before the shift, so a set top bit means
            // the shifted value (2^128 + remainder) already exceeds divisor
            let carry = remainder >> 127;
            remainder = (remainder << 1) | self.bit(index) as u128;
            if carry == 1 || remainder >= divisor {
                remainder = remainder.wrapping_sub(divisor);
                quotient.set_bit(index);
            }
        }

        (quotient, remainder)
    }
}

impl From<u128> for U256 {
    fn from(value: u128) -> Self {
        Self::from_u128(value)
    }
}

/// `floor(a * b / denominator)`, or `None` when the quotient does not fit
/// in a u128 or the denominator is zero.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Option<u128> {
    if denominator == 0 {
        return None;
    }
    let (quotient, _) = U256::full_mul(a, b).div_rem_u128(denominator);
    quotient.to_u128()
}

/// `ceil(a * b / denominator)`.
pub fn mul_div_up(a: u128, b: u128, denominator: u128) -> Option<u128> {
    if denominator == 0 {
        return None;
    }
    let (quotient, remainder) = U256::full_mul(a, b).div_rem_u128(denominator);
    let quotient = quotient.to_u128()?;
    if remainder == 0 {
        Some(quotient)
    } else {
        quotient.checked_add(1)
    }
}
