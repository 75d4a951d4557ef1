// 6.0: debt/collateral lock accounting. minting locks collateral at the
// minimum collateralization at the moment of the mint. burning frees it.
// sync re-derives the lock from settled debt, so locks never drift far.

use crate::types::Ratio;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("insufficient free collateral: need {required} shares, have {available}")]
    InsufficientFreeCollateral { required: u128, available: u128 },

    #[error("lock for {0} shares overflows")]
    Overflow(u128),
}

/// Shares that must stay locked behind `debt_in_shares` of debt.
pub fn required_lock(debt_in_shares: u128, minimum_collateralization: Ratio) -> Result<u128, LockError> {
    minimum_collateralization
        .apply(debt_in_shares)
        .ok_or(LockError::Overflow(debt_in_shares))
}

// 6.1: check that `additional` can be locked on top of `current_lock`
pub fn reserve(collateral: u128, current_lock: u128, additional: u128) -> Result<u128, LockError> {
    let available = collateral.saturating_sub(current_lock);
    if available < additional {
        return Err(LockError::InsufficientFreeCollateral {
            required: additional,
            available,
        });
    }
    Ok(current_lock + additional)
}

// 6.2: shares actually freed from the global pool. a liquidation or a
// rounding step may already have released part of it.
pub fn release(total_locked: u128, to_free: u128) -> u128 {
    to_free.min(total_locked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn min_coll() -> Ratio {
        Ratio::from_scaled(1_500_000_000_000_000_000)
    }

    #[test]
    fn lock_scales_with_minimum_collateralization() {
        assert_eq!(required_lock(1_000, min_coll()), Ok(1_500));
        assert_eq!(required_lock(0, min_coll()), Ok(0));
        assert_eq!(required_lock(u128::MAX, min_coll()), Err(LockError::Overflow(u128::MAX)));
    }

    #[test]
    fn reserve_rejects_when_free_collateral_short() {
        assert_eq!(reserve(2_000, 1_500, 500), Ok(2_000));
        assert_eq!(
            reserve(2_000, 1_500, 501),
            Err(LockError::InsufficientFreeCollateral { required: 501, available: 500 })
        );
        // lock above collateral after a redemption leaves nothing free
        assert!(reserve(1_000, 1_200, 1).is_err());
    }

    #[test]
    fn release_is_clamped_to_pool() {
        assert_eq!(release(100, 40), 40);
        assert_eq!(release(100, 400), 100);
        assert_eq!(release(0, 1), 0);
    }
}
