// 2.2: binary log/exp primitives on Q128.128. integer-only so every
// implementation lands on the same bits.

use super::wide::U256;

/// Correction constants `ceil(2^128 * 2^-(2^-k))` for k = 1..=127, high
/// fractional bit first. The 2^-128 bit has no entry: its constant rounds
/// up to exactly one.
const EXP2_NEG_TABLE: [u128; 127] = [
    0xb504f333f9de6484597d89b3754abea0, // 2^-(2^-1)
    0xd744fccad69d6af439a68bb9902d3fdf, // 2^-(2^-2)
    0xeac0c6e7dd24392ed02d75b3706e54fb, // 2^-(2^-3)
    0xf5257d152486cc2c7b9d0c7aed980fc4, // 2^-(2^-4)
    0xfa83b2db722a033a7c25bb14315d7fcd, // 2^-(2^-5)
    0xfd3e0c0cf486c174853f3a5931e0ee04, // 2^-(2^-6)
    0xfe9e115c7b8f884badd25995e79d2f0a, // 2^-(2^-7)
    0xff4ecb59511ec8a5301ba217ef18dd7d, // 2^-(2^-8)
    0xffa756521c8daed19f3a1b48fb94c58a, // 2^-(2^-9)
    0xffd3a751c0f7e10bd3b9f8ae012fbe07, // 2^-(2^-10)
    0xffe9d2b2f7db2755ddf1d28a378a438d, // 2^-(2^-11)
    0xfff4e91bff1b8c3d88338e0ebf284a4e, // 2^-(2^-12)
    0xfffa747ea0040664238f92f792405806, // 2^-(2^-13)
    0xfffd3a3b7814eb53cd7629d70fea116b, // 2^-(2^-14)
    0xfffe9d1cc60ddab126de1aec4a87e7b9, // 2^-(2^-15)
    0xffff4e8e25879bfa09ea263360240c1b, // 2^-(2^-16)
    0xffffa7470363f4515426d76c762b6b62, // 2^-(2^-17)
    0xffffd3a37dda03133bde87a8379c8933, // 2^-(2^-18)
    0xffffe9d1bdf703aef21ea4dcfb0682d9, // 2^-(2^-19)
    0xfffff4e8debe025e24128a3d460731f2, // 2^-(2^-20)
    0xfffffa746f4fa1506788fbc89750bf72, // 2^-(2^-21)
    0xfffffd3a37a3f8b07e7c4871dc00d76f, // 2^-(2^-22)
    0xfffffe9d1bd1065a50971275792f1c84, // 2^-(2^-23)
    0xffffff4e8de845adac77243cd0914b38, // 2^-(2^-24)
    0xffffffa746f41376f74124cd483186d5, // 2^-(2^-25)
    0xffffffd3a37a05e383e14c90273c94f6, // 2^-(2^-26)
    0xffffffe9d1bd01fbc400bf822dc936b6, // 2^-(2^-27)
    0xfffffff4e8de80c062846365949b61b0, // 2^-(2^-28)
    0xfffffffa746f4050d1633246a8a0e09b, // 2^-(2^-29)
    0xfffffffd3a37a02490b9d93da3c1ebd0, // 2^-(2^-30)
    0xfffffffe9d1bd011525efca410b8eab8, // 2^-(2^-31)
    0xffffffff4e8de8086bb002532d71e54e, // 2^-(2^-32)
    0xffffffffa746f40426782229daaa3cfb, // 2^-(2^-33)
    0xffffffffd3a37a020f641954fda6eede, // 2^-(2^-34)
    0xffffffffe9d1bd0106bc0eba82d29b41, // 2^-(2^-35)
    0xfffffffff4e8de80832087e142666c8c, // 2^-(2^-36)
    0xfffffffffa746f404180e411a17228c0, // 2^-(2^-37)
    0xfffffffffd3a37a020bc9a1110c8c657, // 2^-(2^-38)
    0xfffffffffe9d1bd0105d570a98684e54, // 2^-(2^-39)
    0xffffffffff4e8de8082e6e05d03521ca, // 2^-(2^-40)
    0xffffffffffa746f4041727a3091acf88, // 2^-(2^-41)
    0xffffffffffd3a37a020b8ff98ccd776c, // 2^-(2^-42)
    0xffffffffffe9d1bd0105c706c876bfa0, // 2^-(2^-43)
    0xfffffffffff4e8de8082e345e4bf60cb, // 2^-(2^-44)
    0xfffffffffffa746f404171939280b0a4, // 2^-(2^-45)
    0xfffffffffffd3a37a020b8c5f1489862, // 2^-(2^-46)
    0xfffffffffffe9d1bd0105c6202a65c35, // 2^-(2^-47)
    0xffffffffffff4e8de8082e30c3d3b21c, // 2^-(2^-48)
    0xffffffffffffa746f40417185289fa0e, // 2^-(2^-49)
    0xffffffffffffd3a37a020b8c256d0548, // 2^-(2^-50)
    0xffffffffffffe9d1bd0105c611c084b4, // 2^-(2^-51)
    0xfffffffffffff4e8de8082e308a2c2de, // 2^-(2^-52)
    0xfffffffffffffa746f40417184420190, // 2^-(2^-53)
    0xfffffffffffffd3a37a020b8c21d28d1, // 2^-(2^-54)
    0xfffffffffffffe9d1bd0105c610d9e6b, // 2^-(2^-55)
    0xffffffffffffff4e8de8082e308691b6, // 2^-(2^-56)
    0xffffffffffffffa746f404171843397b, // 2^-(2^-57)
    0xffffffffffffffd3a37a020b8c2198e6, // 2^-(2^-58)
    0xffffffffffffffe9d1bd0105c610cb7d, // 2^-(2^-59)
    0xfffffffffffffff4e8de8082e3086581, // 2^-(2^-60)
    0xfffffffffffffffa746f4041718432b2, // 2^-(2^-61)
    0xfffffffffffffffd3a37a020b8c21955, // 2^-(2^-62)
    0xfffffffffffffffe9d1bd0105c610caa, // 2^-(2^-63)
    0xffffffffffffffff4e8de8082e308655, // 2^-(2^-64)
    0xffffffffffffffffa746f4041718432b, // 2^-(2^-65)
    0xffffffffffffffffd3a37a020b8c2196, // 2^-(2^-66)
    0xffffffffffffffffe9d1bd0105c610cb, // 2^-(2^-67)
    0xfffffffffffffffff4e8de8082e30866, // 2^-(2^-68)
    0xfffffffffffffffffa746f4041718433, // 2^-(2^-69)
    0xfffffffffffffffffd3a37a020b8c21a, // 2^-(2^-70)
    0xfffffffffffffffffe9d1bd0105c610d, // 2^-(2^-71)
    0xffffffffffffffffff4e8de8082e3087, // 2^-(2^-72)
    0xffffffffffffffffffa746f404171844, // 2^-(2^-73)
    0xffffffffffffffffffd3a37a020b8c22, // 2^-(2^-74)
    0xffffffffffffffffffe9d1bd0105c611, // 2^-(2^-75)
    0xfffffffffffffffffff4e8de8082e309, // 2^-(2^-76)
    0xfffffffffffffffffffa746f40417185, // 2^-(2^-77)
    0xfffffffffffffffffffd3a37a020b8c3, // 2^-(2^-78)
    0xfffffffffffffffffffe9d1bd0105c62, // 2^-(2^-79)
    0xffffffffffffffffffff4e8de8082e31, // 2^-(2^-80)
    0xffffffffffffffffffffa746f4041719, // 2^-(2^-81)
    0xffffffffffffffffffffd3a37a020b8d, // 2^-(2^-82)
    0xffffffffffffffffffffe9d1bd0105c7, // 2^-(2^-83)
    0xfffffffffffffffffffff4e8de8082e4, // 2^-(2^-84)
    0xfffffffffffffffffffffa746f404172, // 2^-(2^-85)
    0xfffffffffffffffffffffd3a37a020b9, // 2^-(2^-86)
    0xfffffffffffffffffffffe9d1bd0105d, // 2^-(2^-87)
    0xffffffffffffffffffffff4e8de8082f, // 2^-(2^-88)
    0xffffffffffffffffffffffa746f40418, // 2^-(2^-89)
    0xffffffffffffffffffffffd3a37a020c, // 2^-(2^-90)
    0xffffffffffffffffffffffe9d1bd0106, // 2^-(2^-91)
    0xfffffffffffffffffffffff4e8de8083, // 2^-(2^-92)
    0xfffffffffffffffffffffffa746f4042, // 2^-(2^-93)
    0xfffffffffffffffffffffffd3a37a021, // 2^-(2^-94)
    0xfffffffffffffffffffffffe9d1bd011, // 2^-(2^-95)
    0xffffffffffffffffffffffff4e8de809, // 2^-(2^-96)
    0xffffffffffffffffffffffffa746f405, // 2^-(2^-97)
    0xffffffffffffffffffffffffd3a37a03, // 2^-(2^-98)
    0xffffffffffffffffffffffffe9d1bd02, // 2^-(2^-99)
    0xfffffffffffffffffffffffff4e8de81, // 2^-(2^-100)
    0xfffffffffffffffffffffffffa746f41, // 2^-(2^-101)
    0xfffffffffffffffffffffffffd3a37a1, // 2^-(2^-102)
    0xfffffffffffffffffffffffffe9d1bd1, // 2^-(2^-103)
    0xffffffffffffffffffffffffff4e8de9, // 2^-(2^-104)
    0xffffffffffffffffffffffffffa746f5, // 2^-(2^-105)
    0xffffffffffffffffffffffffffd3a37b, // 2^-(2^-106)
    0xffffffffffffffffffffffffffe9d1be, // 2^-(2^-107)
    0xfffffffffffffffffffffffffff4e8df, // 2^-(2^-108)
    0xfffffffffffffffffffffffffffa7470, // 2^-(2^-109)
    0xfffffffffffffffffffffffffffd3a38, // 2^-(2^-110)
    0xfffffffffffffffffffffffffffe9d1c, // 2^-(2^-111)
    0xffffffffffffffffffffffffffff4e8e, // 2^-(2^-112)
    0xffffffffffffffffffffffffffffa747, // 2^-(2^-113)
    0xffffffffffffffffffffffffffffd3a4, // 2^-(2^-114)
    0xffffffffffffffffffffffffffffe9d2, // 2^-(2^-115)
    0xfffffffffffffffffffffffffffff4e9, // 2^-(2^-116)
    0xfffffffffffffffffffffffffffffa75, // 2^-(2^-117)
    0xfffffffffffffffffffffffffffffd3b, // 2^-(2^-118)
    0xfffffffffffffffffffffffffffffe9e, // 2^-(2^-119)
    0xffffffffffffffffffffffffffffff4f, // 2^-(2^-120)
    0xffffffffffffffffffffffffffffffa8, // 2^-(2^-121)
    0xffffffffffffffffffffffffffffffd4, // 2^-(2^-122)
    0xffffffffffffffffffffffffffffffea, // 2^-(2^-123)
    0xfffffffffffffffffffffffffffffff5, // 2^-(2^-124)
    0xfffffffffffffffffffffffffffffffb, // 2^-(2^-125)
    0xfffffffffffffffffffffffffffffffe, // 2^-(2^-126)
    0xffffffffffffffffffffffffffffffff, // 2^-(2^-127)
];

const FRACTION_BITS: u32 = 128;

/// `-log2(ratio / 2^128)` as Q128.128 for a Q0.128 ratio in (0, 1).
///
/// The fractional part of `log2` is extracted one bit per squaring and
/// truncated, so the returned weight errs on the large side (more decay).
pub(crate) fn log2_neg_frac(ratio: u128) -> U256 {
    assert!(ratio != 0, "log2 of zero ratio");

    let msb = 127 - ratio.leading_zeros();
    // ratio = y * 2^(msb - 128) with y in [1, 2)
    let int_part = u128::from(FRACTION_BITS - msb);
    // y as Q1.127
    let mut mantissa = ratio << (127 - msb);
    let mut log_frac: u128 = 0;

    for bit in (0..FRACTION_BITS).rev() {
        let squared = U256::full_mul(mantissa, mantissa).shr(127);
        if squared.hi() != 0 {
            log_frac |= 1u128 << bit;
            mantissa = squared.shr(1).lo();
        } else {
            mantissa = squared.lo();
        }
    }

    // -log2(ratio) = int_part - log2(y) = (int_part - 1) + (1 - log_frac)
    if log_frac == 0 {
        U256::from_parts(int_part, 0)
    } else {
        U256::from_parts(int_part - 1, log_frac.wrapping_neg())
    }
}

/// `2^-x` for a Q128.128 exponent, as a Q128.128 value in [0, 1].
///
/// Rounds up throughout, the table products and the final shift alike.
/// Integer parts of 128 or more saturate to zero survival.
pub(crate) fn exp2_neg_frac(x: U256) -> U256 {
    let int_part = x.hi();
    if int_part >= u128::from(FRACTION_BITS) {
        return U256::ZERO;
    }

    let frac = x.lo();
    let mut result = U256::from_parts(1, 0);

    for (index, constant) in EXP2_NEG_TABLE.iter().enumerate() {
        if (frac >> (127 - index)) & 1 == 1 {
            result = mul_q128_up(result, *constant);
        }
    }

    let shift = int_part as u32;
    let shifted = result.shr(shift);
    if shifted.shl(shift) == result {
        shifted
    } else {
        // shift >= 1 here, so shifted is at most one half
        U256::from_u128(shifted.lo() + 1)
    }
}

// result <= 1.0 and constant < 1.0, so the product always fits
fn mul_q128_up(value: U256, constant: u128) -> U256 {
    if value.hi() != 0 {
        return U256::from_u128(constant);
    }
    let product = U256::full_mul(value.lo(), constant);
    let rounded = product.hi() + u128::from(product.lo() != 0);
    U256::from_u128(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HALF: u128 = 1 << 127;

    #[test]
    fn log2_of_half_is_one() {
        assert_eq!(log2_neg_frac(HALF), U256::from_parts(1, 0));
    }

    #[test]
    fn log2_of_quarter_is_two() {
        assert_eq!(log2_neg_frac(1 << 126), U256::from_parts(2, 0));
    }

    #[test]
    fn log2_of_smallest_ratio() {
        assert_eq!(log2_neg_frac(1), U256::from_parts(128, 0));
    }

    #[test]
    fn exp2_integer_exponents_are_exact() {
        assert_eq!(exp2_neg_frac(U256::ZERO), U256::from_parts(1, 0));
        assert_eq!(exp2_neg_frac(U256::from_parts(1, 0)), U256::from_u128(HALF));
        assert_eq!(exp2_neg_frac(U256::from_parts(3, 0)), U256::from_u128(1 << 125));
    }

    #[test]
    fn exp2_half_exponent_uses_first_constant() {
        let half = U256::from_u128(HALF);
        assert_eq!(exp2_neg_frac(half), U256::from_u128(EXP2_NEG_TABLE[0]));
    }

    #[test]
    fn exp2_saturates_past_representable_range() {
        assert_eq!(exp2_neg_frac(U256::from_parts(128, 0)), U256::ZERO);
        assert_eq!(exp2_neg_frac(U256::from_parts(1000, 5)), U256::ZERO);
    }

    #[test]
    fn exp2_shift_rounds_up() {
        // 2^-127.5 is 1.41 ulp
        let exponent = U256::from_parts(127, HALF);
        assert_eq!(exp2_neg_frac(exponent), U256::from_u128(2));
        // 2^-1.25 halves the odd 2^-0.25 constant
        let exponent = U256::from_parts(1, 1 << 126);
        assert_eq!(EXP2_NEG_TABLE[1] % 2, 1);
        assert_eq!(exp2_neg_frac(exponent), U256::from_u128(EXP2_NEG_TABLE[1] / 2 + 1));
    }

    #[test]
    fn table_is_strictly_increasing() {
        for pair in EXP2_NEG_TABLE.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn exp_inverts_log_closely() {
        // 0.9 in Q0.128
        let ratio = u128::MAX / 10 * 9;
        let back = exp2_neg_frac(log2_neg_frac(ratio));
        let diff = back.lo().abs_diff(ratio);
        assert!(diff < 1 << 10, "diff {diff}");
    }
}
