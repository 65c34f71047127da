//! Arithmetic, comparison, shift, and bitwise operations over [`Vector4`].
//!
//! The arithmetic group follows the standard four-state rule: any X or Z
//! bit in an operand makes the whole result X at the destination width.
//! Two-state operands drop to word-wise machine arithmetic.

use crate::logic::{Bit4, MachineWord, WORD_BITS, words_for};
use crate::vector2::{Vector2, add_with_carry, divmod_words, multiply_with_carry};
use crate::vector4::Vector4;

/// Result flags of the vector compare group. Written to thread flag bits
/// 4 (EQ), 5 (LT), and 6 (EEQ, the case-equality bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmpFlags {
    pub eq: Bit4,
    pub lt: Bit4,
    pub eeq: Bit4,
}

fn all_x(wid: usize) -> Vector4 {
    Vector4::filled(wid, Bit4::X)
}

// ── Addition / subtraction ──────────────────────────────────

pub fn add(a: &Vector4, b: &Vector4, wid: usize) -> Vector4 {
    let (Some(av), Some(bv)) = (a.to_words(), b.to_words()) else {
        return all_x(wid);
    };
    let mut out = vec![0; words_for(wid)];
    let mut carry = 0;
    for idx in 0..out.len() {
        out[idx] = add_with_carry(word_at(&av, idx), word_at(&bv, idx), &mut carry);
    }
    Vector4::from_words(wid, &out)
}

/// `a - b` as `a + !b + 1`, the usual two's-complement trick.
pub fn sub(a: &Vector4, b: &Vector4, wid: usize) -> Vector4 {
    let (Some(av), Some(bv)) = (a.to_words(), b.to_words()) else {
        return all_x(wid);
    };
    let mut out = vec![0; words_for(wid)];
    let mut carry = 1;
    for idx in 0..out.len() {
        out[idx] = add_with_carry(word_at(&av, idx), !word_at(&bv, idx), &mut carry);
    }
    Vector4::from_words(wid, &out)
}

// ── Multiplication ──────────────────────────────────────────

pub fn mul(a: &Vector4, b: &Vector4, wid: usize) -> Vector4 {
    let (Some(av), Some(bv)) = (a.to_words(), b.to_words()) else {
        return all_x(wid);
    };
    if wid <= WORD_BITS {
        let (lo, _) = multiply_with_carry(word_at(&av, 0), word_at(&bv, 0));
        return Vector4::from_u64(wid, lo);
    }
    // Schoolbook multiply, discarding product words above the width.
    let words = words_for(wid);
    let mut out = vec![0; words];
    for i in 0..words {
        let a_word = word_at(&av, i);
        if a_word == 0 {
            continue;
        }
        for j in 0..words - i {
            let (lo, mut hi) = multiply_with_carry(a_word, word_at(&bv, j));
            let mut carry = 0;
            out[i + j] = add_with_carry(out[i + j], lo, &mut carry);
            hi = hi.wrapping_add(carry);
            let mut k = i + j + 1;
            while hi != 0 && k < words {
                let mut carry = 0;
                out[k] = add_with_carry(out[k], hi, &mut carry);
                hi = carry;
                k += 1;
            }
        }
    }
    Vector4::from_words(wid, &out)
}

// ── Division / modulus ──────────────────────────────────────

pub fn div(a: &Vector4, b: &Vector4, wid: usize) -> Vector4 {
    match two_state(a, b) {
        Some((av, bv)) => match divmod_words(&av, &bv) {
            Some((quot, _)) => Vector4::from_words(wid, &quot),
            None => all_x(wid),
        },
        None => all_x(wid),
    }
}

pub fn modulus(a: &Vector4, b: &Vector4, wid: usize) -> Vector4 {
    match two_state(a, b) {
        Some((av, bv)) => match divmod_words(&av, &bv) {
            Some((_, rem)) => Vector4::from_words(wid, &rem),
            None => all_x(wid),
        },
        None => all_x(wid),
    }
}

/// Signed divide: strip signs, divide unsigned, negate per the quotient
/// sign rule.
pub fn div_s(a: &Vector4, b: &Vector4, wid: usize) -> Vector4 {
    let (Some(_), Some(_)) = (a.to_words(), b.to_words()) else {
        return all_x(wid);
    };
    let neg_a = is_negative(a, wid);
    let neg_b = is_negative(b, wid);
    let av = magnitude(a, wid, neg_a);
    let bv = magnitude(b, wid, neg_b);
    match divmod_words(&av, &bv) {
        Some((quot, _)) => {
            let mut res = Vector4::from_words(wid, &quot);
            if neg_a != neg_b {
                res = negated(&res, wid);
            }
            res
        }
        None => all_x(wid),
    }
}

/// Signed modulus: the result takes the sign of the dividend.
pub fn modulus_s(a: &Vector4, b: &Vector4, wid: usize) -> Vector4 {
    let (Some(_), Some(_)) = (a.to_words(), b.to_words()) else {
        return all_x(wid);
    };
    let neg_a = is_negative(a, wid);
    let av = magnitude(a, wid, neg_a);
    let bv = magnitude(b, wid, is_negative(b, wid));
    match divmod_words(&av, &bv) {
        Some((_, rem)) => {
            let mut res = Vector4::from_words(wid, &rem);
            if neg_a {
                res = negated(&res, wid);
            }
            res
        }
        None => all_x(wid),
    }
}

// ── Power ───────────────────────────────────────────────────

pub fn pow(a: &Vector4, b: &Vector4, wid: usize) -> Vector4 {
    let (Some(av), Some(bv)) = (
        Vector2::from_vector4(&a.coerced(wid, false)),
        Vector2::from_vector4(b),
    ) else {
        return all_x(wid);
    };
    av.pow(&bv).to_vector4()
}

/// Signed power goes through real arithmetic and truncates back, which
/// makes negative exponents come out as 0 except for a ±1 base.
pub fn pow_s(a: &Vector4, b: &Vector4, wid: usize) -> Vector4 {
    let (Some(_), Some(_)) = (a.to_words(), b.to_words()) else {
        return all_x(wid);
    };
    let base = signed_to_f64(a, a.len());
    let exp = signed_to_f64(b, b.len());
    f64_to_vec4(base.powf(exp), wid)
}

// ── Comparison ──────────────────────────────────────────────

/// Unsigned compare. The fast path runs word-wise when both operands are
/// two-state; with unknowns present EQ degrades to X unless a definite
/// 0/1 mismatch decides it, and LT is X.
pub fn cmpu(a: &Vector4, b: &Vector4, wid: usize) -> CmpFlags {
    let (Some(av), Some(bv)) = (a.to_words(), b.to_words()) else {
        return cmpu_hard(a, b, wid);
    };
    let mut eq = Bit4::One;
    let mut lt = Bit4::Zero;
    for idx in 0..words_for(wid) {
        let (l, r) = (word_at(&av, idx), word_at(&bv, idx));
        if l == r {
            continue;
        }
        eq = Bit4::Zero;
        lt = if l < r { Bit4::One } else { Bit4::Zero };
    }
    CmpFlags { eq, lt, eeq: eq }
}

fn cmpu_hard(a: &Vector4, b: &Vector4, wid: usize) -> CmpFlags {
    let mut eq = Bit4::One;
    let mut eeq = Bit4::One;
    for idx in 0..wid {
        let lv = a.value(idx);
        let rv = b.value(idx);
        if lv != rv {
            eeq = Bit4::Zero;
        }
        if eq == Bit4::One && (lv.is_xz() || rv.is_xz()) {
            eq = Bit4::X;
        }
        if (lv == Bit4::Zero && rv == Bit4::One) || (lv == Bit4::One && rv == Bit4::Zero) {
            eq = Bit4::Zero;
        }
        if eq == Bit4::Zero {
            break;
        }
    }
    CmpFlags {
        eq,
        lt: Bit4::X,
        eeq,
    }
}

/// Signed compare: an unsigned bit sweep, then the sign bits settle LT.
pub fn cmps(a: &Vector4, b: &Vector4, wid: usize) -> CmpFlags {
    let mut eq = Bit4::One;
    let mut eeq = Bit4::One;
    let mut lt = Bit4::Zero;

    let sig1 = if wid > 0 { a.value(wid - 1) } else { Bit4::X };
    let sig2 = if wid > 0 { b.value(wid - 1) } else { Bit4::X };

    for idx in 0..wid {
        let lv = a.value(idx);
        let rv = b.value(idx);
        // Bit4 orders 0 < 1 < X < Z, which matches the original's bit
        // encoding for the eeq/lt sweep.
        if (lv as u8) > (rv as u8) {
            lt = Bit4::Zero;
            eeq = Bit4::Zero;
        } else if (lv as u8) < (rv as u8) {
            lt = Bit4::One;
            eeq = Bit4::Zero;
        }
        if eq != Bit4::X {
            if lv == Bit4::Zero && rv != Bit4::Zero {
                eq = Bit4::Zero;
            }
            if lv == Bit4::One && rv != Bit4::One {
                eq = Bit4::Zero;
            }
            if lv.is_xz() || rv.is_xz() {
                eq = Bit4::X;
            }
        }
    }

    if eq == Bit4::X {
        lt = Bit4::X;
    } else if sig1 == Bit4::One && sig2 == Bit4::Zero {
        lt = Bit4::One;
    } else if sig1 == Bit4::Zero && sig2 == Bit4::One {
        lt = Bit4::Zero;
    }

    CmpFlags { eq, lt, eeq }
}

/// Case equality with X or Z as a wildcard on either side.
pub fn cmpx(a: &Vector4, b: &Vector4, wid: usize) -> Bit4 {
    for idx in 0..wid {
        let lv = a.value(idx);
        let rv = b.value(idx);
        if lv != rv && !lv.is_xz() && !rv.is_xz() {
            return Bit4::Zero;
        }
    }
    Bit4::One
}

/// Case equality with only Z as a wildcard; X compares as itself.
pub fn cmpz(a: &Vector4, b: &Vector4, wid: usize) -> Bit4 {
    for idx in 0..wid {
        let lv = a.value(idx);
        let rv = b.value(idx);
        if lv != Bit4::Z && rv != Bit4::Z && lv != rv {
            return Bit4::Zero;
        }
    }
    Bit4::One
}

// ── Shifts ──────────────────────────────────────────────────

/// Logical shift left. `unknown` is the caller's flag-bit-4 state: an
/// undefined shift amount makes the whole result X.
pub fn shiftl(v: &Vector4, shift: i64, unknown: bool) -> Vector4 {
    let wid = v.len();
    if unknown {
        return all_x(wid);
    }
    if shift >= wid as i64 {
        Vector4::zeros(wid)
    } else if shift > 0 {
        let shift = shift as usize;
        let mut out = Vector4::zeros(wid);
        out.set_vec(shift, &v.subvector(0, wid - shift));
        out
    } else if shift <= -(wid as i64) {
        all_x(wid)
    } else if shift < 0 {
        let shift = (-shift) as usize;
        let mut out = all_x(wid);
        out.set_vec(0, &v.subvector(shift, wid - shift));
        out
    } else {
        v.clone()
    }
}

/// Logical shift right: vacated high bits fill with 0, negative shifts
/// fill with X.
pub fn shiftr(v: &Vector4, shift: i64, unknown: bool) -> Vector4 {
    let wid = v.len();
    if unknown {
        return all_x(wid);
    }
    if shift > wid as i64 {
        Vector4::zeros(wid)
    } else if shift > 0 {
        let shift = shift as usize;
        let mut out = Vector4::zeros(wid);
        out.set_vec(0, &v.subvector(shift, wid - shift));
        out
    } else if shift < -(wid as i64) {
        all_x(wid)
    } else if shift < 0 {
        let shift = (-shift) as usize;
        let mut out = all_x(wid);
        out.set_vec(shift, &v.subvector(0, wid - shift));
        out
    } else {
        v.clone()
    }
}

/// Arithmetic shift right: vacated high bits replicate the sign bit.
pub fn shiftr_s(v: &Vector4, shift: i64, unknown: bool) -> Vector4 {
    let wid = v.len();
    if unknown {
        return all_x(wid);
    }
    let sign = if wid > 0 { v.value(wid - 1) } else { Bit4::X };
    if shift >= wid as i64 {
        Vector4::filled(wid, sign)
    } else if shift > 0 {
        let shift = shift as usize;
        let mut out = Vector4::filled(wid, sign);
        out.set_vec(0, &v.subvector(shift, wid - shift));
        out
    } else if shift < -(wid as i64) {
        all_x(wid)
    } else if shift < 0 {
        let shift = (-shift) as usize;
        let mut out = all_x(wid);
        out.set_vec(shift, &v.subvector(0, wid - shift));
        out
    } else {
        v.clone()
    }
}

// ── Bitwise / reduction ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitwiseOp {
    And,
    Or,
    Xor,
    Nand,
    Nor,
    Xnor,
}

pub fn bitwise(op: BitwiseOp, a: &Vector4, b: &Vector4, wid: usize) -> Vector4 {
    let mut out = Vector4::zeros(wid);
    for idx in 0..wid {
        let l = a.value(idx);
        let r = b.value(idx);
        let bit = match op {
            BitwiseOp::And => l.and(r),
            BitwiseOp::Or => l.or(r),
            BitwiseOp::Xor => l.xor(r),
            BitwiseOp::Nand => l.and(r).not(),
            BitwiseOp::Nor => l.or(r).not(),
            BitwiseOp::Xnor => l.xor(r).not(),
        };
        out.set_bit(idx, bit);
    }
    out
}

pub fn invert(v: &Vector4) -> Vector4 {
    let mut out = Vector4::zeros(v.len());
    for idx in 0..v.len() {
        out.set_bit(idx, v.value(idx).not());
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    And,
    Nand,
    Or,
    Nor,
    Xor,
    Xnor,
}

/// Fold all bits of `v` to a single result bit.
pub fn reduce(op: ReduceOp, v: &Vector4) -> Bit4 {
    let mut acc = match op {
        ReduceOp::And | ReduceOp::Nand => Bit4::One,
        _ => Bit4::Zero,
    };
    for bit in v.iter() {
        acc = match op {
            ReduceOp::And | ReduceOp::Nand => acc.and(bit),
            ReduceOp::Or | ReduceOp::Nor => acc.or(bit),
            ReduceOp::Xor | ReduceOp::Xnor => acc.xor(bit),
        };
    }
    match op {
        ReduceOp::Nand | ReduceOp::Nor | ReduceOp::Xnor => acc.not(),
        _ => acc,
    }
}

// ── Scalar conversion helpers ───────────────────────────────

/// Interpret the low `wid` bits as a signed integer and widen to `f64`.
pub fn signed_to_f64(v: &Vector4, wid: usize) -> f64 {
    let Some(words) = v.to_words() else {
        return 0.0;
    };
    if wid == 0 {
        return 0.0;
    }
    let neg = v.value(wid - 1) == Bit4::One;
    if !neg {
        return words_to_f64(&words);
    }
    let mag = magnitude(v, wid, true);
    -words_to_f64(&mag)
}

/// Interpret the bits as an unsigned integer and widen to `f64`. X/Z
/// bits read as zero.
pub fn unsigned_to_f64(v: &Vector4) -> f64 {
    words_to_f64(v.cast2().val_words())
}

fn words_to_f64(words: &[MachineWord]) -> f64 {
    let mut acc = 0.0;
    for &w in words.iter().rev() {
        acc = acc * (WORD_BITS as f64).exp2() + w as f64;
    }
    acc
}

/// Truncate a real to a vector of `wid` bits (two's complement for
/// negative values). NaN and infinities produce zero.
pub fn f64_to_vec4(value: f64, wid: usize) -> Vector4 {
    if !value.is_finite() {
        return Vector4::zeros(wid);
    }
    let neg = value < 0.0;
    let mut mag = value.abs().trunc();
    let mut words = vec![0; words_for(wid).max(1)];
    let scale = (WORD_BITS as f64).exp2();
    for w in words.iter_mut() {
        *w = (mag % scale) as MachineWord;
        mag = (mag / scale).trunc();
    }
    let mut res = Vector4::from_words(wid, &words);
    if neg {
        res = negated(&res, wid);
    }
    res
}

// ── Sign helpers ────────────────────────────────────────────

fn is_negative(v: &Vector4, wid: usize) -> bool {
    wid > 0 && v.value(wid - 1) == Bit4::One
}

/// Two's complement negate at the destination width.
pub fn negated(v: &Vector4, wid: usize) -> Vector4 {
    let words = v.cast2();
    let mut out = vec![0; words_for(wid)];
    let mut carry = 1;
    for idx in 0..out.len() {
        out[idx] = add_with_carry(!word_at(words.val_words(), idx), 0, &mut carry);
    }
    Vector4::from_words(wid, &out)
}

/// The absolute-value words of a signed operand.
fn magnitude(v: &Vector4, wid: usize, negative: bool) -> Vec<MachineWord> {
    if negative {
        negated(v, wid).to_words().expect("negate of 2-state value")
    } else {
        let mut words = v.to_words().expect("checked 2-state");
        words.resize(words_for(wid), 0);
        words
    }
}

#[inline]
fn word_at(words: &[MachineWord], idx: usize) -> MachineWord {
    words.get(idx).copied().unwrap_or(0)
}

fn two_state(a: &Vector4, b: &Vector4) -> Option<(Vec<MachineWord>, Vec<MachineWord>)> {
    Some((a.to_words()?, b.to_words()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn v(s: &str) -> Vector4 {
        s.parse().unwrap()
    }

    #[test]
    fn add_wraps_at_width() {
        // 13 + 3 = 16 = 0 mod 2^4, carry discarded.
        assert_eq!(add(&v("1101"), &v("0011"), 4), v("0000"));
    }

    #[test]
    fn xz_poisons_arithmetic() {
        let a = v("10x1");
        let b = v("1001");
        for res in [
            add(&a, &b, 4),
            sub(&a, &b, 4),
            mul(&a, &b, 4),
            div(&a, &b, 4),
            modulus(&a, &b, 4),
        ] {
            assert_eq!(res, v("xxxx"));
        }
    }

    #[test]
    fn divide_by_zero_is_all_x() {
        assert_eq!(div(&v("0110"), &v("0000"), 4), v("xxxx"));
        assert_eq!(modulus(&v("0110"), &v("0000"), 4), v("xxxx"));
    }

    #[test]
    fn signed_division_signs() {
        // -6 / 2 = -3; -6 % 4 = -2 (sign of the dividend).
        let a = Vector4::from_u64(8, (-6i64 as u64) & 0xff);
        assert_eq!(div_s(&a, &Vector4::from_u64(8, 2), 8).as_u64(), Some(0xfd));
        assert_eq!(
            modulus_s(&a, &Vector4::from_u64(8, 4), 8).as_u64(),
            Some(0xfe)
        );
    }

    #[test]
    fn pow_negative_exponent_truncates_to_zero() {
        let two = Vector4::from_u64(8, 2);
        let minus_one = Vector4::from_u64(8, 0xff);
        assert_eq!(pow_s(&two, &minus_one, 8).as_u64(), Some(0));
        let minus_two = Vector4::from_u64(8, 0xfe);
        assert_eq!(pow_s(&minus_two, &minus_one, 8).as_u64(), Some(0));
    }

    #[test]
    fn cmps_with_x_gives_x_flags() {
        let flags = cmps(&v("10x1"), &v("1001"), 4);
        assert_eq!(flags.eq, Bit4::X);
        assert_eq!(flags.lt, Bit4::X);
        assert_eq!(flags.eeq, Bit4::Zero);
    }

    #[test]
    fn cmpu_definite_mismatch_beats_x() {
        // Bit 1 differs 0-vs-1 before the X is reached, so EQ is 0.
        let flags = cmpu(&v("x101"), &v("x111"), 4);
        assert_eq!(flags.eq, Bit4::Zero);
    }

    #[test]
    fn cmpx_wildcards_both_sides() {
        assert_eq!(cmpx(&v("1x01"), &v("1z01"), 4), Bit4::One);
        assert_eq!(cmpx(&v("1x01"), &v("1x11"), 4), Bit4::One);
        assert_eq!(cmpx(&v("1001"), &v("1011"), 4), Bit4::Zero);
    }

    #[test]
    fn cmpz_only_wildcards_z() {
        assert_eq!(cmpz(&v("1z01"), &v("1101"), 4), Bit4::One);
        assert_eq!(cmpz(&v("1x01"), &v("1101"), 4), Bit4::Zero);
    }

    #[test]
    fn shift_amount_flag_forces_x() {
        assert_eq!(shiftl(&v("1010"), 1, true), v("xxxx"));
        assert_eq!(shiftr(&v("1010"), 1, true), v("xxxx"));
    }

    #[test]
    fn shift_semantics() {
        assert_eq!(shiftl(&v("0110"), 2, false), v("1000"));
        assert_eq!(shiftr(&v("0110"), 2, false), v("0001"));
        assert_eq!(shiftr_s(&v("1010"), 2, false), v("1110"));
        assert_eq!(shiftl(&v("0110"), 7, false), v("0000"));
        assert_eq!(shiftr_s(&v("1010"), 9, false), v("1111"));
        // Negative shifts fill with X.
        assert_eq!(shiftl(&v("0110"), -1, false), v("x011"));
        assert_eq!(shiftr(&v("0110"), -1, false), v("110x"));
    }

    #[test]
    fn reductions() {
        assert_eq!(reduce(ReduceOp::And, &v("1111")), Bit4::One);
        assert_eq!(reduce(ReduceOp::And, &v("1101")), Bit4::Zero);
        assert_eq!(reduce(ReduceOp::Or, &v("0000")), Bit4::Zero);
        assert_eq!(reduce(ReduceOp::Or, &v("00x0")), Bit4::X);
        assert_eq!(reduce(ReduceOp::Or, &v("01x0")), Bit4::One);
        assert_eq!(reduce(ReduceOp::Xor, &v("0110")), Bit4::Zero);
        assert_eq!(reduce(ReduceOp::Xnor, &v("0100")), Bit4::Zero);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn add_sub_round_trip(a in any::<u32>(), b in any::<u32>()) {
            let av = Vector4::from_u64(32, a as u64);
            let bv = Vector4::from_u64(32, b as u64);
            let sum = add(&av, &bv, 32);
            prop_assert_eq!(sub(&sum, &bv, 32), av);
        }

        #[test]
        fn mul_matches_u64(a in any::<u32>(), b in any::<u32>()) {
            let av = Vector4::from_u64(64, a as u64);
            let bv = Vector4::from_u64(64, b as u64);
            prop_assert_eq!(mul(&av, &bv, 64).as_u64(), Some(a as u64 * b as u64));
        }

        #[test]
        fn div_identity(a in 1u32..) {
            let av = Vector4::from_u64(32, a as u64);
            prop_assert_eq!(div(&av, &av, 32).as_u64(), Some(1));
            let one = Vector4::from_u64(32, 1);
            prop_assert_eq!(mul(&av, &one, 32), av);
        }
    }
}
