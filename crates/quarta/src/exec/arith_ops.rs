//! Arithmetic, logic, compare, shift, conversion, and index-register
//! opcode handlers.
//!
//! The binary vector opcodes follow the accumulator convention: the first
//! operand address is also the destination.

use super::{FLAG_EEQ, FLAG_EQ, FLAG_LT, JmpCond, ThreadId};
use crate::arith::{self, BitwiseOp, CmpFlags, ReduceOp};
use crate::code::CodeAddr;
use crate::logic::Bit4;
use crate::net::NetId;
use crate::runtime::Runtime;
use crate::vector4::Vector4;

impl Runtime {
    pub(crate) fn op_binary(
        &mut self,
        tid: ThreadId,
        dst: u32,
        src: u32,
        wid: u32,
        f: fn(&Vector4, &Vector4, usize) -> Vector4,
    ) -> bool {
        let thr = self.threads.get_mut(tid);
        let a = thr.read_vec(dst, wid);
        let b = thr.read_vec(src, wid);
        thr.write_vec(dst, &f(&a, &b, wid as usize));
        true
    }

    pub(crate) fn op_binary_imm(
        &mut self,
        tid: ThreadId,
        dst: u32,
        imm: u64,
        wid: u32,
        f: fn(&Vector4, &Vector4, usize) -> Vector4,
    ) -> bool {
        let thr = self.threads.get_mut(tid);
        let a = thr.read_vec(dst, wid);
        let b = Vector4::from_u64(wid as usize, imm);
        thr.write_vec(dst, &f(&a, &b, wid as usize));
        true
    }

    pub(crate) fn op_bitwise(
        &mut self,
        tid: ThreadId,
        dst: u32,
        src: u32,
        wid: u32,
        op: BitwiseOp,
    ) -> bool {
        let thr = self.threads.get_mut(tid);
        let a = thr.read_vec(dst, wid);
        let b = thr.read_vec(src, wid);
        thr.write_vec(dst, &arith::bitwise(op, &a, &b, wid as usize));
        true
    }

    pub(crate) fn op_bitwise_imm(
        &mut self,
        tid: ThreadId,
        dst: u32,
        imm: u64,
        wid: u32,
        op: BitwiseOp,
    ) -> bool {
        let thr = self.threads.get_mut(tid);
        let a = thr.read_vec(dst, wid);
        let b = Vector4::from_u64(wid as usize, imm);
        thr.write_vec(dst, &arith::bitwise(op, &a, &b, wid as usize));
        true
    }

    pub(crate) fn op_inv(&mut self, tid: ThreadId, dst: u32, wid: u32) -> bool {
        let thr = self.threads.get_mut(tid);
        let a = thr.read_vec(dst, wid);
        thr.write_vec(dst, &arith::invert(&a));
        true
    }

    pub(crate) fn op_reduce(
        &mut self,
        tid: ThreadId,
        dst: u32,
        src: u32,
        wid: u32,
        op: ReduceOp,
    ) -> bool {
        let thr = self.threads.get_mut(tid);
        let v = thr.read_vec(src, wid);
        thr.set_bit(dst, arith::reduce(op, &v));
        true
    }

    fn write_flags(&mut self, tid: ThreadId, flags: CmpFlags) {
        let thr = self.threads.get_mut(tid);
        thr.set_bit(FLAG_EQ, flags.eq);
        thr.set_bit(FLAG_LT, flags.lt);
        thr.set_bit(FLAG_EEQ, flags.eeq);
    }

    pub(crate) fn op_cmpu(&mut self, tid: ThreadId, a: u32, b: u32, wid: u32) -> bool {
        let thr = self.threads.get(tid);
        let av = thr.read_vec(a, wid);
        let bv = thr.read_vec(b, wid);
        let flags = arith::cmpu(&av, &bv, wid as usize);
        self.write_flags(tid, flags);
        true
    }

    pub(crate) fn op_cmps(&mut self, tid: ThreadId, a: u32, b: u32, wid: u32) -> bool {
        let thr = self.threads.get(tid);
        let av = thr.read_vec(a, wid);
        let bv = thr.read_vec(b, wid);
        let flags = arith::cmps(&av, &bv, wid as usize);
        self.write_flags(tid, flags);
        true
    }

    pub(crate) fn op_cmpiu(&mut self, tid: ThreadId, a: u32, imm: u64, wid: u32) -> bool {
        let thr = self.threads.get(tid);
        let av = thr.read_vec(a, wid);
        let bv = Vector4::from_u64(wid as usize, imm);
        let flags = arith::cmpu(&av, &bv, wid as usize);
        self.write_flags(tid, flags);
        true
    }

    pub(crate) fn op_cmpis(&mut self, tid: ThreadId, a: u32, imm: u64, wid: u32) -> bool {
        let thr = self.threads.get(tid);
        let av = thr.read_vec(a, wid);
        let bv = Vector4::from_u64(wid as usize, imm);
        let flags = arith::cmps(&av, &bv, wid as usize);
        self.write_flags(tid, flags);
        true
    }

    pub(crate) fn op_cmp_wild(
        &mut self,
        tid: ThreadId,
        a: u32,
        b: u32,
        wid: u32,
        f: fn(&Vector4, &Vector4, usize) -> Bit4,
    ) -> bool {
        let thr = self.threads.get(tid);
        let av = thr.read_vec(a, wid);
        let bv = thr.read_vec(b, wid);
        let eq = f(&av, &bv, wid as usize);
        self.threads.get_mut(tid).set_bit(FLAG_EQ, eq);
        true
    }

    pub(crate) fn op_cmpstr(&mut self, tid: ThreadId) -> bool {
        let thr = self.threads.get_mut(tid);
        let right = thr.pop_str();
        let left = thr.pop_str();
        let (eq, lt) = match left.cmp(&right) {
            std::cmp::Ordering::Equal => (Bit4::One, Bit4::Zero),
            std::cmp::Ordering::Less => (Bit4::Zero, Bit4::One),
            std::cmp::Ordering::Greater => (Bit4::Zero, Bit4::Zero),
        };
        thr.set_bit(FLAG_EQ, eq);
        thr.set_bit(FLAG_LT, lt);
        true
    }

    pub(crate) fn op_cmp_wr(&mut self, tid: ThreadId) -> bool {
        let thr = self.threads.get_mut(tid);
        let r = thr.pop_real();
        let l = thr.pop_real();
        thr.set_bit(FLAG_EQ, if l == r { Bit4::One } else { Bit4::Zero });
        thr.set_bit(FLAG_LT, if l < r { Bit4::One } else { Bit4::Zero });
        true
    }

    pub(crate) fn op_cmp_ws(&mut self, tid: ThreadId, a_reg: u8, b_reg: u8) -> bool {
        let thr = self.threads.get_mut(tid);
        let l = thr.word_i(a_reg);
        let r = thr.word_i(b_reg);
        thr.set_bit(FLAG_EQ, if l == r { Bit4::One } else { Bit4::Zero });
        thr.set_bit(FLAG_LT, if l < r { Bit4::One } else { Bit4::Zero });
        true
    }

    pub(crate) fn op_cmp_wu(&mut self, tid: ThreadId, a_reg: u8, b_reg: u8) -> bool {
        let thr = self.threads.get_mut(tid);
        let l = thr.word_u(a_reg);
        let r = thr.word_u(b_reg);
        thr.set_bit(FLAG_EQ, if l == r { Bit4::One } else { Bit4::Zero });
        thr.set_bit(FLAG_LT, if l < r { Bit4::One } else { Bit4::Zero });
        true
    }

    /// The shift group: amount in word register 0, flag bit 4 poisons the
    /// result.
    pub(crate) fn op_shift(
        &mut self,
        tid: ThreadId,
        base: u32,
        wid: u32,
        f: fn(&Vector4, i64, bool) -> Vector4,
    ) -> bool {
        let thr = self.threads.get_mut(tid);
        let unknown = thr.bit(FLAG_EQ) == Bit4::One;
        let shift = thr.word_i(0);
        let v = thr.read_vec(base, wid);
        thr.write_vec(base, &f(&v, shift, unknown));
        true
    }

    pub(crate) fn op_real_binary<F: Fn(f64, f64) -> f64>(&mut self, tid: ThreadId, f: F) -> bool {
        let thr = self.threads.get_mut(tid);
        let r = thr.pop_real();
        let l = thr.pop_real();
        thr.push_real(f(l, r));
        true
    }

    // ── conversions ─────────────────────────────────────────

    pub(crate) fn op_cvt_rs(&mut self, tid: ThreadId, reg: u8) -> bool {
        let thr = self.threads.get_mut(tid);
        let v = thr.word_i(reg);
        thr.push_real(v as f64);
        true
    }

    pub(crate) fn op_cvt_ru(&mut self, tid: ThreadId, reg: u8) -> bool {
        let thr = self.threads.get_mut(tid);
        let v = thr.word_u(reg);
        thr.push_real(v as f64);
        true
    }

    pub(crate) fn op_cvt_rv(&mut self, tid: ThreadId, src: u32, wid: u32, signed: bool) -> bool {
        let thr = self.threads.get_mut(tid);
        let v = thr.read_vec(src, wid);
        let val = if signed {
            arith::signed_to_f64(&v, wid as usize)
        } else {
            arith::unsigned_to_f64(&v)
        };
        thr.push_real(val);
        true
    }

    /// Round-to-nearest, half away from zero, into a signed register.
    pub(crate) fn op_cvt_sr(&mut self, tid: ThreadId, reg: u8) -> bool {
        let thr = self.threads.get_mut(tid);
        let r = thr.pop_real();
        thr.set_word_i(reg, round_away(r) as i64);
        true
    }

    pub(crate) fn op_cvt_ur(&mut self, tid: ThreadId, reg: u8) -> bool {
        let thr = self.threads.get_mut(tid);
        let r = thr.pop_real();
        thr.set_word_u(reg, round_away(r) as u64);
        true
    }

    pub(crate) fn op_cvt_vr(&mut self, tid: ThreadId, dst: u32, wid: u32) -> bool {
        let thr = self.threads.get_mut(tid);
        let r = thr.pop_real();
        let v = arith::f64_to_vec4(round_away(r), wid as usize);
        thr.write_vec(dst, &v);
        true
    }

    // ── index registers ─────────────────────────────────────

    /// Materialize an integer from thread bits. Any X/Z sets flag bit 4
    /// and leaves zero in the register.
    pub(crate) fn op_ix_get(
        &mut self,
        tid: ThreadId,
        reg: u8,
        src: u32,
        wid: u32,
        signed: bool,
    ) -> bool {
        let thr = self.threads.get_mut(tid);
        let v = thr.read_vec(src, wid);
        let (value, unknown) = vector_to_index(&v, signed);
        thr.set_word_u(reg, value);
        thr.set_bit(FLAG_EQ, if unknown { Bit4::One } else { Bit4::Zero });
        true
    }

    /// Same, reading from a signal's observable value.
    pub(crate) fn op_ix_getv(&mut self, tid: ThreadId, reg: u8, net: NetId, signed: bool) -> bool {
        let v = self.signal_vec4(net);
        let (value, unknown) = vector_to_index(&v, signed);
        let thr = self.threads.get_mut(tid);
        thr.set_word_u(reg, value);
        thr.set_bit(FLAG_EQ, if unknown { Bit4::One } else { Bit4::Zero });
        true
    }

    // ── jumps ───────────────────────────────────────────────

    pub(crate) fn op_jmp(&mut self, tid: ThreadId, dest: CodeAddr) -> bool {
        self.threads.get_mut(tid).pc = dest;
        // A stop request parks the thread so the outer loop can inspect
        // the flag; the pc is already at the jump target.
        if self.sched.is_stopped() || self.sched.is_finished() {
            if !self.sched.is_finished() {
                self.schedule_thread(tid, 0, false);
            }
            return false;
        }
        true
    }

    pub(crate) fn op_jmp_cond(
        &mut self,
        tid: ThreadId,
        dest: CodeAddr,
        flag: u32,
        cond: JmpCond,
    ) -> bool {
        let bit = self.threads.get(tid).bit(flag);
        let take = match cond {
            JmpCond::IfZero => bit == Bit4::Zero,
            JmpCond::IfOne => bit == Bit4::One,
            JmpCond::IfZeroXz => bit != Bit4::One,
        };
        if take {
            return self.op_jmp(tid, dest);
        }
        if self.sched.is_finished() {
            return false;
        }
        true
    }
}

fn round_away(r: f64) -> f64 {
    if !r.is_finite() {
        return 0.0;
    }
    if r >= 0.0 {
        (r + 0.5).floor()
    } else {
        (r - 0.5).ceil()
    }
}

/// Index registers only hold binary values: any X/Z bit yields zero plus
/// the unknown flag. The signed form replicates the top bit.
fn vector_to_index(v: &Vector4, signed: bool) -> (u64, bool) {
    let mut value: u64 = 0;
    let mut top = Bit4::Zero;
    for (idx, bit) in v.iter().enumerate() {
        if bit.is_xz() {
            return (0, true);
        }
        top = bit;
        if bit == Bit4::One && idx < 64 {
            value |= 1 << idx;
        }
    }
    if signed && top == Bit4::One {
        for idx in v.len()..64 {
            value |= 1 << idx;
        }
    }
    (value, false)
}
