//! Thread state and the opcode dispatch loop.
//!
//! A thread is a lightweight cooperatively scheduled execution unit: a
//! program counter, one private four-valued bit space, sixteen integer
//! word registers, real/string stacks, a bounded object stack, and the
//! fork/join bookkeeping. Handlers return `true` to continue in the same
//! thread and `false` to yield back to the scheduler.
//!
//! Handler implementations are split by opcode family across the
//! submodules; this module owns the thread structures and the dispatch
//! table.

mod arith_ops;
mod assign;
mod control;
mod memory;
mod threads;

use crate::code::{CodeAddr, Op};
use crate::logic::Bit4;
use crate::net::NetId;
use crate::object::ObjectRef;
use crate::runtime::Runtime;
use crate::scope::{ContextId, ScopeId};
use crate::vector4::Vector4;
use std::collections::BTreeSet;

/// Bit-space addresses 0-3 are hard-wired constants; 4-6 are the
/// comparison flags.
pub const FLAG_EQ: u32 = 4;
pub const FLAG_LT: u32 = 5;
pub const FLAG_EEQ: u32 = 6;

/// The null program counter: a reaped or ended thread parks here.
pub(crate) const NULL_PC: CodeAddr = CodeAddr(u32::MAX);

/// Hard depth limit of the object stack. Real and string stacks are
/// unbounded.
pub const OBJ_STACK_MAX: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub(crate) u32);

impl ThreadId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The explicit thread state machine. A thread on the ready list keeps
/// its logical state; `is_scheduled` tracks ready-list membership
/// separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Running,
    WaitingOnEvent(NetId),
    WaitingInJoin,
    EndedZombie,
}

#[derive(Debug)]
pub struct Thread {
    pub pc: CodeAddr,
    /// Private four-valued bits. Indices 0-3 read as 0/1/x/z; 4-6 hold
    /// the EQ/LT/EEQ flags; 7 and up are general workspace.
    bits: Vector4,
    /// Sixteen integer registers, each usable signed or unsigned.
    pub words: [u64; 16],
    real_stack: Vec<f64>,
    str_stack: Vec<String>,
    obj_stack: Vec<ObjectRef>,
    pub state: ThreadState,
    pub is_scheduled: bool,
    pub delay_delete: bool,
    pub parent: Option<ThreadId>,
    pub children: BTreeSet<ThreadId>,
    /// Children forked into automatic scopes; these are joined first.
    pub automatic_children: BTreeSet<ThreadId>,
    pub scope: ScopeId,
    /// Write-context stack: the top is the destination for automatic
    /// variable writes during argument marshalling.
    pub wt_stack: Vec<ContextId>,
    /// Read-context stack: the top is the source for reads of a joined
    /// call's locals.
    pub rd_stack: Vec<ContextId>,
    /// Armed event-control state for the `%assign/..e` opcodes.
    pub event: Option<NetId>,
    pub ecount: u64,
}

impl Thread {
    pub fn new(pc: CodeAddr, scope: ScopeId) -> Self {
        let mut bits = Vector4::new(32);
        bits.set_bit(0, Bit4::Zero);
        bits.set_bit(1, Bit4::One);
        bits.set_bit(2, Bit4::X);
        bits.set_bit(3, Bit4::Z);
        Thread {
            pc,
            bits,
            words: [0; 16],
            real_stack: Vec::new(),
            str_stack: Vec::new(),
            obj_stack: Vec::new(),
            state: ThreadState::Running,
            is_scheduled: false,
            delay_delete: false,
            parent: None,
            children: BTreeSet::new(),
            automatic_children: BTreeSet::new(),
            scope,
            wt_stack: Vec::new(),
            rd_stack: Vec::new(),
            event: None,
            ecount: 0,
        }
    }

    pub fn has_ended(&self) -> bool {
        self.state == ThreadState::EndedZombie
    }

    pub fn is_joining(&self) -> bool {
        self.state == ThreadState::WaitingInJoin
    }

    pub fn waiting_for_event(&self) -> bool {
        matches!(self.state, ThreadState::WaitingOnEvent(_))
    }

    /// Read one bit of the thread space. Addresses 0-3 are constants.
    pub fn bit(&self, addr: u32) -> Bit4 {
        match addr {
            0 => Bit4::Zero,
            1 => Bit4::One,
            2 => Bit4::X,
            3 => Bit4::Z,
            _ => self.bits.value(addr as usize),
        }
    }

    /// Write one bit, growing the space as needed. Writing the constant
    /// addresses is an operand error in generated code.
    pub fn set_bit(&mut self, addr: u32, bit: Bit4) {
        debug_assert!(addr >= 4, "write to constant bit address {addr}");
        let addr = addr as usize;
        if addr >= self.bits.len() {
            self.bits.resize(addr + 1);
        }
        self.bits.set_bit(addr, bit);
    }

    /// Materialize `wid` bits starting at `base`. A base below 4 reads
    /// the constant at that address replicated to the width.
    pub fn read_vec(&self, base: u32, wid: u32) -> Vector4 {
        if base < 4 {
            Vector4::filled(wid as usize, self.bit(base))
        } else {
            self.bits.subvector(base as usize, wid as usize)
        }
    }

    /// Write a vector into the bit space at `base`, growing as needed.
    pub fn write_vec(&mut self, base: u32, value: &Vector4) {
        debug_assert!(base >= 4, "write to constant bit address {base}");
        let end = base as usize + value.len();
        if end > self.bits.len() {
            self.bits.resize(end);
        }
        self.bits.set_vec(base as usize, value);
    }

    pub fn word_u(&self, idx: u8) -> u64 {
        self.words[idx as usize]
    }

    pub fn word_i(&self, idx: u8) -> i64 {
        self.words[idx as usize] as i64
    }

    pub fn set_word_u(&mut self, idx: u8, value: u64) {
        self.words[idx as usize] = value;
    }

    pub fn set_word_i(&mut self, idx: u8, value: i64) {
        self.words[idx as usize] = value as u64;
    }

    pub fn push_real(&mut self, value: f64) {
        self.real_stack.push(value);
    }

    pub fn pop_real(&mut self) -> f64 {
        self.real_stack.pop().expect("real stack underflow")
    }

    pub fn peek_real(&self, depth: usize) -> f64 {
        let idx = self.real_stack.len() - 1 - depth;
        self.real_stack[idx]
    }

    pub fn push_str(&mut self, value: String) {
        self.str_stack.push(value);
    }

    pub fn pop_str(&mut self) -> String {
        self.str_stack.pop().expect("string stack underflow")
    }

    pub fn peek_str_mut(&mut self) -> &mut String {
        self.str_stack.last_mut().expect("string stack underflow")
    }

    pub fn peek_str(&self, depth: usize) -> &str {
        let idx = self.str_stack.len() - 1 - depth;
        &self.str_stack[idx]
    }

    pub fn push_obj(&mut self, value: ObjectRef) {
        assert!(
            self.obj_stack.len() < OBJ_STACK_MAX,
            "object stack overflow (depth limit {OBJ_STACK_MAX})"
        );
        self.obj_stack.push(value);
    }

    pub fn pop_obj(&mut self) -> ObjectRef {
        self.obj_stack.pop().expect("object stack underflow")
    }

    pub fn peek_obj(&self) -> &ObjectRef {
        self.obj_stack.last().expect("object stack underflow")
    }

    /// Discard `count` entries from the given stack depth.
    pub fn pop_reals(&mut self, count: u32) {
        for _ in 0..count {
            self.real_stack.pop();
        }
    }

    pub fn pop_strs(&mut self, count: u32) {
        for _ in 0..count {
            self.str_stack.pop();
        }
    }

    pub fn pop_objs(&mut self, count: u32) {
        for _ in 0..count {
            self.obj_stack.pop();
        }
    }
}

/// Slab of threads. Freed slots are reused; thread ids are only valid
/// while the thread is live, which the lifecycle invariants guarantee.
#[derive(Debug, Default)]
pub struct ThreadArena {
    slots: Vec<Option<Thread>>,
    free: Vec<u32>,
}

impl ThreadArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, thread: Thread) -> ThreadId {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx as usize] = Some(thread);
                ThreadId(idx)
            }
            None => {
                self.slots.push(Some(thread));
                ThreadId(self.slots.len() as u32 - 1)
            }
        }
    }

    pub fn free(&mut self, tid: ThreadId) {
        if self.slots[tid.index()].take().is_some() {
            self.free.push(tid.0);
        }
    }

    pub fn is_live(&self, tid: ThreadId) -> bool {
        self.slots
            .get(tid.index())
            .map(|s| s.is_some())
            .unwrap_or(false)
    }

    pub fn get(&self, tid: ThreadId) -> &Thread {
        self.slots[tid.index()].as_ref().expect("live thread")
    }

    pub fn get_mut(&mut self, tid: ThreadId) -> &mut Thread {
        self.slots[tid.index()].as_mut().expect("live thread")
    }
}

impl Runtime {
    /// Execute one decoded instruction on the current thread. Returns
    /// `false` when the thread yields control back to the scheduler.
    pub(crate) fn execute_op(&mut self, tid: ThreadId, op: Op) -> bool {
        use crate::arith;
        match op {
            // data movement
            Op::Mov { dst, src, wid } => self.op_mov(tid, dst, src, wid),
            Op::Movi { dst, imm, wid } => self.op_movi(tid, dst, imm, wid),
            Op::MovWu { dst, src } => self.op_mov_wu(tid, dst, src),
            Op::Pad { dst, src, wid } => self.op_pad(tid, dst, src, wid),
            Op::Cast2 { dst, src, wid } => self.op_cast2(tid, dst, src, wid),

            // loads
            Op::LoadV { dst, net, wid } => self.op_load_v(tid, dst, net, wid),
            Op::LoadVp0 { dst, net, wid } => self.op_load_vp0(tid, dst, net, wid, false),
            Op::LoadVp0S { dst, net, wid } => self.op_load_vp0(tid, dst, net, wid, true),
            Op::LoadAv { dst, array, wid } => self.op_load_av(tid, dst, array, wid),
            Op::LoadAvp0 { dst, array, wid } => self.op_load_avp0(tid, dst, array, wid, false),
            Op::LoadAvp0S { dst, array, wid } => self.op_load_avp0(tid, dst, array, wid, true),
            Op::LoadAvxP { dst, array, idx_reg } => self.op_load_avx_p(tid, dst, array, idx_reg),
            Op::LoadDar { dst, net, wid } => self.op_load_dar(tid, dst, net, wid),
            Op::LoadDarR { net } => self.op_load_dar_r(tid, net),
            Op::LoadDarStr { net } => self.op_load_dar_str(tid, net),
            Op::LoadObj { net } => self.op_load_obj(tid, net),
            Op::LoadReal { net } => self.op_load_real(tid, net),
            Op::LoadStr { net } => self.op_load_str(tid, net),
            Op::LoadStra { array, idx_reg } => self.op_load_stra(tid, array, idx_reg),
            Op::LoadAr { array, idx_reg } => self.op_load_ar(tid, array, idx_reg),
            Op::LoadX1p { dst, net, wid } => self.op_load_x1p(tid, dst, net, wid),

            // stores
            Op::StorePropObj { pid } => self.op_store_prop_obj(tid, pid),
            Op::StorePropR { pid } => self.op_store_prop_r(tid, pid),
            Op::StorePropStr { pid } => self.op_store_prop_str(tid, pid),
            Op::StorePropV { pid, src, wid } => self.op_store_prop_v(tid, pid, src, wid),
            Op::StoreDarR { net } => self.op_store_dar_r(tid, net),
            Op::StoreDarStr { net } => self.op_store_dar_str(tid, net),
            Op::StoreReal { net } => self.op_store_real(tid, net),
            Op::StoreReala { array, idx_reg } => self.op_store_reala(tid, array, idx_reg),
            Op::StoreStr { net } => self.op_store_str(tid, net),
            Op::StoreStra { array, idx_reg } => self.op_store_stra(tid, array, idx_reg),
            Op::StoreObj { net } => self.op_store_obj(tid, net),
            Op::SetAv { array, src, wid } => self.op_set_av(tid, array, src, wid),
            Op::SetDar { net, src, wid } => self.op_set_dar(tid, net, src, wid),
            Op::SetVec { net, src, wid } => self.op_set_vec(tid, net, src, wid),
            Op::SetX0 { net, src, wid } => self.op_set_x0(tid, net, src, wid),

            // continuous assign / force
            Op::CassignV { net, src, wid } => self.op_cassign_v(tid, net, src, wid),
            Op::CassignWr { net } => self.op_cassign_wr(tid, net),
            Op::CassignX0 { net, src, wid } => self.op_cassign_x0(tid, net, src, wid),
            Op::CassignLink { dst, src } => self.op_cassign_link(dst, src),
            Op::Deassign { net, base, wid } => self.op_deassign(net, base, wid),
            Op::DeassignWr { net } => self.op_deassign_wr(net),
            Op::ForceV { net, src, wid } => self.op_force_v(tid, net, src, wid),
            Op::ForceWr { net } => self.op_force_wr(tid, net),
            Op::ForceX0 { net, src, wid } => self.op_force_x0(tid, net, src, wid),
            Op::ForceLink { dst, src } => self.op_force_link(dst, src),
            Op::ReleaseNet { net } => self.op_release(net, true),
            Op::ReleaseReg { net } => self.op_release(net, false),
            Op::ReleaseWr { net } => self.op_release_wr(net),

            // non-blocking assigns
            Op::AssignV0 { net, delay, src, wid } => {
                self.op_assign_v0(tid, net, delay, src, wid)
            }
            Op::AssignV0D { net, delay_reg, src, wid } => {
                let delay = self.threads.get(tid).word_u(delay_reg);
                self.op_assign_v0(tid, net, delay, src, wid)
            }
            Op::AssignV0E { net, src, wid } => self.op_assign_v0_e(tid, net, src, wid),
            Op::AssignV0X1 { net, delay, src, wid } => {
                self.op_assign_v0_x1(tid, net, delay, src, wid)
            }
            Op::AssignV0X1D { net, delay_reg, src, wid } => {
                let delay = self.threads.get(tid).word_u(delay_reg);
                self.op_assign_v0_x1(tid, net, delay, src, wid)
            }
            Op::AssignV0X1E { net, src, wid } => self.op_assign_v0_x1_e(tid, net, src, wid),
            Op::AssignAv { array, delay, src, wid } => {
                self.op_assign_av(tid, array, delay, src, wid)
            }
            Op::AssignAvD { array, delay_reg, src, wid } => {
                let delay = self.threads.get(tid).word_u(delay_reg);
                self.op_assign_av(tid, array, delay, src, wid)
            }
            Op::AssignAvE { array, src, wid } => self.op_assign_av_e(tid, array, src, wid),
            Op::AssignWr { net, delay } => self.op_assign_wr(tid, net, delay),
            Op::AssignWrD { net, delay_reg } => {
                let delay = self.threads.get(tid).word_u(delay_reg);
                self.op_assign_wr(tid, net, delay)
            }
            Op::AssignWrE { net } => self.op_assign_wr_e(tid, net),
            Op::AssignAr { array, delay } => self.op_assign_ar(tid, array, delay),
            Op::AssignArD { array, delay_reg } => {
                let delay = self.threads.get(tid).word_u(delay_reg);
                self.op_assign_ar(tid, array, delay)
            }
            Op::AssignArE { array } => self.op_assign_ar_e(tid, array),

            // vector arithmetic
            Op::Add { dst, src, wid } => self.op_binary(tid, dst, src, wid, arith::add),
            Op::Addi { dst, imm, wid } => self.op_binary_imm(tid, dst, imm, wid, arith::add),
            Op::Sub { dst, src, wid } => self.op_binary(tid, dst, src, wid, arith::sub),
            Op::Subi { dst, imm, wid } => self.op_binary_imm(tid, dst, imm, wid, arith::sub),
            Op::Mul { dst, src, wid } => self.op_binary(tid, dst, src, wid, arith::mul),
            Op::Muli { dst, imm, wid } => self.op_binary_imm(tid, dst, imm, wid, arith::mul),
            Op::Div { dst, src, wid } => self.op_binary(tid, dst, src, wid, arith::div),
            Op::DivS { dst, src, wid } => self.op_binary(tid, dst, src, wid, arith::div_s),
            Op::Mod { dst, src, wid } => self.op_binary(tid, dst, src, wid, arith::modulus),
            Op::ModS { dst, src, wid } => self.op_binary(tid, dst, src, wid, arith::modulus_s),
            Op::Pow { dst, src, wid } => self.op_binary(tid, dst, src, wid, arith::pow),
            Op::PowS { dst, src, wid } => self.op_binary(tid, dst, src, wid, arith::pow_s),

            // real-stack arithmetic
            Op::AddWr => self.op_real_binary(tid, |l, r| l + r),
            Op::SubWr => self.op_real_binary(tid, |l, r| l - r),
            Op::MulWr => self.op_real_binary(tid, |l, r| l * r),
            Op::DivWr => self.op_real_binary(tid, |l, r| l / r),
            Op::ModWr => self.op_real_binary(tid, |l, r| l % r),
            Op::PowWr => self.op_real_binary(tid, f64::powf),
            Op::MaxWr => self.op_real_binary(tid, real_max),
            Op::MinWr => self.op_real_binary(tid, real_min),
            Op::AbsWr => {
                let thr = self.threads.get_mut(tid);
                let v = thr.pop_real();
                thr.push_real(v.abs());
                true
            }

            // bitwise logic
            Op::And { dst, src, wid } => self.op_bitwise(tid, dst, src, wid, arith::BitwiseOp::And),
            Op::Andi { dst, imm, wid } => self.op_bitwise_imm(tid, dst, imm, wid, arith::BitwiseOp::And),
            Op::Or { dst, src, wid } => self.op_bitwise(tid, dst, src, wid, arith::BitwiseOp::Or),
            Op::Nor { dst, src, wid } => self.op_bitwise(tid, dst, src, wid, arith::BitwiseOp::Nor),
            Op::Xor { dst, src, wid } => self.op_bitwise(tid, dst, src, wid, arith::BitwiseOp::Xor),
            Op::Xnor { dst, src, wid } => self.op_bitwise(tid, dst, src, wid, arith::BitwiseOp::Xnor),
            Op::Nand { dst, src, wid } => self.op_bitwise(tid, dst, src, wid, arith::BitwiseOp::Nand),
            Op::Inv { dst, wid } => self.op_inv(tid, dst, wid),

            // reductions
            Op::Andr { dst, src, wid } => self.op_reduce(tid, dst, src, wid, arith::ReduceOp::And),
            Op::Nandr { dst, src, wid } => self.op_reduce(tid, dst, src, wid, arith::ReduceOp::Nand),
            Op::Orr { dst, src, wid } => self.op_reduce(tid, dst, src, wid, arith::ReduceOp::Or),
            Op::Norr { dst, src, wid } => self.op_reduce(tid, dst, src, wid, arith::ReduceOp::Nor),
            Op::Xorr { dst, src, wid } => self.op_reduce(tid, dst, src, wid, arith::ReduceOp::Xor),
            Op::Xnorr { dst, src, wid } => self.op_reduce(tid, dst, src, wid, arith::ReduceOp::Xnor),

            // compares
            Op::Cmpu { a, b, wid } => self.op_cmpu(tid, a, b, wid),
            Op::Cmps { a, b, wid } => self.op_cmps(tid, a, b, wid),
            Op::Cmpiu { a, imm, wid } => self.op_cmpiu(tid, a, imm, wid),
            Op::Cmpis { a, imm, wid } => self.op_cmpis(tid, a, imm, wid),
            Op::Cmpx { a, b, wid } => self.op_cmp_wild(tid, a, b, wid, arith::cmpx),
            Op::Cmpz { a, b, wid } => self.op_cmp_wild(tid, a, b, wid, arith::cmpz),
            Op::Cmpstr => self.op_cmpstr(tid),
            Op::CmpWr => self.op_cmp_wr(tid),
            Op::CmpWs { a_reg, b_reg } => self.op_cmp_ws(tid, a_reg, b_reg),
            Op::CmpWu { a_reg, b_reg } => self.op_cmp_wu(tid, a_reg, b_reg),

            // shifts
            Op::ShiftlI0 { base, wid } => self.op_shift(tid, base, wid, arith::shiftl),
            Op::ShiftrI0 { base, wid } => self.op_shift(tid, base, wid, arith::shiftr),
            Op::ShiftrSI0 { base, wid } => self.op_shift(tid, base, wid, arith::shiftr_s),

            // conversions
            Op::CvtRs { reg } => self.op_cvt_rs(tid, reg),
            Op::CvtRu { reg } => self.op_cvt_ru(tid, reg),
            Op::CvtRv { dst, wid } => self.op_cvt_rv(tid, dst, wid, false),
            Op::CvtRvS { dst, wid } => self.op_cvt_rv(tid, dst, wid, true),
            Op::CvtSr { reg } => self.op_cvt_sr(tid, reg),
            Op::CvtUr { reg } => self.op_cvt_ur(tid, reg),
            Op::CvtVr { src, wid } => self.op_cvt_vr(tid, src, wid),

            // stacks
            Op::PushiReal { value } => {
                self.threads.get_mut(tid).push_real(value);
                true
            }
            Op::PushiStr { text } => {
                let text = self.code.text(text).to_string();
                self.threads.get_mut(tid).push_str(text);
                true
            }
            Op::PushvStr { src, wid } => self.op_pushv_str(tid, src, wid),
            Op::DupReal => {
                let thr = self.threads.get_mut(tid);
                let v = thr.peek_real(0);
                thr.push_real(v);
                true
            }
            Op::PopReal { count } => {
                self.threads.get_mut(tid).pop_reals(count);
                true
            }
            Op::PopStr { count } => {
                self.threads.get_mut(tid).pop_strs(count);
                true
            }
            Op::PopObj { count } => {
                self.threads.get_mut(tid).pop_objs(count);
                true
            }
            Op::ConcatStr => {
                let thr = self.threads.get_mut(tid);
                let tail = thr.pop_str();
                thr.peek_str_mut().push_str(&tail);
                true
            }
            Op::ConcatiStr { text } => {
                let text = self.code.text(text).to_string();
                self.threads.get_mut(tid).peek_str_mut().push_str(&text);
                true
            }
            Op::Scopy => self.op_scopy(tid),

            // strings
            Op::Substr { first_reg, last_reg } => self.op_substr(tid, first_reg, last_reg),
            Op::SubstrV { dst, idx_reg, wid } => self.op_substr_v(tid, dst, idx_reg, wid),
            Op::PutcStrV { net, idx_reg, src } => self.op_putc_str_v(tid, net, idx_reg, src),

            // properties
            Op::PropObj { pid } => self.op_prop_obj(tid, pid),
            Op::PropR { pid } => self.op_prop_r(tid, pid),
            Op::PropStr { pid } => self.op_prop_str(tid, pid),
            Op::PropV { pid, dst, wid } => self.op_prop_v(tid, pid, dst, wid),

            // objects
            Op::NewCobj { class } => self.op_new_cobj(tid, class),
            Op::NewDarray { size_reg, tag, width } => {
                self.op_new_darray(tid, size_reg, tag, width)
            }
            Op::Null => {
                self.threads.get_mut(tid).push_obj(ObjectRef::Nil);
                true
            }
            Op::TestNul { net } => self.op_test_nul(tid, net),
            Op::DeleteObj { net } => {
                self.send_obj(crate::net::NetPtr::new(net, 0), ObjectRef::Nil);
                true
            }

            // index registers
            Op::IxAdd { reg, imm } => {
                let thr = self.threads.get_mut(tid);
                thr.set_word_i(reg, thr.word_i(reg).wrapping_add(imm));
                true
            }
            Op::IxSub { reg, imm } => {
                let thr = self.threads.get_mut(tid);
                thr.set_word_i(reg, thr.word_i(reg).wrapping_sub(imm));
                true
            }
            Op::IxMul { reg, imm } => {
                let thr = self.threads.get_mut(tid);
                thr.set_word_i(reg, thr.word_i(reg).wrapping_mul(imm));
                true
            }
            Op::IxLoad { reg, value } => {
                self.threads.get_mut(tid).set_word_u(reg, value);
                true
            }
            Op::IxGet { reg, src, wid } => self.op_ix_get(tid, reg, src, wid, false),
            Op::IxGetS { reg, src, wid } => self.op_ix_get(tid, reg, src, wid, true),
            Op::IxGetV { reg, net } => self.op_ix_getv(tid, reg, net, false),
            Op::IxGetVS { reg, net } => self.op_ix_getv(tid, reg, net, true),

            // control flow
            Op::Jmp { dest } => self.op_jmp(tid, dest),
            Op::Jmp0 { dest, flag } => self.op_jmp_cond(tid, dest, flag, JmpCond::IfZero),
            Op::Jmp0xz { dest, flag } => self.op_jmp_cond(tid, dest, flag, JmpCond::IfZeroXz),
            Op::Jmp1 { dest, flag } => self.op_jmp_cond(tid, dest, flag, JmpCond::IfOne),
            Op::ChunkLink { dest } => {
                self.threads.get_mut(tid).pc = dest;
                true
            }
            Op::Noop => true,
            Op::Breakpoint => true,
            Op::FileLine { file, line } => {
                let file = self.code.text(file).to_string();
                self.diags.set_location(&file, line);
                true
            }

            // timing
            Op::Delay { low, high } => self.op_delay(tid, (high as u64) << 32 | low as u64),
            Op::Delayx { reg } => {
                let delay = self.threads.get(tid).word_u(reg);
                self.op_delay(tid, delay)
            }
            Op::Wait { net } => self.op_wait(tid, net),

            // threads
            Op::Fork { code, scope } => self.op_fork(tid, code, scope),
            Op::Join => self.op_join(tid),
            Op::JoinDetach { count } => self.op_join_detach(tid, count),
            Op::End => self.op_end(tid),
            Op::Disable { scope } => self.op_disable(tid, scope),
            Op::Alloc { scope } => self.op_alloc(tid, scope),
            Op::Free { scope } => self.op_free(tid, scope),
            Op::Evctl { event, reg } => {
                let count = self.threads.get(tid).word_u(reg);
                self.op_evctl(tid, event, count)
            }
            Op::Evctli { event, count } => self.op_evctl(tid, event, count as u64),
            Op::Evctls { event, reg } => {
                let count = self.threads.get(tid).word_i(reg).max(0) as u64;
                self.op_evctl(tid, event, count)
            }
            Op::Evctlc => {
                let thr = self.threads.get_mut(tid);
                thr.event = None;
                thr.ecount = 0;
                true
            }
            Op::Zombie => self.op_zombie(tid),

            // external
            Op::VpiCall { call } => self.op_vpi_call(tid, call),
            Op::ExecUfunc { net } => self.op_exec_ufunc(tid, net),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JmpCond {
    IfZero,
    IfZeroXz,
    IfOne,
}

fn real_max(l: f64, r: f64) -> f64 {
    if l.is_nan() {
        r
    } else if r.is_nan() {
        l
    } else {
        l.max(r)
    }
}

fn real_min(l: f64, r: f64) -> f64 {
    if l.is_nan() {
        r
    } else if r.is_nan() {
        l
    } else {
        l.min(r)
    }
}
