//! The code space: typed instructions, constant pools, and the label
//! builder used by program loaders.
//!
//! Each instruction is a flat variant with decoded operands; pointers into
//! the netlist (nets, scopes, arrays, code addresses) are arena indices.
//! Loaders work through [`CodeBuilder`], which resolves string labels to
//! code or net indices via a symbol table at finish time.

use crate::array::ArrayId;
use crate::error::LoadError;
use crate::net::NetId;
use crate::object::ClassType;
use crate::scope::ScopeId;
use crate::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeAddr(pub(crate) u32);

impl CodeAddr {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interned constant text in the code space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StrId(pub(crate) u32);

/// A registered class type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub(crate) u32);

/// A pre-assembled user-function call-site description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UFuncId(pub(crate) u32);

/// A registered VPI callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VpiCallId(pub(crate) u32);

/// The ports and result of a user-function call site: input values are
/// marshalled onto `ports`, the function body at `code` runs to
/// completion, and the value of `result` is the call's output.
#[derive(Debug, Clone)]
pub struct UFuncCore {
    pub scope: ScopeId,
    pub code: CodeAddr,
    pub ports: Vec<NetId>,
    pub result: NetId,
}

/// One decoded instruction.
///
/// Bit addresses index the executing thread's bit space; addresses 0-3
/// read as the constants 0/1/x/z and flag bits live at 4 (EQ / unknown),
/// 5 (LT), and 6 (EEQ). Word-register operands index the thread's 16
/// integer registers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    // ── data movement ───────────────────────────────────────
    Mov { dst: u32, src: u32, wid: u32 },
    Movi { dst: u32, imm: u64, wid: u32 },
    MovWu { dst: u8, src: u8 },
    Pad { dst: u32, src: u32, wid: u32 },
    Cast2 { dst: u32, src: u32, wid: u32 },

    // ── loads ───────────────────────────────────────────────
    LoadV { dst: u32, net: NetId, wid: u32 },
    LoadVp0 { dst: u32, net: NetId, wid: u32 },
    LoadVp0S { dst: u32, net: NetId, wid: u32 },
    LoadAv { dst: u32, array: ArrayId, wid: u32 },
    LoadAvp0 { dst: u32, array: ArrayId, wid: u32 },
    LoadAvp0S { dst: u32, array: ArrayId, wid: u32 },
    LoadAvxP { dst: u32, array: ArrayId, idx_reg: u8 },
    LoadDar { dst: u32, net: NetId, wid: u32 },
    LoadDarR { net: NetId },
    LoadDarStr { net: NetId },
    LoadObj { net: NetId },
    LoadReal { net: NetId },
    LoadStr { net: NetId },
    LoadStra { array: ArrayId, idx_reg: u8 },
    LoadAr { array: ArrayId, idx_reg: u8 },
    LoadX1p { dst: u32, net: NetId, wid: u32 },

    // ── stores ──────────────────────────────────────────────
    StorePropObj { pid: u32 },
    StorePropR { pid: u32 },
    StorePropStr { pid: u32 },
    StorePropV { pid: u32, src: u32, wid: u32 },
    StoreDarR { net: NetId },
    StoreDarStr { net: NetId },
    StoreReal { net: NetId },
    StoreReala { array: ArrayId, idx_reg: u8 },
    StoreStr { net: NetId },
    StoreStra { array: ArrayId, idx_reg: u8 },
    StoreObj { net: NetId },
    SetAv { array: ArrayId, src: u32, wid: u32 },
    SetDar { net: NetId, src: u32, wid: u32 },
    SetVec { net: NetId, src: u32, wid: u32 },
    SetX0 { net: NetId, src: u32, wid: u32 },

    // ── continuous assign / force ───────────────────────────
    CassignV { net: NetId, src: u32, wid: u32 },
    CassignWr { net: NetId },
    CassignX0 { net: NetId, src: u32, wid: u32 },
    CassignLink { dst: NetId, src: NetId },
    Deassign { net: NetId, base: u32, wid: u32 },
    DeassignWr { net: NetId },
    ForceV { net: NetId, src: u32, wid: u32 },
    ForceWr { net: NetId },
    ForceX0 { net: NetId, src: u32, wid: u32 },
    ForceLink { dst: NetId, src: NetId },
    ReleaseNet { net: NetId },
    ReleaseReg { net: NetId },
    ReleaseWr { net: NetId },

    // ── non-blocking / delayed assigns ──────────────────────
    AssignV0 { net: NetId, delay: u64, src: u32, wid: u32 },
    AssignV0D { net: NetId, delay_reg: u8, src: u32, wid: u32 },
    AssignV0E { net: NetId, src: u32, wid: u32 },
    AssignV0X1 { net: NetId, delay: u64, src: u32, wid: u32 },
    AssignV0X1D { net: NetId, delay_reg: u8, src: u32, wid: u32 },
    AssignV0X1E { net: NetId, src: u32, wid: u32 },
    AssignAv { array: ArrayId, delay: u64, src: u32, wid: u32 },
    AssignAvD { array: ArrayId, delay_reg: u8, src: u32, wid: u32 },
    AssignAvE { array: ArrayId, src: u32, wid: u32 },
    AssignWr { net: NetId, delay: u64 },
    AssignWrD { net: NetId, delay_reg: u8 },
    AssignWrE { net: NetId },
    AssignAr { array: ArrayId, delay: u64 },
    AssignArD { array: ArrayId, delay_reg: u8 },
    AssignArE { array: ArrayId },

    // ── vector arithmetic ───────────────────────────────────
    Add { dst: u32, src: u32, wid: u32 },
    Addi { dst: u32, imm: u64, wid: u32 },
    Sub { dst: u32, src: u32, wid: u32 },
    Subi { dst: u32, imm: u64, wid: u32 },
    Mul { dst: u32, src: u32, wid: u32 },
    Muli { dst: u32, imm: u64, wid: u32 },
    Div { dst: u32, src: u32, wid: u32 },
    DivS { dst: u32, src: u32, wid: u32 },
    Mod { dst: u32, src: u32, wid: u32 },
    ModS { dst: u32, src: u32, wid: u32 },
    Pow { dst: u32, src: u32, wid: u32 },
    PowS { dst: u32, src: u32, wid: u32 },

    // ── real-stack arithmetic ───────────────────────────────
    AddWr,
    SubWr,
    MulWr,
    DivWr,
    ModWr,
    PowWr,
    MaxWr,
    MinWr,
    AbsWr,

    // ── bitwise logic ───────────────────────────────────────
    And { dst: u32, src: u32, wid: u32 },
    Andi { dst: u32, imm: u64, wid: u32 },
    Or { dst: u32, src: u32, wid: u32 },
    Nor { dst: u32, src: u32, wid: u32 },
    Xor { dst: u32, src: u32, wid: u32 },
    Xnor { dst: u32, src: u32, wid: u32 },
    Nand { dst: u32, src: u32, wid: u32 },
    Inv { dst: u32, wid: u32 },

    // ── reductions ──────────────────────────────────────────
    Andr { dst: u32, src: u32, wid: u32 },
    Nandr { dst: u32, src: u32, wid: u32 },
    Orr { dst: u32, src: u32, wid: u32 },
    Norr { dst: u32, src: u32, wid: u32 },
    Xorr { dst: u32, src: u32, wid: u32 },
    Xnorr { dst: u32, src: u32, wid: u32 },

    // ── compares (write flag bits 4/5/6) ────────────────────
    Cmpu { a: u32, b: u32, wid: u32 },
    Cmps { a: u32, b: u32, wid: u32 },
    Cmpiu { a: u32, imm: u64, wid: u32 },
    Cmpis { a: u32, imm: u64, wid: u32 },
    Cmpx { a: u32, b: u32, wid: u32 },
    Cmpz { a: u32, b: u32, wid: u32 },
    Cmpstr,
    CmpWr,
    CmpWs { a_reg: u8, b_reg: u8 },
    CmpWu { a_reg: u8, b_reg: u8 },

    // ── shifts (amount in word register 0) ──────────────────
    ShiftlI0 { base: u32, wid: u32 },
    ShiftrI0 { base: u32, wid: u32 },
    ShiftrSI0 { base: u32, wid: u32 },

    // ── conversions ─────────────────────────────────────────
    CvtRs { reg: u8 },
    CvtRu { reg: u8 },
    CvtRv { dst: u32, wid: u32 },
    CvtRvS { dst: u32, wid: u32 },
    CvtSr { reg: u8 },
    CvtUr { reg: u8 },
    CvtVr { src: u32, wid: u32 },

    // ── stacks ──────────────────────────────────────────────
    PushiReal { value: f64 },
    PushiStr { text: StrId },
    PushvStr { src: u32, wid: u32 },
    DupReal,
    PopReal { count: u32 },
    PopStr { count: u32 },
    PopObj { count: u32 },
    ConcatStr,
    ConcatiStr { text: StrId },
    Scopy,

    // ── strings ─────────────────────────────────────────────
    Substr { first_reg: u8, last_reg: u8 },
    SubstrV { dst: u32, idx_reg: u8, wid: u32 },
    PutcStrV { net: NetId, idx_reg: u8, src: u32 },

    // ── class properties (object at TOS, not consumed) ──────
    PropObj { pid: u32 },
    PropR { pid: u32 },
    PropStr { pid: u32 },
    PropV { pid: u32, dst: u32, wid: u32 },

    // ── objects ─────────────────────────────────────────────
    NewCobj { class: ClassId },
    NewDarray { size_reg: u8, tag: StrId, width: u32 },
    Null,
    TestNul { net: NetId },
    DeleteObj { net: NetId },

    // ── index registers ─────────────────────────────────────
    IxAdd { reg: u8, imm: i64 },
    IxSub { reg: u8, imm: i64 },
    IxMul { reg: u8, imm: i64 },
    IxLoad { reg: u8, value: u64 },
    IxGet { reg: u8, src: u32, wid: u32 },
    IxGetS { reg: u8, src: u32, wid: u32 },
    IxGetV { reg: u8, net: NetId },
    IxGetVS { reg: u8, net: NetId },

    // ── control flow ────────────────────────────────────────
    Jmp { dest: CodeAddr },
    Jmp0 { dest: CodeAddr, flag: u32 },
    Jmp0xz { dest: CodeAddr, flag: u32 },
    Jmp1 { dest: CodeAddr, flag: u32 },
    ChunkLink { dest: CodeAddr },
    Noop,
    Breakpoint,
    FileLine { file: StrId, line: u32 },

    // ── timing ──────────────────────────────────────────────
    Delay { low: u32, high: u32 },
    Delayx { reg: u8 },
    Wait { net: NetId },

    // ── threads ─────────────────────────────────────────────
    Fork { code: CodeAddr, scope: ScopeId },
    Join,
    JoinDetach { count: u32 },
    End,
    Disable { scope: ScopeId },
    Alloc { scope: ScopeId },
    Free { scope: ScopeId },
    Evctl { event: NetId, reg: u8 },
    Evctlc,
    Evctli { event: NetId, count: u32 },
    Evctls { event: NetId, reg: u8 },
    Zombie,

    // ── external ────────────────────────────────────────────
    VpiCall { call: VpiCallId },
    /// Run the user-function call site buffered on the given `.ufunc`
    /// node; its core handle is reachable through the node.
    ExecUfunc { net: NetId },
}

/// The loaded, read-only program: instruction stream plus the constant
/// pools the instructions index into.
#[derive(Debug, Default)]
pub struct CodeSpace {
    ops: Vec<Op>,
    strings: Vec<String>,
    classes: Vec<Rc<ClassType>>,
    ufuncs: Vec<UFuncCore>,
}

impl CodeSpace {
    pub fn op(&self, addr: CodeAddr) -> Option<Op> {
        self.ops.get(addr.index()).copied()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn text(&self, id: StrId) -> &str {
        &self.strings[id.0 as usize]
    }

    pub fn class(&self, id: ClassId) -> &Rc<ClassType> {
        &self.classes[id.0 as usize]
    }

    pub fn ufunc(&self, id: UFuncId) -> &UFuncCore {
        &self.ufuncs[id.0 as usize]
    }

    /// A stable one-line-per-instruction listing of the whole code space.
    pub fn listing(&self) -> Listing<'_> {
        Listing { code: self }
    }
}

pub struct Listing<'a> {
    code: &'a CodeSpace,
}

impl std::fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (idx, op) in self.code.ops.iter().enumerate() {
            writeln!(f, "{idx:05}: {op:?}")?;
        }
        Ok(())
    }
}

/// Symbols a textual label can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Code(CodeAddr),
    Net(NetId),
    Scope(ScopeId),
    Array(ArrayId),
}

/// Builder for a [`CodeSpace`]. Code labels may be referenced before they
/// are placed; all references resolve at [`CodeBuilder::finish`].
#[derive(Debug, Default)]
pub struct CodeBuilder {
    code: CodeSpace,
    symbols: HashMap<String, Symbol>,
    string_ids: HashMap<String, StrId>,
    fixups: Vec<(usize, String)>,
}

impl CodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction, returning its address.
    pub fn emit(&mut self, op: Op) -> CodeAddr {
        self.code.ops.push(op);
        CodeAddr(self.code.ops.len() as u32 - 1)
    }

    /// Append a control-flow instruction whose code target is the label
    /// `dest`, resolved at finish time. The placeholder target in `op` is
    /// overwritten.
    pub fn emit_to_label(&mut self, op: Op, dest: impl Into<String>) -> CodeAddr {
        let addr = self.emit(op);
        self.fixups.push((addr.index(), dest.into()));
        addr
    }

    /// The address the next emitted instruction will get.
    pub fn here(&self) -> CodeAddr {
        CodeAddr(self.code.ops.len() as u32)
    }

    /// Place a code label at the current address.
    pub fn label(&mut self, name: impl Into<String>) {
        let here = self.here();
        self.symbols.insert(name.into(), Symbol::Code(here));
    }

    pub fn define_net(&mut self, name: impl Into<String>, net: NetId) {
        self.symbols.insert(name.into(), Symbol::Net(net));
    }

    pub fn define_scope(&mut self, name: impl Into<String>, scope: ScopeId) {
        self.symbols.insert(name.into(), Symbol::Scope(scope));
    }

    pub fn define_array(&mut self, name: impl Into<String>, array: ArrayId) {
        self.symbols.insert(name.into(), Symbol::Array(array));
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.symbols.get(name).copied()
    }

    pub fn net(&self, name: &str) -> Result<NetId, LoadError> {
        match self.lookup(name) {
            Some(Symbol::Net(id)) => Ok(id),
            _ => Err(LoadError::UnresolvedLabel {
                label: name.to_string(),
            }),
        }
    }

    pub fn intern_str(&mut self, text: &str) -> StrId {
        if let Some(id) = self.string_ids.get(text) {
            return *id;
        }
        let id = StrId(self.code.strings.len() as u32);
        self.code.strings.push(text.to_string());
        self.string_ids.insert(text.to_string(), id);
        id
    }

    pub fn add_class(&mut self, class: Rc<ClassType>) -> ClassId {
        self.code.classes.push(class);
        ClassId(self.code.classes.len() as u32 - 1)
    }

    pub fn add_ufunc(&mut self, core: UFuncCore) -> UFuncId {
        self.code.ufuncs.push(core);
        UFuncId(self.code.ufuncs.len() as u32 - 1)
    }

    /// Resolve all pending label references and seal the code space.
    pub fn finish(mut self) -> Result<CodeSpace, LoadError> {
        for (op_idx, label) in std::mem::take(&mut self.fixups) {
            let dest = match self.symbols.get(&label) {
                Some(Symbol::Code(addr)) => *addr,
                _ => return Err(LoadError::UnresolvedLabel { label }),
            };
            set_code_target(&mut self.code.ops[op_idx], dest);
        }
        Ok(self.code)
    }
}

/// Overwrite the code target of a control-transfer instruction. Calling
/// this on any other instruction is a loader bug.
fn set_code_target(op: &mut Op, addr: CodeAddr) {
    match op {
        Op::Jmp { dest }
        | Op::Jmp0 { dest, .. }
        | Op::Jmp0xz { dest, .. }
        | Op::Jmp1 { dest, .. }
        | Op::ChunkLink { dest } => *dest = addr,
        Op::Fork { code, .. } => *code = addr,
        other => unreachable!("label fixup on non-branch op {other:?}"),
    }
}
