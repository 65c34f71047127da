mod arith;
mod array;
mod code;
mod debug;
mod error;
mod eval;
mod exec;
mod logic;
mod net;
mod object;
mod runtime;
mod schedule;
mod scope;
mod vcd;
mod vector2;
mod vector4;
mod vpi;

pub(crate) use fxhash::FxHashMap as HashMap;

pub use arith::{BitwiseOp, CmpFlags, ReduceOp};
pub use array::{ArrayArena, ArrayId, ArrayWords, VArray};
pub use code::{
    ClassId, CodeAddr, CodeBuilder, CodeSpace, Op, StrId, Symbol, UFuncCore, UFuncId, VpiCallId,
};
pub use debug::ExecTraceOptions;
pub use error::{Diagnostic, Diagnostics, LoadError, RuntimeError, Severity};
pub use eval::{
    BinOp, CValue, CaseKind, Expr, FuncDef, FuncId, FuncTable, LocalDef, PortDef, SigType, Stmt,
    SysFunc, UnOp,
};
pub use exec::{FLAG_EEQ, FLAG_EQ, FLAG_LT, OBJ_STACK_MAX, Thread, ThreadId, ThreadState};
pub use logic::{Bit4, MachineWord, WORD_BITS, words_for};
pub use malachite_bigint::BigUint;
pub use net::{
    ArithFun, ArithKind, EdgeKind, EventFun, Filter, GateFun, GateKind, NetArena, NetId, NetPtr,
    NetNode, NodeFun, ReleaseMode, Signal4, SignalObject, SignalReal, SignalString, UFuncFun,
};
pub use object::{ClassObject, ClassType, Darray, DarrayKind, ObjectRef, PropType, PropValue};
pub use runtime::{RunOutcome, Runtime, RuntimeBuilder, VpiCall};
pub use schedule::{SchedEvent, Scheduler};
pub use scope::{
    Context, ContextId, ContextItem, ContextSlot, Scope, ScopeArena, ScopeId, ScopeKind, ScopeLoc,
};
pub use vector2::{Vector2, add_with_carry, divide2words, divmod_words, multiply_with_carry};
pub use vector4::Vector4;
pub use vpi::{
    VPI_UNDEFINED, VpiIterate, VpiProp, VpiPutMode, VpiRef, VpiStrProp, VpiValue,
};
