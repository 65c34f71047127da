//! Compile-time evaluation of user functions.
//!
//! During elaboration, calls to pure user functions with constant
//! arguments can be folded. The evaluator tree-walks the function's
//! statement graph under a name-to-value binding: one entry per declared
//! local and port, plus an entry under the function's own base name that
//! carries the return value.
//!
//! Any statement or expression the evaluator does not support produces a
//! diagnostic and fails the whole fold; the caller falls back to runtime
//! evaluation.

use crate::arith;
use crate::error::Diagnostics;
use crate::logic::Bit4;
use crate::vector4::Vector4;
use crate::HashMap;

/// A constant value: a (possibly signed) vector or a real.
#[derive(Debug, Clone, PartialEq)]
pub enum CValue {
    Vec4 { value: Vector4, signed: bool },
    Real(f64),
}

impl CValue {
    pub fn vec(value: Vector4) -> Self {
        CValue::Vec4 {
            value,
            signed: false,
        }
    }

    pub fn signed_vec(value: Vector4) -> Self {
        CValue::Vec4 {
            value,
            signed: true,
        }
    }

    pub fn as_vec4(&self) -> Option<&Vector4> {
        match self {
            CValue::Vec4 { value, .. } => Some(value),
            CValue::Real(_) => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            CValue::Real(v) => Some(*v),
            CValue::Vec4 { value, signed } => {
                if *signed {
                    value.to_words().map(|_| arith::signed_to_f64(value, value.len()))
                } else {
                    value.to_words().map(|_| arith::unsigned_to_f64(value))
                }
            }
        }
    }

    /// A definite scalar truth value, or `None` for an unknown.
    fn as_logic(&self) -> Option<bool> {
        match self {
            CValue::Real(v) => Some(*v != 0.0),
            CValue::Vec4 { value, .. } => {
                if value.has_xz() {
                    None
                } else {
                    Some(value.val_words().iter().any(|w| *w != 0))
                }
            }
        }
    }

    fn as_index(&self) -> Option<i64> {
        match self {
            CValue::Real(v) => Some(*v as i64),
            CValue::Vec4 { value, signed } => {
                let words = value.to_words()?;
                let mut v = words.first().copied().unwrap_or(0);
                if *signed && value.len() < 64 && value.value(value.len() - 1) == Bit4::One {
                    v |= !0 << value.len();
                }
                Some(v as i64)
            }
        }
    }
}

/// Declared type of a signal in a function scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigType {
    /// Four-state vector; the default initial value is all-X.
    Logic { width: usize, signed: bool },
    /// Two-state vector; the default initial value is all-zero.
    Bool { width: usize, signed: bool },
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogAnd,
    LogOr,
    ShiftL,
    ShiftR,
    ShiftRS,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    BitNot,
    LogNot,
    ReduceAnd,
    ReduceNand,
    ReduceOr,
    ReduceNor,
    ReduceXor,
    ReduceXnor,
}

/// Built-in system functions the evaluator folds. Everything else fails
/// the fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SysFunc {
    Clog2,
    Sqrt,
    Ln,
    Log10,
    Exp,
    Floor,
    Ceil,
    Pow,
    Itor,
    Rtoi,
}

/// A constant-foldable expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    Const { value: Vector4, signed: bool },
    ConstReal(f64),
    Signal { name: String, ty: SigType },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        width: usize,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
        width: usize,
    },
    Ternary {
        cond: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    /// Part select when `base` is present, otherwise a pad/truncate to
    /// `width` (sign-extending when `signed`).
    Select {
        expr: Box<Expr>,
        base: Option<Box<Expr>>,
        width: usize,
        signed: bool,
    },
    /// Concatenation, first part most significant, whole list repeated
    /// `repeat` times.
    Concat { parts: Vec<Expr>, repeat: usize },
    SysFunc { id: SysFunc, args: Vec<Expr> },
    UserCall { func: FuncId, args: Vec<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub(crate) u32);

#[derive(Debug, Clone)]
pub enum CaseKind {
    Eq,
    EqX,
    EqZ,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    /// Sequential block, optionally labelled (the label is a disable
    /// target).
    Block {
        label: Option<String>,
        stmts: Vec<Stmt>,
    },
    Assign {
        name: String,
        /// Part-select base expression; whole-signal assign when absent.
        base: Option<Expr>,
        /// Width of the assigned part.
        lwidth: usize,
        /// Declared width of the destination signal.
        sig_width: usize,
        signed: bool,
        rval: Expr,
    },
    Condit {
        cond: Expr,
        if_true: Option<Box<Stmt>>,
        if_false: Option<Box<Stmt>>,
    },
    Case {
        kind: CaseKind,
        expr: Expr,
        /// `(guard, statement)`; a `None` guard is the default item.
        items: Vec<(Option<Expr>, Stmt)>,
    },
    While { cond: Expr, body: Box<Stmt> },
    Forever { body: Box<Stmt> },
    Repeat { count: Expr, body: Box<Stmt> },
    Disable { target: String },
    /// System tasks are ignored at constant evaluation.
    SysTask,
}

#[derive(Debug, Clone)]
pub struct PortDef {
    pub name: String,
    pub width: usize,
    pub signed: bool,
}

#[derive(Debug, Clone)]
pub struct LocalDef {
    pub name: String,
    pub ty: SigType,
}

/// A function definition as the elaborator hands it over: the scope's
/// base name doubles as the return-value binding.
#[derive(Debug, Clone)]
pub struct FuncDef {
    pub name: String,
    pub ports: Vec<PortDef>,
    pub ret: SigType,
    pub locals: Vec<LocalDef>,
    pub stmt: Option<Stmt>,
}

/// The function definitions known to the evaluator; user-function calls
/// recurse through this table.
#[derive(Debug, Default)]
pub struct FuncTable {
    funcs: Vec<FuncDef>,
}

impl FuncTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, def: FuncDef) -> FuncId {
        self.funcs.push(def);
        FuncId(self.funcs.len() as u32 - 1)
    }

    pub fn def(&self, id: FuncId) -> &FuncDef {
        &self.funcs[id.0 as usize]
    }

    /// Attach (or replace) a function body after the definition exists.
    /// Recursive and mutually recursive functions need their ids first.
    pub fn set_stmt(&mut self, id: FuncId, stmt: Stmt) {
        self.funcs[id.0 as usize].stmt = Some(stmt);
    }

    /// Fold one call. Returns `None` when anything in the body is not
    /// evaluable at compile time.
    pub fn evaluate_function(
        &self,
        id: FuncId,
        args: &[CValue],
        diags: &mut Diagnostics,
    ) -> Option<CValue> {
        let mut eval = Evaluator {
            funcs: self,
            diags,
            disable: None,
        };
        eval.call(id, args)
    }
}

type ContextMap = HashMap<String, Option<CValue>>;

struct Evaluator<'a> {
    funcs: &'a FuncTable,
    diags: &'a mut Diagnostics,
    /// Active disable target: enclosing blocks and loops terminate early
    /// until the labelled block is reached.
    disable: Option<String>,
}

impl Evaluator<'_> {
    fn call(&mut self, id: FuncId, args: &[CValue]) -> Option<CValue> {
        let def = self.funcs.def(id);
        if def.ports.len() != args.len() {
            self.diags
                .error(format!("wrong argument count for function {}", def.name));
            return None;
        }

        // Build the context map: the return value, the input ports, and
        // the scope's locals.
        let mut ctx: ContextMap = ContextMap::default();
        ctx.insert(def.name.clone(), None);
        for (port, arg) in def.ports.iter().zip(args) {
            ctx.insert(
                port.name.clone(),
                Some(fix_assign_value(arg.clone(), port.width, port.signed)),
            );
        }
        for local in &def.locals {
            ctx.entry(local.name.clone()).or_insert(None);
        }

        let flag = match &def.stmt {
            Some(stmt) => self.eval_stmt(stmt, &mut ctx),
            None => false,
        };

        let res = ctx.remove(&def.name).flatten();
        if flag { res } else { None }
    }

    // ── statements ──────────────────────────────────────────

    fn eval_stmt(&mut self, stmt: &Stmt, ctx: &mut ContextMap) -> bool {
        match stmt {
            Stmt::Block { label, stmts } => {
                let mut flag = true;
                for cur in stmts {
                    flag = flag && self.eval_stmt(cur, ctx);
                    if !flag || self.disable.is_some() {
                        break;
                    }
                }
                if self.disable.as_deref() == label.as_deref() && label.is_some() {
                    self.disable = None;
                }
                flag
            }

            Stmt::Assign {
                name,
                base,
                lwidth,
                sig_width,
                signed,
                rval,
            } => self.eval_assign(name, base.as_ref(), *lwidth, *sig_width, *signed, rval, ctx),

            Stmt::Condit {
                cond,
                if_true,
                if_false,
            } => {
                let Some(cond) = self.eval_expr(cond, ctx) else {
                    return false;
                };
                // The condition must be definite at compile time.
                let taken = cond.as_index().map(|v| v != 0).unwrap_or(false);
                let branch = if taken { if_true } else { if_false };
                match branch {
                    Some(stmt) => self.eval_stmt(stmt, ctx),
                    None => true,
                }
            }

            Stmt::Case { kind, expr, items } => self.eval_case(kind, expr, items, ctx),

            Stmt::While { cond, body } => {
                loop {
                    if self.disable.is_some() {
                        break;
                    }
                    let Some(c) = self.eval_expr(cond, ctx) else {
                        return false;
                    };
                    if c.as_index().unwrap_or(0) == 0 {
                        break;
                    }
                    if !self.eval_stmt(body, ctx) {
                        return false;
                    }
                }
                true
            }

            Stmt::Forever { body } => {
                let mut flag = true;
                while flag && self.disable.is_none() {
                    flag = self.eval_stmt(body, ctx);
                }
                flag
            }

            Stmt::Repeat { count, body } => {
                let Some(count) = self.eval_expr(count, ctx) else {
                    return false;
                };
                let mut count = count.as_index().unwrap_or(0);
                let mut flag = true;
                while count > 0 && flag && self.disable.is_none() {
                    flag = self.eval_stmt(body, ctx);
                    count -= 1;
                }
                flag
            }

            Stmt::Disable { target } => {
                self.disable = Some(target.clone());
                true
            }

            Stmt::SysTask => true,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn eval_assign(
        &mut self,
        name: &str,
        base: Option<&Expr>,
        lwidth: usize,
        sig_width: usize,
        signed: bool,
        rval: &Expr,
        ctx: &mut ContextMap,
    ) -> bool {
        let Some(rval_result) = self.eval_expr(rval, ctx) else {
            return false;
        };

        if !ctx.contains_key(name) {
            self.diags
                .error(format!("cannot evaluate {name} in this context"));
            return false;
        }

        let stored = if let Some(base_expr) = base {
            let Some(base_val) = self.eval_expr(base_expr, ctx) else {
                return false;
            };
            let Some(base) = base_val.as_index() else {
                self.diags
                    .error("part-select base is not a constant here".to_string());
                return false;
            };
            // Fetch the current destination, initializing to all-X at
            // the declared width, and splice the coerced r-value in.
            let mut lval = match ctx.get(name).and_then(|v| v.clone()) {
                Some(CValue::Vec4 { value, .. }) => value,
                _ => Vector4::new(sig_width),
            };
            let Some(part) = rval_result.as_vec4() else {
                self.diags
                    .error("cannot mix real and vector in a part assign".to_string());
                return false;
            };
            let part = part.coerced(lwidth, false);
            if base >= 0 {
                lval.set_vec(base as usize, &part);
            }
            CValue::Vec4 {
                value: lval,
                signed,
            }
        } else {
            fix_assign_value(rval_result, lwidth, signed)
        };

        ctx.insert(name.to_string(), Some(stored));
        true
    }

    fn eval_case(
        &mut self,
        kind: &CaseKind,
        expr: &Expr,
        items: &[(Option<Expr>, Stmt)],
        ctx: &mut ContextMap,
    ) -> bool {
        let Some(case_val) = self.eval_expr(expr, ctx) else {
            return false;
        };

        // Real selectors compare by value equality.
        if let CValue::Real(case_val) = case_val {
            let mut default_statement = None;
            for (guard, stmt) in items {
                let Some(guard) = guard else {
                    default_statement = Some(stmt);
                    continue;
                };
                let Some(item) = self.eval_expr(guard, ctx) else {
                    return false;
                };
                if item.as_real() == Some(case_val) {
                    return self.eval_stmt(stmt, ctx);
                }
            }
            return match default_statement {
                Some(stmt) => self.eval_stmt(stmt, ctx),
                None => true,
            };
        }

        let case_vec = case_val.as_vec4().cloned().unwrap_or_else(|| Vector4::new(0));
        let mut default_statement = None;
        for (guard, stmt) in items {
            let Some(guard) = guard else {
                default_statement = Some(stmt);
                continue;
            };
            let Some(item) = self.eval_expr(guard, ctx) else {
                return false;
            };
            let Some(item_vec) = item.as_vec4() else {
                continue;
            };
            if case_match(kind, &case_vec, item_vec) {
                return self.eval_stmt(stmt, ctx);
            }
        }
        match default_statement {
            Some(stmt) => self.eval_stmt(stmt, ctx),
            None => true,
        }
    }

    // ── expressions ─────────────────────────────────────────

    fn eval_expr(&mut self, expr: &Expr, ctx: &mut ContextMap) -> Option<CValue> {
        match expr {
            Expr::Const { value, signed } => Some(CValue::Vec4 {
                value: value.clone(),
                signed: *signed,
            }),

            Expr::ConstReal(v) => Some(CValue::Real(*v)),

            Expr::Signal { name, ty } => {
                let Some(entry) = ctx.get_mut(name) else {
                    self.diags
                        .error(format!("cannot evaluate {name} in this context"));
                    return None;
                };
                if entry.is_none() {
                    // First read of an unassigned local: produce and
                    // cache the type's default value.
                    *entry = Some(match ty {
                        SigType::Real => CValue::Real(0.0),
                        SigType::Bool { width, signed } => CValue::Vec4 {
                            value: Vector4::zeros(*width),
                            signed: *signed,
                        },
                        SigType::Logic { width, signed } => CValue::Vec4 {
                            value: Vector4::new(*width),
                            signed: *signed,
                        },
                    });
                }
                entry.clone()
            }

            Expr::Binary {
                op,
                lhs,
                rhs,
                width,
            } => {
                let lval = self.eval_expr(lhs, ctx)?;
                let rval = self.eval_expr(rhs, ctx)?;
                self.eval_binary(*op, lval, rval, *width)
            }

            Expr::Unary { op, expr, width } => {
                let val = self.eval_expr(expr, ctx)?;
                self.eval_unary(*op, val, *width)
            }

            Expr::Ternary {
                cond,
                if_true,
                if_false,
            } => {
                let cval = self.eval_expr(cond, ctx)?;
                match cval.as_logic() {
                    Some(true) => self.eval_expr(if_true, ctx),
                    Some(false) => self.eval_expr(if_false, ctx),
                    None => {
                        // Unknown condition: evaluate both sides and
                        // blend, keeping agreeing bits.
                        let tval = self.eval_expr(if_true, ctx)?;
                        let fval = self.eval_expr(if_false, ctx)?;
                        let t = tval.as_vec4()?;
                        let f = fval.as_vec4()?;
                        let wid = t.len().max(f.len());
                        let mut out = Vector4::new(wid);
                        for idx in 0..wid {
                            let tb = t.value(idx);
                            if tb == f.value(idx) {
                                out.set_bit(idx, tb);
                            }
                        }
                        Some(CValue::vec(out))
                    }
                }
            }

            Expr::Select {
                expr,
                base,
                width,
                signed,
            } => {
                let sub = self.eval_expr(expr, ctx)?;
                let sub_vec = match sub {
                    CValue::Vec4 { value, .. } => value,
                    CValue::Real(v) => arith::f64_to_vec4(v, *width),
                };
                match base {
                    Some(base_expr) => {
                        let base_val = self.eval_expr(base_expr, ctx)?;
                        let base = base_val.as_index()?;
                        let mut res = Vector4::new(*width);
                        for idx in 0..*width {
                            let src = base + idx as i64;
                            if src >= 0 {
                                res.set_bit(idx, sub_vec.value(src as usize));
                            }
                        }
                        Some(CValue::vec(res))
                    }
                    None => Some(CValue::Vec4 {
                        value: sub_vec.coerced(*width, *signed),
                        signed: *signed,
                    }),
                }
            }

            Expr::Concat { parts, repeat } => {
                let mut vals = Vec::with_capacity(parts.len());
                for part in parts {
                    let val = self.eval_expr(part, ctx)?;
                    vals.push(val.as_vec4()?.clone());
                }
                let mut out = Vector4::new(0);
                for _ in 0..*repeat {
                    // First part is most significant.
                    for val in vals.iter().rev() {
                        out.append(val);
                    }
                }
                Some(CValue::vec(out))
            }

            Expr::SysFunc { id, args } => self.eval_sys_func(*id, args, ctx),

            Expr::UserCall { func, args } => {
                let mut vals = Vec::with_capacity(args.len());
                for arg in args {
                    vals.push(self.eval_expr(arg, ctx)?);
                }
                self.call(*func, &vals)
            }
        }
    }

    fn eval_binary(&mut self, op: BinOp, lval: CValue, rval: CValue, width: usize) -> Option<CValue> {
        // Real arithmetic when either side is real.
        if matches!(lval, CValue::Real(_)) || matches!(rval, CValue::Real(_)) {
            let l = lval.as_real()?;
            let r = rval.as_real()?;
            return Some(match op {
                BinOp::Add => CValue::Real(l + r),
                BinOp::Sub => CValue::Real(l - r),
                BinOp::Mul => CValue::Real(l * r),
                BinOp::Div => CValue::Real(l / r),
                BinOp::Mod => CValue::Real(l % r),
                BinOp::Pow => CValue::Real(l.powf(r)),
                BinOp::Eq => bool_value(l == r),
                BinOp::Ne => bool_value(l != r),
                BinOp::Lt => bool_value(l < r),
                BinOp::Le => bool_value(l <= r),
                BinOp::Gt => bool_value(l > r),
                BinOp::Ge => bool_value(l >= r),
                BinOp::LogAnd => bool_value(l != 0.0 && r != 0.0),
                BinOp::LogOr => bool_value(l != 0.0 || r != 0.0),
                _ => {
                    self.diags
                        .error("cannot evaluate this real operator at compile time");
                    return None;
                }
            });
        }

        let (l, l_signed) = match &lval {
            CValue::Vec4 { value, signed } => (value, *signed),
            CValue::Real(_) => unreachable!(),
        };
        let (r, r_signed) = match &rval {
            CValue::Vec4 { value, signed } => (value, *signed),
            CValue::Real(_) => unreachable!(),
        };
        let signed = l_signed && r_signed;

        let coerce = |v: &Vector4| v.coerced(width, signed);

        Some(match op {
            BinOp::Add => CValue::Vec4 {
                value: arith::add(&coerce(l), &coerce(r), width),
                signed,
            },
            BinOp::Sub => CValue::Vec4 {
                value: arith::sub(&coerce(l), &coerce(r), width),
                signed,
            },
            BinOp::Mul => CValue::Vec4 {
                value: arith::mul(&coerce(l), &coerce(r), width),
                signed,
            },
            BinOp::Div => CValue::Vec4 {
                value: if signed {
                    arith::div_s(&coerce(l), &coerce(r), width)
                } else {
                    arith::div(&coerce(l), &coerce(r), width)
                },
                signed,
            },
            BinOp::Mod => CValue::Vec4 {
                value: if signed {
                    arith::modulus_s(&coerce(l), &coerce(r), width)
                } else {
                    arith::modulus(&coerce(l), &coerce(r), width)
                },
                signed,
            },
            BinOp::Pow => CValue::Vec4 {
                value: if signed {
                    arith::pow_s(&coerce(l), r, width)
                } else {
                    arith::pow(&coerce(l), r, width)
                },
                signed,
            },
            BinOp::BitAnd => CValue::vec(arith::bitwise(
                arith::BitwiseOp::And,
                &coerce(l),
                &coerce(r),
                width,
            )),
            BinOp::BitOr => CValue::vec(arith::bitwise(
                arith::BitwiseOp::Or,
                &coerce(l),
                &coerce(r),
                width,
            )),
            BinOp::BitXor => CValue::vec(arith::bitwise(
                arith::BitwiseOp::Xor,
                &coerce(l),
                &coerce(r),
                width,
            )),
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let wid = l.len().max(r.len());
                let lc = l.coerced(wid, l_signed);
                let rc = r.coerced(wid, r_signed);
                let flags = if signed {
                    arith::cmps(&lc, &rc, wid)
                } else {
                    arith::cmpu(&lc, &rc, wid)
                };
                let bit = match op {
                    BinOp::Eq => flags.eq,
                    BinOp::Ne => flags.eq.not(),
                    BinOp::Lt => flags.lt,
                    BinOp::Ge => flags.lt.not(),
                    BinOp::Le => flags.lt.or(flags.eq),
                    BinOp::Gt => flags.lt.or(flags.eq).not(),
                    _ => unreachable!(),
                };
                CValue::vec(Vector4::from_bits(&[bit]))
            }
            BinOp::LogAnd => {
                let bit = match (lval.as_logic(), rval.as_logic()) {
                    (Some(false), _) | (_, Some(false)) => Bit4::Zero,
                    (Some(true), Some(true)) => Bit4::One,
                    _ => Bit4::X,
                };
                CValue::vec(Vector4::from_bits(&[bit]))
            }
            BinOp::LogOr => {
                let bit = match (lval.as_logic(), rval.as_logic()) {
                    (Some(true), _) | (_, Some(true)) => Bit4::One,
                    (Some(false), Some(false)) => Bit4::Zero,
                    _ => Bit4::X,
                };
                CValue::vec(Vector4::from_bits(&[bit]))
            }
            BinOp::ShiftL | BinOp::ShiftR | BinOp::ShiftRS => {
                let Some(shift) = rval.as_index() else {
                    return Some(CValue::vec(Vector4::new(width)));
                };
                let lc = l.coerced(width, l_signed);
                let value = match op {
                    BinOp::ShiftL => arith::shiftl(&lc, shift, false),
                    BinOp::ShiftR => arith::shiftr(&lc, shift, false),
                    _ => arith::shiftr_s(&lc, shift, false),
                };
                CValue::Vec4 {
                    value,
                    signed: l_signed,
                }
            }
        })
    }

    fn eval_unary(&mut self, op: UnOp, val: CValue, width: usize) -> Option<CValue> {
        if let CValue::Real(v) = val {
            return match op {
                UnOp::Neg => Some(CValue::Real(-v)),
                UnOp::LogNot => Some(bool_value(v == 0.0)),
                _ => {
                    self.diags
                        .error("cannot evaluate this real operator at compile time");
                    None
                }
            };
        }
        let (v, signed) = match &val {
            CValue::Vec4 { value, signed } => (value, *signed),
            CValue::Real(_) => unreachable!(),
        };
        Some(match op {
            UnOp::Neg => CValue::Vec4 {
                value: arith::negated(&v.coerced(width, signed), width),
                signed,
            },
            UnOp::BitNot => CValue::Vec4 {
                value: arith::invert(&v.coerced(width, signed)),
                signed,
            },
            UnOp::LogNot => {
                let bit = match val.as_logic() {
                    Some(b) => {
                        if b {
                            Bit4::Zero
                        } else {
                            Bit4::One
                        }
                    }
                    None => Bit4::X,
                };
                CValue::vec(Vector4::from_bits(&[bit]))
            }
            UnOp::ReduceAnd => reduce_value(arith::ReduceOp::And, v),
            UnOp::ReduceNand => reduce_value(arith::ReduceOp::Nand, v),
            UnOp::ReduceOr => reduce_value(arith::ReduceOp::Or, v),
            UnOp::ReduceNor => reduce_value(arith::ReduceOp::Nor, v),
            UnOp::ReduceXor => reduce_value(arith::ReduceOp::Xor, v),
            UnOp::ReduceXnor => reduce_value(arith::ReduceOp::Xnor, v),
        })
    }

    fn eval_sys_func(&mut self, id: SysFunc, args: &[Expr], ctx: &mut ContextMap) -> Option<CValue> {
        let mut vals = Vec::with_capacity(args.len());
        for arg in args {
            vals.push(self.eval_expr(arg, ctx)?);
        }
        match (id, vals.as_slice()) {
            (SysFunc::Clog2, [v]) => {
                let v = v.as_index()?;
                let mut res = 0u64;
                let mut acc = 1i64;
                while acc < v {
                    acc *= 2;
                    res += 1;
                }
                Some(CValue::vec(Vector4::from_u64(32, res)))
            }
            (SysFunc::Sqrt, [v]) => Some(CValue::Real(v.as_real()?.sqrt())),
            (SysFunc::Ln, [v]) => Some(CValue::Real(v.as_real()?.ln())),
            (SysFunc::Log10, [v]) => Some(CValue::Real(v.as_real()?.log10())),
            (SysFunc::Exp, [v]) => Some(CValue::Real(v.as_real()?.exp())),
            (SysFunc::Floor, [v]) => Some(CValue::Real(v.as_real()?.floor())),
            (SysFunc::Ceil, [v]) => Some(CValue::Real(v.as_real()?.ceil())),
            (SysFunc::Itor, [v]) => Some(CValue::Real(v.as_real()?)),
            (SysFunc::Rtoi, [v]) => {
                let r = v.as_real()?;
                Some(CValue::signed_vec(arith::f64_to_vec4(r.trunc(), 32)))
            }
            (SysFunc::Pow, [l, r]) => Some(CValue::Real(l.as_real()?.powf(r.as_real()?))),
            _ => {
                self.diags.error(
                    "sorry: I don't know how to evaluate this system function at compile time",
                );
                None
            }
        }
    }
}

/// Coerce an assigned value to the l-value width with the usual trim,
/// pad, and sign-extension rules.
fn fix_assign_value(value: CValue, width: usize, signed: bool) -> CValue {
    match value {
        CValue::Real(v) => CValue::Vec4 {
            value: arith::f64_to_vec4(v, width),
            signed,
        },
        CValue::Vec4 { value, signed: vs } => CValue::Vec4 {
            value: value.coerced(width, vs),
            signed,
        },
    }
}

fn bool_value(b: bool) -> CValue {
    CValue::vec(Vector4::from_bits(&[if b { Bit4::One } else { Bit4::Zero }]))
}

fn reduce_value(op: arith::ReduceOp, v: &Vector4) -> CValue {
    CValue::vec(Vector4::from_bits(&[arith::reduce(op, v)]))
}

/// Guard matching for case statements: `casex` wildcards X and Z on
/// either side, `casez` only Z, plain `case` matches exactly.
fn case_match(kind: &CaseKind, case_val: &Vector4, item_val: &Vector4) -> bool {
    let wid = case_val.len().max(item_val.len());
    for idx in 0..wid {
        let a = case_val.value(idx);
        let b = item_val.value(idx);
        if matches!(kind, CaseKind::EqX) && (a == Bit4::X || b == Bit4::X) {
            continue;
        }
        if !matches!(kind, CaseKind::Eq) && (a == Bit4::Z || b == Bit4::Z) {
            continue;
        }
        if a != b {
            return false;
        }
    }
    true
}
