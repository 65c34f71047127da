use quarta::{
    BinOp, CValue, CaseKind, Diagnostics, Expr, FuncDef, FuncTable, LocalDef, PortDef, SigType,
    Stmt, Vector4,
};

fn const8(v: u64) -> Expr {
    Expr::Const {
        value: Vector4::from_u64(8, v),
        signed: false,
    }
}

fn sig8(name: &str) -> Expr {
    Expr::Signal {
        name: name.to_string(),
        ty: SigType::Logic {
            width: 8,
            signed: false,
        },
    }
}

fn assign8(name: &str, rval: Expr) -> Stmt {
    Stmt::Assign {
        name: name.to_string(),
        base: None,
        lwidth: 8,
        sig_width: 8,
        signed: false,
        rval,
    }
}

fn binary8(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
        width: 8,
    }
}

/// function [7:0] f(x); f = x*x + 1; endfunction — f(5) folds to 26.
#[test]
fn test_fold_square_plus_one() {
    let mut table = FuncTable::new();
    let f = table.add(FuncDef {
        name: "f".to_string(),
        ports: vec![PortDef {
            name: "x".to_string(),
            width: 8,
            signed: false,
        }],
        ret: SigType::Logic {
            width: 8,
            signed: false,
        },
        locals: vec![],
        stmt: Some(assign8(
            "f",
            binary8(
                BinOp::Add,
                binary8(BinOp::Mul, sig8("x"), sig8("x")),
                const8(1),
            ),
        )),
    });

    let mut diags = Diagnostics::new();
    let res = table
        .evaluate_function(f, &[CValue::vec(Vector4::from_u64(8, 5))], &mut diags)
        .expect("fold succeeds");
    assert_eq!(res.as_vec4().unwrap().as_u64(), Some(26));
    assert_eq!(res.as_vec4().unwrap().len(), 8);
    assert_eq!(diags.error_count(), 0);
}

/// An iterative factorial through a while loop over a local.
#[test]
fn test_fold_factorial_loop() {
    let mut table = FuncTable::new();
    let f = table.add(FuncDef {
        name: "fact".to_string(),
        ports: vec![PortDef {
            name: "n".to_string(),
            width: 8,
            signed: false,
        }],
        ret: SigType::Logic {
            width: 8,
            signed: false,
        },
        locals: vec![LocalDef {
            name: "i".to_string(),
            ty: SigType::Bool {
                width: 8,
                signed: false,
            },
        }],
        stmt: Some(Stmt::Block {
            label: None,
            stmts: vec![
                assign8("fact", const8(1)),
                assign8("i", const8(1)),
                Stmt::While {
                    cond: Expr::Binary {
                        op: BinOp::Le,
                        lhs: Box::new(sig8("i")),
                        rhs: Box::new(sig8("n")),
                        width: 1,
                    },
                    body: Box::new(Stmt::Block {
                        label: None,
                        stmts: vec![
                            assign8("fact", binary8(BinOp::Mul, sig8("fact"), sig8("i"))),
                            assign8("i", binary8(BinOp::Add, sig8("i"), const8(1))),
                        ],
                    }),
                },
            ],
        }),
    });

    let mut diags = Diagnostics::new();
    let res = table
        .evaluate_function(f, &[CValue::vec(Vector4::from_u64(8, 5))], &mut diags)
        .unwrap();
    assert_eq!(res.as_vec4().unwrap().as_u64(), Some(120));
}

/// Recursion through the user-call expression: fib(10) = 55. The body is
/// attached after the definition so it can reference its own id.
#[test]
fn test_fold_recursive_call() {
    let mut table = FuncTable::new();
    let fib = table.add(FuncDef {
        name: "fib".to_string(),
        ports: vec![PortDef {
            name: "n".to_string(),
            width: 8,
            signed: false,
        }],
        ret: SigType::Logic {
            width: 8,
            signed: false,
        },
        locals: vec![],
        stmt: None,
    });
    let call = |arg: Expr| Expr::UserCall {
        func: fib,
        args: vec![arg],
    };
    table.set_stmt(
        fib,
        Stmt::Condit {
            cond: Expr::Binary {
                op: BinOp::Lt,
                lhs: Box::new(sig8("n")),
                rhs: Box::new(const8(2)),
                width: 1,
            },
            if_true: Some(Box::new(assign8("fib", sig8("n")))),
            if_false: Some(Box::new(assign8(
                "fib",
                binary8(
                    BinOp::Add,
                    call(binary8(BinOp::Sub, sig8("n"), const8(1))),
                    call(binary8(BinOp::Sub, sig8("n"), const8(2))),
                ),
            ))),
        },
    );

    let mut diags = Diagnostics::new();
    let res = table
        .evaluate_function(fib, &[CValue::vec(Vector4::from_u64(8, 10))], &mut diags)
        .unwrap();
    assert_eq!(res.as_vec4().unwrap().as_u64(), Some(55));
}

/// casez treats Z as a wildcard in the guards; casex also wildcards X.
#[test]
fn test_fold_case_wildcards() {
    let guard: Vector4 = "1zz0".parse().unwrap();
    let build = |kind: CaseKind, sel: Vector4| {
        let mut table = FuncTable::new();
        let f = table.add(FuncDef {
            name: "f".to_string(),
            ports: vec![PortDef {
                name: "s".to_string(),
                width: 4,
                signed: false,
            }],
            ret: SigType::Logic {
                width: 8,
                signed: false,
            },
            locals: vec![],
            stmt: Some(Stmt::Case {
                kind,
                expr: Expr::Signal {
                    name: "s".to_string(),
                    ty: SigType::Logic {
                        width: 4,
                        signed: false,
                    },
                },
                items: vec![
                    (
                        Some(Expr::Const {
                            value: guard.clone(),
                            signed: false,
                        }),
                        assign8("f", const8(1)),
                    ),
                    (None, assign8("f", const8(0))),
                ],
            }),
        });
        let mut diags = Diagnostics::new();
        table
            .evaluate_function(f, &[CValue::vec(sel)], &mut diags)
            .unwrap()
            .as_vec4()
            .unwrap()
            .as_u64()
    };

    assert_eq!(build(CaseKind::EqZ, "1010".parse().unwrap()), Some(1));
    assert_eq!(build(CaseKind::EqZ, "0010".parse().unwrap()), Some(0));
    // casez does not wildcard an X selector bit; casex does.
    assert_eq!(build(CaseKind::EqZ, "x010".parse().unwrap()), Some(0));
    assert_eq!(build(CaseKind::EqX, "x010".parse().unwrap()), Some(1));
}

/// Reading an unassigned local yields the type default (X for logic),
/// which poisons arithmetic.
#[test]
fn test_unassigned_local_reads_x() {
    let mut table = FuncTable::new();
    let f = table.add(FuncDef {
        name: "f".to_string(),
        ports: vec![],
        ret: SigType::Logic {
            width: 8,
            signed: false,
        },
        locals: vec![LocalDef {
            name: "tmp".to_string(),
            ty: SigType::Logic {
                width: 8,
                signed: false,
            },
        }],
        stmt: Some(assign8(
            "f",
            binary8(BinOp::Add, sig8("tmp"), const8(1)),
        )),
    });
    let mut diags = Diagnostics::new();
    let res = table.evaluate_function(f, &[], &mut diags).unwrap();
    assert!(res.as_vec4().unwrap().has_xz());
}
