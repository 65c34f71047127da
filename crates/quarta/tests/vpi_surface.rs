use quarta::{
    CodeBuilder, NodeFun, Op, Runtime, RunOutcome, ScopeKind, Signal4, SignalReal, ThreadId,
    Vector4, VpiIterate, VpiProp, VpiPutMode, VpiRef, VpiStrProp, VpiValue,
};
use std::cell::RefCell;
use std::rc::Rc;

fn v(s: &str) -> Vector4 {
    s.parse().unwrap()
}

fn build_tree() -> (Runtime, quarta::ScopeId, quarta::ScopeId) {
    let mut rt = Runtime::builder().build();
    let top = rt.scopes_mut().add(ScopeKind::Module, "top", None);
    let child = rt.scopes_mut().add(ScopeKind::Task, "t0", Some(top));
    {
        let scope = rt.scopes_mut().scope_mut(top);
        scope.loc.file = "top.v".to_string();
        scope.loc.lineno = 3;
        scope.loc.def_file = "top.v".to_string();
        scope.loc.def_lineno = 1;
        scope.type_name = "top".to_string();
        scope.time_units = -9;
        scope.time_precision = -12;
        scope.is_cell = false;
    }
    rt.scopes_mut().scope_mut(child).is_automatic = true;
    (rt, top, child)
}

#[test]
fn test_scope_attributes() {
    let (rt, top, child) = build_tree();
    let h = VpiRef::Scope(top);

    assert_eq!(rt.vpi_get(VpiProp::TopModule, h), 1);
    assert_eq!(rt.vpi_get(VpiProp::LineNo, h), 3);
    assert_eq!(rt.vpi_get(VpiProp::DefLineNo, h), 1);
    assert_eq!(rt.vpi_get(VpiProp::TimeUnit, h), -9);
    assert_eq!(rt.vpi_get(VpiProp::TimePrecision, h), -12);
    assert_eq!(rt.vpi_get(VpiProp::CellInstance, h), 0);
    assert_eq!(rt.vpi_get(VpiProp::Automatic, h), 0);
    assert_eq!(rt.vpi_get(VpiProp::Automatic, VpiRef::Scope(child)), 1);

    assert_eq!(rt.vpi_get_str(VpiStrProp::Name, h), "top");
    assert_eq!(rt.vpi_get_str(VpiStrProp::DefName, h), "top");
    assert_eq!(rt.vpi_get_str(VpiStrProp::File, h), "top.v");
    assert_eq!(
        rt.vpi_get_str(VpiStrProp::FullName, VpiRef::Scope(child)),
        "top.t0"
    );

    // Timescale inherits downward at scope creation.
    assert_eq!(rt.vpi_get(VpiProp::TimeUnit, VpiRef::Scope(child)), -9);
}

#[test]
fn test_iterate_children() {
    let (mut rt, top, child) = build_tree();
    let sig = rt.nets_mut().add_named(NodeFun::Sig4(Signal4::new(8)), "s");
    rt.declare_signal(top, sig);

    let all = rt.vpi_iterate(VpiRef::Scope(top), VpiIterate::Scope);
    assert!(all.contains(&VpiRef::Scope(child)));
    assert!(all.contains(&VpiRef::Net(sig)));

    let nets = rt.vpi_iterate(VpiRef::Scope(top), VpiIterate::Net);
    assert_eq!(nets, vec![VpiRef::Net(sig)]);

    // `module` iteration skips the task scope.
    let mods = rt.vpi_iterate(VpiRef::Scope(top), VpiIterate::Module);
    assert!(mods.is_empty());

    assert_eq!(
        rt.vpi_scope_of(VpiRef::Net(sig)),
        Some(VpiRef::Scope(top))
    );
}

#[test]
fn test_put_and_get_value() {
    let (mut rt, top, _) = build_tree();
    let sig = rt.nets_mut().add_named(NodeFun::Sig4(Signal4::new(8)), "s");
    let r = rt
        .nets_mut()
        .add_named(NodeFun::SigReal(SignalReal::default()), "r");
    rt.declare_signal(top, sig);
    rt.declare_signal(top, r);

    rt.vpi_put_value(
        VpiRef::Net(sig),
        VpiValue::Vec4(v("10100101")),
        0,
        VpiPutMode::NoDelay,
    )
    .unwrap();
    match rt.vpi_get_value(VpiRef::Net(sig)) {
        Some(VpiValue::Vec4(val)) => assert_eq!(val, v("10100101")),
        other => panic!("unexpected value {other:?}"),
    }

    rt.vpi_put_value(
        VpiRef::Net(r),
        VpiValue::Real(2.5),
        0,
        VpiPutMode::NoDelay,
    )
    .unwrap();
    match rt.vpi_get_value(VpiRef::Net(r)) {
        Some(VpiValue::Real(val)) => assert_eq!(val, 2.5),
        other => panic!("unexpected value {other:?}"),
    }

    assert_eq!(rt.vpi_get(VpiProp::Size, VpiRef::Net(sig)), 8);
}

/// `$stop` from a callback pauses the run; the thread resumes after the
/// embedder clears the stop.
#[test]
fn test_stop_pauses_and_resumes() {
    let (mut rt, top, _) = build_tree();
    let out = rt
        .nets_mut()
        .add_named(NodeFun::Sig4(Signal4::new(1)), "out");
    rt.declare_signal(top, out);

    let stop_call = rt.register_vpi_call(Rc::new(|rt: &mut Runtime, _t: ThreadId| {
        rt.vpi_stop();
    }));

    let mut code = CodeBuilder::new();
    let start = code.here();
    code.emit(Op::VpiCall { call: stop_call });
    code.emit(Op::Movi {
        dst: 8,
        imm: 1,
        wid: 1,
    });
    code.emit(Op::SetVec {
        net: out,
        src: 8,
        wid: 1,
    });
    code.emit(Op::End);
    rt.install_code(code.finish().unwrap());
    rt.spawn_root(start, top);

    assert_eq!(rt.run(), RunOutcome::Stopped);
    assert!(rt.read_vec4(out).has_xz(), "stopped before the store");

    rt.resume_after_stop();
    assert_eq!(rt.run(), RunOutcome::Drained);
    assert_eq!(rt.read_vec4(out), v("1"));
}

/// `$finish` ends the run; opcodes after the call never execute.
#[test]
fn test_finish_short_circuits() {
    let (mut rt, top, _) = build_tree();
    let out = rt
        .nets_mut()
        .add_named(NodeFun::Sig4(Signal4::new(1)), "out");
    rt.declare_signal(top, out);

    let hits = Rc::new(RefCell::new(0));
    let hits_in_call = Rc::clone(&hits);
    let finish_call = rt.register_vpi_call(Rc::new(move |rt: &mut Runtime, _t: ThreadId| {
        *hits_in_call.borrow_mut() += 1;
        rt.vpi_finish();
    }));

    let mut code = CodeBuilder::new();
    let start = code.here();
    code.emit(Op::VpiCall { call: finish_call });
    code.emit(Op::Movi {
        dst: 8,
        imm: 1,
        wid: 1,
    });
    code.emit(Op::SetVec {
        net: out,
        src: 8,
        wid: 1,
    });
    code.emit(Op::End);
    rt.install_code(code.finish().unwrap());
    rt.spawn_root(start, top);

    assert_eq!(rt.run(), RunOutcome::Finished);
    assert_eq!(*hits.borrow(), 1);
    assert!(rt.read_vec4(out).has_xz());
    assert_eq!(rt.exit_status(), 0, "$finish is a normal termination");
}
