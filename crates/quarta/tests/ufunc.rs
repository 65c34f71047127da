use quarta::{
    CodeBuilder, NetPtr, NodeFun, Op, Runtime, ScopeKind, Signal4, UFuncCore, UFuncFun, Vector4,
};

fn v(s: &str) -> Vector4 {
    s.parse().unwrap()
}

/// A `.ufunc` node: input changes are buffered on the node, the function
/// body runs to completion, and the result propagates downstream.
#[test]
fn test_ufunc_node_recomputes_on_input_change() {
    let mut rt = Runtime::builder().build();
    let top = rt.scopes_mut().add(ScopeKind::Module, "top", None);
    let func = rt.scopes_mut().add(ScopeKind::Function, "inc", Some(top));

    // Function port and result variables.
    let port = rt.nets_mut().add_named(NodeFun::Sig4(Signal4::new(8)), "a");
    let result = rt
        .nets_mut()
        .add_named(NodeFun::Sig4(Signal4::new(8)), "inc");
    rt.declare_signal(func, port);
    rt.declare_signal(func, result);

    let out = rt
        .nets_mut()
        .add_named(NodeFun::Sig4(Signal4::new(8)), "out");
    rt.declare_signal(top, out);

    // Function body: inc = a + 1.
    let mut code = CodeBuilder::new();
    let body = code.here();
    code.emit(Op::LoadV {
        dst: 8,
        net: port,
        wid: 8,
    });
    code.emit(Op::Addi {
        dst: 8,
        imm: 1,
        wid: 8,
    });
    code.emit(Op::SetVec {
        net: result,
        src: 8,
        wid: 8,
    });
    code.emit(Op::End);

    let core = code.add_ufunc(UFuncCore {
        scope: func,
        code: body,
        ports: vec![port],
        result,
    });
    rt.install_code(code.finish().unwrap());

    let call_site = rt.nets_mut().add(NodeFun::UFunc(UFuncFun {
        core,
        inputs: vec![Vector4::new(8)],
        scheduled: false,
    }));
    rt.nets_mut().link(call_site, NetPtr::new(out, 0));

    rt.set_vec4(call_site, Vector4::from_u64(8, 41));
    rt.run();
    assert_eq!(rt.read_vec4(out).as_u64(), Some(42));

    rt.set_vec4(call_site, Vector4::from_u64(8, 7));
    rt.run();
    assert_eq!(rt.read_vec4(out).as_u64(), Some(8));
}

/// The `exec_ufunc` opcode runs the same call site inline from a thread.
#[test]
fn test_exec_ufunc_opcode() {
    let mut rt = Runtime::builder().build();
    let top = rt.scopes_mut().add(ScopeKind::Module, "top", None);
    let func = rt.scopes_mut().add(ScopeKind::Function, "dbl", Some(top));

    let port = rt.nets_mut().add_named(NodeFun::Sig4(Signal4::new(8)), "a");
    let result = rt
        .nets_mut()
        .add_named(NodeFun::Sig4(Signal4::new(8)), "dbl");
    rt.declare_signal(func, port);
    rt.declare_signal(func, result);

    let out = rt
        .nets_mut()
        .add_named(NodeFun::Sig4(Signal4::new(8)), "out");
    rt.declare_signal(top, out);

    let mut code = CodeBuilder::new();

    // Function body: dbl = a + a.
    let body = code.here();
    code.emit(Op::LoadV {
        dst: 8,
        net: port,
        wid: 8,
    });
    code.emit(Op::LoadV {
        dst: 16,
        net: port,
        wid: 8,
    });
    code.emit(Op::Add {
        dst: 8,
        src: 16,
        wid: 8,
    });
    code.emit(Op::SetVec {
        net: result,
        src: 8,
        wid: 8,
    });
    code.emit(Op::End);

    let core = code.add_ufunc(UFuncCore {
        scope: func,
        code: body,
        ports: vec![port],
        result,
    });
    let call_site = rt.nets_mut().add(NodeFun::UFunc(UFuncFun {
        core,
        inputs: vec![Vector4::from_u64(8, 21)],
        scheduled: false,
    }));
    rt.nets_mut().link(call_site, NetPtr::new(out, 0));

    // Driver thread: run the buffered call site inline.
    let main = code.here();
    code.emit(Op::ExecUfunc { net: call_site });
    code.emit(Op::End);

    rt.install_code(code.finish().unwrap());
    rt.spawn_root(main, top);
    rt.run();

    assert_eq!(rt.read_vec4(out).as_u64(), Some(42));
}
