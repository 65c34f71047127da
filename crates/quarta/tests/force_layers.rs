use quarta::{
    CodeBuilder, GateFun, GateKind, NetPtr, NodeFun, Op, Runtime, ScopeKind, Signal4, Vector4,
};

fn v(s: &str) -> Vector4 {
    s.parse().unwrap()
}

fn setup(width: usize) -> (Runtime, quarta::ScopeId, quarta::NetId) {
    let mut rt = Runtime::builder().build();
    let top = rt.scopes_mut().add(ScopeKind::Module, "top", None);
    let sig = rt
        .nets_mut()
        .add_named(NodeFun::Sig4(Signal4::new(width)), "s");
    rt.declare_signal(top, sig);
    (rt, top, sig)
}

fn run(rt: &mut Runtime, top: quarta::ScopeId, mut code: CodeBuilder, start: quarta::CodeAddr) {
    code.emit(Op::End);
    rt.install_code(code.finish().unwrap());
    rt.spawn_root(start, top);
    rt.run();
}

/// The cassign/deassign cycle: a continuous assign overrides procedural
/// writes, and a deassign restores them.
#[test]
fn test_cassign_deassign_cycle() {
    let (mut rt, top, sig) = setup(4);

    let mut code = CodeBuilder::new();
    let start = code.here();
    // Procedural value 1010.
    code.emit(Op::Movi {
        dst: 8,
        imm: 0b1010,
        wid: 4,
    });
    code.emit(Op::SetVec {
        net: sig,
        src: 8,
        wid: 4,
    });
    // Continuous-assign 0000 over it.
    code.emit(Op::Movi {
        dst: 16,
        imm: 0,
        wid: 4,
    });
    code.emit(Op::CassignV {
        net: sig,
        src: 16,
        wid: 4,
    });
    run(&mut rt, top, code, start);

    assert_eq!(rt.read_vec4(sig), v("0000"), "cassign overrides");

    // Procedural writes are ignored while the cassign is active.
    rt.set_vec4(sig, v("1111"));
    assert_eq!(rt.read_vec4(sig), v("0000"));

    // Deassign alone: the procedural value shows through again.
    {
        let mut code = CodeBuilder::new();
        let start = code.here();
        code.emit(Op::Deassign {
            net: sig,
            base: 0,
            wid: 4,
        });
        code.emit(Op::End);
        rt.install_code(code.finish().unwrap());
        rt.spawn_root(start, top);
        rt.run();
    }
    assert_eq!(rt.read_vec4(sig), v("1010"), "deassign restores");
}

/// Partial deassign releases only the addressed bit range: the reopened
/// bits revert to the procedural value and accept procedural writes
/// again, while the rest stays under the cassign.
#[test]
fn test_partial_deassign_reopens_bits() {
    let (mut rt, top, sig) = setup(4);

    let mut code = CodeBuilder::new();
    let start = code.here();
    code.emit(Op::Movi {
        dst: 8,
        imm: 0b1010,
        wid: 4,
    });
    code.emit(Op::SetVec {
        net: sig,
        src: 8,
        wid: 4,
    });
    code.emit(Op::Movi {
        dst: 16,
        imm: 0,
        wid: 4,
    });
    code.emit(Op::CassignV {
        net: sig,
        src: 16,
        wid: 4,
    });
    code.emit(Op::Deassign {
        net: sig,
        base: 0,
        wid: 2,
    });
    run(&mut rt, top, code, start);

    // Low bits show the procedural value, high bits the cassign.
    assert_eq!(rt.read_vec4(sig), v("0010"));

    // A procedural write lands on the reopened bits only.
    rt.set_vec4(sig, v("1111"));
    assert_eq!(rt.read_vec4(sig), v("0011"));
}

/// After `force; release/net` reads see the driven value again; after
/// `force; release/reg` the forced value sticks until the next assign.
#[test]
fn test_force_release_net_vs_reg() {
    let (mut rt, top, sig) = setup(4);

    let mut code = CodeBuilder::new();
    let start = code.here();
    code.emit(Op::Movi {
        dst: 8,
        imm: 0b1010,
        wid: 4,
    });
    code.emit(Op::SetVec {
        net: sig,
        src: 8,
        wid: 4,
    });
    code.emit(Op::Movi {
        dst: 16,
        imm: 0b0101,
        wid: 4,
    });
    code.emit(Op::ForceV {
        net: sig,
        src: 16,
        wid: 4,
    });
    run(&mut rt, top, code, start);
    assert_eq!(rt.read_vec4(sig), v("0101"), "force overrides reads");

    // Release from the net side: back to the driven value.
    {
        let mut code = CodeBuilder::new();
        let start = code.here();
        code.emit(Op::ReleaseNet { net: sig });
        code.emit(Op::End);
        rt.install_code(code.finish().unwrap());
        rt.spawn_root(start, top);
        rt.run();
    }
    assert_eq!(rt.read_vec4(sig), v("1010"), "release/net reverts");

    // Force again, release from the reg side: the forced value stays.
    {
        let mut code = CodeBuilder::new();
        let start = code.here();
        code.emit(Op::Movi {
            dst: 16,
            imm: 0b0101,
            wid: 4,
        });
        code.emit(Op::ForceV {
            net: sig,
            src: 16,
            wid: 4,
        });
        code.emit(Op::ReleaseReg { net: sig });
        code.emit(Op::End);
        rt.install_code(code.finish().unwrap());
        rt.spawn_root(start, top);
        rt.run();
    }
    assert_eq!(rt.read_vec4(sig), v("0101"), "release/reg retains");

    // The retained value yields to the next procedural assignment.
    rt.set_vec4(sig, v("1100"));
    assert_eq!(rt.read_vec4(sig), v("1100"));
}

/// Force wins over an active continuous assign.
#[test]
fn test_force_beats_cassign() {
    let (mut rt, top, sig) = setup(4);

    let mut code = CodeBuilder::new();
    let start = code.here();
    code.emit(Op::Movi {
        dst: 8,
        imm: 0b0011,
        wid: 4,
    });
    code.emit(Op::CassignV {
        net: sig,
        src: 8,
        wid: 4,
    });
    code.emit(Op::Movi {
        dst: 16,
        imm: 0b1100,
        wid: 4,
    });
    code.emit(Op::ForceV {
        net: sig,
        src: 16,
        wid: 4,
    });
    run(&mut rt, top, code, start);
    assert_eq!(rt.read_vec4(sig), v("1100"));
}

/// cassign/link wires a driver net onto the signal's cassign port, and
/// linking a new source unlinks the previous one.
#[test]
fn test_cassign_link_replaces_source() {
    let mut rt = Runtime::builder().build();
    let top = rt.scopes_mut().add(ScopeKind::Module, "top", None);
    let sig = rt.nets_mut().add_named(NodeFun::Sig4(Signal4::new(2)), "s");
    rt.declare_signal(top, sig);

    // Two 2-bit driver nets holding constants via buffers.
    let src_a = rt
        .nets_mut()
        .add(NodeFun::Gate(GateFun::new(GateKind::Buf, 2, 1)));
    let src_b = rt
        .nets_mut()
        .add(NodeFun::Gate(GateFun::new(GateKind::Buf, 2, 1)));

    let mut code = CodeBuilder::new();
    let start = code.here();
    code.emit(Op::CassignLink { dst: sig, src: src_a });
    code.emit(Op::End);
    rt.install_code(code.finish().unwrap());
    rt.spawn_root(start, top);
    rt.run();

    // Drive the linked source; the signal follows it.
    rt.set_vec4(src_a, v("10"));
    assert_eq!(rt.read_vec4(sig), v("10"));

    // Re-link to the other source: the old link is removed.
    {
        let mut code = CodeBuilder::new();
        let start = code.here();
        code.emit(Op::CassignLink { dst: sig, src: src_b });
        code.emit(Op::End);
        rt.install_code(code.finish().unwrap());
        rt.spawn_root(start, top);
        rt.run();
    }
    rt.set_vec4(src_b, v("01"));
    assert_eq!(rt.read_vec4(sig), v("01"));
    rt.set_vec4(src_a, v("11"));
    assert_eq!(rt.read_vec4(sig), v("01"), "old source is unlinked");

    assert!(!rt
        .nets()
        .node(src_a)
        .links
        .contains(&NetPtr::new(sig, 1)));
}

/// Constant drivers seed the graph once at the end of elaboration.
#[test]
fn test_const_driver_initial_propagation() {
    let mut rt = Runtime::builder().build();
    let top = rt.scopes_mut().add(ScopeKind::Module, "top", None);
    let sig = rt.nets_mut().add_named(NodeFun::Sig4(Signal4::new(4)), "s");
    rt.declare_signal(top, sig);
    let k = rt.nets_mut().add(NodeFun::Const(v("1011")));
    rt.nets_mut().link(k, NetPtr::new(sig, 0));

    assert!(rt.read_vec4(sig).has_xz(), "unseeded signal reads X");
    rt.propagate_initial();
    assert_eq!(rt.read_vec4(sig), v("1011"));
}

/// Partial deassign with an active full-signal cassign link is a fatal
/// diagnostic, not a crash.
#[test]
fn test_partial_deassign_of_linked_signal_diagnoses() {
    let mut rt = Runtime::builder().build();
    let top = rt.scopes_mut().add(ScopeKind::Module, "top", None);
    let sig = rt.nets_mut().add_named(NodeFun::Sig4(Signal4::new(4)), "s");
    rt.declare_signal(top, sig);
    let src = rt
        .nets_mut()
        .add(NodeFun::Gate(GateFun::new(GateKind::Buf, 4, 1)));

    let mut code = CodeBuilder::new();
    let start = code.here();
    code.emit(Op::CassignLink { dst: sig, src });
    code.emit(Op::Deassign {
        net: sig,
        base: 1,
        wid: 2,
    });
    code.emit(Op::End);
    rt.install_code(code.finish().unwrap());
    rt.spawn_root(start, top);
    rt.run();

    assert!(rt.diagnostics().error_count() > 0);
    assert_eq!(rt.exit_status(), 1);
}
