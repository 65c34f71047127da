use quarta::{
    CodeBuilder, EdgeKind, EventFun, NodeFun, Op, Runtime, RunOutcome, ScopeKind, Signal4,
    Vector4,
};

fn v(s: &str) -> Vector4 {
    s.parse().unwrap()
}

/// A delayed non-blocking assignment captures its value at scheduling
/// time: later procedural writes to the source bits do not change it.
#[test]
fn test_nba_captures_value_at_schedule_time() {
    let mut rt = Runtime::builder().build();
    let top = rt.scopes_mut().add(ScopeKind::Module, "top", None);
    let x = rt.nets_mut().add_named(NodeFun::Sig4(Signal4::new(4)), "x");
    rt.declare_signal(top, x);

    let mut code = CodeBuilder::new();
    let start = code.here();
    // Source bits hold 0110; schedule x <= #5 bits.
    code.emit(Op::Movi {
        dst: 8,
        imm: 0b0110,
        wid: 4,
    });
    code.emit(Op::AssignV0 {
        net: x,
        delay: 5,
        src: 8,
        wid: 4,
    });
    // Clobber the source bits, then write x procedurally.
    code.emit(Op::Movi {
        dst: 8,
        imm: 0b1111,
        wid: 4,
    });
    code.emit(Op::SetVec {
        net: x,
        src: 8,
        wid: 4,
    });
    code.emit(Op::End);
    rt.install_code(code.finish().unwrap());
    rt.spawn_root(start, top);

    assert_eq!(rt.run_to_time(1), RunOutcome::Drained);
    assert_eq!(rt.read_vec4(x), v("1111"), "procedural write visible at T+1");

    rt.run_to_time(5);
    assert_eq!(
        rt.read_vec4(x),
        v("0110"),
        "NBA fires with the value captured at time 0"
    );
}

/// Within one time slot, non-blocking updates apply strictly after the
/// active region drains: a zero-delay NBA scheduled before a procedural
/// write still lands after it.
#[test]
fn test_nba_applies_after_active_region() {
    let mut rt = Runtime::builder().build();
    let top = rt.scopes_mut().add(ScopeKind::Module, "top", None);
    let x = rt.nets_mut().add_named(NodeFun::Sig4(Signal4::new(4)), "x");
    rt.declare_signal(top, x);

    let mut code = CodeBuilder::new();
    let start = code.here();
    code.emit(Op::Movi {
        dst: 8,
        imm: 0b0001,
        wid: 4,
    });
    // x <= 1 (zero delay, lands in the NBA region of this slot)
    code.emit(Op::AssignV0 {
        net: x,
        delay: 0,
        src: 8,
        wid: 4,
    });
    // x = 2 (immediate)
    code.emit(Op::Movi {
        dst: 8,
        imm: 0b0010,
        wid: 4,
    });
    code.emit(Op::SetVec {
        net: x,
        src: 8,
        wid: 4,
    });
    code.emit(Op::End);
    rt.install_code(code.finish().unwrap());
    rt.spawn_root(start, top);
    rt.run();

    assert_eq!(rt.read_vec4(x), v("0001"), "the NBA is the last write");
}

/// NBAs from one thread fire in program order among themselves.
#[test]
fn test_nba_program_order() {
    let mut rt = Runtime::builder().build();
    let top = rt.scopes_mut().add(ScopeKind::Module, "top", None);
    let x = rt.nets_mut().add_named(NodeFun::Sig4(Signal4::new(8)), "x");
    rt.declare_signal(top, x);

    let mut code = CodeBuilder::new();
    let start = code.here();
    for val in [3u64, 7, 11] {
        code.emit(Op::Movi {
            dst: 8,
            imm: val,
            wid: 8,
        });
        code.emit(Op::AssignV0 {
            net: x,
            delay: 0,
            src: 8,
            wid: 8,
        });
    }
    code.emit(Op::End);
    rt.install_code(code.finish().unwrap());
    rt.spawn_root(start, top);
    rt.run();

    assert_eq!(rt.read_vec4(x).as_u64(), Some(11));
}

/// Event-controlled NBA: `%evctl` arms {event, count}; the update only
/// lands after that many triggers.
#[test]
fn test_event_controlled_assign() {
    let mut rt = Runtime::builder().build();
    let top = rt.scopes_mut().add(ScopeKind::Module, "top", None);
    let clk = rt
        .nets_mut()
        .add_named(NodeFun::Sig4(Signal4::new(1)), "clk");
    let x = rt.nets_mut().add_named(NodeFun::Sig4(Signal4::new(4)), "x");
    rt.declare_signal(top, clk);
    rt.declare_signal(top, x);

    let ev = rt
        .nets_mut()
        .add(NodeFun::Event(EventFun::new(EdgeKind::Posedge)));
    rt.nets_mut().link(clk, quarta::NetPtr::new(ev, 0));

    let mut code = CodeBuilder::new();
    let start = code.here();
    code.emit(Op::Movi {
        dst: 8,
        imm: 0b1001,
        wid: 4,
    });
    // x <= @(posedge clk, repeat 2) 4'b1001
    code.emit(Op::Evctli { event: ev, count: 2 });
    code.emit(Op::AssignV0E {
        net: x,
        src: 8,
        wid: 4,
    });
    code.emit(Op::End);
    rt.install_code(code.finish().unwrap());
    rt.spawn_root(start, top);
    rt.run();

    assert!(rt.read_vec4(x).has_xz(), "update still pending");

    // First posedge: count 2 -> 1, still pending.
    rt.set_vec4(clk, v("1"));
    rt.run();
    assert!(rt.read_vec4(x).has_xz());

    // Second posedge releases the update.
    rt.set_vec4(clk, v("0"));
    rt.set_vec4(clk, v("1"));
    rt.run();
    assert_eq!(rt.read_vec4(x), v("1001"));
}

/// Part-select NBA with the offset in word register 1; out-of-range bits
/// are trimmed.
#[test]
fn test_nba_part_select_offset() {
    let mut rt = Runtime::builder().build();
    let top = rt.scopes_mut().add(ScopeKind::Module, "top", None);
    let x = rt.nets_mut().add_named(NodeFun::Sig4(Signal4::new(8)), "x");
    rt.declare_signal(top, x);

    let mut code = CodeBuilder::new();
    let start = code.here();
    code.emit(Op::Movi {
        dst: 8,
        imm: 0,
        wid: 8,
    });
    code.emit(Op::SetVec {
        net: x,
        src: 8,
        wid: 8,
    });
    code.emit(Op::Movi {
        dst: 16,
        imm: 0b11,
        wid: 2,
    });
    // Write the 2-bit part at offset 6, landing in the top bits.
    code.emit(Op::IxLoad { reg: 1, value: 6 });
    code.emit(Op::AssignV0X1 {
        net: x,
        delay: 0,
        src: 16,
        wid: 2,
    });
    code.emit(Op::End);
    rt.install_code(code.finish().unwrap());
    rt.spawn_root(start, top);
    rt.run();

    assert_eq!(rt.read_vec4(x), v("11000000"));
}
