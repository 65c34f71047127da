use criterion::{Criterion, criterion_group, criterion_main};
use quarta::{CodeBuilder, NodeFun, Op, Runtime, ScopeKind, Signal4};

/// A counting loop: decrement a word register, conditional-jump back,
/// store the result. Exercises fetch/dispatch, vector arithmetic, and a
/// signal store per iteration.
fn build_counter(iters: u64) -> (Runtime, quarta::CodeAddr, quarta::ScopeId) {
    let mut rt = Runtime::builder().build();
    let top = rt.scopes_mut().add(ScopeKind::Module, "top", None);
    let out = rt
        .nets_mut()
        .add_named(NodeFun::Sig4(Signal4::new(32)), "out");
    rt.declare_signal(top, out);

    let mut b = CodeBuilder::new();
    let start = b.here();
    b.emit(Op::Movi {
        dst: 8,
        imm: 0,
        wid: 32,
    });
    b.emit(Op::IxLoad {
        reg: 1,
        value: iters,
    });
    b.label("loop");
    b.emit(Op::Addi {
        dst: 8,
        imm: 1,
        wid: 32,
    });
    b.emit(Op::IxSub { reg: 1, imm: 1 });
    b.emit(Op::IxLoad { reg: 2, value: 0 });
    b.emit(Op::CmpWu { a_reg: 1, b_reg: 2 });
    b.emit_to_label(
        Op::Jmp0 {
            dest: quarta::CodeAddr::default(),
            flag: 4,
        },
        "loop",
    );
    b.emit(Op::SetVec {
        net: out,
        src: 8,
        wid: 32,
    });
    b.emit(Op::End);
    let code = b.finish().unwrap();
    rt.install_code(code);
    (rt, start, top)
}

fn bench_dispatch_loop(c: &mut Criterion) {
    c.bench_function("counter_10k", |b| {
        b.iter(|| {
            let (mut rt, start, top) = build_counter(10_000);
            rt.spawn_root(start, top);
            rt.run();
            rt
        })
    });
}

criterion_group!(benches, bench_dispatch_loop);
criterion_main!(benches);
