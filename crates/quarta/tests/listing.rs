use insta::assert_snapshot;
use quarta::{CodeBuilder, Op};

/// The code listing is stable: one line per instruction with decoded
/// operands, addresses resolved.
#[test]
fn test_code_listing() {
    let mut b = CodeBuilder::new();
    b.emit(Op::Movi {
        dst: 8,
        imm: 5,
        wid: 4,
    });
    b.emit(Op::Add {
        dst: 8,
        src: 16,
        wid: 4,
    });
    b.emit_to_label(
        Op::Jmp {
            dest: quarta::CodeAddr::default(),
        },
        "done",
    );
    b.emit(Op::Noop);
    b.label("done");
    b.emit(Op::End);
    let code = b.finish().unwrap();

    assert_snapshot!("code_listing", code.listing().to_string());
}
