use proptest::prelude::*;
use quarta::{
    Bit4, CodeBuilder, NodeFun, Op, Runtime, ScopeKind, Signal4, Vector4,
};

fn v(s: &str) -> Vector4 {
    s.parse().unwrap()
}

/// Run a straight-line opcode sequence in a fresh thread, with one 4-bit
/// result signal the sequence can store into.
fn run_program(width: usize, emit: impl FnOnce(&mut CodeBuilder, quarta::NetId)) -> Runtime {
    let mut rt = Runtime::builder().build();
    let top = rt.scopes_mut().add(ScopeKind::Module, "top", None);
    let out = rt
        .nets_mut()
        .add_named(NodeFun::Sig4(Signal4::new(width)), "out");
    rt.declare_signal(top, out);

    let mut b = CodeBuilder::new();
    let start = b.here();
    emit(&mut b, out);
    b.emit(Op::End);
    rt.install_code(b.finish().unwrap());
    rt.spawn_root(start, top);
    rt.run();
    rt
}

/// 4-bit unsigned add with a discarded carry: 13 + 3 wraps to 0.
#[test]
fn test_add_with_carry_discard() {
    let rt = run_program(4, |b, out| {
        b.emit(Op::Movi {
            dst: 8,
            imm: 0b1101,
            wid: 4,
        });
        b.emit(Op::Movi {
            dst: 16,
            imm: 0b0011,
            wid: 4,
        });
        b.emit(Op::Add {
            dst: 8,
            src: 16,
            wid: 4,
        });
        b.emit(Op::SetVec {
            net: out,
            src: 8,
            wid: 4,
        });
    });
    assert_eq!(rt.read_vec4(rt.signal("top.out").unwrap()), v("0000"));
}

#[test]
fn test_sub_is_add_of_complement() {
    let rt = run_program(8, |b, out| {
        b.emit(Op::Movi {
            dst: 8,
            imm: 100,
            wid: 8,
        });
        b.emit(Op::Subi {
            dst: 8,
            imm: 58,
            wid: 8,
        });
        b.emit(Op::SetVec {
            net: out,
            src: 8,
            wid: 8,
        });
    });
    let out = rt.read_vec4(rt.signal("top.out").unwrap());
    assert_eq!(out.as_u64(), Some(42));
}

#[test]
fn test_mul_div_mod_opcodes() {
    let rt = run_program(8, |b, out| {
        // 7 * 6 = 42; 42 / 5 = 8; 8 % 3 = 2
        b.emit(Op::Movi {
            dst: 8,
            imm: 7,
            wid: 8,
        });
        b.emit(Op::Muli {
            dst: 8,
            imm: 6,
            wid: 8,
        });
        b.emit(Op::Movi {
            dst: 16,
            imm: 5,
            wid: 8,
        });
        b.emit(Op::Div {
            dst: 8,
            src: 16,
            wid: 8,
        });
        b.emit(Op::Movi {
            dst: 16,
            imm: 3,
            wid: 8,
        });
        b.emit(Op::Mod {
            dst: 8,
            src: 16,
            wid: 8,
        });
        b.emit(Op::SetVec {
            net: out,
            src: 8,
            wid: 8,
        });
    });
    let out = rt.read_vec4(rt.signal("top.out").unwrap());
    assert_eq!(out.as_u64(), Some(2));
}

/// Any X or Z operand bit poisons arithmetic to all-X. Address 2 of the
/// thread bit space reads the X constant.
#[test]
fn test_xz_operand_poisons_add() {
    let rt = run_program(4, |b, out| {
        b.emit(Op::Movi {
            dst: 8,
            imm: 0b1101,
            wid: 4,
        });
        // Overwrite one bit with X, then add.
        b.emit(Op::Mov {
            dst: 9,
            src: 2,
            wid: 1,
        });
        b.emit(Op::Addi {
            dst: 8,
            imm: 1,
            wid: 4,
        });
        b.emit(Op::SetVec {
            net: out,
            src: 8,
            wid: 4,
        });
    });
    assert_eq!(rt.read_vec4(rt.signal("top.out").unwrap()), v("xxxx"));
}

#[test]
fn test_shift_with_unknown_amount_flag() {
    let rt = run_program(4, |b, out| {
        b.emit(Op::Movi {
            dst: 8,
            imm: 0b0110,
            wid: 4,
        });
        b.emit(Op::IxLoad { reg: 0, value: 1 });
        // Set the unknown flag (bit 4); the shift result must be all-X.
        b.emit(Op::Mov {
            dst: 4,
            src: 1,
            wid: 1,
        });
        b.emit(Op::ShiftlI0 { base: 8, wid: 4 });
        b.emit(Op::SetVec {
            net: out,
            src: 8,
            wid: 4,
        });
    });
    assert_eq!(rt.read_vec4(rt.signal("top.out").unwrap()), v("xxxx"));
}

#[test]
fn test_pad_and_cast2() {
    let rt = run_program(8, |b, out| {
        // Replicate the Z constant, then cast away the unknowns.
        b.emit(Op::Pad {
            dst: 8,
            src: 3,
            wid: 8,
        });
        b.emit(Op::Cast2 {
            dst: 8,
            src: 8,
            wid: 8,
        });
        b.emit(Op::SetVec {
            net: out,
            src: 8,
            wid: 8,
        });
    });
    assert_eq!(
        rt.read_vec4(rt.signal("top.out").unwrap()),
        v("00000000")
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// sign_extend then truncate is the identity.
    #[test]
    fn prop_sign_extend_round_trip(value in any::<u16>(), extra in 0usize..32) {
        let v16 = Vector4::from_u64(16, value as u64);
        let wide = v16.sign_extended(16 + extra);
        prop_assert_eq!(wide.subvector(0, 16), v16);
    }

    /// (a + b) - b == a modulo the width.
    #[test]
    fn prop_add_sub_identity(a in any::<u32>(), b in any::<u32>()) {
        let av = Vector4::from_u64(32, a as u64);
        let rt = run_program(32, |code, out| {
            code.emit(Op::Movi { dst: 8, imm: a as u64, wid: 32 });
            code.emit(Op::Movi { dst: 40, imm: b as u64, wid: 32 });
            code.emit(Op::Add { dst: 8, src: 40, wid: 32 });
            code.emit(Op::Sub { dst: 8, src: 40, wid: 32 });
            code.emit(Op::SetVec { net: out, src: 8, wid: 32 });
        });
        prop_assert_eq!(rt.read_vec4(rt.signal("top.out").unwrap()), av);
    }

    /// Word-array round trip preserves two-state vectors exactly, and
    /// refuses vectors with X/Z bits.
    #[test]
    fn prop_word_array_round_trip(words in proptest::collection::vec(any::<u64>(), 1..4)) {
        let wid = words.len() * 64;
        let vec = Vector4::from_words(wid, &words);
        let back = vec.to_words().expect("two-state");
        prop_assert_eq!(back, words);

        let mut with_x = vec.clone();
        with_x.set_bit(wid / 2, Bit4::X);
        prop_assert!(with_x.to_words().is_none());
    }
}
