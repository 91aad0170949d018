use pisa_isa::{parse_line, parse_program, Instruction, Operand, WParam};

fn round_trip(instr: &Instruction) -> Instruction {
    parse_line(&instr.to_string(), 1).expect("reparse printed instruction")
}

#[test]
fn every_opcode_round_trips_through_text() {
    let instructions = vec![
        Instruction::add(
            13,
            Operand::banked("c_0_0", 1),
            Operand::banked("a_0_0", 0),
            Operand::banked("b_0_0", 0),
            0,
        ),
        Instruction::sub(
            13,
            Operand::register("c_0_1"),
            Operand::register("a_0_1"),
            Operand::register("b_0_1"),
            1,
        ),
        Instruction::mul(
            13,
            Operand::register("tmp"),
            Operand::register("a"),
            Operand::register("b"),
            2,
        ),
        Instruction::muli(
            13,
            Operand::register("d"),
            Operand::register("a"),
            Operand::register("i0"),
            2,
        ),
        Instruction::mac(
            13,
            Operand::banked("acc_0", 3),
            Operand::register("a_0"),
            Operand::register("b_0"),
            0,
        ),
        Instruction::maci(
            13,
            Operand::register("acc_1"),
            Operand::register("a_1"),
            Operand::register("i1"),
            1,
        ),
        Instruction::copy(13, Operand::register("dst"), Operand::register("src")),
        Instruction::ntt(
            14,
            Operand::register("d0"),
            Operand::register("d1"),
            Operand::register("s0"),
            Operand::register("s1"),
            WParam::new(2, 5, 3),
            2,
        ),
        Instruction::intt(
            14,
            Operand::register("d0"),
            Operand::register("d1"),
            Operand::register("s0"),
            Operand::register("s1"),
            WParam::new(2, 5, 3),
            2,
            3,
        ),
    ];

    for instr in &instructions {
        assert_eq!(&round_trip(instr), instr, "round trip for {}", instr.opcode);
    }
}

#[test]
fn parsed_line_prints_back_identically() {
    let line = "13, add, r_0_1 (2), r_0_2 (0), r_0_3 (0), 0";
    let instr = parse_line(line, 1).expect("parse line");
    assert_eq!(instr.to_string(), line);
}

#[test]
fn printed_program_reparses_equal() {
    let program = "\
13, add, out0 (1), in0 (0), in1 (0), 0
13, mul, tmp, a, b, 2
13, ntt, d0, d1, s0, s1, w_2_5_3, 2
13, intt, d0, d1, s0, s1, w_2_5_3, 2, 1
13, muli, d, a, i0, 2
";
    let parsed = parse_program(program).expect("parse program");
    let printed: String = parsed
        .iter()
        .map(|instr| format!("{instr}\n"))
        .collect();
    let reparsed = parse_program(&printed).expect("reparse printed program");
    assert_eq!(parsed, reparsed);
}
