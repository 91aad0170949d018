use pisa_isa::parse_program;
use pisa_sim::{montgomery_mul, MultiRegister, ProgramRuntime};

fn runtime_with(width: usize, chain: Vec<u32>) -> ProgramRuntime {
    let mut runtime = ProgramRuntime::new(width);
    runtime.set_modulus_chain(chain);
    runtime
}

fn write(runtime: &mut ProgramRuntime, name: &str, lanes: Vec<u32>) {
    runtime
        .model_mut()
        .memory_mut()
        .write(name, MultiRegister::from_lanes(lanes));
}

fn lanes(runtime: &ProgramRuntime, name: &str) -> Vec<u32> {
    runtime
        .model()
        .memory()
        .get(name)
        .expect("register exists")
        .lanes()
        .to_vec()
}

#[test]
fn add_reduces_lane_wise() {
    let mut runtime = runtime_with(8, vec![17]);
    let a = vec![3, 5, 0, 1, 8, 13, 16, 2];
    let b = vec![4, 14, 0, 16, 9, 5, 16, 2];
    write(&mut runtime, "a", a.clone());
    write(&mut runtime, "b", b.clone());

    let program = parse_program("13, add, c, a, b, 0").expect("parse");
    runtime.execute_program(&program).expect("execute");

    let c = lanes(&runtime, "c");
    assert_eq!(c[0], 7);
    assert_eq!(c[1], 2);
    for lane in 0..8 {
        assert_eq!(c[lane], (a[lane] + b[lane]) % 17);
    }
}

#[test]
fn sub_negates_then_adds() {
    let mut runtime = runtime_with(4, vec![17]);
    write(&mut runtime, "a", vec![3, 0, 5, 16]);
    write(&mut runtime, "b", vec![4, 0, 16, 16]);

    let program = parse_program("13, sub, c, a, b, 0").expect("parse");
    runtime.execute_program(&program).expect("execute");

    assert_eq!(lanes(&runtime, "c"), vec![16, 0, 6, 0]);
}

#[test]
fn mul_is_montgomery_by_default() {
    let mut runtime = runtime_with(8, vec![17]);
    write(&mut runtime, "a", vec![1; 8]);
    write(&mut runtime, "b", vec![1; 8]);

    let program = parse_program("13, mul, c, a, b, 0").expect("parse");
    runtime.execute_program(&program).expect("execute");

    let expected = montgomery_mul(1, 1, 17);
    assert_eq!(expected, 0);
    assert_eq!(lanes(&runtime, "c"), vec![expected; 8]);
}

#[test]
fn mac_accumulates_with_plain_arithmetic() {
    let mut runtime = runtime_with(4, vec![97]);
    runtime.model_mut().set_montgomery_enabled(false);
    write(&mut runtime, "dst", vec![10; 4]);
    write(&mut runtime, "a", vec![2; 4]);
    write(&mut runtime, "b", vec![3; 4]);

    let program = parse_program("13, mac, dst, a, b, 0").expect("parse");
    runtime.execute_program(&program).expect("execute");

    assert_eq!(lanes(&runtime, "dst"), vec![16; 4]);
}

#[test]
fn maci_uses_immediate_lane_zero() {
    let mut runtime = runtime_with(4, vec![97]);
    runtime.model_mut().set_montgomery_enabled(false);
    write(&mut runtime, "dst", vec![1, 2, 3, 4]);
    write(&mut runtime, "a", vec![5; 4]);
    runtime.set_immediate("i0", &[7]).expect("immediate");

    let program = parse_program("13, maci, dst, a, i0, 0").expect("parse");
    runtime.execute_program(&program).expect("execute");

    assert_eq!(lanes(&runtime, "dst"), vec![36, 37, 38, 39]);
}

#[test]
fn copy_is_bit_exact() {
    let mut runtime = runtime_with(4, vec![17]);
    write(&mut runtime, "src", vec![1, 2, 3, 4]);

    let program = parse_program("13, copy, dst, src").expect("parse");
    runtime.execute_program(&program).expect("execute");

    assert_eq!(lanes(&runtime, "dst"), lanes(&runtime, "src"));
}

#[test]
fn muli_scales_by_immediate() {
    let mut runtime = runtime_with(4, vec![97]);
    runtime.model_mut().set_montgomery_enabled(false);
    write(&mut runtime, "a", vec![1, 2, 3, 50]);
    runtime.set_immediate("i0", &[2]).expect("immediate");

    let program = parse_program("13, muli, d, a, i0, 0").expect("parse");
    runtime.execute_program(&program).expect("execute");

    assert_eq!(lanes(&runtime, "d"), vec![2, 4, 6, 3]);
}
