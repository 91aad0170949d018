use std::fs;
use std::path::PathBuf;

use pisa_cli::{exec, validate, ExecArgs, ValidateArgs};
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

fn exec_args(program: PathBuf) -> ExecArgs {
    ExecArgs {
        program,
        memory: None,
        dump: None,
        address: Vec::new(),
        debug: false,
        register_width: 4,
    }
}

#[test]
fn exec_runs_a_program_and_dumps_memory() {
    let dir = TempDir::new().expect("tempdir");
    let program = write_file(&dir, "program.csv", "13, add, c, a, b, 0\n");
    let memory = write_file(
        &dir,
        "memory.csv",
        "modulus_chain,17\nmemory,a,3,5,7,9\nmemory,b,4,14,2,2\n",
    );
    let dump = dir.path().join("out.csv");

    let args = ExecArgs {
        memory: Some(memory),
        dump: Some(dump.clone()),
        ..exec_args(program)
    };
    exec::run(args).expect("exec succeeds");

    let dumped = fs::read_to_string(&dump).expect("read dump");
    assert!(dumped.contains("memory,c,7,2,9,11"));
}

#[test]
fn exec_fails_on_a_bad_program() {
    let dir = TempDir::new().expect("tempdir");
    let program = write_file(&dir, "program.csv", "13, rot, c, a\n");
    let err = exec::run(exec_args(program)).expect_err("unknown opcode");
    assert!(format!("{err:#}").contains("rot"));
}

#[test]
fn validate_reports_success_and_mismatch() {
    let dir = TempDir::new().expect("tempdir");
    let program = write_file(&dir, "program.csv", "13, add, c, a, b, 0\n");
    let memory = write_file(
        &dir,
        "memory.csv",
        "modulus_chain,17\nmemory,a,3,5,7,9\nmemory,b,4,14,2,2\n",
    );
    let good = write_file(&dir, "good.csv", "memory,c,7,2,9,11\n");
    let bad = write_file(&dir, "bad.csv", "memory,c,7,2,9,12\n");

    let passing = ValidateArgs {
        program: program.clone(),
        memory: Some(memory.clone()),
        expect: good,
        register_width: 4,
    };
    assert_eq!(validate::run(passing).expect("validate runs"), 0);

    let failing = ValidateArgs {
        program,
        memory: Some(memory),
        expect: bad,
        register_width: 4,
    };
    assert_eq!(
        validate::run(failing).expect("validate runs"),
        pisa_cli::VALIDATION_FAILURE
    );
}
