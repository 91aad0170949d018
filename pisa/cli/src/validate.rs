use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args as ClapArgs;
use pisa_sim::{ProgramRuntime, DEFAULT_REGISTER_WIDTH};

use crate::exec::{execute, load_memory, load_program};
use crate::VALIDATION_FAILURE;

const MISMATCH_DETAIL_LIMIT: usize = 20;

#[derive(ClapArgs, Debug, Clone)]
pub struct ValidateArgs {
    /// Path to the P-ISA program
    #[arg(value_name = "PROGRAM")]
    pub program: PathBuf,

    /// Device memory image to load before execution
    #[arg(long, value_name = "CSV")]
    pub memory: Option<PathBuf>,

    /// Memory image holding the expected `memory,` records
    #[arg(long, value_name = "CSV")]
    pub expect: PathBuf,

    /// Multi-register lane count
    #[arg(long, value_name = "LANES", default_value_t = DEFAULT_REGISTER_WIDTH)]
    pub register_width: usize,
}

#[derive(Debug)]
struct Mismatch {
    name: String,
    index: usize,
    expected: u32,
    actual: u32,
}

pub fn run(args: ValidateArgs) -> Result<i32> {
    let instructions = load_program(&args.program)?;
    let mut runtime = ProgramRuntime::new(args.register_width);
    if let Some(memory) = &args.memory {
        load_memory(&mut runtime, memory)?;
    }
    execute(&mut runtime, &instructions, false)?;

    let mut expected = ProgramRuntime::new(args.register_width);
    load_memory(&mut expected, &args.expect)?;

    let mut mismatches = Vec::new();
    let mut missing = Vec::new();
    let mut checked = 0usize;
    for (name, want) in expected.model().memory().registers() {
        checked += 1;
        match runtime.model().memory().get(name) {
            None => missing.push(name.to_string()),
            Some(got) => {
                for (index, (&expected_lane, &actual_lane)) in
                    want.lanes().iter().zip(got.lanes().iter()).enumerate()
                {
                    if expected_lane != actual_lane {
                        mismatches.push(Mismatch {
                            name: name.to_string(),
                            index,
                            expected: expected_lane,
                            actual: actual_lane,
                        });
                    }
                }
                if want.len() != got.len() {
                    mismatches.push(Mismatch {
                        name: name.to_string(),
                        index: want.len().min(got.len()),
                        expected: want.len() as u32,
                        actual: got.len() as u32,
                    });
                }
            }
        }
    }

    let mut stdout = io::BufWriter::new(io::stdout().lock());
    if mismatches.is_empty() && missing.is_empty() {
        writeln!(stdout, "validation passed: {checked} registers match")?;
        stdout.flush()?;
        return Ok(0);
    }

    writeln!(
        stdout,
        "validation failed: {} mismatched lanes, {} missing registers",
        mismatches.len(),
        missing.len()
    )?;
    for name in &missing {
        writeln!(stdout, "  missing register `{name}`")?;
    }
    for mismatch in mismatches.iter().take(MISMATCH_DETAIL_LIMIT) {
        writeln!(
            stdout,
            "  {}[{}]: expected {}, got {}",
            mismatch.name, mismatch.index, mismatch.expected, mismatch.actual
        )?;
    }
    if mismatches.len() > MISMATCH_DETAIL_LIMIT {
        writeln!(
            stdout,
            "  ({} further mismatches suppressed)",
            mismatches.len() - MISMATCH_DETAIL_LIMIT
        )?;
    }
    stdout.flush()?;
    Ok(VALIDATION_FAILURE)
}
