use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use pisa_isa::{parse_program, Instruction};
use pisa_sim::{ProgramRuntime, DEFAULT_REGISTER_WIDTH};

#[derive(ClapArgs, Debug, Clone)]
pub struct ExecArgs {
    /// Path to the P-ISA program (CSV, one instruction per line)
    #[arg(value_name = "PROGRAM")]
    pub program: PathBuf,

    /// Device memory image to load before execution
    #[arg(long, value_name = "CSV")]
    pub memory: Option<PathBuf>,

    /// Write the post-execution memory image to this path
    #[arg(long, value_name = "CSV")]
    pub dump: Option<PathBuf>,

    /// Restrict the dump to these register names (repeatable)
    #[arg(long, value_name = "NAME")]
    pub address: Vec<String>,

    /// Trace operand values per instruction and replay them on failure
    #[arg(long)]
    pub debug: bool,

    /// Multi-register lane count
    #[arg(long, value_name = "LANES", default_value_t = DEFAULT_REGISTER_WIDTH)]
    pub register_width: usize,
}

pub fn run(args: ExecArgs) -> Result<()> {
    let instructions = load_program(&args.program)?;
    let mut runtime = ProgramRuntime::new(args.register_width);
    runtime.set_debug_mode(args.debug);
    if let Some(memory) = &args.memory {
        load_memory(&mut runtime, memory)?;
    }

    execute(&mut runtime, &instructions, args.debug)
        .with_context(|| format!("execution of `{}` failed", args.program.display()))?;

    if let Some(path) = &args.dump {
        write_dump(&runtime, path, &args.address)?;
    }

    println!("executed {} instructions", instructions.len());
    Ok(())
}

pub(crate) fn load_program(path: &Path) -> Result<Vec<Instruction>> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read program `{}`", path.display()))?;
    let instructions = parse_program(&source)
        .with_context(|| format!("failed to parse program `{}`", path.display()))?;
    Ok(instructions)
}

pub(crate) fn load_memory(runtime: &mut ProgramRuntime, path: &Path) -> Result<()> {
    let file = File::open(path)
        .with_context(|| format!("failed to open memory image `{}`", path.display()))?;
    runtime
        .set_device_memory(BufReader::new(file))
        .with_context(|| format!("failed to load memory image `{}`", path.display()))?;
    Ok(())
}

pub(crate) fn execute(
    runtime: &mut ProgramRuntime,
    instructions: &[Instruction],
    debug: bool,
) -> Result<()> {
    let result = runtime.execute_program(instructions);
    if result.is_err() && debug {
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "execution trace up to the failure:");
        for trace in runtime.model().traces() {
            let _ = trace.write_summary(&mut stderr, 10);
        }
    }
    result?;
    Ok(())
}

fn write_dump(runtime: &ProgramRuntime, path: &Path, addresses: &[String]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create dump `{}`", path.display()))?;
    let mut out = BufWriter::new(file);
    if addresses.is_empty() {
        runtime.dump_device_memory(&mut out)?;
    } else {
        runtime.dump_device_registers(&mut out, addresses)?;
    }
    out.flush()?;
    Ok(())
}
