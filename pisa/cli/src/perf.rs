use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, ValueEnum};
use pisa_perf::{AnalysisType, HardwareModel, PerformanceModeler, ScheduleConfig, ScheduleMode};

use crate::exec::load_program;

#[derive(ClapArgs, Debug, Clone)]
pub struct PerfArgs {
    /// Path to the P-ISA program
    #[arg(value_name = "PROGRAM")]
    pub program: PathBuf,

    /// Hardware profile: example, model1 or model2
    #[arg(long, value_name = "NAME", default_value = "example")]
    pub model: String,

    /// Dispatch order within the ready set
    #[arg(long, value_enum, default_value = "in_order")]
    pub schedule: ScheduleArg,

    /// Graph reduction before scheduling
    #[arg(long, value_enum, default_value = "standard")]
    pub analysis: AnalysisArg,

    /// Refresh the ready set on every tick instead of only when it runs low
    #[arg(long)]
    pub thorough: bool,

    /// Seed for the random schedule order
    #[arg(long, value_name = "SEED", default_value_t = 0)]
    pub seed: u64,

    /// Emit the report as JSON
    #[arg(long)]
    pub json: bool,

    /// Print the operation dispatch timeline
    #[arg(long)]
    pub timeline: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
#[value(rename_all = "snake_case")]
pub enum ScheduleArg {
    InOrder,
    Random,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum AnalysisArg {
    Standard,
    Instruction,
    Memory,
}

pub fn run(args: PerfArgs) -> Result<()> {
    let instructions = load_program(&args.program)?;
    let Some(hardware) = HardwareModel::by_name(&args.model) else {
        bail!(
            "unknown hardware model `{}` (expected one of: {})",
            args.model,
            HardwareModel::PROFILE_NAMES.join(", ")
        );
    };

    let modeler = PerformanceModeler::from_instructions(instructions);
    let config = ScheduleConfig {
        schedule_mode: match args.schedule {
            ScheduleArg::InOrder => ScheduleMode::InOrder,
            ScheduleArg::Random => ScheduleMode::Random,
        },
        analysis_type: match args.analysis {
            AnalysisArg::Standard => AnalysisType::Standard,
            AnalysisArg::Instruction => AnalysisType::Instruction,
            AnalysisArg::Memory => AnalysisType::Memory,
        },
        quick_schedule: !args.thorough,
        shuffle_seed: args.seed,
    };

    let mut report = modeler.generate_report(config, &hardware);
    modeler.add_graph_analysis(&mut report);

    let mut stdout = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut stdout, &report).context("failed to encode report")?;
        writeln!(stdout)?;
    } else {
        writeln!(
            stdout,
            "total_instruction_count: {}",
            modeler.instructions().len()
        )?;
        for (opcode, count) in modeler.instance_counts() {
            writeln!(stdout, "op_{opcode}_instances: {count}")?;
        }
        writeln!(stdout)?;
        report.print(&mut stdout)?;
    }
    if args.timeline {
        report.print_timeline(&mut stdout)?;
    }
    stdout.flush()?;
    Ok(())
}
