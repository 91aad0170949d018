use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args as ClapArgs;
use pisa_perf::{PerformanceModeler, PerformanceReport};
use serde::Serialize;

use crate::exec::load_program;

#[derive(ClapArgs, Debug, Clone)]
pub struct StatsArgs {
    /// Path to the P-ISA program
    #[arg(value_name = "PROGRAM")]
    pub program: PathBuf,

    /// Emit statistics in JSON format
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ProgramStats {
    instruction_count: usize,
    opcode_histogram: BTreeMap<String, u64>,
    total_inputs: u64,
    total_outputs: u64,
    graph_depth: u64,
    graph_min_width: u64,
    graph_max_width: u64,
    graph_average_width: u64,
}

pub fn run(args: StatsArgs) -> Result<()> {
    let instructions = load_program(&args.program)?;
    let modeler = PerformanceModeler::from_instructions(instructions);

    let mut report = PerformanceReport::default();
    modeler.add_graph_analysis(&mut report);

    let stats = ProgramStats {
        instruction_count: modeler.instructions().len(),
        opcode_histogram: modeler
            .instance_counts()
            .iter()
            .map(|(opcode, count)| (opcode.to_string(), *count))
            .collect(),
        total_inputs: report.total_inputs,
        total_outputs: report.total_outputs,
        graph_depth: report.graph_depth,
        graph_min_width: report.graph_min_width,
        graph_max_width: report.graph_max_width,
        graph_average_width: report.graph_average_width,
    };

    let mut stdout = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut stdout, &stats)?;
        writeln!(stdout)?;
    } else {
        writeln!(stdout, "instructions: {}", stats.instruction_count)?;
        for (opcode, count) in &stats.opcode_histogram {
            writeln!(stdout, "  {opcode}: {count}")?;
        }
        writeln!(stdout, "graph_inputs: {}", stats.total_inputs)?;
        writeln!(stdout, "graph_outputs: {}", stats.total_outputs)?;
        writeln!(stdout, "graph_depth: {}", stats.graph_depth)?;
        writeln!(
            stdout,
            "graph_width: min {} avg {} max {}",
            stats.graph_min_width, stats.graph_average_width, stats.graph_max_width
        )?;
    }
    stdout.flush()?;
    Ok(())
}
