use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, ValueEnum};
use pisa_graph::{export_dot, DependencyGraph, DotExportOptions};

use crate::exec::load_program;

#[derive(ClapArgs, Debug, Clone)]
pub struct DotArgs {
    /// Path to the P-ISA program
    #[arg(value_name = "PROGRAM")]
    pub program: PathBuf,

    /// Output path for the GraphViz dot file
    #[arg(short = 'o', long = "output", value_name = "PATH")]
    pub output: PathBuf,

    /// Which graph to export
    #[arg(long, value_enum, default_value = "combined")]
    pub view: GraphView,

    /// Include node identifiers in the dot labels
    #[arg(long)]
    pub show_ids: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum GraphView {
    Combined,
    Instruction,
    Data,
}

pub fn run(args: DotArgs) -> Result<()> {
    let instructions = load_program(&args.program)?;
    let graph = DependencyGraph::from_instructions(&instructions);
    let graph = match args.view {
        GraphView::Combined => graph,
        GraphView::Instruction => graph.instruction_graph(),
        GraphView::Data => graph.data_graph(),
    };

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create parent directory `{}`", parent.display())
            })?;
        }
    }

    let file = File::create(&args.output)
        .with_context(|| format!("failed to create `{}`", args.output.display()))?;
    let mut out = BufWriter::new(file);
    let options = DotExportOptions {
        show_ids: args.show_ids,
    };
    export_dot(&graph, &mut out, options)
        .with_context(|| format!("failed to export dot to `{}`", args.output.display()))?;
    out.flush()?;

    println!(
        "wrote {} nodes to {}",
        graph.node_count(),
        args.output.display()
    );
    Ok(())
}
