use clap::{Parser, Subcommand};

pub mod dot;
pub mod exec;
pub mod perf;
pub mod stats;
pub mod validate;

pub use dot::DotArgs;
pub use exec::ExecArgs;
pub use perf::PerfArgs;
pub use stats::StatsArgs;
pub use validate::ValidateArgs;

/// Exit status for a failed output validation; parse and runtime errors
/// exit 1 through the error path.
pub const VALIDATION_FAILURE: i32 = 2;

pub fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Exec(args) => exec::run(args).map(|()| 0),
        Commands::Validate(args) => validate::run(args),
        Commands::Perf(args) => perf::run(args).map(|()| 0),
        Commands::Stats(args) => stats::run(args).map(|()| 0),
        Commands::Dot(args) => dot::run(args).map(|()| 0),
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "pisa",
    bin_name = "pisa",
    version,
    about = "P-ISA functional simulator and performance analyzer",
    long_about = None,
    arg_required_else_help = true,
    disable_help_subcommand = true,
    subcommand_required = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Execute a P-ISA program against a device memory image")]
    Exec(ExecArgs),
    #[command(about = "Execute a program and compare registers to expected values")]
    Validate(ValidateArgs),
    #[command(about = "Estimate cycle counts with a hardware model")]
    Perf(PerfArgs),
    #[command(about = "Report instruction and dependency-graph statistics")]
    Stats(StatsArgs),
    #[command(about = "Export the dependency graph as a GraphViz dot file")]
    Dot(DotArgs),
}
