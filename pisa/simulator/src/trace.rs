use std::io::{self, Write};

use pisa_isa::Instruction;

use crate::multiregister::MultiRegister;

/// Snapshot of one instruction's operands taken around execution; collected
/// when tracing is enabled and replayed on failure.
#[derive(Clone, Debug)]
pub struct InstructionTrace {
    pub instruction: Instruction,
    pub inputs: Vec<(String, MultiRegister)>,
    pub outputs: Vec<(String, MultiRegister)>,
}

impl InstructionTrace {
    pub fn new(instruction: Instruction) -> Self {
        Self {
            instruction,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Prints the operand snapshots, at most `max_lanes` values per register.
    pub fn write_summary(&self, out: &mut impl Write, max_lanes: usize) -> io::Result<()> {
        writeln!(out, "instruction: {}", self.instruction)?;
        writeln!(out, "inputs:")?;
        for (name, register) in &self.inputs {
            write_register(out, name, register, max_lanes)?;
        }
        writeln!(out, "outputs:")?;
        for (name, register) in &self.outputs {
            write_register(out, name, register, max_lanes)?;
        }
        writeln!(out)
    }
}

fn write_register(
    out: &mut impl Write,
    name: &str,
    register: &MultiRegister,
    max_lanes: usize,
) -> io::Result<()> {
    write!(out, "  {name}:")?;
    for lane in register.lanes().iter().take(max_lanes) {
        write!(out, " {lane}")?;
    }
    if register.len() > max_lanes {
        write!(out, " …")?;
    }
    writeln!(out)
}
