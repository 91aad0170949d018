use std::io::{BufRead, Write};

use pisa_graph::DependencyGraph;
use pisa_isa::Instruction;
use thiserror::Error;

use crate::memory::DEFAULT_REGISTER_WIDTH;
use crate::modarith::Lane;
use crate::model::{FunctionalModel, MemoryImageError, ModelError, TwiddleMap, TwiddleTable};
use crate::multiregister::MultiRegister;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Image(#[from] MemoryImageError),
    #[error("flat vector for `{name}` has {len} values, not a multiple of register width {width}")]
    UnevenSplit {
        name: String,
        len: usize,
        width: usize,
    },
    #[error("immediate `{name}` supplies no value")]
    EmptyImmediate { name: String },
}

/// Front door for hosts: owns a functional model, maps flat polynomial
/// vectors onto multi-register slices and sequences instruction execution.
#[derive(Clone, Debug, Default)]
pub struct ProgramRuntime {
    model: FunctionalModel,
    debug_mode: bool,
}

impl ProgramRuntime {
    pub fn new(register_width: usize) -> Self {
        Self {
            model: FunctionalModel::new(register_width),
            debug_mode: false,
        }
    }

    pub fn with_default_width() -> Self {
        Self::new(DEFAULT_REGISTER_WIDTH)
    }

    pub fn model(&self) -> &FunctionalModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut FunctionalModel {
        &mut self.model
    }

    pub fn debug_mode(&self) -> bool {
        self.debug_mode
    }

    /// Debug mode snapshots every instruction's operands during execution so
    /// a failure can be replayed.
    pub fn set_debug_mode(&mut self, enabled: bool) {
        self.debug_mode = enabled;
    }

    pub fn set_modulus_chain(&mut self, chain: Vec<Lane>) {
        self.model.set_modulus_chain(chain);
    }

    pub fn modulus_chain(&self) -> &[Lane] {
        self.model.modulus_chain()
    }

    pub fn set_ntt_twiddle_factors(&mut self, table: TwiddleTable) {
        self.model.set_ntt_twiddles(table);
    }

    pub fn set_intt_twiddle_factors(&mut self, map: TwiddleMap) {
        self.model.set_intt_twiddles(map);
    }

    /// Slices a flat polynomial vector into width-`W` chunks stored as
    /// `<name>_0, <name>_1, …`. The length must be a multiple of `W`.
    pub fn set_param_memory(&mut self, name: &str, values: &[Lane]) -> Result<(), RuntimeError> {
        let width = self.model.register_width();
        if width == 0 || values.len() % width != 0 {
            return Err(RuntimeError::UnevenSplit {
                name: name.to_string(),
                len: values.len(),
                width,
            });
        }
        for (slice, chunk) in values.chunks(width).enumerate() {
            let address = format!("{name}_{slice}");
            self.model
                .memory_mut()
                .write(&address, MultiRegister::from_lanes(chunk.to_vec()));
        }
        Ok(())
    }

    /// Stores a one-lane immediate register.
    pub fn set_immediate(&mut self, name: &str, values: &[Lane]) -> Result<(), RuntimeError> {
        let value = *values.first().ok_or_else(|| RuntimeError::EmptyImmediate {
            name: name.to_string(),
        })?;
        self.model
            .memory_mut()
            .write(name, MultiRegister::from_lanes(vec![value]));
        Ok(())
    }

    /// Reassembles the flat vector for `root` from every resident register
    /// named `root_<n>`, ordered by the numeric suffix.
    pub fn get_param_memory(&self, root: &str) -> Vec<Lane> {
        let mut slices: Vec<(usize, &MultiRegister)> = self
            .model
            .memory()
            .registers()
            .filter_map(|(name, register)| {
                let suffix = name.strip_prefix(root)?.strip_prefix('_')?;
                if suffix.contains('_') {
                    return None;
                }
                Some((suffix.parse().ok()?, register))
            })
            .collect();
        slices.sort_by_key(|&(index, _)| index);
        slices
            .into_iter()
            .flat_map(|(_, register)| register.lanes().iter().copied())
            .collect()
    }

    /// Executes the stream in source order.
    pub fn execute_program(&mut self, instructions: &[Instruction]) -> Result<(), RuntimeError> {
        if self.debug_mode {
            self.model.enable_trace();
        }
        let result = self.run_sequential(instructions);
        if self.debug_mode {
            self.model.stop_trace();
        }
        result
    }

    fn run_sequential(&mut self, instructions: &[Instruction]) -> Result<(), RuntimeError> {
        for instruction in instructions {
            self.model.decode(instruction)?;
        }
        Ok(())
    }

    /// Executes by dependency layers: instructions within a layer are
    /// mutually independent, layers run in order. The final memory matches
    /// the sequential path for any valid program.
    pub fn execute_layered(&mut self, instructions: &[Instruction]) -> Result<(), RuntimeError> {
        let graph = DependencyGraph::from_instructions(instructions).instruction_graph();
        for layer in graph.input_layers() {
            for id in layer {
                let index = graph
                    .node(id)
                    .expect("peel yields live nodes")
                    .instruction()
                    .expect("instruction graph holds only operations");
                self.model.decode(&instructions[index])?;
            }
        }
        Ok(())
    }

    pub fn dump_device_memory(&self, out: &mut impl Write) -> Result<(), RuntimeError> {
        self.model.dump_memory(out)?;
        Ok(())
    }

    pub fn dump_device_registers(
        &self,
        out: &mut impl Write,
        addresses: &[String],
    ) -> Result<(), RuntimeError> {
        self.model.dump_registers(out, addresses)?;
        Ok(())
    }

    pub fn set_device_memory(&mut self, reader: impl BufRead) -> Result<(), RuntimeError> {
        self.model.load_memory(reader)?;
        Ok(())
    }
}
