use std::fmt;
use std::str::FromStr;

use crate::operand::{Operand, WParam};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Muli,
    Mac,
    Maci,
    Ntt,
    Intt,
    Copy,
}

impl Opcode {
    pub const ALL: [Opcode; 9] = [
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Muli,
        Opcode::Mac,
        Opcode::Maci,
        Opcode::Ntt,
        Opcode::Intt,
        Opcode::Copy,
    ];

    pub fn base_name(self) -> &'static str {
        match self {
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Mul => "mul",
            Opcode::Muli => "muli",
            Opcode::Mac => "mac",
            Opcode::Maci => "maci",
            Opcode::Ntt => "ntt",
            Opcode::Intt => "intt",
            Opcode::Copy => "copy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Opcode::ALL.into_iter().find(|op| op.base_name() == name)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_name())
    }
}

impl FromStr for Opcode {
    type Err = UnknownOpcodeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Opcode::from_name(name).ok_or_else(|| UnknownOpcodeError {
            name: name.to_string(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownOpcodeError {
    pub name: String,
}

impl fmt::Display for UnknownOpcodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown opcode `{}`", self.name)
    }
}

impl std::error::Error for UnknownOpcodeError {}

/// One slot of an instruction's textual schema. The descriptor is the single
/// source of truth for both the parser and the printer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamSlot {
    PolyModLog2,
    OpName,
    Input,
    Output,
    InputOutput,
    Immediate,
    Residual,
    WPacked,
    Galois,
    GroupId,
    Stage,
    Block,
}

/// Ordered parameter schema for `opcode`, one entry per CSV field.
pub fn descriptor(opcode: Opcode) -> &'static [ParamSlot] {
    use ParamSlot::*;
    match opcode {
        Opcode::Add | Opcode::Sub | Opcode::Mul => {
            &[PolyModLog2, OpName, Output, Input, Input, Residual]
        }
        Opcode::Muli => &[PolyModLog2, OpName, Output, Input, Immediate, Residual],
        Opcode::Mac => &[PolyModLog2, OpName, InputOutput, Input, Input, Residual],
        Opcode::Maci => &[PolyModLog2, OpName, InputOutput, Input, Immediate, Residual],
        Opcode::Copy => &[PolyModLog2, OpName, Output, Input],
        Opcode::Ntt => &[
            PolyModLog2,
            OpName,
            Output,
            Output,
            Input,
            Input,
            WPacked,
            Residual,
        ],
        Opcode::Intt => &[
            PolyModLog2,
            OpName,
            Output,
            Output,
            Input,
            Input,
            WPacked,
            Residual,
            Galois,
        ],
    }
}

/// A decoded P-ISA instruction: the opcode tag plus the shared header every
/// variant carries. `w_param` and `galois_element` are only meaningful to the
/// butterfly opcodes; `group_id`/`stage`/`block` exist for descriptor slots
/// no shipped opcode uses but the schema admits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub pmd_log2: u32,
    pub inputs: Vec<Operand>,
    pub outputs: Vec<Operand>,
    pub residual: usize,
    pub w_param: Option<WParam>,
    pub galois_element: u64,
    pub group_id: Option<u32>,
    pub stage: Option<u32>,
    pub block: Option<u32>,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            pmd_log2: 0,
            inputs: Vec::new(),
            outputs: Vec::new(),
            residual: 0,
            w_param: None,
            galois_element: 1,
            group_id: None,
            stage: None,
            block: None,
        }
    }

    pub fn add(pmd: u32, dst: Operand, a: Operand, b: Operand, residual: usize) -> Self {
        Self::binary(Opcode::Add, pmd, dst, a, b, residual)
    }

    pub fn sub(pmd: u32, dst: Operand, a: Operand, b: Operand, residual: usize) -> Self {
        Self::binary(Opcode::Sub, pmd, dst, a, b, residual)
    }

    pub fn mul(pmd: u32, dst: Operand, a: Operand, b: Operand, residual: usize) -> Self {
        Self::binary(Opcode::Mul, pmd, dst, a, b, residual)
    }

    pub fn muli(pmd: u32, dst: Operand, a: Operand, imm: Operand, residual: usize) -> Self {
        let imm = Operand::immediate(imm.location().to_string());
        Self::binary(Opcode::Muli, pmd, dst, a, imm, residual)
    }

    /// `acc` is both read and written (the descriptor's INPUT_OUTPUT slot).
    pub fn mac(pmd: u32, acc: Operand, a: Operand, b: Operand, residual: usize) -> Self {
        let mut instr = Self::new(Opcode::Mac);
        instr.pmd_log2 = pmd;
        instr.outputs.push(acc.clone());
        instr.inputs.push(acc);
        instr.inputs.push(a);
        instr.inputs.push(b);
        instr.residual = residual;
        instr
    }

    pub fn maci(pmd: u32, acc: Operand, a: Operand, imm: Operand, residual: usize) -> Self {
        let mut instr = Self::mac(pmd, acc, a, Operand::immediate(imm.location().to_string()), residual);
        instr.opcode = Opcode::Maci;
        instr
    }

    pub fn copy(pmd: u32, dst: Operand, src: Operand) -> Self {
        let mut instr = Self::new(Opcode::Copy);
        instr.pmd_log2 = pmd;
        instr.outputs.push(dst);
        instr.inputs.push(src);
        instr
    }

    pub fn ntt(
        pmd: u32,
        dst0: Operand,
        dst1: Operand,
        src0: Operand,
        src1: Operand,
        w: WParam,
        residual: usize,
    ) -> Self {
        let mut instr = Self::new(Opcode::Ntt);
        instr.pmd_log2 = pmd;
        instr.outputs.push(dst0);
        instr.outputs.push(dst1);
        instr.inputs.push(src0);
        instr.inputs.push(src1);
        instr.w_param = Some(w);
        instr.residual = residual;
        instr
    }

    #[allow(clippy::too_many_arguments)]
    pub fn intt(
        pmd: u32,
        dst0: Operand,
        dst1: Operand,
        src0: Operand,
        src1: Operand,
        w: WParam,
        residual: usize,
        galois_element: u64,
    ) -> Self {
        let mut instr = Self::ntt(pmd, dst0, dst1, src0, src1, w, residual);
        instr.opcode = Opcode::Intt;
        instr.galois_element = galois_element;
        instr
    }

    fn binary(
        opcode: Opcode,
        pmd: u32,
        dst: Operand,
        a: Operand,
        b: Operand,
        residual: usize,
    ) -> Self {
        let mut instr = Self::new(opcode);
        instr.pmd_log2 = pmd;
        instr.outputs.push(dst);
        instr.inputs.push(a);
        instr.inputs.push(b);
        instr.residual = residual;
        instr
    }

    pub fn descriptor(&self) -> &'static [ParamSlot] {
        descriptor(self.opcode)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut inputs = 0;
        let mut outputs = 0;
        for (position, slot) in self.descriptor().iter().enumerate() {
            if position != 0 {
                f.write_str(", ")?;
            }
            match slot {
                ParamSlot::PolyModLog2 => write!(f, "{}", self.pmd_log2)?,
                ParamSlot::OpName => f.write_str(self.opcode.base_name())?,
                ParamSlot::Input => {
                    write!(f, "{}", self.inputs[inputs])?;
                    inputs += 1;
                }
                ParamSlot::Output => {
                    write!(f, "{}", self.outputs[outputs])?;
                    outputs += 1;
                }
                ParamSlot::InputOutput => {
                    write!(f, "{}", self.outputs[outputs])?;
                    inputs += 1;
                    outputs += 1;
                }
                ParamSlot::Immediate => {
                    write!(f, "{}", self.inputs[inputs])?;
                    inputs += 1;
                }
                ParamSlot::Residual => write!(f, "{}", self.residual)?,
                ParamSlot::WPacked => write!(f, "{}", self.w_param.unwrap_or_default())?,
                ParamSlot::Galois => write!(f, "{}", self.galois_element)?,
                ParamSlot::GroupId => write!(f, "{}", self.group_id.unwrap_or(0))?,
                ParamSlot::Stage => write!(f, "{}", self.stage.unwrap_or(0))?,
                ParamSlot::Block => write!(f, "{}", self.block.unwrap_or(0))?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_names_round_trip() {
        for opcode in Opcode::ALL {
            assert_eq!(Opcode::from_name(opcode.base_name()), Some(opcode));
        }
        assert_eq!(Opcode::from_name("rot"), None);
    }

    #[test]
    fn descriptors_start_with_pmd_and_name() {
        for opcode in Opcode::ALL {
            let desc = descriptor(opcode);
            assert_eq!(desc[0], ParamSlot::PolyModLog2);
            assert_eq!(desc[1], ParamSlot::OpName);
        }
    }

    #[test]
    fn mac_reads_its_own_output() {
        let instr = Instruction::mac(
            13,
            Operand::register("acc"),
            Operand::register("a"),
            Operand::register("b"),
            0,
        );
        assert_eq!(instr.outputs.len(), 1);
        assert_eq!(instr.inputs.len(), 3);
        assert_eq!(instr.inputs[0].location(), "acc");
    }

    #[test]
    fn display_follows_descriptor_order() {
        let instr = Instruction::ntt(
            13,
            Operand::register("d0"),
            Operand::register("d1"),
            Operand::register("s0"),
            Operand::register("s1"),
            WParam::new(2, 5, 3),
            2,
        );
        assert_eq!(instr.to_string(), "13, ntt, d0, d1, s0, s1, w_2_5_3, 2");

        let instr = Instruction::muli(
            13,
            Operand::register("d"),
            Operand::register("a"),
            Operand::register("i0"),
            2,
        );
        assert_eq!(instr.to_string(), "13, muli, d, a, i0, 2");
    }
}
