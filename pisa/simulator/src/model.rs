use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use pisa_isa::{Instruction, Opcode};
use rayon::prelude::*;
use thiserror::Error;

use crate::memory::{RegisterFile, UnallocatedRead, DEFAULT_REGISTER_WIDTH};
use crate::modarith::{mod_add, mod_mul, negate, reverse_bits_width, Lane};
use crate::multiregister::{MultiRegister, SizeMismatch};
use crate::trace::InstructionTrace;

/// Forward twiddle factors, indexed `[residual][k]`.
pub type TwiddleTable = Vec<Vec<Lane>>;

/// Inverse twiddle factors keyed by galois element, then `[residual][k]`.
pub type TwiddleMap = BTreeMap<String, TwiddleTable>;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("`{opcode}` failed: {source}")]
    Decode {
        opcode: Opcode,
        #[source]
        source: Box<ModelError>,
    },
    #[error("residual {residual} outside modulus chain of length {len}")]
    MissingResidual { residual: usize, len: usize },
    #[error("missing ntt twiddle factors for residual {residual} (index {index})")]
    MissingNttTwiddle { residual: usize, index: usize },
    #[error("missing intt twiddle factors for galois element {galois}, residual {residual} (index {index})")]
    MissingInttTwiddle {
        galois: String,
        residual: usize,
        index: usize,
    },
    #[error("`{opcode}` carries no w-parameter")]
    MissingWParam { opcode: Opcode },
    #[error("`{opcode}` is missing operand {index}")]
    MissingOperand { opcode: Opcode, index: usize },
    #[error("butterfly stage {stage} out of range for pmd {pmd}")]
    StageOutOfRange { stage: u32, pmd: u32 },
    #[error("butterfly block {block} out of range ({limit} blocks)")]
    BlockOutOfRange { block: usize, limit: usize },
    #[error("immediate register `{name}` holds no value")]
    EmptyImmediate { name: String },
    #[error(transparent)]
    Unallocated(#[from] UnallocatedRead),
    #[error(transparent)]
    SizeMismatch(#[from] SizeMismatch),
}

#[derive(Debug, Error)]
pub enum MemoryImageError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Unallocated(#[from] UnallocatedRead),
    #[error("memory image line {line}: bad record `{text}`")]
    BadRecord { line: usize, text: String },
    #[error("memory image line {line}: bad value `{field}`")]
    BadValue { line: usize, field: String },
}

/// Decode-and-execute engine: owns the register file, the modulus chain and
/// both twiddle tables, plus the lazily built butterfly lookup tables.
#[derive(Clone, Debug)]
pub struct FunctionalModel {
    memory: RegisterFile,
    modulus_chain: Vec<Lane>,
    twiddle_ntt: TwiddleTable,
    twiddle_intt: TwiddleMap,
    bit_reverse: Vec<u32>,
    start_table: Vec<usize>,
    montgomery_enabled: bool,
    trace_enabled: bool,
    traces: Vec<InstructionTrace>,
}

impl Default for FunctionalModel {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTER_WIDTH)
    }
}

impl FunctionalModel {
    pub fn new(register_width: usize) -> Self {
        Self {
            memory: RegisterFile::new(register_width),
            modulus_chain: Vec::new(),
            twiddle_ntt: Vec::new(),
            twiddle_intt: TwiddleMap::new(),
            bit_reverse: Vec::new(),
            start_table: Vec::new(),
            montgomery_enabled: true,
            trace_enabled: false,
            traces: Vec::new(),
        }
    }

    pub fn register_width(&self) -> usize {
        self.memory.width()
    }

    pub fn memory(&self) -> &RegisterFile {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut RegisterFile {
        &mut self.memory
    }

    pub fn modulus_chain(&self) -> &[Lane] {
        &self.modulus_chain
    }

    pub fn set_modulus_chain(&mut self, chain: Vec<Lane>) {
        self.modulus_chain = chain;
    }

    pub fn ntt_twiddles(&self) -> &TwiddleTable {
        &self.twiddle_ntt
    }

    pub fn set_ntt_twiddles(&mut self, table: TwiddleTable) {
        self.twiddle_ntt = table;
    }

    pub fn intt_twiddles(&self) -> &TwiddleMap {
        &self.twiddle_intt
    }

    /// Installs the inverse tables; the `"default"` key is stored as `"1"`.
    pub fn set_intt_twiddles(&mut self, map: TwiddleMap) {
        self.twiddle_intt = map
            .into_iter()
            .map(|(key, table)| (alias_galois_key(key), table))
            .collect();
    }

    pub fn montgomery_enabled(&self) -> bool {
        self.montgomery_enabled
    }

    pub fn set_montgomery_enabled(&mut self, enabled: bool) {
        self.montgomery_enabled = enabled;
    }

    pub fn enable_trace(&mut self) {
        self.traces.clear();
        self.trace_enabled = true;
    }

    pub fn stop_trace(&mut self) {
        self.trace_enabled = false;
    }

    pub fn traces(&self) -> &[InstructionTrace] {
        &self.traces
    }

    /// Decodes and executes one instruction against the register file,
    /// snapshotting operands when tracing is enabled. Failures are rethrown
    /// tagged with the opcode.
    pub fn decode(&mut self, instr: &Instruction) -> Result<(), ModelError> {
        if self.trace_enabled {
            let mut record = InstructionTrace::new(instr.clone());
            for operand in &instr.inputs {
                let name = operand.location().to_string();
                // Snapshot without allocating, so tracing cannot mask an
                // unallocated-read failure.
                let snapshot = self.memory.get(&name).cloned().unwrap_or_default();
                record.inputs.push((name, snapshot));
            }
            self.traces.push(record);
        }

        self.execute(instr).map_err(|source| ModelError::Decode {
            opcode: instr.opcode,
            source: Box::new(source),
        })?;

        if self.trace_enabled {
            let mut outputs = Vec::new();
            for operand in &instr.outputs {
                let name = operand.location().to_string();
                let snapshot = self.memory.get(&name).cloned().unwrap_or_default();
                outputs.push((name, snapshot));
            }
            if let Some(record) = self.traces.last_mut() {
                record.outputs = outputs;
            }
        }
        Ok(())
    }

    fn execute(&mut self, instr: &Instruction) -> Result<(), ModelError> {
        match instr.opcode {
            Opcode::Add => self.exec_binary(instr, |mont, a, b, q| mod_add(mont, a, b, q)),
            Opcode::Sub => {
                self.exec_binary(instr, |mont, a, b, q| mod_add(mont, a, negate(b, q), q))
            }
            Opcode::Mul => self.exec_binary(instr, mod_mul),
            Opcode::Muli => self.exec_muli(instr),
            Opcode::Mac => self.exec_mac(instr),
            Opcode::Maci => self.exec_maci(instr),
            Opcode::Copy => self.exec_copy(instr),
            Opcode::Ntt => self.exec_ntt(instr),
            Opcode::Intt => self.exec_intt(instr),
        }
    }

    fn exec_binary(
        &mut self,
        instr: &Instruction,
        op: impl Fn(bool, Lane, Lane, Lane) -> Lane + Sync,
    ) -> Result<(), ModelError> {
        let q = self.modulus(instr.residual)?;
        let a = self.fetch(self.input_location(instr, 0)?.to_string());
        let b = self.fetch(self.input_location(instr, 1)?.to_string());
        let mont = self.montgomery_enabled;
        let lanes = a
            .lanes()
            .par_iter()
            .zip(b.lanes().par_iter())
            .map(|(&x, &y)| op(mont, x, y, q))
            .collect();
        let dst = self.output_location(instr, 0)?.to_string();
        self.memory.write(&dst, MultiRegister::from_lanes(lanes));
        Ok(())
    }

    fn exec_muli(&mut self, instr: &Instruction) -> Result<(), ModelError> {
        let q = self.modulus(instr.residual)?;
        let a = self.fetch(self.input_location(instr, 0)?.to_string());
        let scalar = self.immediate_value(self.input_location(instr, 1)?.to_string())?;
        let mont = self.montgomery_enabled;
        let lanes = a
            .lanes()
            .par_iter()
            .map(|&x| mod_mul(mont, x, scalar, q))
            .collect();
        let dst = self.output_location(instr, 0)?.to_string();
        self.memory.write(&dst, MultiRegister::from_lanes(lanes));
        Ok(())
    }

    fn exec_mac(&mut self, instr: &Instruction) -> Result<(), ModelError> {
        let q = self.modulus(instr.residual)?;
        let acc = self.fetch(self.input_location(instr, 0)?.to_string());
        let a = self.fetch(self.input_location(instr, 1)?.to_string());
        let b = self.fetch(self.input_location(instr, 2)?.to_string());
        let mont = self.montgomery_enabled;
        let lanes = acc
            .lanes()
            .par_iter()
            .zip(a.lanes().par_iter())
            .zip(b.lanes().par_iter())
            .map(|((&s, &x), &y)| mod_add(mont, s, mod_mul(mont, x, y, q), q))
            .collect();
        let dst = self.output_location(instr, 0)?.to_string();
        self.memory.write(&dst, MultiRegister::from_lanes(lanes));
        Ok(())
    }

    fn exec_maci(&mut self, instr: &Instruction) -> Result<(), ModelError> {
        let q = self.modulus(instr.residual)?;
        let acc = self.fetch(self.input_location(instr, 0)?.to_string());
        let a = self.fetch(self.input_location(instr, 1)?.to_string());
        let scalar = self.immediate_value(self.input_location(instr, 2)?.to_string())?;
        let mont = self.montgomery_enabled;
        let lanes = acc
            .lanes()
            .par_iter()
            .zip(a.lanes().par_iter())
            .map(|(&s, &x)| mod_add(mont, s, mod_mul(mont, x, scalar, q), q))
            .collect();
        let dst = self.output_location(instr, 0)?.to_string();
        self.memory.write(&dst, MultiRegister::from_lanes(lanes));
        Ok(())
    }

    fn exec_copy(&mut self, instr: &Instruction) -> Result<(), ModelError> {
        let src = self.memory.copy(self.input_location(instr, 0)?)?;
        let dst = self.output_location(instr, 0)?.to_string();
        self.memory.write(&dst, src);
        Ok(())
    }

    fn exec_ntt(&mut self, instr: &Instruction) -> Result<(), ModelError> {
        let w = instr.w_param.ok_or(ModelError::MissingWParam {
            opcode: instr.opcode,
        })?;
        let geometry = self.butterfly_geometry(instr, w.stage)?;
        let q = self.modulus(w.residual)?;
        let mont = self.montgomery_enabled;

        let src0 = self.fetch(self.input_location(instr, 0)?.to_string());
        let src1 = self.fetch(self.input_location(instr, 1)?.to_string());
        let dst0_name = self.output_location(instr, 0)?.to_string();
        let dst1_name = self.output_location(instr, 1)?.to_string();
        let mut dst0 = self.fetch(dst0_name.clone());
        let mut dst1 = self.fetch(dst1_name.clone());

        self.ensure_tables(&geometry);
        let start = *self
            .start_table
            .get(w.block)
            .ok_or(ModelError::BlockOutOfRange {
                block: w.block,
                limit: self.start_table.len(),
            })?;

        let BfGeometry {
            half_n,
            half_block,
            block_size,
            increment,
            sp,
            ..
        } = geometry;
        let stage = w.stage as usize;

        let mut i = start;
        while i < half_n {
            let j = self.bit_reverse[i] as usize;
            let in0 = (2 * j) % block_size;
            let in1 = (2 * j + 1) % block_size;
            let out0 = j % half_block;
            let out1 = ((j + half_n) % half_block) + half_block;
            let k = (j >> sp) << sp;

            let x0 = read_split(&src0, &src1, in0, half_block);
            let x1 = read_split(&src0, &src1, in1, half_block);
            let t1 = if stage == 0 {
                x1
            } else {
                let tw = self
                    .twiddle_ntt
                    .get(w.residual)
                    .and_then(|row| row.get(k))
                    .copied()
                    .ok_or(ModelError::MissingNttTwiddle {
                        residual: w.residual,
                        index: k,
                    })?;
                mod_mul(mont, x1, tw, q)
            };
            let t2 = q.wrapping_sub(t1);
            write_split(&mut dst0, &mut dst1, out0, half_block, mod_add(mont, x0, t1, q));
            write_split(&mut dst0, &mut dst1, out1, half_block, mod_add(mont, x0, t2, q));
            i += increment;
        }

        self.memory.write(&dst0_name, dst0);
        self.memory.write(&dst1_name, dst1);
        Ok(())
    }

    fn exec_intt(&mut self, instr: &Instruction) -> Result<(), ModelError> {
        let w = instr.w_param.ok_or(ModelError::MissingWParam {
            opcode: instr.opcode,
        })?;
        let geometry = self.butterfly_geometry(instr, w.stage)?;
        let q = self.modulus(w.residual)?;
        let mont = self.montgomery_enabled;
        let galois = instr.galois_element.to_string();

        let src0 = self.fetch(self.input_location(instr, 0)?.to_string());
        let src1 = self.fetch(self.input_location(instr, 1)?.to_string());
        let dst0_name = self.output_location(instr, 0)?.to_string();
        let dst1_name = self.output_location(instr, 1)?.to_string();
        let mut dst0 = self.fetch(dst0_name.clone());
        let mut dst1 = self.fetch(dst1_name.clone());

        self.ensure_tables(&geometry);

        let BfGeometry {
            half_n,
            half_block,
            block_size,
            increment,
            sp,
            ..
        } = geometry;

        let slice_size = half_n / increment;
        let start = w.block * slice_size;
        let end = start + slice_size;
        if end > half_n {
            return Err(ModelError::BlockOutOfRange {
                block: w.block,
                limit: increment,
            });
        }

        for i in start..end {
            let j = self.bit_reverse[i] as usize;
            let in0 = i % half_block;
            let in1 = ((i + half_n) % half_block) + half_block;
            let out0 = (2 * i) % block_size;
            let out1 = (2 * i + 1) % block_size;
            let k = (j >> sp) << sp;

            let x0 = read_split(&src0, &src1, in0, half_block);
            let x1 = read_split(&src0, &src1, in1, half_block);
            let tw = self
                .twiddle_intt
                .get(&galois)
                .and_then(|table| table.get(w.residual))
                .and_then(|row| row.get(k))
                .copied()
                .ok_or_else(|| ModelError::MissingInttTwiddle {
                    galois: galois.clone(),
                    residual: w.residual,
                    index: k,
                })?;
            let t1 = mod_mul(mont, x1, tw, q);
            let t2 = q.wrapping_sub(t1);
            write_split(&mut dst0, &mut dst1, out0, half_block, mod_add(mont, x0, t1, q));
            write_split(&mut dst0, &mut dst1, out1, half_block, mod_add(mont, x0, t2, q));
        }

        self.memory.write(&dst0_name, dst0);
        self.memory.write(&dst1_name, dst1);
        Ok(())
    }

    fn butterfly_geometry(&self, instr: &Instruction, stage: u32) -> Result<BfGeometry, ModelError> {
        let ln = instr.pmd_log2 as usize;
        if stage as usize >= ln {
            return Err(ModelError::StageOutOfRange {
                stage,
                pmd: instr.pmd_log2,
            });
        }
        let n = 1usize << ln;
        let half_block = self.memory.width();
        let block_size = half_block * 2;
        // log2(2W) generalizes the hard-wired 14 of the 8192-lane machine.
        let block_count = ln.saturating_sub(block_size.trailing_zeros() as usize);
        Ok(BfGeometry {
            n,
            ln: ln as u32,
            half_n: n >> 1,
            half_block,
            block_size,
            increment: 1 << block_count,
            sp: ln - 1 - stage as usize,
        })
    }

    fn ensure_tables(&mut self, geometry: &BfGeometry) {
        if self.bit_reverse.len() != geometry.n {
            self.bit_reverse = (0..geometry.n as u32)
                .map(|x| reverse_bits_width(x, geometry.ln - 1))
                .collect();
        }
        if self.start_table.len() != geometry.increment {
            self.start_table = build_start_table(geometry.increment);
        }
    }

    fn modulus(&self, residual: usize) -> Result<Lane, ModelError> {
        self.modulus_chain
            .get(residual)
            .copied()
            .ok_or(ModelError::MissingResidual {
                residual,
                len: self.modulus_chain.len(),
            })
    }

    fn fetch(&mut self, name: String) -> MultiRegister {
        self.memory.entry(&name).clone()
    }

    /// Immediate scalar: lane 0, without resizing the one-lane register.
    fn immediate_value(&mut self, name: String) -> Result<Lane, ModelError> {
        self.memory
            .read(&name)
            .lanes()
            .first()
            .copied()
            .ok_or(ModelError::EmptyImmediate { name })
    }

    fn input_location<'a>(&self, instr: &'a Instruction, index: usize) -> Result<&'a str, ModelError> {
        instr
            .inputs
            .get(index)
            .map(|operand| operand.location())
            .ok_or(ModelError::MissingOperand {
                opcode: instr.opcode,
                index,
            })
    }

    fn output_location<'a>(&self, instr: &'a Instruction, index: usize) -> Result<&'a str, ModelError> {
        instr
            .outputs
            .get(index)
            .map(|operand| operand.location())
            .ok_or(ModelError::MissingOperand {
                opcode: instr.opcode,
                index,
            })
    }

    /// Writes the complete device state as CSV records: twiddles, modulus
    /// chain, then every register in name order.
    pub fn dump_memory(&self, out: &mut impl Write) -> Result<(), MemoryImageError> {
        for (index, row) in self.twiddle_ntt.iter().enumerate() {
            write!(out, "ntt,{index}")?;
            for value in row {
                write!(out, ",{value}")?;
            }
            writeln!(out)?;
        }
        for (galois, table) in &self.twiddle_intt {
            for (index, row) in table.iter().enumerate() {
                write!(out, "intt,{galois},{index}")?;
                for value in row {
                    write!(out, ",{value}")?;
                }
                writeln!(out)?;
            }
        }
        write!(out, "modulus_chain")?;
        for value in &self.modulus_chain {
            write!(out, ",{value}")?;
        }
        writeln!(out)?;
        for (name, register) in self.memory.registers() {
            write!(out, "memory,{name}")?;
            register.write_csv(out)?;
            writeln!(out)?;
        }
        Ok(())
    }

    /// Writes only the named registers; unknown names are an error.
    pub fn dump_registers(
        &self,
        out: &mut impl Write,
        addresses: &[String],
    ) -> Result<(), MemoryImageError> {
        for address in addresses {
            let register = self.memory.copy(address)?;
            write!(out, "memory,{address}")?;
            register.write_csv(out)?;
            writeln!(out)?;
        }
        Ok(())
    }

    /// Loads a CSV memory image. Empty fields and trailing `\r` are ignored;
    /// lines with an unknown leading tag are silently skipped.
    pub fn load_memory(&mut self, reader: impl BufRead) -> Result<(), MemoryImageError> {
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let number = number + 1;
            let fields: Vec<&str> = line
                .split(',')
                .map(|field| field.trim_end_matches('\r'))
                .filter(|field| !field.is_empty())
                .collect();
            let Some(&tag) = fields.first() else {
                continue;
            };
            match tag {
                "memory" => {
                    let name = *fields.get(1).ok_or_else(|| bad_record(number, &line))?;
                    let values = parse_values(&fields[2..], number)?;
                    self.memory.write(name, MultiRegister::from_lanes(values));
                }
                "modulus_chain" => {
                    self.modulus_chain = parse_values(&fields[1..], number)?;
                }
                "ntt" => {
                    let index: usize = parse_field(fields.get(1), number, &line)?;
                    let values = parse_values(&fields[2..], number)?;
                    if self.twiddle_ntt.len() <= index {
                        self.twiddle_ntt.resize(index + 1, Vec::new());
                    }
                    self.twiddle_ntt[index] = values;
                }
                "intt" => {
                    let galois =
                        alias_galois_key((*fields.get(1).ok_or_else(|| bad_record(number, &line))?).to_string());
                    let index: usize = parse_field(fields.get(2), number, &line)?;
                    let values = parse_values(&fields[3..], number)?;
                    let table = self.twiddle_intt.entry(galois).or_default();
                    if table.len() <= index {
                        table.resize(index + 1, Vec::new());
                    }
                    table[index] = values;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
struct BfGeometry {
    n: usize,
    ln: u32,
    half_n: usize,
    half_block: usize,
    block_size: usize,
    increment: usize,
    sp: usize,
}

fn alias_galois_key(key: String) -> String {
    if key == "default" {
        "1".to_string()
    } else {
        key
    }
}

/// Start offsets for the interleaved forward-butterfly blocks: the
/// progressions `r, r+8, r+16, …` for `r = 0, 4, 2, 6, 1, 5, 3, 7`.
fn build_start_table(increment: usize) -> Vec<usize> {
    let mut table = Vec::with_capacity(increment);
    for r in [0usize, 4, 2, 6, 1, 5, 3, 7] {
        let mut x = r;
        while x < increment {
            table.push(x);
            x += 8;
        }
    }
    table
}

#[inline]
fn read_split(src0: &MultiRegister, src1: &MultiRegister, index: usize, half_block: usize) -> Lane {
    if index < half_block {
        src0.lanes()[index]
    } else {
        src1.lanes()[index - half_block]
    }
}

#[inline]
fn write_split(
    dst0: &mut MultiRegister,
    dst1: &mut MultiRegister,
    index: usize,
    half_block: usize,
    value: Lane,
) {
    if index < half_block {
        dst0.lanes_mut()[index] = value;
    } else {
        dst1.lanes_mut()[index - half_block] = value;
    }
}

fn bad_record(line: usize, text: &str) -> MemoryImageError {
    MemoryImageError::BadRecord {
        line,
        text: text.to_string(),
    }
}

fn parse_field<T: std::str::FromStr>(
    field: Option<&&str>,
    line: usize,
    text: &str,
) -> Result<T, MemoryImageError> {
    let field = field.ok_or_else(|| bad_record(line, text))?;
    field.parse().map_err(|_| MemoryImageError::BadValue {
        line,
        field: field.to_string(),
    })
}

fn parse_values(fields: &[&str], line: usize) -> Result<Vec<Lane>, MemoryImageError> {
    fields
        .iter()
        .map(|field| {
            field.parse().map_err(|_| MemoryImageError::BadValue {
                line,
                field: field.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pisa_isa::{Operand, WParam};

    fn reg(name: &str) -> Operand {
        Operand::register(name)
    }

    #[test]
    fn start_table_interleaves_residue_classes() {
        assert_eq!(build_start_table(1), [0]);
        assert_eq!(build_start_table(2), [0, 1]);
        assert_eq!(build_start_table(4), [0, 2, 1, 3]);
        assert_eq!(build_start_table(8), [0, 4, 2, 6, 1, 5, 3, 7]);
        assert_eq!(
            build_start_table(16),
            [0, 8, 4, 12, 2, 10, 6, 14, 1, 9, 5, 13, 3, 11, 7, 15]
        );
    }

    #[test]
    fn unknown_residual_is_fatal() {
        let mut model = FunctionalModel::new(4);
        model.set_modulus_chain(vec![17]);
        let instr = Instruction::add(13, reg("c"), reg("a"), reg("b"), 3);
        let err = model.decode(&instr).expect_err("residual 3 out of range");
        assert!(err.to_string().contains("add"));
    }

    #[test]
    fn copy_of_unallocated_register_is_fatal() {
        let mut model = FunctionalModel::new(4);
        let instr = Instruction::copy(13, reg("dst"), reg("ghost"));
        assert!(model.decode(&instr).is_err());
    }

    #[test]
    fn intt_without_twiddles_is_fatal() {
        let mut model = FunctionalModel::new(8);
        model.set_modulus_chain(vec![65537]);
        let instr = Instruction::intt(
            4,
            reg("d0"),
            reg("d1"),
            reg("s0"),
            reg("s1"),
            WParam::new(0, 1, 0),
            0,
            5,
        );
        let err = model.decode(&instr).expect_err("no twiddles installed");
        assert!(err.to_string().contains("galois element 5"));
    }

    #[test]
    fn trace_records_operand_snapshots() {
        let mut model = FunctionalModel::new(4);
        model.set_modulus_chain(vec![17]);
        model.enable_trace();
        model
            .memory_mut()
            .write("a", MultiRegister::from_lanes(vec![1, 2, 3, 4]));
        model
            .memory_mut()
            .write("b", MultiRegister::from_lanes(vec![5, 6, 7, 8]));
        let instr = Instruction::add(13, reg("c"), reg("a"), reg("b"), 0);
        model.decode(&instr).expect("add executes");
        let trace = &model.traces()[0];
        assert_eq!(trace.inputs.len(), 2);
        assert_eq!(trace.outputs[0].0, "c");
        assert_eq!(trace.outputs[0].1.lanes(), &[6, 8, 10, 12]);
    }

    // The butterfly index maps must never write the same lane twice within
    // one instruction.
    #[test]
    fn butterfly_writes_are_disjoint_per_instruction() {
        for ln in [4usize, 5, 6] {
            let half_block = 8usize;
            let block_size = half_block * 2;
            let half_n = (1usize << ln) >> 1;
            let block_count = ln.saturating_sub(block_size.trailing_zeros() as usize);
            let increment = 1usize << block_count;
            let start_table = build_start_table(increment);
            let bit_reverse: Vec<usize> = (0..1usize << ln)
                .map(|x| reverse_bits_width(x as u32, ln as u32 - 1) as usize)
                .collect();

            for block in 0..increment {
                let mut seen = std::collections::HashSet::new();
                let mut i = start_table[block];
                while i < half_n {
                    let j = bit_reverse[i];
                    let out0 = j % half_block;
                    let out1 = ((j + half_n) % half_block) + half_block;
                    assert!(seen.insert(out0), "ntt out0 conflict at ln={ln} i={i}");
                    assert!(seen.insert(out1), "ntt out1 conflict at ln={ln} i={i}");
                    i += increment;
                }

                let mut seen = std::collections::HashSet::new();
                let slice = half_n / increment;
                for i in block * slice..(block + 1) * slice {
                    let out0 = (2 * i) % block_size;
                    let out1 = (2 * i + 1) % block_size;
                    assert!(seen.insert(out0), "intt out0 conflict at ln={ln} i={i}");
                    assert!(seen.insert(out1), "intt out1 conflict at ln={ln} i={i}");
                }
            }
        }
    }
}
