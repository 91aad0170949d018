use thiserror::Error;

use crate::instruction::{descriptor, Instruction, Opcode, ParamSlot};
use crate::operand::Operand;

/// Zero-based CSV field holding the opcode name.
pub const OPCODE_FIELD: usize = 1;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: missing opcode field in `{text}`")]
    MissingOpcode { line: usize, text: String },
    #[error("line {line}: unknown opcode `{opcode}` in `{text}`")]
    UnknownOpcode {
        line: usize,
        opcode: String,
        text: String,
    },
    #[error("line {line}: `{opcode}` takes {expected} fields, got {got} in `{text}`")]
    ArityMismatch {
        line: usize,
        opcode: Opcode,
        expected: usize,
        got: usize,
        text: String,
    },
    #[error("line {line}: bad integer `{field}` in `{text}`")]
    BadInteger {
        line: usize,
        field: String,
        text: String,
    },
    #[error("line {line}: malformed operand `{field}` in `{text}`")]
    BadOperand {
        line: usize,
        field: String,
        text: String,
    },
    #[error("line {line}: malformed w-parameter `{field}` in `{text}`")]
    BadWParam {
        line: usize,
        field: String,
        text: String,
    },
}

/// Parses a whole P-ISA program, one instruction per line. Blank lines are
/// skipped; the first malformed line fails the whole input.
pub fn parse_program(text: &str) -> Result<Vec<Instruction>, ParseError> {
    let mut instructions = Vec::new();
    for (number, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        instructions.push(parse_line(line, number + 1)?);
    }
    Ok(instructions)
}

/// Parses one CSV instruction line, dispatching each field on the opcode's
/// descriptor slot in lockstep.
pub fn parse_line(text: &str, line: usize) -> Result<Instruction, ParseError> {
    let fields: Vec<&str> = text.split(',').collect();
    let opcode_field = fields
        .get(OPCODE_FIELD)
        .map(|field| field.trim())
        .filter(|field| !field.is_empty())
        .ok_or_else(|| ParseError::MissingOpcode {
            line,
            text: text.to_string(),
        })?;
    let opcode = Opcode::from_name(opcode_field).ok_or_else(|| ParseError::UnknownOpcode {
        line,
        opcode: opcode_field.to_string(),
        text: text.to_string(),
    })?;

    let slots = descriptor(opcode);
    if fields.len() != slots.len() {
        return Err(ParseError::ArityMismatch {
            line,
            opcode,
            expected: slots.len(),
            got: fields.len(),
            text: text.to_string(),
        });
    }

    let mut instr = Instruction::new(opcode);
    for (&slot, &field) in slots.iter().zip(fields.iter()) {
        match slot {
            ParamSlot::PolyModLog2 => instr.pmd_log2 = parse_int(field, line, text)?,
            ParamSlot::OpName => {}
            ParamSlot::Input => instr.inputs.push(parse_operand(field, line, text)?),
            ParamSlot::Output => instr.outputs.push(parse_operand(field, line, text)?),
            ParamSlot::InputOutput => {
                let operand = parse_operand(field, line, text)?;
                instr.inputs.push(operand.clone());
                instr.outputs.push(operand);
            }
            ParamSlot::Immediate => instr.inputs.push(Operand::immediate(field.trim())),
            ParamSlot::Residual => instr.residual = parse_int(field, line, text)?,
            ParamSlot::WPacked => {
                instr.w_param =
                    Some(
                        field
                            .trim()
                            .parse()
                            .map_err(|_| ParseError::BadWParam {
                                line,
                                field: field.trim().to_string(),
                                text: text.to_string(),
                            })?,
                    )
            }
            ParamSlot::Galois => instr.galois_element = parse_int(field, line, text)?,
            ParamSlot::GroupId => instr.group_id = Some(parse_int(field, line, text)?),
            ParamSlot::Stage => instr.stage = Some(parse_int(field, line, text)?),
            ParamSlot::Block => instr.block = Some(parse_int(field, line, text)?),
        }
    }
    Ok(instr)
}

fn parse_int<T: std::str::FromStr>(field: &str, line: usize, text: &str) -> Result<T, ParseError> {
    field.trim().parse().map_err(|_| ParseError::BadInteger {
        line,
        field: field.trim().to_string(),
        text: text.to_string(),
    })
}

fn parse_operand(field: &str, line: usize, text: &str) -> Result<Operand, ParseError> {
    let error = || ParseError::BadOperand {
        line,
        field: field.trim().to_string(),
        text: text.to_string(),
    };
    let mut parts = field.split_whitespace();
    let location = parts.next().ok_or_else(error)?;
    let bank = match parts.next() {
        Some(annotation) => {
            let digits = annotation
                .strip_prefix('(')
                .and_then(|rest| rest.strip_suffix(')'))
                .ok_or_else(error)?;
            Some(digits.parse().map_err(|_| error())?)
        }
        None => None,
    };
    if parts.next().is_some() {
        return Err(error());
    }
    Ok(match bank {
        Some(bank) => Operand::banked(location, bank),
        None => Operand::register(location),
    })
}
