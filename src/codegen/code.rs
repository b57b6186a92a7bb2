//! Symbolic instruction streams and their byte encoding
//!
//! A [`Code`] is what the builder hands to the class writer: a list of
//! labels and instructions whose branch targets are still symbolic, plus the
//! computed `max_stack` and `max_locals`. Encoding lays the stream out,
//! resolves labels to relative offsets and pads switch tables.

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;

use super::constpool::ConstantPool;
use super::error::BytecodeError;
use super::opcodes::{Format, Mnemonic, WIDE};

/// JVM limit on the length of a method's code array
pub const MAX_CODE_LENGTH: usize = u16::MAX as usize;

/// A symbolic branch target
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Label of the instruction translated from IR address `ip`
    pub fn addr(ip: usize) -> Self {
        Self(format!("addr_{}", ip))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immediate operands of an instruction
#[derive(Debug, Clone, PartialEq)]
pub enum Operands {
    None,
    /// `bipush`/`sipush` value or `newarray` element code
    Immediate(i32),
    Local(u16),
    Iinc { index: u16, delta: i16 },
    Constant(u16),
    Interface { index: u16, count: u8 },
    Branch(Label),
    TableSwitch { default: Label, low: i32, targets: Vec<Label> },
    LookupSwitch { default: Label, pairs: Vec<(i32, Label)> },
}

impl Operands {
    pub fn fits(&self, format: Format) -> bool {
        matches!(
            (self, format),
            (Operands::None, Format::None)
                | (Operands::Immediate(_), Format::Byte | Format::Short | Format::ArrayType)
                | (Operands::Local(_), Format::Local)
                | (Operands::Iinc { .. }, Format::Iinc)
                | (Operands::Constant(_), Format::Constant8 | Format::Constant16 | Format::Dynamic)
                | (Operands::Interface { .. }, Format::Interface)
                | (Operands::Branch(_), Format::Branch)
                | (Operands::TableSwitch { .. }, Format::TableSwitch)
                | (Operands::LookupSwitch { .. }, Format::LookupSwitch)
        )
    }

    /// Constant pool index carried by this operand, if any
    pub fn constant(&self) -> Option<u16> {
        match self {
            Operands::Constant(index) | Operands::Interface { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Every label this operand can transfer control to
    pub fn targets(&self) -> Vec<&Label> {
        match self {
            Operands::Branch(label) => vec![label],
            Operands::TableSwitch { default, targets, .. } => std::iter::once(default).chain(targets).collect(),
            Operands::LookupSwitch { default, pairs } => {
                std::iter::once(default).chain(pairs.iter().map(|(_, label)| label)).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    pub operands: Operands,
}

impl Instruction {
    pub fn new(mnemonic: Mnemonic, operands: Operands) -> Self {
        Self { mnemonic, operands }
    }

    /// Encoded size when the opcode sits at byte offset `offset`
    pub fn size_at(&self, offset: usize) -> usize {
        let switch_padding = (4 - (offset + 1) % 4) % 4;
        match &self.operands {
            Operands::None => 1,
            Operands::Immediate(_) => match self.mnemonic.format() {
                Format::Short => 3,
                _ => 2,
            },
            Operands::Local(index) if *index > u8::MAX as u16 => 4,
            Operands::Local(_) => 2,
            Operands::Iinc { index, delta } => {
                if *index <= u8::MAX as u16 && i8::try_from(*delta).is_ok() {
                    3
                } else {
                    6
                }
            }
            Operands::Constant(_) => match self.mnemonic.format() {
                Format::Constant8 => 2,
                Format::Dynamic => 5,
                _ => 3,
            },
            Operands::Interface { .. } => 5,
            Operands::Branch(_) => 3,
            Operands::TableSwitch { targets, .. } => 1 + switch_padding + 12 + 4 * targets.len(),
            Operands::LookupSwitch { pairs, .. } => 1 + switch_padding + 8 + 8 * pairs.len(),
        }
    }
}

/// One element of a symbolic instruction stream
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Label(Label),
    Instruction(Instruction),
}

/// A finished method body
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Code {
    pub items: Vec<Item>,
    pub max_stack: u16,
    pub max_locals: u16,
}

struct Layout {
    offsets: Vec<usize>,
    labels: HashMap<Label, usize>,
    length: usize,
}

fn branch_offset(labels: &HashMap<Label, usize>, label: &Label, from: usize) -> Result<i64, BytecodeError> {
    let target = labels
        .get(label)
        .ok_or_else(|| BytecodeError::UndefinedLabel(label.name().to_string()))?;
    Ok(*target as i64 - from as i64)
}

fn put_u16(code: &mut Vec<u8>, value: u16) {
    code.extend_from_slice(&value.to_be_bytes());
}

fn put_i32(code: &mut Vec<u8>, value: i32) {
    code.extend_from_slice(&value.to_be_bytes());
}

fn wide_offset(offset: i64) -> Result<i32, BytecodeError> {
    i32::try_from(offset).map_err(|_| BytecodeError::BranchTooFar { offset })
}

impl Code {
    /// Instructions in stream order, labels skipped
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.items.iter().filter_map(|item| match item {
            Item::Instruction(insn) => Some(insn),
            Item::Label(_) => None,
        })
    }

    fn layout(&self) -> Result<Layout, BytecodeError> {
        let mut offsets = Vec::with_capacity(self.items.len());
        let mut labels = HashMap::new();
        let mut offset = 0;
        for item in &self.items {
            offsets.push(offset);
            match item {
                Item::Label(label) => {
                    if labels.insert(label.clone(), offset).is_some() {
                        return Err(BytecodeError::DuplicateLabel(label.name().to_string()));
                    }
                }
                Item::Instruction(insn) => offset += insn.size_at(offset),
            }
        }
        if offset > MAX_CODE_LENGTH {
            return Err(BytecodeError::CodeTooLong { length: offset });
        }
        Ok(Layout { offsets, labels, length: offset })
    }

    /// Encode the stream into the bytes of a `Code` attribute's code array
    pub fn encode(&self) -> Result<Vec<u8>, BytecodeError> {
        let layout = self.layout()?;
        let mut code = Vec::with_capacity(layout.length);
        for (item, &at) in self.items.iter().zip(&layout.offsets) {
            let Item::Instruction(insn) = item else { continue };
            let mnemonic = insn.mnemonic;
            let opcode = mnemonic.opcode();
            let out_of_range = |operand: i64| BytecodeError::OperandRange { mnemonic, operand };
            match &insn.operands {
                Operands::None => code.push(opcode),
                Operands::Immediate(value) => {
                    code.push(opcode);
                    match mnemonic.format() {
                        Format::Short => {
                            let v = i16::try_from(*value).map_err(|_| out_of_range(*value as i64))?;
                            code.extend_from_slice(&v.to_be_bytes());
                        }
                        Format::Byte => {
                            let v = i8::try_from(*value).map_err(|_| out_of_range(*value as i64))?;
                            code.push(v as u8);
                        }
                        _ => {
                            let v = u8::try_from(*value).map_err(|_| out_of_range(*value as i64))?;
                            code.push(v);
                        }
                    }
                }
                Operands::Local(index) => {
                    if *index > u8::MAX as u16 {
                        code.push(WIDE);
                        code.push(opcode);
                        put_u16(&mut code, *index);
                    } else {
                        code.push(opcode);
                        code.push(*index as u8);
                    }
                }
                Operands::Iinc { index, delta } => match i8::try_from(*delta) {
                    Ok(small) if *index <= u8::MAX as u16 => {
                        code.push(opcode);
                        code.push(*index as u8);
                        code.push(small as u8);
                    }
                    _ => {
                        code.push(WIDE);
                        code.push(opcode);
                        put_u16(&mut code, *index);
                        code.extend_from_slice(&delta.to_be_bytes());
                    }
                },
                Operands::Constant(index) => {
                    code.push(opcode);
                    match mnemonic.format() {
                        Format::Constant8 => {
                            let v = u8::try_from(*index).map_err(|_| out_of_range(*index as i64))?;
                            code.push(v);
                        }
                        Format::Dynamic => {
                            put_u16(&mut code, *index);
                            put_u16(&mut code, 0);
                        }
                        _ => put_u16(&mut code, *index),
                    }
                }
                Operands::Interface { index, count } => {
                    code.push(opcode);
                    put_u16(&mut code, *index);
                    code.push(*count);
                    code.push(0);
                }
                Operands::Branch(label) => {
                    let offset = branch_offset(&layout.labels, label, at)?;
                    let v = i16::try_from(offset).map_err(|_| BytecodeError::BranchTooFar { offset })?;
                    code.push(opcode);
                    code.extend_from_slice(&v.to_be_bytes());
                }
                Operands::TableSwitch { default, low, targets } => {
                    code.push(opcode);
                    while code.len() % 4 != 0 {
                        code.push(0);
                    }
                    put_i32(&mut code, wide_offset(branch_offset(&layout.labels, default, at)?)?);
                    put_i32(&mut code, *low);
                    let high = *low as i64 + targets.len() as i64 - 1;
                    put_i32(&mut code, i32::try_from(high).map_err(|_| out_of_range(high))?);
                    for target in targets {
                        put_i32(&mut code, wide_offset(branch_offset(&layout.labels, target, at)?)?);
                    }
                }
                Operands::LookupSwitch { default, pairs } => {
                    code.push(opcode);
                    while code.len() % 4 != 0 {
                        code.push(0);
                    }
                    put_i32(&mut code, wide_offset(branch_offset(&layout.labels, default, at)?)?);
                    put_i32(&mut code, pairs.len() as i32);
                    let mut sorted: Vec<_> = pairs.iter().collect();
                    sorted.sort_by_key(|(key, _)| *key);
                    for (key, target) in sorted {
                        put_i32(&mut code, *key);
                        put_i32(&mut code, wide_offset(branch_offset(&layout.labels, target, at)?)?);
                    }
                }
            }
        }
        Ok(code)
    }

    /// Render a readable listing with byte offsets
    pub fn disassemble(&self, pool: &ConstantPool) -> Result<String, BytecodeError> {
        let layout = self.layout()?;
        let mut out = String::new();
        for (item, &at) in self.items.iter().zip(&layout.offsets) {
            let _ = match item {
                Item::Label(label) => writeln!(out, "{}:", label),
                Item::Instruction(insn) => {
                    let operands = match &insn.operands {
                        Operands::None => String::new(),
                        Operands::Immediate(value) => format!(" {}", value),
                        Operands::Local(index) => format!(" {}", index),
                        Operands::Iinc { index, delta } => format!(" {} {}", index, delta),
                        Operands::Constant(index) | Operands::Interface { index, .. } => {
                            format!(" #{} // {}", index, pool.describe(*index))
                        }
                        Operands::Branch(label) => format!(" {}", label),
                        Operands::TableSwitch { default, low, targets } => {
                            let cases: Vec<String> = targets
                                .iter()
                                .enumerate()
                                .map(|(i, target)| format!("{}: {}", *low as i64 + i as i64, target))
                                .collect();
                            format!(" {{ {}, default: {} }}", cases.join(", "), default)
                        }
                        Operands::LookupSwitch { default, pairs } => {
                            let cases: Vec<String> =
                                pairs.iter().map(|(key, target)| format!("{}: {}", key, target)).collect();
                            format!(" {{ {}, default: {} }}", cases.join(", "), default)
                        }
                    };
                    writeln!(out, "  {:5}: {}{}", at, insn.mnemonic, operands)
                }
            };
        }
        Ok(out)
    }
}
