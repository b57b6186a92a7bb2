//! Symbolic instruction builder
//!
//! [`CodeBuilder`] appends instructions to a stream and runs each one
//! through the [`SymbolicStack`], so a method body is type checked and
//! sized as it is written. Besides the primitive [`CodeBuilder::append`]
//! it offers the usual shortcuts: optimal constant pushes, local access
//! with the compact `_n` forms, and the shuffles used to move 64-bit cells.
//!
//! All methods return `&mut Self` so sequences chain with `?`:
//!
//! ```ignore
//! code.lload(0)?.push_long(1)?.ladd()?.lreturn()?;
//! ```

use std::collections::HashMap;

use log::trace;

use super::code::{Code, Instruction, Item, Label, Operands};
use super::constpool::{Constant, ConstantPool};
use super::error::{BytecodeError, CodeGenResult, StackError};
use super::opcodes::{Flow, Mnemonic};
use super::operand::OperandType;
use super::stack::{same_shape, SymbolicStack};

#[derive(Debug)]
pub struct CodeBuilder<'a> {
    pool: &'a mut ConstantPool,
    stack: SymbolicStack,
    items: Vec<Item>,
    /// Stack shape at every label placed so far, when known
    label_shapes: HashMap<Label, Option<Vec<OperandType>>>,
    /// Shape carried by unconditional jumps to labels not yet placed
    forward_shapes: HashMap<Label, Vec<OperandType>>,
}

/// Local variable slot and type accessed by a load/store instruction
fn local_access(mnemonic: Mnemonic, operands: &Operands) -> Option<(usize, OperandType)> {
    use Mnemonic::*;
    use OperandType::*;
    let explicit = match operands {
        Operands::Local(index) | Operands::Iinc { index, .. } => Some(*index as usize),
        _ => None,
    };
    let (ty, implied) = match mnemonic {
        Iload | Istore | Iinc => (Integer, None),
        Lload | Lstore => (Long, None),
        Fload | Fstore => (Float, None),
        Dload | Dstore => (Double, None),
        Aload | Astore => (Reference, None),
        Iload0 | Istore0 => (Integer, Some(0)),
        Iload1 | Istore1 => (Integer, Some(1)),
        Iload2 | Istore2 => (Integer, Some(2)),
        Iload3 | Istore3 => (Integer, Some(3)),
        Lload0 | Lstore0 => (Long, Some(0)),
        Lload1 | Lstore1 => (Long, Some(1)),
        Lload2 | Lstore2 => (Long, Some(2)),
        Lload3 | Lstore3 => (Long, Some(3)),
        Fload0 | Fstore0 => (Float, Some(0)),
        Fload1 | Fstore1 => (Float, Some(1)),
        Fload2 | Fstore2 => (Float, Some(2)),
        Fload3 | Fstore3 => (Float, Some(3)),
        Dload0 | Dstore0 => (Double, Some(0)),
        Dload1 | Dstore1 => (Double, Some(1)),
        Dload2 | Dstore2 => (Double, Some(2)),
        Dload3 | Dstore3 => (Double, Some(3)),
        Aload0 | Astore0 => (Reference, Some(0)),
        Aload1 | Astore1 => (Reference, Some(1)),
        Aload2 | Astore2 => (Reference, Some(2)),
        Aload3 | Astore3 => (Reference, Some(3)),
        _ => return None,
    };
    implied.or(explicit).map(|index| (index, ty))
}

/// The compact `_0`..`_3` form of a local access, if one exists
fn compact_local(mnemonic: Mnemonic, index: u16) -> Option<Mnemonic> {
    use Mnemonic::*;
    let forms = match mnemonic {
        Iload => [Iload0, Iload1, Iload2, Iload3],
        Lload => [Lload0, Lload1, Lload2, Lload3],
        Fload => [Fload0, Fload1, Fload2, Fload3],
        Dload => [Dload0, Dload1, Dload2, Dload3],
        Aload => [Aload0, Aload1, Aload2, Aload3],
        Istore => [Istore0, Istore1, Istore2, Istore3],
        Lstore => [Lstore0, Lstore1, Lstore2, Lstore3],
        Fstore => [Fstore0, Fstore1, Fstore2, Fstore3],
        Dstore => [Dstore0, Dstore1, Dstore2, Dstore3],
        Astore => [Astore0, Astore1, Astore2, Astore3],
        _ => return None,
    };
    forms.get(index as usize).copied()
}

fn local_index(index: usize) -> CodeGenResult<u16> {
    u16::try_from(index).map_err(|_| StackError::LocalIndexOutOfBounds { index }.into())
}

impl<'a> CodeBuilder<'a> {
    /// Start a method body whose parameters occupy `param_slots` locals
    pub fn new(pool: &'a mut ConstantPool, param_slots: usize) -> Self {
        Self {
            pool,
            stack: SymbolicStack::with_locals(param_slots),
            items: Vec::new(),
            label_shapes: HashMap::new(),
            forward_shapes: HashMap::new(),
        }
    }

    pub fn pool(&mut self) -> &mut ConstantPool {
        &mut *self.pool
    }

    pub fn stack(&self) -> &SymbolicStack {
        &self.stack
    }

    /// Record an instruction and apply its stack effect
    pub fn append(&mut self, mnemonic: Mnemonic, operands: Operands) -> CodeGenResult<&mut Self> {
        if !operands.fits(mnemonic.format()) {
            return Err(BytecodeError::OperandMismatch { mnemonic }.into());
        }
        let pool: &ConstantPool = &*self.pool;
        let constant = match operands.constant() {
            Some(index) => {
                pool.check_space()?;
                Some(pool.get(index).ok_or_else(|| StackError::BadOperand {
                    mnemonic,
                    reason: format!("no constant at index {}", index),
                })?)
            }
            None => None,
        };
        self.stack.apply(mnemonic, constant.map(|c| (c, pool)))?;
        if let Some((index, ty)) = local_access(mnemonic, &operands) {
            self.stack.touch_local(index, ty)?;
        }

        match mnemonic.flow() {
            Flow::Next => {}
            Flow::Branch => {
                for target in operands.targets() {
                    self.branch_to(target)?;
                }
            }
            Flow::Goto | Flow::Switch => {
                for target in operands.targets() {
                    self.jump_to(target)?;
                }
                self.stack.mark_unreachable();
            }
            Flow::Exit => self.stack.mark_unreachable(),
        }
        trace!("{:<16} {:?}", mnemonic.name(), self.stack.shape());
        self.items.push(Item::Instruction(Instruction::new(mnemonic, operands)));
        Ok(self)
    }

    /// Snapshot the shape for a forward target, or check it against a placed one
    fn branch_to(&mut self, target: &Label) -> CodeGenResult<()> {
        match self.label_shapes.get(target) {
            Some(Some(expected)) => {
                if !same_shape(expected, self.stack.shape()) {
                    return Err(StackError::MergeMismatch {
                        expected: expected.clone(),
                        found: self.stack.shape().to_vec(),
                    }
                    .into());
                }
            }
            Some(None) => {}
            None => self.stack.save_branch(),
        }
        Ok(())
    }

    /// Record the shape an unconditional jump carries to `target`.
    ///
    /// Nothing is pushed on the snapshot stack: the shape is checked, or
    /// restored if control cannot fall through, when the label is placed.
    fn jump_to(&mut self, target: &Label) -> CodeGenResult<()> {
        let expected = match self.label_shapes.get(target) {
            Some(Some(shape)) => Some(shape),
            Some(None) => None,
            None => self.forward_shapes.get(target),
        };
        match expected {
            Some(expected) if !same_shape(expected, self.stack.shape()) => Err(StackError::MergeMismatch {
                expected: expected.clone(),
                found: self.stack.shape().to_vec(),
            }
            .into()),
            Some(_) => Ok(()),
            None => {
                if !self.label_shapes.contains_key(target) {
                    self.forward_shapes.insert(target.clone(), self.stack.shape().to_vec());
                }
                Ok(())
            }
        }
    }

    pub fn op(&mut self, mnemonic: Mnemonic) -> CodeGenResult<&mut Self> {
        self.append(mnemonic, Operands::None)
    }

    /// Place a label at the current position
    pub fn label(&mut self, label: Label) -> CodeGenResult<&mut Self> {
        if self.label_shapes.contains_key(&label) {
            return Err(BytecodeError::DuplicateLabel(label.name().to_string()).into());
        }
        if let Some(carried) = self.forward_shapes.remove(&label) {
            if !self.stack.is_reachable() {
                self.stack.restore(carried);
            } else if !same_shape(&carried, self.stack.shape()) {
                return Err(StackError::MergeMismatch { expected: carried, found: self.stack.shape().to_vec() }.into());
            }
        }
        let shape = self.stack.is_reachable().then(|| self.stack.shape().to_vec());
        self.label_shapes.insert(label.clone(), shape);
        self.items.push(Item::Label(label));
        Ok(self)
    }

    /// Restore the stack shape saved by the most recent forward branch.
    ///
    /// Call once per forward branch right after placing its target label.
    pub fn end_branch(&mut self) -> CodeGenResult<&mut Self> {
        self.stack.end_branch()?;
        let shape = self.stack.shape().to_vec();
        for item in self.items.iter().rev() {
            let Item::Label(label) = item else { break };
            if let Some(slot) = self.label_shapes.get_mut(label) {
                if slot.is_none() {
                    *slot = Some(shape.clone());
                }
            }
        }
        Ok(self)
    }

    /// Finish the body, checking every forward branch has been merged
    pub fn finish(self) -> CodeGenResult<Code> {
        if self.stack.pending_branches() != 0 {
            return Err(StackError::UnbalancedBranch.into());
        }
        if let Some(label) = self.forward_shapes.keys().min() {
            return Err(BytecodeError::UndefinedLabel(label.name().to_string()).into());
        }
        let max_stack = u16::try_from(self.stack.max_width())
            .map_err(|_| StackError::Overflow { width: self.stack.max_width() })?;
        let max_locals = local_index(self.stack.max_locals())?;
        Ok(Code { items: self.items, max_stack, max_locals })
    }

    // Constants

    /// Push an `int` with the shortest encoding that represents it
    pub fn push_int(&mut self, value: i64) -> CodeGenResult<&mut Self> {
        use Mnemonic::*;
        match value {
            -1 => self.op(IconstM1),
            0 => self.op(Iconst0),
            1 => self.op(Iconst1),
            2 => self.op(Iconst2),
            3 => self.op(Iconst3),
            4 => self.op(Iconst4),
            5 => self.op(Iconst5),
            -128..=127 => self.append(Bipush, Operands::Immediate(value as i32)),
            -32768..=32767 => self.append(Sipush, Operands::Immediate(value as i32)),
            _ => {
                let value = i32::try_from(value).map_err(|_| BytecodeError::IntegerRange { value })?;
                let index = self.pool.integer(value);
                self.ldc(index)
            }
        }
    }

    /// Push a `long`, widening an `int` push where that is shorter than a pooled constant
    pub fn push_long(&mut self, value: i64) -> CodeGenResult<&mut Self> {
        match value {
            0 => self.op(Mnemonic::Lconst0),
            1 => self.op(Mnemonic::Lconst1),
            _ if i32::try_from(value).is_ok() => self.push_int(value)?.op(Mnemonic::I2l),
            _ => {
                let index = self.pool.long(value);
                self.append(Mnemonic::Ldc2W, Operands::Constant(index))
            }
        }
    }

    pub fn push_string(&mut self, value: &str) -> CodeGenResult<&mut Self> {
        let index = self.pool.string(value);
        self.ldc(index)
    }

    pub fn push_null(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::AconstNull)
    }

    /// Load a pooled constant with `ldc`, `ldc_w` or `ldc2_w` as its kind and index require
    pub fn ldc(&mut self, index: u16) -> CodeGenResult<&mut Self> {
        let mnemonic = match self.pool.get(index) {
            Some(Constant::Long(_) | Constant::Double(_)) => Mnemonic::Ldc2W,
            _ if index <= u8::MAX as u16 => Mnemonic::Ldc,
            _ => Mnemonic::LdcW,
        };
        self.append(mnemonic, Operands::Constant(index))
    }

    // Locals

    fn local(&mut self, mnemonic: Mnemonic, index: usize) -> CodeGenResult<&mut Self> {
        let index = local_index(index)?;
        match compact_local(mnemonic, index) {
            Some(compact) => self.op(compact),
            None => self.append(mnemonic, Operands::Local(index)),
        }
    }

    pub fn iload(&mut self, index: usize) -> CodeGenResult<&mut Self> {
        self.local(Mnemonic::Iload, index)
    }

    pub fn lload(&mut self, index: usize) -> CodeGenResult<&mut Self> {
        self.local(Mnemonic::Lload, index)
    }

    pub fn aload(&mut self, index: usize) -> CodeGenResult<&mut Self> {
        self.local(Mnemonic::Aload, index)
    }

    pub fn istore(&mut self, index: usize) -> CodeGenResult<&mut Self> {
        self.local(Mnemonic::Istore, index)
    }

    pub fn lstore(&mut self, index: usize) -> CodeGenResult<&mut Self> {
        self.local(Mnemonic::Lstore, index)
    }

    pub fn astore(&mut self, index: usize) -> CodeGenResult<&mut Self> {
        self.local(Mnemonic::Astore, index)
    }

    pub fn iinc(&mut self, index: usize, delta: i16) -> CodeGenResult<&mut Self> {
        let index = local_index(index)?;
        self.append(Mnemonic::Iinc, Operands::Iinc { index, delta })
    }

    // Arithmetic and conversions

    pub fn ladd(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Ladd)
    }

    pub fn lsub(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Lsub)
    }

    pub fn lmul(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Lmul)
    }

    pub fn land(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Land)
    }

    pub fn lor(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Lor)
    }

    pub fn lcmp(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Lcmp)
    }

    pub fn iadd(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Iadd)
    }

    pub fn i2l(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::I2l)
    }

    pub fn l2i(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::L2i)
    }

    /// Bitwise complement of the `long` on top of the stack
    pub fn lnot(&mut self) -> CodeGenResult<&mut Self> {
        self.push_long(-1)?.op(Mnemonic::Lxor)
    }

    // Arrays

    /// Allocate a primitive array of the length on top of the stack
    pub fn newarray(&mut self, element: OperandType) -> CodeGenResult<&mut Self> {
        let code = element.array_type_code().ok_or(BytecodeError::OperandMismatch { mnemonic: Mnemonic::Newarray })?;
        self.append(Mnemonic::Newarray, Operands::Immediate(code as i32))
    }

    pub fn anewarray(&mut self, class: &str) -> CodeGenResult<&mut Self> {
        let index = self.pool.class(class);
        self.append(Mnemonic::Anewarray, Operands::Constant(index))
    }

    pub fn arraylength(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Arraylength)
    }

    // Fields, methods and objects

    pub fn getstatic(&mut self, field: u16) -> CodeGenResult<&mut Self> {
        self.append(Mnemonic::Getstatic, Operands::Constant(field))
    }

    pub fn putstatic(&mut self, field: u16) -> CodeGenResult<&mut Self> {
        self.append(Mnemonic::Putstatic, Operands::Constant(field))
    }

    pub fn invokestatic(&mut self, method: u16) -> CodeGenResult<&mut Self> {
        self.append(Mnemonic::Invokestatic, Operands::Constant(method))
    }

    pub fn invokevirtual(&mut self, method: u16) -> CodeGenResult<&mut Self> {
        self.append(Mnemonic::Invokevirtual, Operands::Constant(method))
    }

    pub fn invokespecial(&mut self, method: u16) -> CodeGenResult<&mut Self> {
        self.append(Mnemonic::Invokespecial, Operands::Constant(method))
    }

    /// Call an interface method; the argument count operand is derived from its descriptor
    pub fn invokeinterface(&mut self, method: u16) -> CodeGenResult<&mut Self> {
        let count = self
            .pool
            .member_at(method)
            .ok()
            .and_then(|member| super::descriptor::parse_method_descriptor(member.descriptor))
            .map(|shape| 1 + shape.param_slots())
            .ok_or(BytecodeError::OperandMismatch { mnemonic: Mnemonic::Invokeinterface })?;
        let count = u8::try_from(count).map_err(|_| BytecodeError::OperandRange {
            mnemonic: Mnemonic::Invokeinterface,
            operand: count as i64,
        })?;
        self.append(Mnemonic::Invokeinterface, Operands::Interface { index: method, count })
    }

    /// `new` followed by `dup`, leaving two references for the constructor call
    pub fn new_dup(&mut self, class: &str) -> CodeGenResult<&mut Self> {
        let index = self.pool.class(class);
        self.append(Mnemonic::New, Operands::Constant(index))?.op(Mnemonic::Dup)
    }

    pub fn checkcast(&mut self, class: &str) -> CodeGenResult<&mut Self> {
        let index = self.pool.class(class);
        self.append(Mnemonic::Checkcast, Operands::Constant(index))
    }

    // Control flow

    pub fn goto(&mut self, target: Label) -> CodeGenResult<&mut Self> {
        self.append(Mnemonic::Goto, Operands::Branch(target))
    }

    /// Conditional branch such as `ifeq` or `if_icmplt`
    pub fn branch(&mut self, mnemonic: Mnemonic, target: Label) -> CodeGenResult<&mut Self> {
        if mnemonic.flow() != Flow::Branch {
            return Err(BytecodeError::OperandMismatch { mnemonic }.into());
        }
        self.append(mnemonic, Operands::Branch(target))
    }

    pub fn lookupswitch(&mut self, default: Label, pairs: Vec<(i32, Label)>) -> CodeGenResult<&mut Self> {
        self.append(Mnemonic::Lookupswitch, Operands::LookupSwitch { default, pairs })
    }

    pub fn tableswitch(&mut self, default: Label, low: i32, targets: Vec<Label>) -> CodeGenResult<&mut Self> {
        self.append(Mnemonic::Tableswitch, Operands::TableSwitch { default, low, targets })
    }

    pub fn return_void(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Return)
    }

    pub fn ireturn(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Ireturn)
    }

    pub fn lreturn(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Lreturn)
    }

    pub fn areturn(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Areturn)
    }

    // Stack shuffles

    pub fn pop(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Pop)
    }

    pub fn pop2(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Pop2)
    }

    pub fn dup(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Dup)
    }

    pub fn dup2(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Dup2)
    }

    pub fn dup_x1(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::DupX1)
    }

    pub fn dup_x2(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::DupX2)
    }

    pub fn dup2_x1(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Dup2X1)
    }

    pub fn dup2_x2(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Dup2X2)
    }

    pub fn swap(&mut self) -> CodeGenResult<&mut Self> {
        self.op(Mnemonic::Swap)
    }

    /// Drop the value on top, one or two slots wide
    pub fn discard(&mut self) -> CodeGenResult<&mut Self> {
        match self.stack.shape().last() {
            Some(ty) if ty.is_wide() => self.pop2(),
            _ => self.pop(),
        }
    }

    /// `a b -> b a` for two 64-bit cells
    pub fn swap_wide(&mut self) -> CodeGenResult<&mut Self> {
        self.dup2_x2()?.pop2()
    }

    /// `a b -> a b a` for two 64-bit cells
    pub fn over_wide(&mut self) -> CodeGenResult<&mut Self> {
        self.dup2_x2()?.pop2()?.dup2_x2()
    }

    /// `w n -> n w`: move a one-slot value behind a two-slot one
    pub fn move_behind_wide(&mut self) -> CodeGenResult<&mut Self> {
        self.dup_x2()?.pop()
    }

    /// `n w -> w n`: move a two-slot value behind a one-slot one
    pub fn move_wide_behind(&mut self) -> CodeGenResult<&mut Self> {
        self.dup2_x1()?.pop2()
    }

    /// `w a b -> a b w a b`: duplicate two one-slot values below a two-slot one
    pub fn dup_pair_below_wide(&mut self) -> CodeGenResult<&mut Self> {
        self.dup2_x2()
    }
}
