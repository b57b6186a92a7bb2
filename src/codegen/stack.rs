//! Symbolic operand stack used to verify and size generated code
//!
//! The stack records the type of every value an instruction stream would
//! leave on the operand stack, together with the running maxima the `Code`
//! attribute needs. Merge points are modelled with a stack of snapshots:
//! a conditional branch saves the shape it leaves behind, and the matching
//! [`SymbolicStack::end_branch`] restores it at the branch target.

use super::constpool::{Constant, ConstantPool};
use super::error::{StackError, StackResult};
use super::opcodes::{Effect, Mnemonic};
use super::operand::{total_width, OperandType};

/// JVM limit for both `max_stack` and `max_locals`
pub const MAX_SLOTS: usize = u16::MAX as usize;

#[derive(Debug, Clone, Default)]
pub struct SymbolicStack {
    values: Vec<OperandType>,
    width: usize,
    max_width: usize,
    max_locals: usize,
    snapshots: Vec<Vec<OperandType>>,
    unreachable: bool,
}

impl SymbolicStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// A stack for a method whose parameters already occupy `slots` locals
    pub fn with_locals(slots: usize) -> Self {
        Self { max_locals: slots, ..Self::default() }
    }

    /// Current types, bottom first
    pub fn shape(&self) -> &[OperandType] {
        &self.values
    }

    /// Current width in slots
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn max_width(&self) -> usize {
        self.max_width
    }

    pub fn max_locals(&self) -> usize {
        self.max_locals
    }

    pub fn depth(&self) -> usize {
        self.values.len()
    }

    pub fn pending_branches(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the previous instruction can fall through to the next one
    pub fn is_reachable(&self) -> bool {
        !self.unreachable
    }

    pub fn push(&mut self, ty: OperandType) -> StackResult<()> {
        self.width += ty.width();
        if self.width > MAX_SLOTS {
            return Err(StackError::Overflow { width: self.width });
        }
        self.max_width = self.max_width.max(self.width);
        self.values.push(ty.computational());
        Ok(())
    }

    /// Pop one value that must unify with `expected`
    pub fn pop(&mut self, mnemonic: Mnemonic, expected: OperandType) -> StackResult<OperandType> {
        let found = self.values.pop().ok_or(StackError::Underflow {
            mnemonic,
            needed: expected.width(),
            found: 0,
        })?;
        self.width -= found.width();
        if !found.unifies_with(expected) {
            return Err(StackError::TypeMismatch { mnemonic, expected, found });
        }
        Ok(found)
    }

    /// Pop the values covering exactly `slots` slots, bottom first
    fn take_slots(&mut self, mnemonic: Mnemonic, slots: usize) -> StackResult<Vec<OperandType>> {
        let mut taken = Vec::new();
        let mut covered = 0;
        while covered < slots {
            let Some(ty) = self.values.pop() else {
                return Err(StackError::Underflow { mnemonic, needed: slots, found: covered });
            };
            covered += ty.width();
            self.width -= ty.width();
            if covered > slots {
                return Err(StackError::SplitWideValue { mnemonic, found: ty });
            }
            taken.push(ty);
        }
        taken.reverse();
        Ok(taken)
    }

    fn push_all(&mut self, types: &[OperandType]) -> StackResult<()> {
        for &ty in types {
            self.push(ty)?;
        }
        Ok(())
    }

    /// Apply one of the width-polymorphic stack manipulation instructions.
    ///
    /// `dupN_xM` copies the values covering the top N slots below the values
    /// covering the next M slots; neither group may split a two-slot value.
    fn shuffle(&mut self, mnemonic: Mnemonic) -> StackResult<()> {
        use Mnemonic::*;
        let (copied, skipped) = match mnemonic {
            Pop => return self.take_slots(mnemonic, 1).map(drop),
            Pop2 => return self.take_slots(mnemonic, 2).map(drop),
            Swap => {
                let top = self.take_slots(mnemonic, 1)?;
                let below = self.take_slots(mnemonic, 1)?;
                self.push_all(&top)?;
                return self.push_all(&below);
            }
            Dup => (1, 0),
            DupX1 => (1, 1),
            DupX2 => (1, 2),
            Dup2 => (2, 0),
            Dup2X1 => (2, 1),
            Dup2X2 => (2, 2),
            other => {
                return Err(StackError::BadOperand { mnemonic: other, reason: "not a stack shuffle".to_string() })
            }
        };
        let top = self.take_slots(mnemonic, copied)?;
        let below = self.take_slots(mnemonic, skipped)?;
        self.push_all(&top)?;
        self.push_all(&below)?;
        self.push_all(&top)
    }

    fn resolve(
        mnemonic: Mnemonic,
        effect: Effect,
        operand: Option<(&Constant, &ConstantPool)>,
    ) -> StackResult<Vec<OperandType>> {
        match effect {
            Effect::Fixed(types) => Ok(types.to_vec()),
            Effect::FromOperand(f) => {
                let (constant, pool) = operand.ok_or_else(|| StackError::BadOperand {
                    mnemonic,
                    reason: "missing constant pool operand".to_string(),
                })?;
                f(constant, pool).map_err(|reason| StackError::BadOperand { mnemonic, reason })
            }
            Effect::Shuffle => Ok(Vec::new()),
        }
    }

    /// Apply an instruction's stack effect.
    ///
    /// `operand` is the constant pool entry for instructions whose effect
    /// depends on it.
    pub fn apply(&mut self, mnemonic: Mnemonic, operand: Option<(&Constant, &ConstantPool)>) -> StackResult<()> {
        let descriptor = mnemonic.descriptor();
        if let Effect::Shuffle = descriptor.inputs {
            return self.shuffle(mnemonic);
        }
        let inputs = Self::resolve(mnemonic, descriptor.inputs, operand)?;
        let outputs = Self::resolve(mnemonic, descriptor.outputs, operand)?;
        if total_width(&inputs) > self.width {
            return Err(StackError::Underflow { mnemonic, needed: total_width(&inputs), found: self.width });
        }
        for &expected in inputs.iter().rev() {
            self.pop(mnemonic, expected)?;
        }
        self.push_all(&outputs)
    }

    /// Record a reference to local slot `index` holding a value of `ty`
    pub fn touch_local(&mut self, index: usize, ty: OperandType) -> StackResult<()> {
        let end = index + ty.width();
        if end > MAX_SLOTS {
            return Err(StackError::LocalIndexOutOfBounds { index });
        }
        self.max_locals = self.max_locals.max(end);
        Ok(())
    }

    /// Save the current shape as the one in effect at a branch target
    pub fn save_branch(&mut self) {
        self.snapshots.push(self.values.clone());
    }

    /// The next instruction is only reachable through a jump
    pub fn mark_unreachable(&mut self) {
        self.unreachable = true;
    }

    /// Pop the most recent branch snapshot and make it the current shape.
    ///
    /// When the code before the merge point can fall through, its shape must
    /// agree with the snapshot.
    pub fn end_branch(&mut self) -> StackResult<()> {
        let snapshot = self.snapshots.pop().ok_or(StackError::UnbalancedBranch)?;
        if !self.unreachable && !same_shape(&self.values, &snapshot) {
            return Err(StackError::MergeMismatch { expected: snapshot, found: self.values.clone() });
        }
        self.restore(snapshot);
        Ok(())
    }

    /// Replace the current shape, e.g. at a label reached only by jumps
    pub fn restore(&mut self, shape: Vec<OperandType>) {
        self.width = total_width(&shape);
        self.max_width = self.max_width.max(self.width);
        self.values = shape;
        self.unreachable = false;
    }
}

/// Whether two stack shapes are interchangeable at a merge point
pub fn same_shape(a: &[OperandType], b: &[OperandType]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.unifies_with(*y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use OperandType::{Integer as I, Long as J, Reference as A};

    fn stack(types: &[OperandType]) -> SymbolicStack {
        let mut s = SymbolicStack::new();
        for &ty in types {
            s.push(ty).unwrap();
        }
        s
    }

    #[test]
    fn dup2_x2_moves_int_pair_behind_long() {
        let mut s = stack(&[J, A, I]);
        s.apply(Mnemonic::Dup2X2, None).unwrap();
        assert_eq!(s.shape(), &[A, I, J, A, I]);
        assert_eq!(s.max_width(), 6);
    }

    #[test]
    fn dup_x2_over_a_long() {
        let mut s = stack(&[J, I]);
        s.apply(Mnemonic::DupX2, None).unwrap();
        assert_eq!(s.shape(), &[I, J, I]);
    }

    #[test]
    fn dup_rejects_wide_value() {
        let mut s = stack(&[J]);
        assert!(matches!(s.apply(Mnemonic::Dup, None), Err(StackError::SplitWideValue { .. })));
    }

    #[test]
    fn type_mismatch_is_reported() {
        let mut s = stack(&[I, I]);
        let err = s.apply(Mnemonic::Ladd, None).unwrap_err();
        assert!(matches!(err, StackError::Underflow { .. } | StackError::TypeMismatch { .. }));
        let mut s = stack(&[J, I, I]);
        assert!(matches!(s.apply(Mnemonic::Ladd, None), Err(StackError::TypeMismatch { .. })));
    }

    #[test]
    fn locals_track_wide_values() {
        let mut s = SymbolicStack::with_locals(1);
        s.touch_local(3, J).unwrap();
        assert_eq!(s.max_locals(), 5);
        s.touch_local(0, A).unwrap();
        assert_eq!(s.max_locals(), 5);
    }

    #[test]
    fn end_branch_checks_fallthrough_shape() {
        let mut s = stack(&[J]);
        s.save_branch();
        s.push(I).unwrap();
        assert!(matches!(s.end_branch(), Err(StackError::MergeMismatch { .. })));

        let mut s = stack(&[J]);
        s.save_branch();
        s.push(I).unwrap();
        s.mark_unreachable();
        s.end_branch().unwrap();
        assert_eq!(s.shape(), &[J]);
        assert!(s.is_reachable());
        assert!(matches!(s.end_branch(), Err(StackError::UnbalancedBranch)));
    }
}
