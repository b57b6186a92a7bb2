use stackjvm::codegen::constpool::ConstantPool;
use stackjvm::codegen::error::StackError;
use stackjvm::codegen::opcodes::Mnemonic;
use stackjvm::codegen::operand::OperandType::{self, Byte, Integer as I, Long as J, Reference as A};
use stackjvm::codegen::stack::SymbolicStack;

fn apply(stack: &mut SymbolicStack, mnemonics: &[Mnemonic]) -> Result<(), StackError> {
    for &mnemonic in mnemonics {
        stack.apply(mnemonic, None)?;
    }
    Ok(())
}

#[test]
fn widths_follow_operand_types() {
    let widths: Vec<usize> = [A, I, J, OperandType::Double, OperandType::Float, Byte].iter().map(|t| t.width()).collect();
    assert_eq!(widths, vec![1, 1, 2, 2, 1, 1]);
}

#[test]
fn max_width_tracks_the_peak() {
    let mut stack = SymbolicStack::new();
    apply(&mut stack, &[Mnemonic::Lconst1, Mnemonic::Lconst1, Mnemonic::Ladd, Mnemonic::Iconst0]).unwrap();
    assert_eq!(stack.width(), 3);
    assert_eq!(stack.max_width(), 4);
    assert_eq!(stack.shape(), &[J, I]);
}

#[test]
fn integer_family_unifies() {
    let mut stack = SymbolicStack::new();
    stack.push(Byte).unwrap();
    stack.push(OperandType::Boolean).unwrap();
    assert!(apply(&mut stack, &[Mnemonic::Iadd]).is_ok());
    assert_eq!(stack.shape(), &[I]);
}

#[test]
fn long_where_int_expected_is_a_mismatch() {
    let mut stack = SymbolicStack::new();
    apply(&mut stack, &[Mnemonic::Lconst0, Mnemonic::Iconst1]).unwrap();
    let err = apply(&mut stack, &[Mnemonic::Iadd]).unwrap_err();
    assert!(matches!(err, StackError::TypeMismatch { expected: I, found: J, .. }));
}

#[test]
fn underflow_is_reported() {
    let mut stack = SymbolicStack::new();
    let err = apply(&mut stack, &[Mnemonic::Pop]).unwrap_err();
    assert!(matches!(err, StackError::Underflow { .. }));
}

#[test]
fn pop_cannot_split_a_long() {
    let mut stack = SymbolicStack::new();
    apply(&mut stack, &[Mnemonic::Lconst0]).unwrap();
    let err = apply(&mut stack, &[Mnemonic::Pop]).unwrap_err();
    assert!(matches!(err, StackError::SplitWideValue { .. }));
}

#[test]
fn pop2_drops_one_long_or_two_ints() {
    let mut stack = SymbolicStack::new();
    apply(&mut stack, &[Mnemonic::Lconst0, Mnemonic::Iconst0, Mnemonic::Iconst1, Mnemonic::Pop2]).unwrap();
    assert_eq!(stack.shape(), &[J]);
    apply(&mut stack, &[Mnemonic::Pop2]).unwrap();
    assert_eq!(stack.depth(), 0);
}

#[test]
fn swap_of_two_longs_via_dup2_x2() {
    let mut stack = SymbolicStack::new();
    stack.push(J).unwrap();
    stack.push(A).unwrap();
    stack.push(A).unwrap();
    apply(&mut stack, &[Mnemonic::Pop2, Mnemonic::Lconst1, Mnemonic::Dup2X2, Mnemonic::Pop2]).unwrap();
    assert_eq!(stack.shape(), &[J, J]);
    assert_eq!(stack.max_width(), 6);
}

#[test]
fn branch_snapshot_restores_the_shape() {
    let mut stack = SymbolicStack::new();
    stack.push(J).unwrap();
    stack.save_branch();
    stack.push(I).unwrap();
    stack.mark_unreachable();
    stack.end_branch().unwrap();
    assert_eq!(stack.shape(), &[J]);
    assert!(stack.is_reachable());
    assert!(matches!(stack.end_branch(), Err(StackError::UnbalancedBranch)));
}

#[test]
fn locals_count_two_slots_for_longs() {
    let mut stack = SymbolicStack::with_locals(1);
    stack.touch_local(3, J).unwrap();
    assert_eq!(stack.max_locals(), 5);
}

#[test]
fn field_operand_decides_the_pushed_type() {
    let mut pool = ConstantPool::new();
    let field = pool.field_ref("Main", "memory", "[B");
    let mut stack = SymbolicStack::new();
    stack.apply(Mnemonic::Getstatic, Some((pool.get(field).unwrap(), &pool))).unwrap();
    assert_eq!(stack.shape(), &[A]);
}
