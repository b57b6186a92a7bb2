use stackjvm::codegen::constpool::{Constant, ConstantPool};
use stackjvm::codegen::error::ConstPoolError;

#[test]
fn interning_twice_returns_the_same_index() {
    let mut pool = ConstantPool::new();
    let (first, inserted) = pool.intern(Constant::Utf8("foo".to_string()));
    assert!(inserted);
    let size = pool.len();
    let (second, inserted) = pool.intern(Constant::Utf8("foo".to_string()));
    assert!(!inserted);
    assert_eq!(first, second);
    assert_eq!(pool.len(), size);
}

#[test]
fn indices_start_at_one() {
    let mut pool = ConstantPool::new();
    assert_eq!(pool.utf8("a"), 1);
    assert_eq!(pool.get(0), None);
}

#[test]
fn long_and_double_take_two_slots() {
    let mut pool = ConstantPool::new();
    pool.utf8("before");
    for constant in [Constant::Long(1 << 40), Constant::Double(2.5)] {
        let before = pool.len() as u16 + 1;
        let (index, _) = pool.intern(constant);
        assert_eq!(index, before);
        assert_eq!(pool.len() as u16 + 1 - index, 2);
        assert!(pool.is_padding(index + 1));
        assert_eq!(pool.get(index + 1), None);
    }
    // the next entry lands after the padding
    let next = pool.utf8("after");
    assert!(pool.get(next - 1).is_none());
}

#[test]
fn composite_references_deduplicate_independently_built_copies() {
    let mut pool = ConstantPool::new();
    let a = pool.method_ref("java/io/PrintStream", "println", "(J)V");
    let size = pool.len();
    let b = pool.method_ref("java/io/PrintStream", "println", "(J)V");
    assert_eq!(a, b);
    assert_eq!(pool.len(), size);

    // components were shared with other entries
    let class = pool.class("java/io/PrintStream");
    let name = pool.utf8("println");
    assert_eq!(pool.len(), size);
    let member = pool.member_at(a).unwrap();
    assert_eq!(member.class, Some("java/io/PrintStream"));
    assert_eq!(member.name, "println");
    assert!(class < a && name < a);
}

#[test]
fn field_and_method_refs_are_distinct() {
    let mut pool = ConstantPool::new();
    let field = pool.field_ref("Main", "x", "J");
    let method = pool.method_ref("Main", "x", "J");
    assert_ne!(field, method);
    assert!(matches!(pool.get(field), Some(Constant::FieldRef(..))));
    assert!(matches!(pool.get(method), Some(Constant::MethodRef(..))));
}

#[test]
fn equal_integer_and_float_bits_stay_apart() {
    let mut pool = ConstantPool::new();
    let int = pool.integer(0);
    let float = pool.float(0.0);
    assert_ne!(int, float);
}

#[test]
fn oversized_utf8_fails_validation() {
    let mut pool = ConstantPool::new();
    pool.utf8(&"x".repeat(70_000));
    assert!(matches!(pool.validate(), Err(ConstPoolError::Utf8TooLong { .. })));
}

#[test]
fn serialized_count_includes_padding() {
    let mut pool = ConstantPool::new();
    pool.long(7);
    pool.utf8("a");
    let bytes = pool.to_bytes();
    // three slots plus the unused index 0
    assert_eq!(&bytes[..2], &[0, 4]);
}
