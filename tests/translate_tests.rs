mod common;

use common::{call, init_logger, intrinsic, op, program, push, push_str, Machine, ProgramBuilder, Value};
use stackjvm::codegen::constpool::Constant;
use stackjvm::codegen::opcodes::Mnemonic;
use stackjvm::codegen::{generate, CodeGenError, Generated};
use stackjvm::ir::{Intrinsic, OpKind, Operand, Program};
use stackjvm::{compile, Config, Error, SyscallFallback};

fn generate_default(program: &Program) -> Generated {
    generate(program, &Config::default()).unwrap()
}

fn count(generated: &Generated, method: &str, mnemonic: Mnemonic) -> usize {
    let class = &generated.class;
    let (_, descriptor) = class
        .method_signatures()
        .into_iter()
        .find(|(name, _)| name == method)
        .unwrap();
    class
        .method(method, &descriptor)
        .unwrap()
        .code
        .instructions()
        .filter(|insn| insn.mnemonic == mnemonic)
        .count()
}

fn has_utf8(generated: &Generated, value: &str) -> bool {
    generated
        .class
        .constant_pool
        .iter()
        .any(|(_, constant)| matches!(constant, Constant::Utf8(s) if s == value))
}

#[test]
fn addition_and_print_need_two_cells() {
    let generated = generate_default(&program(vec![
        push(2),
        push(3),
        intrinsic(Intrinsic::Plus),
        intrinsic(Intrinsic::Print),
    ]));
    let main = generated.class.method("main", "([Ljava/lang/String;)V").unwrap();
    assert_eq!(main.code.max_stack, 4);
    assert_eq!(count(&generated, "main", Mnemonic::Ladd), 1);
    assert!(generated.diagnostics.is_empty());
}

#[test]
fn multi_output_call_unpacks_every_cell() {
    init_logger();
    let mut builder = ProgramBuilder::new();
    let pair = builder.procedure("pair", 1, 2, 0, vec![intrinsic(Intrinsic::Dup)]);
    builder.ops(vec![push(7), call(pair), intrinsic(Intrinsic::Plus), intrinsic(Intrinsic::Print)]);
    let generated = generate_default(&builder.build());

    assert!(generated.class.method("pair", "(J)[J").is_some());
    assert_eq!(count(&generated, "main", Mnemonic::Laload), 2);
    assert_eq!(count(&generated, "pair", Mnemonic::Lastore), 2);
    assert_eq!(generated.live, vec!["pair".to_string()]);
}

#[test]
fn multi_output_call_returns_cells_in_source_order() {
    let mut builder = ProgramBuilder::new();
    let pair = builder.procedure("pair", 0, 2, 0, vec![push(10), push(20)]);
    let triple = builder.procedure("triple", 1, 3, 0, vec![push(2), push(3)]);
    builder.ops(vec![call(pair), push(1), call(triple)]);
    let generated = generate_default(&builder.build());

    let mut machine = Machine::new(&generated.class, &["prepare_argv", "prepare_envp"]);
    let stack = machine.run("main", "([Ljava/lang/String;)V", &[Value::Array(usize::MAX)]);
    let cells: Vec<Value> = [10, 20, 1, 2, 3].into_iter().map(Value::Long).collect();
    assert_eq!(stack, cells);
}

#[test]
fn repeated_string_literal_is_interned_once() {
    let pop = || intrinsic(Intrinsic::Drop);
    let generated = generate_default(&program(vec![
        push_str("hi"),
        pop(),
        pop(),
        push_str("yo"),
        pop(),
        pop(),
        push_str("hi"),
        pop(),
        pop(),
    ]));
    assert!(has_utf8(&generated, "hiyo"));
    assert!(!has_utf8(&generated, "hiyohi"));
    // only "yo" sits past the start of the blob
    assert_eq!(count(&generated, "main", Mnemonic::Ladd), 1);
    assert_eq!(count(&generated, "<clinit>", Mnemonic::Putstatic), 3);
}

#[test]
fn here_pushes_the_source_location() {
    let generated = generate_default(&program(vec![
        intrinsic(Intrinsic::Here),
        intrinsic(Intrinsic::Drop),
        intrinsic(Intrinsic::Drop),
    ]));
    assert!(has_utf8(&generated, "test.porth:1:1"));
}

#[test]
fn c_strings_are_nul_terminated() {
    let generated = generate_default(&program(vec![
        op(OpKind::PushCStr, Operand::String("ls".to_string())),
        intrinsic(Intrinsic::Drop),
    ]));
    assert!(has_utf8(&generated, "ls\0"));
}

fn unsupported_syscall() -> Program {
    program(vec![
        push(1),
        push(2),
        push(3),
        push(4),
        push(999),
        intrinsic(Intrinsic::Syscall4),
        intrinsic(Intrinsic::Drop),
    ])
}

#[test]
fn syscall_fallback_allow_is_silent() {
    let config = Config::new().with_syscall_fallback(SyscallFallback::Allow);
    let generated = generate(&unsupported_syscall(), &config).unwrap();
    assert!(generated.diagnostics.is_empty());
    assert_eq!(count(&generated, "main", Mnemonic::Pop2), 6);
}

#[test]
fn syscall_fallback_warn_reports_a_diagnostic() {
    init_logger();
    let config = Config::new().with_syscall_fallback(SyscallFallback::Warn);
    let compilation = compile(&unsupported_syscall(), &config).unwrap();
    assert_eq!(compilation.diagnostics.len(), 1);
    assert!(compilation.diagnostics[0].message.contains("999"));
    assert_eq!(compilation.diagnostics[0].to_string().split(':').next(), Some("test.porth"));
}

#[test]
fn syscall_fallback_deny_aborts() {
    let config = Config::new().with_syscall_fallback(SyscallFallback::Deny);
    let err = compile(&unsupported_syscall(), &config).unwrap_err();
    assert!(matches!(
        err,
        Error::CodeGen(CodeGenError::UnsupportedSyscall { number: Some(999), arity: 4, .. })
    ));
}

#[test]
fn unknown_number_in_a_trap_table_arity_is_reported() {
    let generated = generate_default(&program(vec![push(5), push(12345), intrinsic(Intrinsic::Syscall1)]));
    assert_eq!(generated.diagnostics.len(), 1);
}

#[test]
fn implemented_syscall_goes_through_the_trap_table() {
    let generated = generate_default(&program(vec![
        push_str("hi\n"),
        push(1),
        push(1),
        intrinsic(Intrinsic::Syscall3),
        intrinsic(Intrinsic::Drop),
    ]));
    assert!(generated.diagnostics.is_empty());
}

#[test]
fn call_to_missing_procedure_fails() {
    let err = generate(&program(vec![call(42)]), &Config::default()).unwrap_err();
    assert!(matches!(err, CodeGenError::UnknownProcedure { address: 42, .. }));
}

#[test]
fn conditionals_and_loops_translate() {
    // 0 while dup 10 < do 1 + end print
    let mut ops = vec![
        push(0),
        op(OpKind::While, Operand::None),
        intrinsic(Intrinsic::Dup),
        push(10),
        intrinsic(Intrinsic::Lt),
        op(OpKind::Do, Operand::Address(9)),
        push(1),
        intrinsic(Intrinsic::Plus),
        op(OpKind::End, Operand::Address(1)),
        intrinsic(Intrinsic::Print),
    ];
    let generated = generate_default(&program(ops.clone()));
    assert!(count(&generated, "main", Mnemonic::Goto) >= 2);

    // 0 if 1 else 2 end print
    ops.truncate(1);
    ops.extend([
        op(OpKind::If, Operand::Address(4)),
        push(1),
        op(OpKind::Else, Operand::Address(5)),
        push(2),
        op(OpKind::End, Operand::Address(6)),
        intrinsic(Intrinsic::Print),
    ]);
    let generated = generate_default(&program(ops));
    assert_eq!(count(&generated, "main", Mnemonic::Ifeq), 1);
}
