mod common;

use common::{intrinsic, program, push};
use stackjvm::codegen::error::{CodeGenError, ConstPoolError};
use stackjvm::ir::{Intrinsic, Location, Program};
use stackjvm::{
    compile, compile_to_path, compile_with_listing, listing, load_program, write_class, Config, Error, SyscallFallback,
};
use tempfile::TempDir;

fn hello() -> Program {
    program(vec![push(2), push(3), intrinsic(Intrinsic::Plus), intrinsic(Intrinsic::Print)])
}

#[test]
fn class_file_header_targets_java_5() {
    let compilation = compile(&hello(), &Config::default()).unwrap();
    assert_eq!(&compilation.bytes[..8], &[0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x31]);
    assert_eq!(compilation.class_name, "Main");
}

#[test]
fn methods_are_emitted_in_a_fixed_order() {
    let compilation = compile(&hello(), &Config::default()).unwrap();
    let names: Vec<&str> = compilation.methods.iter().map(|(name, _)| name.as_str()).collect();
    let main = names.iter().position(|name| *name == "main").unwrap();
    assert_eq!(names.last(), Some(&"<clinit>"));
    assert_eq!(main, names.len() - 2);
    assert!(names.contains(&"extend_mem"));
    assert!(names.contains(&"syscall3"));
    assert!(names.contains(&"load_64"));
}

#[test]
fn compile_to_path_writes_the_class() {
    let dir = TempDir::new().unwrap();
    let config = Config::new().with_class_name("Hello");
    let (compilation, path) = compile_to_path(&hello(), &config, dir.path()).unwrap();
    assert_eq!(path, dir.path().join("Hello.class"));
    assert_eq!(std::fs::read(&path).unwrap(), compilation.bytes);
}

#[test]
fn failed_compilation_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let config = Config::new().with_syscall_fallback(SyscallFallback::Deny);
    let failing = program(vec![push(0), push(1000), intrinsic(Intrinsic::Syscall1)]);
    assert!(compile_to_path(&failing, &config, dir.path()).is_err());
    assert!(!dir.path().join("Main.class").exists());
}

#[test]
fn invalid_class_name_is_a_config_error() {
    let config = Config::new().with_class_name("org.example.Main");
    assert!(matches!(compile(&hello(), &config), Err(Error::Config { .. })));
}

#[test]
fn source_file_attribute_is_recorded() {
    let config = Config::new().with_source_file("hello.porth");
    let compilation = compile(&hello(), &config).unwrap();
    let needle = b"hello.porth";
    assert!(compilation.bytes.windows(needle.len()).any(|window| window == needle));
}

fn contains(bytes: &[u8], needle: &str) -> bool {
    bytes.windows(needle.len()).any(|window| window == needle.as_bytes())
}

#[test]
fn source_file_defaults_to_the_first_operation() {
    let located: Vec<_> =
        hello().ops.into_iter().map(|op| op.at(Location::new("test.porth", 1, 1))).collect();
    let program = program(located);

    let compilation = compile(&program, &Config::default()).unwrap();
    assert!(contains(&compilation.bytes, "SourceFile"));
    assert!(contains(&compilation.bytes, "test.porth"));

    let explicit = compile(&program, &Config::new().with_source_file("other.porth")).unwrap();
    assert!(contains(&explicit.bytes, "other.porth"));
    assert!(!contains(&explicit.bytes, "test.porth"));

    assert!(!contains(&compile(&hello(), &Config::default()).unwrap().bytes, "SourceFile"));
}

#[test]
fn programs_load_from_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hello.json");
    std::fs::write(&path, hello().to_json().unwrap()).unwrap();
    assert_eq!(load_program(&path).unwrap(), hello());
}

#[test]
fn malformed_json_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ \"ops\": [").unwrap();
    assert!(matches!(load_program(&path), Err(Error::Json(_))));
}

#[test]
fn listing_shows_every_method() {
    let text = listing(&hello(), &Config::default()).unwrap();
    assert!(text.contains("main([Ljava/lang/String;)V"));
    assert!(text.contains("<clinit>()V"));
    assert!(text.contains("ladd"));
}

#[test]
fn listing_comes_from_the_compiled_class() {
    let dir = TempDir::new().unwrap();
    let (compilation, text) = compile_with_listing(&hello(), &Config::default()).unwrap();
    assert_eq!(text, listing(&hello(), &Config::default()).unwrap());
    assert_eq!(compilation.bytes, compile(&hello(), &Config::default()).unwrap().bytes);

    let path = write_class(&compilation, dir.path()).unwrap();
    assert_eq!(path, dir.path().join("Main.class"));
    assert_eq!(std::fs::read(&path).unwrap(), compilation.bytes);
}

#[test]
fn constant_pool_overflow_is_reported() {
    let mut ops = Vec::new();
    for i in 0..40_000 {
        ops.push(push((1 << 40) + i));
        ops.push(intrinsic(Intrinsic::Drop));
    }
    let program = program(ops);
    let err = compile(&program, &Config::default()).unwrap_err();
    assert!(
        matches!(err, Error::CodeGen(CodeGenError::ConstPool(ConstPoolError::OutOfSpace { .. }))),
        "unexpected error: {:?}",
        err
    );
    assert!(listing(&program, &Config::default()).is_err());
}
