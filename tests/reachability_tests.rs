mod common;

use common::{call, intrinsic, push, ProgramBuilder};
use stackjvm::codegen::reachability::{reachable_procedures, CallGraph, ENTRY_POINT};
use stackjvm::codegen::generate;
use stackjvm::ir::Intrinsic;
use stackjvm::Config;

#[test]
fn never_called_procedure_is_dropped() {
    let mut builder = ProgramBuilder::new();
    let used = builder.procedure("used", 0, 1, 0, vec![push(1)]);
    builder.procedure("unused", 0, 0, 0, vec![]);
    builder.ops(vec![call(used), intrinsic(Intrinsic::Print)]);
    let program = builder.build();

    assert_eq!(reachable_procedures(&program), vec!["used".to_string()]);

    let generated = generate(&program, &Config::default()).unwrap();
    let methods = generated.class.method_signatures();
    assert!(methods.iter().any(|(name, _)| name == "used"));
    assert!(!methods.iter().any(|(name, _)| name == "unused"));
}

#[test]
fn mutual_recursion_reached_from_entry_is_kept() {
    let mut builder = ProgramBuilder::new();
    // ping occupies ops 0..=3, so pong starts at 5
    let ping = builder.procedure("ping", 0, 0, 0, vec![call(5)]);
    let pong = builder.procedure("pong", 0, 0, 0, vec![call(ping)]);
    assert_eq!(pong, 5);
    builder.ops(vec![call(ping)]);
    let program = builder.build();

    assert_eq!(reachable_procedures(&program), vec!["ping".to_string(), "pong".to_string()]);
    let graph = CallGraph::build(&program);
    assert_eq!(graph.callers_of("ping"), &["pong".to_string(), ENTRY_POINT.to_string()]);
}

#[test]
fn isolated_cycle_is_dead() {
    let mut builder = ProgramBuilder::new();
    let ping = builder.procedure("ping", 0, 0, 0, vec![call(5)]);
    builder.procedure("pong", 0, 0, 0, vec![call(ping)]);
    builder.ops(vec![push(0), intrinsic(Intrinsic::Print)]);
    let program = builder.build();

    assert!(reachable_procedures(&program).is_empty());
    assert_eq!(CallGraph::build(&program).callers_of("pong"), &["ping".to_string()]);
}

#[test]
fn transitive_callees_are_live() {
    let mut builder = ProgramBuilder::new();
    let leaf = builder.procedure("leaf", 0, 1, 0, vec![push(3)]);
    let middle = builder.procedure("middle", 0, 1, 0, vec![call(leaf)]);
    builder.procedure("orphan", 0, 1, 0, vec![call(leaf)]);
    builder.ops(vec![call(middle), intrinsic(Intrinsic::Print)]);
    let live = reachable_procedures(&builder.build());
    assert_eq!(live, vec!["middle".to_string(), "leaf".to_string()]);
}
