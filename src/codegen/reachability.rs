//! Dead procedure elimination over the IR call graph

use std::collections::{HashMap, HashSet, VecDeque};

use log::debug;

use crate::ir::{OpKind, Program};

/// Caller recorded for call sites outside every procedure body
pub const ENTRY_POINT: &str = "<entry>";

/// Call edges found in a program, keyed callee to callers
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    /// Procedures in declaration order
    procedures: Vec<String>,
    callers: HashMap<String, Vec<String>>,
}

impl CallGraph {
    /// Scan the op stream once, attributing every call to the enclosing body
    pub fn build(program: &Program) -> Self {
        let mut graph = CallGraph {
            procedures: program.procedures.iter().map(|proc| proc.name.clone()).collect(),
            callers: HashMap::new(),
        };
        let by_address = program.procedures_by_address();
        let mut current: Option<&str> = None;
        for (ip, op) in program.ops.iter().enumerate() {
            match op.kind {
                OpKind::SkipProc => {
                    current = by_address.get(&(ip + 1)).map(|proc| proc.name.as_str());
                }
                OpKind::PrepProc => {
                    if let Some(proc) = by_address.get(&ip) {
                        current = Some(proc.name.as_str());
                    }
                }
                OpKind::Ret => current = None,
                OpKind::Call => {
                    let Some(callee) = op.address().and_then(|address| by_address.get(&address)) else {
                        continue;
                    };
                    let caller = current.unwrap_or(ENTRY_POINT).to_string();
                    let callers = graph.callers.entry(callee.name.clone()).or_default();
                    if !callers.contains(&caller) {
                        callers.push(caller);
                    }
                }
                _ => {}
            }
        }
        graph
    }

    pub fn callers_of(&self, name: &str) -> &[String] {
        self.callers.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Procedures transitively called from the entry point, in discovery order.
    ///
    /// Liveness propagates forward from [`ENTRY_POINT`] over the reversed
    /// edges, so a cycle whose members only call each other stays dead.
    pub fn reachable(&self) -> Vec<String> {
        let mut callees: HashMap<&str, Vec<&str>> = HashMap::new();
        for name in &self.procedures {
            for caller in self.callers_of(name) {
                callees.entry(caller.as_str()).or_default().push(name.as_str());
            }
        }
        let mut order = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::from([ENTRY_POINT]);
        while let Some(node) = queue.pop_front() {
            for &callee in callees.get(node).map(Vec::as_slice).unwrap_or(&[]) {
                if seen.insert(callee) {
                    order.push(callee.to_string());
                    queue.push_back(callee);
                }
            }
        }
        order
    }
}

/// Names of the procedures a program can actually call
pub fn reachable_procedures(program: &Program) -> Vec<String> {
    let live = CallGraph::build(program).reachable();
    debug!(
        "reachability: {} of {} procedures live: {:?}",
        live.len(),
        program.procedures.len(),
        live
    );
    live
}
