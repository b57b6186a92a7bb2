// Common test utilities
#![allow(dead_code)]

use std::collections::HashMap;

use stackjvm::codegen::class::ClassFile;
use stackjvm::codegen::code::{Code, Instruction, Item, Operands};
use stackjvm::codegen::constpool::{Constant, ConstantPool};
use stackjvm::codegen::opcodes::Mnemonic;
use stackjvm::ir::{Contract, Intrinsic, Location, Op, OpKind, Operand, Procedure, Program};

pub fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

// IR construction

pub fn op(kind: OpKind, operand: Operand) -> Op {
    Op::new(kind, operand).at(Location::new("test.porth", 1, 1))
}

pub fn push(value: i64) -> Op {
    op(OpKind::PushInt, Operand::Integer(value))
}

pub fn push_str(value: &str) -> Op {
    op(OpKind::PushStr, Operand::String(value.to_string()))
}

pub fn intrinsic(intrinsic: Intrinsic) -> Op {
    op(OpKind::Intrinsic(intrinsic), Operand::None)
}

pub fn call(address: usize) -> Op {
    op(OpKind::Call, Operand::Address(address))
}

pub fn program(ops: Vec<Op>) -> Program {
    Program { ops, procedures: Vec::new(), memory_capacity: 0 }
}

/// Incrementally lays out procedures and top-level code with correct addresses
#[derive(Default)]
pub struct ProgramBuilder {
    program: Program,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn here(&self) -> usize {
        self.program.ops.len()
    }

    pub fn ops(&mut self, ops: impl IntoIterator<Item = Op>) -> &mut Self {
        self.program.ops.extend(ops);
        self
    }

    /// Define a procedure around `body`, returning its address
    pub fn procedure(&mut self, name: &str, ins: usize, outs: usize, local_memory: usize, body: Vec<Op>) -> usize {
        let skip = self.here();
        let address = skip + 1;
        let ret = address + 1 + body.len();
        self.program.ops.push(op(OpKind::SkipProc, Operand::Address(ret + 1)));
        self.program.ops.push(op(OpKind::PrepProc, Operand::Integer(local_memory as i64)));
        self.program.ops.extend(body);
        self.program.ops.push(op(OpKind::Ret, Operand::Integer(local_memory as i64)));
        self.program.procedures.push(Procedure {
            name: name.to_string(),
            address,
            local_memory,
            contract: Contract::cells(ins, outs),
        });
        address
    }

    pub fn memory(&mut self, capacity: usize) -> &mut Self {
        self.program.memory_capacity = capacity;
        self
    }

    pub fn build(&self) -> Program {
        self.program.clone()
    }
}

// Independent stack replay

/// Slots taken by a field or method descriptor element list, and the return width
fn descriptor_slots(descriptor: &str) -> (usize, usize) {
    let (params, ret) = match descriptor.strip_prefix('(').and_then(|rest| rest.split_once(')')) {
        Some((params, ret)) => (params, ret),
        None => ("", descriptor),
    };
    let mut slots = 0;
    let mut chars = params.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            'J' | 'D' => slots += 2,
            '[' => {
                while chars.peek() == Some(&'[') {
                    chars.next();
                }
                if chars.next() == Some('L') {
                    for c in chars.by_ref() {
                        if c == ';' {
                            break;
                        }
                    }
                }
                slots += 1;
            }
            'L' => {
                for c in chars.by_ref() {
                    if c == ';' {
                        break;
                    }
                }
                slots += 1;
            }
            _ => slots += 1,
        }
    }
    let ret = match ret {
        "V" => 0,
        "J" | "D" => 2,
        _ => 1,
    };
    (slots, ret)
}

fn member_descriptor(pool: &ConstantPool, index: u16) -> String {
    let member = pool.member_at(index).expect("member reference");
    member.descriptor.to_string()
}

fn value_slots(descriptor: &str) -> usize {
    if descriptor.starts_with(['J', 'D']) {
        2
    } else {
        1
    }
}

/// Slots `(popped, pushed)` by one instruction, derived from its name
fn slot_effect(mnemonic: Mnemonic, operands: &Operands, pool: &ConstantPool) -> (usize, usize) {
    let name = mnemonic.name();
    let member = || member_descriptor(pool, operands.constant().expect("constant operand"));
    match name {
        "nop" | "goto" | "goto_w" | "return" | "iinc" => (0, 0),
        "aconst_null" | "bipush" | "sipush" | "ldc" | "ldc_w" | "new" => (0, 1),
        "ldc2_w" => (0, 2),
        "arraylength" | "newarray" | "anewarray" | "checkcast" | "ineg" | "i2b" => (1, 1),
        "lneg" | "swap" => (2, 2),
        "pop" => (1, 0),
        "pop2" => (2, 0),
        "dup" => (1, 2),
        "dup_x1" => (2, 3),
        "dup_x2" => (3, 4),
        "dup2" => (2, 4),
        "dup2_x1" => (3, 5),
        "dup2_x2" => (4, 6),
        "i2l" => (1, 2),
        "l2i" => (2, 1),
        "lcmp" => (4, 1),
        "lshl" | "lshr" | "lushr" => (3, 2),
        "laload" => (2, 2),
        "baload" | "iaload" | "aaload" | "caload" | "saload" => (2, 1),
        "lastore" => (4, 0),
        "bastore" | "iastore" | "aastore" | "castore" | "sastore" => (3, 0),
        "ireturn" | "areturn" | "athrow" => (1, 0),
        "lreturn" => (2, 0),
        "ifnull" | "ifnonnull" | "tableswitch" | "lookupswitch" => (1, 0),
        "getstatic" => (0, value_slots(&member())),
        "putstatic" => (value_slots(&member()), 0),
        "invokestatic" | "invokevirtual" | "invokespecial" | "invokeinterface" => {
            let (params, ret) = descriptor_slots(&member());
            let receiver = usize::from(name != "invokestatic");
            (params + receiver, ret)
        }
        _ if name.starts_with("if_icmp") || name.starts_with("if_acmp") => (2, 0),
        _ if name.starts_with("if") => (1, 0),
        _ if name.starts_with("iconst") => (0, 1),
        _ if name.starts_with("lconst") => (0, 2),
        _ if name.starts_with("iload") || name.starts_with("aload") => (0, 1),
        _ if name.starts_with("lload") => (0, 2),
        _ if name.starts_with("istore") || name.starts_with("astore") => (1, 0),
        _ if name.starts_with("lstore") => (2, 0),
        // remaining two-operand arithmetic
        _ if name.starts_with('l') => (4, 2),
        _ if name.starts_with('i') => (2, 1),
        other => panic!("replay does not know {}", other),
    }
}

/// Peak operand stack depth over every path through `code`, computed without
/// the builder's type model
pub fn replay_peak(code: &Code, pool: &ConstantPool) -> usize {
    let labels: HashMap<_, _> = code
        .items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| match item {
            Item::Label(label) => Some((label.clone(), i)),
            Item::Instruction(_) => None,
        })
        .collect();
    let mut depth_at: HashMap<usize, usize> = HashMap::new();
    let mut work = vec![(0usize, 0usize)];
    let mut peak = 0;
    while let Some((at, depth)) = work.pop() {
        if at >= code.items.len() {
            continue;
        }
        if let Some(&seen) = depth_at.get(&at) {
            assert_eq!(seen, depth, "inconsistent depth at item {}", at);
            continue;
        }
        depth_at.insert(at, depth);
        let insn = match &code.items[at] {
            Item::Label(_) => {
                work.push((at + 1, depth));
                continue;
            }
            Item::Instruction(insn) => insn,
        };
        let (pops, pushes) = slot_effect(insn.mnemonic, &insn.operands, pool);
        assert!(depth >= pops, "{} underflows at item {}", insn.mnemonic, at);
        let after = depth - pops + pushes;
        peak = peak.max(depth).max(after);
        for target in insn.operands.targets() {
            work.push((labels[target], after));
        }
        let ends = matches!(
            insn.mnemonic.name(),
            "goto" | "goto_w" | "return" | "ireturn" | "lreturn" | "areturn" | "athrow" | "tableswitch" | "lookupswitch"
        );
        if !ends {
            work.push((at + 1, after));
        }
    }
    peak
}

// Literal interpretation

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i32),
    Long(i64),
    /// Index into the interpreter's array heap
    Array(usize),
}

/// Run a straight-line sequence of constant pushes and conversions
pub fn interpret_constants(code: &Code, pool: &ConstantPool) -> Vec<Value> {
    let mut stack = Vec::new();
    for insn in code.instructions() {
        use Mnemonic::*;
        let value = match insn.mnemonic {
            IconstM1 => Value::Int(-1),
            Iconst0 => Value::Int(0),
            Iconst1 => Value::Int(1),
            Iconst2 => Value::Int(2),
            Iconst3 => Value::Int(3),
            Iconst4 => Value::Int(4),
            Iconst5 => Value::Int(5),
            Lconst0 => Value::Long(0),
            Lconst1 => Value::Long(1),
            Bipush | Sipush => match insn.operands {
                Operands::Immediate(value) => Value::Int(value),
                ref other => panic!("bad immediate {:?}", other),
            },
            Ldc | LdcW | Ldc2W => match insn.operands.constant().and_then(|index| pool.get(index)) {
                Some(Constant::Integer(value)) => Value::Int(*value),
                Some(Constant::Long(value)) => Value::Long(*value),
                other => panic!("unexpected constant {:?}", other),
            },
            I2l => match stack.pop() {
                Some(Value::Int(value)) => Value::Long(value as i64),
                other => panic!("i2l on {:?}", other),
            },
            other => panic!("not a constant instruction: {}", other),
        };
        stack.push(value);
    }
    stack
}

// Straight-line execution

#[derive(Debug, Clone, Copy)]
enum Cell {
    Value(Value),
    /// Upper half of a long
    Top,
}

fn push_value(stack: &mut Vec<Cell>, value: Value) {
    stack.push(Cell::Value(value));
    if let Value::Long(_) = value {
        stack.push(Cell::Top);
    }
}

fn pop_value(stack: &mut Vec<Cell>) -> Value {
    match stack.pop() {
        Some(Cell::Top) => match stack.pop() {
            Some(Cell::Value(value @ Value::Long(_))) => value,
            other => panic!("broken long: {:?}", other),
        },
        Some(Cell::Value(value)) => value,
        None => panic!("operand stack underflow"),
    }
}

fn values(cells: Vec<Cell>) -> Vec<Value> {
    cells
        .into_iter()
        .filter_map(|cell| match cell {
            Cell::Value(value) => Some(value),
            Cell::Top => None,
        })
        .collect()
}

fn local_index(insn: &Instruction) -> usize {
    match insn.operands {
        Operands::Local(index) => index as usize,
        _ => {
            let name = insn.mnemonic.name();
            let (_, digit) = name.rsplit_once('_').expect("compact local form");
            digit.parse().expect("local index")
        }
    }
}

/// Runs generated methods that contain no branches, following calls into the
/// same class. Calls to `stubbed` methods drop their arguments and return zero.
pub struct Machine<'c> {
    class: &'c ClassFile,
    stubbed: Vec<&'c str>,
    heap: Vec<Vec<i64>>,
}

impl<'c> Machine<'c> {
    pub fn new(class: &'c ClassFile, stubbed: &[&'c str]) -> Self {
        Self { class, stubbed: stubbed.to_vec(), heap: Vec::new() }
    }

    /// Execute a method; the result is the returned value, or what is left on
    /// the operand stack at a `return`
    pub fn run(&mut self, name: &str, descriptor: &str, args: &[Value]) -> Vec<Value> {
        let class = self.class;
        let pool = &class.constant_pool;
        let method = class.method(name, descriptor).unwrap_or_else(|| panic!("no method {}{}", name, descriptor));
        let mut locals: HashMap<usize, Value> = HashMap::new();
        let mut slot = 0;
        for &arg in args {
            locals.insert(slot, arg);
            slot += if let Value::Long(_) = arg { 2 } else { 1 };
        }

        let mut stack: Vec<Cell> = Vec::new();
        for insn in method.code.instructions() {
            let mnemonic = insn.mnemonic.name();
            match mnemonic {
                "return" => return values(stack),
                "lreturn" | "areturn" | "ireturn" => return vec![pop_value(&mut stack)],
                "i2l" => match pop_value(&mut stack) {
                    Value::Int(value) => push_value(&mut stack, Value::Long(value as i64)),
                    other => panic!("i2l on {:?}", other),
                },
                "ladd" => match (pop_value(&mut stack), pop_value(&mut stack)) {
                    (Value::Long(b), Value::Long(a)) => push_value(&mut stack, Value::Long(a.wrapping_add(b))),
                    other => panic!("ladd on {:?}", other),
                },
                "pop" => {
                    stack.pop();
                }
                "pop2" => {
                    stack.truncate(stack.len() - 2);
                }
                "dup2" => {
                    let top = stack[stack.len() - 2..].to_vec();
                    stack.extend(top);
                }
                "dup2_x2" => {
                    let top = stack.split_off(stack.len() - 2);
                    let below = stack.split_off(stack.len() - 2);
                    stack.extend(top.iter().copied());
                    stack.extend(below);
                    stack.extend(top);
                }
                "newarray" => match pop_value(&mut stack) {
                    Value::Int(length) => {
                        self.heap.push(vec![0; length as usize]);
                        push_value(&mut stack, Value::Array(self.heap.len() - 1));
                    }
                    other => panic!("newarray of {:?}", other),
                },
                "laload" => match (pop_value(&mut stack), pop_value(&mut stack)) {
                    (Value::Int(index), Value::Array(array)) => {
                        push_value(&mut stack, Value::Long(self.heap[array][index as usize]))
                    }
                    other => panic!("laload on {:?}", other),
                },
                "lastore" => match (pop_value(&mut stack), pop_value(&mut stack), pop_value(&mut stack)) {
                    (Value::Long(value), Value::Int(index), Value::Array(array)) => {
                        self.heap[array][index as usize] = value;
                    }
                    other => panic!("lastore on {:?}", other),
                },
                "invokestatic" => {
                    let member = pool.member_at(insn.operands.constant().expect("method operand")).expect("member");
                    let (params, ret) = descriptor_slots(member.descriptor);
                    let args = values(stack.split_off(stack.len() - params));
                    if self.stubbed.contains(&member.name) {
                        match ret {
                            0 => {}
                            1 => push_value(&mut stack, Value::Int(0)),
                            _ => push_value(&mut stack, Value::Long(0)),
                        }
                    } else {
                        for value in self.run(member.name, member.descriptor, &args) {
                            push_value(&mut stack, value);
                        }
                    }
                }
                _ if mnemonic.starts_with("iload") || mnemonic.starts_with("lload") || mnemonic.starts_with("aload") => {
                    let index = local_index(insn);
                    let value = *locals.get(&index).unwrap_or_else(|| panic!("local {} unset", index));
                    push_value(&mut stack, value);
                }
                _ if mnemonic.starts_with("istore") || mnemonic.starts_with("lstore") || mnemonic.starts_with("astore") => {
                    let value = pop_value(&mut stack);
                    locals.insert(local_index(insn), value);
                }
                _ if insn.operands.targets().is_empty() => {
                    // constant pushes share the literal interpreter
                    let code = Code { items: vec![Item::Instruction(insn.clone())], max_stack: 2, max_locals: 0 };
                    for value in interpret_constants(&code, pool) {
                        push_value(&mut stack, value);
                    }
                }
                other => panic!("{} is not straight-line code", other),
            }
        }
        panic!("{}{} has no return", name, descriptor)
    }
}
