//! IR to bytecode translation
//!
//! Each IR operation at address `ip` starts with the label `addr_<ip>`, so
//! control-flow operands translate directly into branches. Conditional
//! operations leave a pending merge at their target; placing that label
//! closes it with [`CodeBuilder::end_branch`].
//!
//! Cells are `long`s. A procedure becomes a static method taking one `long`
//! per input and returning `void`, a `long`, or a `long[]` depending on the
//! number of outputs.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use super::builder::CodeBuilder;
use super::class::access_flags;
use super::code::{Code, Label};
use super::context::{diagnose, CodegenContext, Diagnostic, ProcedureRef};
use super::error::{CodeGenError, CodeGenResult};
use super::intrinsics::{syscalls, Runtime, Width, MAIN};
use super::opcodes::Mnemonic;
use super::operand::OperandType;
use super::strings::InternedStrings;
use crate::config::{Config, SyscallFallback};
use crate::ir::{Intrinsic, Op, OpKind, Operand, Program};

/// Locals of the method being translated
#[derive(Debug, Clone, Copy)]
struct Frame {
    /// Slot holding the base address of the procedure's private memory
    local_memory: Option<(usize, usize)>,
    /// First slot free for shuffles
    scratch: usize,
}

struct Translator<'a> {
    code: CodeBuilder<'a>,
    program: &'a Program,
    config: &'a Config,
    runtime: Runtime,
    procedures: &'a BTreeMap<usize, ProcedureRef>,
    strings: &'a mut InternedStrings,
    diagnostics: &'a mut Vec<Diagnostic>,
    /// Forward branches still open at each IR address
    pending_merges: HashMap<usize, usize>,
    frame: Frame,
}

fn unsupported(op: &Op, what: impl Into<String>) -> CodeGenError {
    CodeGenError::Unsupported { operation: what.into(), location: op.location.clone() }
}

/// Integer literal carried by `op`
fn literal(op: &Op) -> CodeGenResult<i64> {
    match op.operand {
        Operand::Integer(value) => Ok(value),
        Operand::Address(address) => i64::try_from(address).map_err(|_| CodeGenError::EncodingRange {
            value: i64::MAX,
            location: op.location.clone(),
        }),
        _ => Err(unsupported(op, format!("{} without an integer operand", op.kind))),
    }
}

fn target(op: &Op) -> CodeGenResult<usize> {
    op.address()
        .or_else(|| op.integer().and_then(|value| usize::try_from(value).ok()))
        .ok_or_else(|| unsupported(op, format!("{} without a target address", op.kind)))
}

/// Branch taken by `lcmp` when the comparison is false
fn comparison_negation(intrinsic: Intrinsic) -> Option<Mnemonic> {
    Some(match intrinsic {
        Intrinsic::Eq => Mnemonic::Ifne,
        Intrinsic::Ne => Mnemonic::Ifeq,
        Intrinsic::Gt => Mnemonic::Ifle,
        Intrinsic::Lt => Mnemonic::Ifge,
        Intrinsic::Ge => Mnemonic::Iflt,
        Intrinsic::Le => Mnemonic::Ifgt,
        _ => return None,
    })
}

fn load_width(intrinsic: Intrinsic) -> Option<Width> {
    match intrinsic {
        Intrinsic::Load8 => Some(Width::W8),
        Intrinsic::Load16 => Some(Width::W16),
        Intrinsic::Load32 => Some(Width::W32),
        Intrinsic::Load64 => Some(Width::W64),
        _ => None,
    }
}

fn store_width(intrinsic: Intrinsic) -> Option<Width> {
    match intrinsic {
        Intrinsic::Store8 => Some(Width::W8),
        Intrinsic::Store16 => Some(Width::W16),
        Intrinsic::Store32 => Some(Width::W32),
        Intrinsic::Store64 => Some(Width::W64),
        _ => None,
    }
}

impl<'a> Translator<'a> {
    fn new(ctx: &'a mut CodegenContext<'_>, param_slots: usize, frame: Frame) -> Translator<'a> {
        let CodegenContext { program, config, class, strings, runtime, procedures, diagnostics } = ctx;
        Translator {
            code: CodeBuilder::new(&mut class.constant_pool, param_slots),
            program: *program,
            config: *config,
            runtime: *runtime,
            procedures: &*procedures,
            strings,
            diagnostics,
            pending_merges: HashMap::new(),
            frame,
        }
    }

    /// Start the instruction at `ip`, closing branches that target it
    fn place(&mut self, ip: usize) -> CodeGenResult<()> {
        self.code.label(Label::addr(ip))?;
        for _ in 0..self.pending_merges.remove(&ip).unwrap_or(0) {
            self.code.end_branch()?;
        }
        Ok(())
    }

    /// Pop a cell and branch to `target` when it is zero
    fn branch_if_false(&mut self, target: usize) -> CodeGenResult<()> {
        self.code.push_long(0)?.lcmp()?.branch(Mnemonic::Ifeq, Label::addr(target))?;
        *self.pending_merges.entry(target).or_insert(0) += 1;
        Ok(())
    }

    /// `lcmp` then a 0/1 cell, branching around one of the two constants
    fn compare(&mut self, ip: usize, when_false: Mnemonic) -> CodeGenResult<()> {
        let (no, done) = (Label::new(format!("false_{}", ip)), Label::new(format!("compared_{}", ip)));
        self.code.lcmp()?.branch(when_false, no.clone())?;
        self.code.push_long(1)?.goto(done.clone())?;
        self.code.label(no)?.end_branch()?;
        self.code.push_long(0)?.label(done)?;
        Ok(())
    }

    /// Push a string's length and its address in linear memory
    fn push_string(&mut self, value: &str) -> CodeGenResult<()> {
        let offset = self.strings.intern(value);
        self.code.push_long(value.len() as i64)?;
        self.push_interned(offset)
    }

    fn push_interned(&mut self, offset: usize) -> CodeGenResult<()> {
        self.code.getstatic(self.runtime.strings)?;
        if offset != 0 {
            self.code.push_long(offset as i64)?.ladd()?;
        }
        Ok(())
    }

    fn call(&mut self, op: &Op) -> CodeGenResult<()> {
        let address = target(op)?;
        let procedure = self
            .procedures
            .get(&address)
            .ok_or_else(|| CodeGenError::UnknownProcedure { address, location: op.location.clone() })?;
        self.code.invokestatic(procedure.method)?;
        let outs = procedure.outs();
        if outs > 1 {
            let array = self.frame.scratch;
            self.code.astore(array)?;
            for i in (0..outs).rev() {
                self.code.aload(array)?.push_int(i as i64)?.op(Mnemonic::Laload)?;
            }
        }
        Ok(())
    }

    /// Reserve the procedure's private memory and keep its base in a local
    fn enter(&mut self, op: &Op) -> CodeGenResult<()> {
        if let Some((slot, capacity)) = self.frame.local_memory {
            let capacity = i32::try_from(capacity).map_err(|_| CodeGenError::EncodingRange {
                value: capacity as i64,
                location: op.location.clone(),
            })?;
            self.code.push_int(capacity as i64)?.invokestatic(self.runtime.extend_mem)?.lstore(slot)?;
        }
        Ok(())
    }

    /// Release private memory and return the contract's outputs
    fn leave(&mut self, outs: usize) -> CodeGenResult<()> {
        if let Some((_, capacity)) = self.frame.local_memory {
            self.code.push_int(-(capacity as i64))?.invokestatic(self.runtime.extend_mem)?.pop2()?;
        }
        match outs {
            0 => {
                self.code.return_void()?;
            }
            1 => {
                self.code.lreturn()?;
            }
            n => {
                let array = self.frame.scratch;
                self.code.push_int(n as i64)?.newarray(OperandType::Long)?.astore(array)?;
                // the top cell goes to index 0; callers read the array backwards
                for i in 0..n {
                    self.code.aload(array)?.push_int(i as i64)?;
                    self.code.dup_pair_below_wide()?.pop2()?.op(Mnemonic::Lastore)?;
                }
                self.code.aload(array)?.areturn()?;
            }
        }
        Ok(())
    }

    fn syscall(&mut self, ip: usize, op: &Op, arity: usize) -> CodeGenResult<()> {
        let number = ip
            .checked_sub(1)
            .and_then(|prev| self.program.ops.get(prev))
            .filter(|prev| prev.kind == OpKind::PushInt)
            .and_then(Op::integer);
        let table = self.runtime.syscall(arity);
        let implemented = match (table, number) {
            (None, _) => false,
            (Some(_), Some(number)) => syscalls::is_implemented(arity, number),
            (Some(_), None) => true,
        };
        if !implemented {
            self.syscall_fallback(op, arity, number)?;
        }
        match table {
            Some(method) => {
                self.code.invokestatic(method)?;
            }
            None => {
                for _ in 0..=arity {
                    self.code.pop2()?;
                }
                self.code.push_long(0)?;
            }
        }
        Ok(())
    }

    fn syscall_fallback(&mut self, op: &Op, arity: usize, number: Option<i64>) -> CodeGenResult<()> {
        let message = match number {
            Some(number) => format!("syscall {} with {} argument(s) is not emulated and returns 0", number, arity),
            None => format!("syscalls with {} argument(s) are not emulated and return 0", arity),
        };
        match self.config.syscall_fallback {
            SyscallFallback::Allow => debug!("{}: {}", op.location, message),
            SyscallFallback::Warn => diagnose(self.diagnostics, &op.location, message),
            SyscallFallback::Deny => {
                return Err(CodeGenError::UnsupportedSyscall { number, arity, location: op.location.clone() })
            }
        }
        Ok(())
    }

    fn intrinsic(&mut self, ip: usize, op: &Op, intrinsic: Intrinsic) -> CodeGenResult<()> {
        if let Some(when_false) = comparison_negation(intrinsic) {
            return self.compare(ip, when_false);
        }
        if let Some(width) = load_width(intrinsic) {
            self.code.invokestatic(self.runtime.load(width))?;
            return Ok(());
        }
        if let Some(width) = store_width(intrinsic) {
            self.code.invokestatic(self.runtime.store(width))?;
            return Ok(());
        }
        if let Some(arity) = intrinsic.syscall_arity() {
            return self.syscall(ip, op, arity);
        }

        let s = self.frame.scratch;
        let code = &mut self.code;
        match intrinsic {
            Intrinsic::Plus => {
                code.ladd()?;
            }
            Intrinsic::Minus => {
                code.lsub()?;
            }
            Intrinsic::Mul => {
                code.lmul()?;
            }
            Intrinsic::Max => {
                let max = code.pool().method_ref("java/lang/Math", "max", "(JJ)J");
                code.invokestatic(max)?;
            }
            Intrinsic::DivMod | Intrinsic::IDivMod => {
                code.lstore(s + 2)?.lstore(s)?;
                code.lload(s)?.lload(s + 2)?.op(Mnemonic::Ldiv)?;
                code.lload(s)?.lload(s + 2)?.op(Mnemonic::Lrem)?;
            }
            Intrinsic::Shr => {
                code.l2i()?.op(Mnemonic::Lushr)?;
            }
            Intrinsic::Shl => {
                code.l2i()?.op(Mnemonic::Lshl)?;
            }
            Intrinsic::Or => {
                code.lor()?;
            }
            Intrinsic::And => {
                code.land()?;
            }
            Intrinsic::Not => {
                code.lnot()?;
            }
            Intrinsic::Print => {
                code.invokestatic(self.runtime.print_long)?;
            }
            Intrinsic::Dup => {
                code.dup2()?;
            }
            Intrinsic::Swap => {
                code.swap_wide()?;
            }
            Intrinsic::Drop => {
                code.pop2()?;
            }
            Intrinsic::Over => {
                code.over_wide()?;
            }
            Intrinsic::Rot => {
                // a b c -> b c a
                code.lstore(s)?.lstore(s + 2)?.lstore(s + 4)?;
                code.lload(s + 2)?.lload(s)?.lload(s + 4)?;
            }
            Intrinsic::Argc => {
                code.getstatic(self.runtime.argc)?.invokestatic(self.runtime.load(Width::W64))?;
            }
            Intrinsic::Argv => {
                code.getstatic(self.runtime.argv)?;
            }
            Intrinsic::Envp => {
                code.getstatic(self.runtime.envp)?;
            }
            Intrinsic::Here => {
                let here = op.location.to_string();
                return self.push_string(&here);
            }
            Intrinsic::CastPtr | Intrinsic::CastInt | Intrinsic::CastBool | Intrinsic::CastAddr | Intrinsic::Stop => {}
            _ => return Err(unsupported(op, op.kind.to_string())),
        }
        Ok(())
    }

    /// Translate the operation at `ip`. Returns `false` once a procedure body ends.
    fn operation(&mut self, ip: usize, op: &Op, outs: usize, in_procedure: bool) -> CodeGenResult<bool> {
        match op.kind {
            OpKind::PushInt | OpKind::PushBool | OpKind::PushPtr | OpKind::PushMem => {
                self.code.push_long(literal(op)?)?;
            }
            OpKind::PushStr => {
                let value = op.string().ok_or_else(|| unsupported(op, "push_str without a string"))?;
                self.push_string(value)?;
            }
            OpKind::PushCStr => {
                let value = op.string().ok_or_else(|| unsupported(op, "push_cstr without a string"))?;
                let offset = self.strings.intern(&format!("{}\0", value));
                self.push_interned(offset)?;
            }
            OpKind::PushLocalMem => {
                let offset = literal(op)?;
                let Some((slot, _)) = self.frame.local_memory.filter(|_| in_procedure) else {
                    return Err(unsupported(op, "local memory outside a procedure"));
                };
                self.code.lload(slot)?;
                if offset != 0 {
                    self.code.push_long(offset)?.ladd()?;
                }
            }
            OpKind::If | OpKind::IfStar | OpKind::Do => self.branch_if_false(target(op)?)?,
            OpKind::Else => {
                self.code.goto(Label::addr(target(op)?))?;
            }
            OpKind::End => {
                let next = target(op)?;
                if next != ip + 1 {
                    self.code.goto(Label::addr(next))?;
                }
            }
            OpKind::While | OpKind::SkipProc => {}
            OpKind::PrepProc => {
                if in_procedure {
                    self.enter(op)?;
                    for i in 0..self.procedures.get(&ip).map_or(0, ProcedureRef::ins) {
                        self.code.lload(2 * i)?;
                    }
                }
            }
            OpKind::Ret => {
                if in_procedure {
                    self.leave(outs)?;
                    return Ok(false);
                }
            }
            OpKind::Call => self.call(op)?,
            OpKind::Intrinsic(intrinsic) => self.intrinsic(ip, op, intrinsic)?,
        }
        Ok(true)
    }

    fn finish(self, method: &str) -> CodeGenResult<Code> {
        self.code.finish().map_err(|e| e.in_method(method))
    }
}

/// Translate the live procedure whose `PrepProc` is at `address`
pub fn translate_procedure(ctx: &mut CodegenContext<'_>, address: usize) -> CodeGenResult<()> {
    let program = ctx.program;
    let procedure = ctx.procedure_at(address).cloned().ok_or_else(|| CodeGenError::UnknownProcedure {
        address,
        location: program.ops.get(address).map(|op| op.location.clone()).unwrap_or_default(),
    })?;
    let params = 2 * procedure.ins();
    let frame = if procedure.local_memory > 0 {
        Frame { local_memory: Some((params, procedure.local_memory)), scratch: params + 2 }
    } else {
        Frame { local_memory: None, scratch: params }
    };

    let mut translator = Translator::new(ctx, params, frame);
    let mut closed = false;
    for ip in address..program.ops.len() {
        let op = &program.ops[ip];
        translator.place(ip)?;
        if !translator
            .operation(ip, op, procedure.outs(), true)
            .map_err(|e| e.in_method(&procedure.method_name))?
        {
            closed = true;
            break;
        }
    }
    if !closed {
        let location = program.ops.get(address).map(|op| op.location.clone()).unwrap_or_default();
        return Err(CodeGenError::Unsupported { operation: format!("procedure {} without ret", procedure.name), location });
    }
    let code = translator.finish(&procedure.method_name)?;
    ctx.add_method(&procedure.method_name, &procedure.descriptor, code);
    Ok(())
}

/// Translate the top-level operations into `main`, skipping procedure bodies
pub fn translate_main(ctx: &mut CodegenContext<'_>) -> CodeGenResult<()> {
    let program = ctx.program;
    let (name, descriptor) = MAIN;
    let mut translator = Translator::new(ctx, 1, Frame { local_memory: None, scratch: 1 });

    translator.code.aload(0)?;
    translator.code.invokestatic(translator.runtime.prepare_argv)?;
    translator.code.invokestatic(translator.runtime.prepare_envp)?;

    let mut in_body = false;
    for (ip, op) in program.ops.iter().enumerate() {
        if in_body && op.kind != OpKind::Ret {
            continue;
        }
        translator.place(ip)?;
        match op.kind {
            OpKind::PrepProc => in_body = true,
            OpKind::Ret => in_body = false,
            _ => {
                translator.operation(ip, op, 0, false).map_err(|e| e.in_method(name))?;
            }
        }
    }
    translator.place(program.ops.len())?;
    translator.code.return_void()?;

    let code = translator.finish(name)?;
    let flags = access_flags::ACC_PUBLIC | access_flags::ACC_STATIC;
    ctx.install(flags, name, descriptor, code);
    Ok(())
}
