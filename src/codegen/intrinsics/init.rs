//! Static initializer: memory, descriptor table and the string blob

use super::{emit_method, CLINIT};
use crate::codegen::context::CodegenContext;
use crate::codegen::error::{CodeGenError, CodeGenResult};
use crate::codegen::opcodes::Mnemonic;
use crate::codegen::operand::OperandType;

const STANDARD_STREAMS: [&str; 3] = ["in", "out", "err"];

/// Generate `<clinit>`. Must run after every method that interns strings.
pub fn emit_clinit(ctx: &mut CodegenContext<'_>) -> CodeGenResult<()> {
    let capacity = ctx.program.memory_capacity;
    if capacity > i32::MAX as usize {
        let location = ctx.program.ops.first().map(|op| op.location.clone()).unwrap_or_default();
        return Err(CodeGenError::EncodingRange { value: capacity as i64, location });
    }
    let fd_table_size = ctx.config.fd_table_size as i64;
    let chunks: Vec<String> = ctx.strings.chunks().into_iter().map(str::to_string).collect();

    let (name, descriptor) = CLINIT;
    emit_method(ctx, name, descriptor, |code, rt| {
        code.push_int(capacity as i64)?.newarray(OperandType::Byte)?.putstatic(rt.memory)?;

        code.push_int(fd_table_size)?.anewarray("java/io/FileDescriptor")?.putstatic(rt.fds)?;
        for (fd, stream) in STANDARD_STREAMS.iter().enumerate() {
            let field = code.pool().field_ref("java/io/FileDescriptor", stream, "Ljava/io/FileDescriptor;");
            code.getstatic(rt.fds)?.push_int(fd as i64)?.getstatic(field)?.op(Mnemonic::Aastore)?;
        }

        // chunks land back to back, so the first address is the blob's
        for (i, chunk) in chunks.iter().enumerate() {
            code.push_string(chunk)?.invokestatic(rt.put_string)?;
            if i == 0 {
                code.putstatic(rt.strings)?;
            } else {
                code.pop2()?;
            }
        }
        code.return_void()?;
        Ok(())
    })
}
