//! Instruction mnemonics and their static stack effects
//!
//! Every supported JVM instruction is a variant of [`Mnemonic`]. Its
//! [`InstructionDescriptor`] says which operand types it pops and pushes,
//! either as a fixed list or as a function of its constant pool operand.

use std::fmt;

use super::constpool::{Constant, ConstantPool};
use super::descriptor::{parse_field_descriptor, parse_method_descriptor};
use super::operand::OperandType;
use OperandType::{Double as D, Float as F, Integer as I, Long as J, Reference as A};

macro_rules! mnemonics {
    ($($variant:ident = $code:literal, $name:literal;)*) => {
        /// JVM instruction mnemonics
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Mnemonic {
            $($variant),*
        }

        impl Mnemonic {
            pub const ALL: &'static [Mnemonic] = &[$(Mnemonic::$variant),*];

            pub fn opcode(self) -> u8 {
                match self {
                    $(Mnemonic::$variant => $code),*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Mnemonic::$variant => $name),*
                }
            }

            pub fn from_opcode(opcode: u8) -> Option<Self> {
                match opcode {
                    $($code => Some(Mnemonic::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

mnemonics! {
    Nop = 0x00, "nop";
    AconstNull = 0x01, "aconst_null";
    IconstM1 = 0x02, "iconst_m1";
    Iconst0 = 0x03, "iconst_0";
    Iconst1 = 0x04, "iconst_1";
    Iconst2 = 0x05, "iconst_2";
    Iconst3 = 0x06, "iconst_3";
    Iconst4 = 0x07, "iconst_4";
    Iconst5 = 0x08, "iconst_5";
    Lconst0 = 0x09, "lconst_0";
    Lconst1 = 0x0a, "lconst_1";
    Fconst0 = 0x0b, "fconst_0";
    Fconst1 = 0x0c, "fconst_1";
    Fconst2 = 0x0d, "fconst_2";
    Dconst0 = 0x0e, "dconst_0";
    Dconst1 = 0x0f, "dconst_1";
    Bipush = 0x10, "bipush";
    Sipush = 0x11, "sipush";
    Ldc = 0x12, "ldc";
    LdcW = 0x13, "ldc_w";
    Ldc2W = 0x14, "ldc2_w";
    Iload = 0x15, "iload";
    Lload = 0x16, "lload";
    Fload = 0x17, "fload";
    Dload = 0x18, "dload";
    Aload = 0x19, "aload";
    Iload0 = 0x1a, "iload_0";
    Iload1 = 0x1b, "iload_1";
    Iload2 = 0x1c, "iload_2";
    Iload3 = 0x1d, "iload_3";
    Lload0 = 0x1e, "lload_0";
    Lload1 = 0x1f, "lload_1";
    Lload2 = 0x20, "lload_2";
    Lload3 = 0x21, "lload_3";
    Fload0 = 0x22, "fload_0";
    Fload1 = 0x23, "fload_1";
    Fload2 = 0x24, "fload_2";
    Fload3 = 0x25, "fload_3";
    Dload0 = 0x26, "dload_0";
    Dload1 = 0x27, "dload_1";
    Dload2 = 0x28, "dload_2";
    Dload3 = 0x29, "dload_3";
    Aload0 = 0x2a, "aload_0";
    Aload1 = 0x2b, "aload_1";
    Aload2 = 0x2c, "aload_2";
    Aload3 = 0x2d, "aload_3";
    Iaload = 0x2e, "iaload";
    Laload = 0x2f, "laload";
    Faload = 0x30, "faload";
    Daload = 0x31, "daload";
    Aaload = 0x32, "aaload";
    Baload = 0x33, "baload";
    Caload = 0x34, "caload";
    Saload = 0x35, "saload";
    Istore = 0x36, "istore";
    Lstore = 0x37, "lstore";
    Fstore = 0x38, "fstore";
    Dstore = 0x39, "dstore";
    Astore = 0x3a, "astore";
    Istore0 = 0x3b, "istore_0";
    Istore1 = 0x3c, "istore_1";
    Istore2 = 0x3d, "istore_2";
    Istore3 = 0x3e, "istore_3";
    Lstore0 = 0x3f, "lstore_0";
    Lstore1 = 0x40, "lstore_1";
    Lstore2 = 0x41, "lstore_2";
    Lstore3 = 0x42, "lstore_3";
    Fstore0 = 0x43, "fstore_0";
    Fstore1 = 0x44, "fstore_1";
    Fstore2 = 0x45, "fstore_2";
    Fstore3 = 0x46, "fstore_3";
    Dstore0 = 0x47, "dstore_0";
    Dstore1 = 0x48, "dstore_1";
    Dstore2 = 0x49, "dstore_2";
    Dstore3 = 0x4a, "dstore_3";
    Astore0 = 0x4b, "astore_0";
    Astore1 = 0x4c, "astore_1";
    Astore2 = 0x4d, "astore_2";
    Astore3 = 0x4e, "astore_3";
    Iastore = 0x4f, "iastore";
    Lastore = 0x50, "lastore";
    Fastore = 0x51, "fastore";
    Dastore = 0x52, "dastore";
    Aastore = 0x53, "aastore";
    Bastore = 0x54, "bastore";
    Castore = 0x55, "castore";
    Sastore = 0x56, "sastore";
    Pop = 0x57, "pop";
    Pop2 = 0x58, "pop2";
    Dup = 0x59, "dup";
    DupX1 = 0x5a, "dup_x1";
    DupX2 = 0x5b, "dup_x2";
    Dup2 = 0x5c, "dup2";
    Dup2X1 = 0x5d, "dup2_x1";
    Dup2X2 = 0x5e, "dup2_x2";
    Swap = 0x5f, "swap";
    Iadd = 0x60, "iadd";
    Ladd = 0x61, "ladd";
    Fadd = 0x62, "fadd";
    Dadd = 0x63, "dadd";
    Isub = 0x64, "isub";
    Lsub = 0x65, "lsub";
    Fsub = 0x66, "fsub";
    Dsub = 0x67, "dsub";
    Imul = 0x68, "imul";
    Lmul = 0x69, "lmul";
    Fmul = 0x6a, "fmul";
    Dmul = 0x6b, "dmul";
    Idiv = 0x6c, "idiv";
    Ldiv = 0x6d, "ldiv";
    Fdiv = 0x6e, "fdiv";
    Ddiv = 0x6f, "ddiv";
    Irem = 0x70, "irem";
    Lrem = 0x71, "lrem";
    Frem = 0x72, "frem";
    Drem = 0x73, "drem";
    Ineg = 0x74, "ineg";
    Lneg = 0x75, "lneg";
    Fneg = 0x76, "fneg";
    Dneg = 0x77, "dneg";
    Ishl = 0x78, "ishl";
    Lshl = 0x79, "lshl";
    Ishr = 0x7a, "ishr";
    Lshr = 0x7b, "lshr";
    Iushr = 0x7c, "iushr";
    Lushr = 0x7d, "lushr";
    Iand = 0x7e, "iand";
    Land = 0x7f, "land";
    Ior = 0x80, "ior";
    Lor = 0x81, "lor";
    Ixor = 0x82, "ixor";
    Lxor = 0x83, "lxor";
    Iinc = 0x84, "iinc";
    I2l = 0x85, "i2l";
    I2f = 0x86, "i2f";
    I2d = 0x87, "i2d";
    L2i = 0x88, "l2i";
    L2f = 0x89, "l2f";
    L2d = 0x8a, "l2d";
    F2i = 0x8b, "f2i";
    F2l = 0x8c, "f2l";
    F2d = 0x8d, "f2d";
    D2i = 0x8e, "d2i";
    D2l = 0x8f, "d2l";
    D2f = 0x90, "d2f";
    I2b = 0x91, "i2b";
    I2c = 0x92, "i2c";
    I2s = 0x93, "i2s";
    Lcmp = 0x94, "lcmp";
    Fcmpl = 0x95, "fcmpl";
    Fcmpg = 0x96, "fcmpg";
    Dcmpl = 0x97, "dcmpl";
    Dcmpg = 0x98, "dcmpg";
    Ifeq = 0x99, "ifeq";
    Ifne = 0x9a, "ifne";
    Iflt = 0x9b, "iflt";
    Ifge = 0x9c, "ifge";
    Ifgt = 0x9d, "ifgt";
    Ifle = 0x9e, "ifle";
    IfIcmpeq = 0x9f, "if_icmpeq";
    IfIcmpne = 0xa0, "if_icmpne";
    IfIcmplt = 0xa1, "if_icmplt";
    IfIcmpge = 0xa2, "if_icmpge";
    IfIcmpgt = 0xa3, "if_icmpgt";
    IfIcmple = 0xa4, "if_icmple";
    IfAcmpeq = 0xa5, "if_acmpeq";
    IfAcmpne = 0xa6, "if_acmpne";
    Goto = 0xa7, "goto";
    Tableswitch = 0xaa, "tableswitch";
    Lookupswitch = 0xab, "lookupswitch";
    Ireturn = 0xac, "ireturn";
    Lreturn = 0xad, "lreturn";
    Freturn = 0xae, "freturn";
    Dreturn = 0xaf, "dreturn";
    Areturn = 0xb0, "areturn";
    Return = 0xb1, "return";
    Getstatic = 0xb2, "getstatic";
    Putstatic = 0xb3, "putstatic";
    Getfield = 0xb4, "getfield";
    Putfield = 0xb5, "putfield";
    Invokevirtual = 0xb6, "invokevirtual";
    Invokespecial = 0xb7, "invokespecial";
    Invokestatic = 0xb8, "invokestatic";
    Invokeinterface = 0xb9, "invokeinterface";
    Invokedynamic = 0xba, "invokedynamic";
    New = 0xbb, "new";
    Newarray = 0xbc, "newarray";
    Anewarray = 0xbd, "anewarray";
    Arraylength = 0xbe, "arraylength";
    Athrow = 0xbf, "athrow";
    Checkcast = 0xc0, "checkcast";
    Instanceof = 0xc1, "instanceof";
    Monitorenter = 0xc2, "monitorenter";
    Monitorexit = 0xc3, "monitorexit";
    Ifnull = 0xc6, "ifnull";
    Ifnonnull = 0xc7, "ifnonnull";
}

pub const WIDE: u8 = 0xc4;

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How an instruction transfers control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Falls through to the next instruction
    Next,
    /// Conditional branch, may also fall through
    Branch,
    /// Unconditional jump
    Goto,
    /// Multi-way branch, never falls through
    Switch,
    /// Leaves the method
    Exit,
}

/// Encoding of the immediate operands following the opcode byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    None,
    /// signed 8-bit immediate (`bipush`)
    Byte,
    /// signed 16-bit immediate (`sipush`)
    Short,
    /// primitive element type code (`newarray`)
    ArrayType,
    /// local variable index, widened when above 255
    Local,
    /// local index plus signed increment
    Iinc,
    /// 8-bit constant pool index (`ldc`)
    Constant8,
    /// 16-bit constant pool index
    Constant16,
    /// 16-bit index, argument count and a zero byte
    Interface,
    /// 16-bit index and two zero bytes
    Dynamic,
    /// 16-bit relative branch offset
    Branch,
    TableSwitch,
    LookupSwitch,
}

/// Computes stack types from an instruction's constant pool operand
pub type OperandEffect = fn(&Constant, &ConstantPool) -> Result<Vec<OperandType>, String>;

/// Input or output types of an instruction
#[derive(Clone, Copy)]
pub enum Effect {
    Fixed(&'static [OperandType]),
    FromOperand(OperandEffect),
    /// Stack manipulation whose effect depends on the widths already on the stack
    Shuffle,
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Fixed(types) => f.debug_tuple("Fixed").field(types).finish(),
            Effect::FromOperand(_) => f.write_str("FromOperand"),
            Effect::Shuffle => f.write_str("Shuffle"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct InstructionDescriptor {
    pub mnemonic: Mnemonic,
    pub label: &'static str,
    pub inputs: Effect,
    pub outputs: Effect,
}

const NONE: &[OperandType] = &[];
const INT: &[OperandType] = &[I];
const LONG: &[OperandType] = &[J];
const FLOAT: &[OperandType] = &[F];
const DOUBLE: &[OperandType] = &[D];
const REF: &[OperandType] = &[A];
const INT2: &[OperandType] = &[I, I];
const LONG2: &[OperandType] = &[J, J];
const FLOAT2: &[OperandType] = &[F, F];
const DOUBLE2: &[OperandType] = &[D, D];
const REF2: &[OperandType] = &[A, A];
const LONG_INT: &[OperandType] = &[J, I];
const ARRAY_INDEX: &[OperandType] = &[A, I];
const STORE_INT: &[OperandType] = &[A, I, I];
const STORE_LONG: &[OperandType] = &[A, I, J];
const STORE_FLOAT: &[OperandType] = &[A, I, F];
const STORE_DOUBLE: &[OperandType] = &[A, I, D];
const STORE_REF: &[OperandType] = &[A, I, A];

fn member_types(constant: &Constant, pool: &ConstantPool) -> Result<(Vec<OperandType>, Option<OperandType>), String> {
    let member = pool
        .member_of(constant)
        .ok_or_else(|| format!("{} is not a member reference", constant.kind_name()))?;
    if member.descriptor.starts_with('(') {
        let shape = parse_method_descriptor(member.descriptor)
            .ok_or_else(|| format!("malformed method descriptor {}", member.descriptor))?;
        Ok((shape.params, shape.ret))
    } else {
        let ty = parse_field_descriptor(member.descriptor)
            .ok_or_else(|| format!("malformed field descriptor {}", member.descriptor))?;
        Ok((Vec::new(), Some(ty)))
    }
}

fn field_type(constant: &Constant, pool: &ConstantPool) -> Result<Vec<OperandType>, String> {
    match member_types(constant, pool)? {
        (params, Some(ty)) if params.is_empty() && matches!(constant, Constant::FieldRef(..)) => Ok(vec![ty]),
        _ => Err("expected a field reference".to_string()),
    }
}

fn instance_field_input(constant: &Constant, pool: &ConstantPool) -> Result<Vec<OperandType>, String> {
    let mut types = vec![A];
    types.extend(field_type(constant, pool)?);
    Ok(types)
}

fn static_call_input(constant: &Constant, pool: &ConstantPool) -> Result<Vec<OperandType>, String> {
    match constant {
        Constant::MethodRef(..) | Constant::InterfaceMethodRef(..) | Constant::InvokeDynamic(..) => {
            Ok(member_types(constant, pool)?.0)
        }
        _ => Err("expected a method reference".to_string()),
    }
}

fn instance_call_input(constant: &Constant, pool: &ConstantPool) -> Result<Vec<OperandType>, String> {
    let mut types = vec![A];
    types.extend(static_call_input(constant, pool)?);
    Ok(types)
}

fn call_output(constant: &Constant, pool: &ConstantPool) -> Result<Vec<OperandType>, String> {
    Ok(member_types(constant, pool)?.1.into_iter().collect())
}

fn loadable_constant(constant: &Constant, _pool: &ConstantPool) -> Result<Vec<OperandType>, String> {
    match constant {
        Constant::Integer(_) => Ok(vec![I]),
        Constant::Float(_) => Ok(vec![F]),
        Constant::Long(_) => Ok(vec![J]),
        Constant::Double(_) => Ok(vec![D]),
        Constant::String(_) | Constant::Class(_) | Constant::MethodHandle(..) | Constant::MethodType(_) => Ok(vec![A]),
        other => Err(format!("{} is not loadable", other.kind_name())),
    }
}

impl Mnemonic {
    /// Stack effect of this instruction
    pub fn descriptor(self) -> InstructionDescriptor {
        use Effect::{Fixed, FromOperand, Shuffle};
        use Mnemonic::*;
        let (inputs, outputs) = match self {
            Nop | Iinc | Goto | Return => (Fixed(NONE), Fixed(NONE)),
            AconstNull => (Fixed(NONE), Fixed(REF)),
            IconstM1 | Iconst0 | Iconst1 | Iconst2 | Iconst3 | Iconst4 | Iconst5 | Bipush | Sipush => {
                (Fixed(NONE), Fixed(INT))
            }
            Lconst0 | Lconst1 => (Fixed(NONE), Fixed(LONG)),
            Fconst0 | Fconst1 | Fconst2 => (Fixed(NONE), Fixed(FLOAT)),
            Dconst0 | Dconst1 => (Fixed(NONE), Fixed(DOUBLE)),
            Ldc | LdcW | Ldc2W => (Fixed(NONE), FromOperand(loadable_constant)),
            Iload | Iload0 | Iload1 | Iload2 | Iload3 => (Fixed(NONE), Fixed(INT)),
            Lload | Lload0 | Lload1 | Lload2 | Lload3 => (Fixed(NONE), Fixed(LONG)),
            Fload | Fload0 | Fload1 | Fload2 | Fload3 => (Fixed(NONE), Fixed(FLOAT)),
            Dload | Dload0 | Dload1 | Dload2 | Dload3 => (Fixed(NONE), Fixed(DOUBLE)),
            Aload | Aload0 | Aload1 | Aload2 | Aload3 => (Fixed(NONE), Fixed(REF)),
            Iaload | Baload | Caload | Saload => (Fixed(ARRAY_INDEX), Fixed(INT)),
            Laload => (Fixed(ARRAY_INDEX), Fixed(LONG)),
            Faload => (Fixed(ARRAY_INDEX), Fixed(FLOAT)),
            Daload => (Fixed(ARRAY_INDEX), Fixed(DOUBLE)),
            Aaload => (Fixed(ARRAY_INDEX), Fixed(REF)),
            Istore | Istore0 | Istore1 | Istore2 | Istore3 => (Fixed(INT), Fixed(NONE)),
            Lstore | Lstore0 | Lstore1 | Lstore2 | Lstore3 => (Fixed(LONG), Fixed(NONE)),
            Fstore | Fstore0 | Fstore1 | Fstore2 | Fstore3 => (Fixed(FLOAT), Fixed(NONE)),
            Dstore | Dstore0 | Dstore1 | Dstore2 | Dstore3 => (Fixed(DOUBLE), Fixed(NONE)),
            Astore | Astore0 | Astore1 | Astore2 | Astore3 => (Fixed(REF), Fixed(NONE)),
            Iastore | Bastore | Castore | Sastore => (Fixed(STORE_INT), Fixed(NONE)),
            Lastore => (Fixed(STORE_LONG), Fixed(NONE)),
            Fastore => (Fixed(STORE_FLOAT), Fixed(NONE)),
            Dastore => (Fixed(STORE_DOUBLE), Fixed(NONE)),
            Aastore => (Fixed(STORE_REF), Fixed(NONE)),
            Pop | Pop2 | Dup | DupX1 | DupX2 | Dup2 | Dup2X1 | Dup2X2 | Swap => (Shuffle, Shuffle),
            Iadd | Isub | Imul | Idiv | Irem | Ishl | Ishr | Iushr | Iand | Ior | Ixor => (Fixed(INT2), Fixed(INT)),
            Ladd | Lsub | Lmul | Ldiv | Lrem | Land | Lor | Lxor => (Fixed(LONG2), Fixed(LONG)),
            Lshl | Lshr | Lushr => (Fixed(LONG_INT), Fixed(LONG)),
            Fadd | Fsub | Fmul | Fdiv | Frem => (Fixed(FLOAT2), Fixed(FLOAT)),
            Dadd | Dsub | Dmul | Ddiv | Drem => (Fixed(DOUBLE2), Fixed(DOUBLE)),
            Ineg | I2b | I2c | I2s => (Fixed(INT), Fixed(INT)),
            Lneg => (Fixed(LONG), Fixed(LONG)),
            Fneg => (Fixed(FLOAT), Fixed(FLOAT)),
            Dneg => (Fixed(DOUBLE), Fixed(DOUBLE)),
            I2l => (Fixed(INT), Fixed(LONG)),
            I2f => (Fixed(INT), Fixed(FLOAT)),
            I2d => (Fixed(INT), Fixed(DOUBLE)),
            L2i => (Fixed(LONG), Fixed(INT)),
            L2f => (Fixed(LONG), Fixed(FLOAT)),
            L2d => (Fixed(LONG), Fixed(DOUBLE)),
            F2i => (Fixed(FLOAT), Fixed(INT)),
            F2l => (Fixed(FLOAT), Fixed(LONG)),
            F2d => (Fixed(FLOAT), Fixed(DOUBLE)),
            D2i => (Fixed(DOUBLE), Fixed(INT)),
            D2l => (Fixed(DOUBLE), Fixed(LONG)),
            D2f => (Fixed(DOUBLE), Fixed(FLOAT)),
            Lcmp => (Fixed(LONG2), Fixed(INT)),
            Fcmpl | Fcmpg => (Fixed(FLOAT2), Fixed(INT)),
            Dcmpl | Dcmpg => (Fixed(DOUBLE2), Fixed(INT)),
            Ifeq | Ifne | Iflt | Ifge | Ifgt | Ifle | Tableswitch | Lookupswitch | Ireturn => (Fixed(INT), Fixed(NONE)),
            IfIcmpeq | IfIcmpne | IfIcmplt | IfIcmpge | IfIcmpgt | IfIcmple => (Fixed(INT2), Fixed(NONE)),
            IfAcmpeq | IfAcmpne => (Fixed(REF2), Fixed(NONE)),
            Ifnull | Ifnonnull | Areturn | Athrow | Monitorenter | Monitorexit => (Fixed(REF), Fixed(NONE)),
            Lreturn => (Fixed(LONG), Fixed(NONE)),
            Freturn => (Fixed(FLOAT), Fixed(NONE)),
            Dreturn => (Fixed(DOUBLE), Fixed(NONE)),
            Getstatic => (Fixed(NONE), FromOperand(field_type)),
            Putstatic => (FromOperand(field_type), Fixed(NONE)),
            Getfield => (Fixed(REF), FromOperand(field_type)),
            Putfield => (FromOperand(instance_field_input), Fixed(NONE)),
            Invokevirtual | Invokespecial | Invokeinterface => (FromOperand(instance_call_input), FromOperand(call_output)),
            Invokestatic | Invokedynamic => (FromOperand(static_call_input), FromOperand(call_output)),
            New => (Fixed(NONE), Fixed(REF)),
            Newarray | Anewarray => (Fixed(INT), Fixed(REF)),
            Arraylength => (Fixed(REF), Fixed(INT)),
            Checkcast => (Fixed(REF), Fixed(REF)),
            Instanceof => (Fixed(REF), Fixed(INT)),
        };
        InstructionDescriptor { mnemonic: self, label: self.name(), inputs, outputs }
    }

    pub fn flow(self) -> Flow {
        use Mnemonic::*;
        match self {
            Ifeq | Ifne | Iflt | Ifge | Ifgt | Ifle | IfIcmpeq | IfIcmpne | IfIcmplt | IfIcmpge | IfIcmpgt
            | IfIcmple | IfAcmpeq | IfAcmpne | Ifnull | Ifnonnull => Flow::Branch,
            Goto => Flow::Goto,
            Tableswitch | Lookupswitch => Flow::Switch,
            Ireturn | Lreturn | Freturn | Dreturn | Areturn | Return | Athrow => Flow::Exit,
            _ => Flow::Next,
        }
    }

    pub fn format(self) -> Format {
        use Mnemonic::*;
        match self {
            Bipush => Format::Byte,
            Sipush => Format::Short,
            Newarray => Format::ArrayType,
            Iload | Lload | Fload | Dload | Aload | Istore | Lstore | Fstore | Dstore | Astore => Format::Local,
            Iinc => Format::Iinc,
            Ldc => Format::Constant8,
            LdcW | Ldc2W | Getstatic | Putstatic | Getfield | Putfield | Invokevirtual | Invokespecial
            | Invokestatic | New | Anewarray | Checkcast | Instanceof => Format::Constant16,
            Invokeinterface => Format::Interface,
            Invokedynamic => Format::Dynamic,
            Tableswitch => Format::TableSwitch,
            Lookupswitch => Format::LookupSwitch,
            _ if self.flow() == Flow::Branch || self == Goto => Format::Branch,
            _ => Format::None,
        }
    }

    /// The conditional branch taken when the opposite condition holds
    pub fn negated(self) -> Option<Mnemonic> {
        use Mnemonic::*;
        Some(match self {
            Ifeq => Ifne,
            Ifne => Ifeq,
            Iflt => Ifge,
            Ifge => Iflt,
            Ifgt => Ifle,
            Ifle => Ifgt,
            IfIcmpeq => IfIcmpne,
            IfIcmpne => IfIcmpeq,
            IfIcmplt => IfIcmpge,
            IfIcmpge => IfIcmplt,
            IfIcmpgt => IfIcmple,
            IfIcmple => IfIcmpgt,
            IfAcmpeq => IfAcmpne,
            IfAcmpne => IfAcmpeq,
            Ifnull => Ifnonnull,
            Ifnonnull => Ifnull,
            _ => return None,
        })
    }
}
