//! Dalvik executable instruction set
//!
//! More details can be taken from [Android Docs: Dalvik executable
//! instruction formats](https://source.android.com/docs/core/runtime/instruction-formats)
//!
//! Every assigned opcode carries its mnemonic, operand format, and length in
//! 16-bit code units; unassigned opcode bytes are `None` in the table and
//! stop decoding of the enclosing method. The three payload pseudo-opcodes
//! (packed-switch, sparse-switch, fill-array-data) are recognized through
//! the high byte of a `nop` unit and sized from their payload headers.

use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt::Debug;
use std::io::{self, Cursor, Seek, SeekFrom};

use crate::dex::{CodeItem, FillArrayData, PackedSwitch, SparseSwitch};
use crate::error::DexError;

/// A symbolic operand, kept as an index into the owning table. Resolution
/// happens at rendering time against the parsed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Index {
    String(u32),
    Type(u32),
    Field(u32),
    Method(u32),
    Proto(u32),
    CallSite(u32),
    MethodHandle(u32),
    Unknown(u32),
}

/// What kind of table the index operand of an opcode points into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    None,
    StringRef,
    TypeRef,
    FieldRef,
    MethodRef,
    ProtoRef,
    CallSiteRef,
    MethodHandleRef,
}

impl IndexKind {
    fn index(&self, raw: u32) -> Index {
        match self {
            IndexKind::StringRef => Index::String(raw),
            IndexKind::TypeRef => Index::Type(raw),
            IndexKind::FieldRef => Index::Field(raw),
            IndexKind::MethodRef => Index::Method(raw),
            IndexKind::ProtoRef => Index::Proto(raw),
            IndexKind::CallSiteRef => Index::CallSite(raw),
            IndexKind::MethodHandleRef => Index::MethodHandle(raw),
            IndexKind::None => Index::Unknown(raw),
        }
    }
}

/// Operand format identifiers, named after the Dalvik instruction format
/// letter classes.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    k10x,
    k12x,
    k11n,
    k11x,
    k10t,
    k20t,
    k22x,
    k21t,
    k21s,
    k21h,
    k21c,
    k23x,
    k22b,
    k22t,
    k22s,
    k22c,
    k30t,
    k32x,
    k31i,
    k31t,
    k31c,
    k35c,
    k3rc,
    k45cc,
    k4rcc,
    k51l,
    /// switch and array payloads, variable length
    kPayload,
}

/// Decoded operands of one instruction, one variant per format.
#[derive(Debug, Clone, PartialEq)]
pub enum InsnFormat {
    Format10x,
    Format12x { a: u8, b: u8 },
    Format11n { a: u8, b: i8 },
    Format11x { a: u8 },
    Format10t { a: i8 },
    Format20t { a: i16 },
    Format22x { a: u8, b: u16 },
    Format21t { a: u8, b: i16 },
    Format21s { a: u8, b: i16 },
    Format21h { a: u8, b: i16 },
    Format21c { a: u8, b: Index },
    Format23x { a: u8, b: u8, c: u8 },
    Format22b { a: u8, b: u8, c: i8 },
    Format22t { a: u8, b: u8, c: i16 },
    Format22s { a: u8, b: u8, c: i16 },
    Format22c { a: u8, b: u8, c: Index },
    Format30t { a: i32 },
    Format32x { a: u16, b: u16 },
    Format31i { a: u8, b: i32 },
    Format31t { a: u8, b: i32 },
    Format31c { a: u8, b: Index },
    Format35c { b: Index, regs: Vec<u8> },
    Format3rc { b: Index, first: u16, count: u8 },
    Format45cc { b: Index, h: Index, regs: Vec<u8> },
    Format4rcc { b: Index, h: Index, first: u16, count: u8 },
    Format51l { a: u8, b: i64 },
    /// payload pseudo-instructions carry their data in [Insn::payload]
    Format00x,
}

/// Decoded contents of a payload pseudo-instruction.
#[derive(Debug, Clone)]
pub enum Payload {
    PackedSwitch(PackedSwitch),
    SparseSwitch(SparseSwitch),
    FillArrayData(FillArrayData),
}

pub struct Opcode {
    pub value: u8,
    pub name: &'static str,
    pub format: Format,
    /// instruction length in 16-bit code units; payload lengths are derived
    /// from the payload header instead
    pub length: u8,
    pub index: IndexKind,
}

impl Debug for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Opcode{{val={:02x}, name={}, format={:?}, length={}}}",
            self.value, self.name, self.format, self.length
        )
    }
}

/// One decoded instruction.
#[derive(Debug, Clone)]
pub struct Insn {
    /// position of the first code unit, counted in code units from the
    /// start of the method's instruction stream
    pub offset: usize,
    pub opcode: &'static Opcode,
    pub format: InsnFormat,
    pub payload: Option<Payload>,
}

impl Insn {
    pub fn mnemonic(&self) -> &'static str {
        self.opcode.name
    }
}

/// A best-effort instruction listing for one method body.
///
/// Decoding stops at the first defect, leaving everything decoded up to
/// that point in `insns` and the defect in `error`; a corrupt method body
/// never fails the surrounding file model.
#[derive(Debug)]
pub struct Disassembly {
    pub insns: Vec<Insn>,
    pub error: Option<DexError>,
}

macro_rules! opcode {
    () => {
        None
    };
    ($name:literal := $value:literal $format:ident [len=$len:literal]) => {
        Some(Opcode {
            value: $value,
            name: $name,
            format: Format::$format,
            length: $len,
            index: IndexKind::None,
        })
    };
    ($name:literal := $value:literal $format:ident [len=$len:literal, $index:ident]) => {
        Some(Opcode {
            value: $value,
            name: $name,
            format: Format::$format,
            length: $len,
            index: IndexKind::$index,
        })
    };
}

/* Notes on the opcode definitions below:

The first identifier is the mnemonic, followed by the opcode byte, the
format identifier, the instruction length in code units, and optionally the
table its index operand refers to. Slots without an assigned opcode hold
`None`; hitting one at decode time stops the method with an unknown-opcode
error. */
#[rustfmt::skip]
pub static OPCODES: [Option<Opcode>; 256] = [
    opcode! { "nop" := 0x00 k10x [len=1] },
    // move ops
    opcode! { "move"               := 0x01 k12x [len=1] },
    opcode! { "move/from16"        := 0x02 k22x [len=2] },
    opcode! { "move/16"            := 0x03 k32x [len=3] },
    opcode! { "move-wide"          := 0x04 k12x [len=1] },
    opcode! { "move-wide/from16"   := 0x05 k22x [len=2] },
    opcode! { "move-wide/16"       := 0x06 k32x [len=3] },
    opcode! { "move-object"        := 0x07 k12x [len=1] },
    opcode! { "move-object/from16" := 0x08 k22x [len=2] },
    opcode! { "move-object/16"     := 0x09 k32x [len=3] },
    opcode! { "move-result"        := 0x0A k11x [len=1] },
    opcode! { "move-result-wide"   := 0x0B k11x [len=1] },
    opcode! { "move-result-object" := 0x0C k11x [len=1] },
    opcode! { "move-exception"     := 0x0D k11x [len=1] },
    // return ops
    opcode! { "return-void"   := 0x0E k10x [len=1] },
    opcode! { "return"        := 0x0F k11x [len=1] },
    opcode! { "return-wide"   := 0x10 k11x [len=1] },
    opcode! { "return-object" := 0x11 k11x [len=1] },
    // const ops
    opcode! { "const/4"            := 0x12 k11n [len=1] },
    opcode! { "const/16"           := 0x13 k21s [len=2] },
    opcode! { "const"              := 0x14 k31i [len=3] },
    opcode! { "const/high16"       := 0x15 k21h [len=2] },
    opcode! { "const-wide/16"      := 0x16 k21s [len=2] },
    opcode! { "const-wide/32"      := 0x17 k31i [len=3] },
    opcode! { "const-wide"         := 0x18 k51l [len=5] },
    opcode! { "const-wide/high16"  := 0x19 k21h [len=2] },
    opcode! { "const-string"       := 0x1A k21c [len=2, StringRef] },
    opcode! { "const-string/jumbo" := 0x1B k31c [len=3, StringRef] },
    opcode! { "const-class"        := 0x1C k21c [len=2, TypeRef] },
    // monitor ops
    opcode! { "monitor-enter" := 0x1D k11x [len=1] },
    opcode! { "monitor-exit"  := 0x1E k11x [len=1] },
    // type checks
    opcode! { "check-cast"   := 0x1F k21c [len=2, TypeRef] },
    opcode! { "instance-of"  := 0x20 k22c [len=2, TypeRef] },
    opcode! { "array-length" := 0x21 k12x [len=1] },
    // allocation
    opcode! { "new-instance"           := 0x22 k21c [len=2, TypeRef] },
    opcode! { "new-array"              := 0x23 k22c [len=2, TypeRef] },
    opcode! { "filled-new-array"       := 0x24 k35c [len=3, TypeRef] },
    opcode! { "filled-new-array/range" := 0x25 k3rc [len=3, TypeRef] },
    opcode! { "fill-array-data"        := 0x26 k31t [len=3] },
    // throw
    opcode! { "throw" := 0x27 k11x [len=1] },
    // goto
    opcode! { "goto"    := 0x28 k10t [len=1] },
    opcode! { "goto/16" := 0x29 k20t [len=2] },
    opcode! { "goto/32" := 0x2A k30t [len=3] },
    // switches
    opcode! { "packed-switch" := 0x2B k31t [len=3] },
    opcode! { "sparse-switch" := 0x2C k31t [len=3] },
    // comparisons
    opcode! { "cmpl-float"  := 0x2D k23x [len=2] },
    opcode! { "cmpg-float"  := 0x2E k23x [len=2] },
    opcode! { "cmpl-double" := 0x2F k23x [len=2] },
    opcode! { "cmpg-double" := 0x30 k23x [len=2] },
    opcode! { "cmp-long"    := 0x31 k23x [len=2] },
    // if ops
    opcode! { "if-eq"  := 0x32 k22t [len=2] },
    opcode! { "if-ne"  := 0x33 k22t [len=2] },
    opcode! { "if-lt"  := 0x34 k22t [len=2] },
    opcode! { "if-ge"  := 0x35 k22t [len=2] },
    opcode! { "if-gt"  := 0x36 k22t [len=2] },
    opcode! { "if-le"  := 0x37 k22t [len=2] },
    opcode! { "if-eqz" := 0x38 k21t [len=2] },
    opcode! { "if-nez" := 0x39 k21t [len=2] },
    opcode! { "if-ltz" := 0x3A k21t [len=2] },
    opcode! { "if-gez" := 0x3B k21t [len=2] },
    opcode! { "if-gtz" := 0x3C k21t [len=2] },
    opcode! { "if-lez" := 0x3D k21t [len=2] },
    // 0x3E..0x43 unused
    opcode!(), opcode!(), opcode!(), opcode!(), opcode!(), opcode!(),
    // array ops
    opcode! { "aget"         := 0x44 k23x [len=2] },
    opcode! { "aget-wide"    := 0x45 k23x [len=2] },
    opcode! { "aget-object"  := 0x46 k23x [len=2] },
    opcode! { "aget-boolean" := 0x47 k23x [len=2] },
    opcode! { "aget-byte"    := 0x48 k23x [len=2] },
    opcode! { "aget-char"    := 0x49 k23x [len=2] },
    opcode! { "aget-short"   := 0x4A k23x [len=2] },
    opcode! { "aput"         := 0x4B k23x [len=2] },
    opcode! { "aput-wide"    := 0x4C k23x [len=2] },
    opcode! { "aput-object"  := 0x4D k23x [len=2] },
    opcode! { "aput-boolean" := 0x4E k23x [len=2] },
    opcode! { "aput-byte"    := 0x4F k23x [len=2] },
    opcode! { "aput-char"    := 0x50 k23x [len=2] },
    opcode! { "aput-short"   := 0x51 k23x [len=2] },
    // instance field ops
    opcode! { "iget"         := 0x52 k22c [len=2, FieldRef] },
    opcode! { "iget-wide"    := 0x53 k22c [len=2, FieldRef] },
    opcode! { "iget-object"  := 0x54 k22c [len=2, FieldRef] },
    opcode! { "iget-boolean" := 0x55 k22c [len=2, FieldRef] },
    opcode! { "iget-byte"    := 0x56 k22c [len=2, FieldRef] },
    opcode! { "iget-char"    := 0x57 k22c [len=2, FieldRef] },
    opcode! { "iget-short"   := 0x58 k22c [len=2, FieldRef] },
    opcode! { "iput"         := 0x59 k22c [len=2, FieldRef] },
    opcode! { "iput-wide"    := 0x5A k22c [len=2, FieldRef] },
    opcode! { "iput-object"  := 0x5B k22c [len=2, FieldRef] },
    opcode! { "iput-boolean" := 0x5C k22c [len=2, FieldRef] },
    opcode! { "iput-byte"    := 0x5D k22c [len=2, FieldRef] },
    opcode! { "iput-char"    := 0x5E k22c [len=2, FieldRef] },
    opcode! { "iput-short"   := 0x5F k22c [len=2, FieldRef] },
    // static field ops
    opcode! { "sget"         := 0x60 k21c [len=2, FieldRef] },
    opcode! { "sget-wide"    := 0x61 k21c [len=2, FieldRef] },
    opcode! { "sget-object"  := 0x62 k21c [len=2, FieldRef] },
    opcode! { "sget-boolean" := 0x63 k21c [len=2, FieldRef] },
    opcode! { "sget-byte"    := 0x64 k21c [len=2, FieldRef] },
    opcode! { "sget-char"    := 0x65 k21c [len=2, FieldRef] },
    opcode! { "sget-short"   := 0x66 k21c [len=2, FieldRef] },
    opcode! { "sput"         := 0x67 k21c [len=2, FieldRef] },
    opcode! { "sput-wide"    := 0x68 k21c [len=2, FieldRef] },
    opcode! { "sput-object"  := 0x69 k21c [len=2, FieldRef] },
    opcode! { "sput-boolean" := 0x6A k21c [len=2, FieldRef] },
    opcode! { "sput-byte"    := 0x6B k21c [len=2, FieldRef] },
    opcode! { "sput-char"    := 0x6C k21c [len=2, FieldRef] },
    opcode! { "sput-short"   := 0x6D k21c [len=2, FieldRef] },
    // invoke ops
    opcode! { "invoke-virtual"   := 0x6E k35c [len=3, MethodRef] },
    opcode! { "invoke-super"     := 0x6F k35c [len=3, MethodRef] },
    opcode! { "invoke-direct"    := 0x70 k35c [len=3, MethodRef] },
    opcode! { "invoke-static"    := 0x71 k35c [len=3, MethodRef] },
    opcode! { "invoke-interface" := 0x72 k35c [len=3, MethodRef] },
    // 0x73 unused
    opcode!(),
    opcode! { "invoke-virtual/range"   := 0x74 k3rc [len=3, MethodRef] },
    opcode! { "invoke-super/range"     := 0x75 k3rc [len=3, MethodRef] },
    opcode! { "invoke-direct/range"    := 0x76 k3rc [len=3, MethodRef] },
    opcode! { "invoke-static/range"    := 0x77 k3rc [len=3, MethodRef] },
    opcode! { "invoke-interface/range" := 0x78 k3rc [len=3, MethodRef] },
    // 0x79..0x7A unused
    opcode!(), opcode!(),
    // unary ops
    opcode! { "neg-int"         := 0x7B k12x [len=1] },
    opcode! { "not-int"         := 0x7C k12x [len=1] },
    opcode! { "neg-long"        := 0x7D k12x [len=1] },
    opcode! { "not-long"        := 0x7E k12x [len=1] },
    opcode! { "neg-float"       := 0x7F k12x [len=1] },
    opcode! { "neg-double"      := 0x80 k12x [len=1] },
    opcode! { "int-to-long"     := 0x81 k12x [len=1] },
    opcode! { "int-to-float"    := 0x82 k12x [len=1] },
    opcode! { "int-to-double"   := 0x83 k12x [len=1] },
    opcode! { "long-to-int"     := 0x84 k12x [len=1] },
    opcode! { "long-to-float"   := 0x85 k12x [len=1] },
    opcode! { "long-to-double"  := 0x86 k12x [len=1] },
    opcode! { "float-to-int"    := 0x87 k12x [len=1] },
    opcode! { "float-to-long"   := 0x88 k12x [len=1] },
    opcode! { "float-to-double" := 0x89 k12x [len=1] },
    opcode! { "double-to-int"   := 0x8A k12x [len=1] },
    opcode! { "double-to-long"  := 0x8B k12x [len=1] },
    opcode! { "double-to-float" := 0x8C k12x [len=1] },
    opcode! { "int-to-byte"     := 0x8D k12x [len=1] },
    opcode! { "int-to-char"     := 0x8E k12x [len=1] },
    opcode! { "int-to-short"    := 0x8F k12x [len=1] },
    // binary ops
    opcode! { "add-int"    := 0x90 k23x [len=2] },
    opcode! { "sub-int"    := 0x91 k23x [len=2] },
    opcode! { "mul-int"    := 0x92 k23x [len=2] },
    opcode! { "div-int"    := 0x93 k23x [len=2] },
    opcode! { "rem-int"    := 0x94 k23x [len=2] },
    opcode! { "and-int"    := 0x95 k23x [len=2] },
    opcode! { "or-int"     := 0x96 k23x [len=2] },
    opcode! { "xor-int"    := 0x97 k23x [len=2] },
    opcode! { "shl-int"    := 0x98 k23x [len=2] },
    opcode! { "shr-int"    := 0x99 k23x [len=2] },
    opcode! { "ushr-int"   := 0x9A k23x [len=2] },
    opcode! { "add-long"   := 0x9B k23x [len=2] },
    opcode! { "sub-long"   := 0x9C k23x [len=2] },
    opcode! { "mul-long"   := 0x9D k23x [len=2] },
    opcode! { "div-long"   := 0x9E k23x [len=2] },
    opcode! { "rem-long"   := 0x9F k23x [len=2] },
    opcode! { "and-long"   := 0xA0 k23x [len=2] },
    opcode! { "or-long"    := 0xA1 k23x [len=2] },
    opcode! { "xor-long"   := 0xA2 k23x [len=2] },
    opcode! { "shl-long"   := 0xA3 k23x [len=2] },
    opcode! { "shr-long"   := 0xA4 k23x [len=2] },
    opcode! { "ushr-long"  := 0xA5 k23x [len=2] },
    opcode! { "add-float"  := 0xA6 k23x [len=2] },
    opcode! { "sub-float"  := 0xA7 k23x [len=2] },
    opcode! { "mul-float"  := 0xA8 k23x [len=2] },
    opcode! { "div-float"  := 0xA9 k23x [len=2] },
    opcode! { "rem-float"  := 0xAA k23x [len=2] },
    opcode! { "add-double" := 0xAB k23x [len=2] },
    opcode! { "sub-double" := 0xAC k23x [len=2] },
    opcode! { "mul-double" := 0xAD k23x [len=2] },
    opcode! { "div-double" := 0xAE k23x [len=2] },
    opcode! { "rem-double" := 0xAF k23x [len=2] },
    // binary ops, accumulator form
    opcode! { "add-int/2addr"    := 0xB0 k12x [len=1] },
    opcode! { "sub-int/2addr"    := 0xB1 k12x [len=1] },
    opcode! { "mul-int/2addr"    := 0xB2 k12x [len=1] },
    opcode! { "div-int/2addr"    := 0xB3 k12x [len=1] },
    opcode! { "rem-int/2addr"    := 0xB4 k12x [len=1] },
    opcode! { "and-int/2addr"    := 0xB5 k12x [len=1] },
    opcode! { "or-int/2addr"     := 0xB6 k12x [len=1] },
    opcode! { "xor-int/2addr"    := 0xB7 k12x [len=1] },
    opcode! { "shl-int/2addr"    := 0xB8 k12x [len=1] },
    opcode! { "shr-int/2addr"    := 0xB9 k12x [len=1] },
    opcode! { "ushr-int/2addr"   := 0xBA k12x [len=1] },
    opcode! { "add-long/2addr"   := 0xBB k12x [len=1] },
    opcode! { "sub-long/2addr"   := 0xBC k12x [len=1] },
    opcode! { "mul-long/2addr"   := 0xBD k12x [len=1] },
    opcode! { "div-long/2addr"   := 0xBE k12x [len=1] },
    opcode! { "rem-long/2addr"   := 0xBF k12x [len=1] },
    opcode! { "and-long/2addr"   := 0xC0 k12x [len=1] },
    opcode! { "or-long/2addr"    := 0xC1 k12x [len=1] },
    opcode! { "xor-long/2addr"   := 0xC2 k12x [len=1] },
    opcode! { "shl-long/2addr"   := 0xC3 k12x [len=1] },
    opcode! { "shr-long/2addr"   := 0xC4 k12x [len=1] },
    opcode! { "ushr-long/2addr"  := 0xC5 k12x [len=1] },
    opcode! { "add-float/2addr"  := 0xC6 k12x [len=1] },
    opcode! { "sub-float/2addr"  := 0xC7 k12x [len=1] },
    opcode! { "mul-float/2addr"  := 0xC8 k12x [len=1] },
    opcode! { "div-float/2addr"  := 0xC9 k12x [len=1] },
    opcode! { "rem-float/2addr"  := 0xCA k12x [len=1] },
    opcode! { "add-double/2addr" := 0xCB k12x [len=1] },
    opcode! { "sub-double/2addr" := 0xCC k12x [len=1] },
    opcode! { "mul-double/2addr" := 0xCD k12x [len=1] },
    opcode! { "div-double/2addr" := 0xCE k12x [len=1] },
    opcode! { "rem-double/2addr" := 0xCF k12x [len=1] },
    // binary ops with 16-bit literal
    opcode! { "add-int/lit16"  := 0xD0 k22s [len=2] },
    opcode! { "rsub-int"       := 0xD1 k22s [len=2] },
    opcode! { "mul-int/lit16"  := 0xD2 k22s [len=2] },
    opcode! { "div-int/lit16"  := 0xD3 k22s [len=2] },
    opcode! { "rem-int/lit16"  := 0xD4 k22s [len=2] },
    opcode! { "and-int/lit16"  := 0xD5 k22s [len=2] },
    opcode! { "or-int/lit16"   := 0xD6 k22s [len=2] },
    opcode! { "xor-int/lit16"  := 0xD7 k22s [len=2] },
    // binary ops with 8-bit literal
    opcode! { "add-int/lit8"   := 0xD8 k22b [len=2] },
    opcode! { "rsub-int/lit8"  := 0xD9 k22b [len=2] },
    opcode! { "mul-int/lit8"   := 0xDA k22b [len=2] },
    opcode! { "div-int/lit8"   := 0xDB k22b [len=2] },
    opcode! { "rem-int/lit8"   := 0xDC k22b [len=2] },
    opcode! { "and-int/lit8"   := 0xDD k22b [len=2] },
    opcode! { "or-int/lit8"    := 0xDE k22b [len=2] },
    opcode! { "xor-int/lit8"   := 0xDF k22b [len=2] },
    opcode! { "shl-int/lit8"   := 0xE0 k22b [len=2] },
    opcode! { "shr-int/lit8"   := 0xE1 k22b [len=2] },
    opcode! { "ushr-int/lit8"  := 0xE2 k22b [len=2] },
    // 0xE3..0xF9 unused
    opcode!(), opcode!(), opcode!(), opcode!(), opcode!(), opcode!(),
    opcode!(), opcode!(), opcode!(), opcode!(), opcode!(), opcode!(),
    opcode!(), opcode!(), opcode!(), opcode!(), opcode!(), opcode!(),
    opcode!(), opcode!(), opcode!(), opcode!(), opcode!(),
    opcode! { "invoke-polymorphic"       := 0xFA k45cc [len=4, MethodRef] },
    opcode! { "invoke-polymorphic/range" := 0xFB k4rcc [len=4, MethodRef] },
    opcode! { "invoke-custom"            := 0xFC k35c  [len=3, CallSiteRef] },
    opcode! { "invoke-custom/range"      := 0xFD k3rc  [len=3, CallSiteRef] },
    opcode! { "const-method-handle"      := 0xFE k21c  [len=2, MethodHandleRef] },
    opcode! { "const-method-type"        := 0xFF k21c  [len=2, ProtoRef] },
];

static NOP: Opcode = Opcode {
    value: 0x00,
    name: "nop",
    format: Format::k10x,
    length: 1,
    index: IndexKind::None,
};

pub static PACKED_SWITCH_PAYLOAD: Opcode = Opcode {
    value: 0x00,
    name: "packed-switch-payload",
    format: Format::kPayload,
    length: 0,
    index: IndexKind::None,
};

pub static SPARSE_SWITCH_PAYLOAD: Opcode = Opcode {
    value: 0x00,
    name: "sparse-switch-payload",
    format: Format::kPayload,
    length: 0,
    index: IndexKind::None,
};

pub static FILL_ARRAY_DATA_PAYLOAD: Opcode = Opcode {
    value: 0x00,
    name: "fill-array-data-payload",
    format: Format::kPayload,
    length: 0,
    index: IndexKind::None,
};

/// identifier units of the payload pseudo-instructions, found at the
/// branch targets of 31t instructions
pub const PACKED_SWITCH_SIGNATURE: u16 = 0x0100;
pub const SPARSE_SWITCH_SIGNATURE: u16 = 0x0200;
pub const FILL_ARRAY_DATA_SIGNATURE: u16 = 0x0300;

/// Disassembles one method body.
pub fn disasm(code: &CodeItem) -> Disassembly {
    let mut insns = Vec::new();
    let mut cursor = Cursor::new(code.insns.as_slice());
    let total = code.insns.len() as u64;

    while cursor.position() < total {
        let offset = (cursor.position() / 2) as usize;
        let unit = match cursor.read_u16::<LittleEndian>() {
            Ok(unit) => unit,
            Err(_) => break, // trailing odd byte, nothing left to decode
        };

        let opcode = (unit & 0xFF) as u8;
        let is_payload = matches!(
            unit,
            PACKED_SWITCH_SIGNATURE | SPARSE_SWITCH_SIGNATURE | FILL_ARRAY_DATA_SIGNATURE
        );
        let decoded = if is_payload {
            read_payload(unit, offset, &mut cursor)
        } else {
            match &OPCODES[opcode as usize] {
                Some(op) => read_insn(op, unit, offset, &mut cursor),
                None => Err(DexError::UnknownOpcode { opcode, offset }),
            }
        };

        match decoded {
            Ok(insn) => insns.push(insn),
            Err(error) => {
                return Disassembly {
                    insns,
                    error: Some(error),
                }
            }
        }
    }

    Disassembly { insns, error: None }
}

fn short_input(e: io::Error) -> DexError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        DexError::ShortInput
    } else {
        DexError::Io(e)
    }
}

fn read_insn(
    op: &'static Opcode,
    unit: u16,
    offset: usize,
    cursor: &mut Cursor<&[u8]>,
) -> Result<Insn, DexError> {
    let format = read_operands(op, unit, cursor).map_err(short_input)?;
    Ok(Insn {
        offset,
        opcode: op,
        format,
        payload: None,
    })
}

/// Decodes the operands of a fixed-format instruction. The first code unit
/// has already been consumed and is passed in; the cursor sits on the
/// second unit.
fn read_operands(
    op: &'static Opcode,
    unit: u16,
    code: &mut Cursor<&[u8]>,
) -> io::Result<InsnFormat> {
    // register nibbles and the AA byte of the first unit
    let aa = (unit >> 8) as u8;
    let a4 = ((unit >> 8) & 0x0F) as u8;
    let b4 = ((unit >> 12) & 0x0F) as u8;

    Ok(match op.format {
        Format::k10x | Format::kPayload => InsnFormat::Format10x,
        Format::k12x => InsnFormat::Format12x { a: a4, b: b4 },
        Format::k11n => InsnFormat::Format11n {
            a: a4,
            // the literal nibble lives in the top bits, shift arithmetic
            b: ((unit as i16) >> 12) as i8,
        },
        Format::k11x => InsnFormat::Format11x { a: aa },
        Format::k10t => InsnFormat::Format10t { a: aa as i8 },
        Format::k20t => InsnFormat::Format20t {
            a: code.read_i16::<LittleEndian>()?,
        },
        Format::k22x => InsnFormat::Format22x {
            a: aa,
            b: code.read_u16::<LittleEndian>()?,
        },
        Format::k21t => InsnFormat::Format21t {
            a: aa,
            b: code.read_i16::<LittleEndian>()?,
        },
        Format::k21s => InsnFormat::Format21s {
            a: aa,
            b: code.read_i16::<LittleEndian>()?,
        },
        Format::k21h => InsnFormat::Format21h {
            a: aa,
            b: code.read_i16::<LittleEndian>()?,
        },
        Format::k21c => InsnFormat::Format21c {
            a: aa,
            b: op.index.index(code.read_u16::<LittleEndian>()? as u32),
        },
        Format::k23x => {
            let bc = code.read_u16::<LittleEndian>()?;
            InsnFormat::Format23x {
                a: aa,
                b: (bc & 0xFF) as u8,
                c: (bc >> 8) as u8,
            }
        }
        Format::k22b => {
            let bc = code.read_u16::<LittleEndian>()?;
            InsnFormat::Format22b {
                a: aa,
                b: (bc & 0xFF) as u8,
                c: (bc >> 8) as u8 as i8,
            }
        }
        Format::k22t => InsnFormat::Format22t {
            a: a4,
            b: b4,
            c: code.read_i16::<LittleEndian>()?,
        },
        Format::k22s => InsnFormat::Format22s {
            a: a4,
            b: b4,
            c: code.read_i16::<LittleEndian>()?,
        },
        Format::k22c => InsnFormat::Format22c {
            a: a4,
            b: b4,
            c: op.index.index(code.read_u16::<LittleEndian>()? as u32),
        },
        Format::k30t => InsnFormat::Format30t {
            a: code.read_i32::<LittleEndian>()?,
        },
        Format::k32x => InsnFormat::Format32x {
            a: code.read_u16::<LittleEndian>()?,
            b: code.read_u16::<LittleEndian>()?,
        },
        Format::k31i => InsnFormat::Format31i {
            a: aa,
            b: code.read_i32::<LittleEndian>()?,
        },
        Format::k31t => InsnFormat::Format31t {
            a: aa,
            b: code.read_i32::<LittleEndian>()?,
        },
        Format::k31c => InsnFormat::Format31c {
            a: aa,
            b: op.index.index(code.read_u32::<LittleEndian>()?),
        },
        Format::k35c => {
            let count = (b4 as usize).min(5);
            let index = op.index.index(code.read_u16::<LittleEndian>()? as u32);
            let regs_unit = code.read_u16::<LittleEndian>()?;
            let all = [
                (regs_unit & 0x0F) as u8,
                ((regs_unit >> 4) & 0x0F) as u8,
                ((regs_unit >> 8) & 0x0F) as u8,
                ((regs_unit >> 12) & 0x0F) as u8,
                a4,
            ];
            InsnFormat::Format35c {
                b: index,
                regs: all[..count].to_vec(),
            }
        }
        Format::k3rc => {
            let index = op.index.index(code.read_u16::<LittleEndian>()? as u32);
            let first = code.read_u16::<LittleEndian>()?;
            InsnFormat::Format3rc {
                b: index,
                first,
                count: aa,
            }
        }
        Format::k45cc => {
            let count = (b4 as usize).min(5);
            let index = op.index.index(code.read_u16::<LittleEndian>()? as u32);
            let regs_unit = code.read_u16::<LittleEndian>()?;
            let proto = Index::Proto(code.read_u16::<LittleEndian>()? as u32);
            let all = [
                (regs_unit & 0x0F) as u8,
                ((regs_unit >> 4) & 0x0F) as u8,
                ((regs_unit >> 8) & 0x0F) as u8,
                ((regs_unit >> 12) & 0x0F) as u8,
                a4,
            ];
            InsnFormat::Format45cc {
                b: index,
                h: proto,
                regs: all[..count].to_vec(),
            }
        }
        Format::k4rcc => {
            let index = op.index.index(code.read_u16::<LittleEndian>()? as u32);
            let first = code.read_u16::<LittleEndian>()?;
            let proto = Index::Proto(code.read_u16::<LittleEndian>()? as u32);
            InsnFormat::Format4rcc {
                b: index,
                h: proto,
                first,
                count: aa,
            }
        }
        Format::k51l => InsnFormat::Format51l {
            a: aa,
            b: code.read_i64::<LittleEndian>()?,
        },
    })
}

/// Decodes a payload pseudo-instruction. The identifier unit has been
/// consumed; payloads occupy whole code units, so fill-array-data contents
/// with an odd byte length are followed by one byte of padding.
fn read_payload(
    unit: u16,
    offset: usize,
    cursor: &mut Cursor<&[u8]>,
) -> Result<Insn, DexError> {
    use binrw::BinRead;

    let (opcode, payload) = match unit {
        PACKED_SWITCH_SIGNATURE => (
            &PACKED_SWITCH_PAYLOAD,
            Payload::PackedSwitch(PackedSwitch::read(cursor)?),
        ),
        SPARSE_SWITCH_SIGNATURE => (
            &SPARSE_SWITCH_PAYLOAD,
            Payload::SparseSwitch(SparseSwitch::read(cursor)?),
        ),
        FILL_ARRAY_DATA_SIGNATURE => {
            let data = FillArrayData::read(cursor)?;
            if cursor.position() % 2 != 0 {
                cursor.seek(SeekFrom::Current(1)).map_err(short_input)?;
            }
            (&FILL_ARRAY_DATA_PAYLOAD, Payload::FillArrayData(data))
        }
        // a nop whose high byte carries no payload signature is just a nop
        _ => {
            return Ok(Insn {
                offset,
                opcode: &NOP,
                format: InsnFormat::Format10x,
                payload: None,
            })
        }
    };

    Ok(Insn {
        offset,
        opcode,
        format: InsnFormat::Format00x,
        payload: Some(payload),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_item(units: &[u16]) -> CodeItem {
        let mut insns = Vec::with_capacity(units.len() * 2);
        for unit in units {
            insns.extend_from_slice(&unit.to_le_bytes());
        }
        CodeItem {
            registers_size: 1,
            ins_size: 0,
            outs_size: 0,
            tries_size: 0,
            debug_info_off: 0,
            insns_size: units.len() as u32,
            insns,
        }
    }

    #[test]
    fn test_table_is_complete() {
        // every assigned opcode sits in its own slot
        for (i, entry) in OPCODES.iter().enumerate() {
            if let Some(op) = entry {
                assert_eq!(op.value as usize, i);
                assert!((1..=5).contains(&op.length));
            }
        }
        assert!(OPCODES[0x3E].is_none());
        assert!(OPCODES[0x73].is_none());
        assert!(OPCODES[0xE3].is_none());
    }

    #[test]
    fn test_return_void() {
        let out = disasm(&code_item(&[0x000E]));
        assert!(out.error.is_none());
        assert_eq!(out.insns.len(), 1);
        assert_eq!(out.insns[0].mnemonic(), "return-void");
        assert_eq!(out.insns[0].offset, 0);
    }

    #[test]
    fn test_const_string_operands() {
        // const-string v0, string@7 ; return-void
        let out = disasm(&code_item(&[0x001A, 0x0007, 0x000E]));
        assert!(out.error.is_none());
        assert_eq!(out.insns.len(), 2);
        assert_eq!(
            out.insns[0].format,
            InsnFormat::Format21c {
                a: 0,
                b: Index::String(7)
            }
        );
        assert_eq!(out.insns[1].offset, 2);
    }

    #[test]
    fn test_invoke_virtual_register_list() {
        // invoke-virtual {v1, v2}, method@3
        let out = disasm(&code_item(&[0x206E, 0x0003, 0x0021]));
        assert!(out.error.is_none());
        assert_eq!(
            out.insns[0].format,
            InsnFormat::Format35c {
                b: Index::Method(3),
                regs: vec![1, 2]
            }
        );
    }

    #[test]
    fn test_unknown_opcode_is_isolated() {
        // return-void, then an unassigned opcode
        let out = disasm(&code_item(&[0x000E, 0x003E]));
        assert_eq!(out.insns.len(), 1);
        assert!(matches!(
            out.error,
            Some(DexError::UnknownOpcode {
                opcode: 0x3E,
                offset: 1
            })
        ));
    }

    #[test]
    fn test_truncated_operands() {
        // const-string needs a second unit
        let out = disasm(&code_item(&[0x001A]));
        assert!(out.insns.is_empty());
        assert!(matches!(out.error, Some(DexError::ShortInput)));
    }

    #[test]
    fn test_packed_switch_payload_length() {
        // packed-switch v0, +3 ; payload with two targets ; return-void
        let units = [
            0x002B, 0x0003, 0x0000, // packed-switch v0, +3
            PACKED_SWITCH_SIGNATURE,
            0x0002, // size
            0x000A, 0x0000, // first_key = 10
            0x0005, 0x0000, // target 0
            0x0007, 0x0000, // target 1
            0x000E, // return-void
        ];
        let out = disasm(&code_item(&units));
        assert!(out.error.is_none(), "error: {:?}", out.error);
        assert_eq!(out.insns.len(), 3);
        assert_eq!(out.insns[1].mnemonic(), "packed-switch-payload");
        match &out.insns[1].payload {
            Some(Payload::PackedSwitch(p)) => {
                assert_eq!(p.first_key, 10);
                assert_eq!(p.targets, vec![5, 7]);
            }
            other => panic!("expected packed-switch payload, got {:?}", other),
        }
        assert_eq!(out.insns[2].mnemonic(), "return-void");
        assert_eq!(out.insns[2].offset, 11);
    }

    #[test]
    fn test_fill_array_data_payload_pads_to_code_unit() {
        // three single-byte elements leave the cursor mid-unit; the decoder
        // must round up before reading the next instruction
        let mut units = vec![
            FILL_ARRAY_DATA_SIGNATURE,
            0x0001, // element_width
            0x0003, 0x0000, // size = 3
        ];
        // data bytes: 01 02 03 + 1 pad byte
        units.push(u16::from_le_bytes([1, 2]));
        units.push(u16::from_le_bytes([3, 0]));
        units.push(0x000E);
        let out = disasm(&code_item(&units));
        assert!(out.error.is_none(), "error: {:?}", out.error);
        assert_eq!(out.insns.len(), 2);
        assert_eq!(out.insns[1].mnemonic(), "return-void");
    }
}
