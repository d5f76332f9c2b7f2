use binrw::{BinRead, Endian};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io;

use super::types::*;
use crate::error::DexError;

/// ## EncodedValue
/// ### Structure
/// - `value_type`: byte indicating the type of the immediately subsequent
///   value along with an optional clarifying argument in the high-order
///   three bits. In most cases, `value_arg` encodes the length of the
///   immediately-subsequent value in bytes, as (`size - 1`), e.g., `0`
///   means that the value requires one byte, and `7` means it requires
///   eight bytes;
/// - `value`: bytes representing the value, variable in length and
///   interpreted differently for different value_type bytes, though always
///   little-endian.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedValue {
    /// signed one-byte integer value
    ///
    /// @value_arg: none, must be 0
    Byte(i8),

    /// signed two-byte integer value, sign-extended
    ///
    /// @value_arg: `size - 1` (0..1)
    Short(i16),

    /// unsigned two-byte integer value, zero-extended
    ///
    /// @value_arg: `size - 1` (0..1)
    Char(u16),

    /// signed four-byte integer value, sign-extended
    ///
    /// @value_arg: `size - 1` (0..3)
    Int(i32),

    /// signed eight-byte integer value, sign-extended
    ///
    /// @value_arg: `size - 1` (0..7)
    Long(i64),

    /// four-byte bit pattern, zero-extended to the right, and interpreted
    /// as an IEEE754 32-bit floating point value.
    ///
    /// @value_arg: `size - 1` (0..3)
    Float(f32),

    /// eight-byte bit pattern, zero-extended to the right, and interpreted
    /// as an IEEE754 64-bit floating point value.
    ///
    /// @value_arg: `size - 1` (0..7)
    Double(f64),

    /// unsigned (zero-extended) four-byte integer value, interpreted as an
    /// index into the `proto_ids` section.
    ///
    /// @value_arg: `size - 1` (0..3)
    MethodType(u32),

    /// unsigned (zero-extended) four-byte integer value, interpreted as an
    /// index into the method handles section.
    ///
    /// @value_arg: `size - 1` (0..3)
    MethodHandle(u32),

    /// unsigned (zero-extended) four-byte integer value, interpreted as an
    /// index into the `string_ids` section.
    ///
    /// @value_arg: `size - 1` (0..3)
    String(u32),

    /// unsigned (zero-extended) four-byte integer value, interpreted as an
    /// index into the `type_ids` section.
    ///
    /// @value_arg: `size - 1` (0..3)
    Type(u32),

    /// unsigned (zero-extended) four-byte integer value, interpreted as an
    /// index into the `field_ids` section.
    ///
    /// @value_arg: `size - 1` (0..3)
    Field(u32),

    /// unsigned (zero-extended) four-byte integer value, interpreted as an
    /// index into the `method_ids` section.
    ///
    /// @value_arg: `size - 1` (0..3)
    Method(u32),

    /// unsigned (zero-extended) four-byte integer value, interpreted as an
    /// index into the `field_ids` section and representing an enum constant.
    ///
    /// @value_arg: `size - 1` (0..3)
    Enum(u32),

    /// An array of values, in the format specified by "encoded_array
    /// format". The size of the value is implicit in the encoding.
    ///
    /// @value_arg: none, must be 0
    Array(EncodedArray),

    /// a sub-annotation, reduced to its type index and named element count.
    /// Annotation payloads themselves are outside this reader's scope, but
    /// the bytes still have to be walked to find the end of the value.
    ///
    /// @value_arg: none, must be 0
    Annotation {
        type_idx: u32,
        values: Vec<(u32, EncodedValue)>,
    },

    /// null reference value
    ///
    /// @value_arg: none, must be 0
    Null,

    /// one-bit value; 0 for false and 1 for true, represented in the
    /// `value_arg` itself.
    Boolean(bool),
}

impl EncodedValue {
    pub const VALUE_BYTE: UByte = 0x00;
    pub const VALUE_SHORT: UByte = 0x02;
    pub const VALUE_CHAR: UByte = 0x03;
    pub const VALUE_INT: UByte = 0x04;
    pub const VALUE_LONG: UByte = 0x06;
    pub const VALUE_FLOAT: UByte = 0x10;
    pub const VALUE_DOUBLE: UByte = 0x11;
    pub const VALUE_METHOD_TYPE: UByte = 0x15;
    pub const VALUE_METHOD_HANDLE: UByte = 0x16;
    pub const VALUE_STRING: UByte = 0x17;
    pub const VALUE_TYPE: UByte = 0x18;
    pub const VALUE_FIELD: UByte = 0x19;
    pub const VALUE_METHOD: UByte = 0x1A;
    pub const VALUE_ENUM: UByte = 0x1B;
    pub const VALUE_ARRAY: UByte = 0x1C;
    pub const VALUE_ANNOTATION: UByte = 0x1D;
    pub const VALUE_NULL: UByte = 0x1E;
    pub const VALUE_BOOLEAN: UByte = 0x1F;
}

fn bad_value<R: io::Seek>(reader: &mut R, value_type: u8, value_arg: u8) -> binrw::Error {
    binrw::Error::Custom {
        pos: reader.stream_position().unwrap_or(0),
        err: Box::new(DexError::BadEncodedValue {
            value_type,
            value_arg,
        }),
    }
}

impl BinRead for EncodedValue {
    type Args<'a> = ();

    fn read_options<R: io::Read + io::Seek>(
        reader: &mut R,
        endian: Endian,
        _: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let byte = reader.read_u8()?;
        let value_type = byte & 0x1F;
        let value_arg = (byte & 0xE0) >> 5;
        let size = value_arg as usize + 1;

        // every fixed-width kind caps its payload size
        let max_size = match value_type {
            EncodedValue::VALUE_SHORT | EncodedValue::VALUE_CHAR => 2,
            EncodedValue::VALUE_INT
            | EncodedValue::VALUE_FLOAT
            | EncodedValue::VALUE_METHOD_TYPE
            | EncodedValue::VALUE_METHOD_HANDLE
            | EncodedValue::VALUE_STRING
            | EncodedValue::VALUE_TYPE
            | EncodedValue::VALUE_FIELD
            | EncodedValue::VALUE_METHOD
            | EncodedValue::VALUE_ENUM => 4,
            _ => 8,
        };
        if size > max_size {
            return Err(bad_value(reader, value_type, value_arg));
        }

        let value = match value_type {
            EncodedValue::VALUE_BYTE => {
                if value_arg != 0 {
                    return Err(bad_value(reader, value_type, value_arg));
                }
                EncodedValue::Byte(reader.read_i8()?)
            }
            EncodedValue::VALUE_SHORT => {
                EncodedValue::Short(reader.read_int::<LittleEndian>(size)? as i16)
            }
            EncodedValue::VALUE_CHAR => {
                EncodedValue::Char(reader.read_uint::<LittleEndian>(size)? as u16)
            }
            EncodedValue::VALUE_INT => {
                EncodedValue::Int(reader.read_int::<LittleEndian>(size)? as i32)
            }
            EncodedValue::VALUE_LONG => {
                EncodedValue::Long(reader.read_int::<LittleEndian>(size)?)
            }
            // Float and double payloads fill the high-order end of the bit
            // pattern; the omitted trailing bytes are zero.
            EncodedValue::VALUE_FLOAT => {
                let bits = (reader.read_uint::<LittleEndian>(size)? as u32) << (8 * (4 - size));
                EncodedValue::Float(f32::from_bits(bits))
            }
            EncodedValue::VALUE_DOUBLE => {
                let bits = reader.read_uint::<LittleEndian>(size)? << (8 * (8 - size));
                EncodedValue::Double(f64::from_bits(bits))
            }
            EncodedValue::VALUE_METHOD_TYPE => {
                EncodedValue::MethodType(reader.read_uint::<LittleEndian>(size)? as u32)
            }
            EncodedValue::VALUE_METHOD_HANDLE => {
                EncodedValue::MethodHandle(reader.read_uint::<LittleEndian>(size)? as u32)
            }
            EncodedValue::VALUE_STRING => {
                EncodedValue::String(reader.read_uint::<LittleEndian>(size)? as u32)
            }
            EncodedValue::VALUE_TYPE => {
                EncodedValue::Type(reader.read_uint::<LittleEndian>(size)? as u32)
            }
            EncodedValue::VALUE_FIELD => {
                EncodedValue::Field(reader.read_uint::<LittleEndian>(size)? as u32)
            }
            EncodedValue::VALUE_METHOD => {
                EncodedValue::Method(reader.read_uint::<LittleEndian>(size)? as u32)
            }
            EncodedValue::VALUE_ENUM => {
                EncodedValue::Enum(reader.read_uint::<LittleEndian>(size)? as u32)
            }
            EncodedValue::VALUE_ARRAY => {
                if value_arg != 0 {
                    return Err(bad_value(reader, value_type, value_arg));
                }
                EncodedValue::Array(EncodedArray::read_options(reader, endian, ())?)
            }
            EncodedValue::VALUE_ANNOTATION => {
                if value_arg != 0 {
                    return Err(bad_value(reader, value_type, value_arg));
                }
                let type_idx = ULeb128::read(reader)?.0;
                let count = ULeb128::read(reader)?.0;
                let mut values = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let name_idx = ULeb128::read(reader)?.0;
                    values.push((name_idx, EncodedValue::read_options(reader, endian, ())?));
                }
                EncodedValue::Annotation { type_idx, values }
            }
            EncodedValue::VALUE_NULL => {
                if value_arg != 0 {
                    return Err(bad_value(reader, value_type, value_arg));
                }
                EncodedValue::Null
            }
            EncodedValue::VALUE_BOOLEAN => EncodedValue::Boolean(value_arg != 0),
            _ => return Err(bad_value(reader, value_type, value_arg)),
        };
        Ok(value)
    }
}

impl binrw::meta::ReadEndian for EncodedValue {
    const ENDIAN: binrw::meta::EndianKind = binrw::meta::EndianKind::None;
}

/// An encoded array: a uleb128 element count followed by that many encoded
/// values, concatenated sequentially.
#[derive(BinRead, Debug, Clone, PartialEq)]
#[br(little)]
pub struct EncodedArray {
    /// the number of elements in this array
    pub size: ULeb128,

    /// the element values
    #[br(count = size.0 as usize)]
    pub values: Vec<EncodedValue>,
}

/// A field of a class, stored inside class data with a differential index.
#[derive(BinRead, Debug, Clone)]
#[br(little)]
pub struct EncodedField {
    /// index into the `field_ids` list for the identity of this field,
    /// represented as a difference from the index of the previous element
    /// in the list. The index of the first element in a list is represented
    /// directly.
    pub field_idx_diff: ULeb128,

    /// access flags for this field
    pub access_flags: ULeb128,
}

/// A method of a class, stored inside class data with a differential index.
#[derive(BinRead, Debug, Clone)]
#[br(little)]
pub struct EncodedMethod {
    /// index into the `method_ids` list for the identity of this method,
    /// represented as a difference from the index of the previous element
    /// in the list. The index of the first element in a list is represented
    /// directly.
    pub method_idx_diff: ULeb128,

    /// access flags for this method
    pub access_flags: ULeb128,

    /// offset from the start of the file to the code for this method, or
    /// `0` if this method is abstract or native.
    pub code_off: ULeb128,
}
