use binrw::meta::ReadEndian;
use binrw::{BinRead, Endian};
use bitflags::bitflags;
use std::io;

use crate::error::DexError;

/// 8bit signed int
pub type Byte = i8;

/// 8bit unsigned int
pub type UByte = u8;

/// 16bit signed int
pub type Short = i16;

/// 16bit unsigned int
pub type UShort = u16;

/// 32bit signed int
pub type Int = i32;

/// 32bit unsigned int
pub type UInt = u32;

/// 64bit signed int
pub type Long = i64;

/// 64bit unsigned int
pub type ULong = u64;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: UInt {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;

        /// associated lock automatically acquired around call
        /// to this method.
        ///
        /// @note Only valid for methods.
        const SYNCHRONIZED = 0x0020;

        /// special access rules to help with thread safety
        ///
        /// @note Only valid for fields.
        const VOLATILE = 0x0040;

        /// bridge method, added automatically by compiler as a
        /// type-safe bridge
        ///
        /// @note Only valid for methods.
        const BRIDGE = 0x0040;

        /// not to be saved by default serialization
        ///
        /// @note Only valid for fields.
        const TRANSIENT = 0x0080;

        /// last argument should be treated as a "rest" argument by compiler
        ///
        /// @note Only valid for methods.
        const VARARGS = 0x0080;

        /// native method
        ///
        /// @note Only valid for methods.
        const NATIVE = 0x0100;

        /// multiply-implementable abstract class
        ///
        /// @note Only valid for classes.
        const INTERFACE = 0x0200;

        /// @note Only valid for classes and methods.
        const ABSTRACT = 0x0400;

        /// @note Only valid for methods.
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;

        /// @note Only valid for classes.
        const ANNOTATION = 0x2000;

        /// @note Only valid for classes and fields.
        const ENUM = 0x4000;

        /// @note Only valid for methods.
        const CONSTRUCTOR = 0x10000;

        /// @note Only valid for methods.
        const DECLARED_SYNCHRONIZED = 0x20000;
    }
}

/// What a set of access flags is attached to. The bits 0x40 and 0x80 are
/// overloaded between fields and methods, so rendering needs to know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    Class,
    Field,
    Method,
}

impl AccessFlags {
    /// Renders the matching modifier keywords in canonical order, each flag
    /// independent of the others.
    pub fn keywords(&self, kind: FlagKind) -> String {
        let mut out: Vec<&'static str> = Vec::new();
        let mut push = |flag: AccessFlags, word: &'static str| {
            if self.contains(flag) {
                out.push(word);
            }
        };

        push(AccessFlags::PUBLIC, "public");
        push(AccessFlags::PRIVATE, "private");
        push(AccessFlags::PROTECTED, "protected");
        push(AccessFlags::STATIC, "static");
        push(AccessFlags::FINAL, "final");
        match kind {
            FlagKind::Method => {
                push(AccessFlags::SYNCHRONIZED, "synchronized");
                push(AccessFlags::BRIDGE, "bridge");
                push(AccessFlags::VARARGS, "varargs");
            }
            FlagKind::Field => {
                push(AccessFlags::VOLATILE, "volatile");
                push(AccessFlags::TRANSIENT, "transient");
            }
            FlagKind::Class => {}
        }
        push(AccessFlags::NATIVE, "native");
        push(AccessFlags::INTERFACE, "interface");
        push(AccessFlags::ABSTRACT, "abstract");
        push(AccessFlags::STRICT, "strictfp");
        push(AccessFlags::SYNTHETIC, "synthetic");
        push(AccessFlags::ANNOTATION, "annotation");
        push(AccessFlags::ENUM, "enum");
        push(AccessFlags::CONSTRUCTOR, "constructor");
        push(AccessFlags::DECLARED_SYNCHRONIZED, "declared-synchronized");

        out.join(" ")
    }
}

fn uleb128_raw<R>(reader: &mut R) -> binrw::BinResult<u32>
where
    R: io::Read + io::Seek,
{
    let mut buf = [0u8; 1];
    let mut value: u32 = 0;
    for i in 0..5 {
        reader.read_exact(&mut buf)?;
        value |= ((buf[0] & 0x7F) as u32) << (7 * i);
        if buf[0] & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(binrw::Error::Custom {
        pos: reader.stream_position()?,
        err: Box::new(DexError::BadUleb128),
    })
}

/// unsigned LEB128, variable-length
///
/// Android only uses LEB128 to encode 32bit entities, so an encoding may
/// occupy at most five bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ULeb128(pub u32);

impl ReadEndian for ULeb128 {
    const ENDIAN: binrw::meta::EndianKind = binrw::meta::EndianKind::None;
}

impl BinRead for ULeb128 {
    type Args<'a> = ();

    fn read_options<R: io::Read + io::Seek>(
        reader: &mut R,
        _: Endian,
        _: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        Ok(Self(uleb128_raw(reader)?))
    }
}

/// signed LEB128, variable-length
///
/// Borrowed from the DWARF3 specification, Section 7.6, "Variable Length
/// Data". Same framing as [ULeb128], final byte sign-extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SLeb128(pub i32);

impl ReadEndian for SLeb128 {
    const ENDIAN: binrw::meta::EndianKind = binrw::meta::EndianKind::None;
}

impl BinRead for SLeb128 {
    type Args<'a> = ();

    fn read_options<R: io::Read + io::Seek>(
        reader: &mut R,
        _: Endian,
        _: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        let mut buf = [0u8; 1];
        let mut value: u32 = 0;
        for i in 0..5 {
            reader.read_exact(&mut buf)?;
            value |= ((buf[0] & 0x7F) as u32) << (7 * i);
            if buf[0] & 0x80 == 0 {
                let shift = 7 * (i + 1);
                if shift < 32 && buf[0] & 0x40 != 0 {
                    value |= !0u32 << shift;
                }
                return Ok(Self(value as i32));
            }
        }
        Err(binrw::Error::Custom {
            pos: reader.stream_position()?,
            err: Box::new(DexError::BadUleb128),
        })
    }
}

/// unsigned LEB128 plus 1, variable-length
///
/// Encodes a value range of [-1, u32::MAX) by biasing the stored value by
/// one; -1 marks an absent index (`NO_INDEX`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ULeb128p1 {
    Pos(u32),
    Neg,
}

impl ReadEndian for ULeb128p1 {
    const ENDIAN: binrw::meta::EndianKind = binrw::meta::EndianKind::None;
}

impl BinRead for ULeb128p1 {
    type Args<'a> = ();

    fn read_options<R: io::Read + io::Seek>(
        reader: &mut R,
        _: Endian,
        _: Self::Args<'_>,
    ) -> binrw::BinResult<Self> {
        match uleb128_raw(reader)? {
            0 => Ok(Self::Neg),
            x => Ok(Self::Pos(x - 1)),
        }
    }
}

pub mod mutf8 {
    use std::io::{self, Read, Seek};

    /// # Modified UTF-8 encoding
    ///
    /// From the Android docs: the `.dex` format encodes its string data in a
    /// de facto standard modified UTF-8 form, hereafter referred to as
    /// MUTF-8. This form is identical to standard UTF-8 with a few
    /// modifications:
    ///
    /// - Only the one-, two-, and three-byte encodings are used.
    /// - Code points in the range `U+10000 ... U+10ffff` are encoded as a
    ///   surrogate pair, each of which is represented as a three-byte
    ///   encoded value.
    /// - The code point U+0000 is encoded in two-byte form.
    /// - A plain null byte (value 0) indicates the end of a string, as is
    ///   the standard C language interpretation.
    ///
    /// The first two items can be summarized as: MUTF-8 is an encoding
    /// format for UTF-16, instead of a direct encoding of Unicode code
    /// points. Decoding therefore goes through a UTF-16 unit buffer, which
    /// recombines surrogate pairs for free.
    pub fn read<R>(reader: &mut R) -> binrw::BinResult<String>
    where
        R: Read + Seek,
    {
        // leading uleb128 holds the utf16 unit count. It is a sizing hint,
        // not a byte length: the string still ends at the null byte.
        let hint = super::uleb128_raw(reader)?;

        let mut buf = [0u8; 1];
        let mut units: Vec<u16> = Vec::with_capacity(hint as usize);
        let mut next = |reader: &mut R| -> io::Result<u8> {
            reader.read_exact(&mut buf)?;
            Ok(buf[0])
        };

        loop {
            let byte = next(reader)?;
            if byte == 0 {
                break;
            }

            let unit = match byte >> 4 {
                // 0xxx xxxx
                0x00..=0x07 => byte as u16,
                // 110x xxxx  10xx xxxx
                0x0C | 0x0D => {
                    let b = next(reader)?;
                    if b & 0xC0 != 0x80 {
                        if b == 0 {
                            units.push(char::REPLACEMENT_CHARACTER as u16);
                            break;
                        }
                        char::REPLACEMENT_CHARACTER as u16
                    } else {
                        ((byte as u16 & 0x1F) << 6) | (b as u16 & 0x3F)
                    }
                }
                // 1110 xxxx  10xx xxxx  10xx xxxx
                0x0E => {
                    let b = next(reader)?;
                    let c = next(reader)?;
                    if b & 0xC0 != 0x80 || c & 0xC0 != 0x80 {
                        if b == 0 || c == 0 {
                            units.push(char::REPLACEMENT_CHARACTER as u16);
                            break;
                        }
                        char::REPLACEMENT_CHARACTER as u16
                    } else {
                        ((byte as u16 & 0x0F) << 12)
                            | ((b as u16 & 0x3F) << 6)
                            | (c as u16 & 0x3F)
                    }
                }
                // four-byte encodings never appear in MUTF-8
                _ => char::REPLACEMENT_CHARACTER as u16,
            };
            units.push(unit);
        }

        // from_utf16_lossy pairs up the pieces of CESU-8 encoded
        // supplementary code points and replaces unpaired surrogates.
        Ok(String::from_utf16_lossy(&units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binrw::BinRead;
    use std::io::Cursor;

    fn uleb(data: &[u8]) -> (u32, u64) {
        let mut cursor = Cursor::new(data);
        let value = ULeb128::read(&mut cursor).unwrap();
        (value.0, cursor.position())
    }

    #[test]
    fn test_uleb128_golden_values() {
        assert_eq!(uleb(&[0x00]), (0, 1));
        assert_eq!(uleb(&[0x01]), (1, 1));
        assert_eq!(uleb(&[0x7F]), (127, 1));
        assert_eq!(uleb(&[0x80, 0x7F]), (16256, 2));
        assert_eq!(uleb(&[0xE5, 0x8E, 0x26]), (624485, 3));
    }

    #[test]
    fn test_uleb128_round_trip() {
        for v in [0u32, 1, 127, 128, 16256, 624485, u32::MAX] {
            let mut buf = Vec::new();
            leb128::write::unsigned(&mut buf, v as u64).unwrap();
            let (decoded, consumed) = uleb(&buf);
            assert_eq!(decoded, v);
            assert_eq!(consumed as usize, buf.len());
        }
    }

    #[test]
    fn test_uleb128_stops_at_first_clear_msb() {
        // trailing bytes belong to the next field
        assert_eq!(uleb(&[0x01, 0xFF, 0xFF]), (1, 1));
    }

    #[test]
    fn test_uleb128_over_long() {
        let mut cursor = Cursor::new(&[0x80u8, 0x80, 0x80, 0x80, 0x80, 0x00][..]);
        let err = ULeb128::read(&mut cursor).unwrap_err();
        assert!(matches!(
            crate::error::DexError::from(err),
            crate::error::DexError::BadUleb128
        ));
    }

    #[test]
    fn test_uleb128_truncated() {
        let mut cursor = Cursor::new(&[0x80u8][..]);
        assert!(ULeb128::read(&mut cursor).is_err());
    }

    #[test]
    fn test_sleb128_sign_extension() {
        let mut cursor = Cursor::new(&[0x7Fu8][..]);
        assert_eq!(SLeb128::read(&mut cursor).unwrap().0, -1);
        let mut cursor = Cursor::new(&[0x80u8, 0x7F][..]);
        assert_eq!(SLeb128::read(&mut cursor).unwrap().0, -128);
        let mut cursor = Cursor::new(&[0x3Cu8][..]);
        assert_eq!(SLeb128::read(&mut cursor).unwrap().0, 60);
    }

    #[test]
    fn test_uleb128p1() {
        let mut cursor = Cursor::new(&[0x00u8][..]);
        assert_eq!(ULeb128p1::read(&mut cursor).unwrap(), ULeb128p1::Neg);
        let mut cursor = Cursor::new(&[0x01u8][..]);
        assert_eq!(ULeb128p1::read(&mut cursor).unwrap(), ULeb128p1::Pos(0));
    }

    fn mutf8_str(data: &[u8]) -> (String, u64) {
        let mut cursor = Cursor::new(data);
        let s = mutf8::read(&mut cursor).unwrap();
        (s, cursor.position())
    }

    #[test]
    fn test_mutf8_ascii() {
        let (s, pos) = mutf8_str(b"\x06foobar\0");
        assert_eq!(s, "foobar");
        assert_eq!(pos, 8);
    }

    #[test]
    fn test_mutf8_two_byte_form() {
        // U+00A3, pound sign
        let (s, pos) = mutf8_str(b"\x01\xC2\xA3\0");
        assert_eq!(s, "\u{a3}");
        assert_eq!(pos, 4);
    }

    #[test]
    fn test_mutf8_embedded_nul() {
        // U+0000 is encoded as C0 80 and must not terminate the string
        let (s, _) = mutf8_str(b"\x03a\xC0\x80b\0");
        assert_eq!(s, "a\0b");
    }

    #[test]
    fn test_mutf8_surrogate_pair() {
        // U+1F600 as CESU-8: D83D DE00 surrogates, three bytes each
        let (s, _) = mutf8_str(b"\x02\xED\xA0\xBD\xED\xB8\x80\0");
        assert_eq!(s, "\u{1F600}");
    }

    #[test]
    fn test_access_flag_keywords() {
        let flags = AccessFlags::PUBLIC | AccessFlags::STATIC | AccessFlags::FINAL;
        assert_eq!(flags.keywords(FlagKind::Method), "public static final");

        let ctor = AccessFlags::CONSTRUCTOR | AccessFlags::DECLARED_SYNCHRONIZED;
        assert_eq!(
            ctor.keywords(FlagKind::Method),
            "constructor declared-synchronized"
        );

        // 0x40 renders by kind
        let bits = AccessFlags::from_bits_truncate(0x40);
        assert_eq!(bits.keywords(FlagKind::Field), "volatile");
        assert_eq!(bits.keywords(FlagKind::Method), "bridge");
    }
}
