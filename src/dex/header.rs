use binrw::BinRead;

use super::types::*;
use crate::error::DexError;

/// The magic bytes opening every supported DEX file: b"dex\n035\0".
pub const DEX_FILE_MAGIC: [UByte; 8] = [0x64, 0x65, 0x78, 0x0a, 0x30, 0x33, 0x35, 0x00];

/// Default endianness constant indicator
pub const ENDIAN_CONSTANT: UInt = 0x12345678;

/// Reverse endianness constant indicator
///
/// Files with this constant have performed byte-swapping. They are
/// detectable but not supported by this reader.
pub const REVERSE_ENDIAN_CONSTANT: UInt = 0x78563412;

/// The constant `NO_INDEX` is used to indicate that an index value is absent.
pub const NO_INDEX: UInt = 0xFFFFFFFF;

/// SHA-1 signature size
pub const SIGNATURE_SIZE: usize = 20;

/// Header item size
pub const HEADER_SIZE: usize = 0x70;

/// Header item data structure
#[derive(BinRead, Debug, Clone)]
#[br(little)]
pub struct HeaderItem {
    /// magic value, see [DEX_FILE_MAGIC]
    pub magic: [UByte; 8],

    /// Adler32 checksum of the rest of the file (everything but `magic` and
    /// this field); used to detect file corruption.
    pub checksum: UInt,

    /// SHA-1 signature (hash) of the rest of the file (everything but
    /// `magic`, `checksum`, and this field); used to uniquely identify
    /// files.
    pub signature: [UByte; SIGNATURE_SIZE],

    /// Size of the entire file including the header.
    pub file_size: UInt,

    /// Size of the header (this struct), in bytes. It is always 0x70.
    pub header_size: UInt,

    /// Endianness specification.
    pub endian_tag: UInt,

    /// size of the link section, or 0 if this file isn't statically linked
    pub link_size: UInt,

    /// offset from the start of the file to the link section, or `0` if
    /// `link_size == 0`.
    pub link_off: UInt,

    /// offset from the start of the file to the map item.
    pub map_off: UInt,

    /// count of strings in the string identifiers list
    pub string_ids_size: UInt,

    /// offset from the start of the file to the string identifiers list, or
    /// `0` if `string_ids_size == 0`.
    pub string_ids_off: UInt,

    /// count of elements in the type identifiers list, at most `65535`
    pub type_ids_size: UInt,

    /// offset from the start of the file to the type identifiers list, or
    /// `0` if `type_ids_size == 0`.
    pub type_ids_off: UInt,

    /// count of elements in the proto identifiers list, at most `65535`
    pub proto_ids_size: UInt,

    /// offset from the start of the file to the proto identifiers list, or
    /// `0` if `proto_ids_size == 0`.
    pub proto_ids_off: UInt,

    /// count of elements in the field identifiers list
    pub field_ids_size: UInt,

    /// offset from the start of the file to the field identifiers list, or
    /// `0` if `field_ids_size == 0`.
    pub field_ids_off: UInt,

    /// count of elements in the method identifiers list
    pub method_ids_size: UInt,

    /// offset from the start of the file to the method identifiers list, or
    /// `0` if `method_ids_size == 0`.
    pub method_ids_off: UInt,

    /// count of elements in the class definitions list
    pub class_defs_size: UInt,

    /// offset from the start of the file to the class definitions list, or
    /// `0` if `class_defs_size == 0`.
    pub class_defs_off: UInt,

    /// size of the data section (in bytes)
    pub data_size: UInt,

    /// offset from the start of the file to the data section
    pub data_off: UInt,
}

impl HeaderItem {
    /// Rejects images this reader cannot interpret: wrong magic, byte-swapped
    /// or unknown endian tags, and undersized headers.
    pub fn validate(&self) -> Result<(), DexError> {
        if self.magic != DEX_FILE_MAGIC {
            return Err(DexError::BadMagic(self.magic));
        }
        if self.endian_tag != ENDIAN_CONSTANT {
            return Err(DexError::BadEndian(self.endian_tag));
        }
        if (self.header_size as usize) < HEADER_SIZE {
            return Err(DexError::BadHeaderSize(self.header_size));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with(magic: [u8; 8], endian_tag: u32) -> HeaderItem {
        HeaderItem {
            magic,
            checksum: 0,
            signature: [0; SIGNATURE_SIZE],
            file_size: HEADER_SIZE as u32,
            header_size: HEADER_SIZE as u32,
            endian_tag,
            link_size: 0,
            link_off: 0,
            map_off: 0,
            string_ids_size: 0,
            string_ids_off: 0,
            type_ids_size: 0,
            type_ids_off: 0,
            proto_ids_size: 0,
            proto_ids_off: 0,
            field_ids_size: 0,
            field_ids_off: 0,
            method_ids_size: 0,
            method_ids_off: 0,
            class_defs_size: 0,
            class_defs_off: 0,
            data_size: 0,
            data_off: 0,
        }
    }

    #[test]
    fn test_accepts_v035() {
        assert!(header_with(DEX_FILE_MAGIC, ENDIAN_CONSTANT).validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_magic() {
        let mut magic = DEX_FILE_MAGIC;
        magic[5] = b'9';
        let err = header_with(magic, ENDIAN_CONSTANT).validate().unwrap_err();
        assert!(matches!(err, DexError::BadMagic(_)));
    }

    #[test]
    fn test_rejects_reverse_endian() {
        let err = header_with(DEX_FILE_MAGIC, REVERSE_ENDIAN_CONSTANT)
            .validate()
            .unwrap_err();
        assert!(matches!(err, DexError::BadEndian(REVERSE_ENDIAN_CONSTANT)));
    }
}
