use std::fmt::Debug;
use std::io;

use thiserror::Error;

#[derive(Error)]
pub enum DexError {
    #[error("Unexpected end of input")]
    ShortInput,

    #[error("Bad dex magic: {0:02x?}")]
    BadMagic([u8; 8]),

    #[error("Unsupported endian tag: {0:#010x}")]
    BadEndian(u32),

    #[error("Bad header size: {0:#x}, expected at least 0x70")]
    BadHeaderSize(u32),

    #[error("Over-long uleb128 (more than five bytes)")]
    BadUleb128,

    #[error("Index {index} out of range for {table} (len {len})")]
    BadIndex {
        index: u32,
        table: &'static str,
        len: usize,
    },

    #[error("Offset {offset:#x} out of range for {section} (file size {size})")]
    BadOffset {
        offset: u32,
        section: &'static str,
        size: usize,
    },

    #[error("Offset {offset:#x} for {section} is not 4-byte aligned")]
    UnalignedOffset { offset: u32, section: &'static str },

    #[error("Unknown opcode {opcode:#04x} at code unit {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("Bad encoded value header: type {value_type:#04x}, arg {value_arg}")]
    BadEncodedValue { value_type: u8, value_arg: u8 },

    #[error("{0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<binrw::Error> for DexError {
    fn from(e: binrw::Error) -> Self {
        match e {
            binrw::Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => DexError::ShortInput,
            binrw::Error::Io(e) => DexError::Io(e),
            binrw::Error::Custom { pos, err } => match err.downcast::<DexError>() {
                Ok(err) => *err,
                Err(_) => DexError::Parse(format!("custom parse error at {:#x}", pos)),
            },
            binrw::Error::Backtrace(bt) => DexError::from(*bt.error),
            e => DexError::Parse(e.to_string()),
        }
    }
}

impl Debug for DexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}
