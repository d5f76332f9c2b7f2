use std::result;

pub mod dex;
pub mod error;
pub mod file;
pub mod insns;

pub type Result<T> = result::Result<T, error::DexError>;
