#![no_main]

use binrw::BinRead;
use dexread::dex::{SLeb128, ULeb128};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let _ = ULeb128::read(&mut Cursor::new(data));
    let _ = SLeb128::read(&mut Cursor::new(data));
});
