#![no_main]

use dexread::dex::mutf8;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = mutf8::read(&mut Cursor::new(data)) {
        let _ = s.len();
    }
});
