#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(dex) = dexread::file::Dex::parse(data) {
        let _ = dex.write_dump(&mut std::io::sink());
    }
});
