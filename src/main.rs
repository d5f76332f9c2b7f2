use std::process::ExitCode;

use dexread::file::Dex;

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let path = match args.next() {
        Some(path) => path,
        None => {
            eprintln!("usage: dexread <classes.dex>");
            return ExitCode::FAILURE;
        }
    };

    let dex = match Dex::open(&path) {
        Ok(dex) => dex,
        Err(err) => {
            eprintln!("{}: {}", path, err);
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = dex.dump() {
        eprintln!("{}: {}", path, err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
