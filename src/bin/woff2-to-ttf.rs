//! Minimal CLI demo: `woff2-to-ttf <input.woff2> <output.ttf>`.

use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args();
    let program = args.next().unwrap_or_default();
    let (infile, outfile) = match (args.next(), args.next()) {
        (Some(i), Some(o)) => (i, o),
        _ => {
            eprintln!("usage: {program} <input.woff2> <output.ttf>");
            return ExitCode::FAILURE;
        }
    };

    let woff2 = match std::fs::read(&infile) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("failed to read {infile}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let ttf = match woff2_decode::decode(&woff2) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("failed to decode {infile}: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = std::fs::write(&outfile, ttf) {
        eprintln!("failed to write {outfile}: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
