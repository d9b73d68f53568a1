use std::error::Error as _;
use std::process::ExitCode;

fn main() -> ExitCode {
    match clue::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("clue: {err}");
            let mut source = err.source();
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}
