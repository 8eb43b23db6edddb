use std::process::ExitCode;

fn main() -> ExitCode {
    stig::init_tracing();

    match stig::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
