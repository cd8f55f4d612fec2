use std::process::ExitCode;

fn main() -> ExitCode {
    match cellard::run_daemon() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("cellard: {error}");
            ExitCode::FAILURE
        }
    }
}
