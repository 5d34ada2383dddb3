use std::process::ExitCode;

fn main() -> ExitCode {
    match trinket::cli::run_cli() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
