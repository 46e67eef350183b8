use std::process::ExitCode;

fn main() -> ExitCode {
    classcover_cli::run()
}
