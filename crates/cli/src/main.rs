use std::process::ExitCode;

fn main() -> ExitCode {
    complai_cli::run()
}
