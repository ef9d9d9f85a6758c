use std::process::ExitCode;

fn main() -> ExitCode {
    querygate_cli::run()
}
