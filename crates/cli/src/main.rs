use std::process::ExitCode;

fn main() -> ExitCode {
    cartline_cli::run()
}
