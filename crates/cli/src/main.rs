use std::process::ExitCode;

fn main() -> ExitCode {
    greetbot_cli::run()
}
