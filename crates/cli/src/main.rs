use std::process::ExitCode;

fn main() -> ExitCode {
    quotebot_cli::run()
}
