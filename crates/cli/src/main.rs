use std::process::ExitCode;

fn main() -> ExitCode {
    arcpay_cli::run()
}
