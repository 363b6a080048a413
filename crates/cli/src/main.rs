use std::process::ExitCode;

fn main() -> ExitCode {
    challan_cli::run()
}
