use std::process::ExitCode;

use anyhow::Result;

fn main() -> Result<ExitCode> {
    walvault_cli::cli::execute()
}
