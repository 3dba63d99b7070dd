//! Provides the main entry point to the program.
use anyhow::Result;

fn main() -> Result<()> {
    linerisk::commands::run_cli()
}
