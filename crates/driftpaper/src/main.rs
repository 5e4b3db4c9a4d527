//! Entry point: parses the CLI, initialises tracing, and hands off to the
//! engine runtime in `run.rs`.

mod cli;
mod run;

use anyhow::Result;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();
    run::run(cli)
}
