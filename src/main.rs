use anyhow::Result;
use clap::Parser;

mod args;
mod cli;

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    cli::run(args::Cli::parse())
}
