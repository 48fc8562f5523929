//! olist CLI: per-order feature tables from the Olist e-commerce CSV files.
//!
//! Loads the CSV directory, derives the requested feature table or the
//! joined training table, and prints it to stdout.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
