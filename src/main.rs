//! # Agent Plugins CLI
//!
//! Binary entry point for the `agent-plugins` command-line tool.
//!
//! Parsing happens here; everything else is delegated to the command modules,
//! which in turn are thin wrappers over the `agent_plugins` library.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
