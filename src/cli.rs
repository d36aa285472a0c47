//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use agent_plugins::defaults::{self, HOME_ENV};
use agent_plugins::output::{ColorWhen, OutputConfig};

use crate::commands::{self, Context};

/// Agent Plugins - One store of skills and plugins for every coding agent
#[derive(Parser, Debug)]
#[command(name = "agent-plugins")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Canonical store directory (default: ~/.agent)
    #[arg(long, global = true, value_name = "DIR", env = HOME_ENV)]
    home: Option<PathBuf>,

    /// Colorize output
    #[arg(long, global = true, value_name = "WHEN", value_enum, default_value_t = ColorWhen::Auto)]
    color: ColorWhen,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the store, enable agents and link everything up
    Init(commands::init::InitArgs),

    /// Show agents, marketplaces and skills at a glance
    Status(commands::status::StatusArgs),

    /// Detect which agents are installed
    Check(commands::check::CheckArgs),

    /// List components provided by installed marketplaces
    List(commands::list::ListArgs),

    /// Link the store into agent directories
    Sync(commands::sync::SyncArgs),

    /// Rebuild the merged namespace
    Rebuild(commands::rebuild::RebuildArgs),

    /// Manage plugin marketplaces
    #[command(subcommand)]
    Marketplace(commands::marketplace::MarketplaceCommand),

    /// Inspect or reconcile shared registry files
    #[command(subcommand)]
    Metadata(commands::metadata::MetadataCommand),

    /// Copy a local skill into the store
    AddSkill(commands::skill::AddSkillArgs),

    /// Remove a skill from the store
    RemoveSkill(commands::skill::RemoveSkillArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        if let Commands::Completions(args) = self.command {
            return commands::completions::execute(args);
        }

        let store_root = match self.home {
            Some(home) => home,
            None => defaults::default_store_root()?,
        };
        let ctx = Context {
            store_root,
            user_home: defaults::user_home()?,
            out: OutputConfig::new(self.color),
        };

        match self.command {
            Commands::Init(args) => commands::init::execute(args, &ctx),
            Commands::Status(args) => commands::status::execute(args, &ctx),
            Commands::Check(args) => commands::check::execute(args, &ctx),
            Commands::List(args) => commands::list::execute(args, &ctx),
            Commands::Sync(args) => commands::sync::execute(args, &ctx),
            Commands::Rebuild(args) => commands::rebuild::execute(args, &ctx),
            Commands::Marketplace(cmd) => commands::marketplace::execute(cmd, &ctx),
            Commands::Metadata(cmd) => commands::metadata::execute(cmd, &ctx),
            Commands::AddSkill(args) => commands::skill::add(args, &ctx),
            Commands::RemoveSkill(args) => commands::skill::remove(args, &ctx),
            Commands::Completions(_) => Ok(()),
        }
    }
}

/// `RUST_LOG` wins over `--log-level` when set.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "agent-plugins",
            "rebuild",
            "--home",
            "/tmp/store",
            "--color",
            "never",
        ])
        .unwrap();
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/store")));
        assert_eq!(cli.color, ColorWhen::Never);
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_parse_marketplace_subcommands() {
        let cli = Cli::try_parse_from(["agent-plugins", "marketplace", "remove", "skills", "--yes"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Marketplace(_)));
    }
}
