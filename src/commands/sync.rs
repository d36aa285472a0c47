//! # Sync Command Implementation
//!
//! Links the store into the directories of every enabled agent, or of one
//! agent given with `--agent`. Existing directories are left alone unless
//! `--force` is given.

use anyhow::Result;
use clap::Args;

use agent_plugins::link::{LinkMode, LinkStatus};
use agent_plugins::sync::ConsumerSync;

use super::Context;

/// Link the store into agent directories
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Only sync this agent
    #[arg(short, long, value_name = "KEY")]
    pub agent: Option<String>,

    /// Replace existing directories and links
    #[arg(short, long)]
    pub force: bool,
}

pub fn execute(args: SyncArgs, ctx: &Context) -> Result<()> {
    let keys = match args.agent {
        Some(agent) => vec![agent],
        None => ctx.config()?.enabled_agents,
    };
    sync_agents(ctx, &keys, args.force)?;
    println!("{} Sync complete", ctx.out.ok());
    Ok(())
}

/// Sync each agent in `keys`, printing one line per link. Unknown keys are
/// reported and skipped. Returns the number of conflicts left behind.
pub fn sync_agents(ctx: &Context, keys: &[String], force: bool) -> Result<usize> {
    let profiles = ctx.profiles()?;
    let sync = ConsumerSync::new(&ctx.store_root, &ctx.user_home, ctx.policy()?);

    let mut conflicts = 0;
    for key in keys {
        let Some(profile) = profiles.get(key) else {
            println!("{} Unknown agent: {}", ctx.out.warn(), key);
            continue;
        };

        println!("{}", ctx.out.heading(format!("Syncing {}...", profile.name)));
        let report = sync.sync(profile, force)?;
        for link in &report.links {
            let target = link.target.display();
            match link.status {
                LinkStatus::Created if link.mode == LinkMode::Copied => println!(
                    "  {} copied to {} (changes will not propagate)",
                    ctx.out.warn(),
                    target
                ),
                LinkStatus::Created => println!("  {} {} linked", ctx.out.ok(), target),
                LinkStatus::AlreadyLinked => {
                    println!("  {}", ctx.out.dim(format!("{} already linked", target)))
                }
                LinkStatus::Conflict => {
                    conflicts += 1;
                    println!("  {} {} exists (use --force)", ctx.out.warn(), target)
                }
                LinkStatus::SourceMissing => println!(
                    "  {}",
                    ctx.out
                        .dim(format!("{} skipped, {} missing", target, link.source.display()))
                ),
            }
        }
    }
    Ok(conflicts)
}
