//! # Init Command Implementation
//!
//! Sets up the canonical store and wires every enabled agent to it.
//!
//! ## Steps
//!
//! 1. Create the store layout (kind directories, marketplaces, merged namespace).
//! 2. Decide which agents are enabled: `--agents` if given, otherwise every
//!    detected agent, otherwise all known agents.
//! 3. Save `config.json`.
//! 4. Rebuild the merged namespace.
//! 5. Link each enabled agent's directories to the store.
//! 6. Reconcile shared registry files (merging only with `--force`).
//!
//! Running `init` again is safe: every step is idempotent.

use anyhow::Result;
use clap::Args;

use agent_plugins::defaults::ensure_layout;
use agent_plugins::profile::ProfileRegistry;
use agent_plugins::sync::detect;

use super::metadata::print_reconcile_report;
use super::sync::sync_agents;
use super::{print_build_report, Context};

/// Create the store, enable agents and link everything up
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Comma-separated agents to enable (claude,opencode,codex,gemini)
    #[arg(short, long, value_name = "AGENTS", value_delimiter = ',')]
    pub agents: Option<Vec<String>>,

    /// Replace existing agent directories and merge conflicting registry files
    #[arg(short, long)]
    pub force: bool,
}

pub fn execute(args: InitArgs, ctx: &Context) -> Result<()> {
    println!("{} Initializing agent-plugins...", ctx.out.info());

    let created = ensure_layout(&ctx.store_root)?;
    if created.is_empty() {
        println!("{} Store already present at {}", ctx.out.ok(), ctx.store_root.display());
    } else {
        println!("{} Created {}", ctx.out.ok(), ctx.store_root.display());
    }

    let profiles = ctx.profiles()?;
    let enabled = choose_agents(ctx, &profiles, args.agents);

    let registry = ctx.registry();
    let mut config = ctx.config()?;
    config.enabled_agents = enabled.clone();
    registry.save_config(&config)?;
    println!(
        "{} Saved configuration (agents: {})",
        ctx.out.ok(),
        enabled.join(", ")
    );

    println!("\n{}", ctx.out.heading("Building merged namespace..."));
    let report = ctx.builder()?.rebuild()?;
    print_build_report(ctx, &report);

    println!("\n{}", ctx.out.heading("Setting up agent links..."));
    let conflicts = sync_agents(ctx, &enabled, args.force)?;

    if let Some(reconciler) = ctx.reconciler()? {
        println!("\n{}", ctx.out.heading("Reconciling registry files..."));
        let report = reconciler.reconcile(args.force)?;
        print_reconcile_report(ctx, &report);
    }

    println!("\n{} Initialization complete!", ctx.out.ok());
    if conflicts > 0 {
        println!(
            "{} {} existing director(ies) were left alone; re-run with --force to replace them",
            ctx.out.warn(),
            conflicts
        );
    }
    println!("\nNext steps:");
    println!("  agent-plugins marketplace add <owner/repo>");
    println!("  agent-plugins list");
    Ok(())
}

fn choose_agents(
    ctx: &Context,
    profiles: &ProfileRegistry,
    requested: Option<Vec<String>>,
) -> Vec<String> {
    if let Some(requested) = requested {
        let mut enabled = Vec::new();
        for key in requested.into_iter().map(|k| k.trim().to_string()) {
            if key.is_empty() || enabled.contains(&key) {
                continue;
            }
            if profiles.get(&key).is_none() {
                println!("{} Unknown agent: {}", ctx.out.warn(), key);
                continue;
            }
            enabled.push(key);
        }
        return enabled;
    }

    let detected: Vec<String> = profiles
        .iter()
        .filter(|p| detect(p, &ctx.user_home).installed())
        .map(|p| p.key.clone())
        .collect();
    if detected.is_empty() {
        profiles.keys()
    } else {
        detected
    }
}
