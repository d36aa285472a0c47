//! # Marketplace Command Implementation
//!
//! `marketplace add|remove|update|list`. Every command that changes what is
//! installed rebuilds the merged namespace afterwards so agents without a
//! plugin system see the change immediately.

use std::time::Duration;

use anyhow::Result;
use clap::{Args, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm};
use indicatif::{ProgressBar, ProgressStyle};

use agent_plugins::marketplace::{MarketplaceManager, UpdateStatus};
use agent_plugins::output::table;

use super::{print_build_report, Context};

#[derive(Subcommand, Debug)]
pub enum MarketplaceCommand {
    /// Clone a marketplace (owner/repo or git URL)
    Add(AddArgs),
    /// Remove an installed marketplace
    Remove(RemoveArgs),
    /// Pull the latest changes for one or all marketplaces
    Update(UpdateArgs),
    /// List installed marketplaces
    List,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// GitHub `owner/repo` or a git URL
    pub source: String,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Marketplace name
    pub name: String,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Only update this marketplace
    pub name: Option<String>,
}

pub fn execute(cmd: MarketplaceCommand, ctx: &Context) -> Result<()> {
    let manager = MarketplaceManager::new(&ctx.store_root);
    run(cmd, ctx, &manager)
}

fn run(cmd: MarketplaceCommand, ctx: &Context, manager: &MarketplaceManager) -> Result<()> {
    match cmd {
        MarketplaceCommand::Add(args) => {
            let spinner = spinner(ctx, format!("Cloning {}...", args.source));
            let added = manager.add(&args.source);
            spinner.finish_and_clear();
            let added = added?;
            if added.recloned {
                println!("{} Replaced incomplete checkout of {}", ctx.out.warn(), added.name);
            }
            println!(
                "{} Added marketplace {} at {}",
                ctx.out.ok(),
                added.name,
                added.path.display()
            );
            rebuild(ctx)
        }
        MarketplaceCommand::Remove(args) => {
            if !args.yes && !confirm(&format!("Remove marketplace '{}'?", args.name))? {
                println!("Remove cancelled.");
                return Ok(());
            }
            manager.remove(&args.name)?;
            println!("{} Removed marketplace {}", ctx.out.ok(), args.name);
            rebuild(ctx)
        }
        MarketplaceCommand::Update(args) => {
            let spinner = spinner(ctx, "Updating marketplaces...".to_string());
            let results = manager.update(args.name.as_deref());
            spinner.finish_and_clear();
            let results = results?;

            if results.is_empty() {
                println!("{} No marketplaces installed", ctx.out.info());
                return Ok(());
            }
            let mut failed = 0;
            for result in &results {
                match &result.status {
                    UpdateStatus::Updated(output) => {
                        println!("{} {}: {}", ctx.out.ok(), result.name, summary(output))
                    }
                    UpdateStatus::Failed(error) => {
                        failed += 1;
                        println!("{} {}: {}", ctx.out.fail(), result.name, error)
                    }
                }
            }
            rebuild(ctx)?;
            if failed > 0 {
                anyhow::bail!("{} of {} marketplace(s) failed to update", failed, results.len());
            }
            Ok(())
        }
        MarketplaceCommand::List => {
            let infos = manager.list()?;
            if infos.is_empty() {
                println!("{} No marketplaces installed", ctx.out.info());
                return Ok(());
            }
            let rows: Vec<Vec<String>> = infos
                .into_iter()
                .map(|info| {
                    let mut name = info.name;
                    if !info.complete {
                        name.push_str(" (incomplete)");
                    }
                    vec![
                        name,
                        info.plugin_count.to_string(),
                        info.record
                            .map(|r| r.last_updated)
                            .unwrap_or_else(|| "-".to_string()),
                        info.description.unwrap_or_default(),
                    ]
                })
                .collect();
            print!(
                "{}",
                table(&["Name", "Plugins", "Updated", "Description"], &rows)
            );
            Ok(())
        }
    }
}

fn rebuild(ctx: &Context) -> Result<()> {
    let report = ctx.builder()?.rebuild()?;
    println!("{} Rebuilt merged namespace", ctx.out.ok());
    print_build_report(ctx, &report);
    Ok(())
}

fn summary(output: &str) -> &str {
    output
        .lines()
        .last()
        .filter(|l| !l.trim().is_empty())
        .unwrap_or("updated")
}

fn spinner(ctx: &Context, message: String) -> ProgressBar {
    if !ctx.out.use_color {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn confirm(prompt: &str) -> Result<bool> {
    if !console::Term::stdout().is_term() {
        anyhow::bail!("Refusing to prompt without a terminal; pass --yes to confirm");
    }
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}
