//! # Metadata Command Implementation
//!
//! `metadata status` shows where each shared registry file stands between
//! the store and the agent that also writes it. `metadata reconcile` moves
//! each file to a symlink into the store; with `--force` it also merges
//! files that exist on both sides.

use anyhow::Result;
use clap::{Args, Subcommand};

use agent_plugins::output::table;
use agent_plugins::reconcile::{ReconcileAction, ReconcileReport};

use super::Context;

#[derive(Subcommand, Debug)]
pub enum MetadataCommand {
    /// Show the state of each shared registry file
    Status,
    /// Link shared registry files into the store
    Reconcile(ReconcileArgs),
}

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Merge files present on both sides (the agent's values win) and
    /// replace symlinks that point elsewhere
    #[arg(short, long)]
    pub force: bool,
}

pub fn execute(cmd: MetadataCommand, ctx: &Context) -> Result<()> {
    let Some(reconciler) = ctx.reconciler()? else {
        println!("{} No enabled agent shares registry files with the store", ctx.out.info());
        return Ok(());
    };

    match cmd {
        MetadataCommand::Status => {
            println!(
                "{}",
                ctx.out.heading(format!(
                    "Registry files: {} <-> {}",
                    reconciler.canonical_dir().display(),
                    reconciler.external_dir().display()
                ))
            );
            let rows: Vec<Vec<String>> = reconciler
                .status()
                .into_iter()
                .map(|s| vec![s.file, s.state.to_string()])
                .collect();
            print!("{}", table(&["File", "State"], &rows));
            Ok(())
        }
        MetadataCommand::Reconcile(args) => {
            let report = reconciler.reconcile(args.force)?;
            print_reconcile_report(ctx, &report);
            if report.has_conflicts() && !args.force {
                println!(
                    "{} Re-run with --force to merge conflicting files",
                    ctx.out.info()
                );
            }
            Ok(())
        }
    }
}

pub fn print_reconcile_report(ctx: &Context, report: &ReconcileReport) {
    for outcome in &report.outcomes {
        let file = &outcome.file;
        match &outcome.action {
            ReconcileAction::CreatedCanonical => {
                println!("  {} {} created in store", ctx.out.ok(), file)
            }
            ReconcileAction::NoOp => println!("  {}", ctx.out.dim(format!("{} up to date", file))),
            ReconcileAction::LeftUntouched => println!(
                "  {} {} links elsewhere, left untouched",
                ctx.out.warn(),
                file
            ),
            ReconcileAction::Imported { backup } => println!(
                "  {} {} imported (backup: {})",
                ctx.out.ok(),
                file,
                backup.display()
            ),
            ReconcileAction::Merged { backup } => println!(
                "  {} {} merged (backup: {})",
                ctx.out.ok(),
                file,
                backup.display()
            ),
            ReconcileAction::Relinked { backup } => println!(
                "  {} {} relinked (backup: {})",
                ctx.out.ok(),
                file,
                backup.display()
            ),
            ReconcileAction::Conflict { reason } => {
                println!("  {} {} conflict: {}", ctx.out.warn(), file, reason)
            }
            ReconcileAction::PromotionFailed { reason } => {
                println!("  {} {} not linked: {}", ctx.out.fail(), file, reason)
            }
        }
    }
}
