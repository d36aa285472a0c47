//! # Rebuild Command Implementation
//!
//! Regenerates the merged namespace from the user's items and every
//! installed marketplace.

use anyhow::{Context as _, Result};
use clap::Args;

use super::{print_build_report, Context};

/// Rebuild the merged namespace
#[derive(Args, Debug)]
pub struct RebuildArgs {}

pub fn execute(_args: RebuildArgs, ctx: &Context) -> Result<()> {
    println!(
        "{} Rebuilding merged namespace in {}",
        ctx.out.info(),
        ctx.store_root.display()
    );
    let report = ctx
        .builder()?
        .rebuild()
        .context("Failed to rebuild merged namespace")?;
    print_build_report(ctx, &report);
    println!(
        "{} Linked {} user item(s) and {} marketplace plugin(s)",
        ctx.out.ok(),
        report.total_user_linked(),
        report.total_marketplace_linked()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{initialised_env, test_env};
    use std::fs;

    #[test]
    fn test_rebuild_fresh_store() {
        let env = initialised_env();
        execute(RebuildArgs {}, &env.ctx).unwrap();
        for kind in ["skills", "commands", "agents"] {
            let marketplace = env.ctx.store_root.join("merged").join(kind).join("marketplace");
            assert!(marketplace.is_dir());
            assert_eq!(fs::read_dir(&marketplace).unwrap().count(), 0);
        }
    }

    #[test]
    fn test_rebuild_without_init_creates_merged_dirs() {
        let env = test_env();
        execute(RebuildArgs {}, &env.ctx).unwrap();
        assert!(env.ctx.store_root.join("merged/commands/marketplace").is_dir());
    }
}
