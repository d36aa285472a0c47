//! # Check Command Implementation
//!
//! Detects which agents are installed. An agent counts as installed when its
//! CLI is on `PATH` or its home directory exists.

use anyhow::Result;
use clap::Args;

use agent_plugins::output::table;
use agent_plugins::profile::ComponentKind;
use agent_plugins::sync::detect;

use super::Context;

/// Detect which agents are installed
#[derive(Args, Debug)]
pub struct CheckArgs {}

pub fn execute(_args: CheckArgs, ctx: &Context) -> Result<()> {
    let profiles = ctx.profiles()?;
    println!("{}", ctx.out.heading("Agent Detection"));

    let rows: Vec<Vec<String>> = profiles
        .iter()
        .map(|profile| {
            let detection = detect(profile, &ctx.user_home);
            let kinds: Vec<&str> = ComponentKind::ALL
                .iter()
                .filter(|k| profile.supports(**k))
                .map(|k| k.dir_name())
                .collect();
            vec![
                detection.name,
                ctx.out.check(detection.cli.is_some()).to_string(),
                ctx.out.check(detection.home_exists).to_string(),
                kinds.join(","),
                ctx.out.check(profile.supports_plugins()).to_string(),
            ]
        })
        .collect();
    print!(
        "{}",
        table(&["Agent", "CLI", "Home", "Components", "Plugins"], &rows)
    );
    Ok(())
}
