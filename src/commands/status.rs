//! # Status Command Implementation
//!
//! Read-only overview: which agents are enabled and linked, which
//! marketplaces are installed and how many skills the store holds.

use anyhow::Result;
use clap::Args;

use agent_plugins::link::points_to;
use agent_plugins::marketplace::MarketplaceManager;
use agent_plugins::output::table;
use agent_plugins::profile::{ComponentKind, SKILL_MANIFEST};
use agent_plugins::sync::{detect, ConsumerSync};

use super::Context;

/// Show agents, marketplaces and skills at a glance
#[derive(Args, Debug)]
pub struct StatusArgs {}

pub fn execute(_args: StatusArgs, ctx: &Context) -> Result<()> {
    let config = ctx.config()?;
    let profiles = ctx.profiles()?;
    let sync = ConsumerSync::new(&ctx.store_root, &ctx.user_home, ctx.policy()?);

    println!("{}", ctx.out.heading("Agent Plugins Status"));
    println!("Store: {}\n", ctx.store_root.display());

    let rows: Vec<Vec<String>> = profiles
        .iter()
        .map(|profile| {
            let plan = sync.plan(profile);
            let linked = plan
                .iter()
                .filter(|(source, target)| points_to(target, source))
                .count();
            vec![
                profile.name.clone(),
                ctx.out
                    .check(config.enabled_agents.contains(&profile.key))
                    .to_string(),
                ctx.out
                    .check(detect(profile, &ctx.user_home).installed())
                    .to_string(),
                format!("{}/{}", linked, plan.len()),
                profile.home(&ctx.user_home).display().to_string(),
            ]
        })
        .collect();
    print!(
        "{}",
        table(&["Agent", "Enabled", "Installed", "Linked", "Home"], &rows)
    );

    let marketplaces = MarketplaceManager::new(&ctx.store_root).names();
    println!();
    if marketplaces.is_empty() {
        println!("Marketplaces: none");
    } else {
        println!("Marketplaces: {}", marketplaces.join(", "));
    }
    println!("Skills: {}", count_skills(ctx));
    Ok(())
}

fn count_skills(ctx: &Context) -> usize {
    let dir = ctx.store_root.join(ComponentKind::Skills.dir_name());
    let pattern = format!(
        "{}/*/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        SKILL_MANIFEST
    );
    match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(|p| p.ok()).count(),
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{initialised_env, test_env};
    use std::fs;

    #[test]
    fn test_count_skills_requires_manifest() {
        let env = initialised_env();
        let skills = env.ctx.store_root.join("skills");
        fs::create_dir_all(skills.join("pdf")).unwrap();
        fs::write(skills.join("pdf/SKILL.md"), "# pdf").unwrap();
        fs::create_dir_all(skills.join("notes")).unwrap();
        assert_eq!(count_skills(&env.ctx), 1);
    }

    #[test]
    fn test_status_on_missing_store() {
        let env = test_env();
        execute(StatusArgs {}, &env.ctx).unwrap();
        assert!(!env.ctx.store_root.exists());
    }
}
