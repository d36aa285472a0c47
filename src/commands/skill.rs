//! # Skill Command Implementation
//!
//! `add-skill` copies a local skill directory into `<store>/skills/<name>`.
//! The path may point at the directory or at its `SKILL.md`. `remove-skill`
//! deletes a skill from the store. Both rebuild the merged namespace.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::Args;

use agent_plugins::error::Error;
use agent_plugins::link::{copy_tree, path_present, remove_existing};
use agent_plugins::profile::{ComponentKind, SKILL_MANIFEST};

use super::Context;

/// Copy a local skill into the store
#[derive(Args, Debug)]
pub struct AddSkillArgs {
    /// Skill directory, or the SKILL.md inside it
    pub path: PathBuf,

    /// Name in the store (defaults to the directory name)
    #[arg(short, long)]
    pub name: Option<String>,
}

/// Remove a skill from the store
#[derive(Args, Debug)]
pub struct RemoveSkillArgs {
    /// Skill name
    pub name: String,
}

pub fn add(args: AddSkillArgs, ctx: &Context) -> Result<()> {
    let source = skill_dir(&args.path);
    if !source.join(SKILL_MANIFEST).is_file() {
        return Err(Error::InvalidSkill { path: source }.into());
    }

    let name = match args.name {
        Some(name) => name,
        None => source
            .canonicalize()
            .unwrap_or_else(|_| source.clone())
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("Cannot derive a skill name; pass --name")?,
    };
    validate_name(&name)?;

    let skills = ctx.store_root.join(ComponentKind::Skills.dir_name());
    let target = skills.join(&name);
    if path_present(&target) {
        return Err(Error::AlreadyExists { name, path: skills }.into());
    }

    std::fs::create_dir_all(&skills)?;
    copy_tree(&source, &target)
        .with_context(|| format!("Failed to copy {}", source.display()))?;
    println!("{} Added skill {} at {}", ctx.out.ok(), name, target.display());

    ctx.builder()?.rebuild()?;
    Ok(())
}

pub fn remove(args: RemoveSkillArgs, ctx: &Context) -> Result<()> {
    validate_name(&args.name)?;
    let skills = ctx.store_root.join(ComponentKind::Skills.dir_name());
    let target = skills.join(&args.name);
    if !path_present(&target) {
        return Err(Error::NotFound {
            name: args.name,
            path: skills,
        }
        .into());
    }

    remove_existing(&target)?;
    println!("{} Removed skill {}", ctx.out.ok(), args.name);

    ctx.builder()?.rebuild()?;
    Ok(())
}

fn skill_dir(path: &Path) -> PathBuf {
    if path.file_name().is_some_and(|n| n == SKILL_MANIFEST) {
        path.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf()
    } else {
        path.to_path_buf()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name == "marketplace"
    {
        anyhow::bail!("Invalid skill name '{}'", name);
    }
    Ok(())
}
