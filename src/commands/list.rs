//! # List Command Implementation
//!
//! Prints a tree of everything installed marketplaces provide, grouped by
//! plugin and component kind. Skills show the description from their
//! `SKILL.md` front matter when it has one.
//!
//! This command is read-only.

use std::borrow::Cow;
use std::collections::BTreeMap;

use anyhow::Result;
use clap::Args;
use ptree::{print_tree, TreeItem};

use agent_plugins::marketplace::MarketplaceManager;
use agent_plugins::profile::ComponentKind;
use agent_plugins::scanner::{self, dedup_by_destination, read_skill_metadata, ComponentReference};

use super::Context;

/// List components provided by installed marketplaces
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show this marketplace
    #[arg(short, long, value_name = "NAME")]
    pub marketplace: Option<String>,
}

pub fn execute(args: ListArgs, ctx: &Context) -> Result<()> {
    let manager = MarketplaceManager::new(&ctx.store_root);
    let infos = manager.list()?;
    let infos: Vec<_> = infos
        .into_iter()
        .filter(|info| args.marketplace.as_ref().is_none_or(|m| *m == info.name))
        .collect();

    if infos.is_empty() {
        match args.marketplace {
            Some(name) => anyhow::bail!("Marketplace '{}' not found", name),
            None => {
                println!("{} No marketplaces installed", ctx.out.info());
                println!("  agent-plugins marketplace add <owner/repo>");
                return Ok(());
            }
        }
    }

    for info in infos {
        let mut label = info.name.clone();
        if let Some(description) = &info.description {
            label.push_str(&format!(" - {}", description));
        }
        let refs = dedup_by_destination(scanner::scan(&info.path));
        let tree = build_tree(label, &refs);
        print_tree(&tree).map_err(|e| anyhow::anyhow!("Failed to display tree: {}", e))?;
    }
    Ok(())
}

/// Marketplace node with plugin, kind and item levels below it.
fn build_tree(label: String, refs: &[ComponentReference]) -> TreeNode {
    let mut plugins: BTreeMap<&str, BTreeMap<ComponentKind, Vec<&ComponentReference>>> =
        BTreeMap::new();
    for r in refs {
        plugins
            .entry(r.plugin.as_str())
            .or_default()
            .entry(r.kind)
            .or_default()
            .push(r);
    }

    let children = plugins
        .into_iter()
        .map(|(plugin, kinds)| TreeNode {
            label: plugin.to_string(),
            children: kinds
                .into_iter()
                .map(|(kind, items)| TreeNode {
                    label: format!("{} ({})", kind, items.len()),
                    children: items.into_iter().map(item_node).collect(),
                })
                .collect(),
        })
        .collect();

    TreeNode { label, children }
}

fn item_node(r: &ComponentReference) -> TreeNode {
    let description = match r.kind {
        ComponentKind::Skills => read_skill_metadata(&r.source).and_then(|m| m.description),
        _ => None,
    };
    let label = match description {
        Some(d) => format!("{}: {}", r.name, truncate(&d, 60)),
        None => r.name.clone(),
    };
    TreeNode::leaf(label)
}

fn truncate(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or("").trim();
    if line.chars().count() <= max {
        line.to_string()
    } else {
        let cut: String = line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// Tree node structure for ptree visualization
#[derive(Clone, Debug, PartialEq, Eq)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeNode {
    fn leaf(label: String) -> Self {
        Self {
            label,
            children: Vec::new(),
        }
    }
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        Cow::Borrowed(&self.children)
    }
}
