//! # CLI Command Implementations
//!
//! One module per subcommand of the `agent-plugins` tool. Each holds a
//! `clap` `Args` struct (or a subcommand enum) and an `execute` function that
//! calls into the `agent_plugins` library and prints the outcome.
//!
//! Every command receives the same [`Context`]: the resolved store root, the
//! user home used to locate agent directories, and the output settings.

pub mod check;
pub mod completions;
pub mod init;
pub mod list;
pub mod marketplace;
pub mod metadata;
pub mod rebuild;
pub mod skill;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use log::debug;

use agent_plugins::builder::{BuildReport, StructureBuilder};
use agent_plugins::link::LinkPolicy;
use agent_plugins::output::OutputConfig;
use agent_plugins::profile::ProfileRegistry;
use agent_plugins::reconcile::MetadataReconciler;
use agent_plugins::registry::{AgentConfig, RegistryStore};

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub store_root: PathBuf,
    pub user_home: PathBuf,
    pub out: OutputConfig,
}

impl Context {
    pub fn registry(&self) -> RegistryStore {
        RegistryStore::new(&self.store_root)
    }

    pub fn config(&self) -> Result<AgentConfig> {
        self.registry()
            .load_config()
            .context("Failed to load config.json")
    }

    pub fn profiles(&self) -> Result<ProfileRegistry> {
        ProfileRegistry::load(&self.store_root).context("Failed to load agent descriptors")
    }

    /// Link policy matching the configured sync mode.
    pub fn policy(&self) -> Result<LinkPolicy> {
        Ok(LinkPolicy::for_sync_mode(self.config()?.sync_mode))
    }

    pub fn builder(&self) -> Result<StructureBuilder> {
        Ok(StructureBuilder::new(&self.store_root, self.policy()?))
    }

    /// Reconciler between the store and the agent that owns registry files.
    /// `None` when no known agent owns them or that agent is not enabled.
    pub fn reconciler(&self) -> Result<Option<MetadataReconciler>> {
        let profiles = self.profiles()?;
        let Some(owner) = profiles.metadata_owner() else {
            return Ok(None);
        };
        if !self.config()?.enabled_agents.contains(&owner.key) {
            debug!("{} is not enabled, leaving its registry files alone", owner.name);
            return Ok(None);
        }
        Ok(owner
            .metadata_dir(&self.user_home)
            .map(|dir| MetadataReconciler::new(&self.store_root, dir)))
    }
}

/// Print a per-kind summary of a rebuild.
pub fn print_build_report(ctx: &Context, report: &BuildReport) {
    for (kind, kind_report) in &report.kinds {
        println!(
            "  {}: {} user, {} from marketplaces",
            kind, kind_report.user_linked, kind_report.marketplace_linked
        );
        for skipped in &kind_report.skipped {
            println!("    {} {}", ctx.out.warn(), skipped);
        }
    }
    let degraded = report.degraded().count();
    if degraded > 0 {
        println!(
            "{} {} item(s) were copied instead of linked; re-run rebuild after changes",
            ctx.out.warn(),
            degraded
        );
    }
}
