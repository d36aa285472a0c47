//! # Structure Builder
//!
//! Builds the merged namespace: one flat directory per component kind that
//! combines the user's own items with everything installed marketplaces
//! provide. Consumers without a native plugin system are pointed at this
//! directory instead of the raw store.
//!
//! ## Layout
//!
//! ```text
//! <store>/merged/<kind>/
//!     <user item>          -> <store>/<kind>/<user item>
//!     marketplace/
//!         <plugin>         -> <marketplace>/.../<plugin>/<kind>
//! ```
//!
//! ## Rebuild rules
//!
//! - `marketplace/` is deleted and recreated on every rebuild, so an
//!   uninstalled marketplace leaves nothing behind.
//! - Root entries that no longer correspond to a user item are pruned.
//! - Each plugin gets one link per kind, pointing at the `<kind>` directory
//!   holding its items. Items that sit anywhere else (at the checkout root,
//!   or found by the `SKILL.md` search) are linked one by one inside a real
//!   `marketplace/<plugin>/` directory, so the checkout is never exposed.
//!   When two plugins would share a link name the later one is
//!   exposed as `<marketplace>-<plugin>` (or `<plugin>-<dir>`), and skipped
//!   only if every candidate name is taken.
//!
//! Inputs are enumerated in sorted order, so rebuilding unchanged inputs
//! always yields the same listing.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::defaults::{marketplaces_dir, merged_dir, MARKETPLACE_SUBDIR};
use crate::error::Result;
use crate::link::{path_present, remove_existing, LinkPolicy, LinkTarget};
use crate::profile::ComponentKind;
use crate::scanner::{self, dedup_by_destination, sorted_entries, sorted_subdirs, ComponentReference};

/// Result of rebuilding one kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindReport {
    /// User-owned items linked at the namespace root.
    pub user_linked: usize,
    /// Plugin directories linked under `marketplace/`.
    pub marketplace_linked: usize,
    /// Link names created under `marketplace/`.
    pub plugins: BTreeSet<String>,
    /// Links that fell back to copying.
    pub degraded: Vec<LinkTarget>,
    /// Items that could not be placed, with the reason.
    pub skipped: Vec<String>,
}

/// Result of a full rebuild, per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub kinds: BTreeMap<ComponentKind, KindReport>,
}

impl BuildReport {
    pub fn kind(&self, kind: ComponentKind) -> Option<&KindReport> {
        self.kinds.get(&kind)
    }

    pub fn total_user_linked(&self) -> usize {
        self.kinds.values().map(|k| k.user_linked).sum()
    }

    pub fn total_marketplace_linked(&self) -> usize {
        self.kinds.values().map(|k| k.marketplace_linked).sum()
    }

    /// Every plugin name linked for any kind.
    pub fn plugins(&self) -> BTreeSet<String> {
        self.kinds
            .values()
            .flat_map(|k| k.plugins.iter().cloned())
            .collect()
    }

    pub fn degraded(&self) -> impl Iterator<Item = &LinkTarget> {
        self.kinds.values().flat_map(|k| k.degraded.iter())
    }
}

/// Composes the merged namespace of a canonical store.
#[derive(Debug, Clone)]
pub struct StructureBuilder {
    store_root: PathBuf,
    policy: LinkPolicy,
}

impl StructureBuilder {
    pub fn new(store_root: impl Into<PathBuf>, policy: LinkPolicy) -> Self {
        Self {
            store_root: store_root.into(),
            policy,
        }
    }

    /// Directory of the merged namespace for `kind`.
    pub fn kind_dir(&self, kind: ComponentKind) -> PathBuf {
        merged_dir(&self.store_root).join(kind.dir_name())
    }

    /// Scan every installed marketplace, in name order.
    pub fn collect_references(&self) -> Vec<ComponentReference> {
        let refs = sorted_subdirs(&marketplaces_dir(&self.store_root))
            .iter()
            .flat_map(|dir| scanner::scan(dir))
            .collect();
        dedup_by_destination(refs)
    }

    /// Rebuild the merged namespace for commands, agents and skills.
    pub fn rebuild(&self) -> Result<BuildReport> {
        let refs = self.collect_references();
        let mut report = BuildReport::default();
        for kind in ComponentKind::MERGED {
            let kind_report = self.rebuild_kind(kind, &refs)?;
            info!(
                "Rebuilt merged {}: {} user, {} marketplace",
                kind, kind_report.user_linked, kind_report.marketplace_linked
            );
            report.kinds.insert(kind, kind_report);
        }
        Ok(report)
    }

    fn rebuild_kind(&self, kind: ComponentKind, refs: &[ComponentReference]) -> Result<KindReport> {
        let root = self.kind_dir(kind);
        fs::create_dir_all(&root)?;

        let marketplace_root = root.join(MARKETPLACE_SUBDIR);
        if path_present(&marketplace_root) {
            remove_existing(&marketplace_root)?;
        }
        fs::create_dir_all(&marketplace_root)?;

        let mut report = KindReport::default();
        self.link_user_items(kind, &root, &mut report)?;
        self.link_marketplace_items(kind, refs, &marketplace_root, &mut report)?;
        Ok(report)
    }

    fn link_user_items(&self, kind: ComponentKind, root: &Path, report: &mut KindReport) -> Result<()> {
        let user_dir = self.store_root.join(kind.dir_name());
        let mut items = BTreeMap::new();
        for path in sorted_entries(&user_dir) {
            let name = entry_name(&path);
            if name.starts_with('.') {
                continue;
            }
            if name == MARKETPLACE_SUBDIR {
                warn!(
                    "User {} item '{}' clashes with the marketplace folder, skipping",
                    kind, name
                );
                report.skipped.push(name);
                continue;
            }
            items.insert(name, path);
        }

        for existing in sorted_entries(root) {
            let name = entry_name(&existing);
            if name != MARKETPLACE_SUBDIR && !items.contains_key(&name) {
                debug!("Pruning stale merged entry {}", existing.display());
                remove_existing(&existing)?;
            }
        }

        for (name, source) in &items {
            let outcome = self.policy.establish_link(source, &root.join(name), true)?;
            if outcome.is_ok() {
                report.user_linked += 1;
            } else {
                report.skipped.push(name.clone());
            }
            if outcome.is_degraded() {
                report.degraded.push(outcome);
            }
        }
        Ok(())
    }

    fn link_marketplace_items(
        &self,
        kind: ComponentKind,
        refs: &[ComponentReference],
        marketplace_root: &Path,
        report: &mut KindReport,
    ) -> Result<()> {
        let mut linked_containers: HashSet<PathBuf> = HashSet::new();
        let mut loose_dirs: HashMap<(String, String), PathBuf> = HashMap::new();
        let mut taken: HashSet<String> = HashSet::new();

        for reference in refs.iter().filter(|r| r.kind == kind) {
            let container = reference.container().to_path_buf();
            if !self.is_kind_container(kind, reference) {
                self.link_loose_item(reference, marketplace_root, &mut loose_dirs, &mut taken, report)?;
                continue;
            }
            if linked_containers.contains(&container) {
                debug!(
                    "{} of plugin '{}' from '{}' already reachable through {}",
                    kind,
                    reference.plugin,
                    reference.marketplace,
                    container.display()
                );
                continue;
            }

            let Some(name) = link_name(reference, &container, &taken) else {
                warn!(
                    "No free name for {} of plugin '{}' from '{}', skipping",
                    kind, reference.plugin, reference.marketplace
                );
                report.skipped.push(reference.plugin.clone());
                continue;
            };

            let outcome = self
                .policy
                .establish_link(&container, &marketplace_root.join(&name), false)?;
            if outcome.is_ok() {
                report.marketplace_linked += 1;
                report.plugins.insert(name.clone());
            } else {
                report.skipped.push(name.clone());
            }
            if outcome.is_degraded() {
                report.degraded.push(outcome);
            }
            linked_containers.insert(container);
            taken.insert(name);
        }
        Ok(())
    }

    /// Whether the item's parent is a `<kind>` directory that can be linked
    /// whole. The marketplace checkout itself never qualifies.
    fn is_kind_container(&self, kind: ComponentKind, reference: &ComponentReference) -> bool {
        let container = reference.container();
        let checkout = marketplaces_dir(&self.store_root).join(&reference.marketplace);
        container.file_name().is_some_and(|n| n == kind.dir_name())
            && container != checkout
            && !container.join(".git").exists()
    }

    /// Link a single item under a real `marketplace/<plugin>/` directory.
    fn link_loose_item(
        &self,
        reference: &ComponentReference,
        marketplace_root: &Path,
        loose_dirs: &mut HashMap<(String, String), PathBuf>,
        taken: &mut HashSet<String>,
        report: &mut KindReport,
    ) -> Result<()> {
        let key = (reference.marketplace.clone(), reference.plugin.clone());
        let dir = match loose_dirs.get(&key) {
            Some(dir) => dir.clone(),
            None => {
                let Some(name) = link_name(reference, reference.container(), taken) else {
                    warn!(
                        "No free name for {} of plugin '{}' from '{}', skipping",
                        reference.kind, reference.plugin, reference.marketplace
                    );
                    report.skipped.push(reference.plugin.clone());
                    return Ok(());
                };
                let dir = marketplace_root.join(&name);
                fs::create_dir_all(&dir)?;
                report.marketplace_linked += 1;
                report.plugins.insert(name.clone());
                taken.insert(name);
                loose_dirs.insert(key, dir.clone());
                dir
            }
        };

        let item = entry_name(&reference.source);
        let outcome = self
            .policy
            .establish_link(&reference.source, &dir.join(&item), false)?;
        if !outcome.is_ok() {
            report.skipped.push(format!("{}/{}", reference.plugin, item));
        }
        if outcome.is_degraded() {
            report.degraded.push(outcome);
        }
        Ok(())
    }
}

/// First unused link name for a plugin's container directory.
fn link_name(reference: &ComponentReference, container: &Path, taken: &HashSet<String>) -> Option<String> {
    let candidates = [
        reference.plugin.clone(),
        format!("{}-{}", reference.marketplace, reference.plugin),
        format!("{}-{}", reference.plugin, entry_name(container)),
    ];
    candidates
        .into_iter()
        .find(|c| !c.is_empty() && !taken.contains(c))
}

fn entry_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::is_link;
    use crate::profile::SKILL_MANIFEST;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn listing(dir: &Path) -> Vec<String> {
        walkdir::WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .map(|e| {
                e.unwrap()
                    .path()
                    .strip_prefix(dir)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }

    fn populated_store() -> TempDir {
        let temp = TempDir::new().unwrap();
        let store = temp.path();
        write(&store.join("skills/my-skill").join(SKILL_MANIFEST), "# mine");
        write(&store.join("commands/deploy.md"), "# deploy");
        let market = store.join("plugins/marketplaces/acme");
        write(&market.join("plugins/git-tools/commands/commit.md"), "# commit");
        write(&market.join("plugins/docs/skills/pdf").join(SKILL_MANIFEST), "# pdf");
        write(&market.join("agents/planner.md"), "# planner");
        temp
    }

    #[test]
    fn test_fresh_store_reports_zero() {
        let temp = TempDir::new().unwrap();
        let builder = StructureBuilder::new(temp.path(), LinkPolicy::platform_default());

        let report = builder.rebuild().unwrap();
        for kind in ComponentKind::MERGED {
            let k = report.kind(kind).unwrap();
            assert_eq!(k.user_linked, 0);
            assert_eq!(k.marketplace_linked, 0);
            assert_eq!(listing(&builder.kind_dir(kind)), vec!["", MARKETPLACE_SUBDIR]);
        }
        assert!(report.plugins().is_empty());
    }

    #[test]
    fn test_rebuild_links_user_and_marketplace_items() {
        let temp = populated_store();
        let builder = StructureBuilder::new(temp.path(), LinkPolicy::platform_default());

        let report = builder.rebuild().unwrap();
        let commands = report.kind(ComponentKind::Commands).unwrap();
        assert_eq!(commands.user_linked, 1);
        assert_eq!(commands.marketplace_linked, 1);
        assert!(commands.plugins.contains("git-tools"));

        let skills = report.kind(ComponentKind::Skills).unwrap();
        assert_eq!(skills.user_linked, 1);
        assert!(skills.plugins.contains("docs"));

        let agents = report.kind(ComponentKind::Agents).unwrap();
        assert!(agents.plugins.contains("acme"));

        let merged = builder.kind_dir(ComponentKind::Commands);
        assert_eq!(
            fs::read_to_string(merged.join("deploy.md")).unwrap(),
            "# deploy"
        );
        assert_eq!(
            fs::read_to_string(merged.join("marketplace/git-tools/commit.md")).unwrap(),
            "# commit"
        );
        assert!(builder
            .kind_dir(ComponentKind::Skills)
            .join("marketplace/docs/pdf")
            .join(SKILL_MANIFEST)
            .exists());
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let temp = populated_store();
        let builder = StructureBuilder::new(temp.path(), LinkPolicy::platform_default());

        let first = builder.rebuild().unwrap();
        let before = listing(&merged_dir(temp.path()));
        let second = builder.rebuild().unwrap();
        let after = listing(&merged_dir(temp.path()));

        assert_eq!(before, after);
        assert_eq!(first, second);
    }

    #[test]
    fn test_removed_marketplace_leaves_no_stale_links() {
        let temp = populated_store();
        let builder = StructureBuilder::new(temp.path(), LinkPolicy::platform_default());
        builder.rebuild().unwrap();

        fs::remove_dir_all(temp.path().join("plugins/marketplaces/acme")).unwrap();
        let report = builder.rebuild().unwrap();

        assert_eq!(report.total_marketplace_linked(), 0);
        for kind in ComponentKind::MERGED {
            let market = builder.kind_dir(kind).join(MARKETPLACE_SUBDIR);
            assert_eq!(fs::read_dir(&market).unwrap().count(), 0);
        }
    }

    #[test]
    fn test_removed_user_item_is_pruned() {
        let temp = populated_store();
        let builder = StructureBuilder::new(temp.path(), LinkPolicy::platform_default());
        builder.rebuild().unwrap();

        fs::remove_file(temp.path().join("commands/deploy.md")).unwrap();
        let report = builder.rebuild().unwrap();

        assert_eq!(report.kind(ComponentKind::Commands).unwrap().user_linked, 0);
        assert!(!path_present(
            &builder.kind_dir(ComponentKind::Commands).join("deploy.md")
        ));
    }

    #[test]
    fn test_plugin_name_collision_across_marketplaces() {
        let temp = TempDir::new().unwrap();
        let markets = temp.path().join("plugins/marketplaces");
        write(&markets.join("alpha/plugins/tools/commands/a.md"), "# a");
        write(&markets.join("beta/plugins/tools/commands/b.md"), "# b");
        let builder = StructureBuilder::new(temp.path(), LinkPolicy::platform_default());

        let report = builder.rebuild().unwrap();
        let commands = report.kind(ComponentKind::Commands).unwrap();
        assert_eq!(commands.marketplace_linked, 2);
        assert!(commands.plugins.contains("tools"));
        assert!(commands.plugins.contains("beta-tools"));
    }

    #[test]
    fn test_root_level_skill_does_not_expose_checkout() {
        let temp = TempDir::new().unwrap();
        let market = temp.path().join("plugins/marketplaces/examples");
        write(&market.join(".git/config"), "[core]");
        write(&market.join("README.md"), "# readme");
        write(&market.join("algorithmic-art").join(SKILL_MANIFEST), "# art");
        write(&market.join("canvas").join(SKILL_MANIFEST), "# canvas");
        write(
            &market.join(".claude-plugin/marketplace.json"),
            r#"{"plugins": [{"name": "example-skills", "source": "./",
                "skills": ["./algorithmic-art", "./canvas"]}]}"#,
        );
        let builder = StructureBuilder::new(temp.path(), LinkPolicy::platform_default());

        let report = builder.rebuild().unwrap();
        let skills = report.kind(ComponentKind::Skills).unwrap();
        assert_eq!(skills.marketplace_linked, 1);
        assert!(skills.skipped.is_empty());

        let plugin = builder.kind_dir(ComponentKind::Skills).join("marketplace/example-skills");
        assert!(!is_link(&plugin));
        assert!(plugin.join("algorithmic-art").join(SKILL_MANIFEST).exists());
        assert!(plugin.join("canvas").join(SKILL_MANIFEST).exists());
        assert!(!plugin.join(".git").exists());
        assert!(!plugin.join("README.md").exists());
        assert_eq!(listing(&plugin), vec!["", "algorithmic-art", "canvas"]);

        let again = builder.rebuild().unwrap();
        assert_eq!(again, report);
    }

    #[test]
    fn test_searched_skills_are_linked_individually() {
        let temp = TempDir::new().unwrap();
        let market = temp.path().join("plugins/marketplaces/loose");
        write(&market.join(".git/HEAD"), "ref: refs/heads/main");
        write(&market.join("pdf").join(SKILL_MANIFEST), "# pdf");
        write(&market.join("nested/deep/xlsx").join(SKILL_MANIFEST), "# xlsx");
        let builder = StructureBuilder::new(temp.path(), LinkPolicy::platform_default());

        builder.rebuild().unwrap();
        let plugin = builder.kind_dir(ComponentKind::Skills).join("marketplace/loose");
        assert!(!is_link(&plugin));
        assert!(plugin.join("pdf").join(SKILL_MANIFEST).exists());
        assert!(plugin.join("xlsx").join(SKILL_MANIFEST).exists());
        assert!(!plugin.join(".git").exists());
    }

    #[test]
    fn test_plugins_sharing_a_directory_are_linked_once() {
        let temp = TempDir::new().unwrap();
        let market = temp.path().join("plugins/marketplaces/shared");
        write(&market.join("tools/commands/fmt.md"), "# fmt");
        write(&market.join("tools/commands/lint.md"), "# lint");
        write(
            &market.join(".claude-plugin/marketplace.json"),
            r#"{"plugins": [
                {"name": "first", "commands": ["./tools/commands/fmt.md"]},
                {"name": "second", "commands": ["./tools/commands/lint.md"]}
            ]}"#,
        );
        let builder = StructureBuilder::new(temp.path(), LinkPolicy::platform_default());

        let report = builder.rebuild().unwrap();
        let commands = report.kind(ComponentKind::Commands).unwrap();
        assert_eq!(commands.marketplace_linked, 1);
        assert_eq!(commands.plugins.len(), 1);
        assert!(commands.plugins.contains("first"));
        assert!(commands.skipped.is_empty());
        let merged = builder.kind_dir(ComponentKind::Commands);
        assert!(merged.join("marketplace/first/lint.md").exists());
    }

    #[test]
    fn test_user_item_named_marketplace_is_skipped() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("commands/marketplace/x.md"), "# x");
        let builder = StructureBuilder::new(temp.path(), LinkPolicy::platform_default());

        let report = builder.rebuild().unwrap();
        let commands = report.kind(ComponentKind::Commands).unwrap();
        assert_eq!(commands.user_linked, 0);
        assert_eq!(commands.skipped, vec!["marketplace".to_string()]);
    }

    #[test]
    fn test_copy_policy_reports_degraded_links() {
        let temp = populated_store();
        let builder = StructureBuilder::new(
            temp.path(),
            LinkPolicy::for_sync_mode(crate::link::SyncMode::Copy),
        );

        let report = builder.rebuild().unwrap();
        assert!(report.degraded().count() > 0);
        assert!(report.degraded().all(|l| l.is_degraded()));
        let again = builder.rebuild().unwrap();
        assert_eq!(report.total_user_linked(), again.total_user_linked());
    }
}
