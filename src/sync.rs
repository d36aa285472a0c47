//! # Consumer Sync
//!
//! Points each consumer's directories at the canonical store.
//!
//! Consumers with a native plugin system read marketplaces themselves, so
//! they get the raw per-kind store directories plus a link to the
//! marketplaces directory. Everyone else gets the merged namespace, which
//! already folds marketplace content in next to the user's own items.

use std::env;
use std::path::{Path, PathBuf};

use log::debug;

use crate::defaults::{marketplaces_dir, merged_dir};
use crate::error::Result;
use crate::link::{LinkPolicy, LinkStatus, LinkTarget};
use crate::profile::{ComponentKind, ConsumerProfile};

/// Links established (or found) for one consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub consumer: String,
    pub links: Vec<LinkTarget>,
}

impl SyncReport {
    pub fn created(&self) -> usize {
        self.count(LinkStatus::Created)
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &LinkTarget> {
        self.links
            .iter()
            .filter(|l| l.status == LinkStatus::Conflict)
    }

    pub fn count(&self, status: LinkStatus) -> usize {
        self.links.iter().filter(|l| l.status == status).count()
    }
}

/// Installation signals for one consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub key: String,
    pub name: String,
    pub cli: Option<PathBuf>,
    pub home_exists: bool,
}

impl Detection {
    pub fn installed(&self) -> bool {
        self.cli.is_some() || self.home_exists
    }
}

pub fn detect(profile: &ConsumerProfile, user_home: &Path) -> Detection {
    Detection {
        key: profile.key.clone(),
        name: profile.name.clone(),
        cli: profile.binary.as_deref().and_then(find_on_path),
        home_exists: profile.home(user_home).is_dir(),
    }
}

/// Look `binary` up on `PATH`.
pub fn find_on_path(binary: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(binary);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let exe = candidate.with_extension("exe");
            if exe.is_file() {
                return Some(exe);
            }
        }
        None
    })
}

/// Links consumer directories to the store.
#[derive(Debug, Clone)]
pub struct ConsumerSync {
    store_root: PathBuf,
    user_home: PathBuf,
    policy: LinkPolicy,
}

impl ConsumerSync {
    pub fn new(store_root: impl Into<PathBuf>, user_home: impl Into<PathBuf>, policy: LinkPolicy) -> Self {
        Self {
            store_root: store_root.into(),
            user_home: user_home.into(),
            policy,
        }
    }

    /// Store directory a consumer's `kind` directory should resolve to.
    pub fn source_for(&self, profile: &ConsumerProfile, kind: ComponentKind) -> PathBuf {
        if profile.supports_plugins() || !ComponentKind::MERGED.contains(&kind) {
            self.store_root.join(kind.dir_name())
        } else {
            merged_dir(&self.store_root).join(kind.dir_name())
        }
    }

    /// `(source, target)` pairs for one consumer.
    pub fn plan(&self, profile: &ConsumerProfile) -> Vec<(PathBuf, PathBuf)> {
        let mut pairs: Vec<(PathBuf, PathBuf)> = ComponentKind::ALL
            .iter()
            .filter_map(|&kind| {
                let target = profile.kind_dir(&self.user_home, kind)?;
                Some((self.source_for(profile, kind), target))
            })
            .collect();
        if let Some(target) = profile.marketplaces_dir(&self.user_home) {
            pairs.push((marketplaces_dir(&self.store_root), target));
        }
        pairs
    }

    pub fn sync(&self, profile: &ConsumerProfile, force: bool) -> Result<SyncReport> {
        let mut links = Vec::new();
        for (source, target) in self.plan(profile) {
            let link = self.policy.establish_link(&source, &target, force)?;
            if link.status == LinkStatus::SourceMissing {
                debug!("{}: nothing at {} yet", profile.key, source.display());
            }
            links.push(link);
        }
        Ok(SyncReport {
            consumer: profile.key.clone(),
            links,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{points_to, LinkStrategy};
    use crate::profile::ProfileRegistry;
    use std::fs;
    use tempfile::TempDir;

    struct Env {
        _temp: TempDir,
        store: PathBuf,
        home: PathBuf,
    }

    fn env() -> Env {
        let temp = TempDir::new().unwrap();
        let store = temp.path().join("store");
        let home = temp.path().join("home");
        for kind in ComponentKind::ALL {
            fs::create_dir_all(store.join(kind.dir_name())).unwrap();
        }
        for kind in ComponentKind::MERGED {
            fs::create_dir_all(merged_dir(&store).join(kind.dir_name())).unwrap();
        }
        fs::create_dir_all(marketplaces_dir(&store)).unwrap();
        fs::create_dir_all(&home).unwrap();
        Env {
            _temp: temp,
            store,
            home,
        }
    }

    #[test]
    fn test_plugin_consumer_plan_uses_raw_store() {
        let e = env();
        let registry = ProfileRegistry::builtin();
        let sync = ConsumerSync::new(&e.store, &e.home, LinkPolicy::platform_default());
        let plan = sync.plan(registry.get("claude").unwrap());

        assert_eq!(plan.len(), 5);
        assert!(plan.contains(&(e.store.join("skills"), e.home.join(".claude/skills"))));
        assert!(plan.contains(&(
            marketplaces_dir(&e.store),
            e.home.join(".claude/plugins/marketplaces")
        )));
    }

    #[test]
    fn test_plain_consumer_plan_uses_merged_namespace() {
        let e = env();
        let registry = ProfileRegistry::builtin();
        let sync = ConsumerSync::new(&e.store, &e.home, LinkPolicy::platform_default());
        let plan = sync.plan(registry.get("opencode").unwrap());

        assert_eq!(
            plan,
            vec![
                (merged_dir(&e.store).join("skills"), e.home.join(".opencode/skills")),
                (merged_dir(&e.store).join("commands"), e.home.join(".opencode/command")),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_sync_links_then_reports_already_linked() {
        let e = env();
        let registry = ProfileRegistry::builtin();
        let sync = ConsumerSync::new(&e.store, &e.home, LinkPolicy::platform_default());
        let codex = registry.get("codex").unwrap();

        let report = sync.sync(codex, false).unwrap();
        assert_eq!(report.created(), 1);
        assert!(points_to(
            &e.home.join(".codex/skills"),
            &merged_dir(&e.store).join("skills")
        ));

        let report = sync.sync(codex, false).unwrap();
        assert_eq!(report.created(), 0);
        assert_eq!(report.count(LinkStatus::AlreadyLinked), 1);
    }

    #[test]
    fn test_existing_directory_is_a_conflict_without_force() {
        let e = env();
        let registry = ProfileRegistry::builtin();
        let sync = ConsumerSync::new(&e.store, &e.home, LinkPolicy::platform_default());
        let gemini = registry.get("gemini").unwrap();
        let existing = e.home.join(".gemini/skills");
        fs::create_dir_all(&existing).unwrap();
        fs::write(existing.join("keep.txt"), "mine").unwrap();

        let report = sync.sync(gemini, false).unwrap();
        assert_eq!(report.conflicts().count(), 1);
        assert!(existing.join("keep.txt").exists());

        let report = sync.sync(gemini, true).unwrap();
        assert_eq!(report.conflicts().count(), 0);
        assert!(!existing.join("keep.txt").exists());
    }

    #[test]
    fn test_copy_policy_mirrors_content() {
        let e = env();
        fs::create_dir_all(e.store.join("skills/pdf")).unwrap();
        fs::write(e.store.join("skills/pdf/SKILL.md"), "# pdf").unwrap();
        let registry = ProfileRegistry::builtin();
        let sync = ConsumerSync::new(&e.store, &e.home, LinkPolicy::new(vec![LinkStrategy::Copy]));

        let report = sync.sync(registry.get("claude").unwrap(), false).unwrap();
        assert!(report.links.iter().all(|l| l.is_degraded()));
        assert_eq!(
            fs::read_to_string(e.home.join(".claude/skills/pdf/SKILL.md")).unwrap(),
            "# pdf"
        );
    }

    #[test]
    fn test_missing_source_is_skipped() {
        let e = env();
        fs::remove_dir_all(merged_dir(&e.store).join("skills")).unwrap();
        let registry = ProfileRegistry::builtin();
        let sync = ConsumerSync::new(&e.store, &e.home, LinkPolicy::platform_default());

        let report = sync.sync(registry.get("codex").unwrap(), false).unwrap();
        assert_eq!(report.count(LinkStatus::SourceMissing), 1);
        assert!(!e.home.join(".codex/skills").exists());
    }

    #[test]
    fn test_detection_by_home_directory() {
        let e = env();
        let registry = ProfileRegistry::builtin();
        let mut profile = registry.get("gemini").unwrap().clone();
        profile.binary = Some("definitely-not-a-real-binary-xyz".to_string());

        assert!(!detect(&profile, &e.home).installed());
        fs::create_dir_all(e.home.join(".gemini")).unwrap();
        let detection = detect(&profile, &e.home);
        assert!(detection.installed());
        assert!(detection.cli.is_none());
    }
}
