//! # Marketplace Management
//!
//! Installs, refreshes and removes marketplaces under
//! `<store>/plugins/marketplaces/<name>` and keeps `known_marketplaces.json`
//! in step with what is on disk.
//!
//! A source is either a GitHub shorthand (`owner/repo`) or a full git URL
//! (`https://...`, `git@host:owner/repo.git`). The marketplace name is the
//! last path segment without a `.git` suffix.
//!
//! A directory without `.git` is treated as the remains of an interrupted
//! clone and is cloned again instead of being reported as a duplicate.

use std::path::{Path, PathBuf};

use log::{info, warn};
use url::Url;

use crate::defaults::marketplaces_dir;
use crate::error::{Error, Result};
use crate::git::{is_checkout, GitOperations, SystemGit};
use crate::link::remove_existing;
use crate::registry::{MarketplaceRecord, MarketplaceSource, RegistryStore, SourceKind};
use crate::scanner::{read_manifest, sorted_subdirs};

/// A parsed marketplace source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketplaceSpec {
    pub name: String,
    pub clone_url: String,
    pub source: MarketplaceSource,
}

impl MarketplaceSpec {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let invalid = |message: &str| Error::InvalidSource {
            source_spec: input.to_string(),
            message: message.to_string(),
        };

        if input.starts_with("http://") || input.starts_with("https://") {
            let url = Url::parse(input)?;
            let last = url
                .path_segments()
                .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
                .ok_or_else(|| invalid("URL has no repository path"))?;
            let name = repo_name(last).ok_or_else(|| invalid("cannot derive a name"))?;
            return Ok(Self::git(name, input));
        }

        if let Some(rest) = input.strip_prefix("git@") {
            let (_, path) = rest
                .split_once(':')
                .ok_or_else(|| invalid("expected git@host:owner/repo"))?;
            let last = path.rsplit('/').next().unwrap_or(path);
            let name = repo_name(last).ok_or_else(|| invalid("cannot derive a name"))?;
            return Ok(Self::git(name, input));
        }

        let parts: Vec<&str> = input.split('/').collect();
        match parts.as_slice() {
            [owner, repo] if is_slug(owner) && is_slug(repo) => {
                let name = repo_name(repo).ok_or_else(|| invalid("cannot derive a name"))?;
                let repo = repo.trim_end_matches(".git");
                Ok(Self {
                    name,
                    clone_url: format!("https://github.com/{}/{}.git", owner, repo),
                    source: MarketplaceSource {
                        source: SourceKind::Github,
                        repo: Some(format!("{}/{}", owner, repo)),
                        url: None,
                    },
                })
            }
            _ => Err(invalid("expected owner/repo or a git URL")),
        }
    }

    fn git(name: String, url: &str) -> Self {
        Self {
            name,
            clone_url: url.to_string(),
            source: MarketplaceSource {
                source: SourceKind::Git,
                repo: None,
                url: Some(url.to_string()),
            },
        }
    }
}

fn repo_name(segment: &str) -> Option<String> {
    let name = segment.trim_end_matches(".git");
    if is_slug(name) {
        Some(name.to_string())
    } else {
        None
    }
}

fn is_slug(s: &str) -> bool {
    !s.is_empty()
        && s != "."
        && s != ".."
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Result of `MarketplaceManager::add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Added {
    pub name: String,
    pub path: PathBuf,
    /// An incomplete checkout was found and replaced.
    pub recloned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    Updated(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult {
    pub name: String,
    pub status: UpdateStatus,
}

impl UpdateResult {
    pub fn is_ok(&self) -> bool {
        matches!(self.status, UpdateStatus::Updated(_))
    }
}

/// What `list` reports for one installed marketplace.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceInfo {
    pub name: String,
    pub path: PathBuf,
    pub description: Option<String>,
    pub plugin_count: usize,
    pub complete: bool,
    pub record: Option<MarketplaceRecord>,
}

pub struct MarketplaceManager {
    dir: PathBuf,
    registry: RegistryStore,
    git: Box<dyn GitOperations>,
}

impl MarketplaceManager {
    pub fn new(store_root: &Path) -> Self {
        Self::with_git(store_root, Box::new(SystemGit))
    }

    pub fn with_git(store_root: &Path, git: Box<dyn GitOperations>) -> Self {
        Self {
            dir: marketplaces_dir(store_root),
            registry: RegistryStore::new(store_root),
            git,
        }
    }

    pub fn marketplace_dir(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Clone a marketplace and record it.
    pub fn add(&self, source: &str) -> Result<Added> {
        let spec = MarketplaceSpec::parse(source)?;
        let target = self.marketplace_dir(&spec.name);

        if is_checkout(&target) {
            return Err(Error::MarketplaceExists {
                name: spec.name,
                hint: Some("Use 'marketplace update' to refresh it".to_string()),
            });
        }

        let recloned = target.exists();
        if recloned {
            warn!(
                "{} has no .git directory; re-cloning incomplete marketplace",
                target.display()
            );
            remove_existing(&target)?;
        }

        if let Err(e) = self.git.clone_shallow(&spec.clone_url, &target) {
            if target.exists() {
                remove_existing(&target)?;
            }
            return Err(e);
        }
        info!("Cloned {} into {}", spec.clone_url, target.display());

        // A record without a checkout is stale.
        self.registry.remove_marketplace(&spec.name)?;
        self.registry
            .add_marketplace(&spec.name, MarketplaceRecord::new(spec.source, &target))?;

        Ok(Added {
            name: spec.name,
            path: target,
            recloned,
        })
    }

    /// Delete a marketplace directory and its record.
    pub fn remove(&self, name: &str) -> Result<()> {
        if !is_slug(name) {
            return Err(Error::MarketplaceNotFound {
                name: name.to_string(),
            });
        }
        let target = self.marketplace_dir(name);
        let on_disk = target.exists() || target.is_symlink();
        if on_disk {
            remove_existing(&target)?;
        }
        let recorded = self.registry.remove_marketplace(name)?;
        if !on_disk && !recorded {
            return Err(Error::MarketplaceNotFound {
                name: name.to_string(),
            });
        }
        info!("Removed marketplace {}", name);
        Ok(())
    }

    /// Pull one marketplace, or every installed one. Failures are collected
    /// per marketplace and do not stop the others.
    pub fn update(&self, name: Option<&str>) -> Result<Vec<UpdateResult>> {
        let targets = match name {
            Some(name) => {
                let dir = self.marketplace_dir(name);
                if !is_slug(name) || !is_checkout(&dir) {
                    return Err(Error::MarketplaceNotFound {
                        name: name.to_string(),
                    });
                }
                vec![dir]
            }
            None => sorted_subdirs(&self.dir)
                .into_iter()
                .filter(|dir| is_checkout(dir))
                .collect(),
        };

        let mut results = Vec::with_capacity(targets.len());
        for dir in targets {
            let name = dir_name(&dir);
            let status = match self.git.pull_ff_only(&dir) {
                Ok(output) => {
                    self.registry.touch_marketplace(&name)?;
                    UpdateStatus::Updated(output)
                }
                Err(e) => {
                    warn!("Failed to update {}: {}", name, e);
                    UpdateStatus::Failed(e.to_string())
                }
            };
            results.push(UpdateResult { name, status });
        }
        Ok(results)
    }

    /// Installed marketplaces, sorted by name.
    pub fn list(&self) -> Result<Vec<MarketplaceInfo>> {
        let known = self.registry.load_known_marketplaces()?;
        let mut infos = Vec::new();
        for dir in sorted_subdirs(&self.dir) {
            let name = dir_name(&dir);
            let manifest = match read_manifest(&dir) {
                Ok(manifest) => manifest,
                Err(e) => {
                    warn!("Ignoring manifest of {}: {}", name, e);
                    None
                }
            };
            infos.push(MarketplaceInfo {
                description: manifest
                    .as_ref()
                    .and_then(|m| m.description().map(str::to_string)),
                plugin_count: manifest.as_ref().map(|m| m.plugins.len()).unwrap_or(0),
                complete: is_checkout(&dir),
                record: known.get(&name).cloned(),
                path: dir,
                name,
            });
        }
        Ok(infos)
    }

    /// Names of installed marketplaces.
    pub fn names(&self) -> Vec<String> {
        sorted_subdirs(&self.dir).iter().map(|d| dir_name(d)).collect()
    }
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Create a minimal checkout marker; used by mocks that stand in for git.
#[cfg(test)]
pub(crate) fn fake_checkout(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir.join(".git"))
}
