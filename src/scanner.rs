//! # Marketplace Scanner
//!
//! Discovers the skills, commands, agents and hooks a marketplace repository
//! provides. Marketplaces in the wild are laid out inconsistently, so the
//! scanner tries several layouts, in order of precedence:
//!
//! 1. **Manifest**: `.claude-plugin/marketplace.json` lists plugins, their
//!    source directory and, optionally, explicit component paths.
//! 2. **Root directories**: `skills/`, `commands/`, `agents/`, `hooks/` at the
//!    marketplace root.
//! 3. **Plugin directories**: the same per-kind directories one level under
//!    `plugins/<plugin>/`, optionally behind a version directory
//!    (`plugins/<plugin>/<version>/<kind>`).
//! 4. **Recursive search**: any directory holding a `SKILL.md`, used only when
//!    the layouts above produced no skills.
//!
//! A missing or malformed manifest never fails the scan; the remaining
//! layouts still run. The scanner only reads. References that end up at the
//! same destination are left for the caller to collapse with
//! [`dedup_by_destination`].

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use walkdir::WalkDir;

use crate::error::Result;
use crate::profile::{ComponentKind, SKILL_MANIFEST};

/// Location of the marketplace manifest relative to the marketplace root.
pub const MANIFEST_PATH: &str = ".claude-plugin/marketplace.json";

/// Directory that holds nested plugins in layout (3).
pub const PLUGINS_DIR: &str = "plugins";

/// One discovered component. Transient; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentReference {
    pub kind: ComponentKind,
    pub name: String,
    pub source: PathBuf,
    pub marketplace: String,
    pub plugin: String,
}

impl ComponentReference {
    /// Directory the item lives in; this is what the Structure Builder links.
    pub fn container(&self) -> &Path {
        self.source.parent().unwrap_or(&self.source)
    }
}

/// The subset of `marketplace.json` the scanner understands.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketplaceManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Option<ManifestMetadata>,
    #[serde(default)]
    pub plugins: Vec<ManifestPlugin>,
}

impl MarketplaceManifest {
    /// Top-level description, falling back to `metadata.description`.
    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .or_else(|| self.metadata.as_ref()?.description.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManifestMetadata {
    #[serde(default)]
    pub description: Option<String>,
}

/// A plugin entry of the manifest.
///
/// Component fields may be a single path, a list of paths, or (for hooks) an
/// inline object; only string paths are used.
#[derive(Debug, Clone, Deserialize)]
pub struct ManifestPlugin {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<JsonValue>,
    #[serde(default)]
    pub skills: Option<JsonValue>,
    #[serde(default)]
    pub commands: Option<JsonValue>,
    #[serde(default)]
    pub agents: Option<JsonValue>,
    #[serde(default)]
    pub hooks: Option<JsonValue>,
}

impl ManifestPlugin {
    /// Explicit component paths declared for `kind`.
    pub fn paths(&self, kind: ComponentKind) -> Vec<String> {
        let field = match kind {
            ComponentKind::Skills => &self.skills,
            ComponentKind::Commands => &self.commands,
            ComponentKind::Agents => &self.agents,
            ComponentKind::Hooks => &self.hooks,
        };
        match field {
            Some(JsonValue::String(path)) => vec![path.clone()],
            Some(JsonValue::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Plugin directory inside the marketplace, when `source` is a local path.
    pub fn local_source(&self, root: &Path) -> Option<PathBuf> {
        let relative = match &self.source {
            Some(JsonValue::String(path)) => path.as_str(),
            Some(JsonValue::Object(obj)) => obj.get("path")?.as_str()?,
            _ => return None,
        };
        let dir = join_relative(root, relative);
        dir.is_dir().then_some(dir)
    }
}

/// Front matter of a `SKILL.md`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SkillMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Read `.claude-plugin/marketplace.json`, if present.
///
/// Returns `Ok(None)` when the marketplace has no manifest and an error when
/// the file exists but cannot be parsed.
pub fn read_manifest(root: &Path) -> Result<Option<MarketplaceManifest>> {
    let path = root.join(MANIFEST_PATH);
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Parse the YAML front matter of a skill directory's `SKILL.md`.
pub fn read_skill_metadata(skill_dir: &Path) -> Option<SkillMetadata> {
    let content = fs::read_to_string(skill_dir.join(SKILL_MANIFEST)).ok()?;
    let rest = content.trim_start().strip_prefix("---")?;
    let end = rest.find("\n---")?;
    match serde_yaml::from_str(&rest[..end]) {
        Ok(meta) => Some(meta),
        Err(e) => {
            debug!("Ignoring front matter in {}: {}", skill_dir.display(), e);
            None
        }
    }
}

/// Discover every component reference under a marketplace root.
pub fn scan(root: &Path) -> Vec<ComponentReference> {
    let marketplace = root
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut scan = Scan {
        root,
        marketplace,
        refs: Vec::new(),
    };

    scan.scan_manifest();
    scan.scan_root_dirs();
    scan.scan_plugin_dirs();
    if !scan.refs.iter().any(|r| r.kind == ComponentKind::Skills) {
        scan.search_skills();
    }

    debug!(
        "Scanned {}: {} component reference(s)",
        root.display(),
        scan.refs.len()
    );
    scan.refs
}

/// Drop references that would land on an already-claimed destination.
///
/// Two references are duplicates when they share a kind and either point at
/// the same source item or would be exposed under the same plugin and name.
/// The first occurrence wins, so manifest-declared items take precedence over
/// heuristically discovered ones.
pub fn dedup_by_destination(refs: Vec<ComponentReference>) -> Vec<ComponentReference> {
    let mut seen_sources = HashSet::new();
    let mut seen_names = HashSet::new();
    refs.into_iter()
        .filter(|r| {
            let source_key = (r.kind, r.source.clone());
            let name_key = (r.kind, r.plugin.clone(), r.name.clone());
            if seen_sources.contains(&source_key) || seen_names.contains(&name_key) {
                debug!("Dropping duplicate {} '{}' from {}", r.kind, r.name, r.plugin);
                return false;
            }
            seen_sources.insert(source_key);
            seen_names.insert(name_key);
            true
        })
        .collect()
}

struct Scan<'a> {
    root: &'a Path,
    marketplace: String,
    refs: Vec<ComponentReference>,
}

impl Scan<'_> {
    fn scan_manifest(&mut self) {
        let manifest = match read_manifest(self.root) {
            Ok(Some(manifest)) => manifest,
            Ok(None) => return,
            Err(e) => {
                warn!(
                    "Malformed manifest in {}, falling back to directory layout: {}",
                    self.root.display(),
                    e
                );
                return;
            }
        };

        for plugin in &manifest.plugins {
            let plugin_dir = plugin.local_source(self.root);
            for kind in ComponentKind::ALL {
                let declared = plugin.paths(kind);
                if declared.is_empty() {
                    if let Some(dir) = &plugin_dir {
                        self.collect(kind, &dir.join(kind.dir_name()), &plugin.name);
                    }
                    continue;
                }
                for relative in declared {
                    let resolved = plugin_dir
                        .iter()
                        .map(|dir| join_relative(dir, &relative))
                        .chain(std::iter::once(join_relative(self.root, &relative)))
                        .find(|p| p.exists());
                    match resolved {
                        Some(path) => self.collect(kind, &path, &plugin.name),
                        None => debug!(
                            "Manifest path {} for plugin {} does not exist",
                            relative, plugin.name
                        ),
                    }
                }
            }
        }
    }

    fn scan_root_dirs(&mut self) {
        let plugin = self.marketplace.clone();
        for kind in ComponentKind::ALL {
            self.collect(kind, &self.root.join(kind.dir_name()), &plugin);
        }
    }

    fn scan_plugin_dirs(&mut self) {
        let plugins_root = self.root.join(PLUGINS_DIR);
        for plugin_dir in sorted_subdirs(&plugins_root) {
            let plugin = file_name(&plugin_dir);
            let base = if has_kind_dir(&plugin_dir) {
                Some(plugin_dir.clone())
            } else {
                // Entries are sorted, so the last matching version wins.
                sorted_subdirs(&plugin_dir)
                    .into_iter()
                    .filter(|v| has_kind_dir(v))
                    .last()
            };
            let Some(base) = base else {
                continue;
            };
            for kind in ComponentKind::ALL {
                self.collect(kind, &base.join(kind.dir_name()), &plugin);
            }
        }
    }

    fn search_skills(&mut self) {
        let mut walker = WalkDir::new(self.root).min_depth(1).sort_by_file_name().into_iter();
        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            if is_hidden(entry.path()) {
                walker.skip_current_dir();
                continue;
            }
            if ComponentKind::Skills.is_item(entry.path()) {
                let plugin = self.marketplace.clone();
                self.push(ComponentKind::Skills, entry.path(), &plugin);
                walker.skip_current_dir();
            }
        }
    }

    /// Add `path` as a single item, or each qualifying child of it.
    fn collect(&mut self, kind: ComponentKind, path: &Path, plugin: &str) {
        if kind.is_item(path) {
            self.push(kind, path, plugin);
            return;
        }
        if !path.is_dir() {
            return;
        }
        for child in sorted_entries(path) {
            if !is_hidden(&child) && kind.is_item(&child) {
                self.push(kind, &child, plugin);
            }
        }
    }

    fn push(&mut self, kind: ComponentKind, path: &Path, plugin: &str) {
        let Some(name) = kind.item_name(path) else {
            return;
        };
        self.refs.push(ComponentReference {
            kind,
            name,
            source: path.to_path_buf(),
            marketplace: self.marketplace.clone(),
            plugin: plugin.to_string(),
        });
    }
}

/// Join a manifest-relative path without leaving `.` segments behind, so the
/// same item reached two ways compares equal.
fn join_relative(base: &Path, relative: &str) -> PathBuf {
    let trimmed = relative.trim_start_matches("./").trim_end_matches('/');
    if trimmed.is_empty() || trimmed == "." {
        base.to_path_buf()
    } else {
        base.join(trimmed)
    }
}

fn has_kind_dir(dir: &Path) -> bool {
    ComponentKind::ALL
        .iter()
        .any(|kind| dir.join(kind.dir_name()).is_dir())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with('.'))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Children of `dir`, sorted by name. Unreadable directories yield nothing.
pub(crate) fn sorted_entries(dir: &Path) -> Vec<PathBuf> {
    let Ok(read) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut entries: Vec<PathBuf> = read.filter_map(|e| e.ok().map(|e| e.path())).collect();
    entries.sort();
    entries
}

/// Non-hidden subdirectories of `dir`, sorted by name.
pub(crate) fn sorted_subdirs(dir: &Path) -> Vec<PathBuf> {
    sorted_entries(dir)
        .into_iter()
        .filter(|p| p.is_dir() && !is_hidden(p))
        .collect()
}
