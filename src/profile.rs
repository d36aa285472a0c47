//! # Consumer Profiles
//!
//! A consumer is an external coding agent (Claude Code, OpenCode, Codex, ...)
//! that expects skills, commands, agents and hooks under its own home
//! directory. Each consumer is described by an immutable [`ConsumerProfile`]
//! record; the core components never special-case a consumer by name, they
//! only read the descriptor.
//!
//! Descriptors are held in a read-only [`ProfileRegistry`]. The built-in set
//! can be extended or overridden by a `consumers.json` file at the store
//! root, so supporting a new agent needs a new record and nothing else.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// File at the store root that adds or overrides consumer descriptors.
pub const CONSUMERS_FILE: &str = "consumers.json";

/// The kinds of component a marketplace plugin can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Skills,
    Commands,
    Agents,
    Hooks,
}

impl ComponentKind {
    /// Every kind, in reporting order.
    pub const ALL: [ComponentKind; 4] = [
        ComponentKind::Skills,
        ComponentKind::Commands,
        ComponentKind::Agents,
        ComponentKind::Hooks,
    ];

    /// Kinds that get a merged namespace.
    pub const MERGED: [ComponentKind; 3] = [
        ComponentKind::Commands,
        ComponentKind::Agents,
        ComponentKind::Skills,
    ];

    /// Directory name used for this kind in stores and marketplaces.
    pub fn dir_name(self) -> &'static str {
        match self {
            ComponentKind::Skills => "skills",
            ComponentKind::Commands => "commands",
            ComponentKind::Agents => "agents",
            ComponentKind::Hooks => "hooks",
        }
    }

    /// Whether `path` is a qualifying item of this kind.
    ///
    /// Skills are directories containing `SKILL.md`; commands and agents are
    /// `.md` files; hooks are `.json` files.
    pub fn is_item(self, path: &Path) -> bool {
        match self {
            ComponentKind::Skills => path.join(SKILL_MANIFEST).is_file(),
            ComponentKind::Commands | ComponentKind::Agents => has_extension(path, "md"),
            ComponentKind::Hooks => has_extension(path, "json"),
        }
    }

    /// Name an item is known by: the directory name for skills, the file stem
    /// for everything else.
    pub fn item_name(self, path: &Path) -> Option<String> {
        let name = match self {
            ComponentKind::Skills => path.file_name(),
            _ => path.file_stem(),
        };
        name.map(|n| n.to_string_lossy().into_owned())
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Manifest file marking a skill directory.
pub const SKILL_MANIFEST: &str = "SKILL.md";

fn has_extension(path: &Path, ext: &str) -> bool {
    path.is_file()
        && path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Static description of one consumer's expected layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerProfile {
    /// Short key used in `config.json` and on the command line.
    pub key: String,
    /// Human readable name.
    pub name: String,
    /// Home directory relative to the user's home (e.g. `.claude`).
    pub home_dir: String,
    /// Executable looked up on `PATH` to detect an installation.
    #[serde(default)]
    pub binary: Option<String>,
    /// Relative subdirectory per supported kind. Absent means unsupported.
    #[serde(default)]
    pub dirs: BTreeMap<ComponentKind, String>,
    /// Where the consumer's native plugin system expects marketplaces.
    #[serde(default)]
    pub plugins_dir: Option<String>,
    /// Where the consumer keeps its own copies of the registry files.
    #[serde(default)]
    pub metadata_dir: Option<String>,
}

impl ConsumerProfile {
    fn builtin(
        key: &str,
        name: &str,
        dirs: &[(ComponentKind, &str)],
        plugins_dir: Option<&str>,
        metadata_dir: Option<&str>,
    ) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            home_dir: format!(".{}", key),
            binary: Some(key.to_string()),
            dirs: dirs
                .iter()
                .map(|(kind, dir)| (*kind, dir.to_string()))
                .collect(),
            plugins_dir: plugins_dir.map(str::to_string),
            metadata_dir: metadata_dir.map(str::to_string),
        }
    }

    /// Absolute home directory of this consumer.
    pub fn home(&self, user_home: &Path) -> PathBuf {
        user_home.join(&self.home_dir)
    }

    /// Whether the consumer understands this kind at all.
    pub fn supports(&self, kind: ComponentKind) -> bool {
        self.dirs.contains_key(&kind)
    }

    /// Whether the consumer has a native plugin system.
    ///
    /// Consumers without one are fed the merged namespace instead of the raw
    /// per-kind directories.
    pub fn supports_plugins(&self) -> bool {
        self.plugins_dir.is_some()
    }

    /// Absolute directory where this consumer expects items of `kind`.
    pub fn kind_dir(&self, user_home: &Path, kind: ComponentKind) -> Option<PathBuf> {
        self.dirs.get(&kind).map(|dir| self.home(user_home).join(dir))
    }

    /// Absolute marketplaces directory, for plugin-capable consumers.
    pub fn marketplaces_dir(&self, user_home: &Path) -> Option<PathBuf> {
        self.plugins_dir
            .as_ref()
            .map(|dir| self.home(user_home).join(dir))
    }

    /// Absolute directory holding the consumer's registry files.
    pub fn metadata_dir(&self, user_home: &Path) -> Option<PathBuf> {
        self.metadata_dir
            .as_ref()
            .map(|dir| self.home(user_home).join(dir))
    }
}

/// Read-only registry of consumer descriptors, keyed by `key`.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, ConsumerProfile>,
}

impl ProfileRegistry {
    /// The consumers known out of the box.
    pub fn builtin() -> Self {
        use ComponentKind::*;

        let profiles = [
            ConsumerProfile::builtin(
                "claude",
                "Claude Code",
                &[
                    (Skills, "skills"),
                    (Commands, "commands"),
                    (Agents, "agents"),
                    (Hooks, "hooks"),
                ],
                Some("plugins/marketplaces"),
                Some("plugins"),
            ),
            ConsumerProfile::builtin(
                "opencode",
                "OpenCode",
                &[(Skills, "skills"), (Commands, "command")],
                None,
                None,
            ),
            ConsumerProfile::builtin("codex", "OpenAI Codex", &[(Skills, "skills")], None, None),
            ConsumerProfile::builtin("gemini", "Gemini CLI", &[(Skills, "skills")], None, None),
        ];

        Self {
            profiles: profiles.into_iter().map(|p| (p.key.clone(), p)).collect(),
        }
    }

    /// Built-in profiles plus any descriptors found in `<store>/consumers.json`.
    ///
    /// A malformed file is reported as a registry error rather than ignored,
    /// since silently dropping a consumer would unlink it on the next sync.
    pub fn load(store_root: &Path) -> Result<Self> {
        let mut registry = Self::builtin();
        let path = store_root.join(CONSUMERS_FILE);
        if !path.is_file() {
            return Ok(registry);
        }

        let content = fs::read_to_string(&path)?;
        let extra: Vec<ConsumerProfile> =
            serde_json::from_str(&content).map_err(|e| Error::Registry {
                path: path.clone(),
                message: e.to_string(),
            })?;
        for profile in extra {
            log::debug!("Loaded consumer descriptor '{}' from {}", profile.key, path.display());
            registry.profiles.insert(profile.key.clone(), profile);
        }
        Ok(registry)
    }

    /// Look up a profile by key.
    pub fn get(&self, key: &str) -> Option<&ConsumerProfile> {
        self.profiles.get(key)
    }

    /// Look up a profile by key, failing with `UnknownConsumer`.
    pub fn require(&self, key: &str) -> Result<&ConsumerProfile> {
        self.get(key).ok_or_else(|| Error::UnknownConsumer {
            key: key.to_string(),
        })
    }

    /// All profiles, ordered by key.
    pub fn iter(&self) -> impl Iterator<Item = &ConsumerProfile> {
        self.profiles.values()
    }

    /// All keys, ordered.
    pub fn keys(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    /// The consumer whose registry files are reconciled with the store.
    pub fn metadata_owner(&self) -> Option<&ConsumerProfile> {
        self.iter().find(|p| p.metadata_dir.is_some())
    }
}
