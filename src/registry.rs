//! # Registry Store
//!
//! Persists the JSON documents at the root of the canonical store:
//!
//! - `config.json`: enabled consumers, marketplaces and the sync mode.
//! - `known_marketplaces.json`: one [`MarketplaceRecord`] per marketplace,
//!   keyed by its unique name.
//! - `installed_plugins.json`: one [`InstalledPlugin`] per plugin.
//!
//! The marketplace and plugin files are shared with an external tool (see
//! [`crate::reconcile`]), so unknown fields are carried through untouched.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::link::SyncMode;

pub const CONFIG_FILE: &str = "config.json";
pub const KNOWN_MARKETPLACES_FILE: &str = "known_marketplaces.json";
pub const INSTALLED_PLUGINS_FILE: &str = "installed_plugins.json";

/// Consumers enabled when nothing has been configured yet.
pub const DEFAULT_AGENTS: [&str; 4] = ["claude", "opencode", "codex", "gemini"];

/// Contents of `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub enabled_agents: Vec<String>,
    #[serde(default)]
    pub marketplaces: Vec<String>,
    #[serde(default)]
    pub sync_mode: SyncMode,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled_agents: DEFAULT_AGENTS.iter().map(|s| s.to_string()).collect(),
            marketplaces: Vec::new(),
            sync_mode: SyncMode::Symlink,
        }
    }
}

/// Where a marketplace was cloned from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketplaceSource {
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Github,
    Git,
}

/// Entry of `known_marketplaces.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceRecord {
    pub source: MarketplaceSource,
    pub install_location: String,
    pub last_updated: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

impl MarketplaceRecord {
    pub fn new(source: MarketplaceSource, install_location: &Path) -> Self {
        Self {
            source,
            install_location: install_location.to_string_lossy().into_owned(),
            last_updated: timestamp(),
            extra: BTreeMap::new(),
        }
    }

    /// Refresh `lastUpdated` to now.
    pub fn touch(&mut self) {
        self.last_updated = timestamp();
    }
}

/// Entry of `installed_plugins*.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledPlugin {
    pub marketplace: String,
    pub source: String,
    pub version: String,
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,
}

pub type KnownMarketplaces = BTreeMap<String, MarketplaceRecord>;
pub type InstalledPlugins = BTreeMap<String, InstalledPlugin>;

/// Current time as an ISO-8601 string.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Reads and writes the registry documents of one canonical store.
#[derive(Debug, Clone)]
pub struct RegistryStore {
    root: PathBuf,
}

impl RegistryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    /// Load `config.json`, falling back to defaults when it does not exist.
    pub fn load_config(&self) -> Result<AgentConfig> {
        Ok(self.read(CONFIG_FILE)?.unwrap_or_default())
    }

    pub fn save_config(&self, config: &AgentConfig) -> Result<()> {
        self.write(CONFIG_FILE, config)
    }

    pub fn load_known_marketplaces(&self) -> Result<KnownMarketplaces> {
        Ok(self.read(KNOWN_MARKETPLACES_FILE)?.unwrap_or_default())
    }

    pub fn save_known_marketplaces(&self, known: &KnownMarketplaces) -> Result<()> {
        self.write(KNOWN_MARKETPLACES_FILE, known)
    }

    pub fn load_installed_plugins(&self) -> Result<InstalledPlugins> {
        Ok(self.read(INSTALLED_PLUGINS_FILE)?.unwrap_or_default())
    }

    pub fn save_installed_plugins(&self, plugins: &InstalledPlugins) -> Result<()> {
        self.write(INSTALLED_PLUGINS_FILE, plugins)
    }

    /// Record a newly added marketplace. Names are unique.
    pub fn add_marketplace(&self, name: &str, record: MarketplaceRecord) -> Result<()> {
        let mut known = self.load_known_marketplaces()?;
        if known.contains_key(name) {
            return Err(Error::MarketplaceExists {
                name: name.to_string(),
                hint: Some("Use 'marketplace update' to refresh it".to_string()),
            });
        }
        known.insert(name.to_string(), record);
        self.save_known_marketplaces(&known)?;

        let mut config = self.load_config()?;
        if !config.marketplaces.iter().any(|m| m == name) {
            config.marketplaces.push(name.to_string());
            self.save_config(&config)?;
        }
        Ok(())
    }

    /// Forget a marketplace. Returns whether a record existed.
    pub fn remove_marketplace(&self, name: &str) -> Result<bool> {
        let mut known = self.load_known_marketplaces()?;
        let existed = known.remove(name).is_some();
        if existed {
            self.save_known_marketplaces(&known)?;
        }

        let mut config = self.load_config()?;
        let before = config.marketplaces.len();
        config.marketplaces.retain(|m| m != name);
        if config.marketplaces.len() != before {
            self.save_config(&config)?;
        }
        Ok(existed)
    }

    /// Refresh the `lastUpdated` timestamp of a marketplace, if recorded.
    pub fn touch_marketplace(&self, name: &str) -> Result<()> {
        let mut known = self.load_known_marketplaces()?;
        if let Some(record) = known.get_mut(name) {
            record.touch();
            self.save_known_marketplaces(&known)?;
        }
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>> {
        let path = self.path(file);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::Registry {
                path,
                message: e.to_string(),
            })
    }

    fn write<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        write_json(&self.path(file), value)
    }
}

/// Write `value` as pretty-printed JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    fs::write(path, content).map_err(|e| Error::Registry {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
