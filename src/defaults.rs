//! Default locations and names used across commands.
//!
//! This module centralizes the canonical store layout so the CLI, the
//! Structure Builder and the Registry Store agree on where things live.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::profile::ComponentKind;

/// Environment variable overriding the canonical store root.
pub const HOME_ENV: &str = "AGENT_PLUGINS_HOME";

/// Environment variable overriding the user home used to locate consumers.
pub const USER_HOME_ENV: &str = "AGENT_PLUGINS_USER_HOME";

/// Name of the canonical store directory under the user's home.
pub const STORE_DIR_NAME: &str = ".agent";

/// Subdirectory of the store holding cloned marketplaces.
pub const MARKETPLACES_DIR: &str = "plugins/marketplaces";

/// Subdirectory of the store holding the merged namespace.
pub const MERGED_DIR: &str = "merged";

/// Subfolder of each merged kind directory that holds marketplace links.
pub const MARKETPLACE_SUBDIR: &str = "marketplace";

/// Returns the user's home directory.
///
/// `AGENT_PLUGINS_USER_HOME` takes precedence over the platform home so that
/// consumer directories can be redirected (tests rely on this).
pub fn user_home() -> Result<PathBuf> {
    if let Some(home) = env::var_os(USER_HOME_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir().ok_or_else(|| Error::HomeDirectory {
        message: format!("set {} or HOME", USER_HOME_ENV),
    })
}

/// Returns the default canonical store root (`~/.agent`).
///
/// The `--home` flag and the `AGENT_PLUGINS_HOME` environment variable are
/// resolved by the CLI before this fallback is consulted.
pub fn default_store_root() -> Result<PathBuf> {
    Ok(user_home()?.join(STORE_DIR_NAME))
}

/// Directory holding cloned marketplaces inside a store.
pub fn marketplaces_dir(store_root: &Path) -> PathBuf {
    store_root.join(MARKETPLACES_DIR)
}

/// Root of the merged namespace inside a store.
pub fn merged_dir(store_root: &Path) -> PathBuf {
    store_root.join(MERGED_DIR)
}

/// Create every directory of the store layout. Returns the ones that did
/// not exist before.
pub fn ensure_layout(store_root: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = ComponentKind::ALL
        .iter()
        .map(|kind| store_root.join(kind.dir_name()))
        .collect();
    dirs.push(marketplaces_dir(store_root));
    dirs.extend(
        ComponentKind::MERGED
            .iter()
            .map(|kind| merged_dir(store_root).join(kind.dir_name())),
    );

    let mut created = Vec::new();
    for dir in dirs {
        if !dir.is_dir() {
            fs::create_dir_all(&dir)?;
            created.push(dir);
        }
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_user_home_honours_override() {
        let previous = env::var_os(USER_HOME_ENV);
        env::set_var(USER_HOME_ENV, "/tmp/agent-plugins-home");
        let home = user_home().unwrap();
        match previous {
            Some(value) => env::set_var(USER_HOME_ENV, value),
            None => env::remove_var(USER_HOME_ENV),
        }
        assert_eq!(home, PathBuf::from("/tmp/agent-plugins-home"));
    }

    #[test]
    #[serial]
    fn test_default_store_root_ends_with_store_dir() {
        let root = default_store_root().unwrap();
        assert!(root.ends_with(STORE_DIR_NAME));
    }

    #[test]
    fn test_layout_helpers() {
        let root = Path::new("/store");
        assert_eq!(
            marketplaces_dir(root),
            PathBuf::from("/store/plugins/marketplaces")
        );
        assert_eq!(merged_dir(root), PathBuf::from("/store/merged"));
    }

    #[test]
    fn test_ensure_layout_is_idempotent() {
        let temp = tempfile::TempDir::new().unwrap();
        let created = ensure_layout(temp.path()).unwrap();
        assert_eq!(created.len(), 8);
        assert!(temp.path().join("hooks").is_dir());
        assert!(temp.path().join("merged/skills").is_dir());
        assert!(ensure_layout(temp.path()).unwrap().is_empty());
    }
}
