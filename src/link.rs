//! # Link Resolver
//!
//! Makes a target path resolve to a source path's content. The resolver
//! walks a [`LinkPolicy`]: an ordered ladder of [`LinkStrategy`] values that
//! are tried one after another until one succeeds.
//!
//! ## Ladder
//!
//! 1. Target already resolves to source: nothing to do (`AlreadyLinked`).
//! 2. Target exists and `force` is off: leave it alone (`Conflict`).
//! 3. Target exists and `force` is on: remove it the way its type requires.
//! 4. Native symbolic link (`Linked`).
//! 5. Directory junction, on platforms that have one (`Junction`).
//! 6. Recursive copy (`Copied`). Later changes to the source will not
//!    propagate, so callers surface copied results to the user.
//!
//! Expected contention (missing privilege, an occupied target, a missing
//! source) is always reported through [`LinkTarget`]. Only exhaustion of the
//! whole ladder is returned as an [`Error::LinkExhausted`].

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// How a link was (or was not) realized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    Linked,
    Junction,
    Copied,
    Skipped,
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkMode::Linked => "linked",
            LinkMode::Junction => "junction",
            LinkMode::Copied => "copied",
            LinkMode::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Why the resolver ended where it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// A new link, junction or copy was created.
    Created,
    /// The target already resolved to the source.
    AlreadyLinked,
    /// The target exists and `force` was not given.
    Conflict,
    /// The source does not exist; nothing was touched.
    SourceMissing,
}

/// Outcome of one `establish_link` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub source: PathBuf,
    pub target: PathBuf,
    pub mode: LinkMode,
    pub status: LinkStatus,
}

impl LinkTarget {
    fn new(source: &Path, target: &Path, mode: LinkMode, status: LinkStatus) -> Self {
        Self {
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            mode,
            status,
        }
    }

    /// True when the target now resolves to the source.
    pub fn is_ok(&self) -> bool {
        matches!(self.status, LinkStatus::Created | LinkStatus::AlreadyLinked)
    }

    /// True when the target is a copy and will not follow later source edits.
    pub fn is_degraded(&self) -> bool {
        self.mode == LinkMode::Copied
    }
}

/// How content is mirrored into consumer directories (`config.json`
/// `sync_mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Link, falling back to junctions and finally copies.
    #[default]
    Symlink,
    /// Always copy. Kept for stores set up before linking was available.
    Copy,
}

/// One rung of the link ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStrategy {
    Symlink,
    Junction,
    Copy,
}

impl LinkStrategy {
    /// Mode reported when this strategy succeeds.
    pub fn mode(self) -> LinkMode {
        match self {
            LinkStrategy::Symlink => LinkMode::Linked,
            LinkStrategy::Junction => LinkMode::Junction,
            LinkStrategy::Copy => LinkMode::Copied,
        }
    }

    /// Try to make `target` resolve to `source`. `target` must not exist.
    pub fn attempt(self, source: &Path, target: &Path) -> io::Result<()> {
        match self {
            LinkStrategy::Symlink => create_symlink(source, target),
            LinkStrategy::Junction => create_junction(source, target),
            LinkStrategy::Copy => copy_tree(source, target),
        }
    }
}

/// Ordered list of strategies the resolver walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPolicy {
    strategies: Vec<LinkStrategy>,
}

impl LinkPolicy {
    /// Policy with an explicit ladder.
    pub fn new(strategies: Vec<LinkStrategy>) -> Self {
        Self { strategies }
    }

    /// The full ladder: symlink, junction, copy.
    pub fn platform_default() -> Self {
        Self::new(vec![
            LinkStrategy::Symlink,
            LinkStrategy::Junction,
            LinkStrategy::Copy,
        ])
    }

    /// Policy selected by the configured sync mode.
    pub fn for_sync_mode(mode: SyncMode) -> Self {
        match mode {
            SyncMode::Symlink => Self::platform_default(),
            SyncMode::Copy => Self::new(vec![LinkStrategy::Copy]),
        }
    }

    pub fn strategies(&self) -> &[LinkStrategy] {
        &self.strategies
    }

    /// Make `target` resolve to `source`, walking the ladder.
    pub fn establish_link(&self, source: &Path, target: &Path, force: bool) -> Result<LinkTarget> {
        if !source.exists() {
            debug!("Source {} missing, skipping", source.display());
            return Ok(LinkTarget::new(
                source,
                target,
                LinkMode::Skipped,
                LinkStatus::SourceMissing,
            ));
        }

        if let Some(mode) = existing_link_mode(source, target) {
            return Ok(LinkTarget::new(source, target, mode, LinkStatus::AlreadyLinked));
        }

        if path_present(target) {
            if !force {
                warn!("{} already exists, skipping", target.display());
                return Ok(LinkTarget::new(
                    source,
                    target,
                    LinkMode::Skipped,
                    LinkStatus::Conflict,
                ));
            }
            remove_existing(target)?;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut failures = Vec::new();
        for strategy in &self.strategies {
            match strategy.attempt(source, target) {
                Ok(()) => {
                    let mode = strategy.mode();
                    if mode == LinkMode::Copied {
                        warn!(
                            "Copied {} to {}; later changes to the source will not propagate",
                            source.display(),
                            target.display()
                        );
                    } else {
                        debug!("{} {} -> {}", mode, target.display(), source.display());
                    }
                    return Ok(LinkTarget::new(source, target, mode, LinkStatus::Created));
                }
                Err(e) => {
                    debug!("{:?} failed for {}: {}", strategy, target.display(), e);
                    failures.push(format!("{:?}: {}", strategy, e));
                    // A half-written copy must not block the next rung.
                    if path_present(target) {
                        let _ = remove_existing(target);
                    }
                }
            }
        }

        Err(Error::LinkExhausted {
            source_path: source.to_path_buf(),
            target: target.to_path_buf(),
            message: failures.join("; "),
        })
    }
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Convenience wrapper using the platform default policy.
pub fn establish_link(source: &Path, target: &Path, force: bool) -> Result<LinkTarget> {
    LinkPolicy::platform_default().establish_link(source, target, force)
}

/// True if anything (including a dangling link) occupies `path`.
pub fn path_present(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// True if `path` is a symlink or junction.
pub fn is_link(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// True if `target` is a link whose destination is `source`.
pub fn points_to(target: &Path, source: &Path) -> bool {
    if !is_link(target) {
        return false;
    }
    match (fs::canonicalize(target), fs::canonicalize(source)) {
        (Ok(a), Ok(b)) => a == b,
        _ => match fs::read_link(target) {
            Ok(dest) => dest == source,
            Err(_) => false,
        },
    }
}

fn existing_link_mode(source: &Path, target: &Path) -> Option<LinkMode> {
    if !points_to(target, source) {
        return None;
    }
    if cfg!(windows) && target.is_dir() && fs::read_link(target).is_err() {
        Some(LinkMode::Junction)
    } else {
        Some(LinkMode::Linked)
    }
}

/// Remove whatever occupies `path`: links are unlinked, directories removed
/// recursively, files deleted.
pub fn remove_existing(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.file_type().is_symlink() {
        // Directory symlinks and junctions on Windows need remove_dir.
        fs::remove_file(path).or_else(|_| fs::remove_dir(path))
    } else if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(unix)]
fn create_symlink(source: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn create_symlink(source: &Path, target: &Path) -> io::Result<()> {
    if source.is_dir() {
        std::os::windows::fs::symlink_dir(source, target)
    } else {
        std::os::windows::fs::symlink_file(source, target)
    }
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_source: &Path, _target: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

#[cfg(windows)]
fn create_junction(source: &Path, target: &Path) -> io::Result<()> {
    use std::process::Command;

    if !source.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "junctions only alias directories",
        ));
    }
    let output = Command::new("cmd")
        .arg("/C")
        .arg("mklink")
        .arg("/J")
        .arg(target)
        .arg(source)
        .output()?;
    if output.status.success() {
        Ok(())
    } else {
        Err(io::Error::other(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

#[cfg(not(windows))]
fn create_junction(_source: &Path, _target: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "junctions are only available on Windows",
    ))
}

/// Copy a file, or a directory tree, from `source` to `target`.
pub fn copy_tree(source: &Path, target: &Path) -> io::Result<()> {
    if source.is_file() {
        fs::copy(source, target)?;
        return Ok(());
    }

    fs::create_dir_all(target)?;
    for entry in WalkDir::new(source).follow_links(true).min_depth(1) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        if relative.components().any(|c| c.as_os_str() == ".git") {
            continue;
        }
        let dest = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}
