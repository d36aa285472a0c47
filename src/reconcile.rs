//! # Metadata Reconciler
//!
//! Keeps a fixed set of JSON registry files consistent between the
//! canonical store and the private directory of one external tool that reads
//! and writes the same files.
//!
//! Each file is classified into a [`FileState`] and then moved towards the
//! *promoted* state: the external path is a symlink into the canonical store,
//! so both owners see a single copy. Promotion always takes a timestamped
//! backup of whatever was at the external path first. Backups are never
//! removed here.
//!
//! When both sides hold independent content, nothing is touched unless the
//! caller forces a merge. The merge is a shallow key union where the
//! external side wins: a top-level key present on both sides takes the
//! external value wholesale, including nested objects.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::Result;
use crate::link::{is_link, path_present, points_to, LinkStrategy};
use crate::registry::{write_json, INSTALLED_PLUGINS_FILE, KNOWN_MARKETPLACES_FILE};

/// Registry files shared with the external tool.
pub const SHARED_FILES: [&str; 3] = [
    KNOWN_MARKETPLACES_FILE,
    INSTALLED_PLUGINS_FILE,
    "installed_plugins_v2.json",
];

const BACKUP_MARKER: &str = ".backup-";

/// Where one shared file currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    /// The external tool has no file yet.
    NoExternalFile,
    /// Already promoted.
    ExtSymlinkToCanonical,
    /// A symlink that points somewhere other than the canonical file.
    ExtSymlinkElsewhere,
    /// External holds a real file, the canonical store does not.
    ExtRealCanonicalMissing,
    /// Both sides hold independent content.
    ExtRealCanonicalPresent,
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileState::NoExternalFile => "no external file",
            FileState::ExtSymlinkToCanonical => "linked to store",
            FileState::ExtSymlinkElsewhere => "linked elsewhere",
            FileState::ExtRealCanonicalMissing => "external only",
            FileState::ExtRealCanonicalPresent => "both present",
        };
        f.write_str(s)
    }
}

/// What `reconcile` did to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Wrote an empty canonical file; the external side had nothing.
    CreatedCanonical,
    /// Nothing needed doing.
    NoOp,
    /// A foreign symlink was left alone because `force` was off.
    LeftUntouched,
    /// External content was imported into the store and promoted.
    Imported { backup: PathBuf },
    /// Merged both sides into the store and promoted.
    Merged { backup: PathBuf },
    /// A foreign symlink was replaced by the promoted one.
    Relinked { backup: PathBuf },
    /// Both sides differ and no merge was requested, or the merge could
    /// not be performed. Nothing was mutated.
    Conflict { reason: String },
    /// The backup was taken but the symlink could not be created; the
    /// original was restored from the backup.
    PromotionFailed { reason: String },
}

impl ReconcileAction {
    pub fn backup(&self) -> Option<&Path> {
        match self {
            ReconcileAction::Imported { backup }
            | ReconcileAction::Merged { backup }
            | ReconcileAction::Relinked { backup } => Some(backup),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcileAction::Conflict { .. })
    }
}

/// Classification of one shared file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    pub file: String,
    pub state: FileState,
    pub canonical: PathBuf,
    pub external: PathBuf,
}

/// Outcome of reconciling one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub file: String,
    pub state: FileState,
    pub action: ReconcileAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub outcomes: Vec<FileOutcome>,
}

impl ReconcileReport {
    pub fn conflicts(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.action.is_conflict())
    }

    pub fn has_conflicts(&self) -> bool {
        self.conflicts().next().is_some()
    }

    pub fn backups(&self) -> impl Iterator<Item = &Path> {
        self.outcomes.iter().filter_map(|o| o.action.backup())
    }
}

/// Reconciles [`SHARED_FILES`] (or a custom set) between two directories.
#[derive(Debug, Clone)]
pub struct MetadataReconciler {
    canonical_dir: PathBuf,
    external_dir: PathBuf,
    files: Vec<String>,
}

impl MetadataReconciler {
    pub fn new(canonical_dir: impl Into<PathBuf>, external_dir: impl Into<PathBuf>) -> Self {
        Self {
            canonical_dir: canonical_dir.into(),
            external_dir: external_dir.into(),
            files: SHARED_FILES.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn canonical_dir(&self) -> &Path {
        &self.canonical_dir
    }

    pub fn external_dir(&self) -> &Path {
        &self.external_dir
    }

    /// Classify `file` without touching anything.
    pub fn classify(&self, file: &str) -> FileState {
        let canonical = self.canonical_dir.join(file);
        let external = self.external_dir.join(file);

        if !path_present(&external) {
            FileState::NoExternalFile
        } else if is_link(&external) {
            if points_to(&external, &canonical) {
                FileState::ExtSymlinkToCanonical
            } else {
                FileState::ExtSymlinkElsewhere
            }
        } else if canonical.exists() {
            FileState::ExtRealCanonicalPresent
        } else {
            FileState::ExtRealCanonicalMissing
        }
    }

    /// Classify every shared file.
    pub fn status(&self) -> Vec<FileStatus> {
        self.files
            .iter()
            .map(|file| FileStatus {
                file: file.clone(),
                state: self.classify(file),
                canonical: self.canonical_dir.join(file),
                external: self.external_dir.join(file),
            })
            .collect()
    }

    /// Move every shared file towards the promoted state.
    ///
    /// With `force` off, foreign symlinks are left alone and files present
    /// on both sides are reported as conflicts. With `force` on, foreign
    /// symlinks are replaced and both-sides files are merged.
    pub fn reconcile(&self, force: bool) -> Result<ReconcileReport> {
        fs::create_dir_all(&self.canonical_dir)?;

        let mut report = ReconcileReport::default();
        for file in &self.files {
            let state = self.classify(file);
            let action = self.reconcile_file(file, state, force)?;
            debug!("{}: {} -> {:?}", file, state, action);
            report.outcomes.push(FileOutcome {
                file: file.clone(),
                state,
                action,
            });
        }
        Ok(report)
    }

    fn reconcile_file(&self, file: &str, state: FileState, force: bool) -> Result<ReconcileAction> {
        let canonical = self.canonical_dir.join(file);
        let external = self.external_dir.join(file);

        match state {
            FileState::NoExternalFile => {
                if canonical.exists() {
                    Ok(ReconcileAction::NoOp)
                } else {
                    write_json(&canonical, &Map::new())?;
                    Ok(ReconcileAction::CreatedCanonical)
                }
            }
            FileState::ExtSymlinkToCanonical => Ok(ReconcileAction::NoOp),
            FileState::ExtSymlinkElsewhere => {
                if !force {
                    warn!(
                        "{} is linked elsewhere; leaving it (use --force to replace)",
                        external.display()
                    );
                    return Ok(ReconcileAction::LeftUntouched);
                }
                if !canonical.exists() {
                    write_json(&canonical, &Map::new())?;
                }
                promote(&canonical, &external, |backup| ReconcileAction::Relinked { backup })
            }
            FileState::ExtRealCanonicalMissing => {
                fs::copy(&external, &canonical)?;
                info!("Imported {} into the store", file);
                promote(&canonical, &external, |backup| ReconcileAction::Imported { backup })
            }
            FileState::ExtRealCanonicalPresent => {
                if !force {
                    warn!(
                        "{} differs between {} and {}; use --force to merge",
                        file,
                        self.canonical_dir.display(),
                        self.external_dir.display()
                    );
                    return Ok(ReconcileAction::Conflict {
                        reason: "both copies exist; merge not requested".to_string(),
                    });
                }
                let merged = match (read_object(&canonical), read_object(&external)) {
                    (Ok(canonical_map), Ok(external_map)) => {
                        shallow_merge(canonical_map, external_map)
                    }
                    (Err(reason), _) | (_, Err(reason)) => {
                        warn!("Cannot merge {}: {}", file, reason);
                        return Ok(ReconcileAction::Conflict { reason });
                    }
                };
                write_json(&canonical, &merged)?;
                info!("Merged {} into the store", file);
                promote(&canonical, &external, |backup| ReconcileAction::Merged { backup })
            }
        }
    }
}

/// Top-level key union of two JSON objects. On a shared key the `external`
/// value replaces the canonical one entirely; nested objects are not merged.
pub fn shallow_merge(
    canonical: Map<String, JsonValue>,
    external: Map<String, JsonValue>,
) -> Map<String, JsonValue> {
    let mut merged = canonical;
    for (key, value) in external {
        merged.insert(key, value);
    }
    merged
}

/// First free `<file>.backup-<YYYYMMDD-HHMMSS>[-N]` next to `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = format!("{}{}{}", file_name, BACKUP_MARKER, stamp);

    let mut candidate = path.with_file_name(&base);
    let mut counter = 1;
    while path_present(&candidate) {
        candidate = path.with_file_name(format!("{}-{}", base, counter));
        counter += 1;
    }
    candidate
}

/// Backups of `path` that exist on disk, sorted by name.
pub fn list_backups(path: &Path) -> Vec<PathBuf> {
    let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
        return Vec::new();
    };
    let prefix = format!("{}{}", name.to_string_lossy(), BACKUP_MARKER);
    let mut backups: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
            .map(|e| e.path())
            .collect(),
        Err(_) => Vec::new(),
    };
    backups.sort();
    backups
}

fn read_object(path: &Path) -> std::result::Result<Map<String, JsonValue>, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<JsonValue>(&content) {
        Ok(JsonValue::Object(map)) => Ok(map),
        Ok(_) => Err(format!("{} is not a JSON object", path.display())),
        Err(e) => Err(format!("{}: {}", path.display(), e)),
    }
}

/// Back up `external`, then replace it with a symlink to `canonical`.
fn promote(
    canonical: &Path,
    external: &Path,
    done: impl FnOnce(PathBuf) -> ReconcileAction,
) -> Result<ReconcileAction> {
    let backup = backup_path(external);
    fs::rename(external, &backup)?;
    debug!("Backed up {} to {}", external.display(), backup.display());

    match LinkStrategy::Symlink.attempt(canonical, external) {
        Ok(()) => {
            info!("Linked {} -> {}", external.display(), canonical.display());
            Ok(done(backup))
        }
        Err(e) => restore(&backup, external, e),
    }
}

fn restore(backup: &Path, external: &Path, cause: io::Error) -> Result<ReconcileAction> {
    warn!(
        "Could not link {}: {}; restoring the original",
        external.display(),
        cause
    );
    fs::rename(backup, external)?;
    Ok(ReconcileAction::PromotionFailed {
        reason: cause.to_string(),
    })
}
