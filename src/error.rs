//! # Error Handling
//!
//! This module defines the centralized error type for the `agent-plugins`
//! library. It uses `thiserror` to describe every failure that is allowed to
//! escape a core operation.
//!
//! Most contention in this tool is *not* an error: an existing link target, a
//! missing source, an unmerged metadata file or a malformed marketplace
//! manifest are all reported as values inside the various report structs
//! (`LinkTarget`, `BuildReport`, `ReconcileReport`, ...). The variants below
//! are reserved for failures a caller cannot continue past:
//!
//! - Exhaustion of the link ladder (every strategy failed).
//! - Version-control subprocess failures (surfaced per marketplace).
//! - Registry and configuration persistence problems.
//! - Invalid user input such as an unparsable marketplace source.
//! - Wrapped I/O, JSON and URL errors.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for agent-plugins operations
#[derive(Error, Debug)]
pub enum Error {
    /// Every strategy of the link ladder failed for this pair.
    ///
    /// This only happens when the target location is unwritable for symlinks,
    /// junctions and plain copies alike.
    #[error("Unable to link {} -> {}: {message}", target.display(), source_path.display())]
    LinkExhausted {
        source_path: PathBuf,
        target: PathBuf,
        message: String,
    },

    /// A `git` subprocess exited unsuccessfully or could not be spawned.
    #[error("Git command failed for {target}: {command} - {stderr}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Subprocess {
        command: String,
        target: String,
        stderr: String,
        /// Optional hint for how to resolve the failure
        hint: Option<String>,
    },

    /// A marketplace source string could not be understood.
    #[error("Invalid marketplace source '{source_spec}': {message}")]
    InvalidSource {
        source_spec: String,
        message: String,
    },

    /// A marketplace with this name is already installed.
    #[error("Marketplace '{name}' already exists{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    MarketplaceExists { name: String, hint: Option<String> },

    /// No marketplace with this name is installed.
    #[error("Marketplace '{name}' not found")]
    MarketplaceNotFound { name: String },

    /// A registry file could not be read or written.
    #[error("Registry error in {}: {message}", path.display())]
    Registry { path: PathBuf, message: String },

    /// A consumer key that no descriptor matches.
    #[error("Unknown agent: {key}")]
    UnknownConsumer { key: String },

    /// A local skill directory is missing its `SKILL.md`.
    #[error("No SKILL.md found in {}", path.display())]
    InvalidSkill { path: PathBuf },

    /// An item already occupies the destination in the canonical store.
    #[error("'{name}' already exists in {}", path.display())]
    AlreadyExists { name: String, path: PathBuf },

    /// The requested item does not exist in the canonical store.
    #[error("'{name}' not found in {}", path.display())]
    NotFound { name: String, path: PathBuf },

    /// Neither the home directory nor an override could be determined.
    #[error("Unable to determine home directory: {message}")]
    HomeDirectory { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A URL parsing error, wrapped from `url::ParseError`.
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
