//! # Agent Plugins Library
//!
//! Core of the `agent-plugins` command-line tool. One canonical store
//! (`~/.agent` by default) holds skills, commands, agents and hooks, plus
//! any cloned plugin marketplaces. This library mirrors that store into the
//! directories each coding agent expects, and keeps a handful of JSON
//! registry files consistent with the one agent that also writes them.
//!
//! ## Quick Example
//!
//! ```
//! use agent_plugins::builder::StructureBuilder;
//! use agent_plugins::defaults::ensure_layout;
//! use agent_plugins::link::LinkPolicy;
//!
//! let store = tempfile::tempdir().unwrap();
//! ensure_layout(store.path()).unwrap();
//!
//! let report = StructureBuilder::new(store.path(), LinkPolicy::platform_default())
//!     .rebuild()
//!     .unwrap();
//! assert_eq!(report.total_user_linked(), 0);
//! assert_eq!(report.total_marketplace_linked(), 0);
//! ```
//!
//! ## Core Concepts
//!
//! - **Link Resolver (`link`)**: makes a target path resolve to a source
//!   path, falling back from symlinks to junctions to copies.
//! - **Marketplace Scanner (`scanner`)**: discovers components inside a
//!   marketplace checkout, from its manifest or from conventional layouts.
//! - **Structure Builder (`builder`)**: flattens user items and marketplace
//!   plugins into one merged directory per kind.
//! - **Metadata Reconciler (`reconcile`)**: promotes shared registry files
//!   to symlinks into the store, merging or reporting conflicts.
//!
//! Around those sit the consumer descriptors (`profile`), consumer linking
//! (`sync`), the registry documents (`registry`) and marketplace management
//! over `git` (`marketplace`, `git`).

pub mod builder;
pub mod defaults;
pub mod error;
pub mod git;
pub mod link;
pub mod marketplace;
pub mod output;
pub mod profile;
pub mod reconcile;
pub mod registry;
pub mod scanner;
pub mod sync;

#[cfg(test)]
mod reconcile_proptest;
