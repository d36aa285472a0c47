//! Shared test utilities for integration and E2E tests.
//!
//! Add `mod common;` to a test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_marketplace("acme");
//!     fixture.command().arg("rebuild").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    pub use super::TestFixture;
}

/// A canonical store and a fake user home inside one temporary directory.
///
/// Commands created with [`TestFixture::command`] point `AGENT_PLUGINS_HOME`
/// and `AGENT_PLUGINS_USER_HOME` at these, so nothing touches the real home.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        temp_dir
            .child("home")
            .create_dir_all()
            .expect("Failed to create home directory");
        Self { temp_dir }
    }

    /// Add a marketplace checkout with one root-level command, one nested
    /// plugin with a skill and a manifest describing it.
    pub fn with_marketplace(self, name: &str) -> Self {
        let root = format!("store/plugins/marketplaces/{}", name);
        self.write(&format!("{}/.git/HEAD", root), "ref: refs/heads/main\n");
        self.write(&format!("{}/commands/{}-deploy.md", root, name), "# Deploy\n");
        self.write(
            &format!("{}/plugins/docs/skills/{}-pdf/SKILL.md", root, name),
            "---\nname: pdf\ndescription: Read and write PDF files\n---\n",
        );
        self.write(
            &format!("{}/.claude-plugin/marketplace.json", root),
            &format!(
                r#"{{"name": "{}", "description": "Fixture marketplace", "plugins": [{{"name": "docs", "source": "./plugins/docs"}}]}}"#,
                name
            ),
        );
        self
    }

    /// Add a user skill directly in the store.
    pub fn with_store_skill(self, name: &str) -> Self {
        self.write(
            &format!("store/skills/{}/SKILL.md", name),
            &format!("---\nname: {}\n---\n", name),
        );
        self
    }

    /// Add a file relative to the fixture root.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.write(path, content);
        self
    }

    fn write(&self, path: &str, content: &str) {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn store(&self) -> PathBuf {
        self.path().join("store")
    }

    pub fn home(&self) -> PathBuf {
        self.path().join("home")
    }

    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// A command wired to this fixture's store and home, with plain output.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("agent-plugins");
        cmd.current_dir(self.path())
            .env("AGENT_PLUGINS_HOME", self.store())
            .env("AGENT_PLUGINS_USER_HOME", self.home())
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env("PATH", "");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
