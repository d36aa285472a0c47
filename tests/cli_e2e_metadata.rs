//! End-to-end tests for `metadata status` and `metadata reconcile`.

mod common;
use common::prelude::*;

const EXTERNAL: &str = "home/.claude/plugins/installed_plugins.json";
const CANONICAL: &str = "store/installed_plugins.json";

fn conflicting() -> TestFixture {
    TestFixture::new()
        .with_file(EXTERNAL, r#"{"shared": "external", "ext-only": 1}"#)
        .with_file(CANONICAL, r#"{"shared": "store", "store-only": 2}"#)
}

#[test]
fn test_status_reports_each_file_without_changes() {
    let fixture = conflicting();

    fixture
        .command()
        .args(["metadata", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("installed_plugins.json"))
        .stdout(predicate::str::contains("both present"))
        .stdout(predicate::str::contains("no external file"));

    fixture
        .child("store/known_marketplaces.json")
        .assert(predicate::path::missing());
}

#[test]
fn test_reconcile_without_force_leaves_conflict() {
    let fixture = conflicting();

    fixture
        .command()
        .args(["metadata", "reconcile"])
        .assert()
        .success()
        .stdout(predicate::str::contains("installed_plugins.json conflict"))
        .stdout(predicate::str::contains("Re-run with --force"));

    fixture
        .child(EXTERNAL)
        .assert(r#"{"shared": "external", "ext-only": 1}"#);
    fixture
        .child(CANONICAL)
        .assert(r#"{"shared": "store", "store-only": 2}"#);
}

#[test]
#[cfg(unix)]
fn test_reconcile_force_merges_and_links() {
    let fixture = conflicting();

    fixture
        .command()
        .args(["metadata", "reconcile", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("installed_plugins.json merged (backup:"));

    let canonical = fixture.child(CANONICAL);
    canonical.assert(predicate::str::contains(r#""shared": "external""#));
    canonical.assert(predicate::str::contains("ext-only"));
    canonical.assert(predicate::str::contains("store-only"));

    let external = fixture.home().join(".claude/plugins/installed_plugins.json");
    assert_eq!(
        std::fs::read_link(&external).unwrap(),
        fixture.store().join("installed_plugins.json")
    );

    let backups: Vec<_> = std::fs::read_dir(fixture.home().join(".claude/plugins"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_string_lossy()
                .starts_with("installed_plugins.json.backup-")
        })
        .collect();
    assert_eq!(backups.len(), 1);

    fixture
        .command()
        .args(["metadata", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("linked to store"));
}
