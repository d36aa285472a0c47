//! End-to-end tests for the `list` command.

mod common;
use common::prelude::*;

#[test]
fn test_list_without_marketplaces() {
    TestFixture::new()
        .command()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No marketplaces installed"));
}

#[test]
fn test_list_shows_plugins_kinds_and_skill_descriptions() {
    TestFixture::new()
        .with_marketplace("acme")
        .command()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("acme - Fixture marketplace"))
        .stdout(predicate::str::contains("docs"))
        .stdout(predicate::str::contains("skills (1)"))
        .stdout(predicate::str::contains("acme-pdf: Read and write PDF files"))
        .stdout(predicate::str::contains("commands (1)"))
        .stdout(predicate::str::contains("acme-deploy"));
}

#[test]
fn test_list_filters_by_marketplace() {
    TestFixture::new()
        .with_marketplace("acme")
        .with_marketplace("tools")
        .command()
        .args(["list", "--marketplace", "tools"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tools - Fixture marketplace"))
        .stdout(predicate::str::contains("acme").not());
}

#[test]
fn test_list_unknown_marketplace_fails() {
    TestFixture::new()
        .with_marketplace("acme")
        .command()
        .args(["list", "--marketplace", "ghost"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Marketplace 'ghost' not found"));
}
