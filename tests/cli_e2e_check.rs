//! End-to-end tests for the read-only `check` and `status` commands.

mod common;
use common::prelude::*;

#[test]
fn test_check_detects_agent_by_home_directory() {
    let fixture = TestFixture::new().with_file("home/.codex/config.toml", "");

    fixture
        .command()
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Agent Detection"))
        .stdout(predicate::str::is_match(r"OpenAI Codex\s+no\s+yes\s+skills\s+no").unwrap())
        .stdout(predicate::str::is_match(r"Gemini CLI\s+no\s+no").unwrap())
        .stdout(
            predicate::str::is_match(r"Claude Code\s+no\s+no\s+skills,commands,agents,hooks\s+yes")
                .unwrap(),
        );
}

#[test]
fn test_check_and_status_do_not_create_store() {
    let fixture = TestFixture::new();

    fixture.command().arg("check").assert().success();
    fixture.command().arg("status").assert().success();

    fixture.child("store").assert(predicate::path::missing());
}

#[test]
fn test_status_after_init() {
    let fixture = TestFixture::new()
        .with_marketplace("acme")
        .with_store_skill("notes")
        .with_store_skill("pdf");

    fixture
        .command()
        .args(["init", "--agents", "codex"])
        .assert()
        .success();

    fixture
        .command()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Agent Plugins Status"))
        .stdout(predicate::str::is_match(r"OpenAI Codex\s+yes\s+yes\s+1/1").unwrap())
        .stdout(predicate::str::is_match(r"Gemini CLI\s+no\s+no\s+0/1").unwrap())
        .stdout(predicate::str::contains("Marketplaces: acme"))
        .stdout(predicate::str::contains("Skills: 2"));
}

#[test]
fn test_status_empty_store() {
    TestFixture::new()
        .command()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Marketplaces: none"))
        .stdout(predicate::str::contains("Skills: 0"));
}

#[test]
fn test_color_always_uses_symbols() {
    TestFixture::new()
        .command()
        .args(["check", "--color", "always"])
        .assert()
        .success()
        .stdout(predicate::str::contains("✗"));
}
