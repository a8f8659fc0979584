//! Integration tests for the registrar CLI
//!
//! These tests run the actual binary against manifests in a temp dir.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

fn registrar_cmd() -> Command {
    let mut cmd = Command::cargo_bin("registrar").unwrap();
    cmd.env_remove("REGISTRAR_OUTPUT")
        .env_remove("REGISTRAR_NAMESPACE");
    cmd
}

fn write_manifest(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("content.yaml");
    fs::write(&path, content).unwrap();
    path
}

fn generated_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

const MANIFEST: &str = r#"
namespace: demo
blocks:
  - name: stone
    item: true
  - name: barrier
    no_loot_table: true
items:
  - name: ruby
    recipe: ["demo:stone"]
"#;

#[test]
fn test_help_flag() {
    registrar_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("artifact generation"));
}

#[test]
fn test_kinds_lists_builtins_with_sides() {
    registrar_cmd()
        .arg("kinds")
        .assert()
        .success()
        .stdout(predicate::str::contains("blockstate"))
        .stdout(predicate::str::contains("advancement"))
        .stdout(predicate::str::contains("server"));
}

#[test]
fn test_check_prints_levels() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, MANIFEST);

    registrar_cmd()
        .args(["check", manifest.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("Entries: 4"))
        .stdout(predicate::str::contains("Level 1: item_model"));
}

#[test]
fn test_gen_writes_all_artifacts() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, MANIFEST);
    let out = dir.path().join("out");

    registrar_cmd()
        .args(["gen", manifest.to_str().unwrap(), "--out", out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 failed"));

    assert_eq!(
        generated_files(&out),
        vec![
            "assets/demo/blockstates/barrier.json",
            "assets/demo/blockstates/stone.json",
            "assets/demo/lang/en_us.json",
            "assets/demo/models/block/barrier.json",
            "assets/demo/models/block/stone.json",
            "assets/demo/models/item/ruby.json",
            "assets/demo/models/item/stone.json",
            "data/demo/loot_table/blocks/stone.json",
            "data/demo/recipe/ruby.json",
        ]
    );

    let item_model = fs::read_to_string(out.join("assets/demo/models/item/stone.json")).unwrap();
    assert!(item_model.contains("demo:block/stone"));
}

#[test]
fn test_gen_server_only_skips_assets() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, MANIFEST);
    let out = dir.path().join("out");

    registrar_cmd()
        .args([
            "gen",
            manifest.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
            "--server-only",
        ])
        .assert()
        .success();

    assert_eq!(
        generated_files(&out),
        vec![
            "data/demo/loot_table/blocks/stone.json",
            "data/demo/recipe/ruby.json",
        ]
    );
}

#[test]
fn test_gen_writes_shared_tag_once() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(
        &dir,
        r#"
namespace: demo
blocks:
  - name: granite
    tags: [minecraft:mineable/pickaxe]
  - name: basalt
    tags: [minecraft:mineable/pickaxe]
"#,
    );
    let out = dir.path().join("out");

    registrar_cmd()
        .args([
            "gen",
            manifest.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
            "--server-only",
        ])
        .assert()
        .success();

    let tag = fs::read_to_string(out.join("data/minecraft/tags/block/mineable/pickaxe.json")).unwrap();
    let tag: serde_json::Value = serde_json::from_str(&tag).unwrap();
    assert_eq!(tag["values"], serde_json::json!(["demo:basalt", "demo:granite"]));
}

#[test]
fn test_gen_output_from_env() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, MANIFEST);
    let out = dir.path().join("env-out");

    registrar_cmd()
        .env("REGISTRAR_OUTPUT", &out)
        .args(["gen", manifest.to_str().unwrap(), "--client-only"])
        .assert()
        .success();

    assert!(out.join("assets/demo/lang/en_us.json").exists());
}

#[test]
fn test_gen_writes_event_log() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, MANIFEST);
    let events = dir.path().join("events.json");

    registrar_cmd()
        .args([
            "gen",
            manifest.to_str().unwrap(),
            "--out",
            dir.path().join("out").to_str().unwrap(),
            "--events",
            events.to_str().unwrap(),
        ])
        .assert()
        .success();

    let log = fs::read_to_string(events).unwrap();
    assert!(log.contains("\"type\": \"run_started\""));
    assert!(log.contains("\"type\": \"producer_skipped\""));
    assert!(log.contains("\"type\": \"run_completed\""));
}

#[test]
fn test_gen_reports_duplicate_outputs() {
    let dir = TempDir::new().unwrap();
    // Both advancements write the same id
    let manifest = write_manifest(
        &dir,
        r#"
namespace: demo
items:
  - name: ruby
    advancement: { path: story/gem, title: Gem, description: Find a gem }
  - name: sapphire
    advancement: { path: story/gem, title: Gem, description: Find a gem }
"#,
    );

    registrar_cmd()
        .args([
            "gen",
            manifest.to_str().unwrap(),
            "--out",
            dir.path().join("out").to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("REG-030"))
        .stderr(predicate::str::contains("REG-033"));
}

#[test]
fn test_check_rejects_invalid_names() {
    let dir = TempDir::new().unwrap();
    let manifest = write_manifest(&dir, "namespace: demo\nblocks:\n  - name: Bad Stone\n");

    registrar_cmd()
        .args(["check", manifest.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("REG-011"))
        .stderr(predicate::str::contains("Fix:"));
}

#[test]
fn test_check_missing_file() {
    registrar_cmd()
        .args(["check", "does-not-exist.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("REG-040"));
}

#[test]
fn test_demo_manifest_is_valid() {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/demo.yaml");
    registrar_cmd()
        .args(["check", manifest.to_str().unwrap()])
        .assert()
        .success();
}
