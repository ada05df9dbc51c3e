use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

const MANUSCRIPT: &str = "# Harbor\n\
\"Hold the rope,\" Mara said. Ilya held it.\n\
***\n\
At dawn they reached the harbor in Lisbon.\n\
# Inland\n\
The road climbed for hours.\n";

fn write_manuscript(contents: &str) -> (TempDir, std::path::PathBuf) {
    let temp = TempDir::new().expect("tempdir");
    let path = temp.path().join("book.md");
    fs::write(&path, contents).expect("write manuscript");
    (temp, path)
}

#[allow(deprecated)]
fn chunkcache() -> Command {
    let mut cmd = Command::cargo_bin("chunkcache").expect("binary");
    cmd.arg("--quiet");
    cmd
}

#[test]
fn analyze_prints_stats_and_summaries() {
    let (_temp, path) = write_manuscript(MANUSCRIPT);
    let output = chunkcache()
        .arg("analyze")
        .arg(&path)
        .output()
        .expect("run analyze");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(body["stats"]["chapter_count"], 2);
    assert_eq!(body["stats"]["by_level"]["scene"], 3);
    assert_eq!(body["stats"]["dirty_count"], 0);
    assert_eq!(body["report"]["processed"], 3);
    assert_eq!(body["chapters"]["ch1"]["title"], "Harbor");
    assert_eq!(body["chapters"]["ch1"]["scenes"], 2);
    assert_eq!(body["chapters"]["ch2"]["scenes"], 1);

    let words = body["book"]["word_count"].as_u64().expect("word count");
    let summary = body["book"]["summary"].as_str().expect("summary");
    assert!(summary.contains(&format!("{words} words")), "{summary}");
}

#[test]
fn cursor_reports_scene_under_offset() {
    let (_temp, path) = write_manuscript(MANUSCRIPT);
    let chapter_body = "\"Hold the rope,\" Mara said. Ilya held it.\n***\nAt dawn";
    let offset = chapter_body.len() - 2;

    let output = chunkcache()
        .args(["cursor", "--chapter", "ch1", "--offset"])
        .arg(offset.to_string())
        .arg(&path)
        .output()
        .expect("run cursor");
    assert!(output.status.success());

    let body: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(body["chunk_id"], "scene:ch1:1");
    assert_eq!(body["state"], "fresh");
    assert_eq!(body["stale"], false);
    assert!(body["analysis"]["time_markers"]
        .as_array()
        .expect("time markers")
        .iter()
        .any(|m| m == "dawn"));
}

#[test]
fn cursor_past_the_text_fails() {
    let (_temp, path) = write_manuscript(MANUSCRIPT);
    chunkcache()
        .args(["cursor", "--chapter", "ch2", "--offset", "10000"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No scene at offset 10000 in ch2"));
}

#[test]
fn unknown_chapter_fails() {
    let (_temp, path) = write_manuscript(MANUSCRIPT);
    chunkcache()
        .args(["cursor", "--chapter", "ch9", "--offset", "0"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown chapter ch9"));
}

#[test]
fn invalid_config_file_is_reported() {
    let (temp, path) = write_manuscript(MANUSCRIPT);
    let config = temp.path().join("chunkcache.toml");
    fs::write(&config, "edit_debounce_ms = 0\n").unwrap();

    chunkcache()
        .arg("--config")
        .arg(&config)
        .arg("analyze")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("edit_debounce_ms must be > 0"));
}

#[test]
fn missing_manuscript_is_reported() {
    chunkcache()
        .args(["analyze", "/definitely/not/here.md"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read manuscript"));
}
