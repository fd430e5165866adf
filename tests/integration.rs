use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ptree_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("ptree");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/pagetree.sqlite"

[retrieval]
default_top_k = 3

[server]
bind = "127.0.0.1:8001"
"#,
        root.display()
    );

    let config_path = config_dir.join("pagetree.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_ptree(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = ptree_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        // Keep the Notion secret out of reach so ingest fails fast.
        .env_remove("NOTION_SECRET")
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ptree binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_ptree(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/pagetree.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_ptree(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_ptree(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_seed_then_search() {
    let (_tmp, config_path) = setup_test_env();

    run_ptree(&config_path, &["init"]);
    let (stdout, stderr, success) = run_ptree(&config_path, &["seed"]);
    assert!(success, "seed failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents: 120"));

    let (stdout, stderr, success) = run_ptree(&config_path, &["search", "docker containers"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("1. ["));
    assert!(stdout.contains("Technology & Programming"));
    assert!(stdout.contains("id: doc_003"));
    // default_top_k = 3
    assert!(!stdout.contains("4. ["));
}

#[test]
fn test_seed_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    run_ptree(&config_path, &["seed"]);
    run_ptree(&config_path, &["seed"]);
    let (stdout, _, success) = run_ptree(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Chunks:      120"), "stats: {}", stdout);
}

#[test]
fn test_search_top_k_flag() {
    let (_tmp, config_path) = setup_test_env();

    run_ptree(&config_path, &["seed"]);
    let (stdout, _, success) = run_ptree(&config_path, &["search", "the", "--top-k", "1"]);
    assert!(success);
    assert!(stdout.contains("1. ["));
    assert!(!stdout.contains("2. ["));
}

#[test]
fn test_search_top_k_out_of_range_errors() {
    let (_tmp, config_path) = setup_test_env();

    run_ptree(&config_path, &["seed"]);
    let (_, stderr, success) = run_ptree(&config_path, &["search", "python", "--top-k", "1000"]);
    assert!(!success);
    assert!(stderr.contains("top_k"));
}

#[test]
fn test_search_empty_query() {
    let (_tmp, config_path) = setup_test_env();

    run_ptree(&config_path, &["init"]);
    let (stdout, _, success) = run_ptree(&config_path, &["search", "   "]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_search_no_results() {
    let (_tmp, config_path) = setup_test_env();

    run_ptree(&config_path, &["seed"]);
    let (stdout, _, success) = run_ptree(&config_path, &["search", "xyzzyplugh"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_clear() {
    let (_tmp, config_path) = setup_test_env();

    run_ptree(&config_path, &["seed"]);
    let (stdout, _, success) = run_ptree(&config_path, &["clear"]);
    assert!(success);
    assert!(stdout.contains("deleted chunks: 120"));

    let (stdout, _, _) = run_ptree(&config_path, &["search", "python"]);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_stats_by_node() {
    let (_tmp, config_path) = setup_test_env();

    run_ptree(&config_path, &["seed"]);
    let (stdout, _, success) = run_ptree(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("By node:"));
    assert!(stdout.contains("seed"));
    assert!(stdout.contains("Embedded:    0 / 120"));
}

#[test]
fn test_ingest_without_secret_errors() {
    let (_tmp, config_path) = setup_test_env();

    run_ptree(&config_path, &["init"]);
    let (_, stderr, success) = run_ptree(&config_path, &["ingest", "some-page-id"]);
    assert!(!success);
    assert!(stderr.contains("NOTION_SECRET"), "stderr: {}", stderr);
}

#[test]
fn test_embed_pending_errors_when_disabled() {
    let (_tmp, config_path) = setup_test_env();

    run_ptree(&config_path, &["init"]);
    let (_, stderr, success) = run_ptree(&config_path, &["embed", "pending"]);
    assert!(!success);
    assert!(stderr.contains("disabled"));
}

#[test]
fn test_embed_rebuild_errors_when_disabled() {
    let (_tmp, config_path) = setup_test_env();

    run_ptree(&config_path, &["init"]);
    let (_, stderr, success) = run_ptree(&config_path, &["embed", "rebuild"]);
    assert!(!success);
    assert!(stderr.contains("disabled"));
}

#[test]
fn test_missing_config_errors() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");
    let (_, stderr, success) = run_ptree(&missing, &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_errors() {
    let (_tmp, config_path) = setup_test_env();
    fs::write(
        &config_path,
        "[db]\npath = \"x.sqlite\"\n[retrieval]\nhybrid_alpha = 3.0\n",
    )
    .unwrap();
    let (_, stderr, success) = run_ptree(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("hybrid_alpha"));
}
