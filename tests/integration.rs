use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn qa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("qa-harness");
    path
}

fn setup_test_env(timeout_minutes: u64) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // Create test files
    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("rules.md"),
        "# Checkout\n\nDiscount codes must reduce total by the coded percentage.\n\nCodes expire after 30 days.",
    )
    .unwrap();
    fs::write(
        files_dir.join("faq.txt"),
        "Shipping is free for orders over fifty dollars.\n\nReturns are accepted within thirty days.",
    )
    .unwrap();
    fs::write(
        files_dir.join("checkout.html"),
        r#"<html><body><label for="discount-input">Discount code</label><input id="discount-input" name="code"><script>track()</script></body></html>"#,
    )
    .unwrap();
    fs::write(files_dir.join("setup.exe"), [0x4du8, 0x5a, 0, 0]).unwrap();

    let config_content = format!(
        r#"[storage]
upload_dir = "{root}/data/uploads"
vector_db_path = "{root}/data/vector_store"

[session]
timeout_minutes = {timeout}

[embedding]
provider = "hash"

[[llm.providers]]
name = "none"
base_url = "http://127.0.0.1:9/v1"
model = "unused"
api_key_env = "QA_HARNESS_TEST_UNSET_KEY"
"#,
        root = root.display(),
        timeout = timeout_minutes
    );

    let config_path = config_dir.join("qa.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_qa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = qa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("QA_HARNESS_TEST_UNSET_KEY")
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run qa-harness binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn file_arg(tmp: &TempDir, name: &str) -> String {
    tmp.path().join("files").join(name).display().to_string()
}

#[test]
fn test_session_new_prints_id() {
    let (_tmp, config) = setup_test_env(60);
    let (stdout, stderr, success) = run_qa(&config, &["session", "new"]);
    assert!(success, "session new failed: {}", stderr);
    let id = stdout.trim();
    assert_eq!(id.len(), 36, "unexpected id: {:?}", id);

    let (stdout2, _, _) = run_qa(&config, &["session", "new"]);
    assert_ne!(stdout2.trim(), id);
}

#[test]
fn test_ingest_copies_uploads_and_counts_chunks() {
    let (tmp, config) = setup_test_env(60);
    let (stdout, stderr, success) = run_qa(
        &config,
        &[
            "ingest",
            "--session",
            "s1",
            &file_arg(&tmp, "rules.md"),
            &file_arg(&tmp, "faq.txt"),
            &file_arg(&tmp, "checkout.html"),
        ],
    );
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("Knowledge Base Built."));
    assert!(stdout.contains("3 chunks in session_s1"), "stdout: {}", stdout);

    let uploads = tmp.path().join("data").join("uploads").join("s1");
    assert!(uploads.join("rules.md").is_file());
    assert!(uploads.join("checkout.html").is_file());
    assert!(tmp
        .path()
        .join("data")
        .join("vector_store")
        .join("vectors.sqlite")
        .is_file());
}

#[test]
fn test_ingest_skips_unsupported_files() {
    let (tmp, config) = setup_test_env(60);
    let (stdout, stderr, success) = run_qa(
        &config,
        &[
            "ingest",
            "--session",
            "s2",
            &file_arg(&tmp, "setup.exe"),
            &file_arg(&tmp, "rules.md"),
        ],
    );
    assert!(success, "ingest failed: {}", stderr);
    assert!(stdout.contains("skipped: unsupported file type \".exe\""));
    assert!(stdout.contains("1 chunks in session_s2"), "stdout: {}", stdout);
}

#[test]
fn test_ingest_nothing_parsed_fails() {
    let (tmp, config) = setup_test_env(60);
    let (_stdout, stderr, success) = run_qa(
        &config,
        &["ingest", "--session", "s3", &file_arg(&tmp, "setup.exe")],
    );
    assert!(!success);
    assert!(stderr.contains("No valid documents parsed."), "stderr: {}", stderr);
}

#[test]
fn test_ingest_rejects_unsafe_session_id() {
    let (tmp, config) = setup_test_env(60);
    let (_stdout, stderr, success) = run_qa(
        &config,
        &["ingest", "--session", "../x", &file_arg(&tmp, "rules.md")],
    );
    assert!(!success);
    assert!(stderr.contains("invalid session id"), "stderr: {}", stderr);
}

#[test]
fn test_tests_without_llm_credentials_is_configuration_error() {
    let (tmp, config) = setup_test_env(60);
    run_qa(
        &config,
        &["ingest", "--session", "s4", &file_arg(&tmp, "rules.md")],
    );
    let (_stdout, stderr, success) =
        run_qa(&config, &["tests", "--session", "s4", "discount code"]);
    assert!(!success);
    assert!(stderr.contains("configuration error"), "stderr: {}", stderr);
    assert!(stderr.contains("QA_HARNESS_TEST_UNSET_KEY"));
}

#[test]
fn test_script_without_html_is_not_found() {
    let (tmp, config) = setup_test_env(60);
    run_qa(
        &config,
        &["ingest", "--session", "s5", &file_arg(&tmp, "rules.md")],
    );
    let (_stdout, stderr, success) = run_qa(&config, &["script", "--session", "s5", "TC-01"]);
    assert!(!success);
    assert!(stderr.contains("no HTML file uploaded"), "stderr: {}", stderr);
}

#[test]
fn test_sweep_keeps_fresh_sessions() {
    let (tmp, config) = setup_test_env(60);
    run_qa(
        &config,
        &["ingest", "--session", "fresh", &file_arg(&tmp, "faq.txt")],
    );
    let (stdout, stderr, success) = run_qa(&config, &["sweep"]);
    assert!(success, "sweep failed: {}", stderr);
    assert!(stdout.contains("0 removed, 1 kept"), "stdout: {}", stdout);
    assert!(tmp.path().join("data/uploads/fresh").is_dir());
}

#[test]
fn test_sweep_with_zero_timeout_removes_everything() {
    let (tmp, config) = setup_test_env(0);
    run_qa(
        &config,
        &["ingest", "--session", "a", &file_arg(&tmp, "faq.txt")],
    );
    run_qa(
        &config,
        &["ingest", "--session", "b", &file_arg(&tmp, "rules.md")],
    );

    let (stdout, stderr, success) = run_qa(&config, &["sweep"]);
    assert!(success, "sweep failed: {}", stderr);
    assert!(stdout.contains("2 removed, 0 kept"), "stdout: {}", stdout);
    assert!(!tmp.path().join("data/uploads/a").exists());
    assert!(!tmp.path().join("data/uploads/b").exists());

    // Collections went with the directories.
    let (stdout, _, success) = run_qa(&config, &["session", "delete", "a"]);
    assert!(success);
    assert!(stdout.contains("collection deleted: false"));
}

#[test]
fn test_session_delete() {
    let (tmp, config) = setup_test_env(60);
    run_qa(
        &config,
        &["ingest", "--session", "gone", &file_arg(&tmp, "rules.md")],
    );

    let (stdout, stderr, success) = run_qa(&config, &["session", "delete", "gone"]);
    assert!(success, "delete failed: {}", stderr);
    assert!(stdout.contains("collection deleted: true"));
    assert!(stdout.contains("uploads deleted:    true"));

    let (stdout, _, success) = run_qa(&config, &["session", "delete", "gone"]);
    assert!(success);
    assert!(stdout.contains("collection deleted: false"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("bad.toml");
    fs::write(&config_path, "[chunking]\nchunk_size = 100\nchunk_overlap = 150\n").unwrap();

    let (_stdout, stderr, success) = run_qa(&config_path, &["sweep"]);
    assert!(!success);
    assert!(stderr.contains("chunk_overlap"), "stderr: {}", stderr);
}
