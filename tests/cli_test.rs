use std::path::Path;
use std::process::Command;

#[test]
fn scrape_prints_report_json_on_stdout_and_logs_on_stderr() {
    let workdir = tempfile::tempdir().unwrap();
    let fixture = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/bulletin.html");

    let output = Command::new(env!("CARGO_BIN_EXE_quake_feed"))
        .current_dir(workdir.path())
        .env("QUAKE_DB_PATH", ":memory:")
        .env("RUST_LOG", "info")
        .arg("scrape")
        .arg("--from-file")
        .arg(&fixture)
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    // stdout must be nothing but the report
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["rows_seen"], 6);
    assert_eq!(report["rows_rejected"], 1);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Reading bulletin from"));
}
