use std::path::PathBuf;
use std::process::{Command, Output};

fn binary_path() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    std::env::var("CARGO_BIN_EXE_stackhub-import")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let target_base = std::env::var("CARGO_TARGET_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    manifest_dir
                        .ancestors()
                        .nth(3)
                        .map(|p| p.join("target"))
                        .expect("failed to determine workspace target directory")
                });

            let mut path = target_base;
            path.push("debug");
            path.push(if cfg!(windows) {
                "stackhub-import.exe"
            } else {
                "stackhub-import"
            });
            path
        })
}

fn config_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(3)
        .map(|root| root.join("config"))
        .expect("workspace root")
}

fn run(args: &[&str]) -> Output {
    Command::new(binary_path())
        .args(args)
        .env("STACKHUB_CONFIG_DIR", config_dir())
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run stackhub-import")
}

#[test]
fn models_lists_catalog() {
    let output = run(&["models"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("gemini-2.0-flash"));
    assert!(stdout.contains("disabled"));
}

#[test]
fn imports_and_lists_a_csv_batch() {
    let dir = tempfile::tempdir().expect("temp dir");
    let db = dir.path().join("imports.sqlite");
    let csv = dir.path().join("science.csv");
    std::fs::write(
        &csv,
        "Question,Option A,Option B,Option C,Option D,Answer\nपाणी कशाचे बनलेले आहे?,H2O,CO2,O2,N2,A\n",
    )
    .expect("write csv");
    let db_arg = db.to_str().expect("utf-8 path");
    let csv_arg = csv.to_str().expect("utf-8 path");

    let output = run(&[
        "--db", db_arg, "--user", "teacher-1", "--role", "teacher", "--json", "import-sheet",
        csv_arg, "--subject", "science",
    ]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(response["questionsCount"], 1);
    assert_eq!(response["questions"][0]["correctAnswer"], 0);

    let output = run(&["--db", db_arg, "--json", "list", "--subject", "science"]);
    assert!(output.status.success());
    let summaries: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json list");
    assert_eq!(summaries.as_array().map(Vec::len), Some(1));
    assert_eq!(summaries[0]["status"], "draft");
}

#[test]
fn unknown_subject_fails_with_validation_code() {
    let dir = tempfile::tempdir().expect("temp dir");
    let csv = dir.path().join("q.csv");
    std::fs::write(&csv, "Question\nQ1\n").expect("write csv");

    let output = run(&[
        "--db",
        ":memory:",
        "import-sheet",
        csv.to_str().expect("utf-8 path"),
        "--subject",
        "astrology",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("validation_error"), "stderr: {stderr}");
}
