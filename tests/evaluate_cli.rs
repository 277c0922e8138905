use std::{fs, process::Command};

#[test]
fn empty_dataset_is_reported_on_stderr_without_rust_log() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("real")).unwrap();
    fs::create_dir(dir.path().join("ai")).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_evaluate"))
        .arg(dir.path())
        .env_remove("RUST_LOG")
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No validation images found in"), "stderr: {stderr}");
}

#[test]
fn missing_dataset_fails() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_evaluate"))
        .arg(dir.path().join("absent"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot read dataset"));
}
