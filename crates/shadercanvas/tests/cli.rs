use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn shadercanvas() -> Command {
    Command::new(env!("CARGO_BIN_EXE_shadercanvas"))
}

#[test]
fn help_prints_usage_and_exits_cleanly() {
    let output = shadercanvas()
        .arg("--help")
        .output()
        .expect("failed to run shadercanvas --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"), "stdout was: {stdout}");
    assert!(stdout.contains("FILENAME"));
    assert!(stdout.contains("--width"));
    assert!(stdout.contains("--fullscreen"));
}

#[test]
fn two_filenames_exit_with_failure() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("a.frag");
    let second = dir.path().join("b.frag");
    fs::write(&first, "void main() {}").unwrap();
    fs::write(&second, "void main() {}").unwrap();

    let output = shadercanvas()
        .arg(&first)
        .arg(&second)
        .output()
        .expect("failed to run shadercanvas with two files");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage:"), "stderr was: {stderr}");
}

#[test]
fn unknown_option_exits_with_failure() {
    let output = shadercanvas()
        .arg("--bogus")
        .output()
        .expect("failed to run shadercanvas with an unknown option");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--bogus"));
}

#[test]
fn version_flag_exits_cleanly() {
    let output = shadercanvas()
        .arg("--version")
        .output()
        .expect("failed to run shadercanvas --version");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("shadercanvas"));
}
