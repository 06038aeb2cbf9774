//! End-to-end tests of the hook binary: stdin JSON in, stdout JSON verdict
//! and exit status out.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

fn gate_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_salloc-gate"))
}

/// Overlay config pointing both whitelist files into `dir`.
fn write_overlay(dir: &Path) -> PathBuf {
    let allow_path = dir.join("allowed_partitions.txt");
    let map_path = dir.join("group_partition_map.txt");
    std::fs::write(&allow_path, "research\ngpu-interactive\n").unwrap();
    std::fs::write(&map_path, "1001:teamA,teamB\n").unwrap();

    let overlay = dir.join("gate.toml");
    std::fs::write(
        &overlay,
        format!(
            "[settings]\ndecision_log = \"\"\nlog_level = \"off\"\n\n[allowlist]\npath = \"{}\"\n\n[group_map]\npath = \"{}\"\n",
            allow_path.display(),
            map_path.display()
        ),
    )
    .unwrap();
    overlay
}

fn run(overlay: &Path, extra: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(gate_bin())
        .arg("--config")
        .arg(overlay)
        .args(extra)
        .env_remove("SALLOC_GATE_CONFIG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap_or_else(|e| panic!("spawn {}: {e}", gate_bin().display()));
    child
        .stdin
        .take()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn verdict(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn granted_partition_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let overlay = write_overlay(dir.path());
    let out = run(
        &overlay,
        &[],
        r#"{"submit_line":"salloc -p teamB","group_id":1001,"user_id":5000,"partition":"teamB"}"#,
    );
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(verdict(&out)["decision"], "allow");
}

#[test]
fn unlisted_partition_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let overlay = write_overlay(dir.path());
    let out = run(
        &overlay,
        &[],
        r#"{"submit_line":"salloc -p gpu","group_id":9,"user_id":5000,"partition":"gpu"}"#,
    );
    assert_eq!(out.status.code(), Some(1));
    let v = verdict(&out);
    assert_eq!(v["decision"], "deny");
    assert!(v["message"].as_str().unwrap().contains("gpu"));
}

#[test]
fn batch_job_ignores_whitelists() {
    let dir = tempfile::tempdir().unwrap();
    let overlay = write_overlay(dir.path());
    let out = run(
        &overlay,
        &[],
        r#"{"submit_line":"sbatch job.sh","group_id":9,"user_id":5000,"partition":"gpu","account":"x"}"#,
    );
    assert_eq!(out.status.code(), Some(0));
}

#[test]
fn malformed_input_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let overlay = write_overlay(dir.path());
    let out = run(&overlay, &[], "{\"submit_line\": ");
    assert_eq!(out.status.code(), Some(2));
    assert_eq!(verdict(&out)["decision"], "error");
}

#[test]
fn missing_config_exits_two() {
    let dir = tempfile::tempdir().unwrap();
    let out = run(
        &dir.path().join("absent.toml"),
        &[],
        r#"{"submit_line":"sbatch job.sh","group_id":9,"user_id":5000}"#,
    );
    assert_eq!(out.status.code(), Some(2));
    assert_eq!(verdict(&out)["decision"], "error");
}

#[test]
fn modify_hook_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    let overlay = write_overlay(dir.path());
    let out = run(
        &overlay,
        &["--modify"],
        r#"{"submit_line":"salloc -p gpu","group_id":9,"user_id":5000,"partition":"gpu"}"#,
    );
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(verdict(&out)["decision"], "allow");
}
