use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn logdoc_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("logdoc");
    path
}

const LOG: &str = "RPCS3 v0.0.32-16500-abcdef12 Alpha | master\n\
    · 0:00:00.000002 SYS: Serial: BLUS30443\n\
    Used configuration:\n\
    Core:\n  PPU Decoder: Recompiler (LLVM)\n\
    VFS:\nVideo:\n  Renderer: D3D12\n\
    Audio:\nLog:\n·\n";

fn run(config: &Path, args: &[&str]) -> std::process::Output {
    Command::new(logdoc_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("failed to run logdoc")
}

#[test]
fn diagnose_prints_text_report() {
    let tmp = TempDir::new().unwrap();
    let log = tmp.path().join("RPCS3.log");
    fs::write(&log, LOG).unwrap();

    let output = run(
        &tmp.path().join("missing.toml"),
        &["diagnose", log.to_str().unwrap(), "--progress", "off"],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("== RPCS3.log =="));
    assert!(stdout.contains("💢 Do not use DX12 renderer"));
}

#[test]
fn diagnose_json_reports_failures_and_exits_nonzero() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("uploads");
    fs::create_dir(&dir).unwrap();
    fs::write(dir.join("a.log"), LOG).unwrap();
    fs::write(dir.join("b.txt"), "too short").unwrap();

    let config = tmp.path().join("logdoc.toml");
    fs::write(&config, "[pipeline]\nslots = 1\n").unwrap();

    let output = run(
        &config,
        &["diagnose", dir.to_str().unwrap(), "--json", "--progress", "off"],
    );
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["file_name"], "a.log");
    assert_eq!(lines[0]["outcome"]["kind"], "success");
    assert_eq!(lines[1]["file_name"], "b.txt");
    assert!(lines[1]["error"].as_str().unwrap().contains("not a log"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 of 2 file(s) could not be diagnosed"));
}

#[test]
fn malformed_config_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("logdoc.toml");
    fs::write(&config, "[limits\n").unwrap();
    let log = tmp.path().join("RPCS3.log");
    fs::write(&log, LOG).unwrap();

    let output = run(&config, &["diagnose", log.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load config"));
}

#[test]
fn completions_need_no_config() {
    let output = Command::new(logdoc_binary())
        .args(["completions", "bash"])
        .output()
        .expect("failed to run logdoc");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("logdoc"));
}
