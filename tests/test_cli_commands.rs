use std::io::Write;
use std::process::{Command, Output, Stdio};

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tmbf-trigger"))
}

fn run_console(args: &[&str], script: &str) -> Output {
    let mut child = bin()
        .arg("--quiet")
        .arg("run")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn tmbf-trigger");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(script.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

#[test]
fn version_prints_package_name() {
    let output = bin().args(["version", "--format", "json"]).output().unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["name"], "tmbf-trigger");
}

#[test]
fn validate_exit_codes() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.yaml");
    let bad = dir.path().join("bad.yaml");
    std::fs::write(&good, "synchronise: true\n").unwrap();
    std::fs::write(&bad, "ddr:\n  delay: 99999999\n").unwrap();

    let ok = bin().arg("validate").arg(&good).output().unwrap();
    assert!(ok.status.success());

    let failed = bin().arg("validate").arg(&good).arg(&bad).output().unwrap();
    assert_eq!(failed.status.code(), Some(2));
}

#[test]
fn console_arms_and_reports_status() {
    let output = run_console(
        &["--no-events"],
        "auto buf on\narm buf\nstatus\nbogus\nquit\n",
    );
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let mut lines = stdout.lines();
    assert!(lines.next().unwrap().starts_with("Fired"));
    let status: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
    assert_eq!(status["buf"]["auto_rearm_enabled"], true);

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("unknown command 'bogus'"));
}

#[test]
fn events_file_records_run() {
    let dir = tempfile::tempdir().unwrap();
    let events = dir.path().join("events.jsonl");
    let output = run_console(
        &["--events-file", events.to_str().unwrap()],
        "arm ddr\n",
    );
    assert!(output.status.success());

    let contents = std::fs::read_to_string(&events).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("invalid JSON: {e}\nline: {l}")))
        .collect();

    assert_eq!(lines.first().unwrap()["type"], "Started");
    assert_eq!(lines.last().unwrap()["type"], "Stopped");
    assert_eq!(lines.last().unwrap()["reason"], "end of input");
    assert!(lines.iter().any(|l| l["type"] == "StatusChanged"
        && l["target"] == "ddr"
        && l["status"] == "armed"));

    let sequences: Vec<u64> = lines.iter().map(|l| l["sequence"].as_u64().unwrap()).collect();
    assert!(sequences.windows(2).all(|w| w[1] > w[0]));
}
