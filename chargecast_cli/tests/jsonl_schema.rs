use assert_cmd::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_trace(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("trace.csv");
    let mut f = fs::File::create(&path).unwrap();
    writeln!(f, "ts,soc,charging").unwrap();
    for i in 0..8 {
        writeln!(f, "{},60,true", 1_700_000_000 + 30 * i).unwrap();
    }
    writeln!(f, "{},60,false", 1_700_000_240).unwrap();
    path
}

fn json_lines(out: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(out)
        .lines()
        .map(|l| serde_json::from_str(l).expect("every stdout line is JSON"))
        .collect()
}

/// Every replay step is one flat JSON object; the last line is the summary.
#[rstest]
fn replay_jsonl_schema() {
    let dir = tempdir().unwrap();
    let trace = write_trace(&dir);

    let mut cmd = Command::cargo_bin("chargecast").unwrap();
    cmd.arg("--json")
        .arg("--log-level")
        .arg("error")
        .arg("replay")
        .arg("--trace")
        .arg(&trace);
    let out = cmd.assert().success().get_output().stdout.clone();
    let lines = json_lines(&out);
    assert_eq!(lines.len(), 10, "9 steps and a summary");

    for v in &lines[..9] {
        assert!(v.get("ts").and_then(|x| x.as_f64()).is_some());
        assert!(v.get("soc").and_then(|x| x.as_i64()).is_some());
        assert!(v.get("charging").and_then(|x| x.as_bool()).is_some());
        assert!(v.get("tick").and_then(|x| x.as_u64()).is_some());

        let snap = &v["snapshot"];
        let state = snap["state"].as_str().unwrap();
        assert!(["unplugged", "charging", "full", "unknown"].contains(&state));
        if state != "charging" {
            for key in ["eta_minutes", "watts", "rate_pct_per_min"] {
                assert!(snap[key].is_null(), "{key} must be null when {state}");
            }
        }
        let eta_text = v["eta_text"].as_str().unwrap();
        if state != "charging" {
            assert_eq!(eta_text, "--");
        }
    }

    let first = &lines[0];
    assert_eq!(first["snapshot"]["state"], "charging");
    assert!(first["session"].is_string());
    assert!(first["pause_reason"].is_null());

    let summary = &lines[9]["summary"];
    assert_eq!(summary["ticks"], 9);
    assert_eq!(summary["rejected"], 0);
    assert_eq!(summary["sessions_ended"], 1);
}

/// Errors under --json are one JSON object on stderr with a stable reason.
#[rstest]
fn error_json_schema() {
    let mut cmd = Command::cargo_bin("chargecast").unwrap();
    cmd.arg("--json")
        .arg("replay")
        .arg("--trace")
        .arg("/no/such/trace.csv");
    let out = cmd.assert().code(4).get_output().stderr.clone();
    let stderr = String::from_utf8_lossy(&out);
    let line = stderr
        .lines()
        .find(|l| l.contains("\"reason\""))
        .unwrap_or("")
        .to_string();
    assert!(!line.is_empty(), "no JSON error line; stderr was: {stderr}");

    let v: serde_json::Value = serde_json::from_str(&line).expect("valid JSON");
    assert_eq!(v["reason"], "Trace");
    assert_eq!(v["code"], 4);
    assert!(v["message"].as_str().unwrap().contains("What happened"));
}
