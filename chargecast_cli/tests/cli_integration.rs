use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

const START: i64 = 1_700_000_000;

// A plateau at 40 %, one real step, a bogus -1 reading, then unplug.
fn write_trace(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("trace.csv");
    let mut f = fs::File::create(&path).unwrap();
    writeln!(f, "ts,soc,charging,thermal").unwrap();
    for i in 0..=12 {
        writeln!(f, "{},40,true,nominal", START + 30 * i).unwrap();
    }
    writeln!(f, "{},45,true,nominal", START + 390).unwrap();
    writeln!(f, "{},-1,true,nominal", START + 420).unwrap();
    writeln!(f, "{},45,false,nominal", START + 450).unwrap();
    path
}

fn write_config(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("cfg.toml");
    fs::write(&path, body).unwrap();
    path
}

fn chargecast() -> Command {
    let mut cmd = Command::cargo_bin("chargecast").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "OK", "stdout")]
#[case(&["replay"], 2, "required", "stderr")]
#[case(&["history"], 1, "no database", "stderr")]
#[case(&["watch", "--source", "sim", "--interval-ms", "5", "--max-ticks", "3"], 0, "3 ticks", "stdout")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let mut cmd = chargecast();
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn replay_prints_steps_and_summary() {
    let dir = tempdir().unwrap();
    let trace = write_trace(&dir);

    chargecast()
        .arg("replay")
        .arg("--trace")
        .arg(&trace)
        .assert()
        .success()
        .stdout(predicate::str::contains("charging"))
        .stdout(predicate::str::contains("unplugged"))
        .stdout(predicate::str::contains("15 ticks (1 rejected), 1 sessions ended"));
}

#[rstest]
fn replay_persists_then_history_and_trim_read_back() {
    let dir = tempdir().unwrap();
    let trace = write_trace(&dir);
    let db = dir.path().join("data").join("series.db");

    chargecast()
        .arg("replay")
        .arg("--trace")
        .arg(&trace)
        .arg("--db")
        .arg(&db)
        .assert()
        .success();
    assert!(db.exists());

    chargecast()
        .arg("history")
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("session_start"))
        .stdout(predicate::str::contains("session_end"));

    // The trace is from 2023, far outside a one-day window.
    chargecast()
        .arg("trim")
        .arg("--db")
        .arg(&db)
        .arg("--days")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("removed"));

    chargecast()
        .arg("history")
        .arg("--db")
        .arg(&db)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 rows"));
}

#[rstest]
fn database_path_from_config() {
    let dir = tempdir().unwrap();
    let trace = write_trace(&dir);
    let db = dir.path().join("from_cfg.db");
    let cfg = write_config(
        &dir,
        &format!("[persistence]\npath = {:?}\n", db.display().to_string()),
    );

    chargecast()
        .arg("--config")
        .arg(&cfg)
        .arg("replay")
        .arg("--trace")
        .arg(&trace)
        .assert()
        .success();
    assert!(db.exists());
}

#[rstest]
#[case("[detector]\noptimized_low_pct = 90\noptimized_high_pct = 80\n", "optimized band")]
#[case("[smoother]\nema_alpha = 0.0\n", "ema_alpha")]
#[case("[session\n", "Configuration is invalid")]
fn invalid_config_exits_3(#[case] body: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, body);
    chargecast()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains(needle));
}

#[rstest]
fn missing_config_file_is_a_config_error() {
    chargecast()
        .arg("--config")
        .arg("/definitely/not/here.toml")
        .arg("self-check")
        .assert()
        .code(3);
}

#[rstest]
fn cli_reports_bad_trace_header() {
    let dir = tempdir().unwrap();
    let bad = dir.path().join("bad.csv");
    let mut f = fs::File::create(&bad).unwrap();
    writeln!(f, "time,percent,plugged").unwrap();
    writeln!(f, "1700000000,40,true").unwrap();

    chargecast()
        .arg("replay")
        .arg("--trace")
        .arg(&bad)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
fn sysfs_watch_without_battery_exits_6() {
    let dir = tempdir().unwrap();
    chargecast()
        .arg("watch")
        .arg("--source")
        .arg("sysfs")
        .arg("--sysfs-dir")
        .arg(dir.path().join("BAT9"))
        .arg("--max-ticks")
        .arg("1")
        .assert()
        .code(6)
        .stderr(predicate::str::contains("Battery read failed"));
}
