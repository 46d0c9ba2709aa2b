use chargecast_config::load_trace_csv;
use chargecast_traits::ThermalState;
use rstest::rstest;
use std::fs::File;
use std::io::Write;
use tempfile::tempdir;

fn write_csv(lines: &[&str]) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trace.csv");
    let mut f = File::create(&path).unwrap();
    for l in lines {
        writeln!(f, "{l}").unwrap();
    }
    (dir, path)
}

#[rstest]
fn parses_full_headers() {
    let (_dir, path) = write_csv(&[
        "ts,soc,charging,thermal",
        "1700000000,40,true,nominal",
        "1700000030,40,true,serious",
    ]);
    let rows = load_trace_csv(&path).expect("valid trace");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].soc, 40);
    assert!(rows[0].charging);
    assert_eq!(rows[1].thermal, ThermalState::Serious);
}

#[rstest]
fn thermal_column_is_optional() {
    let (_dir, path) = write_csv(&["ts,soc,charging", "10,50,false", "20,50,true"]);
    let rows = load_trace_csv(&path).expect("valid trace");
    assert_eq!(rows[0].thermal, ThermalState::Nominal);
    assert!(!rows[0].charging);
}

#[rstest]
fn rejects_wrong_headers() {
    let (_dir, path) = write_csv(&["time,level", "1,2"]);
    let err = load_trace_csv(&path).expect_err("bad headers");
    assert!(format!("{err}").contains("headers 'ts,soc,charging[,thermal]'"));
}

#[rstest]
fn rejects_non_numeric_rows() {
    let (_dir, path) = write_csv(&["ts,soc,charging", "abc,40,true"]);
    let err = load_trace_csv(&path).expect_err("non-numeric");
    assert!(format!("{err}").contains("invalid CSV row 2"));
}

#[rstest]
fn rejects_time_going_backwards() {
    let (_dir, path) = write_csv(&["ts,soc,charging", "100,40,true", "90,40,true"]);
    let err = load_trace_csv(&path).expect_err("backwards");
    assert!(format!("{err}").contains("non-decreasing"));
}

#[rstest]
fn rejects_empty_trace() {
    let (_dir, path) = write_csv(&["ts,soc,charging"]);
    let err = load_trace_csv(&path).expect_err("empty");
    assert!(format!("{err}").contains("no samples"));
}
