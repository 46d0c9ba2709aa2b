use chargecast_config::load_toml;
use rstest::rstest;

#[test]
fn empty_document_yields_valid_defaults() {
    let cfg = load_toml("").expect("parse empty TOML");
    cfg.validate().expect("defaults should pass");
    assert_eq!(cfg.device.capacity_mah, 3000);
    assert_eq!(cfg.detector.optimized_low_pct, 75);
    assert_eq!(cfg.detector.optimized_high_pct, 88);
    assert_eq!(cfg.persistence.retention_days, 30);
    assert!(cfg.persistence.path.is_none());
}

#[test]
fn accepts_full_config() {
    let toml = r#"
[device]
capacity_mah = 4500
nominal_voltage = 3.87

[smoother]
warmup_secs = 60
warmup_watts = 12.0
ema_alpha = 0.3
min_rate_pct_per_min = 0.05
max_rate_pct_per_min = 3.0
expected_tick_secs = 30
data_gap_factor = 2.5
stale_step_secs = 600

[detector]
optimized_low_pct = 75
optimized_high_pct = 85
trickle_watts = 4.5

[presenter]
min_interval_ms = 900

[persistence]
path = "/tmp/chargecast.db"
retention_days = 14

[session]
unplug_confirm_ms = 800

[logging]
level = "debug"
rotation = "daily"
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.detector.optimized_high_pct, 85);
    assert_eq!(cfg.persistence.path.as_deref(), Some("/tmp/chargecast.db"));
    assert_eq!(cfg.logging.rotation.as_deref(), Some("daily"));
}

#[rstest]
#[case("[device]\ncapacity_mah = 0\n", "capacity_mah must be > 0")]
#[case("[smoother]\nema_alpha = 0.0\n", "ema_alpha must be in (0.0, 1.0]")]
#[case("[smoother]\nema_alpha = 1.5\n", "ema_alpha must be in (0.0, 1.0]")]
#[case(
    "[smoother]\nmin_rate_pct_per_min = 2.0\nmax_rate_pct_per_min = 1.0\n",
    "must exceed min_rate_pct_per_min"
)]
#[case("[smoother]\nexpected_tick_secs = 0\n", "expected_tick_secs must be >= 1")]
#[case(
    "[detector]\noptimized_low_pct = 90\noptimized_high_pct = 80\n",
    "optimized band"
)]
#[case("[detector]\nexit_ticks = 0\n", "tick counts must be >= 1")]
#[case("[presenter]\nconfirm_count = 0\n", "confirm_count must be >= 1")]
#[case("[presenter]\nrise_ratio = 1.5\n", "rise_ratio/fall_ratio")]
#[case("[persistence]\nretention_days = 0\n", "retention_days must be >= 1")]
fn rejects_out_of_range_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(needle),
        "error '{err}' should mention '{needle}'"
    );
}

#[test]
fn rejects_unknown_types() {
    assert!(load_toml("[device]\ncapacity_mah = \"lots\"\n").is_err());
}
