//! Common time and percentage helpers for chargecast_core.

use std::time::{Duration, Instant};

/// OS SoC reporting granularity in percent.
pub const STEP_PCT: i32 = 5;

/// Elapsed minutes from `earlier` to `later`, saturating at 0.
#[inline]
pub fn minutes_between(earlier: Instant, later: Instant) -> f64 {
    later.saturating_duration_since(earlier).as_secs_f64() / 60.0
}

/// Next multiple of [`STEP_PCT`] strictly above `soc`, capped at 100.
#[inline]
pub fn next_boundary(soc: i32) -> i32 {
    let soc = soc.clamp(0, 100);
    ((soc / STEP_PCT + 1) * STEP_PCT).min(100)
}

/// Round a minute estimate to the nearest whole minute.
/// Non-finite or negative inputs map to `None`.
#[inline]
pub fn round_minutes(x: f64) -> Option<u32> {
    if !x.is_finite() || x < 0.0 {
        return None;
    }
    Some(x.round().min(f64::from(u32::MAX)) as u32)
}

/// Human text for a presented ETA.
pub fn format_eta(minutes: Option<u32>) -> String {
    match minutes {
        None => "--".to_string(),
        Some(0) => "Full".to_string(),
        Some(m) if m < 60 => format!("{m} min"),
        Some(m) => format!("{}h {:02}m", m / 60, m % 60),
    }
}

/// Floor a wall-clock timestamp to whole seconds.
#[inline]
pub fn floor_secs(unix: f64) -> f64 {
    if unix.is_finite() { unix.floor() } else { 0.0 }
}

/// Whole seconds in a duration, saturating into `u32`.
#[inline]
pub fn whole_secs(d: Duration) -> u32 {
    d.as_secs().min(u64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(40, 45)]
    #[case(42, 45)]
    #[case(45, 50)]
    #[case(97, 100)]
    #[case(100, 100)]
    #[case(0, 5)]
    fn boundaries(#[case] soc: i32, #[case] want: i32) {
        assert_eq!(next_boundary(soc), want);
    }

    #[rstest]
    #[case(None, "--")]
    #[case(Some(0), "Full")]
    #[case(Some(41), "41 min")]
    #[case(Some(65), "1h 05m")]
    #[case(Some(180), "3h 00m")]
    fn eta_text(#[case] m: Option<u32>, #[case] want: &str) {
        assert_eq!(format_eta(m), want);
    }

    #[test]
    fn rounding_rejects_garbage() {
        assert_eq!(round_minutes(f64::NAN), None);
        assert_eq!(round_minutes(-1.0), None);
        assert_eq!(round_minutes(41.08), Some(41));
    }

    #[test]
    fn floor_drops_fraction() {
        assert_eq!(floor_secs(1_700_000_000.9), 1_700_000_000.0);
        assert_eq!(floor_secs(f64::NAN), 0.0);
    }
}
