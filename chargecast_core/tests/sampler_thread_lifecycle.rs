//! Sampler thread lifecycle: readings flow, duplicates are suppressed in
//! change-driven mode, and drop never leaks or hangs the thread.

use chargecast_core::mocks::ScriptedBattery;
use chargecast_core::sampler::Sampler;
use chargecast_traits::ThermalState;
use chargecast_traits::clock::MonotonicClock;
use std::time::{Duration, Instant};

#[test]
fn paced_sampler_forwards_readings() {
    let sampler = Sampler::spawn(
        ScriptedBattery::charging(&[40, 41, 42]),
        Duration::from_millis(5),
        MonotonicClock::new(),
    );
    let socs: Vec<i32> = (0..3)
        .filter_map(|_| sampler.recv_timeout(Duration::from_secs(2)))
        .map(|s| s.soc_percent)
        .collect();
    assert_eq!(socs, vec![40, 41, 42]);
}

#[test]
fn change_driven_sampler_suppresses_repeats() {
    let sampler = Sampler::spawn_on_change(
        ScriptedBattery::charging(&[40, 40, 40, 45]),
        Duration::from_millis(5),
        Duration::from_secs(60),
        MonotonicClock::new(),
    );
    let first = sampler.recv_timeout(Duration::from_secs(2)).unwrap();
    let second = sampler.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!((first.soc_percent, second.soc_percent), (40, 45));
    assert!(sampler.recv_timeout(Duration::from_millis(50)).is_none());
}

#[test]
fn read_errors_are_counted_not_fatal() {
    let sampler = Sampler::spawn(
        ScriptedBattery::new([None, None, Some((60, false, ThermalState::Fair))]),
        Duration::from_millis(5),
        MonotonicClock::new(),
    );
    let s = sampler.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(s.soc_percent, 60);
    assert_eq!(s.thermal, ThermalState::Fair);
    assert_eq!(sampler.error_count(), 2);
}

#[test]
fn drop_returns_promptly_with_long_period() {
    let sampler = Sampler::spawn(
        ScriptedBattery::charging(&[50]),
        Duration::from_secs(30),
        MonotonicClock::new(),
    );
    let _ = sampler.recv_timeout(Duration::from_secs(2));
    let started = Instant::now();
    drop(sampler);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn many_samplers_do_not_leak_threads() {
    for _ in 0..10 {
        let sampler = Sampler::spawn(
            ScriptedBattery::charging(&[10]),
            Duration::from_millis(2),
            MonotonicClock::new(),
        );
        std::thread::sleep(Duration::from_millis(5));
        let _ = sampler.drain();
        drop(sampler);
    }
}
