#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not. A config that
    // validates must also convert and build an engine.
    let Ok(cfg) = chargecast_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_ok() {
        let _ = chargecast_core::ChargeEngine::builder().with_config(&cfg).build();
    }
});
