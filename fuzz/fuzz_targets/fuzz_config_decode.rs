//! Fuzz target: stored `NodeConfig` decode
//!
//! Feeds arbitrary bytes through the same path `NvsAdapter::load` takes
//! and verifies:
//! - No panics in postcard decode or `validate`
//! - A config that validates also builds an orchestrator and schedules
//!   a sleep within the configured durations
//!
//! cargo fuzz run fuzz_config_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use willow::config::NodeConfig;
use willow::schedule::ScheduleController;

fuzz_target!(|data: &[u8]| {
    let Ok(cfg) = postcard::from_bytes::<NodeConfig>(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }

    let schedule = ScheduleController::from_config(&cfg);
    for volts in [f32::NAN, -1.0, 0.0, cfg.fault_battery_volts, 3.6, 4.0, 4.5, 10.0] {
        let d = schedule.next_sleep(volts);
        assert!(
            d == schedule.fallback()
                || cfg.sleep_tiers.iter().any(|t| d.as_secs() == u64::from(t.sleep_secs)),
            "sleep {:?} is neither a tier nor the fallback",
            d
        );
    }

    // Re-encoding a validated config must round-trip.
    let bytes = postcard::to_allocvec(&cfg).expect("encode validated config");
    let back: NodeConfig = postcard::from_bytes(&bytes).expect("decode re-encoded config");
    assert_eq!(back, cfg);
});
