//! Fuzz target: RTC retained slot integrity
//!
//! Builds a `RetainedSlot` from arbitrary magic, baseline and digest bytes
//! and verifies:
//! - `RtcBaselineStore::load` never panics
//! - Anything other than an intact sealed image loads as cold start
//! - Resealing the fuzzed baseline always unseals to the same bits
//!
//! cargo fuzz run fuzz_retained_slot

#![no_main]

use libfuzzer_sys::fuzz_target;
use willow::app::ports::BaselineStore;
use willow::baseline::{PersistedBaseline, RetainedSlot, RtcBaselineStore};

fn word(data: &[u8], i: usize) -> [u8; 4] {
    data.get(i * 4..i * 4 + 4)
        .and_then(|s| s.try_into().ok())
        .unwrap_or([0; 4])
}

fuzz_target!(|data: &[u8]| {
    let f = |i| f32::from_le_bytes(word(data, i));
    let baseline = PersistedBaseline {
        last_temperature: f(1),
        last_humidity: f(2),
        last_moisture: f(3),
        last_light: f(4),
        last_battery: f(5),
    };
    let mut digest = [0u8; 8];
    digest[..4].copy_from_slice(&word(data, 6));
    digest[4..].copy_from_slice(&word(data, 7));

    let mut slot = RetainedSlot {
        magic: u32::from_le_bytes(word(data, 0)),
        baseline,
        digest,
    };
    let sealed = RetainedSlot::seal(baseline);
    let loaded = RtcBaselineStore::new(&mut slot).load();
    if slot.magic != sealed.magic || slot.digest != sealed.digest {
        assert_eq!(
            loaded.last_temperature.to_bits(),
            PersistedBaseline::COLD_START.last_temperature.to_bits()
        );
    }

    let back = sealed.unseal().expect("fresh seal must unseal");
    assert_eq!(back.last_temperature.to_bits(), baseline.last_temperature.to_bits());
    assert_eq!(back.last_battery.to_bits(), baseline.last_battery.to_bits());
});
