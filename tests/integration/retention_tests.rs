//! Integration tests for baseline retention across wake cycles.
//!
//! The RTC slot stands in for slow memory: the test keeps it alive between
//! `run_cycle` calls the way deep sleep would, and wipes it the way a
//! power-on reset does.  `MockNvs` plays the flash store.

use willow::app::ports::{BaselineStore, StoragePort};
use willow::app::orchestrator::CycleOrchestrator;
use willow::baseline::{
    NVS_KEY, NVS_NAMESPACE, NvsBaselineStore, PersistedBaseline, RetainedSlot, RetentionScope,
    RtcBaselineStore,
};
use willow::power::WakeReason;

use super::mock_hw::{MockNode, MockNvs, RecordingSink, test_config};

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

/// What the boot path does with the slot before the cycle runs.
fn on_wake(slot: &mut RetainedSlot, wake: WakeReason) {
    if !wake.retains_rtc() {
        *slot = RetainedSlot::EMPTY;
    }
}

// ── RTC slot ──────────────────────────────────────────────────

#[test]
fn rtc_baseline_survives_timer_wake() {
    let orch = CycleOrchestrator::new(test_config());
    let mut slot = RetainedSlot::EMPTY;
    let mut sink = RecordingSink::new();
    let mut node = MockNode::new(21.0, 40.0, 4.5);

    on_wake(&mut slot, WakeReason::PowerOn);
    orch.run_cycle(&mut node, &mut RtcBaselineStore::new(&mut slot), &mut sink);

    on_wake(&mut slot, WakeReason::Timer);
    let loaded = RtcBaselineStore::new(&mut slot).load();
    assert!(approx(loaded.last_temperature, 21.0));
    assert!(approx(loaded.last_moisture, 40.0));

    // Unchanged conditions after a timer wake do not re-send.
    let report = orch.run_cycle(&mut node, &mut RtcBaselineStore::new(&mut slot), &mut sink);
    assert!(!report.transmitted());
    assert_eq!(node.published().len(), 1);
}

#[test]
fn power_on_reset_cold_starts_and_retransmits() {
    let orch = CycleOrchestrator::new(test_config());
    let mut slot = RetainedSlot::EMPTY;
    let mut sink = RecordingSink::new();
    let mut node = MockNode::new(21.0, 40.0, 4.5);

    orch.run_cycle(&mut node, &mut RtcBaselineStore::new(&mut slot), &mut sink);
    assert!(slot.unseal().is_some());

    on_wake(&mut slot, WakeReason::PowerOn);
    assert_eq!(
        RtcBaselineStore::new(&mut slot).load(),
        PersistedBaseline::COLD_START
    );
    let report = orch.run_cycle(&mut node, &mut RtcBaselineStore::new(&mut slot), &mut sink);
    assert!(report.transmitted(), "cold start re-sends the same reading");
    assert_eq!(node.published().len(), 2);
}

#[test]
fn corrupted_slot_is_treated_as_cold_start() {
    let orch = CycleOrchestrator::new(test_config());
    let mut slot = RetainedSlot::seal(PersistedBaseline {
        last_temperature: 21.0,
        last_moisture: 40.0,
        ..PersistedBaseline::COLD_START
    });
    // Flip a value without resealing, as a brown-out mid-write would.
    slot.baseline.last_temperature = 21.1;

    let mut node = MockNode::new(21.0, 40.0, 4.5);
    let mut sink = RecordingSink::new();
    let report = orch.run_cycle(&mut node, &mut RtcBaselineStore::new(&mut slot), &mut sink);
    assert!(report.transmitted());
    assert!(report.committed);
    assert!(slot.unseal().is_some(), "commit reseals the slot");
}

#[test]
fn other_wake_sources_keep_the_slot() {
    assert!(WakeReason::Timer.retains_rtc());
    assert!(WakeReason::Other(7).retains_rtc());
    assert!(!WakeReason::PowerOn.retains_rtc());
}

// ── NVS store ─────────────────────────────────────────────────

#[test]
fn nvs_baseline_survives_power_loss() {
    let mut config = test_config();
    config.retention = RetentionScope::PowerLoss;
    let orch = CycleOrchestrator::new(config);
    let mut nvs = MockNvs::new();
    let mut sink = RecordingSink::new();
    let mut node = MockNode::new(19.0, 62.0, 4.5);

    let report = orch.run_cycle(&mut node, &mut NvsBaselineStore::new(&mut nvs), &mut sink);
    assert!(report.committed);
    assert_eq!(nvs.writes, 1);
    assert!(nvs.exists(NVS_NAMESPACE, NVS_KEY));

    // A power-on reset clears RTC memory but not flash.
    let store = NvsBaselineStore::new(&mut nvs);
    assert_eq!(store.scope(), RetentionScope::PowerLoss);
    let loaded = store.load();
    assert!(approx(loaded.last_temperature, 19.0));
    assert!(approx(loaded.last_moisture, 62.0));
}

#[test]
fn skipped_cycles_do_not_write_flash() {
    let orch = CycleOrchestrator::new(test_config());
    let mut nvs = MockNvs::new();
    let mut sink = RecordingSink::new();
    let mut node = MockNode::new(19.0, 62.0, 4.5);

    orch.run_cycle(&mut node, &mut NvsBaselineStore::new(&mut nvs), &mut sink);
    for _ in 0..5 {
        let report = orch.run_cycle(&mut node, &mut NvsBaselineStore::new(&mut nvs), &mut sink);
        assert!(!report.transmitted());
    }
    assert_eq!(nvs.writes, 1);
}

#[test]
fn corrupt_nvs_record_loads_cold_start() {
    let mut nvs = MockNvs::new();
    nvs.write(NVS_NAMESPACE, NVS_KEY, &[0xFF; 3]).unwrap();
    let store = NvsBaselineStore::new(&mut nvs);
    assert_eq!(store.load(), PersistedBaseline::COLD_START);
}
