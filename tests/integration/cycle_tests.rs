//! Integration tests for the WAKE → SLEEP cycle.
//!
//! Drive `CycleOrchestrator::run_cycle` against `MockNode` and a real RTC
//! baseline slot, and check the phase path, gateway traffic, baseline
//! effect and chosen sleep for each outcome of a cycle.

use std::time::Duration;

use willow::app::events::AppEvent;
use willow::app::orchestrator::CycleOrchestrator;
use willow::app::ports::BaselineStore;
use willow::baseline::{PersistedBaseline, RetainedSlot, RtcBaselineStore};
use willow::error::{CommsError, SensorFault};
use willow::fsm::Phase;
use willow::fsm::context::Delivery;
use willow::reading::Field;

use super::mock_hw::{
    FailingStore, GatewayCall, MockNode, RecordingSink, raw_sample, test_config,
};

const FIVE_MIN: Duration = Duration::from_secs(300);
const HOUR: Duration = Duration::from_secs(3600);

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-3
}

fn baseline(t: f32, m: f32) -> PersistedBaseline {
    PersistedBaseline {
        last_temperature: t,
        last_moisture: m,
        ..PersistedBaseline::COLD_START
    }
}

// ── Cold start → transmit → commit, then skip ────────────────

#[test]
fn cold_start_transmits_then_small_change_skips() {
    let orch = CycleOrchestrator::new(test_config());
    let mut slot = RetainedSlot::EMPTY;
    let mut sink = RecordingSink::new();
    let mut node = MockNode::new(21.0, 40.0, 4.5);

    // Cycle 1: deltas 21.0 / 40.0 against the 0.0 cold start.
    let report = {
        let mut store = RtcBaselineStore::new(&mut slot);
        orch.run_cycle(&mut node, &mut store, &mut sink)
    };
    assert!(report.transmitted());
    assert!(report.delivery.is_delivered());
    assert!(report.committed);
    assert_eq!(
        report.phases.as_slice(),
        &[
            Phase::Wake,
            Phase::Sample,
            Phase::Decide,
            Phase::Transmit,
            Phase::Commit,
            Phase::Schedule,
            Phase::Sleep
        ]
    );
    let b = slot.unseal().expect("slot sealed after commit");
    assert!(approx(b.last_temperature, 21.0));
    assert!(approx(b.last_moisture, 40.0));

    // Cycle 2: deltas 0.2 / 0.5 are inside the deadband.
    node.set_reading(21.2, 40.5);
    let before = slot;
    let report = {
        let mut store = RtcBaselineStore::new(&mut slot);
        orch.run_cycle(&mut node, &mut store, &mut sink)
    };
    assert!(!report.transmitted());
    assert!(!report.committed);
    assert_eq!(report.delivery, Delivery::NotAttempted);
    assert!(report.visited(Phase::Skip));
    assert!(!report.visited(Phase::Transmit));
    assert_eq!(slot, before, "baseline must be bit-for-bit unchanged after SKIP");
    assert_eq!(node.connects(), 1, "radio only used in the first cycle");
}

#[test]
fn delivered_reading_is_loaded_next_cycle() {
    let orch = CycleOrchestrator::new(test_config());
    let mut slot = RetainedSlot::EMPTY;
    let mut sink = RecordingSink::new();
    let mut node = MockNode::new(22.0, 55.0, 4.5);

    {
        let mut store = RtcBaselineStore::new(&mut slot);
        orch.run_cycle(&mut node, &mut store, &mut sink);
    }
    let store = RtcBaselineStore::new(&mut slot);
    let loaded = store.load();
    assert!(approx(loaded.last_temperature, 22.0));
    assert!(approx(loaded.last_moisture, 55.0));
    assert!(approx(loaded.last_battery, 4.5));
}

// ── Deadband ──────────────────────────────────────────────────

#[test]
fn deadband_boundary_on_temperature() {
    let mut config = test_config();
    config.thresholds.moisture = None;
    let orch = CycleOrchestrator::new(config);

    for (temp, expect) in [(20.4, false), (20.6, true)] {
        let mut slot = RetainedSlot::seal(baseline(20.0, 0.0));
        let mut node = MockNode::new(temp, 0.0, 4.5);
        let mut sink = RecordingSink::new();
        let mut store = RtcBaselineStore::new(&mut slot);
        let report = orch.run_cycle(&mut node, &mut store, &mut sink);
        assert_eq!(report.transmitted(), expect, "temperature {}", temp);
        let d = report.decision.as_ref().unwrap();
        assert_eq!(d.delta(Field::Temperature).unwrap().changed, expect);
    }
}

// ── Delivery failures never commit ────────────────────────────

#[test]
fn unconfirmed_publish_keeps_baseline() {
    let orch = CycleOrchestrator::new(test_config());
    let mut slot = RetainedSlot::seal(baseline(10.0, 10.0));
    let before = slot;
    let mut node = MockNode::new(25.0, 60.0, 4.5);
    node.publish_results.push_back(Err(CommsError::PublishFault));
    let mut sink = RecordingSink::new();

    let report = {
        let mut store = RtcBaselineStore::new(&mut slot);
        orch.run_cycle(&mut node, &mut store, &mut sink)
    };
    assert!(report.transmitted());
    assert_eq!(
        report.delivery,
        Delivery::Failed {
            error: CommsError::PublishFault,
            attempts: 1
        }
    );
    assert!(!report.committed);
    assert!(report.visited(Phase::Commit), "COMMIT runs as a no-op");
    assert_eq!(slot, before);
    assert_eq!(node.calls.last(), Some(&GatewayCall::Disconnect));
    assert_eq!(report.sleep_for, FIVE_MIN);
}

#[test]
fn connect_retries_are_bounded() {
    let config = test_config();
    let max = config.retry.max_attempts;
    let orch = CycleOrchestrator::new(config);
    let mut slot = RetainedSlot::EMPTY;
    let mut node = MockNode::new(25.0, 60.0, 4.5);
    for _ in 0..32 {
        node.connect_results.push_back(Err(CommsError::ConnectFault));
    }
    let mut sink = RecordingSink::new();

    let report = {
        let mut store = RtcBaselineStore::new(&mut slot);
        orch.run_cycle(&mut node, &mut store, &mut sink)
    };
    assert!(node.connects() <= usize::from(max));
    assert!(node.published().is_empty());
    assert!(matches!(
        report.delivery,
        Delivery::Failed {
            error: CommsError::RetriesExhausted { .. },
            ..
        }
    ));
    assert!(!report.committed);
    assert_eq!(slot, RetainedSlot::EMPTY);
    assert!(report.visited(Phase::Sleep), "cycle must still reach SLEEP");
    assert_eq!(node.suspends.len(), 1);
}

#[test]
fn connect_succeeds_after_transient_failures() {
    let orch = CycleOrchestrator::new(test_config());
    let mut slot = RetainedSlot::EMPTY;
    let mut node = MockNode::new(25.0, 60.0, 4.5);
    node.connect_results.push_back(Err(CommsError::ConnectFault));
    node.connect_results.push_back(Err(CommsError::ConnectFault));
    let mut sink = RecordingSink::new();

    let report = {
        let mut store = RtcBaselineStore::new(&mut slot);
        orch.run_cycle(&mut node, &mut store, &mut sink)
    };
    assert_eq!(report.delivery, Delivery::Delivered { attempts: 3 });
    assert!(report.committed);
    assert_eq!(node.published().len(), 1);
    // Sampling window plus 500 + 1000 ms of backoff.
    assert_eq!(node.delayed_ms, 3 * 2000 + 500 + 1000);
}

#[test]
fn commit_failure_is_reported_not_fatal() {
    let orch = CycleOrchestrator::new(test_config());
    let mut store = FailingStore {
        baseline: PersistedBaseline::COLD_START,
        commit_attempts: 0,
    };
    let mut node = MockNode::new(25.0, 60.0, 4.5);
    let mut sink = RecordingSink::new();

    let report = orch.run_cycle(&mut node, &mut store, &mut sink);
    assert!(report.delivery.is_delivered());
    assert!(!report.committed);
    assert!(report.commit_error.is_some());
    assert_eq!(store.commit_attempts, 1);
    assert_eq!(sink.count(|e| matches!(e, AppEvent::CommitFailed(_))), 1);
    assert_eq!(node.last_suspend(), Some(FIVE_MIN));
}

// ── Sensor faults ─────────────────────────────────────────────

#[test]
fn sensor_fault_schedules_longest_sleep() {
    let orch = CycleOrchestrator::new(test_config());
    let mut slot = RetainedSlot::seal(baseline(20.0, 30.0));
    let before = slot;
    let mut node = MockNode::new(21.0, 40.0, 4.5);
    node.sample.humidity_pct = f32::NAN;
    let mut sink = RecordingSink::new();

    let report = {
        let mut store = RtcBaselineStore::new(&mut slot);
        orch.run_cycle(&mut node, &mut store, &mut sink)
    };
    assert!(matches!(report.fault, Some(SensorFault::NotANumber(Field::Humidity))));
    assert_eq!(
        report.phases.as_slice(),
        &[Phase::Wake, Phase::Sample, Phase::Schedule, Phase::Sleep]
    );
    assert!(report.decision.is_none());
    assert!(node.calls.is_empty(), "no radio on a faulted cycle");
    assert_eq!(slot, before);
    // Battery read fine, but a faulted cycle schedules on the fault assumption.
    assert_eq!(report.sleep_for, HOUR);
    assert_eq!(node.suspends, vec![HOUR]);
}

#[test]
fn whole_window_is_sampled_before_fault_is_raised() {
    let config = test_config();
    let n = u32::from(config.sample_count);
    let orch = CycleOrchestrator::new(config);
    let mut slot = RetainedSlot::EMPTY;
    let mut node = MockNode::new(200.0, 40.0, 4.5);
    let mut sink = RecordingSink::new();

    let report = {
        let mut store = RtcBaselineStore::new(&mut slot);
        orch.run_cycle(&mut node, &mut store, &mut sink)
    };
    assert_eq!(
        report.fault,
        Some(SensorFault::OutOfRange(Field::Temperature))
    );
    assert_eq!(node.sample_calls, n);
}

#[test]
fn one_glitched_read_faults_the_cycle() {
    let orch = CycleOrchestrator::new(test_config());
    let mut slot = RetainedSlot::seal(baseline(20.0, 30.0));
    let before = slot;
    let mut node = MockNode::new(20.0, 30.0, 4.5);
    node.scripted.push_back(raw_sample(150.0, 30.0));
    let mut sink = RecordingSink::new();

    let report = {
        let mut store = RtcBaselineStore::new(&mut slot);
        orch.run_cycle(&mut node, &mut store, &mut sink)
    };
    assert_eq!(
        report.fault,
        Some(SensorFault::OutOfRange(Field::Temperature))
    );
    assert!(report.reading.is_none());
    assert!(node.calls.is_empty(), "glitched mean must not be transmitted");
    assert_eq!(slot, before);
    assert_eq!(report.sleep_for, HOUR);
}

// ── Schedule tiers ────────────────────────────────────────────

#[test]
fn sleep_follows_battery_tier() {
    let orch = CycleOrchestrator::new(test_config());
    for (volts, expect) in [(4.5, FIVE_MIN), (3.6, HOUR), (4.0, HOUR)] {
        let mut slot = RetainedSlot::EMPTY;
        let mut node = MockNode::new(21.0, 40.0, volts);
        let mut sink = RecordingSink::new();
        let mut store = RtcBaselineStore::new(&mut slot);
        let report = orch.run_cycle(&mut node, &mut store, &mut sink);
        assert_eq!(report.sleep_for, expect, "battery {} V", volts);
        assert_eq!(node.suspends, vec![expect]);
    }
}

// ── Event stream ──────────────────────────────────────────────

#[test]
fn events_follow_phase_order() {
    let orch = CycleOrchestrator::new(test_config());
    let mut slot = RetainedSlot::EMPTY;
    let mut node = MockNode::new(21.0, 40.0, 4.5);
    let mut sink = RecordingSink::new();
    {
        let mut store = RtcBaselineStore::new(&mut slot);
        orch.run_cycle(&mut node, &mut store, &mut sink);
    }

    let kinds: Vec<&'static str> = sink
        .events
        .iter()
        .map(|e| match e {
            AppEvent::CycleStarted { .. } => "start",
            AppEvent::Sampled(_) => "sampled",
            AppEvent::SensorFault(_) => "fault",
            AppEvent::Decided(_) => "decided",
            AppEvent::Transmitted { .. } => "tx",
            AppEvent::TransmitFailed { .. } => "tx_failed",
            AppEvent::Skipped => "skip",
            AppEvent::BaselineCommitted(_) => "commit",
            AppEvent::CommitFailed(_) => "commit_failed",
            AppEvent::SleepScheduled { .. } => "scheduled",
            AppEvent::Suspending(_) => "suspend",
        })
        .collect();
    assert_eq!(
        kinds,
        ["start", "sampled", "decided", "tx", "commit", "scheduled", "suspend"]
    );
}

#[test]
fn payload_is_flat_json_on_publish_topic() {
    let config = test_config();
    let topic = config.network.publish_topic.to_string();
    let orch = CycleOrchestrator::new(config);
    let mut slot = RetainedSlot::EMPTY;
    let mut node = MockNode::new(21.0, 40.0, 4.5);
    let mut sink = RecordingSink::new();
    {
        let mut store = RtcBaselineStore::new(&mut slot);
        orch.run_cycle(&mut node, &mut store, &mut sink);
    }

    let (sent_topic, payload) = node
        .calls
        .iter()
        .find_map(|c| match c {
            GatewayCall::Publish { topic, payload } => Some((topic.clone(), payload.clone())),
            _ => None,
        })
        .unwrap();
    assert_eq!(sent_topic, topic);
    let v: serde_json::Value = serde_json::from_slice(&payload).unwrap();
    for key in ["temperature", "humidity", "moisture", "light", "battery"] {
        assert!(v.get(key).is_some_and(serde_json::Value::is_number), "{}", key);
    }
    assert!((v["temperature"].as_f64().unwrap() - 21.0).abs() < 1e-3);
}
