//! Mock node hardware for integration tests.
//!
//! Scripts sensor values and gateway outcomes, and records every gateway
//! and suspend call so tests can assert on the full cycle history without
//! touching real GPIO, radio or RTC.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use willow::app::events::AppEvent;
use willow::app::ports::{
    BaselineStore, EventSink, GatewayPort, NetworkIdentity, SensorPort, StorageError, StoragePort,
    SuspendPort,
};
use willow::baseline::{PersistedBaseline, RetentionScope};
use willow::config::NodeConfig;
use willow::error::CommsError;
use willow::reading::Reading;
use willow::sensors::RawSample;
use willow::sensors::battery::BatteryCalibration;
use willow::sensors::moisture::MoistureCalibration;

// ── Test configuration ────────────────────────────────────────
//
// Calibrations chosen so physical values map to round raw counts:
// soil raw = 1000 - 10 × percent, battery raw = 1000 × volts.

pub fn test_config() -> NodeConfig {
    NodeConfig {
        sample_count: 3,
        sample_interval_ms: 2000,
        moisture: MoistureCalibration {
            raw_dry: 1000,
            raw_wet: 0,
        },
        battery: BatteryCalibration {
            adc_full_scale: 8000,
            full_scale_volts: 8.0,
            cell_count: 1,
        },
        ..NodeConfig::default()
    }
}

pub fn raw_sample(temperature: f32, moisture_pct: f32) -> RawSample {
    RawSample {
        temperature_c: temperature,
        humidity_pct: 50.0,
        soil_raw: 1000.0 - 10.0 * moisture_pct,
        light_lux: 300.0,
    }
}

pub fn battery_raw(volts: f32) -> f32 {
    volts * 1000.0
}

// ── Gateway call record ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Connect,
    Publish { topic: String, payload: Vec<u8> },
    Disconnect,
}

// ── MockNode ──────────────────────────────────────────────────

pub struct MockNode {
    pub sample: RawSample,
    /// Served before `sample`, one per call.
    pub scripted: VecDeque<RawSample>,
    pub battery_raw: f32,
    /// Consumed front to back; `Ok` once empty.
    pub connect_results: VecDeque<Result<(), CommsError>>,
    pub publish_results: VecDeque<Result<(), CommsError>>,
    pub calls: Vec<GatewayCall>,
    pub suspends: Vec<Duration>,
    pub sample_calls: u32,
    pub delayed_ms: u64,
}

#[allow(dead_code)]
impl MockNode {
    pub fn new(temperature: f32, moisture_pct: f32, volts: f32) -> Self {
        Self {
            sample: raw_sample(temperature, moisture_pct),
            scripted: VecDeque::new(),
            battery_raw: battery_raw(volts),
            connect_results: VecDeque::new(),
            publish_results: VecDeque::new(),
            calls: Vec::new(),
            suspends: Vec::new(),
            sample_calls: 0,
            delayed_ms: 0,
        }
    }

    pub fn set_reading(&mut self, temperature: f32, moisture_pct: f32) {
        self.sample = raw_sample(temperature, moisture_pct);
    }

    pub fn connects(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, GatewayCall::Connect))
            .count()
    }

    pub fn published(&self) -> Vec<&[u8]> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                GatewayCall::Publish { payload, .. } => Some(payload.as_slice()),
                _ => None,
            })
            .collect()
    }

    pub fn last_suspend(&self) -> Option<Duration> {
        self.suspends.last().copied()
    }
}

impl SensorPort for MockNode {
    fn sample(&mut self) -> RawSample {
        self.sample_calls += 1;
        self.scripted.pop_front().unwrap_or(self.sample)
    }

    fn sample_battery(&mut self) -> f32 {
        self.battery_raw
    }
}

impl GatewayPort for MockNode {
    fn connect(&mut self, _identity: &NetworkIdentity) -> Result<(), CommsError> {
        self.calls.push(GatewayCall::Connect);
        self.connect_results.pop_front().unwrap_or(Ok(()))
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        self.calls.push(GatewayCall::Publish {
            topic: topic.to_owned(),
            payload: payload.to_vec(),
        });
        self.publish_results.pop_front().unwrap_or(Ok(()))
    }

    fn disconnect(&mut self) {
        self.calls.push(GatewayCall::Disconnect);
    }
}

impl SuspendPort for MockNode {
    fn suspend(&mut self, duration: Duration) {
        self.suspends.push(duration);
    }
}

impl DelayNs for MockNode {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_ms(&mut self, ms: u32) {
        self.delayed_ms += u64::from(ms);
    }
}

// ── RecordingSink ─────────────────────────────────────────────

pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── FailingStore ──────────────────────────────────────────────

/// Baseline store whose commits always fail.
pub struct FailingStore {
    pub baseline: PersistedBaseline,
    pub commit_attempts: u32,
}

impl BaselineStore for FailingStore {
    fn load(&self) -> PersistedBaseline {
        self.baseline
    }

    fn commit(&mut self, _reading: &Reading) -> Result<(), StorageError> {
        self.commit_attempts += 1;
        Err(StorageError::IoError)
    }

    fn scope(&self) -> RetentionScope {
        RetentionScope::PowerLoss
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    pub data: RefCell<HashMap<String, Vec<u8>>>,
    pub writes: u32,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let k = format!("{}::{}", ns, key);
        match self.data.borrow().get(&k) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let k = format!("{}::{}", ns, key);
        self.data.borrow_mut().insert(k, data.to_vec());
        self.writes += 1;
        Ok(())
    }

    fn delete(&mut self, ns: &str, key: &str) -> Result<(), StorageError> {
        let k = format!("{}::{}", ns, key);
        self.data.borrow_mut().remove(&k);
        Ok(())
    }

    fn exists(&self, ns: &str, key: &str) -> bool {
        let k = format!("{}::{}", ns, key);
        self.data.borrow().contains_key(&k)
    }
}
