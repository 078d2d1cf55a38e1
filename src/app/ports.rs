//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ CycleOrchestrator (domain)
//! ```
//!
//! Driven adapters (sensors, gateway, suspend, storage, event sinks)
//! implement these traits.  The
//! [`CycleOrchestrator`](super::orchestrator::CycleOrchestrator) consumes
//! them via generics, so the domain core never touches hardware directly.
//!
//! Blocking delays are not a Willow port: the core takes any
//! [`embedded_hal::delay::DelayNs`], so tests inject a delay that returns
//! immediately.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use serde::{Deserialize, Serialize};

use crate::baseline::{PersistedBaseline, RetentionScope};
use crate::config::NodeConfig;
use crate::error::CommsError;
use crate::reading::Reading;
use crate::sensors::RawSample;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain raw sensor values.
///
/// Implementations never fail; a channel that could not be read reports
/// `f32::NAN` so acquisition can surface it as a fault after the window.
pub trait SensorPort {
    /// Take one raw sample of every averaged channel.
    fn sample(&mut self) -> RawSample;

    /// Take one raw battery ADC sample (counts).
    fn sample_battery(&mut self) -> f32;
}

// ───────────────────────────────────────────────────────────────
// Transmission gateway (driven adapter: domain → network)
// ───────────────────────────────────────────────────────────────

/// Broker identity and topics handed to [`GatewayPort::connect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIdentity {
    /// MQTT client id.  Empty means "derive from the factory MAC".
    pub client_id: heapless::String<32>,
    /// Broker URL, e.g. `mqtts://host:8883`.
    pub broker_url: heapless::String<128>,
    /// Outbound topic for readings.
    pub publish_topic: heapless::String<64>,
    /// Inbound topic reserved for downlink; never subscribed.
    pub downlink_topic: heapless::String<64>,
}

impl Default for NetworkIdentity {
    fn default() -> Self {
        Self {
            client_id: heapless::String::new(),
            broker_url: bounded("mqtts://your-endpoint.iot.region.amazonaws.com:8883"),
            publish_topic: bounded("willow/sensors/data"),
            downlink_topic: bounded("willow/sensors/downlink"),
        }
    }
}

/// Copy `s` into a fixed-capacity string, truncating on overflow.
pub fn bounded<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// The external transmission gateway.  Every call may fail.
pub trait GatewayPort {
    /// Bring up the link and authenticate with the broker.
    fn connect(&mut self, identity: &NetworkIdentity) -> Result<(), CommsError>;

    /// Publish `payload` on `topic`.  `Ok` means delivery was confirmed.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError>;

    /// Tear the link down so the radio can power off.
    fn disconnect(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Suspend port (driven adapter: domain → power management)
// ───────────────────────────────────────────────────────────────

/// Schedule the next wake and suspend until it fires.
///
/// On the device this never returns: the next wake is a fresh boot.
pub trait SuspendPort {
    fn suspend(&mut self, duration: Duration);
}

/// Everything the orchestrator needs from the hardware side in one bound.
pub trait NodeHardware: SensorPort + GatewayPort + SuspendPort + DelayNs {}

impl<T: SensorPort + GatewayPort + SuspendPort + DelayNs> NodeHardware for T {}

// ───────────────────────────────────────────────────────────────
// Baseline store (driven adapter: domain ↔ retention memory)
// ───────────────────────────────────────────────────────────────

/// The only state that survives between wake cycles.
///
/// # Retention
///
/// Each implementation documents its scope through [`scope`](Self::scope):
/// RTC slow memory survives deep sleep but not power-on reset; NVS
/// survives power loss.
pub trait BaselineStore {
    /// Load the baseline.  First boot or a failed integrity check yields
    /// [`PersistedBaseline::COLD_START`].
    fn load(&self) -> PersistedBaseline;

    /// Overwrite every baseline field from `reading` in one step.
    fn commit(&mut self, reading: &Reading) -> Result<(), StorageError>;

    /// How far this store's contents survive.
    fn scope(&self) -> RetentionScope;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists node configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`NodeConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<NodeConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// Write operations MUST be atomic: no partial writes on power loss.
/// The ESP-IDF NVS API guarantees this natively; in-memory simulation
/// achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] and [`BaselineStore`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Value could not be encoded or decoded.
    Codec,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::Codec => write!(f, "encode/decode failed"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
