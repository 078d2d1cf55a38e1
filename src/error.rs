//! Unified error types for the Willow firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! cycle orchestrator's error handling uniform.  All variants are `Copy` so
//! they can be stored in the per-cycle context and the cycle report without
//! allocation.

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};
use crate::drivers::hw_init::HwInitError;
use crate::reading::Field;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor channel produced an invalid filtered value.
    Sensor(SensorFault),
    /// The gateway could not be reached or did not confirm delivery.
    Comms(CommsError),
    /// The baseline store failed to persist.
    Storage(StorageError),
    /// Peripheral initialisation failed.
    Init(HwInitError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Comms(e) => write!(f, "comms: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Init(e) => write!(f, "init: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor faults
// ---------------------------------------------------------------------------

/// Raised by acquisition after the full sampling window when any raw read
/// on a channel could not be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFault {
    /// At least one sample on this channel was NaN or infinite.
    NotANumber(Field),
    /// At least one raw read lay outside the physically plausible range.
    OutOfRange(Field),
}

impl SensorFault {
    /// The channel that faulted.
    pub const fn field(self) -> Field {
        match self {
            Self::NotANumber(f) | Self::OutOfRange(f) => f,
        }
    }
}

impl fmt::Display for SensorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotANumber(field) => write!(f, "{field} read not a number"),
            Self::OutOfRange(field) => write!(f, "{field} reading out of range"),
        }
    }
}

impl From<SensorFault> for Error {
    fn from(e: SensorFault) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommsError {
    /// Transport or authentication failure before reaching the gateway.
    ConnectFault,
    /// Gateway reachable but delivery was not confirmed.
    PublishFault,
    /// The reading could not be encoded into a payload.
    Encode,
    /// Every connect attempt in the retry budget failed.
    RetriesExhausted { attempts: u8 },
}

impl fmt::Display for CommsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectFault => write!(f, "gateway connect failed"),
            Self::PublishFault => write!(f, "publish not confirmed"),
            Self::Encode => write!(f, "payload encode failed"),
            Self::RetriesExhausted { attempts } => {
                write!(f, "connect retries exhausted after {attempts} attempts")
            }
        }
    }
}

impl From<CommsError> for Error {
    fn from(e: CommsError) -> Self {
        Self::Comms(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<HwInitError> for Error {
    fn from(e: HwInitError) -> Self {
        Self::Init(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
