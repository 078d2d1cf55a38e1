//! Per-cycle data model shared by acquisition, decision and telemetry.
//!
//! A [`Reading`] is produced once per wake cycle by
//! [`SignalAcquisition`](crate::sensors::SignalAcquisition) and dropped when
//! the node suspends.  [`Field`] names each channel so that thresholds,
//! faults and baselines can refer to them without stringly-typed keys.

use core::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Field identity
// ---------------------------------------------------------------------------

/// Every measured channel carried in a [`Reading`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Field {
    Temperature = 0,
    Humidity = 1,
    Moisture = 2,
    Light = 3,
    Battery = 4,
}

impl Field {
    /// Total number of fields.
    pub const COUNT: usize = 5;

    /// All fields in payload order.
    pub const ALL: [Field; Field::COUNT] = [
        Field::Temperature,
        Field::Humidity,
        Field::Moisture,
        Field::Light,
        Field::Battery,
    ];

    /// Payload key for this field.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Moisture => "moisture",
            Self::Light => "light",
            Self::Battery => "battery",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// One filtered reading per wake cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Air temperature (°C), mean of N samples.
    pub temperature: f32,
    /// Relative humidity (0–100 %), mean of N samples.
    pub humidity: f32,
    /// Soil moisture (0–100 % wet), remapped from the mean raw ADC value.
    pub moisture: f32,
    /// Illuminance (lux), mean of N samples.
    pub light: f32,
    /// Estimated pack voltage (V) from a single post-window sample.
    pub battery: f32,
}

impl Reading {
    /// Value of a single field.
    pub fn get(&self, field: Field) -> f32 {
        match field {
            Field::Temperature => self.temperature,
            Field::Humidity => self.humidity,
            Field::Moisture => self.moisture,
            Field::Light => self.light,
            Field::Battery => self.battery,
        }
    }
}
