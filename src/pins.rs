//! GPIO / peripheral pin assignments for the Willow sensor board (ESP32-WROOM).
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Sensors — Digital
// ---------------------------------------------------------------------------

/// DHT22 single-wire data line (open-drain, external 10 kΩ pull-up).
pub const DHT22_DATA_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Sensors — I²C (BH1750 light sensor)
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 21;
pub const I2C_SCL_GPIO: i32 = 22;
/// Standard-mode bus speed; the BH1750 tops out at 400 kHz.
pub const I2C_BAUDRATE_HZ: u32 = 100_000;

// ---------------------------------------------------------------------------
// Sensors — Analog (ADC1)
// ---------------------------------------------------------------------------

/// Capacitive soil moisture probe.  ADC1 channel 6.
pub const SOIL_ADC_GPIO: i32 = 34;
/// Battery divider midpoint (2S pack through a 1:2 divider).  ADC1 channel 7.
pub const BATTERY_ADC_GPIO: i32 = 35;
