//! Capacitive soil moisture probe calibration.
//!
//! The probe's ADC output *falls* as the soil gets wetter, so the mean raw
//! value is remapped with inverted endpoints: `raw_dry` → 0 %,
//! `raw_wet` → 100 %.  Readings beyond either endpoint clamp.

use serde::{Deserialize, Serialize};

/// 12-bit ADC full scale.
pub const ADC_MAX_COUNTS: u16 = 4095;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoistureCalibration {
    /// Raw counts with the probe in dry air (0 %).
    pub raw_dry: u16,
    /// Raw counts with the probe in water (100 %).
    pub raw_wet: u16,
}

impl Default for MoistureCalibration {
    fn default() -> Self {
        Self {
            raw_dry: ADC_MAX_COUNTS,
            raw_wet: 0,
        }
    }
}

impl MoistureCalibration {
    /// Percent wet for a (mean) raw value.
    pub fn percent_wet(&self, raw: f32) -> f32 {
        let dry = f32::from(self.raw_dry);
        let wet = f32::from(self.raw_wet);
        let span = dry - wet;
        if span == 0.0 {
            return 0.0;
        }
        ((dry - raw) / span * 100.0).clamp(0.0, 100.0)
    }

    /// Raw values the ADC can legitimately produce.
    pub fn raw_range(&self) -> (f32, f32) {
        (0.0, f32::from(ADC_MAX_COUNTS))
    }
}
