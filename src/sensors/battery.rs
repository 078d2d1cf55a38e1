//! Battery pack voltage estimate from a divided ADC sample.

use serde::{Deserialize, Serialize};

use super::moisture::ADC_MAX_COUNTS;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryCalibration {
    /// ADC counts at full scale.
    pub adc_full_scale: u16,
    /// Cell voltage represented by full scale.
    pub full_scale_volts: f32,
    /// Cells in series behind the divider.
    pub cell_count: u8,
}

impl Default for BatteryCalibration {
    fn default() -> Self {
        Self {
            adc_full_scale: ADC_MAX_COUNTS,
            full_scale_volts: 4.2,
            cell_count: 2,
        }
    }
}

impl BatteryCalibration {
    /// Pack voltage for a raw ADC sample.
    pub fn volts(&self, raw: f32) -> f32 {
        raw / f32::from(self.adc_full_scale) * self.full_scale_volts * f32::from(self.cell_count)
    }
}
