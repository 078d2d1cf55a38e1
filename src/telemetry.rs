//! Outbound payload: a flat JSON object of field name → value.

use serde::Serialize;

use crate::error::CommsError;
use crate::reading::Reading;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryPayload {
    pub temperature: f32,
    pub humidity: f32,
    pub moisture: f32,
    pub light: f32,
    pub battery: f32,
}

impl From<&Reading> for TelemetryPayload {
    fn from(r: &Reading) -> Self {
        Self {
            temperature: r.temperature,
            humidity: r.humidity,
            moisture: r.moisture,
            light: r.light,
            battery: r.battery,
        }
    }
}

impl TelemetryPayload {
    pub fn encode(&self) -> Result<Vec<u8>, CommsError> {
        serde_json::to_vec(self).map_err(|_| CommsError::Encode)
    }
}
