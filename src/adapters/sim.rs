//! Host simulation sensors.
//!
//! Stands in for [`HardwareAdapter`](super::hardware::HardwareAdapter)
//! when the firmware runs on a development machine.  Values drift slowly
//! across cycles with a little per-sample jitter, so a multi-cycle run
//! shows both skipped and transmitted cycles.  Soil and battery raw counts
//! come from the simulated ADC in [`hw_init`](crate::drivers::hw_init).

use embedded_hal::delay::DelayNs;

use crate::app::ports::SensorPort;
use crate::drivers::hw_init::{ADC1_CH_BATTERY, ADC1_CH_SOIL, adc1_read, sim_set_adc};
use crate::sensors::RawSample;

pub struct SimSensors {
    samples: u32,
    /// Per-sample temperature drift (°C).
    drift_c: f32,
    /// Real delays are divided by this (minimum 1).
    time_scale: u32,
    rng: u32,
}

impl SimSensors {
    pub fn new(drift_c: f32, time_scale: u32) -> Self {
        Self {
            samples: 0,
            drift_c,
            time_scale: time_scale.max(1),
            rng: 0x2545_F491,
        }
    }

    /// xorshift32 mapped to [-1, 1].
    fn jitter(&mut self) -> f32 {
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

impl SensorPort for SimSensors {
    fn sample(&mut self) -> RawSample {
        self.samples = self.samples.wrapping_add(1);
        let n = self.samples as f32;
        let temperature_c = 20.0 + self.drift_c * n + 0.05 * self.jitter();
        let humidity_pct = (55.0 + 0.5 * self.jitter()).clamp(0.0, 100.0);
        let light_lux = 300.0 + 10.0 * self.jitter();

        // Soil dries out by one count every sample.
        let soil = adc1_read(ADC1_CH_SOIL).map(|raw| raw.saturating_add(1).min(4095));
        sim_set_adc(ADC1_CH_SOIL, soil);

        RawSample {
            temperature_c,
            humidity_pct,
            soil_raw: soil.map_or(f32::NAN, f32::from),
            light_lux,
        }
    }

    fn sample_battery(&mut self) -> f32 {
        adc1_read(ADC1_CH_BATTERY).map_or(f32::NAN, f32::from)
    }
}

impl DelayNs for SimSensors {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(
            ns / self.time_scale,
        )));
    }
}
