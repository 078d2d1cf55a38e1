//! Signal acquisition — turns a window of noisy raw samples into one
//! [`Reading`] per wake cycle.
//!
//! ```text
//!   t=0        t=Δ        t=2Δ            t=(N-1)Δ      t=NΔ
//!   sample ─Δ─ sample ─Δ─ sample ─ ... ─ sample ─Δ─ battery
//!   └──────────── sums / N ───────────────┘          └ single sample
//! ```
//!
//! Acquisition blocks the single thread of control for the whole window:
//! sensors need real time to settle between samples.  Each raw read is
//! checked for NaN and plausible range as it arrives, but the fault is only
//! raised after every sample is in.  One bad read fails the whole cycle
//! with a [`SensorFault`] rather than being averaged into the reading.

pub mod battery;
pub mod moisture;

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::app::ports::SensorPort;
use crate::config::NodeConfig;
use crate::error::SensorFault;
use crate::reading::{Field, Reading};
use battery::BatteryCalibration;
use moisture::MoistureCalibration;

/// Plausible air temperature range (°C) for the DHT22.
pub const TEMPERATURE_RANGE_C: (f32, f32) = (-40.0, 80.0);
/// Relative humidity range (%).
pub const HUMIDITY_RANGE_PCT: (f32, f32) = (0.0, 100.0);
/// BH1750 full-scale range (lux).
pub const LIGHT_RANGE_LUX: (f32, f32) = (0.0, 65_535.0);

/// One raw sample of every averaged channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawSample {
    /// Air temperature (°C), NaN if the read failed.
    pub temperature_c: f32,
    /// Relative humidity (%), NaN if the read failed.
    pub humidity_pct: f32,
    /// Soil probe ADC counts, NaN if the read failed.
    pub soil_raw: f32,
    /// Illuminance (lux), NaN if the read failed.
    pub light_lux: f32,
}

#[derive(Debug, Default)]
struct ChannelSums {
    temperature: f32,
    humidity: f32,
    soil: f32,
    light: f32,
}

impl ChannelSums {
    fn add(&mut self, s: &RawSample) {
        self.temperature += s.temperature_c;
        self.humidity += s.humidity_pct;
        self.soil += s.soil_raw;
        self.light += s.light_lux;
    }
}

/// Windowed-average acquisition.
#[derive(Debug, Clone)]
pub struct SignalAcquisition {
    sample_count: u8,
    sample_interval_ms: u32,
    moisture: MoistureCalibration,
    battery: BatteryCalibration,
}

impl SignalAcquisition {
    pub fn new(
        sample_count: u8,
        sample_interval_ms: u32,
        moisture: MoistureCalibration,
        battery: BatteryCalibration,
    ) -> Self {
        Self {
            sample_count: sample_count.max(1),
            sample_interval_ms,
            moisture,
            battery,
        }
    }

    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(
            config.sample_count,
            config.sample_interval_ms,
            config.moisture,
            config.battery,
        )
    }

    /// Samples averaged per cycle.
    pub fn sample_count(&self) -> u8 {
        self.sample_count
    }

    /// Take N samples, average them, then take one battery sample.
    ///
    /// Blocks for `N × sample_interval_ms` through `hw`'s delay.  Every raw
    /// read is range-checked as it arrives; the first bad one is held and
    /// returned once the window and the battery sample are done.
    pub fn acquire<H>(&self, hw: &mut H) -> Result<Reading, SensorFault>
    where
        H: SensorPort + DelayNs,
    {
        let mut sums = ChannelSums::default();
        let mut fault: Option<SensorFault> = None;
        for i in 0..self.sample_count {
            let s = hw.sample();
            debug!(
                "SAMPLE {}/{}: T={:.1} RH={:.1} soil={:.0} lux={:.1}",
                i + 1,
                self.sample_count,
                s.temperature_c,
                s.humidity_pct,
                s.soil_raw,
                s.light_lux
            );
            if let Err(e) = self.check_sample(&s) {
                if fault.is_none() {
                    warn!("SAMPLE {}/{}: {}", i + 1, self.sample_count, e);
                    fault = Some(e);
                }
            }
            sums.add(&s);
            hw.delay_ms(self.sample_interval_ms);
        }
        let battery_raw = hw.sample_battery();

        if let Some(e) = fault {
            return Err(e);
        }
        let battery_raw = checked(
            Field::Battery,
            battery_raw,
            (0.0, f32::from(self.battery.adc_full_scale)),
        )?;

        let n = f32::from(self.sample_count);
        Ok(Reading {
            temperature: sums.temperature / n,
            humidity: sums.humidity / n,
            moisture: self.moisture.percent_wet(sums.soil / n),
            light: sums.light / n,
            battery: self.battery.volts(battery_raw),
        })
    }

    fn check_sample(&self, s: &RawSample) -> Result<(), SensorFault> {
        checked(Field::Temperature, s.temperature_c, TEMPERATURE_RANGE_C)?;
        checked(Field::Humidity, s.humidity_pct, HUMIDITY_RANGE_PCT)?;
        checked(Field::Moisture, s.soil_raw, self.moisture.raw_range())?;
        checked(Field::Light, s.light_lux, LIGHT_RANGE_LUX)?;
        Ok(())
    }
}

fn checked(field: Field, value: f32, (lo, hi): (f32, f32)) -> Result<f32, SensorFault> {
    if !value.is_finite() {
        return Err(SensorFault::NotANumber(field));
    }
    if value < lo || value > hi {
        return Err(SensorFault::OutOfRange(field));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted {
        samples: VecDeque<RawSample>,
        battery: f32,
        delayed_ns: u64,
        sample_calls: u32,
        battery_calls: u32,
    }

    impl Scripted {
        fn new(samples: Vec<RawSample>, battery: f32) -> Self {
            Self {
                samples: samples.into(),
                battery,
                delayed_ns: 0,
                sample_calls: 0,
                battery_calls: 0,
            }
        }
    }

    impl SensorPort for Scripted {
        fn sample(&mut self) -> RawSample {
            self.sample_calls += 1;
            self.samples.pop_front().unwrap_or_default()
        }
        fn sample_battery(&mut self) -> f32 {
            self.battery_calls += 1;
            self.battery
        }
    }

    impl DelayNs for Scripted {
        fn delay_ns(&mut self, ns: u32) {
            self.delayed_ns += u64::from(ns);
        }
    }

    fn raw(t: f32, h: f32, soil: f32, lux: f32) -> RawSample {
        RawSample {
            temperature_c: t,
            humidity_pct: h,
            soil_raw: soil,
            light_lux: lux,
        }
    }

    fn acquisition() -> SignalAcquisition {
        SignalAcquisition::from_config(&NodeConfig::default())
    }

    #[test]
    fn averages_each_channel_over_the_window() {
        let mut hw = Scripted::new(
            vec![
                raw(20.0, 50.0, 2000.0, 100.0),
                raw(21.0, 52.0, 2100.0, 110.0),
                raw(22.0, 54.0, 2200.0, 120.0),
                raw(23.0, 56.0, 2300.0, 130.0),
                raw(24.0, 58.0, 2400.0, 140.0),
            ],
            2048.0,
        );
        let r = acquisition().acquire(&mut hw).unwrap();
        assert!((r.temperature - 22.0).abs() < 1e-4);
        assert!((r.humidity - 54.0).abs() < 1e-4);
        assert!((r.light - 120.0).abs() < 1e-4);
        // mean soil 2200 → (4095 − 2200) / 4095 × 100
        assert!((r.moisture - 46.275_948).abs() < 1e-3);
        assert_eq!(hw.sample_calls, 5);
        assert_eq!(hw.battery_calls, 1);
    }

    #[test]
    fn blocks_for_the_full_window() {
        let mut hw = Scripted::new(vec![raw(20.0, 50.0, 2000.0, 100.0); 5], 2048.0);
        acquisition().acquire(&mut hw).unwrap();
        assert_eq!(hw.delayed_ns, 10_000 * 1_000_000);
    }

    #[test]
    fn battery_is_a_single_scaled_sample() {
        let mut hw = Scripted::new(vec![raw(20.0, 50.0, 2000.0, 100.0); 5], 4095.0);
        let r = acquisition().acquire(&mut hw).unwrap();
        assert!((r.battery - 8.4).abs() < 1e-4);
    }

    #[test]
    fn nan_in_any_sample_is_a_fault() {
        let mut samples = vec![raw(20.0, 50.0, 2000.0, 100.0); 5];
        samples[3].humidity_pct = f32::NAN;
        let mut hw = Scripted::new(samples, 2048.0);
        assert_eq!(
            acquisition().acquire(&mut hw),
            Err(SensorFault::NotANumber(Field::Humidity))
        );
        // The whole window still ran.
        assert_eq!(hw.sample_calls, 5);
    }

    #[test]
    fn out_of_range_window_is_a_fault() {
        let mut hw = Scripted::new(vec![raw(95.0, 50.0, 2000.0, 100.0); 5], 2048.0);
        assert_eq!(
            acquisition().acquire(&mut hw),
            Err(SensorFault::OutOfRange(Field::Temperature))
        );
    }

    #[test]
    fn single_out_of_range_read_is_not_averaged_in() {
        // Mean would be 46 °C, which is plausible on its own.
        let mut samples = vec![raw(20.0, 50.0, 2000.0, 100.0); 5];
        samples[0].temperature_c = 150.0;
        let mut hw = Scripted::new(samples, 2048.0);
        assert_eq!(
            acquisition().acquire(&mut hw),
            Err(SensorFault::OutOfRange(Field::Temperature))
        );
        assert_eq!(hw.sample_calls, 5);
        assert_eq!(hw.battery_calls, 1);
    }

    #[test]
    fn first_bad_read_is_the_one_reported() {
        let mut samples = vec![raw(20.0, 50.0, 2000.0, 100.0); 5];
        samples[1].light_lux = -5.0;
        samples[3].humidity_pct = f32::NAN;
        let mut hw = Scripted::new(samples, 2048.0);
        assert_eq!(
            acquisition().acquire(&mut hw),
            Err(SensorFault::OutOfRange(Field::Light))
        );
    }

    #[test]
    fn battery_nan_is_a_fault() {
        let mut hw = Scripted::new(vec![raw(20.0, 50.0, 2000.0, 100.0); 5], f32::NAN);
        assert_eq!(
            acquisition().acquire(&mut hw),
            Err(SensorFault::NotANumber(Field::Battery))
        );
    }

    #[test]
    fn soil_above_adc_range_is_a_fault() {
        let mut hw = Scripted::new(vec![raw(20.0, 50.0, 5000.0, 100.0); 5], 2048.0);
        assert_eq!(
            acquisition().acquire(&mut hw),
            Err(SensorFault::OutOfRange(Field::Moisture))
        );
    }
}
