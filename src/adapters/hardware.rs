//! Hardware adapter — bridges real sensors to the domain port traits.
//!
//! Owns the DHT22, the BH1750, the blocking delay and the task watchdog,
//! and exposes them through [`SensorPort`] and [`DelayNs`].  Soil and
//! battery channels come from the one-shot ADC in
//! [`hw_init`](crate::drivers::hw_init).  A channel that cannot be read
//! reports NaN; acquisition turns that into a fault after the window.
//!
//! Generic over the pin, bus and delay so host tests can drive it with
//! mocks; on the device these are the ESP-IDF HAL drivers.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::app::ports::SensorPort;
use crate::drivers::bh1750::Bh1750;
use crate::drivers::dht22::Dht22;
use crate::drivers::hw_init::{ADC1_CH_BATTERY, ADC1_CH_SOIL, adc1_read};
use crate::drivers::watchdog::Watchdog;
use crate::sensors::RawSample;

/// Concrete adapter that combines all sensing hardware behind port traits.
pub struct HardwareAdapter<P, I, D> {
    dht: Dht22<P>,
    light: Bh1750<I>,
    delay: D,
    watchdog: Watchdog,
}

impl<P, I, D> HardwareAdapter<P, I, D>
where
    P: InputPin + OutputPin,
    I: I2c,
    D: DelayNs,
{
    pub fn new(dht: Dht22<P>, light: Bh1750<I>, delay: D, watchdog: Watchdog) -> Self {
        Self {
            dht,
            light,
            delay,
            watchdog,
        }
    }

    /// Start the light sensor's continuous conversions.  A failure is
    /// logged, not fatal: reads then report NaN and the cycle faults.
    pub fn init(&mut self) {
        match self.light.start() {
            Ok(()) => info!("Hardware: BH1750 started"),
            Err(e) => warn!("Hardware: BH1750 start failed: {:?}", e),
        }
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }
}

fn adc_or_nan(channel: u32) -> f32 {
    adc1_read(channel).map_or(f32::NAN, f32::from)
}

// ── SensorPort implementation ─────────────────────────────────

impl<P, I, D> SensorPort for HardwareAdapter<P, I, D>
where
    P: InputPin + OutputPin,
    I: I2c,
    D: DelayNs,
{
    fn sample(&mut self) -> RawSample {
        let (temperature_c, humidity_pct) = match self.dht.read(&mut self.delay) {
            Ok(r) => (r.temperature_c, r.humidity_pct),
            Err(e) => {
                warn!("Hardware: {}", e);
                (f32::NAN, f32::NAN)
            }
        };
        let light_lux = self.light.read_lux().unwrap_or_else(|e| {
            warn!("Hardware: BH1750 read failed: {:?}", e);
            f32::NAN
        });
        RawSample {
            temperature_c,
            humidity_pct,
            soil_raw: adc_or_nan(ADC1_CH_SOIL),
            light_lux,
        }
    }

    fn sample_battery(&mut self) -> f32 {
        adc_or_nan(ADC1_CH_BATTERY)
    }
}

// ── DelayNs implementation ────────────────────────────────────
//
// Every blocking wait in a cycle goes through here, so the watchdog is
// fed between samples and between connect retries.

impl<P, I, D: DelayNs> DelayNs for HardwareAdapter<P, I, D> {
    fn delay_ns(&mut self, ns: u32) {
        self.watchdog.feed();
        self.delay.delay_ns(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.watchdog.feed();
        self.delay.delay_us(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.watchdog.feed();
        self.delay.delay_ms(ms);
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    /// DHT line that never answers.
    struct DeadPin;

    impl embedded_hal::digital::ErrorType for DeadPin {
        type Error = Infallible;
    }
    impl OutputPin for DeadPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }
    impl InputPin for DeadPin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            Ok(true)
        }
        fn is_low(&mut self) -> Result<bool, Infallible> {
            Ok(false)
        }
    }

    /// BH1750 that always returns 600 counts (500 lx).
    struct FixedI2c;

    impl ErrorType for FixedI2c {
        type Error = ErrorKind;
    }
    impl I2c for FixedI2c {
        fn transaction(&mut self, _: u8, ops: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
            for op in ops {
                if let Operation::Read(buf) = op {
                    buf.copy_from_slice(&600u16.to_be_bytes());
                }
            }
            Ok(())
        }
    }

    struct NoDelay;
    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _: u32) {}
    }

    fn adapter() -> HardwareAdapter<DeadPin, FixedI2c, NoDelay> {
        HardwareAdapter::new(
            Dht22::new(DeadPin),
            Bh1750::new(FixedI2c, 0x23),
            NoDelay,
            Watchdog::new(60_000),
        )
    }

    #[test]
    fn dead_dht_reports_nan_but_keeps_light() {
        let mut hw = adapter();
        hw.init();
        let s = hw.sample();
        assert!(s.temperature_c.is_nan());
        assert!(s.humidity_pct.is_nan());
        assert!((s.light_lux - 500.0).abs() < 1e-3);
    }

    #[test]
    fn blocking_delay_feeds_watchdog() {
        let mut hw = adapter();
        let before = hw.watchdog().feeds();
        hw.delay_ms(2000);
        hw.delay_ms(2000);
        assert_eq!(hw.watchdog().feeds(), before + 2);
    }
}
