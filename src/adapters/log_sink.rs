//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! Each line carries milliseconds since wake, so one cycle's power budget
//! can be read straight off the serial console.

use log::{info, warn};

use crate::adapters::time::UptimeClock;
use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink {
    clock: UptimeClock,
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogEventSink {
    pub fn new() -> Self {
        Self {
            clock: UptimeClock::new(),
        }
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        let t = self.clock.uptime_ms();
        match event {
            AppEvent::CycleStarted { baseline, scope } => {
                info!(
                    "[{:>6}ms] WAKE  | scope={:?} | baseline T={:.1} H={:.1} M={:.1} L={:.0} B={:.2}",
                    t,
                    scope,
                    baseline.last_temperature,
                    baseline.last_humidity,
                    baseline.last_moisture,
                    baseline.last_light,
                    baseline.last_battery,
                );
            }
            AppEvent::Sampled(r) => {
                info!(
                    "[{:>6}ms] TELEM | T={:.2}\u{00b0}C H={:.1}% M={:.1}% L={:.0}lx B={:.2}V",
                    t, r.temperature, r.humidity, r.moisture, r.light, r.battery,
                );
            }
            AppEvent::SensorFault(f) => {
                warn!("[{:>6}ms] FAULT | {}", t, f);
            }
            AppEvent::Decided(d) => {
                let changed: heapless::Vec<&str, 5> =
                    d.changed_fields().map(|f| f.name()).collect();
                info!(
                    "[{:>6}ms] DELTA | transmit={} | changed={:?}",
                    t, d.transmit, changed
                );
            }
            AppEvent::Transmitted { attempts } => {
                info!("[{:>6}ms] TX    | delivered (attempts={})", t, attempts);
            }
            AppEvent::TransmitFailed { error, attempts } => {
                warn!(
                    "[{:>6}ms] TX    | failed: {} (attempts={})",
                    t, error, attempts
                );
            }
            AppEvent::Skipped => {
                info!("[{:>6}ms] TX    | skipped, within deadband", t);
            }
            AppEvent::BaselineCommitted(_) => {
                info!("[{:>6}ms] STORE | baseline committed", t);
            }
            AppEvent::CommitFailed(e) => {
                warn!("[{:>6}ms] STORE | commit failed: {}", t, e);
            }
            AppEvent::SleepScheduled {
                duration,
                battery_volts,
            } => {
                info!(
                    "[{:>6}ms] SCHED | {} s at {:.2} V",
                    t,
                    duration.as_secs(),
                    battery_volts
                );
            }
            AppEvent::Suspending(d) => {
                info!(
                    "[{:>6}ms] SLEEP | awake {} ms, suspending for {} s",
                    t,
                    t,
                    d.as_secs()
                );
            }
        }
    }
}
