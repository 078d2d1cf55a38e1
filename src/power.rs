//! Power management: wake-reason detection and timer deep sleep.
//!
//! ```text
//!   boot ──▶ wake_reason() ──▶ cycle ──▶ suspend(d) ──▶ deep sleep ─┐
//!    ▲                                                              │
//!    └───────────────────────── timer fires after d ────────────────┘
//! ```
//!
//! - **`target_os = "espidf"`**: `esp_sleep_enable_timer_wakeup` followed by
//!   `esp_deep_sleep_start`.  The CPU powers down; only RTC slow memory
//!   survives and the next wake is a fresh boot.
//! - **all other targets**: the calling thread sleeps for the duration
//!   divided by a time scale so a host simulation can run many cycles.

use core::time::Duration;

use log::info;

use crate::app::ports::SuspendPort;

/// Why this process instance started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// Power-on or hard reset: RTC memory was re-initialised.
    PowerOn,
    /// The deep-sleep timer fired.
    Timer,
    /// Any other wake source (raw ESP-IDF cause code).
    Other(u32),
}

impl WakeReason {
    /// Retention memory from the previous cycle is valid.
    pub fn retains_rtc(self) -> bool {
        !matches!(self, Self::PowerOn)
    }
}

// ── Simulation state ──────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU32, Ordering};

/// 0 = power-on, 1 = timer, anything else = other.
#[cfg(not(target_os = "espidf"))]
static SIM_WAKE_CAUSE: AtomicU32 = AtomicU32::new(0);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_wake_reason(reason: WakeReason) {
    let raw = match reason {
        WakeReason::PowerOn => 0,
        WakeReason::Timer => 1,
        WakeReason::Other(c) => c.max(2),
    };
    SIM_WAKE_CAUSE.store(raw, Ordering::Relaxed);
}

// ── PowerManager ──────────────────────────────────────────────

pub struct PowerManager {
    #[cfg(not(target_os = "espidf"))]
    time_scale: u32,
    #[cfg(not(target_os = "espidf"))]
    slept: Duration,
}

impl Default for PowerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerManager {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            time_scale: 1,
            #[cfg(not(target_os = "espidf"))]
            slept: Duration::ZERO,
        }
    }

    /// Simulation: divide every suspend by `scale` (minimum 1).
    #[cfg(not(target_os = "espidf"))]
    pub fn with_time_scale(scale: u32) -> Self {
        Self {
            time_scale: scale.max(1),
            slept: Duration::ZERO,
        }
    }

    /// Simulation: total (unscaled) time spent suspended.
    #[cfg(not(target_os = "espidf"))]
    pub fn slept(&self) -> Duration {
        self.slept
    }

    #[cfg(target_os = "espidf")]
    pub fn wake_reason(&self) -> WakeReason {
        use esp_idf_svc::sys::*;
        // SAFETY: read-only query of the RTC wake cause register.
        let cause = unsafe { esp_sleep_get_wakeup_cause() };
        #[allow(non_upper_case_globals)]
        match cause {
            esp_sleep_source_t_ESP_SLEEP_WAKEUP_UNDEFINED => WakeReason::PowerOn,
            esp_sleep_source_t_ESP_SLEEP_WAKEUP_TIMER => WakeReason::Timer,
            other => WakeReason::Other(other as u32),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn wake_reason(&self) -> WakeReason {
        match SIM_WAKE_CAUSE.load(Ordering::Relaxed) {
            0 => WakeReason::PowerOn,
            1 => WakeReason::Timer,
            c => WakeReason::Other(c),
        }
    }

    /// Arm the RTC timer and enter deep sleep.  Never returns.
    #[cfg(target_os = "espidf")]
    pub fn enter_deep_sleep(&mut self, duration: Duration) -> ! {
        let us = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        info!("Power: deep sleep for {} s", duration.as_secs());
        // SAFETY: both calls are plain ESP-IDF sleep API calls made from
        // the single main task after all peripherals are idle.
        unsafe {
            esp_idf_svc::sys::esp_sleep_enable_timer_wakeup(us);
            esp_idf_svc::sys::esp_deep_sleep_start();
        }
    }
}

impl SuspendPort for PowerManager {
    #[cfg(target_os = "espidf")]
    fn suspend(&mut self, duration: Duration) {
        self.enter_deep_sleep(duration);
    }

    #[cfg(not(target_os = "espidf"))]
    fn suspend(&mut self, duration: Duration) {
        let scaled = duration / self.time_scale;
        info!(
            "Power(sim): suspend {} s (scaled to {} ms)",
            duration.as_secs(),
            scaled.as_millis()
        );
        std::thread::sleep(scaled);
        self.slept += duration;
        SIM_WAKE_CAUSE.store(1, Ordering::Relaxed);
    }
}
