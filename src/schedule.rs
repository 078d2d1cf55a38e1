//! Energy-aware sleep scheduling.
//!
//! An ordered list of `(above_volts, sleep_secs)` tiers, highest threshold
//! first, plus a fallback.  The first tier whose threshold the battery
//! *strictly* exceeds wins:
//!
//! ```text
//!   volts > 4.0  →  5 min
//!   otherwise    →  60 min (fallback)
//! ```
//!
//! So exactly 4.0 V takes the fallback.  NaN never exceeds anything and
//! lands on the fallback as well.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::NodeConfig;

/// Upper bound on configured tiers.
pub const MAX_SLEEP_TIERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepTier {
    /// Battery must be strictly above this (volts).
    pub above_volts: f32,
    pub sleep_secs: u32,
}

pub type SleepTiers = heapless::Vec<SleepTier, MAX_SLEEP_TIERS>;

/// One tier: above 4.0 V sleep 5 minutes.
pub fn default_tiers() -> SleepTiers {
    let mut tiers = SleepTiers::new();
    let _ = tiers.push(SleepTier {
        above_volts: 4.0,
        sleep_secs: 5 * 60,
    });
    tiers
}

#[derive(Debug, Clone)]
pub struct ScheduleController {
    tiers: SleepTiers,
    fallback: Duration,
}

impl ScheduleController {
    /// Tiers are re-sorted highest threshold first.
    pub fn new(mut tiers: SleepTiers, fallback_secs: u32) -> Self {
        tiers.sort_unstable_by(|a, b| b.above_volts.total_cmp(&a.above_volts));
        Self {
            tiers,
            fallback: Duration::from_secs(u64::from(fallback_secs)),
        }
    }

    pub fn from_config(config: &NodeConfig) -> Self {
        Self::new(config.sleep_tiers.clone(), config.fallback_sleep_secs)
    }

    pub fn next_sleep(&self, battery_volts: f32) -> Duration {
        self.tiers
            .iter()
            .find(|t| battery_volts > t.above_volts)
            .map_or(self.fallback, |t| {
                Duration::from_secs(u64::from(t.sleep_secs))
            })
    }

    pub fn fallback(&self) -> Duration {
        self.fallback
    }

    pub fn tiers(&self) -> &[SleepTier] {
        &self.tiers
    }
}
