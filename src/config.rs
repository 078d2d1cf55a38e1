//! Node configuration parameters
//!
//! All tunable parameters for the Willow duty-cycle core.
//! Values can be overridden via NVS (non-volatile storage); anything that
//! fails [`NodeConfig::validate`] is rejected and defaults are used instead.

use serde::{Deserialize, Serialize};

use crate::app::ports::{ConfigError, NetworkIdentity};
use crate::baseline::RetentionScope;
use crate::decision::DeltaThresholds;
use crate::reading::Field;
use crate::retry::RetryPolicy;
use crate::schedule::{SleepTiers, default_tiers};
use crate::sensors::battery::BatteryCalibration;
use crate::sensors::moisture::MoistureCalibration;

/// Core node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Sampling ---
    /// Samples averaged per wake cycle (N)
    pub sample_count: u8,
    /// Blocking delay after each sample (milliseconds)
    pub sample_interval_ms: u32,
    /// Raw soil ADC endpoints for the percent-wet remap
    pub moisture: MoistureCalibration,
    /// Battery divider calibration
    pub battery: BatteryCalibration,

    // --- Decision ---
    /// Per-field change thresholds; fields without a threshold never gate
    pub thresholds: DeltaThresholds,

    // --- Schedule ---
    /// Battery tiers, highest threshold first
    pub sleep_tiers: SleepTiers,
    /// Sleep duration when no tier matches (seconds)
    pub fallback_sleep_secs: u32,
    /// Battery assumption used to schedule after a sensor fault (volts)
    pub fault_battery_volts: f32,

    // --- Transmission ---
    /// Bounded connect retry policy
    pub retry: RetryPolicy,
    /// Broker identity and topics
    pub network: NetworkIdentity,

    // --- Platform ---
    /// Which storage backs the baseline across wake cycles
    pub retention: RetentionScope,
    /// Task watchdog timeout covering one whole wake cycle (milliseconds)
    pub watchdog_timeout_ms: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            // Sampling
            sample_count: 5,
            sample_interval_ms: 2000, // 5 × 2 s = 10 s window
            moisture: MoistureCalibration::default(),
            battery: BatteryCalibration::default(),

            // Decision
            thresholds: DeltaThresholds::default(),

            // Schedule
            sleep_tiers: default_tiers(),
            fallback_sleep_secs: 60 * 60, // 60 min
            fault_battery_volts: 0.0,     // always the longest tier

            // Transmission
            retry: RetryPolicy::default(),
            network: NetworkIdentity::default(),

            // Platform
            retention: RetentionScope::DeepSleep,
            watchdog_timeout_ms: 60_000,
        }
    }
}

impl NodeConfig {
    /// Range-check every field.  Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=32).contains(&self.sample_count) {
            return Err(ConfigError::ValidationFailed("sample_count must be 1–32"));
        }
        if self.sample_interval_ms > 60_000 {
            return Err(ConfigError::ValidationFailed(
                "sample_interval_ms must be 0–60000",
            ));
        }

        let adc_max = self.battery.adc_full_scale;
        if adc_max == 0 {
            return Err(ConfigError::ValidationFailed(
                "battery.adc_full_scale must be > 0",
            ));
        }
        if !(self.battery.full_scale_volts > 0.0 && self.battery.full_scale_volts <= 10.0) {
            return Err(ConfigError::ValidationFailed(
                "battery.full_scale_volts must be 0–10",
            ));
        }
        if !(1..=4).contains(&self.battery.cell_count) {
            return Err(ConfigError::ValidationFailed(
                "battery.cell_count must be 1–4",
            ));
        }
        if self.moisture.raw_dry == self.moisture.raw_wet {
            return Err(ConfigError::ValidationFailed(
                "moisture.raw_dry must differ from moisture.raw_wet",
            ));
        }

        for field in Field::ALL {
            if let Some(t) = self.thresholds.get(field) {
                if !t.is_finite() || t < 0.0 {
                    return Err(ConfigError::ValidationFailed(
                        "thresholds must be finite and >= 0",
                    ));
                }
            }
        }

        if !(10..=86_400).contains(&self.fallback_sleep_secs) {
            return Err(ConfigError::ValidationFailed(
                "fallback_sleep_secs must be 10–86400",
            ));
        }
        let mut prev: Option<(f32, u32)> = None;
        for tier in &self.sleep_tiers {
            if !tier.above_volts.is_finite() {
                return Err(ConfigError::ValidationFailed(
                    "sleep tier voltage must be finite",
                ));
            }
            if !(10..=86_400).contains(&tier.sleep_secs) {
                return Err(ConfigError::ValidationFailed(
                    "sleep tier duration must be 10–86400",
                ));
            }
            if let Some((volts, secs)) = prev {
                if tier.above_volts >= volts {
                    return Err(ConfigError::ValidationFailed(
                        "sleep tiers must be ordered by strictly descending voltage",
                    ));
                }
                if tier.sleep_secs < secs {
                    return Err(ConfigError::ValidationFailed(
                        "sleep tier durations must not shrink as voltage falls",
                    ));
                }
            }
            prev = Some((tier.above_volts, tier.sleep_secs));
        }
        if let Some((_, secs)) = prev {
            if self.fallback_sleep_secs < secs {
                return Err(ConfigError::ValidationFailed(
                    "fallback_sleep_secs must be >= every tier duration",
                ));
            }
        }
        if !self.fault_battery_volts.is_finite() {
            return Err(ConfigError::ValidationFailed(
                "fault_battery_volts must be finite",
            ));
        }

        if !(1..=20).contains(&self.retry.max_attempts) {
            return Err(ConfigError::ValidationFailed(
                "retry.max_attempts must be 1–20",
            ));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::ValidationFailed(
                "retry.initial_backoff_ms must be <= retry.max_backoff_ms",
            ));
        }
        if self.retry.max_backoff_total_ms > 120_000 {
            return Err(ConfigError::ValidationFailed(
                "retry.max_backoff_total_ms must be 0–120000",
            ));
        }

        if self.network.broker_url.is_empty() {
            return Err(ConfigError::ValidationFailed("network.broker_url is empty"));
        }
        if self.network.publish_topic.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "network.publish_topic is empty",
            ));
        }

        if !(10_000..=300_000).contains(&self.watchdog_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "watchdog_timeout_ms must be 10000–300000",
            ));
        }
        Ok(())
    }

    /// Blocking time spent inside the sampling window (milliseconds).
    pub fn sampling_window_ms(&self) -> u32 {
        u32::from(self.sample_count).saturating_mul(self.sample_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::SleepTier;

    #[test]
    fn default_config_is_sane() {
        let c = NodeConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.sample_count, 5);
        assert_eq!(c.sampling_window_ms(), 10_000);
        assert_eq!(c.thresholds.get(Field::Temperature), Some(0.5));
        assert_eq!(c.thresholds.get(Field::Moisture), Some(2.0));
        assert_eq!(c.thresholds.get(Field::Humidity), None);
    }

    #[test]
    fn watchdog_covers_sampling_and_retries() {
        let c = NodeConfig::default();
        assert!(
            c.watchdog_timeout_ms > c.sampling_window_ms() + c.retry.max_backoff_total_ms,
            "watchdog must not fire during a healthy cycle"
        );
    }

    #[test]
    fn rejects_zero_sample_count() {
        let c = NodeConfig {
            sample_count: 0,
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn rejects_negative_threshold() {
        let mut c = NodeConfig::default();
        c.thresholds.temperature = Some(-0.1);
        assert!(matches!(c.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn rejects_unordered_tiers() {
        let mut c = NodeConfig::default();
        c.sleep_tiers.clear();
        let _ = c.sleep_tiers.push(SleepTier {
            above_volts: 3.8,
            sleep_secs: 600,
        });
        let _ = c.sleep_tiers.push(SleepTier {
            above_volts: 4.0,
            sleep_secs: 300,
        });
        assert!(matches!(c.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn rejects_duration_shrinking_with_voltage() {
        let mut c = NodeConfig::default();
        c.sleep_tiers.clear();
        let _ = c.sleep_tiers.push(SleepTier {
            above_volts: 4.0,
            sleep_secs: 900,
        });
        let _ = c.sleep_tiers.push(SleepTier {
            above_volts: 3.8,
            sleep_secs: 300,
        });
        assert!(matches!(c.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn rejects_fallback_shorter_than_tier() {
        let c = NodeConfig {
            fallback_sleep_secs: 60,
            ..Default::default()
        };
        assert!(matches!(c.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn rejects_zero_retry_attempts() {
        let mut c = NodeConfig::default();
        c.retry.max_attempts = 0;
        assert!(matches!(c.validate(), Err(ConfigError::ValidationFailed(_))));
    }

    #[test]
    fn serde_roundtrip() {
        let c = NodeConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: NodeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c, c2);
    }

    #[test]
    fn postcard_roundtrip() {
        let c = NodeConfig::default();
        let bytes = postcard::to_allocvec(&c).unwrap();
        let c2: NodeConfig = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(c.sleep_tiers, c2.sleep_tiers);
        assert_eq!(c.network.publish_topic, c2.network.publish_topic);
        assert!((c.fault_battery_volts - c2.fault_battery_volts).abs() < 0.001);
    }
}
