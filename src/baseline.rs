//! Persisted baseline — the last *delivered* reading.
//!
//! This is the only state that crosses a wake cycle.  Two backends with
//! different retention guarantees:
//!
//! | Backend            | Lives in               | Survives deep sleep | Survives power loss |
//! |--------------------|------------------------|---------------------|---------------------|
//! | [`RtcBaselineStore`] | RTC slow memory (`.rtc.data`) | yes        | no (reset to cold start) |
//! | [`NvsBaselineStore`] | NVS flash partition    | yes                 | yes                 |
//!
//! The RTC image is sealed with a magic word and a truncated SHA-256 digest
//! of its contents.  Anything that fails to unseal (first boot, brown-out
//! garbage, a half-written slot) loads as [`PersistedBaseline::COLD_START`].
//!
//! There is exactly one reader and one writer per wake cycle, and the store
//! is only reachable through the `&mut` the cycle owns, so no locking is
//! needed.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{BaselineStore, StorageError, StoragePort};
use crate::reading::{Field, Reading};

/// How far the baseline survives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetentionScope {
    /// RTC slow memory: kept across deep sleep, lost on power-on reset.
    #[default]
    DeepSleep,
    /// Flash: kept across power loss.
    PowerLoss,
}

/// Last delivered value of every field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct PersistedBaseline {
    pub last_temperature: f32,
    pub last_humidity: f32,
    pub last_moisture: f32,
    pub last_light: f32,
    pub last_battery: f32,
}

impl Default for PersistedBaseline {
    fn default() -> Self {
        Self::COLD_START
    }
}

impl PersistedBaseline {
    /// First boot: every field 0.0.
    pub const COLD_START: Self = Self {
        last_temperature: 0.0,
        last_humidity: 0.0,
        last_moisture: 0.0,
        last_light: 0.0,
        last_battery: 0.0,
    };

    pub fn get(&self, field: Field) -> f32 {
        match field {
            Field::Temperature => self.last_temperature,
            Field::Humidity => self.last_humidity,
            Field::Moisture => self.last_moisture,
            Field::Light => self.last_light,
            Field::Battery => self.last_battery,
        }
    }

    /// Every field taken from `r` at once.
    pub fn from_reading(r: &Reading) -> Self {
        Self {
            last_temperature: r.temperature,
            last_humidity: r.humidity,
            last_moisture: r.moisture,
            last_light: r.light,
            last_battery: r.battery,
        }
    }

    fn to_le_bytes(self) -> [u8; 4 * Field::COUNT] {
        let mut out = [0u8; 4 * Field::COUNT];
        for (i, f) in Field::ALL.into_iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&self.get(f).to_le_bytes());
        }
        out
    }
}

// ───────────────────────────────────────────────────────────────
// RTC retained image
// ───────────────────────────────────────────────────────────────

/// `"WILW"` as a little-endian word.
pub const RETAINED_MAGIC: u32 = 0x5749_4C57;

const DIGEST_LEN: usize = 8;

/// Raw layout of the RTC slow-memory slot.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct RetainedSlot {
    pub magic: u32,
    pub baseline: PersistedBaseline,
    pub digest: [u8; DIGEST_LEN],
}

impl RetainedSlot {
    /// Image of a slot that has never been written.
    pub const EMPTY: Self = Self {
        magic: 0,
        baseline: PersistedBaseline::COLD_START,
        digest: [0; DIGEST_LEN],
    };

    fn digest_of(magic: u32, baseline: &PersistedBaseline) -> [u8; DIGEST_LEN] {
        let mut h = hmac_sha256::Hash::new();
        h.update(magic.to_le_bytes());
        h.update(baseline.to_le_bytes());
        let full = h.finalize();
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&full[..DIGEST_LEN]);
        out
    }

    pub fn seal(baseline: PersistedBaseline) -> Self {
        Self {
            magic: RETAINED_MAGIC,
            baseline,
            digest: Self::digest_of(RETAINED_MAGIC, &baseline),
        }
    }

    /// The baseline, if the slot holds an intact image.
    pub fn unseal(&self) -> Option<PersistedBaseline> {
        if self.magic != RETAINED_MAGIC {
            return None;
        }
        (Self::digest_of(self.magic, &self.baseline) == self.digest).then_some(self.baseline)
    }
}

impl Default for RetainedSlot {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Baseline in RTC slow memory.
///
/// Retention: survives deep sleep; a power-on reset re-initialises
/// `.rtc.data` from the image and the node cold-starts.
pub struct RtcBaselineStore<'a> {
    slot: &'a mut RetainedSlot,
}

impl<'a> RtcBaselineStore<'a> {
    pub fn new(slot: &'a mut RetainedSlot) -> Self {
        Self { slot }
    }
}

impl BaselineStore for RtcBaselineStore<'_> {
    fn load(&self) -> PersistedBaseline {
        match self.slot.unseal() {
            Some(b) => b,
            None => {
                if self.slot.magic != 0 {
                    warn!("RtcBaselineStore: retained image failed integrity check, cold start");
                }
                PersistedBaseline::COLD_START
            }
        }
    }

    fn commit(&mut self, reading: &Reading) -> Result<(), StorageError> {
        // Whole-slot assignment: every field changes together.
        *self.slot = RetainedSlot::seal(PersistedBaseline::from_reading(reading));
        Ok(())
    }

    fn scope(&self) -> RetentionScope {
        RetentionScope::DeepSleep
    }
}

#[cfg(target_os = "espidf")]
mod rtc {
    use core::sync::atomic::{AtomicBool, Ordering};

    use super::RetainedSlot;

    #[unsafe(link_section = ".rtc.data")]
    static mut RTC_SLOT: RetainedSlot = RetainedSlot::EMPTY;

    static TAKEN: AtomicBool = AtomicBool::new(false);

    /// Hand out the RTC slot once per boot.
    pub fn take_rtc_slot() -> Option<&'static mut RetainedSlot> {
        if TAKEN.swap(true, Ordering::AcqRel) {
            return None;
        }
        // SAFETY: TAKEN guarantees a single live reference for the
        // lifetime of the process, and nothing else names RTC_SLOT.
        Some(unsafe { &mut *(&raw mut RTC_SLOT) })
    }
}

#[cfg(target_os = "espidf")]
pub use rtc::take_rtc_slot;

// ───────────────────────────────────────────────────────────────
// NVS-backed baseline
// ───────────────────────────────────────────────────────────────

pub const NVS_NAMESPACE: &str = "willow";
pub const NVS_KEY: &str = "baseline";

/// Baseline in NVS flash.
///
/// Retention: survives deep sleep and power loss.  Each commit costs one
/// flash write, which only happens on delivered transmissions.
pub struct NvsBaselineStore<'a, S: StoragePort> {
    storage: &'a mut S,
}

impl<'a, S: StoragePort> NvsBaselineStore<'a, S> {
    pub fn new(storage: &'a mut S) -> Self {
        Self { storage }
    }
}

impl<S: StoragePort> BaselineStore for NvsBaselineStore<'_, S> {
    fn load(&self) -> PersistedBaseline {
        let mut buf = [0u8; 64];
        match self.storage.read(NVS_NAMESPACE, NVS_KEY, &mut buf) {
            Ok(len) => match postcard::from_bytes::<PersistedBaseline>(&buf[..len]) {
                Ok(b) => b,
                Err(_) => {
                    warn!("NvsBaselineStore: stored baseline corrupted, cold start");
                    PersistedBaseline::COLD_START
                }
            },
            Err(StorageError::NotFound) => {
                info!("NvsBaselineStore: no baseline stored, cold start");
                PersistedBaseline::COLD_START
            }
            Err(e) => {
                warn!("NvsBaselineStore: read failed ({}), cold start", e);
                PersistedBaseline::COLD_START
            }
        }
    }

    fn commit(&mut self, reading: &Reading) -> Result<(), StorageError> {
        let mut buf = [0u8; 64];
        let bytes = postcard::to_slice(&PersistedBaseline::from_reading(reading), &mut buf)
            .map_err(|_| StorageError::Codec)?;
        self.storage.write(NVS_NAMESPACE, NVS_KEY, bytes)
    }

    fn scope(&self) -> RetentionScope {
        RetentionScope::PowerLoss
    }
}
