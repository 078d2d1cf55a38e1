//! One-shot ADC1 initialisation and raw reads.
//!
//! Configures the soil and battery channels using raw ESP-IDF sys calls.
//! Called once from `main()` before the first wake cycle.  On host
//! targets the reads come from simulation atomics instead.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use crate::error::Result;

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
        }
    }
}

/// ADC1 channel wired to the soil probe (GPIO 34).
pub const ADC1_CH_SOIL: u32 = 6;
/// ADC1 channel wired to the battery divider (GPIO 35).
pub const ADC1_CH_BATTERY: u32 = 7;

// ── ESP-IDF (oneshot driver) ──────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only after `init_adc()` from the single main task.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
pub fn init_adc() -> Result<()> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK {
        return Err(HwInitError::AdcInitFailed(ret).into());
    }

    // 12 dB attenuation: ~0–3.1 V input span, 12-bit result.
    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    for channel in [ADC1_CH_SOIL, ADC1_CH_BATTERY] {
        // SAFETY: handle initialised above; single-threaded boot path.
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), channel, &chan_cfg) };
        if ret != ESP_OK {
            return Err(HwInitError::AdcInitFailed(ret).into());
        }
    }

    log::info!("hw_init: ADC1 configured (CH6=soil, CH7=battery)");
    Ok(())
}

/// One raw conversion, or `None` if the driver reported an error.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Option<u16> {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract, single main-task access after init.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK {
        return None;
    }
    Some(raw.clamp(0, 4095) as u16)
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicI32, Ordering};

/// Negative means "read fails".
#[cfg(not(target_os = "espidf"))]
static SIM_ADC_SOIL: AtomicI32 = AtomicI32::new(2400);
#[cfg(not(target_os = "espidf"))]
static SIM_ADC_BATTERY: AtomicI32 = AtomicI32::new(2048);

#[cfg(not(target_os = "espidf"))]
pub fn init_adc() -> Result<()> {
    log::info!("hw_init(sim): ADC init skipped");
    Ok(())
}

/// Set the simulated raw value for `channel`; `None` makes reads fail.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc(channel: u32, raw: Option<u16>) {
    let v = raw.map_or(-1, i32::from);
    match channel {
        ADC1_CH_SOIL => SIM_ADC_SOIL.store(v, Ordering::Relaxed),
        ADC1_CH_BATTERY => SIM_ADC_BATTERY.store(v, Ordering::Relaxed),
        _ => {}
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(channel: u32) -> Option<u16> {
    let v = match channel {
        ADC1_CH_SOIL => SIM_ADC_SOIL.load(Ordering::Relaxed),
        ADC1_CH_BATTERY => SIM_ADC_BATTERY.load(Ordering::Relaxed),
        _ => return None,
    };
    u16::try_from(v).ok()
}
