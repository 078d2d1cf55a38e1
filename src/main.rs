//! Willow Firmware — Main Entry Point
//!
//! One process lifetime is one wake cycle: boot, sample, maybe transmit,
//! deep sleep.  The next timer wake is a fresh boot.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   MqttGateway    PowerManager   NvsAdapter    │
//! │  (Sensor+Delay)    (Gateway)      (Suspend)      (Config+NVS)  │
//! │  LogEventSink      RtcBaselineStore / NvsBaselineStore         │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │             CycleOrchestrator (pure logic)             │    │
//! │  │  WAKE · SAMPLE · DECIDE · TRANSMIT/SKIP · COMMIT ·     │    │
//! │  │  SCHEDULE · SLEEP                                      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{info, warn};

use willow::adapters::gateway::MqttGateway;
use willow::adapters::log_sink::LogEventSink;
use willow::adapters::node::NodeAdapter;
use willow::adapters::nvs::NvsAdapter;
use willow::app::orchestrator::{CycleOrchestrator, CycleReport};
use willow::app::ports::ConfigPort;
use willow::baseline::{NvsBaselineStore, RetainedSlot, RetentionScope, RtcBaselineStore};
use willow::config::NodeConfig;
use willow::drivers::hw_init;
use willow::error::Error;
use willow::pins;
use willow::power::PowerManager;

fn banner() {
    info!("╔══════════════════════════════════════╗");
    info!("║  Willow v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");
    info!(
        "Pins: DHT22=GPIO{} SDA=GPIO{} SCL=GPIO{} soil=GPIO{} battery=GPIO{}",
        pins::DHT22_DATA_GPIO,
        pins::I2C_SDA_GPIO,
        pins::I2C_SCL_GPIO,
        pins::SOIL_ADC_GPIO,
        pins::BATTERY_ADC_GPIO
    );
}

fn open_nvs() -> NvsAdapter {
    NvsAdapter::new().unwrap_or_else(|e| {
        // Without NVS the node still runs: defaults, RTC baseline, no
        // credentials.  NVS self-heals on the next boot.
        warn!("{}, running without persistence", Error::from(e));
        NvsAdapter::default()
    })
}

fn load_config(nvs: &NvsAdapter) -> NodeConfig {
    match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded (N={}, retention={:?})", cfg.sample_count, cfg.retention);
            cfg
        }
        Err(e) => {
            warn!("{}, using defaults", Error::from(e));
            NodeConfig::default()
        }
    }
}

fn log_report(cycle: u32, report: &CycleReport) {
    info!(
        "Cycle {}: phases={:?} transmitted={} delivery={:?} committed={} sleep={} s",
        cycle,
        report.phases,
        report.transmitted(),
        report.delivery,
        report.committed,
        report.sleep_for.as_secs()
    );
}

// ── Device ────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
fn main() -> Result<()> {
    use anyhow::anyhow;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::delay::Ets;
    use esp_idf_svc::hal::gpio::PinDriver;
    use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::hal::units::Hertz;
    use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
    use willow::adapters::hardware::HardwareAdapter;
    use willow::baseline::take_rtc_slot;
    use willow::drivers::bh1750::{self, Bh1750};
    use willow::drivers::dht22::Dht22;
    use willow::drivers::watchdog::Watchdog;

    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    banner();

    // ── 2. Config + wake reason ───────────────────────────────
    let mut nvs = open_nvs();
    let config = load_config(&nvs);
    let watchdog = Watchdog::new(config.watchdog_timeout_ms);
    let power = PowerManager::new();
    let wake = power.wake_reason();
    info!("Wake reason: {:?}", wake);

    // ── 3. Peripherals ────────────────────────────────────────
    if let Err(e) = hw_init::init_adc() {
        // Soil and battery then read NaN and the cycle faults to SLEEP.
        log::error!("{}", e);
    }
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    let dht_pin = PinDriver::input_output_od(peripherals.pins.gpio4)?;
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21,
        peripherals.pins.gpio22,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_BAUDRATE_HZ)),
    )?;
    let mut sensors = HardwareAdapter::new(
        Dht22::new(dht_pin),
        Bh1750::new(i2c, bh1750::DEFAULT_ADDRESS),
        Ets,
        watchdog,
    );
    sensors.init();

    let wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sysloop.clone(), None)?,
        sysloop,
    )?;
    let gateway = MqttGateway::new(wifi, nvs.load_gateway_credentials());
    let mut node = NodeAdapter::new(sensors, gateway, power);

    // ── 4. One cycle ──────────────────────────────────────────
    let orchestrator = CycleOrchestrator::new(config);
    let mut sink = LogEventSink::new();
    let report = match orchestrator.config().retention {
        RetentionScope::DeepSleep => {
            let slot = take_rtc_slot().ok_or_else(|| anyhow!("RTC slot already taken"))?;
            if !wake.retains_rtc() {
                *slot = RetainedSlot::EMPTY;
            }
            let mut store = RtcBaselineStore::new(slot);
            orchestrator.run_cycle(&mut node, &mut store, &mut sink)
        }
        RetentionScope::PowerLoss => {
            let mut store = NvsBaselineStore::new(&mut nvs);
            orchestrator.run_cycle(&mut node, &mut store, &mut sink)
        }
    };

    // Deep sleep does not return; getting here means it was refused.
    log_report(0, &report);
    Err(anyhow!("deep sleep returned"))
}

// ── Host simulation ───────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(not(target_os = "espidf"))]
fn main() -> Result<()> {
    use willow::adapters::sim::SimSensors;
    use willow::power::{WakeReason, sim_set_wake_reason};

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    banner();

    let cycles: u32 = env_or("WILLOW_SIM_CYCLES", 3);
    let time_scale: u32 = env_or("WILLOW_SIM_TIME_SCALE", 1000);
    let drift: f32 = env_or("WILLOW_SIM_DRIFT_C", 0.05);

    let mut nvs = open_nvs();
    let ssid = std::env::var("WILLOW_WIFI_SSID").unwrap_or_else(|_| "willow-sim".into());
    let pass = std::env::var("WILLOW_WIFI_PASS").unwrap_or_else(|_| "simulated".into());
    if let Err(e) = nvs.provision_gateway(&ssid, &pass, None) {
        warn!("Sim: could not provision credentials: {}", e);
    }
    let config = load_config(&nvs);
    hw_init::init_adc()?;

    let gateway = MqttGateway::new(nvs.load_gateway_credentials());
    let mut node = NodeAdapter::new(
        SimSensors::new(drift, time_scale),
        gateway,
        PowerManager::with_time_scale(time_scale),
    );
    let orchestrator = CycleOrchestrator::new(config);
    let mut sink = LogEventSink::new();

    // Stands in for RTC slow memory across simulated deep sleeps.
    let mut slot = RetainedSlot::EMPTY;
    sim_set_wake_reason(WakeReason::PowerOn);

    for cycle in 1..=cycles {
        let wake = node.power.wake_reason();
        if !wake.retains_rtc() {
            slot = RetainedSlot::EMPTY;
        }
        let report = match orchestrator.config().retention {
            RetentionScope::DeepSleep => {
                let mut store = RtcBaselineStore::new(&mut slot);
                orchestrator.run_cycle(&mut node, &mut store, &mut sink)
            }
            RetentionScope::PowerLoss => {
                let mut store = NvsBaselineStore::new(&mut nvs);
                orchestrator.run_cycle(&mut node, &mut store, &mut sink)
            }
        };
        log_report(cycle, &report);
    }

    info!(
        "Sim: {} cycles, {} payloads delivered, {} s simulated sleep",
        cycles,
        node.gateway.published().len(),
        node.power.slept().as_secs()
    );
    Ok(())
}
