//! Willow telemetry node firmware library.
//!
//! Exposes the duty-cycle decision core (acquisition, baseline store,
//! delta decision, sleep scheduling, cycle orchestration) for integration
//! testing and host simulation. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod baseline;
pub mod config;
pub mod decision;
pub mod error;
pub mod fsm;
pub mod power;
pub mod reading;
pub mod retry;
pub mod schedule;
pub mod sensors;
pub mod telemetry;

pub mod pins;

// The adapters and drivers compile on every target; the hardware-facing
// halves are cfg-gated inside.
pub mod adapters;
pub mod drivers;
