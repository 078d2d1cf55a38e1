//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the wake-cycle business rules: phase sequencing,
//! the transmit path with bounded retries, and the commit-on-delivery
//! policy.  All interaction with hardware happens through **port traits**
//! defined in [`ports`], keeping this layer fully testable without real
//! peripherals.

pub mod events;
pub mod orchestrator;
pub mod ports;
