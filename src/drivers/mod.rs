//! Sensor drivers, hardware initialisation, and peripheral helpers.

pub mod bh1750;
pub mod dht22;
pub mod hw_init;
pub mod watchdog;
