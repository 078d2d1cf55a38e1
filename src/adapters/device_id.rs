//! Device identity derived from the ESP32 factory MAC address.
//!
//! Produces a stable, human-readable name in the form `willow-xxyyzz`
//! (last 3 bytes of the 6-byte MAC in lowercase hex).  Used as the MQTT
//! client id when none is configured.

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: writes exactly 6 bytes into `mac`.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Format: `willow-xxyyzz` (lowercase, 13 chars).
pub fn hostname(mac: &MacAddress) -> heapless::String<24> {
    let mut name = heapless::String::<24>::new();
    use core::fmt::Write;
    let _ = write!(name, "willow-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    name
}
