//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements          | Connects to                  |
//! |-------------|---------------------|------------------------------|
//! | `hardware`  | SensorPort, DelayNs | DHT22, BH1750, ADC1, TWDT    |
//! | `sim`       | SensorPort, DelayNs | Host simulation (no HW)      |
//! | `gateway`   | GatewayPort         | ESP-IDF WiFi STA + MQTT/TLS  |
//! | `node`      | NodeHardware        | sensors + gateway + power    |
//! | `log_sink`  | EventSink           | Serial log output            |
//! | `nvs`       | ConfigPort          | NVS / in-memory store        |
//! |             | StoragePort         |                              |
//! | `time`      | —                   | ESP32 system timer           |
//! | `device_id` | —                   | eFuse factory MAC            |

pub mod device_id;
pub mod gateway;
pub mod hardware;
pub mod log_sink;
pub mod node;
pub mod nvs;
#[cfg(not(target_os = "espidf"))]
pub mod sim;
pub mod time;
