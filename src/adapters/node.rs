//! Node adapter — one value that satisfies every hardware-side port.
//!
//! The orchestrator takes a single [`NodeHardware`](crate::app::ports::NodeHardware)
//! bound.  `NodeAdapter` assembles it from three independent parts: the
//! sensing hardware (which also owns the blocking delay), the transmission
//! gateway, and power management.

use core::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::app::ports::{GatewayPort, NetworkIdentity, SensorPort, SuspendPort};
use crate::error::CommsError;
use crate::sensors::RawSample;

pub struct NodeAdapter<S, G, P> {
    pub sensors: S,
    pub gateway: G,
    pub power: P,
}

impl<S, G, P> NodeAdapter<S, G, P> {
    pub fn new(sensors: S, gateway: G, power: P) -> Self {
        Self {
            sensors,
            gateway,
            power,
        }
    }
}

impl<S: SensorPort, G, P> SensorPort for NodeAdapter<S, G, P> {
    fn sample(&mut self) -> RawSample {
        self.sensors.sample()
    }

    fn sample_battery(&mut self) -> f32 {
        self.sensors.sample_battery()
    }
}

impl<S, G: GatewayPort, P> GatewayPort for NodeAdapter<S, G, P> {
    fn connect(&mut self, identity: &NetworkIdentity) -> Result<(), CommsError> {
        self.gateway.connect(identity)
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        self.gateway.publish(topic, payload)
    }

    fn disconnect(&mut self) {
        self.gateway.disconnect();
    }
}

impl<S, G, P: SuspendPort> SuspendPort for NodeAdapter<S, G, P> {
    fn suspend(&mut self, duration: Duration) {
        self.power.suspend(duration);
    }
}

impl<S: DelayNs, G, P> DelayNs for NodeAdapter<S, G, P> {
    fn delay_ns(&mut self, ns: u32) {
        self.sensors.delay_ns(ns);
    }

    fn delay_us(&mut self, us: u32) {
        self.sensors.delay_us(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.sensors.delay_ms(ms);
    }
}
