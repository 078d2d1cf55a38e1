//! Per-cycle context threaded through every phase handler.
//!
//! `CycleContext` is the blackboard for one wake cycle: borrowed
//! collaborators (hardware, baseline store, event sink) and the configured
//! components on one side, the values each phase produces on the other.
//! It lives exactly as long as the cycle.  Nothing in here survives sleep
//! except what COMMIT writes through the store.

use core::time::Duration;

use crate::app::ports::StorageError;
use crate::baseline::PersistedBaseline;
use crate::config::NodeConfig;
use crate::decision::{Decision, DeltaDecisionEngine};
use crate::error::{CommsError, SensorFault};
use crate::reading::Reading;
use crate::schedule::ScheduleController;
use crate::sensors::SignalAcquisition;

/// Outcome of the TRANSMIT phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// The cycle never reached TRANSMIT.
    #[default]
    NotAttempted,
    /// The gateway confirmed delivery.
    Delivered { attempts: u8 },
    /// Connect retries ran out, publish went unconfirmed, or encoding failed.
    Failed { error: CommsError, attempts: u8 },
}

impl Delivery {
    pub const fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

pub struct CycleContext<'a, H, S, E> {
    // --- Collaborators ---
    pub hw: &'a mut H,
    pub store: &'a mut S,
    pub sink: &'a mut E,

    // --- Configured components ---
    pub config: &'a NodeConfig,
    pub acquisition: &'a SignalAcquisition,
    pub engine: &'a DeltaDecisionEngine,
    pub schedule: &'a ScheduleController,

    // --- Produced during the cycle ---
    pub baseline: PersistedBaseline,
    pub reading: Option<Reading>,
    pub fault: Option<SensorFault>,
    pub decision: Option<Decision>,
    pub delivery: Delivery,
    pub committed: bool,
    pub commit_error: Option<StorageError>,
    pub sleep_for: Option<Duration>,
}

impl<'a, H, S, E> CycleContext<'a, H, S, E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        hw: &'a mut H,
        store: &'a mut S,
        sink: &'a mut E,
        config: &'a NodeConfig,
        acquisition: &'a SignalAcquisition,
        engine: &'a DeltaDecisionEngine,
        schedule: &'a ScheduleController,
    ) -> Self {
        Self {
            hw,
            store,
            sink,
            config,
            acquisition,
            engine,
            schedule,
            baseline: PersistedBaseline::COLD_START,
            reading: None,
            fault: None,
            decision: None,
            delivery: Delivery::NotAttempted,
            committed: false,
            commit_error: None,
            sleep_for: None,
        }
    }

    /// Battery value SCHEDULE works from: the current reading, or the
    /// configured assumption when SAMPLE faulted.
    pub fn schedule_volts(&self) -> f32 {
        self.reading
            .map_or(self.config.fault_battery_volts, |r| r.battery)
    }
}
