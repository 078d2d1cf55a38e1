//! Cycle orchestrator — the hexagonal core.
//!
//! [`CycleOrchestrator`] owns the configured components and runs one wake
//! cycle per call.  All I/O flows through port traits injected at the call
//! site, so a cycle runs the same against the ESP32 adapters, the host
//! simulation, or test mocks.
//!
//! ```text
//!   SensorPort  ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!   GatewayPort ◀──▶│      CycleOrchestrator       │
//!   SuspendPort ◀── │ acquire · decide · schedule  │ ◀─▶ BaselineStore
//!                   └──────────────────────────────┘
//! ```
//!
//! On the device `run_cycle` does not return: SLEEP suspends into a deep
//! sleep whose wake is a fresh boot.  Under test or simulation the suspend
//! port returns and the caller gets a [`CycleReport`].

use core::time::Duration;

use log::info;

use crate::config::NodeConfig;
use crate::decision::{Decision, DeltaDecisionEngine};
use crate::error::SensorFault;
use crate::fsm::context::{CycleContext, Delivery};
use crate::fsm::states::build_phase_table;
use crate::fsm::{Fsm, Phase, PhaseTrace};
use crate::reading::Reading;
use crate::schedule::ScheduleController;
use crate::sensors::SignalAcquisition;

use super::ports::{BaselineStore, EventSink, NodeHardware, StorageError};

/// Upper bound on FSM ticks per cycle.  A well-routed cycle needs at most
/// seven.
pub const MAX_CYCLE_STEPS: u32 = 12;

/// What one wake cycle did.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Phases entered, in order.
    pub phases: PhaseTrace,
    pub reading: Option<Reading>,
    pub fault: Option<SensorFault>,
    pub decision: Option<Decision>,
    pub delivery: Delivery,
    /// Baseline overwritten this cycle.
    pub committed: bool,
    pub commit_error: Option<StorageError>,
    pub sleep_for: Duration,
}

impl CycleReport {
    /// The decision asked for a transmission.
    pub fn transmitted(&self) -> bool {
        self.decision.as_ref().is_some_and(|d| d.transmit)
    }

    pub fn visited(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }
}

pub struct CycleOrchestrator {
    config: NodeConfig,
    acquisition: SignalAcquisition,
    engine: DeltaDecisionEngine,
    schedule: ScheduleController,
}

impl CycleOrchestrator {
    pub fn new(config: NodeConfig) -> Self {
        let acquisition = SignalAcquisition::from_config(&config);
        let engine = DeltaDecisionEngine::new(config.thresholds);
        let schedule = ScheduleController::from_config(&config);
        Self {
            config,
            acquisition,
            engine,
            schedule,
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Run WAKE through SLEEP once.
    pub fn run_cycle<H, S, E>(&self, hw: &mut H, store: &mut S, sink: &mut E) -> CycleReport
    where
        H: NodeHardware,
        S: BaselineStore,
        E: EventSink,
    {
        let mut ctx = CycleContext::new(
            hw,
            store,
            sink,
            &self.config,
            &self.acquisition,
            &self.engine,
            &self.schedule,
        );
        let mut fsm = Fsm::new(build_phase_table(), Phase::Wake);
        fsm.run_to_completion(&mut ctx, MAX_CYCLE_STEPS);

        let sleep_for = ctx.sleep_for.unwrap_or_else(|| self.schedule.fallback());
        info!(
            "CYCLE: {} ticks, delivery={:?}, committed={}, sleep={} s",
            fsm.ticks(),
            ctx.delivery,
            ctx.committed,
            sleep_for.as_secs()
        );
        CycleReport {
            phases: fsm.trace().clone(),
            reading: ctx.reading,
            fault: ctx.fault,
            decision: ctx.decision,
            delivery: ctx.delivery,
            committed: ctx.committed,
            commit_error: ctx.commit_error,
            sleep_for,
        }
    }
}
