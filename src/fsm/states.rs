//! Concrete phase handlers and table builder.
//!
//! Each phase is three plain `fn` pointers, monomorphised per collaborator
//! set.  The work of a phase happens in `on_update`, which also names the
//! next phase; `on_enter` is used where a phase must act the moment it is
//! entered (loading the baseline, suspending).
//!
//! ```text
//!  WAKE ─▶ SAMPLE ─┬─▶ DECIDE ─┬─▶ TRANSMIT ─┐
//!                  │           └─▶ SKIP ─────┴─▶ COMMIT ─┐
//!                  │                                     ▼
//!                  └──────[sensor fault]──────────▶ SCHEDULE ─▶ SLEEP
//! ```

use log::{debug, error, info, warn};

use super::context::{CycleContext, Delivery};
use super::{Phase, PhaseDescriptor};
use crate::app::events::AppEvent;
use crate::app::ports::{BaselineStore, EventSink, NodeHardware};
use crate::baseline::PersistedBaseline;
use crate::error::CommsError;
use crate::telemetry::TelemetryPayload;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the phase table for one collaborator set.
pub fn build_phase_table<'a, H, S, E>() -> [PhaseDescriptor<CycleContext<'a, H, S, E>>; Phase::COUNT]
where
    H: NodeHardware,
    S: BaselineStore,
    E: EventSink,
{
    [
        PhaseDescriptor {
            phase: Phase::Wake,
            name: "Wake",
            on_enter: Some(wake_enter),
            on_exit: None,
            on_update: wake_update,
        },
        PhaseDescriptor {
            phase: Phase::Sample,
            name: "Sample",
            on_enter: None,
            on_exit: None,
            on_update: sample_update,
        },
        PhaseDescriptor {
            phase: Phase::Decide,
            name: "Decide",
            on_enter: None,
            on_exit: None,
            on_update: decide_update,
        },
        PhaseDescriptor {
            phase: Phase::Transmit,
            name: "Transmit",
            on_enter: None,
            on_exit: Some(transmit_exit),
            on_update: transmit_update,
        },
        PhaseDescriptor {
            phase: Phase::Skip,
            name: "Skip",
            on_enter: None,
            on_exit: None,
            on_update: skip_update,
        },
        PhaseDescriptor {
            phase: Phase::Commit,
            name: "Commit",
            on_enter: None,
            on_exit: None,
            on_update: commit_update,
        },
        PhaseDescriptor {
            phase: Phase::Schedule,
            name: "Schedule",
            on_enter: None,
            on_exit: None,
            on_update: schedule_update,
        },
        PhaseDescriptor {
            phase: Phase::Sleep,
            name: "Sleep",
            on_enter: Some(sleep_enter),
            on_exit: None,
            on_update: sleep_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  WAKE
// ═══════════════════════════════════════════════════════════════════════════

fn wake_enter<H, S: BaselineStore, E: EventSink>(ctx: &mut CycleContext<'_, H, S, E>) {
    ctx.baseline = ctx.store.load();
    let scope = ctx.store.scope();
    info!(
        "WAKE: baseline T={:.2} M={:.2} ({:?})",
        ctx.baseline.last_temperature, ctx.baseline.last_moisture, scope
    );
    ctx.sink.emit(&AppEvent::CycleStarted {
        baseline: ctx.baseline,
        scope,
    });
}

fn wake_update<H, S, E>(_ctx: &mut CycleContext<'_, H, S, E>) -> Option<Phase> {
    Some(Phase::Sample)
}

// ═══════════════════════════════════════════════════════════════════════════
//  SAMPLE
// ═══════════════════════════════════════════════════════════════════════════

fn sample_update<H: NodeHardware, S, E: EventSink>(
    ctx: &mut CycleContext<'_, H, S, E>,
) -> Option<Phase> {
    match ctx.acquisition.acquire(&mut *ctx.hw) {
        Ok(reading) => {
            info!(
                "SAMPLE: T={:.2}C RH={:.1}% M={:.1}% L={:.1}lx B={:.2}V",
                reading.temperature,
                reading.humidity,
                reading.moisture,
                reading.light,
                reading.battery
            );
            ctx.reading = Some(reading);
            ctx.sink.emit(&AppEvent::Sampled(reading));
            Some(Phase::Decide)
        }
        Err(fault) => {
            warn!(
                "SAMPLE: {}, scheduling with {:.2} V",
                fault, ctx.config.fault_battery_volts
            );
            ctx.fault = Some(fault);
            ctx.sink.emit(&AppEvent::SensorFault(fault));
            Some(Phase::Schedule)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  DECIDE
// ═══════════════════════════════════════════════════════════════════════════

fn decide_update<H, S, E: EventSink>(ctx: &mut CycleContext<'_, H, S, E>) -> Option<Phase> {
    let Some(reading) = ctx.reading else {
        warn!("DECIDE: no reading, skipping to Schedule");
        return Some(Phase::Schedule);
    };
    let decision = ctx.engine.decide(&reading, &ctx.baseline);
    for d in &decision.deltas {
        debug!(
            "DECIDE: {} |{:.2} - {:.2}| = {:.2} vs {:.2} -> {}",
            d.field, d.current, d.baseline, d.delta, d.threshold, d.changed
        );
    }
    let next = if decision.transmit {
        Phase::Transmit
    } else {
        Phase::Skip
    };
    info!("DECIDE: transmit={}", decision.transmit);
    ctx.sink.emit(&AppEvent::Decided(decision.clone()));
    ctx.decision = Some(decision);
    Some(next)
}

// ═══════════════════════════════════════════════════════════════════════════
//  TRANSMIT — bounded connect retry, single confirmed publish
// ═══════════════════════════════════════════════════════════════════════════

fn transmit_update<H: NodeHardware, S, E: EventSink>(
    ctx: &mut CycleContext<'_, H, S, E>,
) -> Option<Phase> {
    let Some(reading) = ctx.reading else {
        return Some(Phase::Commit);
    };

    let delivery = match TelemetryPayload::from(&reading).encode() {
        Ok(payload) => deliver(ctx, &payload),
        Err(e) => Delivery::Failed {
            error: e,
            attempts: 0,
        },
    };
    ctx.delivery = delivery;

    match ctx.delivery {
        Delivery::Delivered { attempts } => {
            info!("TRANSMIT: delivered after {} connect attempt(s)", attempts);
            ctx.sink.emit(&AppEvent::Transmitted { attempts });
        }
        Delivery::Failed { error, attempts } => {
            warn!("TRANSMIT: {} (attempts={}), baseline kept", error, attempts);
            ctx.sink
                .emit(&AppEvent::TransmitFailed { error, attempts });
        }
        Delivery::NotAttempted => {}
    }
    Some(Phase::Commit)
}

fn deliver<H: NodeHardware, S, E>(ctx: &mut CycleContext<'_, H, S, E>, payload: &[u8]) -> Delivery {
    let config = ctx.config;
    let connect = config.retry.run(&mut *ctx.hw, |hw, attempt| {
        debug!("TRANSMIT: connect attempt {}", attempt);
        hw.connect(&config.network)
    });
    let attempts = connect.attempts;
    if connect.result.is_err() {
        return Delivery::Failed {
            error: CommsError::RetriesExhausted { attempts },
            attempts,
        };
    }
    match ctx.hw.publish(&config.network.publish_topic, payload) {
        Ok(()) => Delivery::Delivered { attempts },
        Err(error) => Delivery::Failed { error, attempts },
    }
}

fn transmit_exit<H: NodeHardware, S, E>(ctx: &mut CycleContext<'_, H, S, E>) {
    // Radio off before the rest of the cycle, success or not.
    ctx.hw.disconnect();
}

// ═══════════════════════════════════════════════════════════════════════════
//  SKIP
// ═══════════════════════════════════════════════════════════════════════════

fn skip_update<H, S, E: EventSink>(ctx: &mut CycleContext<'_, H, S, E>) -> Option<Phase> {
    info!("SKIP: change within deadband, radio stays off");
    ctx.sink.emit(&AppEvent::Skipped);
    Some(Phase::Commit)
}

// ═══════════════════════════════════════════════════════════════════════════
//  COMMIT — only after confirmed delivery
// ═══════════════════════════════════════════════════════════════════════════

fn commit_update<H, S: BaselineStore, E: EventSink>(
    ctx: &mut CycleContext<'_, H, S, E>,
) -> Option<Phase> {
    let (true, Some(reading)) = (ctx.delivery.is_delivered(), ctx.reading) else {
        debug!("COMMIT: no-op ({:?})", ctx.delivery);
        return Some(Phase::Schedule);
    };
    match ctx.store.commit(&reading) {
        Ok(()) => {
            ctx.committed = true;
            let baseline = PersistedBaseline::from_reading(&reading);
            info!(
                "COMMIT: baseline now T={:.2} M={:.2}",
                baseline.last_temperature, baseline.last_moisture
            );
            ctx.sink.emit(&AppEvent::BaselineCommitted(baseline));
        }
        Err(e) => {
            error!("COMMIT: baseline write failed: {}", e);
            ctx.commit_error = Some(e);
            ctx.sink.emit(&AppEvent::CommitFailed(e));
        }
    }
    Some(Phase::Schedule)
}

// ═══════════════════════════════════════════════════════════════════════════
//  SCHEDULE
// ═══════════════════════════════════════════════════════════════════════════

fn schedule_update<H, S, E: EventSink>(ctx: &mut CycleContext<'_, H, S, E>) -> Option<Phase> {
    let volts = ctx.schedule_volts();
    let duration = ctx.schedule.next_sleep(volts);
    info!("SCHEDULE: {:.2} V -> sleep {} s", volts, duration.as_secs());
    ctx.sleep_for = Some(duration);
    ctx.sink.emit(&AppEvent::SleepScheduled {
        duration,
        battery_volts: volts,
    });
    Some(Phase::Sleep)
}

// ═══════════════════════════════════════════════════════════════════════════
//  SLEEP — terminal
// ═══════════════════════════════════════════════════════════════════════════

fn sleep_enter<H: NodeHardware, S, E: EventSink>(ctx: &mut CycleContext<'_, H, S, E>) {
    let duration = match ctx.sleep_for {
        Some(d) => d,
        None => {
            warn!("SLEEP: no schedule chosen, using fallback");
            ctx.schedule.fallback()
        }
    };
    ctx.sleep_for = Some(duration);
    ctx.sink.emit(&AppEvent::Suspending(duration));
    ctx.hw.suspend(duration);
}

fn sleep_update<H, S, E>(_ctx: &mut CycleContext<'_, H, S, E>) -> Option<Phase> {
    None
}
