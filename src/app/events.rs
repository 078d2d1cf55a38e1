//! Outbound application events.
//!
//! The cycle phases emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, record for tests, etc.

use core::time::Duration;

use crate::app::ports::StorageError;
use crate::baseline::{PersistedBaseline, RetentionScope};
use crate::decision::Decision;
use crate::error::{CommsError, SensorFault};
use crate::reading::Reading;

/// Structured events emitted once per phase of a wake cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// WAKE loaded the baseline.
    CycleStarted {
        baseline: PersistedBaseline,
        scope: RetentionScope,
    },

    /// SAMPLE produced a filtered reading.
    Sampled(Reading),

    /// SAMPLE failed; the cycle jumps to SCHEDULE.
    SensorFault(SensorFault),

    /// DECIDE compared the reading against the baseline.
    Decided(Decision),

    /// TRANSMIT delivered the reading.
    Transmitted { attempts: u8 },

    /// TRANSMIT gave up for this cycle.
    TransmitFailed { error: CommsError, attempts: u8 },

    /// The decision suppressed transmission.
    Skipped,

    /// COMMIT overwrote the baseline.
    BaselineCommitted(PersistedBaseline),

    /// COMMIT could not persist the baseline.
    CommitFailed(StorageError),

    /// SCHEDULE chose the next sleep.
    SleepScheduled {
        duration: Duration,
        battery_volts: f32,
    },

    /// SLEEP is about to suspend the node.
    Suspending(Duration),
}
