//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern ported to Rust:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  PhaseTable                                              │
//! │  ┌──────────┬───────────┬──────────┬─────────────────┐   │
//! │  │ Phase    │ on_enter  │ on_exit  │ on_update       │   │
//! │  ├──────────┼───────────┼──────────┼─────────────────┤   │
//! │  │ Wake     │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option │   │
//! │  │ Sample   │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option │   │
//! │  │ ...      │           │          │                 │   │
//! │  │ Sleep    │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option │   │
//! │  └──────────┴───────────┴──────────┴─────────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** phase.
//! If it returns `Some(next)`, the engine runs `on_exit` for the
//! current phase, then `on_enter` for the next, and updates the
//! current pointer.  The engine is generic over the context type so the
//! same table machinery drives a cycle over real hardware or mocks.
//!
//! A wake cycle is one pass from `Wake` to the terminal `Sleep` phase;
//! [`Fsm::run_to_completion`] enforces a step budget so a misrouted
//! handler can never keep the node awake.

pub mod context;
pub mod states;

use log::{info, warn};

// ---------------------------------------------------------------------------
// Phase identity
// ---------------------------------------------------------------------------

/// Every phase of a wake cycle.
/// Must stay in sync with the table built in [`states::build_phase_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Phase {
    Wake = 0,
    Sample = 1,
    Decide = 2,
    Transmit = 3,
    Skip = 4,
    Commit = 5,
    Schedule = 6,
    Sleep = 7,
}

impl Phase {
    /// Total number of phases, used to size the table array.
    pub const COUNT: usize = 8;

    /// Convert an index back to `Phase`.  Out-of-range indices assert in
    /// debug builds and map to `Sleep` in release.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Wake,
            1 => Self::Sample,
            2 => Self::Decide,
            3 => Self::Transmit,
            4 => Self::Skip,
            5 => Self::Commit,
            6 => Self::Schedule,
            7 => Self::Sleep,
            _ => {
                debug_assert!(false, "invalid phase index: {idx}");
                Self::Sleep
            }
        }
    }

    /// Sleep ends the process instance.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Sleep)
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type PhaseActionFn<C> = fn(&mut C);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type PhaseUpdateFn<C> = fn(&mut C) -> Option<Phase>;

/// One row in the phase table.
pub struct PhaseDescriptor<C> {
    pub phase: Phase,
    pub name: &'static str,
    pub on_enter: Option<PhaseActionFn<C>>,
    pub on_exit: Option<PhaseActionFn<C>>,
    pub on_update: PhaseUpdateFn<C>,
}

/// Capacity of the per-cycle phase trace.
pub const TRACE_CAPACITY: usize = 16;

pub type PhaseTrace = heapless::Vec<Phase, TRACE_CAPACITY>;

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm<C> {
    /// Fixed-size table indexed by `Phase as usize`.
    table: [PhaseDescriptor<C>; Phase::COUNT],
    current: usize,
    tick_count: u32,
    /// Every phase entered, in order.
    trace: PhaseTrace,
}

impl<C> Fsm<C> {
    pub fn new(table: [PhaseDescriptor<C>; Phase::COUNT], initial: Phase) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
            trace: PhaseTrace::new(),
        }
    }

    /// Run the initial `on_enter`.  Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut C) {
        info!("FSM starting in phase: {}", self.table[self.current].name);
        self.record(Phase::from_index(self.current));
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Call `on_update` for the current phase and follow its transition.
    pub fn tick(&mut self, ctx: &mut C) {
        self.tick_count += 1;
        let next = (self.table[self.current].on_update)(ctx);
        if let Some(next) = next {
            self.transition(next, ctx);
        }
    }

    /// Jump to `next` regardless of what `on_update` would return.
    pub fn force_transition(&mut self, next: Phase, ctx: &mut C) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    /// Start, then tick until a terminal phase or `max_steps` ticks.
    ///
    /// If the budget runs out first the machine is forced into `Sleep`.
    pub fn run_to_completion(&mut self, ctx: &mut C, max_steps: u32) {
        self.start(ctx);
        while !self.current_phase().is_terminal() {
            if self.tick_count >= max_steps {
                warn!(
                    "FSM: step budget {} spent in {}, forcing Sleep",
                    max_steps, self.table[self.current].name
                );
                self.force_transition(Phase::Sleep, ctx);
                break;
            }
            self.tick(ctx);
        }
    }

    pub fn current_phase(&self) -> Phase {
        Phase::from_index(self.current)
    }

    pub fn ticks(&self) -> u32 {
        self.tick_count
    }

    pub fn trace(&self) -> &PhaseTrace {
        &self.trace
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn record(&mut self, phase: Phase) {
        if self.trace.push(phase).is_err() {
            warn!("FSM: phase trace full, dropping {:?}", phase);
        }
    }

    fn transition(&mut self, next: Phase, ctx: &mut C) {
        let next_idx = next as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.record(next);

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
