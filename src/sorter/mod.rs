//! # Sorter Module - Global Event Ordering
//!
//! This module maintains the answer to the single question the inner loop
//! asks over and over: *which particle owns the globally earliest pending
//! event?* Each particle's candidate events sit in its own event list; the
//! sorter layers a priority structure over all the list tops.
//!
//! Two interchangeable implementations are provided:
//!
//! - [`TournamentTree`]: a complete binary tournament over all particles.
//!   `O(log N)` updates, no tuning, robust against any event-time
//!   distribution.
//! - [`CalendarQueue`]: a bounded calendar queue — time buckets over a
//!   moving window plus an overflow list, with a small tournament tree over
//!   the current bucket only. `O(1)` amortised updates when the bucket scale
//!   matches the event density; the scale is auto-tuned at `init`.
//!
//! Both store event times *offset by* a rolling accumulator so that
//! advancing the global clock is a single addition (`stream`), and both
//! break equal-time ties deterministically so identical runs replay
//! identical event sequences.

// Complete binary tournament implementation
pub mod tournament;
// Bounded calendar queue implementation
pub mod calendar;

pub use calendar::CalendarQueue;
pub use tournament::TournamentTree;

use crate::error::SimulationError;
use crate::event::Event;
use crate::particle::ParticleId;
use serde::{Deserialize, Serialize};

/// Selects which sorter implementation a run uses. Purely a performance
/// knob: externally visible behaviour is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SorterKind {
    /// Complete binary tournament tree.
    #[serde(alias = "cbt")]
    Tournament,
    /// Bounded priority (calendar) queue.
    #[serde(alias = "bounded-pq", alias = "bpq")]
    Calendar,
}

impl Default for SorterKind {
    fn default() -> Self {
        SorterKind::Calendar
    }
}

/// The global event sorter: a tagged variant over the two implementations.
///
/// ## Contract
///
/// - `push` shifts the event time by the internal accumulator and files it
///   into the particle's event list. It does **not** restore the top-level
///   ordering; callers batch their pushes and finish with `update`.
/// - `update(p)` must be called after anything that may have changed the
///   top of `p`'s list.
/// - `pop_next` pops the winning list's top and restores the top-level
///   invariant itself.
/// - `stream(dt)` advances the sorter clock in `O(1)`.
#[derive(Debug)]
pub enum EventSorter {
    Tournament(TournamentTree),
    Calendar(CalendarQueue),
}

impl EventSorter {
    /// Creates an empty sorter of the requested kind.
    ///
    /// `bucket_override` fixes the calendar queue's list count instead of
    /// auto-tuning it; the tournament tree ignores it.
    pub fn new(kind: SorterKind, bucket_override: Option<usize>) -> Self {
        match kind {
            SorterKind::Tournament => EventSorter::Tournament(TournamentTree::new()),
            SorterKind::Calendar => EventSorter::Calendar(CalendarQueue::new(bucket_override)),
        }
    }

    /// Which implementation this is.
    pub fn kind(&self) -> SorterKind {
        match self {
            EventSorter::Tournament(_) => SorterKind::Tournament,
            EventSorter::Calendar(_) => SorterKind::Calendar,
        }
    }

    /// Discards all state and sizes the sorter for `n` particles.
    pub fn resize(&mut self, n: usize) {
        match self {
            EventSorter::Tournament(s) => s.resize(n),
            EventSorter::Calendar(s) => s.resize(n),
        }
    }

    /// Builds the top-level ordering once every particle's initial events
    /// have been pushed. The calendar queue instruments the pending event
    /// distribution here to choose its bucket scale.
    pub fn init(&mut self) -> Result<(), SimulationError> {
        match self {
            EventSorter::Tournament(s) => {
                s.init();
                Ok(())
            }
            EventSorter::Calendar(s) => s.init(),
        }
    }

    /// Files `event` (time relative to now) into particle `p`'s list.
    pub fn push(&mut self, event: Event, p: ParticleId) {
        match self {
            EventSorter::Tournament(s) => s.push(event, p),
            EventSorter::Calendar(s) => s.push(event, p),
        }
    }

    /// Restores the top-level ordering for particle `p` after its list top
    /// changed.
    pub fn update(&mut self, p: ParticleId) {
        match self {
            EventSorter::Tournament(s) => s.update(p),
            EventSorter::Calendar(s) => s.update(p),
        }
    }

    /// Pops the winning list's top event and restores the invariant.
    /// Returns the popped event with its time expressed relative to now.
    pub fn pop_next(&mut self) -> Event {
        match self {
            EventSorter::Tournament(s) => s.pop_next(),
            EventSorter::Calendar(s) => s.pop_next(),
        }
    }

    /// The particle owning the globally earliest event.
    pub fn next_id(&self) -> ParticleId {
        match self {
            EventSorter::Tournament(s) => s.next_id(),
            EventSorter::Calendar(s) => s.next_id(),
        }
    }

    /// The globally earliest event, time relative to now.
    pub fn next_event(&self) -> Event {
        match self {
            EventSorter::Tournament(s) => s.next_event(),
            EventSorter::Calendar(s) => s.next_event(),
        }
    }

    /// Time until the globally earliest event.
    pub fn next_time(&self) -> f64 {
        self.next_event().time
    }

    /// Kind of the globally earliest event.
    pub fn next_kind(&self) -> crate::event::EventKind {
        self.next_event().kind
    }

    /// Partner of the globally earliest event.
    pub fn next_partner(&self) -> crate::event::EventPartner {
        self.next_event().partner
    }

    /// Counter stamp of the globally earliest event.
    pub fn next_counter(&self) -> u64 {
        self.next_event().counter
    }

    /// Drops every pending event for particle `p`. Callers must follow up
    /// with `update(p)` once the replacement events are pushed.
    pub fn clear_pel(&mut self, p: ParticleId) {
        match self {
            EventSorter::Tournament(s) => s.clear_pel(p),
            EventSorter::Calendar(s) => s.clear_pel(p),
        }
    }

    /// True when particle `p` has no pending events.
    pub fn pel_is_empty(&self, p: ParticleId) -> bool {
        match self {
            EventSorter::Tournament(s) => s.pel_is_empty(p),
            EventSorter::Calendar(s) => s.pel_is_empty(p),
        }
    }

    /// Advances the sorter clock: stored times are interpreted relative to
    /// an accumulator, so this is `O(1)` (the tournament tree periodically
    /// folds the accumulator back into the lists to bound its magnitude).
    pub fn stream(&mut self, dt: f64) {
        match self {
            EventSorter::Tournament(s) => s.stream(dt),
            EventSorter::Calendar(s) => s.stream(dt),
        }
    }

    /// Multiplies every stored time (and the accumulator) by `factor`.
    /// Used on temperature swaps, where all velocities rescale uniformly.
    pub fn rescale_times(&mut self, factor: f64) {
        match self {
            EventSorter::Tournament(s) => s.rescale_times(factor),
            EventSorter::Calendar(s) => s.rescale_times(factor),
        }
    }

    /// Out-of-window push count of the calendar queue; zero for the
    /// tournament tree.
    pub fn exception_count(&self) -> u64 {
        match self {
            EventSorter::Tournament(_) => 0,
            EventSorter::Calendar(s) => s.exception_count(),
        }
    }
}
