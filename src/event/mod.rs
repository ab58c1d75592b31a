//! # Event Module - Predicted Event Descriptors
//!
//! This module defines the value types the whole scheduling machinery trades
//! in: the event descriptor (one predicted future event for one particle)
//! and the per-particle event list, a small heap of descriptors ordered by
//! event time.
//!
//! Descriptors are cheap, `Copy`, and carry a *counter stamp*: the partner's
//! collision counter at prediction time. A descriptor whose stamp no longer
//! matches the partner's live counter is stale and is discarded when it
//! surfaces, which is the engine's only invalidation mechanism.

// Per-particle event list
pub mod pel;
// Unit tests
pub mod tests;

pub use pel::EventList;

use crate::particle::ParticleId;
use std::cmp::Ordering;

/// Classification of a predicted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EventKind {
    /// Two particles collide.
    PairInteraction,
    /// A particle crosses one face of its current cell.
    CellBoundary,
    /// A particle hits a wall-like local object.
    LocalObject,
    /// An event raised by a registered global source.
    GlobalEvent,
    /// A periodic whole-system event (ticker, snapshot).
    SystemEvent,
    /// Carries no physics but forces a re-prediction for the particle.
    Virtual,
    /// "Never": the top of an empty event list. Never stored in a list.
    None,
}

/// The other party of a predicted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EventPartner {
    /// A partner particle, for pair interactions.
    Particle(ParticleId),
    /// A wall, cell face, global or system source, by its own id space.
    Object(usize),
    /// No partner.
    None,
}

impl EventPartner {
    /// Collapses the partner into a sortable rank used only for
    /// deterministic tie-breaking between equal-time events.
    fn rank(&self) -> (u8, usize) {
        match *self {
            EventPartner::Particle(id) => (0, id),
            EventPartner::Object(id) => (1, id),
            EventPartner::None => (2, 0),
        }
    }
}

/// One predicted event for one particle.
///
/// `time` is expressed in the frame of whatever container holds the
/// descriptor: relative to "now" when it is created, offset by the sorter's
/// accumulator while stored there. Ordering is strictly by time with
/// deterministic tie-breaking, so identical runs replay identical event
/// sequences.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    /// Event time (see above for the frame).
    pub time: f64,
    /// What kind of event this is.
    pub kind: EventKind,
    /// Partner's collision counter at prediction time.
    pub counter: u64,
    /// The other party.
    pub partner: EventPartner,
}

impl Event {
    /// Creates a new descriptor.
    pub fn new(time: f64, kind: EventKind, counter: u64, partner: EventPartner) -> Self {
        Event {
            time,
            kind,
            counter,
            partner,
        }
    }

    /// The "never happens" descriptor: infinite time, kind `None`.
    ///
    /// # Examples
    /// ```
    /// # use edmd_lib::event::{Event, EventKind};
    /// let never = Event::never();
    /// assert_eq!(never.kind, EventKind::None);
    /// assert!(never.time.is_infinite());
    /// ```
    pub fn never() -> Self {
        Event {
            time: f64::INFINITY,
            kind: EventKind::None,
            counter: 0,
            partner: EventPartner::None,
        }
    }

    /// True for descriptors that will never fire.
    pub fn is_never(&self) -> bool {
        self.kind == EventKind::None
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    /// Total order: by time (IEEE total ordering, so NaN sorts last instead
    /// of poisoning comparisons), ties broken by partner then counter.
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.partner.rank().cmp(&other.partner.rank()))
            .then_with(|| self.counter.cmp(&other.counter))
    }
}
