//! Fatal error type for the simulation engine.
//!
//! The engine never recovers from these internally: they are surfaced upward
//! carrying the simulation context (time, event count, participants) and the
//! binary prints them as a single-line `<invariant>: <data>` diagnostic
//! before exiting non-zero. Recoverable conditions (stale events, calendar
//! queue exceptions) are counters, not errors.

use crate::particle::ParticleId;
use thiserror::Error;

/// A fatal invariant violation inside the engine.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// The next event was scheduled before the current time by more than the
    /// engine tolerance.
    #[error(
        "event time reversal: dt = {dt:.6e} for particle {particle} at t = {time:.9} after {events} events"
    )]
    TimeReversal {
        dt: f64,
        particle: ParticleId,
        time: f64,
        events: u64,
    },

    /// A collaborator produced a NaN event time.
    #[error("non-finite event time: particle {particle} predicted NaN at t = {time:.9}")]
    NonFiniteTime { particle: ParticleId, time: f64 },

    /// The winning event list was empty, which means a cell-boundary
    /// prediction was lost.
    #[error("exhausted event list: no pending events at t = {time:.9} after {events} events")]
    ExhaustedEventList { time: f64, events: u64 },

    /// An event of kind `None` or an unroutable kind surfaced from the
    /// sorter.
    #[error("unroutable event: kind {kind} for particle {particle} at t = {time:.9}")]
    UnroutableEvent {
        kind: &'static str,
        particle: ParticleId,
        time: f64,
    },

    /// A box axis is too small for the interaction range: fewer than three
    /// cells would fit.
    #[error("cell grid too coarse: axis {axis} supports only {count} cells, need 3+")]
    TooFewCells { axis: usize, count: usize },

    /// Morton addressing requires equal cell counts on all axes.
    #[error("morton grid requires a cubic box, got lengths {lengths:?}")]
    NonCubicBox { lengths: [f64; 3] },

    /// The calendar queue could not derive a usable bucket scale.
    #[error("calendar queue scale invalid: {detail}")]
    InvalidQueueScale { detail: String },

    /// A configuration value is outside its documented domain.
    #[error("configuration: {0}")]
    Config(String),
}
