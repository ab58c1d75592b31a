//! Signal plumbing between the neighbour structure and its observers.
//!
//! The grids never call back into the scheduler (which owns them); instead
//! they publish typed signals onto a bus. The scheduler drains the bus
//! inline, synchronously, inside its own dispatch function, which breaks
//! the registration cycle a callback design would create. External
//! observers (statistics, debugging) can attach mpsc taps; tap sends never
//! block and disconnected receivers are ignored.

use crate::particle::ParticleId;
use std::collections::VecDeque;
use std::sync::mpsc;

/// A change announced by the neighbour structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeighbourSignal {
    /// `particle` can now see `neighbour` and needs a fresh pair prediction.
    NewNeighbour {
        particle: ParticleId,
        neighbour: ParticleId,
    },
    /// `particle` can now see the local object `local`.
    NewLocal { particle: ParticleId, local: usize },
    /// `particle` moved out of `old_cell`.
    CellChanged {
        particle: ParticleId,
        old_cell: usize,
    },
    /// The whole structure was rebuilt; all predictions are void.
    Reinitialised,
}

/// In-memory queue of neighbour signals with optional external taps.
#[derive(Debug, Default)]
pub struct SignalBus {
    queue: VecDeque<NeighbourSignal>,
    taps: Vec<mpsc::Sender<NeighbourSignal>>,
}

impl SignalBus {
    /// Creates an empty bus with no taps.
    pub fn new() -> Self {
        SignalBus::default()
    }

    /// Attaches an external observer. Signals are mirrored to every tap as
    /// they are published.
    pub fn subscribe(&mut self, tap: mpsc::Sender<NeighbourSignal>) {
        self.taps.push(tap);
    }

    /// Publishes a signal: queued for the scheduler, mirrored to taps.
    pub fn push(&mut self, signal: NeighbourSignal) {
        // Non-blocking mirror - if a receiver is gone, just continue
        for tap in &self.taps {
            let _ = tap.send(signal);
        }
        self.queue.push_back(signal);
    }

    /// Takes the oldest queued signal.
    pub fn pop(&mut self) -> Option<NeighbourSignal> {
        self.queue.pop_front()
    }

    /// Number of queued signals.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
