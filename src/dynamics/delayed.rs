//! Delayed-state (lazy streaming) manager.
//!
//! Most events touch one or two particles, so streaming all `N` positions
//! forward at every event is wasted work. Instead the global clock advance
//! accumulates in a single scalar `acc`, each particle carries a peculiar
//! time `pec_time[p]` recording how far it has *already* been streamed
//! relative to that accumulator, and positions are only materialised when a
//! caller actually needs them.
//!
//! Invariants:
//!
//! - a particle is synchronised exactly when `pec_time[p] == -acc`;
//! - `update(p)` streams `p` by `acc + pec_time[p]` and restores that
//!   equality, so it is idempotent;
//! - every `stream_freq` clock advances, `acc` is folded into every
//!   `pec_time` and zeroed, which bounds the magnitudes the floating-point
//!   arithmetic ever sees.

use super::Dynamics;
use crate::particle::{ParticleId, ParticleStore};

/// Per-particle lazy-streaming bookkeeping.
#[derive(Debug, Clone)]
pub struct DelayedStates {
    /// Peculiar time of each particle.
    pec_time: Vec<f64>,
    /// Rolling clock accumulator shared by all particles.
    acc: f64,
    /// Clock advances since the last fold.
    stream_count: usize,
    /// Advances between folds.
    stream_freq: usize,
}

impl DelayedStates {
    /// Creates the bookkeeping for `n` particles, all synchronised.
    pub fn new(n: usize) -> Self {
        DelayedStates {
            pec_time: vec![0.0; n],
            acc: 0.0,
            stream_count: 0,
            stream_freq: (10 * n).max(1),
        }
    }

    /// How far particle `p`'s stored state lags the global clock.
    #[inline]
    pub fn delay_of(&self, p: ParticleId) -> f64 {
        self.acc + self.pec_time[p]
    }

    /// True when `p`'s stored state is current.
    #[inline]
    pub fn is_up_to_date(&self, p: ParticleId) -> bool {
        self.pec_time[p] == -self.acc
    }

    /// Sum of all peculiar times; with the accumulator this is the total
    /// outstanding lag, which must vanish after `update_all`.
    pub fn total_pec_time(&self) -> f64 {
        self.pec_time.iter().sum()
    }

    /// The rolling accumulator.
    pub fn accumulator(&self) -> f64 {
        self.acc
    }

    /// Brings particle `p` to the current time. Idempotent.
    pub fn update<D: Dynamics>(
        &mut self,
        p: ParticleId,
        store: &mut ParticleStore,
        dynamics: &D,
        time: f64,
    ) {
        let delay = self.acc + self.pec_time[p];
        let bounds = store.bounds;
        let particle = &mut store[p];
        dynamics.stream_particle(particle, delay);
        bounds.apply(&mut particle.position, &mut particle.velocity, time);
        self.pec_time[p] = -self.acc;
    }

    /// Brings two particles to the current time.
    pub fn update_pair<D: Dynamics>(
        &mut self,
        p: ParticleId,
        q: ParticleId,
        store: &mut ParticleStore,
        dynamics: &D,
        time: f64,
    ) {
        self.update(p, store, dynamics, time);
        self.update(q, store, dynamics, time);
    }

    /// Brings every particle to the current time and resets all
    /// bookkeeping. Observers snapshot after this, so the stored state is
    /// globally consistent.
    pub fn update_all<D: Dynamics>(&mut self, store: &mut ParticleStore, dynamics: &D, time: f64) {
        let bounds = store.bounds;
        for p in 0..self.pec_time.len() {
            let delay = self.acc + self.pec_time[p];
            let particle = &mut store[p];
            dynamics.stream_particle(particle, delay);
            bounds.apply(&mut particle.position, &mut particle.velocity, time);
            self.pec_time[p] = 0.0;
        }
        self.acc = 0.0;
        self.stream_count = 0;
    }

    /// Records a global clock advance in `O(1)`.
    ///
    /// Every `stream_freq` calls the accumulator is folded into the
    /// per-particle times to keep magnitudes bounded.
    pub fn stream(&mut self, dt: f64) {
        self.acc += dt;

        self.stream_count += 1;
        if self.stream_count == self.stream_freq {
            for pec in &mut self.pec_time {
                *pec += self.acc;
            }
            self.acc = 0.0;
            self.stream_count = 0;
        }
    }

    /// Number of particles tracked.
    pub fn len(&self) -> usize {
        self.pec_time.len()
    }

    /// True when tracking no particles.
    pub fn is_empty(&self) -> bool {
        self.pec_time.is_empty()
    }
}
