//! # Scheduler Module - The Event Dispatch Core
//!
//! The scheduler owns the global event sorter, the cell grid and the
//! per-particle collision counters, and runs the engine's inner loop: pull
//! the earliest event, discard it if stale, otherwise advance the clock,
//! synchronise the one or two participants, hand the physics to the
//! dynamics collaborator and rebuild the participants' predictions.
//!
//! ## Staleness
//!
//! Predictions are never deleted when they are invalidated. Every real
//! event a particle participates in bumps its collision counter, and every
//! prediction carries the partner's counter from prediction time; a
//! mismatch when the prediction surfaces means some intervening event
//! changed the partner, so the prediction is discarded (and, for pairs,
//! re-made) on the spot. Invalidation work is therefore proportional to the
//! stale events actually reached, not to the predictions made.
//!
//! ## Ordering
//!
//! One invariant is load-bearing enough to name: a particle's counter is
//! bumped *before* its event list is cleared. The other way round, a
//! prediction raced in between would carry the new counter while being
//! built against the stale neighbourhood, and would be accepted as fresh.

// The run_next dispatch loop
pub mod step;
// Unit tests
pub mod tests;

use crate::dynamics::{DelayedStates, Dynamics};
use crate::error::SimulationError;
use crate::event::{Event, EventKind, EventPartner};
use crate::local::Wall;
use crate::neighbour::{CellGrid, NeighbourSignal, SignalBus};
use crate::particle::{Particle, ParticleId, ParticleStore};
use crate::sorter::EventSorter;
use crate::system::SystemTimer;
use serde::{Deserialize, Serialize};
use std::sync::mpsc;

/// Events scheduled earlier than `-TIME_TOLERANCE` relative to now are an
/// invariant violation; anything later but negative is floating-point
/// jitter and is clamped to zero.
pub(crate) const TIME_TOLERANCE: f64 = 1e-10;

/// One executed event, as reported to the driver and observers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EventRecord {
    /// Absolute simulation time the event fired at.
    pub time: f64,
    /// Clock advance delivered with this event. For real events this
    /// includes the free-streaming accumulated across preceding virtual
    /// events, so observer time always sums to simulation time.
    pub dt: f64,
    /// What fired.
    pub kind: EventKind,
    /// The primary participant, if the event has one.
    pub particle: Option<ParticleId>,
    /// Partner particle, face, wall or timer.
    pub partner: EventPartner,
    /// Kinetic energy change reported by the collaborator.
    pub delta_ke: f64,
}

/// The event dispatch core.
#[derive(Debug)]
pub struct Scheduler {
    /// Global ordering over every particle's pending events.
    pub(crate) sorter: EventSorter,
    /// Spatial index generating interaction candidates.
    pub(crate) grid: CellGrid,
    /// Signal queue the grid publishes into.
    pub(crate) bus: SignalBus,
    /// Per-particle collision counters (the staleness stamps).
    pub(crate) counters: Vec<u64>,
    /// Per-particle executed-event counts, for diagnostics.
    pub(crate) event_counts: Vec<u64>,
    /// Stale pair interactions discarded so far.
    pub(crate) interaction_rejections: u64,
    /// Stale wall events discarded so far.
    pub(crate) local_rejections: u64,
    /// Real events executed so far.
    pub(crate) executed: u64,
    /// The global simulation clock.
    pub(crate) time: f64,
    /// Periodic system events, kept outside the sorter.
    pub(crate) system_timers: Vec<SystemTimer>,
    /// Clock advance accumulated across virtual events since the last real
    /// event, folded into the next real event's reported `dt`.
    pub(crate) freestream_acc: f64,
    /// Scratch for neighbourhood enumeration (avoids per-refill allocs).
    neighbour_scratch: Vec<ParticleId>,
    /// Scratch for wall enumeration.
    local_scratch: Vec<usize>,
}

impl Scheduler {
    /// Creates a scheduler from its two main collaborator structures.
    pub fn new(sorter: EventSorter, grid: CellGrid) -> Self {
        Scheduler {
            sorter,
            grid,
            bus: SignalBus::new(),
            counters: Vec::new(),
            event_counts: Vec::new(),
            interaction_rejections: 0,
            local_rejections: 0,
            executed: 0,
            time: 0.0,
            system_timers: Vec::new(),
            freestream_acc: 0.0,
            neighbour_scratch: Vec::new(),
            local_scratch: Vec::new(),
        }
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Real events executed so far.
    pub fn executed_events(&self) -> u64 {
        self.executed
    }

    /// Collision counter of particle `p`.
    pub fn counter_of(&self, p: ParticleId) -> u64 {
        self.counters[p]
    }

    /// Stale pair interactions discarded so far.
    pub fn interaction_rejections(&self) -> u64 {
        self.interaction_rejections
    }

    /// Stale wall events discarded so far.
    pub fn local_rejections(&self) -> u64 {
        self.local_rejections
    }

    /// Calendar-queue exception count (zero under the tournament sorter).
    pub fn sorter_exceptions(&self) -> u64 {
        self.sorter.exception_count()
    }

    /// Read access to the grid, for diagnostics and tests.
    pub fn grid(&self) -> &CellGrid {
        &self.grid
    }

    /// Attaches an observer to the neighbour-change signals.
    pub fn subscribe_neighbour_signals(&mut self, tap: mpsc::Sender<NeighbourSignal>) {
        self.bus.subscribe(tap);
    }

    /// Registers a periodic system event.
    pub fn add_system_timer(&mut self, timer: SystemTimer) {
        self.system_timers.push(timer);
    }

    /// Re-arms every system timer relative to the current clock.
    pub fn rebuild_system_events(&mut self) {
        let time = self.time;
        for timer in &mut self.system_timers {
            timer.rebase(time);
        }
    }

    /// Builds every prediction from scratch: synchronises all particles,
    /// rebuilds the cell grid, refills every event list and initialises the
    /// sorter.
    pub fn initialise<D: Dynamics>(
        &mut self,
        store: &mut ParticleStore,
        delayed: &mut DelayedStates,
        dynamics: &D,
        walls: &[Wall],
    ) -> Result<(), SimulationError> {
        let n = store.len();
        self.counters.resize(n, 0);
        self.event_counts.resize(n, 0);

        delayed.update_all(store, dynamics, self.time);
        self.grid.init(
            &store.bounds,
            dynamics.longest_interaction_distance(),
            store.as_slice(),
            walls,
            self.time,
        )?;

        self.sorter.resize(n);
        for p in 0..n {
            self.add_events(p, store, delayed, dynamics, walls, true)?;
        }
        self.sorter.init()?;

        self.bus.push(NeighbourSignal::Reinitialised);
        while self.bus.pop().is_some() {}

        Ok(())
    }

    /// Discards every prediction and rebuilds from scratch.
    pub fn rebuild_list<D: Dynamics>(
        &mut self,
        store: &mut ParticleStore,
        delayed: &mut DelayedStates,
        dynamics: &D,
        walls: &[Wall],
    ) -> Result<(), SimulationError> {
        self.initialise(store, delayed, dynamics, walls)
    }

    /// Multiplies every pending event time by `factor` (temperature swap).
    pub fn rescale_times(&mut self, factor: f64) {
        self.sorter.rescale_times(factor);
    }

    /// Rebuilds particle `p`'s predictions after a real event changed it.
    ///
    /// The counter bump happens before the list is cleared; see the module
    /// docs for why this order is mandatory.
    pub fn full_update<D: Dynamics>(
        &mut self,
        p: ParticleId,
        store: &mut ParticleStore,
        delayed: &mut DelayedStates,
        dynamics: &D,
        walls: &[Wall],
    ) -> Result<(), SimulationError> {
        self.counters[p] += 1;
        self.sorter.clear_pel(p);
        delayed.update(p, store, dynamics, self.time);
        self.add_events(p, store, delayed, dynamics, walls, false)?;
        self.sorter.update(p);
        Ok(())
    }

    /// Rebuilds both participants of a pair event. Both counters bump
    /// before either list refills, so the fresh cross-predictions carry the
    /// post-event stamps.
    pub fn full_update_pair<D: Dynamics>(
        &mut self,
        p: ParticleId,
        q: ParticleId,
        store: &mut ParticleStore,
        delayed: &mut DelayedStates,
        dynamics: &D,
        walls: &[Wall],
    ) -> Result<(), SimulationError> {
        self.counters[p] += 1;
        self.counters[q] += 1;
        self.sorter.clear_pel(p);
        self.sorter.clear_pel(q);
        delayed.update_pair(p, q, store, dynamics, self.time);
        self.add_events(p, store, delayed, dynamics, walls, false)?;
        self.add_events(q, store, delayed, dynamics, walls, false)?;
        self.sorter.update(p);
        self.sorter.update(q);
        Ok(())
    }

    /// Rebuilds particle `p`'s predictions after it was changed *outside*
    /// any consumed event (a thermostat kick, say). Identical mechanics to
    /// `full_update`; the distinct name marks the distinct contract.
    pub fn invalidate_events<D: Dynamics>(
        &mut self,
        p: ParticleId,
        store: &mut ParticleStore,
        delayed: &mut DelayedStates,
        dynamics: &D,
        walls: &[Wall],
    ) -> Result<(), SimulationError> {
        self.full_update(p, store, delayed, dynamics, walls)
    }

    /// Predicts the next interaction of `p` and `q`, both materialised at
    /// the current time through their delays.
    pub(crate) fn pair_event<D: Dynamics>(
        &self,
        p: ParticleId,
        q: ParticleId,
        store: &ParticleStore,
        delayed: &DelayedStates,
        dynamics: &D,
    ) -> Result<Option<Event>, SimulationError> {
        let p_now = materialise(&store[p], delayed.delay_of(p), dynamics);
        let q_now = materialise(&store[q], delayed.delay_of(q), dynamics);

        match dynamics.predict_pair(&p_now, &q_now, &store.bounds, self.time) {
            None => Ok(None),
            Some(dt) if dt.is_nan() => Err(SimulationError::NonFiniteTime {
                particle: p,
                time: self.time,
            }),
            Some(dt) => Ok(Some(Event::new(
                dt,
                EventKind::PairInteraction,
                self.counters[q],
                EventPartner::Particle(q),
            ))),
        }
    }

    /// Predicts the next wall hit of `p`, materialised at the current time.
    pub(crate) fn local_event<D: Dynamics>(
        &self,
        p: ParticleId,
        wall_id: usize,
        store: &ParticleStore,
        delayed: &DelayedStates,
        dynamics: &D,
        walls: &[Wall],
    ) -> Result<Option<Event>, SimulationError> {
        let p_now = materialise(&store[p], delayed.delay_of(p), dynamics);
        match dynamics.predict_local(&p_now, &walls[wall_id]) {
            None => Ok(None),
            Some(dt) if dt.is_nan() => Err(SimulationError::NonFiniteTime {
                particle: p,
                time: self.time,
            }),
            Some(dt) => Ok(Some(Event::new(
                dt,
                EventKind::LocalObject,
                self.counters[p],
                EventPartner::Object(wall_id),
            ))),
        }
    }

    /// Predicts when `p` leaves its current cell.
    ///
    /// Deliberately works on the stored (lagging) state: the exit time in
    /// the particle's own frame minus its delay is the exit time in the
    /// current frame, with no streaming needed.
    pub(crate) fn cell_event<D: Dynamics>(
        &self,
        p: ParticleId,
        store: &ParticleStore,
        delayed: &DelayedStates,
        dynamics: &D,
    ) -> Event {
        let cell = self.grid.cell_of(p);
        let (dt, face) = dynamics.predict_cell_exit(
            &store[p],
            self.grid.cell_origin(cell),
            self.grid.cell_extent(),
        );
        Event::new(
            dt - delayed.delay_of(p),
            EventKind::CellBoundary,
            self.counters[p],
            EventPartner::Object(face.encode()),
        )
    }

    /// Refills particle `p`'s event list: pair candidates from the cell
    /// neighbourhood, wall candidates from the cell, and the cell-boundary
    /// crossing. During initialisation each unordered pair is enrolled only
    /// once, on its lower id.
    fn add_events<D: Dynamics>(
        &mut self,
        p: ParticleId,
        store: &ParticleStore,
        delayed: &DelayedStates,
        dynamics: &D,
        walls: &[Wall],
        init: bool,
    ) -> Result<(), SimulationError> {
        self.neighbour_scratch.clear();
        let neighbours = &mut self.neighbour_scratch;
        self.grid.particle_neighbourhood(p, |q| neighbours.push(q));

        for i in 0..self.neighbour_scratch.len() {
            let q = self.neighbour_scratch[i];
            if init && q < p {
                continue;
            }
            if let Some(event) = self.pair_event(p, q, store, delayed, dynamics)? {
                self.sorter.push(event, p);
            }
        }

        self.local_scratch.clear();
        let locals = &mut self.local_scratch;
        self.grid.particle_local_neighbourhood(p, |l| locals.push(l));

        for i in 0..self.local_scratch.len() {
            let wall_id = self.local_scratch[i];
            if let Some(event) = self.local_event(p, wall_id, store, delayed, dynamics, walls)? {
                self.sorter.push(event, p);
            }
        }

        let boundary = self.cell_event(p, store, delayed, dynamics);
        self.sorter.push(boundary, p);

        Ok(())
    }

    /// Converts queued neighbour signals into fresh predictions for the
    /// crossing particle. Runs synchronously inside the dispatch loop.
    pub(crate) fn drain_bus<D: Dynamics>(
        &mut self,
        store: &ParticleStore,
        delayed: &DelayedStates,
        dynamics: &D,
        walls: &[Wall],
    ) -> Result<(), SimulationError> {
        while let Some(signal) = self.bus.pop() {
            match signal {
                NeighbourSignal::NewNeighbour {
                    particle,
                    neighbour,
                } => {
                    if let Some(event) =
                        self.pair_event(particle, neighbour, store, delayed, dynamics)?
                    {
                        self.sorter.push(event, particle);
                    }
                }
                NeighbourSignal::NewLocal { particle, local } => {
                    if let Some(event) =
                        self.local_event(particle, local, store, delayed, dynamics, walls)?
                    {
                        self.sorter.push(event, particle);
                    }
                }
                NeighbourSignal::CellChanged { .. } | NeighbourSignal::Reinitialised => {}
            }
        }
        Ok(())
    }
}

/// A copy of `particle` free-streamed to the current time.
fn materialise<D: Dynamics>(particle: &Particle, delay: f64, dynamics: &D) -> Particle {
    Particle {
        position: dynamics.position_after(particle, delay),
        velocity: particle.velocity,
    }
}
