//! # Simulation Module - The Run Driver
//!
//! This module owns one complete simulation: the particle store, the
//! dynamics collaborator, the walls, the scheduler and the run loop. It
//! consumes event records from the scheduler until the configured event
//! budget is reached or an external stop is requested, forwarding snapshots
//! and event records to observers over channels.
//!
//! ## Architecture Overview
//!
//! The engine itself is strictly single-threaded; concurrency exists only
//! at the boundary:
//! - snapshot frames and event records go out over MPSC channels, with
//!   sends that never block and ignore departed receivers;
//! - an atomic stop flag lets another thread request termination, honoured
//!   at the next loop boundary (events are never interrupted partway).
//!
//! ## Submodules
//!
//! - [`tests`]: unit tests for construction, stepping and stop control


use crate::config::Settings;
use crate::dynamics::{DelayedStates, Dynamics, HardSphereDynamics};
use crate::error::SimulationError;
use crate::event::EventKind;
use crate::local::Wall;
use crate::neighbour::CellGrid;
use crate::particle::{Particle, ParticleStore};
use crate::scheduler::{EventRecord, Scheduler};
use crate::sorter::EventSorter;
use crate::system::{SystemTaskKind, SystemTimer};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Simulation execution request: initial conditions, configuration and
/// tracking metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRequest {
    /// Unique identifier for this run.
    pub id: usize,
    /// Human-readable tag for grouping related runs.
    pub tag: String,
    /// Initial particle configuration.
    pub initial_values: Vec<Particle>,
    /// Complete engine configuration.
    pub settings: Settings,
}

/// Temporal snapshot of the complete system state.
///
/// Captured only after every particle has been synchronised, so all
/// positions in one snapshot belong to the exact same instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    /// Real events executed when this snapshot was captured.
    pub event_count: u64,
    /// Simulation time of the snapshot.
    pub time: f64,
    /// Complete state of every particle.
    pub particles: Vec<Particle>,
}

/// Complete results of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Identifier matching the request.
    pub id: usize,
    /// Tag inherited from the request.
    pub tag: String,
    /// Configuration used, preserved for reproducibility.
    pub settings: Settings,
    /// Periodic snapshots (empty unless a snapshot period was configured).
    pub snapshots: Vec<SimulationSnapshot>,
    /// Final synchronised state of every particle.
    pub final_state: Vec<Particle>,
    /// Real events executed.
    pub total_events: u64,
    /// Simulation time reached.
    pub end_time: f64,
    /// Kinetic energy at initialisation.
    pub initial_ke: f64,
    /// Kinetic energy at the end.
    pub final_ke: f64,
    /// Stale pair events discarded.
    pub interaction_rejections: u64,
    /// Stale wall events discarded.
    pub local_rejections: u64,
    /// Calendar-queue exception events.
    pub sorter_exceptions: u64,
    /// Unix timestamp of execution.
    pub created_at: u64,
    /// Wall-clock duration of the run.
    pub duration_seconds: f64,
}

/// One event-driven simulation run.
pub struct Simulation {
    store: ParticleStore,
    delayed: DelayedStates,
    dynamics: HardSphereDynamics,
    walls: Vec<Wall>,
    scheduler: Scheduler,
    settings: Settings,
    id: usize,
    tag: String,
    initialised: bool,
    initial_ke: f64,
    snapshots: Vec<SimulationSnapshot>,
    frame_sender: Option<mpsc::Sender<SimulationSnapshot>>,
    event_taps: Vec<mpsc::Sender<EventRecord>>,
    should_stop: Arc<AtomicBool>,
}

impl Simulation {
    /// Creates a simulation from a request.
    ///
    /// # Panics
    ///
    /// Panics if the request carries no particles.
    pub fn new(request: SimulationRequest) -> Result<Self, SimulationError> {
        request.settings.validate()?;

        let n = request.initial_values.len();
        let store = ParticleStore::new(request.initial_values, request.settings.sim_box());
        let delayed = DelayedStates::new(n);
        let dynamics = HardSphereDynamics::new(request.settings.interaction.diameter);

        let sorter = EventSorter::new(
            request.settings.scheduler.kind,
            request.settings.scheduler.bpq_lists,
        );
        let grid = CellGrid::new(request.settings.neighbour);
        let mut scheduler = Scheduler::new(sorter, grid);

        if let Some(period) = request.settings.simulation.snapshot_period {
            scheduler.add_system_timer(SystemTimer::new(
                "snapshot",
                SystemTaskKind::Snapshot,
                period,
                0.0,
            ));
        }

        Ok(Simulation {
            store,
            delayed,
            dynamics,
            walls: Vec::new(),
            scheduler,
            settings: request.settings,
            id: request.id,
            tag: request.tag,
            initialised: false,
            initial_ke: 0.0,
            snapshots: Vec::new(),
            frame_sender: None,
            event_taps: Vec::new(),
            should_stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Adds a wall. Must happen before `initialise`; the cell grid learns
    /// wall visibility when it is built.
    pub fn add_wall(&mut self, wall: Wall) {
        assert!(
            !self.initialised,
            "Walls must be added before the simulation is initialised"
        );
        self.walls.push(wall);
    }

    /// Attaches a channel receiving every snapshot.
    pub fn attach_frame_channel(&mut self, tx: mpsc::Sender<SimulationSnapshot>) {
        self.frame_sender = Some(tx);
    }

    /// Attaches a channel receiving every event record.
    pub fn attach_event_tap(&mut self, tx: mpsc::Sender<EventRecord>) {
        self.event_taps.push(tx);
    }

    /// Returns a cloned stop flag for external control.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.should_stop)
    }

    /// Requests termination at the next loop boundary.
    pub fn stop(&self) {
        self.should_stop.store(true, Ordering::Relaxed);
    }

    /// Builds every prediction from scratch. Idempotent before `run`;
    /// `run` calls it automatically when needed.
    pub fn initialise(&mut self) -> Result<(), SimulationError> {
        self.scheduler
            .initialise(&mut self.store, &mut self.delayed, &self.dynamics, &self.walls)?;
        self.initial_ke = self.dynamics.system_kinetic_energy(self.store.as_slice());
        self.initialised = true;
        info!(
            "initialised: {} particles, {} cells, KE = {:.6}",
            self.store.len(),
            self.scheduler.grid().n_cells(),
            self.initial_ke
        );
        Ok(())
    }

    /// Executes one event (real or virtual) and returns its record.
    pub fn step(&mut self) -> Result<EventRecord, SimulationError> {
        if !self.initialised {
            self.initialise()?;
        }
        let record = self.scheduler.run_next(
            &mut self.store,
            &mut self.delayed,
            &self.dynamics,
            &self.walls,
        )?;

        // Non-blocking mirror - if a receiver is gone, just continue
        for tap in &self.event_taps {
            let _ = tap.send(record);
        }

        if record.kind == EventKind::SystemEvent {
            self.run_system_task(&record);
        }

        Ok(record)
    }

    /// Runs until the configured event budget is exhausted or a stop is
    /// requested, then returns the results.
    pub fn run(&mut self) -> Result<SimulationResult, SimulationError> {
        if !self.initialised {
            self.initialise()?;
        }
        let started = Instant::now();
        let max_events = self.settings.simulation.max_events;
        let print_interval = self.settings.simulation.print_interval.max(1);
        let mut last_printed = 0;

        while self.scheduler.executed_events() < max_events {
            if self.should_stop.load(Ordering::Relaxed) {
                info!(
                    "stop requested at t = {:.6} after {} events",
                    self.scheduler.time(),
                    self.scheduler.executed_events()
                );
                break;
            }

            let record = match self.step() {
                Ok(record) => record,
                Err(err) => {
                    error!("{err}");
                    return Err(err);
                }
            };

            let executed = self.scheduler.executed_events();
            if record.kind != EventKind::SystemEvent
                && executed != last_printed
                && executed % print_interval == 0
            {
                last_printed = executed;
                self.log_progress();
            }
        }

        Ok(self.build_result(started.elapsed().as_secs_f64()))
    }

    /// Current simulation time.
    pub fn current_time(&self) -> f64 {
        self.scheduler.time()
    }

    /// Real events executed so far.
    pub fn executed_events(&self) -> u64 {
        self.scheduler.executed_events()
    }

    /// Current total kinetic energy (velocities are always current; only
    /// positions lag).
    pub fn kinetic_energy(&self) -> f64 {
        self.dynamics.system_kinetic_energy(self.store.as_slice())
    }

    /// Immutable view of the particle state. Positions may lag the clock;
    /// call `synchronise` first for a consistent picture.
    pub fn particles(&self) -> &[Particle] {
        self.store.as_slice()
    }

    /// Brings every particle to the current time.
    pub fn synchronise(&mut self) {
        self.delayed
            .update_all(&mut self.store, &self.dynamics, self.scheduler.time());
    }

    /// Multiplies every pending event time by `factor` (replica-exchange
    /// temperature swap).
    pub fn rescale_event_times(&mut self, factor: f64) {
        self.scheduler.rescale_times(factor);
    }

    /// Read access to the scheduler, for diagnostics and tests.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Read access to the delayed-state bookkeeping.
    pub fn delayed_states(&self) -> &DelayedStates {
        &self.delayed
    }

    fn run_system_task(&mut self, record: &EventRecord) {
        let idx = match record.partner {
            crate::event::EventPartner::Object(idx) => idx,
            _ => return,
        };
        match self.scheduler.system_task_kind(idx) {
            Some(SystemTaskKind::Snapshot) => self.capture_snapshot(),
            Some(SystemTaskKind::Ticker) => self.log_progress(),
            None => {}
        }
    }

    fn capture_snapshot(&mut self) {
        // Snapshots must be globally consistent: synchronise first
        self.synchronise();
        let frame = SimulationSnapshot {
            event_count: self.scheduler.executed_events(),
            time: self.scheduler.time(),
            particles: self.store.as_slice().to_vec(),
        };

        if let Some(ref sender) = self.frame_sender {
            // Non-blocking send - if the receiver is gone, just continue
            let _ = sender.send(frame.clone());
        }
        self.snapshots.push(frame);
    }

    fn log_progress(&self) {
        let ke = self.kinetic_energy();
        info!(
            "t = {:.6}, events = {}, KE = {:.9} (drift {:+.3e}), stale pair = {}, stale wall = {}, queue exceptions = {}",
            self.scheduler.time(),
            self.scheduler.executed_events(),
            ke,
            ke - self.initial_ke,
            self.scheduler.interaction_rejections(),
            self.scheduler.local_rejections(),
            self.scheduler.sorter_exceptions(),
        );
    }

    fn build_result(&mut self, duration_seconds: f64) -> SimulationResult {
        self.synchronise();
        let final_ke = self.kinetic_energy();
        SimulationResult {
            id: self.id,
            tag: self.tag.clone(),
            settings: self.settings.clone(),
            snapshots: std::mem::take(&mut self.snapshots),
            final_state: self.store.as_slice().to_vec(),
            total_events: self.scheduler.executed_events(),
            end_time: self.scheduler.time(),
            initial_ke: self.initial_ke,
            final_ke,
            interaction_rejections: self.scheduler.interaction_rejections(),
            local_rejections: self.scheduler.local_rejections(),
            sorter_exceptions: self.scheduler.sorter_exceptions(),
            created_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            duration_seconds,
        }
    }
}

impl Drop for Simulation {
    /// Raises the stop flag so any thread watching it winds down with the
    /// simulation.
    fn drop(&mut self) {
        self.stop();
    }
}
