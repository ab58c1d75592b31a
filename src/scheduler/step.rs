//! The dispatch loop: `run_next` and its per-kind event handlers.

use super::{EventRecord, Scheduler, TIME_TOLERANCE};
use crate::dynamics::{DelayedStates, Dynamics};
use crate::error::SimulationError;
use crate::event::{EventKind, EventPartner};
use crate::local::Wall;
use crate::neighbour::CellFace;
use crate::particle::ParticleStore;
use crate::system::SystemTaskKind;

impl Scheduler {
    /// Executes the next event and returns what happened.
    ///
    /// Stale events are discarded and re-predicted inside the call, so the
    /// returned record is always a genuinely executed event: a collision, a
    /// wall hit, a cell crossing, a virtual recompute or a system tick.
    /// Cell crossings and virtual events are returned too (the driver
    /// decides what counts toward its event budget), with their clock
    /// advance also accumulated into the next real event's reported `dt`.
    pub fn run_next<D: Dynamics>(
        &mut self,
        store: &mut ParticleStore,
        delayed: &mut DelayedStates,
        dynamics: &D,
        walls: &[Wall],
    ) -> Result<EventRecord, SimulationError> {
        loop {
            // System timers pre-empt the particle queue, ties included, so
            // snapshots land at exact times
            if let Some(idx) = self.earliest_timer() {
                if self.system_timers[idx].next <= self.time + self.sorter.next_time() {
                    return Ok(self.run_system_event(idx, delayed));
                }
            }

            let next = self.sorter.next_event();
            let p = self.sorter.next_id();

            if next.is_never() || next.time == f64::INFINITY {
                // Either every list is empty or nothing pending will ever
                // fire; without a system timer the run cannot continue
                return Err(SimulationError::ExhaustedEventList {
                    time: self.time,
                    events: self.executed,
                });
            }
            if next.time.is_nan() {
                return Err(SimulationError::NonFiniteTime {
                    particle: p,
                    time: self.time,
                });
            }
            if next.time < -TIME_TOLERANCE {
                return Err(SimulationError::TimeReversal {
                    dt: next.time,
                    particle: p,
                    time: self.time,
                    events: self.executed,
                });
            }

            match next.kind {
                EventKind::PairInteraction => {
                    let q = match next.partner {
                        EventPartner::Particle(q) => q,
                        _ => {
                            return Err(SimulationError::UnroutableEvent {
                                kind: "pair interaction without particle partner",
                                particle: p,
                                time: self.time,
                            });
                        }
                    };

                    if next.counter != self.counters[q] {
                        // Stale: the partner changed since this prediction
                        // was made. Discard it and predict afresh from the
                        // current pair state; no counter bump, nothing
                        // happened to either particle.
                        self.interaction_rejections += 1;
                        self.sorter.pop_next();
                        if let Some(event) = self.pair_event(p, q, store, delayed, dynamics)? {
                            self.sorter.push(event, p);
                        }
                        self.sorter.update(p);
                        continue;
                    }

                    let dt = next.time.max(0.0);
                    self.advance(dt, delayed);
                    delayed.update_pair(p, q, store, dynamics, self.time);

                    let bounds = store.bounds;
                    let time = self.time;
                    let (pp, qq) = store.pair_mut(p, q);
                    let outcome = dynamics.execute_pair(pp, qq, &bounds, time);

                    self.event_counts[p] += 1;
                    self.event_counts[q] += 1;
                    self.executed += 1;
                    self.full_update_pair(p, q, store, delayed, dynamics, walls)?;

                    return Ok(self.real_event_record(
                        dt,
                        EventKind::PairInteraction,
                        Some(p),
                        EventPartner::Particle(q),
                        outcome.delta_ke,
                    ));
                }

                EventKind::CellBoundary => {
                    let face = match next.partner {
                        EventPartner::Object(code) => CellFace::decode(code),
                        _ => {
                            return Err(SimulationError::UnroutableEvent {
                                kind: "cell boundary without face",
                                particle: p,
                                time: self.time,
                            });
                        }
                    };

                    let dt = next.time.max(0.0);
                    self.advance(dt, delayed);
                    delayed.update(p, store, dynamics, self.time);

                    // Drop the fired descriptor before enrolling the new
                    // neighbours, then push the next crossing
                    self.sorter.pop_next();
                    self.grid
                        .on_cell_crossing(p, face, &store[p], self.time, &mut self.bus);
                    self.drain_bus(store, delayed, dynamics, walls)?;

                    let boundary = self.cell_event(p, store, delayed, dynamics);
                    self.sorter.push(boundary, p);
                    self.sorter.update(p);

                    // Virtual: no counter bump, and the clock advance is
                    // reported with the next real event
                    self.freestream_acc += dt;

                    return Ok(EventRecord {
                        time: self.time,
                        dt,
                        kind: EventKind::CellBoundary,
                        particle: Some(p),
                        partner: next.partner,
                        delta_ke: 0.0,
                    });
                }

                EventKind::LocalObject => {
                    let wall_id = match next.partner {
                        EventPartner::Object(id) => id,
                        _ => {
                            return Err(SimulationError::UnroutableEvent {
                                kind: "local event without object",
                                particle: p,
                                time: self.time,
                            });
                        }
                    };

                    if next.counter != self.counters[p] {
                        // A full update already re-enumerated this
                        // particle's walls; the stale copy just dies
                        self.local_rejections += 1;
                        self.sorter.pop_next();
                        continue;
                    }

                    let dt = next.time.max(0.0);
                    self.advance(dt, delayed);
                    delayed.update(p, store, dynamics, self.time);

                    let outcome = dynamics.execute_local(&mut store[p], &walls[wall_id]);

                    self.event_counts[p] += 1;
                    self.executed += 1;
                    self.full_update(p, store, delayed, dynamics, walls)?;

                    return Ok(self.real_event_record(
                        dt,
                        EventKind::LocalObject,
                        Some(p),
                        EventPartner::Object(wall_id),
                        outcome.delta_ke,
                    ));
                }

                EventKind::Virtual => {
                    // No physics: synchronise the particle and rebuild its
                    // predictions. Its state is unchanged, so predictions
                    // held by others stay valid and the counter stays put.
                    let dt = next.time.max(0.0);
                    self.advance(dt, delayed);
                    delayed.update(p, store, dynamics, self.time);

                    self.sorter.pop_next();
                    self.sorter.clear_pel(p);
                    self.add_events(p, store, delayed, dynamics, walls, false)?;
                    self.sorter.update(p);

                    self.freestream_acc += dt;

                    return Ok(EventRecord {
                        time: self.time,
                        dt,
                        kind: EventKind::Virtual,
                        particle: Some(p),
                        partner: next.partner,
                        delta_ke: 0.0,
                    });
                }

                EventKind::GlobalEvent => {
                    // No global sources are registered by this engine; a
                    // surfacing global descriptor is a routing bug
                    return Err(SimulationError::UnroutableEvent {
                        kind: "global",
                        particle: p,
                        time: self.time,
                    });
                }

                EventKind::SystemEvent | EventKind::None => {
                    return Err(SimulationError::UnroutableEvent {
                        kind: "system/none",
                        particle: p,
                        time: self.time,
                    });
                }
            }
        }
    }

    /// Pushes a virtual descriptor for `p`, `dt` from now. Used by
    /// sentinel-style collaborators and tests to force a re-prediction.
    pub fn push_virtual(&mut self, p: usize, dt: f64) {
        let event = crate::event::Event::new(
            dt,
            EventKind::Virtual,
            self.counters[p],
            EventPartner::None,
        );
        self.sorter.push(event, p);
        self.sorter.update(p);
    }

    /// Index of the earliest-armed system timer.
    fn earliest_timer(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, timer) in self.system_timers.iter().enumerate() {
            match best {
                None => best = Some(idx),
                Some(b) if timer.next < self.system_timers[b].next => best = Some(idx),
                _ => {}
            }
        }
        best
    }

    /// Fires system timer `idx`: advances the clock exactly to its time
    /// and re-arms it. The driver performs the actual tick/snapshot work.
    fn run_system_event(&mut self, idx: usize, delayed: &mut DelayedStates) -> EventRecord {
        let target = self.system_timers[idx].next;
        let dt = (target - self.time).max(0.0);
        self.advance(dt, delayed);
        self.system_timers[idx].reschedule();

        let delta_dt = dt + self.freestream_acc;
        self.freestream_acc = 0.0;

        EventRecord {
            time: self.time,
            dt: delta_dt,
            kind: EventKind::SystemEvent,
            particle: None,
            partner: EventPartner::Object(idx),
            delta_ke: 0.0,
        }
    }

    /// What kind of system task timer `idx` performs.
    pub fn system_task_kind(&self, idx: usize) -> Option<SystemTaskKind> {
        self.system_timers.get(idx).map(|t| t.kind)
    }

    /// Advances the global clock: simulation time, sorter frame and the
    /// delayed-state accumulator move together.
    fn advance(&mut self, dt: f64, delayed: &mut DelayedStates) {
        self.time += dt;
        self.sorter.stream(dt);
        delayed.stream(dt);
    }

    /// Builds the record for a consumed real event, folding in the
    /// free-streaming accumulated since the last one.
    fn real_event_record(
        &mut self,
        dt: f64,
        kind: EventKind,
        particle: Option<usize>,
        partner: EventPartner,
        delta_ke: f64,
    ) -> EventRecord {
        let delta_dt = dt + self.freestream_acc;
        self.freestream_acc = 0.0;
        EventRecord {
            time: self.time,
            dt: delta_dt,
            kind,
            particle,
            partner,
            delta_ke,
        }
    }
}
