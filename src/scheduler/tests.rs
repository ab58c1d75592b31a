#[cfg(test)]
mod units {
    use crate::boundary::SimBox;
    use crate::dynamics::{DelayedStates, HardSphereDynamics};
    use crate::error::SimulationError;
    use crate::event::EventKind;
    use crate::local::Wall;
    use crate::neighbour::{CellGrid, GridKind, GridSettings};
    use crate::particle::{Particle, ParticleStore};
    use crate::scheduler::Scheduler;
    use crate::sorter::{EventSorter, SorterKind};
    use crate::system::{SystemTaskKind, SystemTimer};
    use crate::vector::Vec3;

    struct Fixture {
        scheduler: Scheduler,
        store: ParticleStore,
        delayed: DelayedStates,
        dynamics: HardSphereDynamics,
        walls: Vec<Wall>,
    }

    impl Fixture {
        fn new(particles: Vec<Particle>, box_length: f64, sorter: SorterKind) -> Self {
            let n = particles.len();
            let store = ParticleStore::new(particles, SimBox::cubic(box_length));
            let settings = GridSettings {
                kind: GridKind::Plain,
                overlink: 1,
                oversize: 1.0,
                lambda: 0.0,
            };
            let mut fixture = Fixture {
                scheduler: Scheduler::new(
                    EventSorter::new(sorter, None),
                    CellGrid::new(settings),
                ),
                store,
                delayed: DelayedStates::new(n),
                dynamics: HardSphereDynamics::new(1.0),
                walls: Vec::new(),
            };
            fixture
                .scheduler
                .initialise(
                    &mut fixture.store,
                    &mut fixture.delayed,
                    &fixture.dynamics,
                    &fixture.walls,
                )
                .expect("scheduler initialise");
            fixture
        }

        fn step(&mut self) -> crate::scheduler::EventRecord {
            self.scheduler
                .run_next(
                    &mut self.store,
                    &mut self.delayed,
                    &self.dynamics,
                    &self.walls,
                )
                .expect("run_next")
        }

        fn step_until(&mut self, kind: EventKind, limit: usize) -> crate::scheduler::EventRecord {
            for _ in 0..limit {
                let record = self.step();
                if record.kind == kind {
                    return record;
                }
            }
            panic!("no {kind:?} event within {limit} steps");
        }
    }

    fn head_on_pair() -> Vec<Particle> {
        vec![
            Particle::new(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)),
            Particle::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0)),
        ]
    }

    #[test]
    fn head_on_pair_collides_at_the_exact_time() {
        for sorter in [SorterKind::Tournament, SorterKind::Calendar] {
            let mut fx = Fixture::new(head_on_pair(), 10.0, sorter);
            let record = fx.step_until(EventKind::PairInteraction, 50);

            assert!(
                (record.time - 1.5).abs() < 1e-9,
                "{sorter:?}: collision at {}",
                record.time
            );
            assert_eq!(record.delta_ke, 0.0);
            assert_eq!(fx.store[0].velocity, Vec3::new(-1.0, 0.0, 0.0));
            assert_eq!(fx.store[1].velocity, Vec3::new(1.0, 0.0, 0.0));
            // Both participants' counters bumped exactly once
            assert_eq!(fx.scheduler.counter_of(0), 1);
            assert_eq!(fx.scheduler.counter_of(1), 1);
            assert_eq!(fx.scheduler.executed_events(), 1);
        }
    }

    #[test]
    fn event_times_never_decrease() {
        let mut fx = Fixture::new(head_on_pair(), 10.0, SorterKind::Calendar);
        let mut last = 0.0;
        for _ in 0..20 {
            let record = fx.step();
            assert!(
                record.time >= last - 1e-12,
                "time went backwards: {} after {}",
                record.time,
                last
            );
            last = record.time;
        }
    }

    #[test]
    fn lone_drifting_particle_only_crosses_cells() {
        // Nine cells per axis put the origin at a cell centre, so the
        // first face is half a lattice away
        let particles = vec![Particle::new(Vec3::zero(), Vec3::new(0.3, 0.0, 0.0))];
        let mut fx = Fixture::new(particles, 9.0, SorterKind::Tournament);

        let expected = [0.5 / 0.3, 1.5 / 0.3, 2.5 / 0.3];
        for expect in expected {
            let record = fx.step();
            assert_eq!(record.kind, EventKind::CellBoundary);
            assert!(
                (record.time - expect).abs() < 1e-9,
                "crossing at {} expected {expect}",
                record.time
            );
        }
        assert_eq!(fx.scheduler.executed_events(), 0);
        assert_eq!(fx.scheduler.interaction_rejections(), 0);
    }

    #[test]
    fn stale_pair_events_are_rejected_and_repredicted() {
        let particles = vec![
            Particle::new(Vec3::new(-0.3, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)),
            Particle::new(Vec3::new(0.8, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0)),
        ];
        let mut fx = Fixture::new(particles, 10.0, SorterKind::Tournament);

        // An external change to particle 1: now receding, predictions
        // against its old state are stale
        fx.store[1].velocity = Vec3::new(1.0, 0.0, 0.0);
        fx.scheduler
            .invalidate_events(1, &mut fx.store, &mut fx.delayed, &fx.dynamics, &fx.walls)
            .expect("invalidate");
        assert_eq!(fx.scheduler.counter_of(1), 1);

        // The stale collision surfaces first, gets discarded, and the next
        // real thing to happen is a cell crossing
        let record = fx.step();
        assert_eq!(fx.scheduler.interaction_rejections(), 1);
        assert_eq!(record.kind, EventKind::CellBoundary);
        assert_eq!(fx.scheduler.executed_events(), 0);
    }

    #[test]
    fn wall_collision_reflects_and_rebuilds() {
        let particles = vec![Particle::new(
            Vec3::new(-2.0, 0.25, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        )];
        let n = particles.len();
        let store = ParticleStore::new(particles, SimBox::cubic(10.0));
        let settings = GridSettings {
            kind: GridKind::Plain,
            overlink: 1,
            oversize: 1.0,
            lambda: 0.0,
        };
        let mut fx = Fixture {
            scheduler: Scheduler::new(
                EventSorter::new(SorterKind::Tournament, None),
                CellGrid::new(settings),
            ),
            store,
            delayed: DelayedStates::new(n),
            dynamics: HardSphereDynamics::new(1.0),
            walls: vec![Wall::new(Vec3::new(3.0, 0.0, 0.0), Vec3::x_hat())],
        };
        fx.scheduler
            .initialise(&mut fx.store, &mut fx.delayed, &fx.dynamics, &fx.walls)
            .expect("initialise");

        let record = fx.step_until(EventKind::LocalObject, 50);
        // Contact half a diameter before the plane: x = 2.5, t = 4.5
        assert!((record.time - 4.5).abs() < 1e-9, "wall hit at {}", record.time);
        assert_eq!(fx.store[0].velocity, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(fx.scheduler.counter_of(0), 1);
        assert_eq!(fx.scheduler.executed_events(), 1);
    }

    #[test]
    fn virtual_events_recompute_without_counter_bump() {
        let particles = vec![Particle::new(Vec3::zero(), Vec3::new(0.3, 0.0, 0.0))];
        let mut fx = Fixture::new(particles, 9.0, SorterKind::Tournament);

        fx.scheduler.push_virtual(0, 0.25);
        let record = fx.step();
        assert_eq!(record.kind, EventKind::Virtual);
        assert!((record.time - 0.25).abs() < 1e-12);
        assert_eq!(fx.scheduler.counter_of(0), 0);

        // The recompute rebuilt the crossing prediction in the new frame
        let record = fx.step();
        assert_eq!(record.kind, EventKind::CellBoundary);
        assert!((record.time - 0.5 / 0.3).abs() < 1e-9);
    }

    #[test]
    fn system_timers_preempt_particle_events() {
        let particles = vec![Particle::new(Vec3::zero(), Vec3::new(0.3, 0.0, 0.0))];
        let mut fx = Fixture::new(particles, 9.0, SorterKind::Tournament);
        fx.scheduler
            .add_system_timer(SystemTimer::new("tick", SystemTaskKind::Ticker, 0.25, 0.0));

        // Six ticks fit before the first crossing at t = 1.667
        for i in 1..=6 {
            let record = fx.step();
            assert_eq!(record.kind, EventKind::SystemEvent);
            assert!((record.time - 0.25 * i as f64).abs() < 1e-12);
        }
        // The crossing still lands at its exact time afterwards
        let record = fx.step();
        assert_eq!(record.kind, EventKind::CellBoundary);
        assert!((record.time - 0.5 / 0.3).abs() < 1e-9);
    }

    #[test]
    fn static_system_without_timers_reports_exhaustion() {
        let particles = vec![Particle::new(Vec3::zero(), Vec3::zero())];
        let mut fx = Fixture::new(particles, 9.0, SorterKind::Tournament);
        let err = fx
            .scheduler
            .run_next(&mut fx.store, &mut fx.delayed, &fx.dynamics, &fx.walls)
            .expect_err("nothing can ever happen");
        assert!(matches!(err, SimulationError::ExhaustedEventList { .. }));
    }

    #[test]
    fn static_system_with_timer_keeps_ticking() {
        let particles = vec![Particle::new(Vec3::zero(), Vec3::zero())];
        let mut fx = Fixture::new(particles, 9.0, SorterKind::Calendar);
        fx.scheduler
            .add_system_timer(SystemTimer::new("tick", SystemTaskKind::Ticker, 1.0, 0.0));
        for i in 1..=3 {
            let record = fx.step();
            assert_eq!(record.kind, EventKind::SystemEvent);
            assert!((record.time - i as f64).abs() < 1e-12);
        }
    }

    #[test]
    fn freestream_accumulates_into_the_next_real_event() {
        // The pair starts in distant cells: several crossings free-stream
        // before the collision, and the collision's reported dt must cover
        // the whole span since t = 0
        let mut fx = Fixture::new(head_on_pair(), 10.0, SorterKind::Tournament);
        let record = fx.step_until(EventKind::PairInteraction, 50);
        assert!((record.dt - record.time).abs() < 1e-9);
    }

    #[test]
    fn rescale_times_stretches_pending_events() {
        let particles = vec![Particle::new(Vec3::zero(), Vec3::new(0.3, 0.0, 0.0))];
        let mut fx = Fixture::new(particles, 9.0, SorterKind::Tournament);
        fx.scheduler.rescale_times(2.0);
        let record = fx.step();
        assert_eq!(record.kind, EventKind::CellBoundary);
        assert!((record.time - 2.0 * (0.5 / 0.3)).abs() < 1e-9);
    }

    #[test]
    fn rebuild_list_preserves_counters() {
        let mut fx = Fixture::new(head_on_pair(), 10.0, SorterKind::Tournament);
        fx.step_until(EventKind::PairInteraction, 50);
        let counters = (fx.scheduler.counter_of(0), fx.scheduler.counter_of(1));
        fx.scheduler
            .rebuild_list(&mut fx.store, &mut fx.delayed, &fx.dynamics, &fx.walls)
            .expect("rebuild");
        assert_eq!(
            (fx.scheduler.counter_of(0), fx.scheduler.counter_of(1)),
            counters
        );
        // And the rebuilt schedule still runs
        let record = fx.step();
        assert!(record.time >= 1.5);
    }
}
