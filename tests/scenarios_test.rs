//! End-to-end scenarios exercising the engine through the public driver:
//! exact collision times, cell-crossing cadences, time rescaling and
//! snapshot consistency.

use edmd_lib::config::Settings;
use edmd_lib::event::EventKind;
use edmd_lib::particle::Particle;
use edmd_lib::simulation::{Simulation, SimulationRequest};
use edmd_lib::sorter::SorterKind;
use edmd_lib::vector::Vec3;

fn base_settings() -> Settings {
    let mut settings = Settings::default();
    settings.neighbour.lambda = 0.0;
    settings
}

fn request(particles: Vec<Particle>, settings: Settings) -> SimulationRequest {
    SimulationRequest {
        id: 0,
        tag: "scenario".to_string(),
        initial_values: particles,
        settings,
    }
}

/// Two unit spheres approaching head-on across the box collide at exactly
/// t = 1.5 and exchange velocities.
#[test]
fn head_on_collision_is_exact() {
    for kind in [SorterKind::Tournament, SorterKind::Calendar] {
        let mut settings = base_settings();
        settings.scheduler.kind = kind;
        settings.simulation.max_events = 1;

        let particles = vec![
            Particle::new(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)),
            Particle::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0)),
        ];

        let mut sim = Simulation::new(request(particles, settings)).expect("construction");
        let result = sim.run().expect("run");

        assert_eq!(result.total_events, 1, "{kind:?}");
        assert!((result.end_time - 1.5).abs() < 1e-9, "{kind:?}");
        assert_eq!(result.final_state[0].velocity, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(result.final_state[1].velocity, Vec3::new(1.0, 0.0, 0.0));
    }
}

/// A lone drifting sphere produces only cell-boundary events, at the exact
/// cadence of its speed against the lattice.
#[test]
fn lone_particle_cell_cadence() {
    let mut settings = base_settings();
    settings.system.box_lengths = [9.0, 9.0, 9.0];
    let particles = vec![Particle::new(Vec3::zero(), Vec3::new(0.3, 0.0, 0.0))];

    let mut sim = Simulation::new(request(particles, settings)).expect("construction");
    sim.initialise().expect("initialise");

    let mut crossing_times = Vec::new();
    for _ in 0..6 {
        let record = sim.step().expect("step");
        assert_eq!(
            record.kind,
            EventKind::CellBoundary,
            "only crossings may fire"
        );
        crossing_times.push(record.time);
    }

    // First face is half a cell away, then one cell per crossing
    let expected = [0.5 / 0.3, 1.5 / 0.3, 2.5 / 0.3, 3.5 / 0.3, 4.5 / 0.3, 5.5 / 0.3];
    for (got, want) in crossing_times.iter().zip(expected) {
        assert!((got - want).abs() < 1e-9, "crossing at {got}, expected {want}");
    }
}

/// Rescaling all pending event times by a factor and back is the identity
/// within floating-point tolerance: the rescaled run replays the baseline.
#[test]
fn rescale_round_trip_replays_the_baseline() {
    let particles = vec![
        Particle::new(Vec3::new(-2.0, 0.1, 0.0), Vec3::new(0.7, 0.05, 0.0)),
        Particle::new(Vec3::new(2.0, -0.1, 0.0), Vec3::new(-0.7, -0.05, 0.0)),
        Particle::new(Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, -0.4, 0.0)),
    ];

    let run = |rescale: bool| -> Vec<(f64, EventKind, Option<usize>)> {
        let mut sim = Simulation::new(request(particles.clone(), base_settings()))
            .expect("construction");
        sim.initialise().expect("initialise");
        if rescale {
            sim.rescale_event_times(2.0);
            sim.rescale_event_times(0.5);
        }
        (0..40)
            .map(|_| {
                let r = sim.step().expect("step");
                (r.time, r.kind, r.particle)
            })
            .collect()
    };

    let baseline = run(false);
    let rescaled = run(true);

    for ((tb, kb, pb), (tr, kr, pr)) in baseline.iter().zip(rescaled.iter()) {
        assert_eq!(kb, kr);
        assert_eq!(pb, pr);
        let tolerance = 1e-12 * tb.abs().max(1.0);
        assert!(
            (tb - tr).abs() <= tolerance,
            "times diverged: {tb} vs {tr}"
        );
    }
}

/// After a snapshot synchronises the system, the delayed-state bookkeeping
/// sums to zero exactly and subsequent events fire at unchanged times.
#[test]
fn snapshot_synchronisation_is_exact() {
    let mut settings = base_settings();
    settings.system.box_lengths = [9.0, 9.0, 9.0];
    settings.simulation.snapshot_period = Some(10.0);
    let particles = vec![
        Particle::new(Vec3::zero(), Vec3::new(0.3, 0.0, 0.0)),
        Particle::new(Vec3::new(0.0, 3.0, 0.0), Vec3::new(0.0, 0.0, 0.21)),
    ];

    let mut sim = Simulation::new(request(particles, settings)).expect("construction");
    sim.initialise().expect("initialise");

    // Run to the snapshot at t = 10
    let snapshot = loop {
        let record = sim.step().expect("step");
        if record.kind == EventKind::SystemEvent {
            break record;
        }
        assert!(record.time < 10.0 + 1e-12);
    };
    assert!((snapshot.time - 10.0).abs() < 1e-12);

    // The snapshot synchronised everything: no outstanding lag at all
    assert_eq!(sim.delayed_states().accumulator(), 0.0);
    assert_eq!(sim.delayed_states().total_pec_time(), 0.0);

    // Particle 0 crossed at 1.667, 5.0, 8.333; its next crossing is at
    // 11.667, i.e. dt = 1.667 measured from the snapshot
    let next = loop {
        let record = sim.step().expect("step");
        if record.kind == EventKind::CellBoundary && record.particle == Some(0) {
            break record;
        }
    };
    assert!(
        (next.time - 3.5 / 0.3).abs() < 1e-9,
        "next crossing at {}",
        next.time
    );
}

/// A particle crossing the sliding y+ boundary re-enters shifted by the
/// boundary displacement and loses the boundary velocity.
#[test]
fn shearing_reentry_applies_boundary_shift() {
    let shear_rate = 0.25;
    let mut settings = base_settings();
    settings.neighbour.kind = edmd_lib::neighbour::GridKind::Shearing;
    settings.system.shear_rate = shear_rate;

    // Particle 0 climbs toward the y+ face; particle 1 waits near where
    // the shifted image will land
    let particles = vec![
        Particle::new(Vec3::new(1.5, 4.0, 0.5), Vec3::new(0.0, 1.0, 0.0)),
        Particle::new(Vec3::new(0.4, -4.6, 0.5), Vec3::zero()),
    ];

    let mut sim = Simulation::new(request(particles, settings)).expect("construction");
    sim.initialise().expect("initialise");

    // Step until particle 0 wraps through the boundary
    let mut wrapped_at = None;
    for _ in 0..20 {
        let record = sim.step().expect("step");
        if record.kind == EventKind::CellBoundary && record.particle == Some(0) {
            sim.synchronise();
            let y = sim.particles()[0].position.y;
            if y < 0.0 {
                wrapped_at = Some(record.time);
                break;
            }
        }
    }
    let time = wrapped_at.expect("particle must wrap within 20 events");

    // Re-entry position: x shifted back by the boundary displacement
    let shift = (shear_rate * time).rem_euclid(10.0);
    let expected_x = {
        let mut x = 1.5 - shift;
        x -= 10.0 * (x / 10.0).round();
        x
    };
    let p0 = sim.particles()[0];
    assert!(
        (p0.position.x - expected_x).abs() < 1e-9,
        "re-entered at x = {}, expected {}",
        p0.position.x,
        expected_x
    );
    // And the x-velocity lost the boundary velocity
    assert!((p0.velocity.x - -shear_rate * 10.0).abs() < 1e-9);
}
