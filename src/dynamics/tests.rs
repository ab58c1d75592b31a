#[cfg(test)]
mod units {
    use crate::boundary::SimBox;
    use crate::dynamics::{DelayedStates, Dynamics, HardSphereDynamics};
    use crate::local::Wall;
    use crate::particle::{Particle, ParticleStore};
    use crate::vector::Vec3;

    fn dynamics() -> HardSphereDynamics {
        HardSphereDynamics::new(1.0)
    }

    fn big_box() -> SimBox {
        SimBox::cubic(100.0)
    }

    #[test]
    fn streaming_is_exact_free_flight() {
        let mut p = Particle::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.5, 0.0));
        dynamics().stream_particle(&mut p, 2.0);
        assert_eq!(p.position, Vec3::new(-1.0, 3.0, 3.0));
        // Velocity untouched by free flight
        assert_eq!(p.velocity, Vec3::new(-1.0, 0.5, 0.0));
    }

    #[test]
    fn position_after_matches_streaming() {
        let p = Particle::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(3.0, -2.0, 1.0));
        let mut streamed = p;
        dynamics().stream_particle(&mut streamed, 0.75);
        assert_eq!(dynamics().position_after(&p, 0.75), streamed.position);
    }

    #[test]
    fn head_on_pair_collides_at_contact_distance() {
        // Two unit spheres 4 apart closing at relative speed 2: surfaces
        // meet after (4 - 1) / 2 = 1.5
        let p = Particle::new(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let q = Particle::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        let dt = dynamics()
            .predict_pair(&p, &q, &big_box(), 0.0)
            .expect("head-on pair must collide");
        assert!((dt - 1.5).abs() < 1e-12);
    }

    #[test]
    fn receding_pair_never_collides() {
        let p = Particle::new(Vec3::new(-2.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        let q = Particle::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(dynamics().predict_pair(&p, &q, &big_box(), 0.0).is_none());
    }

    #[test]
    fn glancing_miss_never_collides() {
        // Approaching along x but offset 2 in y: closest approach exceeds
        // the unit contact distance
        let p = Particle::new(Vec3::new(-5.0, 2.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let q = Particle::new(Vec3::new(5.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        assert!(dynamics().predict_pair(&p, &q, &big_box(), 0.0).is_none());
    }

    #[test]
    fn pair_prediction_uses_periodic_images() {
        // Nearest approach is through the box face, not across the middle
        let bx = SimBox::cubic(10.0);
        let p = Particle::new(Vec3::new(-4.5, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        let q = Particle::new(Vec3::new(4.5, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let dt = dynamics()
            .predict_pair(&p, &q, &bx, 0.0)
            .expect("pair approaches through the boundary");
        // Image separation 1.0, relative speed 2, contact at gap 1 => 0
        // separation beyond contact: gap is 1.0 so dt = 0
        assert!((dt - 0.0).abs() < 1e-12);
    }

    #[test]
    fn elastic_collision_exchanges_normal_velocities() {
        let bx = big_box();
        let mut p = Particle::new(Vec3::new(-0.5, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        let mut q = Particle::new(Vec3::new(0.5, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        let before_ke =
            dynamics().kinetic_energy(&p) + dynamics().kinetic_energy(&q);
        let outcome = dynamics().execute_pair(&mut p, &mut q, &bx, 0.0);

        assert_eq!(p.velocity, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(q.velocity, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(outcome.delta_ke, 0.0);
        let after_ke = dynamics().kinetic_energy(&p) + dynamics().kinetic_energy(&q);
        assert!((before_ke - after_ke).abs() < 1e-12);
    }

    #[test]
    fn oblique_collision_conserves_energy_and_momentum() {
        let bx = big_box();
        let mut p = Particle::new(Vec3::new(-0.4, -0.3, 0.0), Vec3::new(1.0, 0.5, 0.0));
        let mut q = Particle::new(Vec3::new(0.4, 0.3, 0.0), Vec3::new(-0.2, 0.1, 0.0));
        let ke0 = dynamics().kinetic_energy(&p) + dynamics().kinetic_energy(&q);
        let mom0 = p.velocity + q.velocity;

        dynamics().execute_pair(&mut p, &mut q, &bx, 0.0);

        let ke1 = dynamics().kinetic_energy(&p) + dynamics().kinetic_energy(&q);
        let mom1 = p.velocity + q.velocity;
        assert!((ke0 - ke1).abs() < 1e-12);
        assert!((mom0 - mom1).norm() < 1e-12);
    }

    #[test]
    fn cell_exit_picks_earliest_face() {
        let p = Particle::new(Vec3::new(0.25, 0.5, 0.5), Vec3::new(1.0, -0.25, 0.0));
        let (dt, face) =
            dynamics().predict_cell_exit(&p, Vec3::zero(), Vec3::new(1.0, 1.0, 1.0));
        // x face at 1.0 reached after 0.75; y face at 0.0 after 2.0
        assert!((dt - 0.75).abs() < 1e-12);
        assert_eq!(face.axis, 0);
        assert!(face.positive);
    }

    #[test]
    fn cell_exit_on_face_is_immediate_and_deterministic() {
        let p = Particle::new(Vec3::new(1.0, 0.5, 0.5), Vec3::new(1.0, 0.0, 0.0));
        let (dt, face) =
            dynamics().predict_cell_exit(&p, Vec3::zero(), Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(dt, 0.0);
        assert_eq!(face.axis, 0);
        assert!(face.positive);
    }

    #[test]
    fn stationary_particle_never_exits() {
        let p = Particle::new(Vec3::new(0.5, 0.5, 0.5), Vec3::zero());
        let (dt, _) = dynamics().predict_cell_exit(&p, Vec3::zero(), Vec3::new(1.0, 1.0, 1.0));
        assert!(dt.is_infinite());
    }

    #[test]
    fn wall_prediction_and_reflection() {
        let wall = Wall::new(Vec3::zero(), Vec3::x_hat());
        let mut p = Particle::new(Vec3::new(3.0, 0.0, 0.0), Vec3::new(-1.0, 0.5, 0.0));
        // Contact at x = 0.5 (half a diameter), so after 2.5
        let dt = dynamics().predict_local(&p, &wall).expect("approaching wall");
        assert!((dt - 2.5).abs() < 1e-12);

        dynamics().stream_particle(&mut p, dt);
        let outcome = dynamics().execute_local(&mut p, &wall);
        assert_eq!(p.velocity, Vec3::new(1.0, 0.5, 0.0));
        assert_eq!(outcome.delta_ke, 0.0);
    }

    #[test]
    fn wall_ignores_receding_particles() {
        let wall = Wall::new(Vec3::zero(), Vec3::x_hat());
        let p = Particle::new(Vec3::new(3.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!(dynamics().predict_local(&p, &wall).is_none());
    }

    fn delayed_fixture() -> (ParticleStore, DelayedStates, HardSphereDynamics) {
        let particles = vec![
            Particle::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)),
            Particle::new(Vec3::new(5.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0)),
            Particle::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -1.0)),
        ];
        let store = ParticleStore::new(particles, big_box());
        let delayed = DelayedStates::new(3);
        (store, delayed, dynamics())
    }

    #[test]
    fn update_streams_only_the_requested_particle() {
        let (mut store, mut delayed, dyn_) = delayed_fixture();
        delayed.stream(2.0);
        delayed.update(0, &mut store, &dyn_, 2.0);

        assert_eq!(store[0].position, Vec3::new(2.0, 0.0, 0.0));
        // The others still hold their stale positions
        assert_eq!(store[1].position, Vec3::new(5.0, 0.0, 0.0));
        assert!(delayed.is_up_to_date(0));
        assert!(!delayed.is_up_to_date(1));
        assert_eq!(delayed.delay_of(1), 2.0);
    }

    #[test]
    fn update_is_idempotent() {
        let (mut store, mut delayed, dyn_) = delayed_fixture();
        delayed.stream(1.5);
        delayed.update(0, &mut store, &dyn_, 1.5);
        let once = store[0].position;
        delayed.update(0, &mut store, &dyn_, 1.5);
        assert_eq!(store[0].position, once);
    }

    #[test]
    fn update_all_clears_every_delay_exactly() {
        let (mut store, mut delayed, dyn_) = delayed_fixture();
        delayed.stream(0.5);
        delayed.update(1, &mut store, &dyn_, 0.5);
        delayed.stream(0.75);
        delayed.update_all(&mut store, &dyn_, 1.25);

        assert_eq!(delayed.accumulator(), 0.0);
        assert_eq!(delayed.total_pec_time(), 0.0);
        for p in 0..delayed.len() {
            assert!(delayed.is_up_to_date(p));
        }
        assert_eq!(store[0].position, Vec3::new(1.25, 0.0, 0.0));
        assert_eq!(store[1].position, Vec3::new(5.0, 1.5, 0.0));
    }

    #[test]
    fn accumulator_fold_is_invisible_to_delays() {
        let mut store = ParticleStore::new(
            vec![Particle::new(Vec3::zero(), Vec3::new(1.0, 0.0, 0.0))],
            big_box(),
        );
        // One particle: the fold runs every 10 streams
        let mut delayed = DelayedStates::new(1);
        let mut total = 0.0;
        for i in 0..25 {
            let dt = 0.1 * (i % 3 + 1) as f64;
            delayed.stream(dt);
            total += dt;
        }
        assert!((delayed.delay_of(0) - total).abs() < 1e-12);
        let dyn_ = dynamics();
        delayed.update(0, &mut store, &dyn_, total);
        assert!((store[0].position.x - total).abs() < 1e-12);
        assert!(delayed.is_up_to_date(0));
    }

    #[test]
    fn update_wraps_through_the_boundary() {
        let mut store = ParticleStore::new(
            vec![Particle::new(Vec3::new(4.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0))],
            SimBox::cubic(10.0),
        );
        let mut delayed = DelayedStates::new(1);
        let dyn_ = dynamics();
        delayed.stream(2.0);
        delayed.update(0, &mut store, &dyn_, 2.0);
        // 4 + 2 = 6 wraps to -4
        assert_eq!(store[0].position, Vec3::new(-4.0, 0.0, 0.0));
    }
}
