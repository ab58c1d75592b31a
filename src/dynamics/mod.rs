//! # Dynamics Module - Time Operators for the System
//!
//! This module answers the physics questions the scheduler asks: when will
//! this pair touch, when does this particle leave its cell, what happens at
//! contact. The engine itself only routes events; every number with units
//! comes from here.
//!
//! The [`Dynamics`] trait is the capability interface the engine calls; it
//! names only the verbs the scheduler needs. [`HardSphereDynamics`] is the
//! concrete implementation: identical unit-mass hard spheres under
//! gravity-free free flight with perfectly elastic collisions.
//!
//! The [`delayed`] submodule carries the lazy-streaming bookkeeping that
//! lets stored particle positions lag the global clock (see there).

// Delayed-state (lazy streaming) manager
pub mod delayed;
// Unit tests
pub mod tests;

pub use delayed::DelayedStates;

use crate::boundary::SimBox;
use crate::local::Wall;
use crate::neighbour::CellFace;
use crate::particle::Particle;
use crate::vector::Vec3;

/// Result of executing a pair collision.
#[derive(Debug, Clone, Copy)]
pub struct PairOutcome {
    /// Kinetic energy change (zero for elastic rules).
    pub delta_ke: f64,
    /// Post-collision velocities of the two participants.
    pub velocities: (Vec3, Vec3),
}

/// Result of executing a wall collision.
#[derive(Debug, Clone, Copy)]
pub struct LocalOutcome {
    /// Kinetic energy change (zero for elastic rules).
    pub delta_ke: f64,
    /// Post-collision velocity of the participant.
    pub velocity: Vec3,
}

/// The physics collaborator interface.
///
/// Prediction methods take particles *synchronised to the same instant*
/// unless stated otherwise; returned times are relative to that instant.
/// `None` means the event never happens.
pub trait Dynamics {
    /// Advances a particle along its free trajectory by `dt`. Exact, not
    /// integrated: calling once with `dt` equals calling twice with halves.
    fn stream_particle(&self, particle: &mut Particle, dt: f64);

    /// The position a particle would reach after free-streaming `dt`,
    /// without modifying it.
    fn position_after(&self, particle: &Particle, dt: f64) -> Vec3;

    /// Time until the pair next touches, with both states at the same
    /// instant. Uses the minimum-image convention of `bounds`.
    fn predict_pair(&self, p: &Particle, q: &Particle, bounds: &SimBox, time: f64) -> Option<f64>;

    /// Applies the collision rule to a touching pair.
    fn execute_pair(
        &self,
        p: &mut Particle,
        q: &mut Particle,
        bounds: &SimBox,
        time: f64,
    ) -> PairOutcome;

    /// Time until the particle's centre leaves the cell box spanning
    /// `[origin, origin + extent]`, and the face it leaves through.
    ///
    /// Works on the particle's *stored* (possibly lagging) state - do NOT
    /// synchronise first. The caller converts into the current frame by
    /// subtracting the particle's delay, which is cheaper than streaming
    /// the particle for every virtual event.
    fn predict_cell_exit(&self, particle: &Particle, origin: Vec3, extent: Vec3) -> (f64, CellFace);

    /// Time until the particle hits the wall, state at the current instant.
    fn predict_local(&self, particle: &Particle, wall: &Wall) -> Option<f64>;

    /// Applies the wall collision rule.
    fn execute_local(&self, particle: &mut Particle, wall: &Wall) -> LocalOutcome;

    /// The largest distance at which anything can interact; drives cell
    /// sizing.
    fn longest_interaction_distance(&self) -> f64;

    /// Kinetic energy of one particle.
    fn kinetic_energy(&self, particle: &Particle) -> f64;

    /// Kinetic energy of the whole system.
    fn system_kinetic_energy(&self, particles: &[Particle]) -> f64 {
        particles.iter().map(|p| self.kinetic_energy(p)).sum()
    }
}

/// Identical unit-mass hard spheres, gravity-free, perfectly elastic.
#[derive(Debug, Clone, Copy)]
pub struct HardSphereDynamics {
    /// Sphere diameter: the contact distance of a pair.
    pub diameter: f64,
}

impl HardSphereDynamics {
    /// Creates hard-sphere dynamics with the given diameter.
    ///
    /// # Panics
    ///
    /// Panics unless the diameter is strictly positive.
    pub fn new(diameter: f64) -> Self {
        assert!(diameter > 0.0, "Sphere diameter must be positive");
        HardSphereDynamics { diameter }
    }
}

impl Dynamics for HardSphereDynamics {
    fn stream_particle(&self, particle: &mut Particle, dt: f64) {
        particle.position += particle.velocity * dt;
    }

    fn position_after(&self, particle: &Particle, dt: f64) -> Vec3 {
        particle.position + particle.velocity * dt
    }

    fn predict_pair(&self, p: &Particle, q: &Particle, bounds: &SimBox, time: f64) -> Option<f64> {
        let (rij, vij) = bounds.minimum_image_pair(
            p.position - q.position,
            p.velocity - q.velocity,
            time,
        );

        // Receding pairs never collide
        let b = rij.dot(&vij);
        if b >= 0.0 {
            return None;
        }

        let v2 = vij.norm_squared();
        let r2 = rij.norm_squared();
        let d2 = self.diameter * self.diameter;

        let discriminant = b * b - v2 * (r2 - d2);
        if discriminant < 0.0 {
            // Closest approach stays outside contact
            return None;
        }

        Some((-b - discriminant.sqrt()) / v2)
    }

    fn execute_pair(
        &self,
        p: &mut Particle,
        q: &mut Particle,
        bounds: &SimBox,
        time: f64,
    ) -> PairOutcome {
        let (rij, vij) = bounds.minimum_image_pair(
            p.position - q.position,
            p.velocity - q.velocity,
            time,
        );

        // Elastic impulse for equal masses: exchange the normal component
        let normal = rij.normalize();
        let approach = vij.dot(&normal);
        let impulse = normal * approach;

        p.velocity -= impulse;
        q.velocity += impulse;

        PairOutcome {
            delta_ke: 0.0,
            velocities: (p.velocity, q.velocity),
        }
    }

    fn predict_cell_exit(&self, particle: &Particle, origin: Vec3, extent: Vec3) -> (f64, CellFace) {
        let mut best_dt = f64::INFINITY;
        let mut best_face = CellFace {
            axis: 0,
            positive: true,
        };

        for axis in 0..3 {
            let v = particle.velocity[axis];
            if v == 0.0 {
                continue;
            }
            let positive = v > 0.0;
            let target = if positive {
                origin[axis] + extent[axis]
            } else {
                origin[axis]
            };
            // A particle sitting on (or marginally past) a face leaves
            // immediately; clamping keeps exact-on-face crossings
            // deterministic instead of producing tiny negative times
            let dt = ((target - particle.position[axis]) / v).max(0.0);
            if dt < best_dt {
                best_dt = dt;
                best_face = CellFace { axis, positive };
            }
        }

        (best_dt, best_face)
    }

    fn predict_local(&self, particle: &Particle, wall: &Wall) -> Option<f64> {
        let r = wall.distance_to(particle.position);
        let v = wall.normal.dot(&particle.velocity);
        // Only approaching particles collide; a particle sitting at contact
        // after reflecting is receding and must not re-fire
        if r * v >= 0.0 {
            return None;
        }
        // Contact happens half a diameter out, on the particle's side
        let contact = 0.5 * self.diameter * r.signum();
        let dt = (contact - r) / v;
        if dt >= 0.0 { Some(dt) } else { None }
    }

    fn execute_local(&self, particle: &mut Particle, wall: &Wall) -> LocalOutcome {
        let normal_component = wall.normal.dot(&particle.velocity);
        particle.velocity -= wall.normal * (2.0 * normal_component);
        LocalOutcome {
            delta_ke: 0.0,
            velocity: particle.velocity,
        }
    }

    fn longest_interaction_distance(&self) -> f64 {
        self.diameter
    }

    fn kinetic_energy(&self, particle: &Particle) -> f64 {
        0.5 * particle.velocity.norm_squared()
    }
}
