//! # Particle Module - Simulation State Store
//!
//! This module defines the `Particle` value type and the `ParticleStore`
//! that owns the contiguous particle array together with the simulation box.
//! Every other component refers to particles only through their dense
//! `ParticleId`; the store is the single owner of positions and velocities.
//!
//! Positions held here are *lazy*: between events a particle's stored
//! position is allowed to lag the global clock, and the delayed-state
//! manager brings it forward on demand. Consumers must therefore never read
//! a position directly without synchronising first.

use crate::boundary::SimBox;
use crate::vector::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::ops::{Index, IndexMut};

/// Dense particle handle in `[0, N)`.
pub type ParticleId = usize;

/// A single hard particle: position and velocity in Cartesian coordinates.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct Particle {
    /// Position vector, wrapped into the primary box image.
    pub position: Vec3,
    /// Velocity vector.
    pub velocity: Vec3,
}

impl Particle {
    /// Creates a new particle from position and velocity vectors.
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        Particle { position, velocity }
    }
}

impl Display for Particle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Particle {{ pos: ({:.3}, {:.3}, {:.3}), vel: ({:.3}, {:.3}, {:.3}), |v|: {:.3} }}",
            self.position.x,
            self.position.y,
            self.position.z,
            self.velocity.x,
            self.velocity.y,
            self.velocity.z,
            self.velocity.norm()
        )
    }
}

/// Owner of the particle array and the simulation box.
///
/// The particle count is fixed at construction; the engine never adds or
/// removes particles at runtime. Mutable access is granted per particle (or
/// per disjoint pair, which collision execution needs) so the borrow rules
/// mirror the engine's "only the event participants change" contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleStore {
    particles: Vec<Particle>,
    /// The periodic box all particles live in.
    pub bounds: SimBox,
}

impl ParticleStore {
    /// Creates a store from an initial configuration.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is empty, matching the engine's
    /// requirement of at least one particle.
    pub fn new(particles: Vec<Particle>, bounds: SimBox) -> Self {
        if particles.is_empty() {
            panic!("Simulation requires at least one particle")
        }
        ParticleStore { particles, bounds }
    }

    /// Number of particles in the store.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// True when the store holds no particles. Present for completeness;
    /// the constructor refuses empty configurations.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Immutable view of the whole particle array.
    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }

    /// Iterator over all particles.
    pub fn iter(&self) -> std::slice::Iter<'_, Particle> {
        self.particles.iter()
    }

    /// Mutable references to two distinct particles.
    ///
    /// # Panics
    ///
    /// Panics if `a == b` or either index is out of range.
    pub fn pair_mut(&mut self, a: ParticleId, b: ParticleId) -> (&mut Particle, &mut Particle) {
        assert!(a != b, "pair_mut requires two distinct particles");
        if a < b {
            let (lo, hi) = self.particles.split_at_mut(b);
            (&mut lo[a], &mut hi[0])
        } else {
            let (lo, hi) = self.particles.split_at_mut(a);
            (&mut hi[0], &mut lo[b])
        }
    }
}

impl Index<ParticleId> for ParticleStore {
    type Output = Particle;
    #[inline]
    fn index(&self, id: ParticleId) -> &Particle {
        &self.particles[id]
    }
}

impl IndexMut<ParticleId> for ParticleStore {
    #[inline]
    fn index_mut(&mut self, id: ParticleId) -> &mut Particle {
        &mut self.particles[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::SimBox;

    #[test]
    fn pair_mut_returns_requested_order() {
        let particles = vec![
            Particle::new(Vec3::new(1.0, 0.0, 0.0), Vec3::zero()),
            Particle::new(Vec3::new(2.0, 0.0, 0.0), Vec3::zero()),
            Particle::new(Vec3::new(3.0, 0.0, 0.0), Vec3::zero()),
        ];
        let mut store = ParticleStore::new(particles, SimBox::cubic(10.0));
        let (p2, p0) = store.pair_mut(2, 0);
        assert_eq!(p2.position.x, 3.0);
        assert_eq!(p0.position.x, 1.0);
        p2.velocity.x = -1.0;
        p0.velocity.x = 1.0;
        assert_eq!(store[2].velocity.x, -1.0);
        assert_eq!(store[0].velocity.x, 1.0);
    }

    #[test]
    #[should_panic(expected = "at least one particle")]
    fn empty_store_panics() {
        ParticleStore::new(Vec::new(), SimBox::cubic(1.0));
    }
}
