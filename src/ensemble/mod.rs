//! # Ensemble Module - Initial Packing Generation
//!
//! This module builds initial conditions for simulation runs: random
//! non-overlapping sphere packings in a periodic box with Maxwell–Boltzmann
//! velocities.
//!
//! ## Key Concepts
//!
//! ### Rejection Sampling
//! Candidate positions are drawn uniformly in the box and discarded when
//! they overlap an already-placed sphere (using the minimum-image distance),
//! so the packing respects the hard-sphere constraint from the first event.
//!
//! ### Reproducibility
//! Every request carries an RNG seed; the same request always produces the
//! same packing, which the deterministic engine turns into the same event
//! sequence.
//!
//! ### Velocity Distribution
//! Velocity components are drawn from a normal distribution at the
//! requested temperature (unit mass, k_B = 1), then the net momentum is
//! removed so the packing carries no centre-of-mass drift.

use crate::boundary::SimBox;
use crate::particle::Particle;
use crate::vector::Vec3;
use rand::prelude::*;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};
use std::sync::mpsc;

/// Parameters used for packing generation.
#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub struct PackingParams {
    /// Number of spheres to place.
    pub n_particles: usize,
    /// Box edge lengths.
    pub box_lengths: [f64; 3],
    /// Sphere diameter (the minimum pair distance).
    pub diameter: f64,
    /// Temperature setting the velocity scale.
    pub temperature: f64,
    /// RNG seed.
    pub seed: u64,
}

/// Request for packing generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackingRequest {
    /// Unique identifier for this packing.
    pub id: usize,
    /// Tag name (used for file naming and batch grouping).
    pub tag: String,
    /// Generation parameters.
    pub params: PackingParams,
}

/// Generated packing with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackingResult {
    /// Unique identifier for this packing.
    pub id: usize,
    /// Tag name.
    pub tag: String,
    /// The generated particles.
    pub particles: Vec<Particle>,
    /// Generation parameters, for reference.
    pub params: PackingParams,
    /// Unix timestamp of generation.
    pub created_at: u64,
}


/// Placement attempts per particle before giving up on the density.
const MAX_ATTEMPTS_PER_PARTICLE: usize = 10_000;

/// Generates a packing and transmits it over the channel.
///
/// # Arguments
///
/// * `request` - Generation request containing all parameters and metadata
/// * `tx` - Sender for the completed packing
///
/// # Errors
///
/// Returns a message when the requested density cannot be reached by
/// rejection sampling or when the receiver has disconnected.
pub fn generate(
    request: PackingRequest,
    tx: mpsc::Sender<PackingResult>,
) -> Result<(), String> {
    let particles = generate_particles(&request.params)?;

    let result = PackingResult {
        id: request.id,
        tag: request.tag,
        particles,
        params: request.params,
        created_at: std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    };

    tx.send(result)
        .map_err(|err| format!("Failed to send packing result: {err}"))
}

/// Builds the particle list for the given parameters.
pub fn generate_particles(params: &PackingParams) -> Result<Vec<Particle>, String> {
    if params.n_particles == 0 {
        return Err("A packing requires at least one particle".into());
    }
    if params.diameter <= 0.0 {
        return Err(format!("Diameter must be positive, got {}", params.diameter));
    }

    let bounds = SimBox::periodic(Vec3::from_array(params.box_lengths));
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut positions: Vec<Vec3> = Vec::with_capacity(params.n_particles);
    let d2 = params.diameter * params.diameter;

    // Rejection sampling: draw uniform positions, refuse overlaps
    for placed in 0..params.n_particles {
        let mut attempts = 0;
        loop {
            let candidate = Vec3::new(
                rng.random_range(-0.5 * params.box_lengths[0]..0.5 * params.box_lengths[0]),
                rng.random_range(-0.5 * params.box_lengths[1]..0.5 * params.box_lengths[1]),
                rng.random_range(-0.5 * params.box_lengths[2]..0.5 * params.box_lengths[2]),
            );

            let overlaps = positions.iter().any(|&existing| {
                bounds.minimum_image(candidate - existing, 0.0).norm_squared() < d2
            });

            if !overlaps {
                positions.push(candidate);
                break;
            }

            attempts += 1;
            if attempts >= MAX_ATTEMPTS_PER_PARTICLE {
                return Err(format!(
                    "Failed to place particle {placed} after {MAX_ATTEMPTS_PER_PARTICLE} \
                     attempts; the requested density is too high for rejection sampling"
                ));
            }
        }
    }

    // Maxwell-Boltzmann velocities at the requested temperature
    let sigma = params.temperature.max(0.0).sqrt();
    let normal = Normal::new(0.0, sigma)
        .map_err(|err| format!("Invalid velocity distribution: {err}"))?;

    let mut velocities: Vec<Vec3> = (0..params.n_particles)
        .map(|_| {
            Vec3::new(
                normal.sample(&mut rng),
                normal.sample(&mut rng),
                normal.sample(&mut rng),
            )
        })
        .collect();

    // Remove the centre-of-mass drift
    let drift = velocities
        .iter()
        .fold(Vec3::zero(), |acc, &v| acc + v)
        / params.n_particles as f64;
    for v in &mut velocities {
        *v -= drift;
    }

    Ok(positions
        .into_iter()
        .zip(velocities)
        .map(|(position, velocity)| Particle::new(position, velocity))
        .collect())
}
