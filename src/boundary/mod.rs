//! # Boundary Module - Periodic Simulation Box
//!
//! This module models the periodic simulation box every other component works
//! inside: the cell grids tile it, free streaming wraps through it and pair
//! predictions use its minimum-image convention.
//!
//! Two boundary conditions are supported:
//!
//! - **Periodic**: plain wrap-around on every axis.
//! - **Lees–Edwards**: periodic with a time-dependent x-shift applied when a
//!   particle wraps through the y faces, which imposes a uniform shear flow.
//!   Crossing the y+ face also removes the relative boundary velocity from
//!   the particle's x-velocity.
//!
//! The box is centred on the origin, spanning `[-L/2, L/2)` on each axis.


use crate::vector::Vec3;
use serde::{Deserialize, Serialize};

/// Boundary condition selector for the simulation box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BoundaryKind {
    /// Standard periodic images on all three axes.
    Periodic,
    /// Lees–Edwards sliding-brick boundaries with the given shear rate.
    ///
    /// The image above the box is displaced by `shear_rate * t` along x and
    /// moves at `shear_rate * L_y` relative to the primary image.
    LeesEdwards { shear_rate: f64 },
}

/// The periodic simulation box.
///
/// Owns the box edge lengths and the boundary condition. All geometry
/// helpers that depend on images (wrapping, minimum image separation) live
/// here so that the cell grids and the dynamics agree on conventions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimBox {
    /// Edge lengths of the box along x, y, z.
    pub lengths: Vec3,
    /// Active boundary condition.
    pub boundary: BoundaryKind,
}

impl SimBox {
    /// Creates a periodic box with the given edge lengths.
    ///
    /// # Panics
    ///
    /// Panics if any edge length is not strictly positive.
    pub fn periodic(lengths: Vec3) -> Self {
        assert!(
            lengths.x > 0.0 && lengths.y > 0.0 && lengths.z > 0.0,
            "Simulation box requires positive edge lengths"
        );
        SimBox {
            lengths,
            boundary: BoundaryKind::Periodic,
        }
    }

    /// Creates a box with Lees–Edwards boundaries and the given shear rate.
    pub fn shearing(lengths: Vec3, shear_rate: f64) -> Self {
        let mut bx = SimBox::periodic(lengths);
        bx.boundary = BoundaryKind::LeesEdwards { shear_rate };
        bx
    }

    /// Creates a cubic periodic box with edge length `l`.
    pub fn cubic(l: f64) -> Self {
        SimBox::periodic(Vec3::new(l, l, l))
    }

    /// Lowest corner of the box (the cell grids anchor their lattice here).
    #[inline]
    pub fn origin(&self) -> Vec3 {
        self.lengths * -0.5
    }

    /// True when all three edge lengths agree, which the Morton grid
    /// requires.
    pub fn is_cubic(&self) -> bool {
        self.lengths.x == self.lengths.y && self.lengths.y == self.lengths.z
    }

    /// Displacement of the y+ boundary image along x at simulation time `t`,
    /// reduced into `[0, L_x)`. Zero for plain periodic boundaries.
    #[inline]
    pub fn boundary_shift(&self, time: f64) -> f64 {
        match self.boundary {
            BoundaryKind::Periodic => 0.0,
            BoundaryKind::LeesEdwards { shear_rate } => {
                (shear_rate * time).rem_euclid(self.lengths.x)
            }
        }
    }

    /// Wraps a particle state back into the primary image.
    ///
    /// Under Lees–Edwards boundaries a y-wrap also applies the image shift to
    /// the x-position and removes the boundary velocity from the x-velocity,
    /// so the velocity must be passed alongside the position.
    pub fn apply(&self, position: &mut Vec3, velocity: &mut Vec3, time: f64) {
        if let BoundaryKind::LeesEdwards { shear_rate } = self.boundary {
            // Count whole y-images first; each carries an x-shift
            let images = (position.y / self.lengths.y).round();
            if images != 0.0 {
                position.x -= images * self.boundary_shift(time);
                velocity.x -= images * shear_rate * self.lengths.y;
            }
        }
        for axis in 0..3 {
            let l = self.lengths[axis];
            position[axis] -= l * (position[axis] / l).round();
        }
    }

    /// Returns the position wrapped into the primary image without touching
    /// any velocity. Used for binning positions into cells.
    pub fn image_of(&self, position: Vec3, time: f64) -> Vec3 {
        let mut pos = position;
        let mut vel = Vec3::zero();
        self.apply(&mut pos, &mut vel, time);
        pos
    }

    /// Minimum-image separation vector.
    ///
    /// Under Lees–Edwards boundaries the y-wrap carries the x-shift of the
    /// sliding image before x itself is wrapped.
    pub fn minimum_image(&self, delta: Vec3, time: f64) -> Vec3 {
        let mut d = delta;
        if let BoundaryKind::LeesEdwards { .. } = self.boundary {
            let images = (d.y / self.lengths.y).round();
            if images != 0.0 {
                d.x -= images * self.boundary_shift(time);
            }
        }
        for axis in 0..3 {
            let l = self.lengths[axis];
            d[axis] -= l * (d[axis] / l).round();
        }
        d
    }

    /// Minimum-image separation and relative velocity of a pair.
    ///
    /// When the nearest image of a pair straddles the sliding y boundary,
    /// the image's velocity differs by the boundary velocity; collision
    /// prediction must see that corrected relative velocity or it will miss
    /// (or invent) approaches across the boundary.
    pub fn minimum_image_pair(&self, delta_r: Vec3, delta_v: Vec3, time: f64) -> (Vec3, Vec3) {
        let mut dr = delta_r;
        let mut dv = delta_v;
        if let BoundaryKind::LeesEdwards { shear_rate } = self.boundary {
            let images = (dr.y / self.lengths.y).round();
            if images != 0.0 {
                dr.x -= images * self.boundary_shift(time);
                dv.x -= images * shear_rate * self.lengths.y;
            }
        }
        for axis in 0..3 {
            let l = self.lengths[axis];
            dr[axis] -= l * (dr[axis] / l).round();
        }
        (dr, dv)
    }
}
