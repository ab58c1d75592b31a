//! # Local Module - Wall Objects
//!
//! Wall-like obstacles that live at fixed places in the box and interact
//! with whatever particles come near. Unlike pair interactions they are not
//! discovered through other particles: the cell grid registers, per cell,
//! which walls overlap that cell's collision box, and particles inherit
//! wall candidates from their cell.
//!
//! Only planar walls are modelled; that is all the engine core needs to
//! exercise the local-event path end to end.

use crate::vector::Vec3;
use serde::{Deserialize, Serialize};

/// An infinite planar wall.
///
/// The plane passes through `origin` with unit `normal`; particles reflect
/// elastically off either side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    /// A point on the plane.
    pub origin: Vec3,
    /// Unit normal of the plane.
    pub normal: Vec3,
}

impl Wall {
    /// Creates a wall through `origin` with the given normal (normalised
    /// internally).
    ///
    /// # Panics
    ///
    /// Panics if `normal` has zero length.
    pub fn new(origin: Vec3, normal: Vec3) -> Self {
        let unit = normal.normalize();
        assert!(unit.norm_squared() > 0.0, "Wall normal must be non-zero");
        Wall {
            origin,
            normal: unit,
        }
    }

    /// Signed distance from `point` to the plane.
    #[inline]
    pub fn distance_to(&self, point: Vec3) -> f64 {
        self.normal.dot(&(point - self.origin))
    }

    /// True when the wall's interaction shell (plane thickened by
    /// `range` on both sides) intersects the axis-aligned box spanning
    /// `[origin, origin + extent]`.
    ///
    /// Used by the cell grids to decide which cells see this wall: the
    /// signed corner distances straddle the shell exactly when some corner
    /// lies on or below `+range` and another on or above `-range`.
    pub fn overlaps_box(&self, origin: Vec3, extent: Vec3, range: f64) -> bool {
        let mut min_d = f64::INFINITY;
        let mut max_d = f64::NEG_INFINITY;
        for corner in 0..8 {
            let point = Vec3::new(
                origin.x + if corner & 1 != 0 { extent.x } else { 0.0 },
                origin.y + if corner & 2 != 0 { extent.y } else { 0.0 },
                origin.z + if corner & 4 != 0 { extent.z } else { 0.0 },
            );
            let d = self.distance_to(point);
            min_d = min_d.min(d);
            max_d = max_d.max(d);
        }
        min_d <= range && max_d >= -range
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_signed_along_the_normal() {
        let wall = Wall::new(Vec3::new(0.0, 2.0, 0.0), Vec3::y_hat());
        assert_eq!(wall.distance_to(Vec3::new(5.0, 3.0, -1.0)), 1.0);
        assert_eq!(wall.distance_to(Vec3::new(0.0, 0.0, 0.0)), -2.0);
    }

    #[test]
    fn constructor_normalises_the_normal() {
        let wall = Wall::new(Vec3::zero(), Vec3::new(0.0, 0.0, 4.0));
        assert!((wall.normal.norm() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn overlap_detects_straddling_and_misses_distant_boxes() {
        let wall = Wall::new(Vec3::zero(), Vec3::x_hat());
        // Box straddles the plane
        assert!(wall.overlaps_box(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0), 0.5));
        // Box within the thickened shell but not the bare plane
        assert!(wall.overlaps_box(Vec3::new(0.25, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0), 0.5));
        // Box entirely clear of the shell
        assert!(!wall.overlaps_box(Vec3::new(2.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0), 0.5));
    }
}
