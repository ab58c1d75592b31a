//! Lees–Edwards aware cell grid.
//!
//! Under shearing boundaries the image above the box slides along x, so a
//! particle wrapping through a y face does not land in the cell a static
//! face-neighbour table predicts: the x-displacement shifts cell identities
//! discontinuously. This grid wraps the plain geometry and special-cases
//! exactly those crossings: the destination cell is re-derived from a
//! position nudged just past the face (with the boundary shift applied),
//! and the particle is handed its *entire* new neighbourhood rather than
//! one entering strip, because the adjacency change is not local to a
//! plane.

use super::plain::PlainGrid;
use super::signals::{NeighbourSignal, SignalBus};
use super::{CellFace, GridSettings};
use crate::boundary::{BoundaryKind, SimBox};
use crate::error::SimulationError;
use crate::local::Wall;
use crate::particle::{Particle, ParticleId};
use crate::vector::Vec3;

/// Shearing-boundary implementation of the neighbour structure.
#[derive(Debug)]
pub struct ShearingGrid {
    grid: PlainGrid,
}

impl ShearingGrid {
    /// Creates an empty grid; `init` builds the cells.
    pub fn new(settings: GridSettings) -> Self {
        ShearingGrid {
            grid: PlainGrid::new(settings),
        }
    }

    /// Sizes the cells and bins every particle.
    ///
    /// # Panics
    ///
    /// Panics when the box does not carry Lees–Edwards boundaries; the
    /// shearing geometry is meaningless without them.
    pub fn init(
        &mut self,
        bounds: &SimBox,
        max_interaction: f64,
        particles: &[Particle],
        walls: &[Wall],
        time: f64,
    ) -> Result<(), SimulationError> {
        assert!(
            matches!(bounds.boundary, BoundaryKind::LeesEdwards { .. }),
            "Shearing cells require Lees-Edwards boundary conditions"
        );
        self.grid.init(bounds, max_interaction, particles, walls, time)
    }

    /// The cell particle `p` currently lives in.
    pub fn cell_of(&self, p: ParticleId) -> usize {
        self.grid.cell_of(p)
    }

    /// Total cell count.
    pub fn n_cells(&self) -> usize {
        self.grid.n_cells()
    }

    /// Lowest corner of the collision box of `cell`.
    pub fn cell_origin(&self, cell: usize) -> Vec3 {
        self.grid.cell_origin(cell)
    }

    /// Collision-box edge lengths.
    pub fn cell_extent(&self) -> Vec3 {
        self.grid.cell_extent()
    }

    /// Calls `f` for every distinct particle in the overlinked cell block
    /// around `p`.
    pub fn particle_neighbourhood(&self, p: ParticleId, f: impl FnMut(ParticleId)) {
        self.grid.particle_neighbourhood(p, f)
    }

    /// Calls `f` for every wall visible from `p`'s cell.
    pub fn particle_local_neighbourhood(&self, p: ParticleId, f: impl FnMut(usize)) {
        self.grid.particle_local_neighbourhood(p, f)
    }

    /// Processes a fired cell-boundary event.
    ///
    /// Ordinary crossings delegate to the plain geometry. Crossings through
    /// the outermost y rows take the boundary path: the destination is
    /// computed from the particle's position pushed half a cell past the
    /// face and wrapped through the sliding boundary, and the full
    /// neighbourhood of the destination is re-announced.
    pub fn on_cell_crossing(
        &mut self,
        p: ParticleId,
        face: CellFace,
        particle: &Particle,
        time: f64,
        bus: &mut SignalBus,
    ) {
        let coords = self.grid.coords_of(self.grid.cell_of(p));
        let counts = self.grid.counts();
        let boundary_row = if face.positive { counts[1] - 1 } else { 0 };

        if face.axis != 1 || coords[1] != boundary_row {
            self.grid.on_cell_crossing(p, face, bus);
            return;
        }

        let old_cell = self.grid.cell_of(p);

        // Nudge the (already synchronised) particle half a cell past the
        // face and let the sliding boundary place it; a static neighbour
        // table cannot know the x-shifted destination
        let mut probe = particle.position;
        let half_cell = 0.5 * self.grid.cell_extent().y;
        probe.y += if face.positive { half_cell } else { -half_cell };
        let new_cell = self.grid.cell_of_position(probe, time);

        self.grid.remove_from_cell(p);
        self.grid.add_to_cell(p, new_cell);

        // The adjacency changed discontinuously: announce every particle in
        // the full neighbourhood of the destination, not just one strip
        self.grid.particle_neighbourhood(p, |q| {
            bus.push(NeighbourSignal::NewNeighbour {
                particle: p,
                neighbour: q,
            });
        });

        self.grid.particle_local_neighbourhood(p, |wall| {
            bus.push(NeighbourSignal::NewLocal {
                particle: p,
                local: wall,
            });
        });

        bus.push(NeighbourSignal::CellChanged {
            particle: p,
            old_cell,
        });
    }
}
