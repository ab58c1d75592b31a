//! Flat-indexed cell grid.
//!
//! Cells are numbered `ix + nx·(iy + ny·iz)` with per-axis counts chosen
//! from the box lengths and the interaction range. Neighbourhoods are
//! walked on the fly from coordinates rather than precomputed per cell,
//! which keeps memory linear in the cell count.

use super::signals::{NeighbourSignal, SignalBus};
use super::{CellFace, CellRecord, GridSettings};
use crate::boundary::SimBox;
use crate::error::SimulationError;
use crate::local::Wall;
use crate::particle::{Particle, ParticleId};
use crate::vector::Vec3;
use log::{info, warn};

/// Hard ceiling on cells per axis; above this the memory cost outweighs
/// the crossing-rate savings.
const MAX_CELLS_PER_AXIS: usize = 500;

/// Flat-indexed implementation of the neighbour structure.
#[derive(Debug)]
pub struct PlainGrid {
    settings: GridSettings,
    bounds: SimBox,
    /// Cells along each axis.
    counts: [usize; 3],
    /// Total cell count.
    n_cells: usize,
    /// Lattice spacing per axis.
    lattice: Vec3,
    /// Collision-box edge lengths (lattice widened by the overlap).
    dimension: Vec3,
    /// Offset centring the collision box on the lattice cell.
    overlap_offset: Vec3,
    /// Head of each cell's resident list.
    heads: Vec<Option<ParticleId>>,
    /// Per-particle membership records.
    records: Vec<CellRecord>,
    /// Walls visible from each cell.
    cell_walls: Vec<Vec<usize>>,
}

impl PlainGrid {
    /// Creates an empty grid; `init` builds the cells.
    pub fn new(settings: GridSettings) -> Self {
        PlainGrid {
            settings,
            bounds: SimBox::cubic(1.0),
            counts: [0; 3],
            n_cells: 0,
            lattice: Vec3::zero(),
            dimension: Vec3::zero(),
            overlap_offset: Vec3::zero(),
            heads: Vec::new(),
            records: Vec::new(),
            cell_walls: Vec::new(),
        }
    }

    /// Sizes the cells from the interaction range, bins every particle and
    /// registers wall visibility.
    pub fn init(
        &mut self,
        bounds: &SimBox,
        max_interaction: f64,
        particles: &[Particle],
        walls: &[Wall],
        time: f64,
    ) -> Result<(), SimulationError> {
        self.bounds = *bounds;
        let range = self.settings.effective_range(max_interaction);

        self.n_cells = 1;
        for axis in 0..3 {
            let mut count = (bounds.lengths[axis] / range) as usize;
            if count < 3 {
                return Err(SimulationError::TooFewCells { axis, count });
            }
            if count > MAX_CELLS_PER_AXIS {
                warn!(
                    "cell count on axis {} was {}, restricting to {}",
                    axis, count, MAX_CELLS_PER_AXIS
                );
                count = MAX_CELLS_PER_AXIS;
            }
            self.counts[axis] = count;
            self.n_cells *= count;
        }

        for axis in 0..3 {
            self.lattice[axis] = bounds.lengths[axis] / self.counts[axis] as f64;
            self.dimension[axis] =
                self.lattice[axis] + (self.lattice[axis] - range) * self.settings.lambda;
            self.overlap_offset[axis] =
                -(self.lattice[axis] - range) * self.settings.lambda * 0.5;
        }

        info!(
            "cells <x,y,z> {},{},{} lattice <{:.4},{:.4},{:.4}> dimension <{:.4},{:.4},{:.4}>",
            self.counts[0],
            self.counts[1],
            self.counts[2],
            self.lattice.x,
            self.lattice.y,
            self.lattice.z,
            self.dimension.x,
            self.dimension.y,
            self.dimension.z,
        );

        self.heads = vec![None; self.n_cells];
        self.records = vec![CellRecord::default(); particles.len()];

        for (id, particle) in particles.iter().enumerate() {
            let cell = self.cell_of_position(particle.position, time);
            self.add_to_cell(id, cell);
        }

        self.register_walls(walls, max_interaction);
        Ok(())
    }

    /// Recomputes which walls each cell sees.
    pub(super) fn register_walls(&mut self, walls: &[Wall], max_interaction: f64) {
        self.cell_walls = vec![Vec::new(); self.n_cells];
        let range = 0.5 * max_interaction;
        for cell in 0..self.n_cells {
            for (wall_id, wall) in walls.iter().enumerate() {
                if wall.overlaps_box(self.cell_origin(cell), self.dimension, range) {
                    self.cell_walls[cell].push(wall_id);
                }
            }
        }
    }

    /// The cell particle `p` currently lives in.
    #[inline]
    pub fn cell_of(&self, p: ParticleId) -> usize {
        self.records[p].cell
    }

    /// Total cell count.
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// Per-axis cell counts.
    pub fn counts(&self) -> [usize; 3] {
        self.counts
    }

    /// Lowest corner of the collision box of `cell`.
    pub fn cell_origin(&self, cell: usize) -> Vec3 {
        let coords = self.coords_of(cell);
        let mut origin = self.bounds.origin() + self.overlap_offset;
        for axis in 0..3 {
            origin[axis] += coords[axis] as f64 * self.lattice[axis];
        }
        origin
    }

    /// Collision-box edge lengths.
    pub fn cell_extent(&self) -> Vec3 {
        self.dimension
    }

    /// Integer coordinates of `cell`.
    pub(super) fn coords_of(&self, cell: usize) -> [usize; 3] {
        let mut rest = cell % self.n_cells;
        let x = rest % self.counts[0];
        rest /= self.counts[0];
        let y = rest % self.counts[1];
        rest /= self.counts[1];
        [x, y, rest]
    }

    /// Cell index of integer coordinates, wrapped periodically.
    pub(super) fn index_of(&self, coords: [isize; 3]) -> usize {
        let mut wrapped = [0usize; 3];
        for axis in 0..3 {
            wrapped[axis] = coords[axis].rem_euclid(self.counts[axis] as isize) as usize;
        }
        wrapped[0] + self.counts[0] * (wrapped[1] + self.counts[1] * wrapped[2])
    }

    /// Bins a position (wrapped into the primary image first).
    pub(super) fn cell_of_position(&self, position: Vec3, time: f64) -> usize {
        let wrapped = self.bounds.image_of(position, time);
        let origin = self.bounds.origin();
        let mut coords = [0isize; 3];
        for axis in 0..3 {
            coords[axis] = ((wrapped[axis] - origin[axis]) / self.lattice[axis]).floor() as isize;
        }
        self.index_of(coords)
    }

    pub(super) fn add_to_cell(&mut self, id: ParticleId, cell: usize) {
        if let Some(head) = self.heads[cell] {
            self.records[head].prev = Some(id);
        }
        self.records[id].next = self.heads[cell];
        self.records[id].prev = None;
        self.records[id].cell = cell;
        self.heads[cell] = Some(id);
    }

    pub(super) fn remove_from_cell(&mut self, id: ParticleId) {
        match self.records[id].prev {
            Some(prev) => self.records[prev].next = self.records[id].next,
            None => self.heads[self.records[id].cell] = self.records[id].next,
        }
        if let Some(next) = self.records[id].next {
            self.records[next].prev = self.records[id].prev;
        }
    }

    /// Walks the residents of one cell.
    pub(super) fn for_each_resident(&self, cell: usize, mut f: impl FnMut(ParticleId)) {
        let mut cursor = self.heads[cell];
        while let Some(id) = cursor {
            f(id);
            cursor = self.records[id].next;
        }
    }

    /// Calls `f` for every distinct particle in the overlinked block around
    /// `p`'s cell.
    pub fn particle_neighbourhood(&self, p: ParticleId, mut f: impl FnMut(ParticleId)) {
        let coords = self.coords_of(self.records[p].cell);
        let reach = self.settings.overlink as isize;
        for dz in -reach..=reach {
            for dy in -reach..=reach {
                for dx in -reach..=reach {
                    let cell = self.index_of([
                        coords[0] as isize + dx,
                        coords[1] as isize + dy,
                        coords[2] as isize + dz,
                    ]);
                    self.for_each_resident(cell, |q| {
                        if q != p {
                            f(q);
                        }
                    });
                }
            }
        }
    }

    /// Calls `f` for every wall visible from `p`'s cell.
    pub fn particle_local_neighbourhood(&self, p: ParticleId, mut f: impl FnMut(usize)) {
        for &wall in &self.cell_walls[self.records[p].cell] {
            f(wall);
        }
    }

    /// Moves `p` across `face` and announces the newly visible strip: the
    /// plane of cells `overlink` deep on the far side of the destination,
    /// which is exactly the set the particle could not see before.
    pub fn on_cell_crossing(&mut self, p: ParticleId, face: CellFace, bus: &mut SignalBus) {
        let old_cell = self.records[p].cell;
        let old_coords = self.coords_of(old_cell);
        let step: isize = if face.positive { 1 } else { -1 };

        let mut new_coords = [
            old_coords[0] as isize,
            old_coords[1] as isize,
            old_coords[2] as isize,
        ];
        new_coords[face.axis] += step;
        let new_cell = self.index_of(new_coords);

        self.remove_from_cell(p);
        self.add_to_cell(p, new_cell);

        // The entering strip: fixed coordinate along the crossing axis,
        // full overlink block across the other two
        let reach = self.settings.overlink as isize;
        let plane = new_coords[face.axis] + step * reach;
        let (u, v) = ((face.axis + 1) % 3, (face.axis + 2) % 3);

        for du in -reach..=reach {
            for dv in -reach..=reach {
                let mut coords = new_coords;
                coords[face.axis] = plane;
                coords[u] += du;
                coords[v] += dv;
                self.for_each_resident(self.index_of(coords), |q| {
                    if q != p {
                        bus.push(NeighbourSignal::NewNeighbour {
                            particle: p,
                            neighbour: q,
                        });
                    }
                });
            }
        }

        for &wall in &self.cell_walls[new_cell] {
            bus.push(NeighbourSignal::NewLocal {
                particle: p,
                local: wall,
            });
        }

        bus.push(NeighbourSignal::CellChanged {
            particle: p,
            old_cell,
        });
    }
}
