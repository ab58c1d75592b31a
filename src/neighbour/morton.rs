//! Morton-ordered cell grid.
//!
//! Cells are addressed by bit-interleaved (Morton) numbers: each axis
//! coordinate is *dilated* — its bits spread three apart — and the three
//! dilated coordinates are OR-ed together. Nearby cells then share address
//! prefixes, which keeps neighbourhood walks cache-local on large grids.
//! Neighbour traversal never undilates: stepping one cell along an axis is
//! a masked add on the dilated coordinate.
//!
//! The address space is padded up to the next power of two per axis, so a
//! cubic box is required and the per-axis count is capped at 255 to bound
//! the padding cost.

use super::signals::{NeighbourSignal, SignalBus};
use super::{CellFace, CellRecord, GridSettings};
use crate::boundary::SimBox;
use crate::error::SimulationError;
use crate::local::Wall;
use crate::particle::{Particle, ParticleId};
use crate::vector::Vec3;
use log::{info, warn};

/// Dilated 10-bit mask: bits 0, 3, 6, ..., 27.
const DILATED_MASK: u32 = 0x0924_9249;

/// A 10-bit integer stored with its bits spread three apart.
///
/// Arithmetic stays entirely in the dilated domain: the unused bit
/// positions are filled with ones before an add so that carries propagate
/// across the gaps, and masked off afterwards. Ordering agrees with the
/// undilated values because dilation preserves bit significance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DilatedInt(pub u32);

impl DilatedInt {
    /// Largest representable dilated value (all mask bits set).
    pub const MAX: DilatedInt = DilatedInt(DILATED_MASK);

    /// Dilates a plain integer (must be < 1024).
    pub fn dilate(value: u32) -> Self {
        let mut r = value & 0x3ff;
        r = (r | (r << 16)) & 0x0300_00FF;
        r = (r | (r << 8)) & 0x0300_F00F;
        r = (r | (r << 4)) & 0x030C_30C3;
        r = (r | (r << 2)) & DILATED_MASK;
        DilatedInt(r)
    }

    /// Recovers the plain integer.
    pub fn undilate(self) -> u32 {
        let mut r = self.0 & DILATED_MASK;
        r = (r | (r >> 2)) & 0x030C_30C3;
        r = (r | (r >> 4)) & 0x0300_F00F;
        r = (r | (r >> 8)) & 0x0300_00FF;
        r = (r | (r >> 16)) & 0x0000_03FF;
        r
    }

    /// Dilated increment.
    #[inline]
    pub fn inc(self) -> Self {
        DilatedInt((self.0 | !DILATED_MASK).wrapping_add(1) & DILATED_MASK)
    }

    /// Dilated decrement.
    #[inline]
    pub fn dec(self) -> Self {
        DilatedInt(self.0.wrapping_sub(1) & DILATED_MASK)
    }

    /// Dilated addition.
    #[inline]
    pub fn add(self, other: DilatedInt) -> Self {
        DilatedInt((self.0 | !DILATED_MASK).wrapping_add(other.0) & DILATED_MASK)
    }

    /// Dilated subtraction.
    #[inline]
    pub fn sub(self, other: DilatedInt) -> Self {
        DilatedInt(self.0.wrapping_sub(other.0) & DILATED_MASK)
    }
}

/// Interleaves three dilated coordinates into a Morton cell number.
#[inline]
fn morton_number(x: DilatedInt, y: DilatedInt, z: DilatedInt) -> usize {
    (x.0 | (y.0 << 1) | (z.0 << 2)) as usize
}

/// Splits a Morton cell number back into dilated coordinates.
#[inline]
fn morton_coords(cell: usize) -> [DilatedInt; 3] {
    let c = cell as u32;
    [
        DilatedInt(c & DILATED_MASK),
        DilatedInt((c >> 1) & DILATED_MASK),
        DilatedInt((c >> 2) & DILATED_MASK),
    ]
}

/// Morton-addressed implementation of the neighbour structure.
#[derive(Debug)]
pub struct MortonGrid {
    settings: GridSettings,
    bounds: SimBox,
    /// Cells along every axis (cubic).
    count: usize,
    /// Highest valid dilated coordinate, `count - 1`.
    dilated_max: DilatedInt,
    /// The overlink reach in dilated form.
    dilated_overlink: DilatedInt,
    /// Lattice spacing (scalar: the box is cubic).
    lattice: f64,
    /// Collision-box edge length.
    dimension: f64,
    /// Offset centring the collision box on the lattice cell.
    overlap_offset: f64,
    /// Logical cell count, `count³`.
    n_cells: usize,
    /// Resident-list heads over the padded Morton address space.
    heads: Vec<Option<ParticleId>>,
    /// Per-particle membership records.
    records: Vec<CellRecord>,
    /// Walls visible from each (addressed) cell.
    cell_walls: Vec<Vec<usize>>,
}

impl MortonGrid {
    /// Creates an empty grid; `init` builds the cells.
    pub fn new(settings: GridSettings) -> Self {
        MortonGrid {
            settings,
            bounds: SimBox::cubic(1.0),
            count: 0,
            dilated_max: DilatedInt(0),
            dilated_overlink: DilatedInt(0),
            lattice: 0.0,
            dimension: 0.0,
            overlap_offset: 0.0,
            n_cells: 0,
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
        if !bounds.is_cubic() {
            return Err(SimulationError::NonCubicBox {
                lengths: [bounds.lengths.x, bounds.lengths.y, bounds.lengths.z],
            });
        }
        self.bounds = *bounds;
        let range = self.settings.effective_range(max_interaction);

        let mut count = (bounds.lengths.x / range) as usize;
        if count < 3 {
            return Err(SimulationError::TooFewCells { axis: 0, count });
        }
        if count > u8::MAX as usize {
            warn!(
                "cell count was {}, restricting to {} to bound the morton address space",
                count,
                u8::MAX
            );
            count = u8::MAX as usize;
        }

        self.count = count;
        self.n_cells = count * count * count;
        self.dilated_max = DilatedInt::dilate(count as u32 - 1);
        self.dilated_overlink = DilatedInt::dilate(self.settings.overlink as u32);
        self.lattice = bounds.lengths.x / count as f64;
        self.dimension = self.lattice + (self.lattice - range) * self.settings.lambda;
        self.overlap_offset = -(self.lattice - range) * self.settings.lambda * 0.5;

        // Pad the address space to the next power of two per axis so every
        // interleaved coordinate triple is a unique index
        let mut padded = 1usize;
        while padded < count {
            padded <<= 1;
        }
        let address_space = padded * padded * padded;

        info!(
            "morton cells <N> {} (addressable {}) lattice <{:.4}> dimension <{:.4}>",
            self.n_cells, address_space, self.lattice, self.dimension
        );

        self.heads = vec![None; address_space];
        self.records = vec![CellRecord::default(); particles.len()];

        for (id, particle) in particles.iter().enumerate() {
            let cell = self.cell_of_position(particle.position, time);
            self.add_to_cell(id, cell);
        }

        self.register_walls(walls, max_interaction);
        Ok(())
    }

    fn register_walls(&mut self, walls: &[Wall], max_interaction: f64) {
        self.cell_walls = vec![Vec::new(); self.heads.len()];
        let range = 0.5 * max_interaction;
        let extent = self.cell_extent();
        for x in 0..self.count as u32 {
            for y in 0..self.count as u32 {
                for z in 0..self.count as u32 {
                    let cell = morton_number(
                        DilatedInt::dilate(x),
                        DilatedInt::dilate(y),
                        DilatedInt::dilate(z),
                    );
                    for (wall_id, wall) in walls.iter().enumerate() {
                        if wall.overlaps_box(self.cell_origin(cell), extent, range) {
                            self.cell_walls[cell].push(wall_id);
                        }
                    }
                }
            }
        }
    }

    /// The cell particle `p` currently lives in (a Morton number).
    #[inline]
    pub fn cell_of(&self, p: ParticleId) -> usize {
        self.records[p].cell
    }

    /// Logical cell count (`count³`, not the padded address space).
    pub fn n_cells(&self) -> usize {
        self.n_cells
    }

    /// Lowest corner of the collision box of `cell`.
    pub fn cell_origin(&self, cell: usize) -> Vec3 {
        let [x, y, z] = morton_coords(cell);
        let origin = self.bounds.origin();
        Vec3::new(
            origin.x + x.undilate() as f64 * self.lattice + self.overlap_offset,
            origin.y + y.undilate() as f64 * self.lattice + self.overlap_offset,
            origin.z + z.undilate() as f64 * self.lattice + self.overlap_offset,
        )
    }

    /// Collision-box edge lengths.
    pub fn cell_extent(&self) -> Vec3 {
        Vec3::new(self.dimension, self.dimension, self.dimension)
    }

    /// Bins a position (wrapped into the primary image first).
    fn cell_of_position(&self, position: Vec3, time: f64) -> usize {
        let wrapped = self.bounds.image_of(position, time);
        let origin = self.bounds.origin();
        let mut dilated = [DilatedInt(0); 3];
        for axis in 0..3 {
            let coord = ((wrapped[axis] - origin[axis]) / self.lattice).floor() as i64;
            let wrapped_coord = coord.rem_euclid(self.count as i64) as u32;
            dilated[axis] = DilatedInt::dilate(wrapped_coord);
        }
        morton_number(dilated[0], dilated[1], dilated[2])
    }

    fn add_to_cell(&mut self, id: ParticleId, cell: usize) {
        if let Some(head) = self.heads[cell] {
            self.records[head].prev = Some(id);
        }
        self.records[id].next = self.heads[cell];
        self.records[id].prev = None;
        self.records[id].cell = cell;
        self.heads[cell] = Some(id);
    }

    fn remove_from_cell(&mut self, id: ParticleId) {
        match self.records[id].prev {
            Some(prev) => self.records[prev].next = self.records[id].next,
            None => self.heads[self.records[id].cell] = self.records[id].next,
        }
        if let Some(next) = self.records[id].next {
            self.records[next].prev = self.records[id].prev;
        }
    }

    fn for_each_resident(&self, cell: usize, mut f: impl FnMut(ParticleId)) {
        let mut cursor = self.heads[cell];
        while let Some(id) = cursor {
            f(id);
            cursor = self.records[id].next;
        }
    }

    /// Steps a dilated coordinate down by `reach`, wrapping under zero back
    /// to the top of the grid.
    #[inline]
    fn wrap_low(&self, d: DilatedInt) -> DilatedInt {
        if d > self.dilated_max {
            // Underflowed: fold the unused address range back out
            d.sub(DilatedInt::MAX.sub(self.dilated_max))
        } else {
            d
        }
    }

    /// Wraps a coordinate that was incremented past the grid maximum.
    #[inline]
    fn wrap_high(&self, d: DilatedInt) -> DilatedInt {
        if d > self.dilated_max {
            d.dec().sub(self.dilated_max)
        } else {
            d
        }
    }

    /// Calls `f` for every distinct particle in the overlinked block around
    /// `p`'s cell, walking in dilated coordinates throughout.
    pub fn particle_neighbourhood(&self, p: ParticleId, mut f: impl FnMut(ParticleId)) {
        let center = morton_coords(self.records[p].cell);
        let walk = 2 * self.settings.overlink + 1;

        let start_x = self.wrap_low(center[0].sub(self.dilated_overlink));
        let start_y = self.wrap_low(center[1].sub(self.dilated_overlink));
        let mut z = self.wrap_low(center[2].sub(self.dilated_overlink));

        for _ in 0..walk {
            if z > self.dilated_max {
                z = DilatedInt(0);
            }
            let mut y = start_y;
            for _ in 0..walk {
                if y > self.dilated_max {
                    y = DilatedInt(0);
                }
                let mut x = start_x;
                for _ in 0..walk {
                    if x > self.dilated_max {
                        x = DilatedInt(0);
                    }
                    self.for_each_resident(morton_number(x, y, z), |q| {
                        if q != p {
                            f(q);
                        }
                    });
                    x = x.inc();
                }
                y = y.inc();
            }
            z = z.inc();
        }
    }

    /// Calls `f` for every wall visible from `p`'s cell.
    pub fn particle_local_neighbourhood(&self, p: ParticleId, mut f: impl FnMut(usize)) {
        for &wall in &self.cell_walls[self.records[p].cell] {
            f(wall);
        }
    }

    /// Moves `p` across `face` and announces the entering strip, walking
    /// the far plane of the destination's overlink block in dilated
    /// coordinates.
    pub fn on_cell_crossing(&mut self, p: ParticleId, face: CellFace, bus: &mut SignalBus) {
        let old_cell = self.records[p].cell;
        let mut coords = morton_coords(old_cell);
        let axis = face.axis;

        // Destination cell and the coordinate of the entering plane
        let plane;
        if face.positive {
            coords[axis] = self.wrap_high(coords[axis].inc());
            plane = self.wrap_high(coords[axis].add(self.dilated_overlink));
        } else {
            coords[axis] = self.wrap_low(coords[axis].dec());
            plane = self.wrap_low(coords[axis].sub(self.dilated_overlink));
        }
        let new_cell = morton_number(coords[0], coords[1], coords[2]);

        self.remove_from_cell(p);
        self.add_to_cell(p, new_cell);

        // Walk the entering plane across the two remaining dimensions
        let (u, v) = ((axis + 1) % 3, (axis + 2) % 3);
        let walk = 2 * self.settings.overlink + 1;

        let mut scan = coords;
        scan[axis] = plane;
        scan[u] = self.wrap_low(scan[u].sub(self.dilated_overlink));
        scan[v] = self.wrap_low(scan[v].sub(self.dilated_overlink));
        let start_u = scan[u];

        for _ in 0..walk {
            if scan[v] > self.dilated_max {
                scan[v] = DilatedInt(0);
            }
            scan[u] = start_u;
            for _ in 0..walk {
                if scan[u] > self.dilated_max {
                    scan[u] = DilatedInt(0);
                }
                self.for_each_resident(morton_number(scan[0], scan[1], scan[2]), |q| {
                    if q != p {
                        bus.push(NeighbourSignal::NewNeighbour {
                            particle: p,
                            neighbour: q,
                        });
                    }
                });
                scan[u] = scan[u].inc();
            }
            scan[v] = scan[v].inc();
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
