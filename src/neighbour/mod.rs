//! # Neighbour Module - Cell-Based Spatial Indexing
//!
//! Given a particle, this module answers "which particles and walls could it
//! interact with next?" without an `O(N²)` scan. The periodic box is tiled
//! by a grid of cells sized so that anything within the interaction range of
//! a particle is guaranteed to live in the surrounding cell block; each cell
//! owns an intrusive linked list of its resident particles.
//!
//! Three geometries are provided behind one tagged variant:
//!
//! - [`PlainGrid`]: flat `ix + nx·(iy + ny·iz)` indexing. The default.
//! - [`MortonGrid`]: bit-interleaved (Morton) cell addressing via dilated
//!   integers, cache-friendlier for large cubic grids.
//! - [`ShearingGrid`]: a plain grid that understands Lees–Edwards
//!   boundaries, where crossing the y faces lands the particle in an
//!   x-shifted cell that cannot be precomputed.
//!
//! Cell membership lives in dense side arrays indexed by particle id (the
//! particles themselves stay plain data), with `Option`-valued links rather
//! than sentinel indices. Cell transitions and rebuilds are announced on the
//! [`signals::SignalBus`].

// Flat-indexed cell grid
pub mod plain;
// Morton-ordered cell grid
pub mod morton;
// Lees-Edwards aware cell grid
pub mod shearing;
// Observer signal bus
pub mod signals;

pub use morton::MortonGrid;
pub use plain::PlainGrid;
pub use shearing::ShearingGrid;
pub use signals::{NeighbourSignal, SignalBus};

use crate::boundary::SimBox;
use crate::error::SimulationError;
use crate::local::Wall;
use crate::particle::{Particle, ParticleId};
use crate::vector::Vec3;
use serde::{Deserialize, Serialize};

/// Geometry selector for the neighbour structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GridKind {
    /// Flat-indexed cells.
    Plain,
    /// Morton-ordered cells.
    Morton,
    /// Lees-Edwards aware cells.
    Shearing,
}

impl Default for GridKind {
    fn default() -> Self {
        GridKind::Plain
    }
}

/// Tuning knobs shared by all grid geometries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// Which geometry to build.
    pub kind: GridKind,
    /// Cells per interaction range: the grid is refined `overlink` times
    /// finer than the range requires, and neighbourhood walks widen to
    /// match. Trades list population against crossing rate.
    pub overlink: usize,
    /// Safety factor (>= 1.0) multiplied onto the interaction range when
    /// sizing cells.
    pub oversize: f64,
    /// Cell overlap parameter in [0, 1]: widens the collision box of each
    /// cell beyond the lattice spacing so face-straddling interactions
    /// resolve before the particle formally changes cell.
    pub lambda: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        GridSettings {
            kind: GridKind::Plain,
            overlink: 1,
            oversize: 1.0,
            lambda: 0.9,
        }
    }
}

impl GridSettings {
    /// Validates the documented domains of every knob.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.overlink == 0 {
            return Err(SimulationError::Config(
                "neighbour.overlink must be at least 1".into(),
            ));
        }
        if self.oversize < 1.0 {
            return Err(SimulationError::Config(format!(
                "neighbour.oversize must be >= 1.0, got {}",
                self.oversize
            )));
        }
        if !(0.0..=1.0).contains(&self.lambda) {
            return Err(SimulationError::Config(format!(
                "neighbour.lambda out of bounds [0,1], got {}",
                self.lambda
            )));
        }
        Ok(())
    }

    /// The cell spacing actually required: interaction range times the
    /// safety factor, refined by the overlink.
    pub(crate) fn effective_range(&self, max_interaction: f64) -> f64 {
        self.oversize * max_interaction / self.overlink as f64
    }
}

/// One face of a cubic cell, identified by axis and direction.
///
/// Faces ride inside cell-boundary event descriptors encoded as an object
/// id, so a crossing knows which face fired without re-deriving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellFace {
    /// 0 = x, 1 = y, 2 = z.
    pub axis: usize,
    /// True when the crossing moves toward +axis.
    pub positive: bool,
}

impl CellFace {
    /// Packs the face into an object id.
    pub fn encode(&self) -> usize {
        2 * self.axis + usize::from(self.positive)
    }

    /// Unpacks a face from an object id.
    ///
    /// # Panics
    ///
    /// Panics if `code` is not a valid face encoding (0..6).
    pub fn decode(code: usize) -> Self {
        assert!(code < 6, "invalid cell face encoding: {}", code);
        CellFace {
            axis: code / 2,
            positive: code % 2 == 1,
        }
    }
}

/// Intrusive membership record for one particle, kept in a dense side
/// array owned by the grid.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct CellRecord {
    /// Previous resident in the same cell.
    pub prev: Option<ParticleId>,
    /// Next resident in the same cell.
    pub next: Option<ParticleId>,
    /// The cell this particle lives in.
    pub cell: usize,
}

/// The neighbour structure: a tagged variant over the grid geometries.
#[derive(Debug)]
pub enum CellGrid {
    Plain(PlainGrid),
    Morton(MortonGrid),
    Shearing(ShearingGrid),
}

impl CellGrid {
    /// Creates an empty grid of the configured geometry.
    pub fn new(settings: GridSettings) -> Self {
        match settings.kind {
            GridKind::Plain => CellGrid::Plain(PlainGrid::new(settings)),
            GridKind::Morton => CellGrid::Morton(MortonGrid::new(settings)),
            GridKind::Shearing => CellGrid::Shearing(ShearingGrid::new(settings)),
        }
    }

    /// Which geometry this is.
    pub fn kind(&self) -> GridKind {
        match self {
            CellGrid::Plain(_) => GridKind::Plain,
            CellGrid::Morton(_) => GridKind::Morton,
            CellGrid::Shearing(_) => GridKind::Shearing,
        }
    }

    /// Builds the cells for the given interaction range and bins every
    /// particle. Also registers which walls are visible from which cells.
    pub fn init(
        &mut self,
        bounds: &SimBox,
        max_interaction: f64,
        particles: &[Particle],
        walls: &[Wall],
        time: f64,
    ) -> Result<(), SimulationError> {
        match self {
            CellGrid::Plain(g) => g.init(bounds, max_interaction, particles, walls, time),
            CellGrid::Morton(g) => g.init(bounds, max_interaction, particles, walls, time),
            CellGrid::Shearing(g) => g.init(bounds, max_interaction, particles, walls, time),
        }
    }

    /// The cell particle `p` currently lives in.
    pub fn cell_of(&self, p: ParticleId) -> usize {
        match self {
            CellGrid::Plain(g) => g.cell_of(p),
            CellGrid::Morton(g) => g.cell_of(p),
            CellGrid::Shearing(g) => g.cell_of(p),
        }
    }

    /// Lowest corner of the collision box of `cell` (includes the overlap
    /// offset).
    pub fn cell_origin(&self, cell: usize) -> Vec3 {
        match self {
            CellGrid::Plain(g) => g.cell_origin(cell),
            CellGrid::Morton(g) => g.cell_origin(cell),
            CellGrid::Shearing(g) => g.cell_origin(cell),
        }
    }

    /// Edge lengths of every cell's collision box.
    pub fn cell_extent(&self) -> Vec3 {
        match self {
            CellGrid::Plain(g) => g.cell_extent(),
            CellGrid::Morton(g) => g.cell_extent(),
            CellGrid::Shearing(g) => g.cell_extent(),
        }
    }

    /// Calls `f` for every distinct particle in the overlinked cell block
    /// around `p`.
    pub fn particle_neighbourhood(&self, p: ParticleId, f: impl FnMut(ParticleId)) {
        match self {
            CellGrid::Plain(g) => g.particle_neighbourhood(p, f),
            CellGrid::Morton(g) => g.particle_neighbourhood(p, f),
            CellGrid::Shearing(g) => g.particle_neighbourhood(p, f),
        }
    }

    /// Calls `f` for every wall visible from `p`'s cell.
    pub fn particle_local_neighbourhood(&self, p: ParticleId, f: impl FnMut(usize)) {
        match self {
            CellGrid::Plain(g) => g.particle_local_neighbourhood(p, f),
            CellGrid::Morton(g) => g.particle_local_neighbourhood(p, f),
            CellGrid::Shearing(g) => g.particle_local_neighbourhood(p, f),
        }
    }

    /// Processes a fired cell-boundary event: moves `p` across `face` and
    /// announces the newly visible particles and walls on `bus`.
    ///
    /// The caller must have synchronised `p` to the current time first; the
    /// particle state is needed by the shearing geometry to re-derive the
    /// destination cell.
    pub fn on_cell_crossing(
        &mut self,
        p: ParticleId,
        face: CellFace,
        particle: &Particle,
        time: f64,
        bus: &mut SignalBus,
    ) {
        match self {
            CellGrid::Plain(g) => g.on_cell_crossing(p, face, bus),
            CellGrid::Morton(g) => g.on_cell_crossing(p, face, bus),
            CellGrid::Shearing(g) => g.on_cell_crossing(p, face, particle, time, bus),
        }
    }

    /// Total number of cells.
    pub fn n_cells(&self) -> usize {
        match self {
            CellGrid::Plain(g) => g.n_cells(),
            CellGrid::Morton(g) => g.n_cells(),
            CellGrid::Shearing(g) => g.n_cells(),
        }
    }
}
