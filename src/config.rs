//! # Configuration Module
//!
//! TOML-backed settings for a simulation run. Every section and field has a
//! default, so a config file only needs to name what it changes:
//!
//! ```toml
//! [scheduler]
//! kind = "calendar"        # or "tournament"
//!
//! [neighbour]
//! kind = "plain"           # or "morton", "shearing"
//! overlink = 1
//! lambda = 0.9
//!
//! [interaction]
//! diameter = 1.0
//!
//! [system]
//! box_lengths = [10.0, 10.0, 10.0]
//! shear_rate = 0.0
//!
//! [simulation]
//! max_events = 100000
//! print_interval = 10000
//! ```

use crate::boundary::SimBox;
use crate::error::SimulationError;
use crate::neighbour::{GridKind, GridSettings};
use crate::sorter::SorterKind;
use crate::vector::Vec3;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sorter selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Which sorter implementation to use.
    pub kind: SorterKind,
    /// Fixed calendar-queue list count; auto-tuned when absent.
    pub bpq_lists: Option<usize>,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        SchedulerSettings {
            kind: SorterKind::default(),
            bpq_lists: None,
        }
    }
}

/// Interaction-kernel parameters the driver needs to build the dynamics
/// collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSettings {
    /// Hard-sphere diameter.
    pub diameter: f64,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        InteractionSettings { diameter: 1.0 }
    }
}

/// Geometry of the simulated system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemSettings {
    /// Box edge lengths.
    pub box_lengths: [f64; 3],
    /// Lees–Edwards shear rate; zero means plain periodic boundaries.
    pub shear_rate: f64,
}

impl Default for SystemSettings {
    fn default() -> Self {
        SystemSettings {
            box_lengths: [10.0, 10.0, 10.0],
            shear_rate: 0.0,
        }
    }
}

/// Run-control parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Stop after this many real events.
    pub max_events: u64,
    /// Progress log cadence, in real events.
    pub print_interval: u64,
    /// Snapshot cadence in simulation time; no snapshots when absent.
    pub snapshot_period: Option<f64>,
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings {
            max_events: 100_000,
            print_interval: 10_000,
            snapshot_period: None,
        }
    }
}

/// Complete settings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub scheduler: SchedulerSettings,
    pub neighbour: GridSettings,
    pub interaction: InteractionSettings,
    pub system: SystemSettings,
    pub simulation: RunSettings,
}

impl Settings {
    /// Loads settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&text)?;
        Ok(settings)
    }

    /// Checks every field against its documented domain, including the
    /// coupling between shearing cells and Lees–Edwards boundaries.
    pub fn validate(&self) -> Result<(), SimulationError> {
        self.neighbour.validate()?;

        if self.interaction.diameter <= 0.0 {
            return Err(SimulationError::Config(format!(
                "interaction.diameter must be positive, got {}",
                self.interaction.diameter
            )));
        }
        for (axis, &l) in self.system.box_lengths.iter().enumerate() {
            if l <= 0.0 {
                return Err(SimulationError::Config(format!(
                    "system.box_lengths[{axis}] must be positive, got {l}"
                )));
            }
        }

        let shearing_cells = self.neighbour.kind == GridKind::Shearing;
        let sheared_box = self.system.shear_rate != 0.0;
        if shearing_cells && !sheared_box {
            return Err(SimulationError::Config(
                "neighbour.kind = shearing requires a non-zero system.shear_rate".into(),
            ));
        }
        if sheared_box && !shearing_cells {
            return Err(SimulationError::Config(
                "a non-zero system.shear_rate requires neighbour.kind = shearing".into(),
            ));
        }

        Ok(())
    }

    /// Builds the simulation box these settings describe.
    pub fn sim_box(&self) -> SimBox {
        let lengths = Vec3::from_array(self.system.box_lengths);
        if self.system.shear_rate != 0.0 {
            SimBox::shearing(lengths, self.system.shear_rate)
        } else {
            SimBox::periodic(lengths)
        }
    }
}
