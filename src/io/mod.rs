//! # IO Module - Data Persistence
//!
//! Persistence for the two artefact kinds of the pipeline:
//!
//! 1. **Packing Generation** → `<root>/packing/`
//! 2. **Simulation Execution** → `<root>/simulation/`
//!
//! Artefacts are stored as bincode for the pipeline itself, with a JSON
//! export for human inspection. File naming is `{tag}-{id}` with the format
//! extension; every artefact type implements [`DataPersistence`] to plug
//! into the shared save/load/list helpers.

// JSON export helpers
pub mod json;
// Bincode persistence helpers
pub mod bin;

use crate::ensemble::PackingResult;
use crate::simulation::SimulationResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Which pipeline stage an artefact belongs to; decides its folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Packing,
    Simulation,
}

impl DataType {
    /// Folder name under the data root.
    pub fn folder(&self) -> &'static str {
        match self {
            DataType::Packing => "packing",
            DataType::Simulation => "simulation",
        }
    }
}

/// Contract an artefact implements to use the shared persistence helpers.
pub trait DataPersistence: Serialize + DeserializeOwned {
    /// Which pipeline stage this artefact belongs to.
    fn data_type() -> DataType;
    /// Tag used in the file name.
    fn tag(&self) -> &str;
    /// Id used in the file name.
    fn id(&self) -> usize;

    /// Binary file path under `root`.
    fn binary_path(&self, root: &Path) -> PathBuf {
        root.join(Self::data_type().folder())
            .join(format!("{}-{}.bin", self.tag(), self.id()))
    }

    /// JSON file path under `root`.
    fn json_path(&self, root: &Path) -> PathBuf {
        root.join(Self::data_type().folder())
            .join(format!("{}-{}.json", self.tag(), self.id()))
    }
}

impl DataPersistence for PackingResult {
    fn data_type() -> DataType {
        DataType::Packing
    }
    fn tag(&self) -> &str {
        &self.tag
    }
    fn id(&self) -> usize {
        self.id
    }
}

impl DataPersistence for SimulationResult {
    fn data_type() -> DataType {
        DataType::Simulation
    }
    fn tag(&self) -> &str {
        &self.tag
    }
    fn id(&self) -> usize {
        self.id
    }
}

/// Ensures the data directory structure exists under `root`.
pub fn ensure_data_directories(root: &Path) -> Result<(), std::io::Error> {
    fs::create_dir_all(root.join(DataType::Packing.folder()))?;
    fs::create_dir_all(root.join(DataType::Simulation.folder()))?;
    Ok(())
}
