//! Bincode persistence: the compact format the pipeline stages exchange.

use crate::io::DataPersistence;
use std::fs;
use std::path::{Path, PathBuf};

/// Serialises an artefact to its binary path under `root`, creating the
/// parent directory as needed.
pub fn save_file<T: DataPersistence>(data: &T, root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let file_path = data.binary_path(root);

    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let binary_data = bincode::serialize(data)?;
    fs::write(&file_path, binary_data)?;

    Ok(())
}

/// Deserialises an artefact from an explicit file path.
pub fn load_file<T: DataPersistence>(file_path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let binary_data = fs::read(file_path)?;
    let data: T = bincode::deserialize(&binary_data)?;
    Ok(data)
}

/// Lists the binary artefacts of one type under `root`, sorted by path.
pub fn list_files<T: DataPersistence>(root: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
    let dir_path = root.join(T::data_type().folder());

    if !dir_path.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir_path)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("bin") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
