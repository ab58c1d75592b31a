//! JSON export: human-readable copies of pipeline artefacts.

use crate::io::DataPersistence;
use std::path::Path;

/// Writes an artefact as pretty-printed JSON under `root`.
pub fn export_json<T: DataPersistence>(data: &T, root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let file_path = data.json_path(root);

    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json_data = serde_json::to_string_pretty(data)?;
    std::fs::write(&file_path, json_data)?;

    Ok(())
}

/// Reads an artefact back from a JSON file.
pub fn load_json<T: DataPersistence>(file_path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let json_data = std::fs::read_to_string(file_path)?;
    let data: T = serde_json::from_str(&json_data)?;
    Ok(data)
}
