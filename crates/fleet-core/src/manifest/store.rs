//! Manifest persistence.

use std::path::Path;

use tokio::fs;

use crate::error::{FleetError, Result};

use super::Manifest;

pub const MANIFEST_FILE: &str = "package.json";

/// Read `<dir>/package.json`.
pub async fn read_manifest(dir: &Path) -> Result<Manifest> {
    let path = dir.join(MANIFEST_FILE);
    let bytes = fs::read(&path)
        .await
        .map_err(|e| FleetError::manifest(&path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| FleetError::manifest(&path, e))
}

/// Save `<dir>/package.json` atomically (tmp + rename).
pub async fn write_manifest(dir: &Path, manifest: &Manifest) -> Result<()> {
    let path = dir.join(MANIFEST_FILE);
    let tmp_path = dir.join(format!("{}.{}.tmp", MANIFEST_FILE, std::process::id()));

    let mut bytes =
        serde_json::to_vec_pretty(manifest).map_err(|e| FleetError::manifest(&path, e))?;
    bytes.push(b'\n');

    fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| FleetError::manifest(&tmp_path, e))?;
    fs::rename(&tmp_path, &path)
        .await
        .map_err(|e| FleetError::manifest(&path, e))?;
    Ok(())
}
