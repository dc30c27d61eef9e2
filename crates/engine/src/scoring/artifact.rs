use std::fs;
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::error::ScoringError;

/// Read a JSON model artifact.
pub fn load_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, ScoringError> {
    let bytes = fs::read(path)?;
    let artifact = serde_json::from_slice(&bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), "Loaded model artifact");
    Ok(artifact)
}

/// Write a JSON model artifact via a temp file + rename, so readers never see
/// a partial file.
pub fn save_artifact<T: Serialize>(path: &Path, artifact: &T) -> Result<(), ScoringError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        serde_json::to_writer_pretty(&mut file, artifact)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    info!(path = %path.display(), "Saved model artifact");
    Ok(())
}
