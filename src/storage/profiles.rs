// src/storage/profiles.rs - Named roast profiles as JSON files
use std::path::PathBuf;
use tokio::fs;

use super::{StorageError, validate_name};
use crate::profile::Profile;

/// One pretty-printed JSON file per profile, `<dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{name}.json")))
    }

    /// Create or overwrite.
    pub async fn save(&self, name: &str, profile: &Profile) -> Result<(), StorageError> {
        let path = self.path(name)?;
        profile.validate()?;
        fs::create_dir_all(&self.dir).await?;
        fs::write(&path, serde_json::to_vec_pretty(profile)?).await?;
        tracing::info!("Saved profile '{}' ({} setpoints)", name, profile.setpoints.len());
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn fetch(&self, name: &str) -> Result<Profile, StorageError> {
        let path = self.path(name)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let profile: Profile = serde_json::from_slice(&bytes)?;
        profile.validate()?;
        Ok(profile)
    }

    pub async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!("Deleted profile '{}'", name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}
