//! Persistence collaborators: CSV roast logs and named JSON profiles.

pub mod logs;
pub mod profiles;

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::engine::FinishedRoast;
use crate::profile::ProfileError;

pub use logs::RoastLogStore;
pub use profiles::ProfileStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid name: {0:?}")]
    InvalidName(String),
    #[error(transparent)]
    InvalidProfile(#[from] ProfileError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Where finished roasts go. Returns the name the roast was stored under.
#[async_trait]
pub trait RoastLogSink: Send + Sync + 'static {
    async fn save(&self, roast: &FinishedRoast) -> Result<String, StorageError>;
}

#[async_trait]
impl RoastLogSink for RoastLogStore {
    async fn save(&self, roast: &FinishedRoast) -> Result<String, StorageError> {
        RoastLogStore::save(self, roast).await
    }
}

/// Keeps finished roasts in memory. Used by tests and dry runs.
#[derive(Clone, Default)]
pub struct MemoryLogSink {
    saved: Arc<Mutex<Vec<FinishedRoast>>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<FinishedRoast> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl RoastLogSink for MemoryLogSink {
    async fn save(&self, roast: &FinishedRoast) -> Result<String, StorageError> {
        let mut saved = self.saved.lock().unwrap_or_else(|e| e.into_inner());
        saved.push(roast.clone());
        Ok(format!("memory:{}", saved.len()))
    }
}

/// Names become file names: ASCII alphanumerics, `-`, `_` and inner spaces.
pub(crate) fn validate_name(name: &str) -> Result<(), StorageError> {
    let ok = !name.is_empty()
        && name.len() <= 128
        && name.trim() == name
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' '));
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}
