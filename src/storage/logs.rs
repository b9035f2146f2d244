// src/storage/logs.rs - Roast logs as CSV files
use std::path::PathBuf;
use tokio::fs;

use super::StorageError;
use crate::engine::{FinishedRoast, LogRow};

const HEADER: [&str; 6] = [
    "timestamp",
    "bean_temperature",
    "environment_temperature",
    "fan_speed",
    "heating_power",
    "target_temperature",
];

#[derive(Debug, Clone)]
pub struct RoastLogStore {
    dir: PathBuf,
}

impl RoastLogStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `roast_log_YYYYmmdd_HHMMSS.csv`, named after the roast start.
    /// An existing file is never overwritten; a `_N` suffix is added instead.
    pub async fn save(&self, roast: &FinishedRoast) -> Result<String, StorageError> {
        fs::create_dir_all(&self.dir).await?;
        let stem = format!("roast_log_{}", roast.started_at.format("%Y%m%d_%H%M%S"));
        let mut name = format!("{stem}.csv");
        let mut n = 1;
        while fs::try_exists(self.dir.join(&name)).await? {
            name = format!("{stem}_{n}.csv");
            n += 1;
        }

        let bytes = encode_rows(&roast.log_rows())?;
        fs::write(self.dir.join(&name), bytes).await?;
        tracing::info!(
            "Saved roast log {} ({} rows)",
            name,
            roast.records.len()
        );
        Ok(name)
    }

    /// CSV file names, sorted. A missing directory lists as empty.
    pub async fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".csv") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn read(&self, filename: &str) -> Result<Vec<LogRow>, StorageError> {
        if filename.contains(['/', '\\']) || filename.starts_with('.') || !filename.ends_with(".csv") {
            return Err(StorageError::NotFound(filename.to_string()));
        }
        let bytes = match fs::read(self.dir.join(filename)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(filename.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let mut reader = csv::Reader::from_reader(bytes.as_slice());
        let rows = reader.deserialize().collect::<Result<Vec<LogRow>, _>>()?;
        Ok(rows)
    }
}

fn encode_rows(rows: &[LogRow]) -> Result<Vec<u8>, StorageError> {
    // Header written by hand so an empty roast still gets one.
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.write_record(HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| StorageError::Io(e.into_error()))
}
