use crate::error::AppError;
use crate::interpolation::GridSpec;
use crate::record::{self, MeasurementRecord};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Records served by the API plus the defaults for field requests.
#[derive(Debug)]
pub struct AppState {
    records_dir: PathBuf,
    grid: GridSpec,
    records: Vec<MeasurementRecord>,
    loaded_at: Option<SystemTime>,
}

impl AppState {
    pub fn new(records_dir: impl Into<PathBuf>, grid: GridSpec) -> Self {
        Self {
            records_dir: records_dir.into(),
            grid,
            records: Vec::new(),
            loaded_at: None,
        }
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn records(&self) -> &[MeasurementRecord] {
        &self.records
    }

    /// When the records were last replaced; `None` before the first load.
    pub fn loaded_at(&self) -> Option<SystemTime> {
        self.loaded_at
    }

    pub fn set_records(&mut self, records: Vec<MeasurementRecord>, at: SystemTime) {
        self.records = records;
        self.loaded_at = Some(at);
    }

    /// Re-read the records directory, keeping the old records on failure.
    pub fn reload(&mut self, at: SystemTime) -> Result<usize, AppError> {
        let records = record::load_dir(&self.records_dir)?;
        let count = records.len();
        self.set_records(records, at);
        Ok(count)
    }
}
