//! Measurement records and their one-file-per-record persistence.

use crate::platform::WifiSample;
use crate::probe::{LatencyStats, NetworkProbeResult, ThroughputStats};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info, warn};

const FILE_PREFIX: &str = "wifi_analysis_";
const FILE_EXTENSION: &str = "json";
/// Same-second records get a numeric suffix; give up after this many.
const MAX_NAME_ATTEMPTS: u32 = 1000;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("coordinates must be finite, got ({x}, {y})")]
    InvalidCoordinates { x: f64, y: f64 },
    #[error("timestamp format error: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed record file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Planar position, arbitrary unit, origin bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

impl Coordinates {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Where a measurement was taken from, beyond its coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordContext {
    pub os: Option<String>,
    pub interface: Option<String>,
    pub gateway_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub timestamp: String,
    pub coordinates: Coordinates,
    #[serde(default)]
    pub wifi_info: WifiSample,
    #[serde(default)]
    pub latency: LatencyStats,
    #[serde(default)]
    pub throughput: ThroughputStats,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub interface: Option<String>,
    #[serde(default)]
    pub gateway_ip: Option<String>,
}

impl MeasurementRecord {
    pub fn assemble(
        wifi_info: WifiSample,
        probe: NetworkProbeResult,
        coordinates: Coordinates,
        captured_at: OffsetDateTime,
        context: RecordContext,
    ) -> Result<Self, RecordError> {
        if !coordinates.is_finite() {
            return Err(RecordError::InvalidCoordinates {
                x: coordinates.x,
                y: coordinates.y,
            });
        }

        Ok(Self {
            timestamp: captured_at.format(&Rfc3339)?,
            coordinates,
            wifi_info,
            latency: probe.latency,
            throughput: probe.throughput,
            os: context.os,
            interface: context.interface,
            gateway_ip: context.gateway_ip,
        })
    }
}

/// `wifi_analysis_YYYYMMDD_HHMMSS` for the capture time.
pub fn file_stem(captured_at: OffsetDateTime) -> String {
    format!(
        "{FILE_PREFIX}{:04}{:02}{:02}_{:02}{:02}{:02}",
        captured_at.year(),
        u8::from(captured_at.month()),
        captured_at.day(),
        captured_at.hour(),
        captured_at.minute(),
        captured_at.second()
    )
}

/// Write `record` as a new JSON file under `dir` and return its path.
///
/// Existing files are never overwritten.
pub fn store(
    dir: &Path,
    record: &MeasurementRecord,
    captured_at: OffsetDateTime,
) -> Result<PathBuf, RecordError> {
    fs::create_dir_all(dir).map_err(|source| RecordError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let body = serde_json::to_vec_pretty(record).map_err(|source| RecordError::Json {
        path: dir.to_path_buf(),
        source,
    })?;

    let stem = file_stem(captured_at);
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = if attempt == 0 {
            format!("{stem}.{FILE_EXTENSION}")
        } else {
            format!("{stem}_{attempt}.{FILE_EXTENSION}")
        };
        let path = dir.join(name);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(source) => return Err(RecordError::Io { path, source }),
        };
        file.write_all(&body)
            .map_err(|source| RecordError::Io {
                path: path.clone(),
                source,
            })?;
        info!(path = %path.display(), "Measurement stored");
        return Ok(path);
    }

    Err(RecordError::Io {
        path: dir.join(format!("{stem}.{FILE_EXTENSION}")),
        source: std::io::Error::new(ErrorKind::AlreadyExists, "no free file name"),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RecordFile {
    Many(Vec<MeasurementRecord>),
    One(Box<MeasurementRecord>),
}

/// Parse one measurement file holding a record or an array of records.
pub fn load_file(path: &Path) -> Result<Vec<MeasurementRecord>, RecordError> {
    let contents = fs::read_to_string(path).map_err(|source| RecordError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: RecordFile =
        serde_json::from_str(&contents).map_err(|source| RecordError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(match parsed {
        RecordFile::Many(records) => records,
        RecordFile::One(record) => vec![*record],
    })
}

/// Load every `*.json` record under `dir` in file-name order.
///
/// Unreadable or malformed files are logged and skipped. A missing
/// directory is an error.
pub fn load_dir(dir: &Path) -> Result<Vec<MeasurementRecord>, RecordError> {
    let entries = fs::read_dir(dir).map_err(|source| RecordError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(FILE_EXTENSION))
        })
        .collect();
    paths.sort();

    let mut records = Vec::new();
    for path in &paths {
        match load_file(path) {
            Ok(mut loaded) => {
                debug!(path = %path.display(), count = loaded.len(), "Loaded measurement file");
                records.append(&mut loaded);
            }
            Err(err) => warn!(error = %err, "Skipping measurement file"),
        }
    }

    info!(
        dir = %dir.display(),
        files = paths.len(),
        records = records.len(),
        "Measurements loaded"
    );
    Ok(records)
}
