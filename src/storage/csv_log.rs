/// Append-only CSV log of every reading, and reading its tail back
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::models::Reading;
use crate::utils::{format_datetime, round3};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("CSV log I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV encoding error: {0}")]
    Csv(#[from] csv::Error),
}

/// One `time,co2,temp,humidity` row of the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub time: String,
    pub co2: u32,
    pub temp: f32,
    pub humidity: f32,
}

impl LogRecord {
    pub fn from_reading(reading: &Reading) -> Self {
        LogRecord {
            time: format_datetime(&reading.timestamp),
            co2: reading.co2 as u32,
            temp: round3(reading.temperature),
            humidity: round3(reading.humidity),
        }
    }
}

/// Serialize one record as a headerless CSV row, newline included
pub fn encode_record(record: &LogRecord) -> Result<Vec<u8>, csv::Error> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.serialize(record)?;
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

/// Every well-formed record in `data`, in file order; malformed rows are skipped
pub fn decode_records(data: &[u8]) -> Vec<LogRecord> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data)
        .deserialize::<LogRecord>()
        .filter_map(Result::ok)
        .filter(|record| !record.time.is_empty())
        .collect()
}

#[derive(Debug, Clone)]
pub struct CsvLog {
    path: PathBuf,
}

impl CsvLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        CsvLog {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, creating the file on first use
    pub async fn append(&self, reading: &Reading) -> Result<(), LogError> {
        let row = encode_record(&LogRecord::from_reading(reading))?;
        let io_err = |source| LogError::Io {
            path: self.path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;
        file.write_all(&row).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        Ok(())
    }
}

/// Last `nlines` well-formed records, oldest first
///
/// A missing log simply has no records yet.
pub async fn read_tail(path: &Path, nlines: usize) -> Result<Vec<LogRecord>, LogError> {
    let contents = match tokio::fs::read(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(LogError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut records = decode_records(&contents);
    let skip = records.len().saturating_sub(nlines);
    records.drain(..skip);
    Ok(records)
}
