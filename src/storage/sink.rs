use std::fs::{File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::crawler::models::CarRecord;
use crate::error::StorageWriteError;

pub const SINK_HEADER: [&str; 11] = [
    "brand",
    "carName",
    "carImg",
    "saleVolume",
    "price",
    "manufacturer",
    "rank",
    "carModel",
    "energyType",
    "marketTime",
    "insure",
];

/// Append-only CSV log of assembled car records. Created with its header
/// on first write; appended to forever after. The crawl loop is the only
/// writer; the ingestion pass reads it later, possibly while it is still
/// growing.
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append_records(&self, records: &[CarRecord]) -> Result<(), StorageWriteError> {
        if records.is_empty() {
            return Ok(());
        }

        let write_err = |source: csv::Error| StorageWriteError {
            path: self.path.display().to_string(),
            source,
        };

        let fresh = !self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| write_err(e.into()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if fresh {
            writer.write_record(SINK_HEADER).map_err(write_err)?;
        }
        for record in records {
            writer.serialize(record).map_err(write_err)?;
        }
        writer.flush().map_err(|e| write_err(e.into()))?;

        Ok(())
    }

    /// All raw rows present when the read began. The file length is
    /// snapshotted up front so a concurrently appending writer cannot
    /// extend this pass.
    pub fn read_snapshot_raw(&self) -> anyhow::Result<Vec<csv::StringRecord>> {
        let len = std::fs::metadata(&self.path)?.len();
        let file = File::open(&self.path)?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(file.take(len));

        let mut rows = Vec::new();
        for row in reader.records() {
            rows.push(row?);
        }
        Ok(rows)
    }

    /// Typed snapshot, for callers that want records rather than rows.
    pub fn read_snapshot(&self) -> anyhow::Result<Vec<CarRecord>> {
        let len = std::fs::metadata(&self.path)?.len();
        let file = File::open(&self.path)?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(file.take(len));

        let mut records = Vec::new();
        for record in reader.deserialize() {
            records.push(record?);
        }
        Ok(records)
    }
}
