use std::collections::HashSet;

use tracing::{info, warn};

use crate::crawler::models::CarRecord;
use crate::storage::sink::{CsvSink, SINK_HEADER};
use crate::storage::sqlite::Storage;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub read: usize,
    pub skipped_missing: usize,
    pub skipped_duplicate: usize,
    pub inserted: usize,
}

/// Offline pass from the durable sink into the relational store: drop
/// rows with empty fields, drop exact duplicates (first occurrence
/// wins), bulk-insert the survivors. Not idempotent across re-runs; the
/// store has no uniqueness constraint, so running this twice over the
/// same sink doubles the rows.
pub struct IngestService {
    sink: CsvSink,
    storage: Storage,
}

impl IngestService {
    pub fn new(sink: CsvSink, storage: Storage) -> Self {
        Self { sink, storage }
    }

    pub async fn run(&self) -> anyhow::Result<IngestReport> {
        let rows = self.sink.read_snapshot_raw()?;

        let mut report = IngestReport::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut survivors: Vec<CarRecord> = Vec::new();

        for row in rows {
            report.read += 1;

            if row.len() != SINK_HEADER.len() || row.iter().any(|cell| cell.trim().is_empty()) {
                report.skipped_missing += 1;
                continue;
            }

            // Exact-duplicate means every field byte-identical.
            let key = row.iter().collect::<Vec<_>>().join("\u{1f}");
            if !seen.insert(key) {
                report.skipped_duplicate += 1;
                continue;
            }

            match CarRecord::from_row(&row) {
                Some(record) => survivors.push(record),
                None => {
                    warn!(position = report.read, "Unparseable sink row; skipping");
                    report.skipped_missing += 1;
                }
            }
        }

        report.inserted = self.storage.insert_cars_batch(&survivors).await?;

        info!(
            read = report.read,
            skipped_missing = report.skipped_missing,
            skipped_duplicate = report.skipped_duplicate,
            inserted = report.inserted,
            "Ingestion pass complete"
        );

        Ok(report)
    }
}
