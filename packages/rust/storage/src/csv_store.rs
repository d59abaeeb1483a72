//! Flat-file record store.
//!
//! The whole record set lives in one CSV file with header
//! `id,name,height,weight,flat_abilities`. Every write replaces the file
//! atomically: rows go to a sibling temp file which is then renamed over the
//! target.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use pokefetch_shared::{PokefetchError, Record, Result};

use crate::RecordStore;

/// One CSV row.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    id: i64,
    name: String,
    height: i64,
    weight: i64,
    flat_abilities: String,
}

impl From<&Record> for CsvRow {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            height: record.height,
            weight: record.weight,
            flat_abilities: record.flat_reference_uris(),
        }
    }
}

impl From<CsvRow> for Record {
    fn from(row: CsvRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            height: row.height,
            weight: row.weight,
            reference_uris: Record::split_reference_uris(&row.flat_abilities),
            effect_entries: Vec::new(),
        }
    }
}

/// CSV-file implementation of [`RecordStore`].
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "records.csv".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Serialize the full record set, header included.
fn encode(records: &[Record]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if records.is_empty() {
        writer
            .write_record(["id", "name", "height", "weight", "flat_abilities"])
            .map_err(|e| PokefetchError::StoreWrite(e.to_string()))?;
    }
    for record in records {
        writer
            .serialize(CsvRow::from(record))
            .map_err(|e| PokefetchError::StoreWrite(format!("record {}: {e}", record.id)))?;
    }
    writer
        .into_inner()
        .map_err(|e| PokefetchError::StoreWrite(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Vec<Record>> {
    let mut reader = csv::Reader::from_reader(bytes);
    let mut records = Vec::new();
    for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
        // Data rows start on line 2, after the header.
        let row = row
            .map_err(|e| PokefetchError::StoreRead(format!("corrupt row at line {}: {e}", line + 2)))?;
        records.push(Record::from(row));
    }
    Ok(records)
}

#[async_trait]
impl RecordStore for CsvStore {
    #[instrument(skip_all, fields(path = %self.path.display(), records = records.len()))]
    async fn write(&self, records: &[Record]) -> Result<()> {
        let bytes = encode(records)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PokefetchError::StoreWrite(format!("{}: {e}", parent.display())))?;
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| PokefetchError::StoreWrite(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| PokefetchError::StoreWrite(format!("{}: {e}", self.path.display())))?;

        info!(records = records.len(), bytes = bytes.len(), "record store written");
        Ok(())
    }

    #[instrument(skip_all, fields(path = %self.path.display()))]
    async fn read(&self) -> Result<Vec<Record>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|e| PokefetchError::StoreRead(format!("{}: {e}", self.path.display())))?;

        let records = decode(&bytes)?;
        debug!(records = records.len(), "record store read");
        Ok(records)
    }
}
