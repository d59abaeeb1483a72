//! libSQL-backed key-value cache for enriched records.
//!
//! Each record is upserted under its ID with the full record serialized as
//! JSON. Schema is managed by the versioned migrations in [`crate::migrations`].

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, params};
use tracing::{debug, info, instrument};

use pokefetch_shared::{PokefetchError, Record, Result};

use crate::RecordSink;
use crate::migrations;

/// Cache handle wrapping a libSQL database.
pub struct Cache {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Cache {
    /// Open or create a cache database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| PokefetchError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| PokefetchError::SinkRead(format!("failed to open cache: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| PokefetchError::SinkRead(format!("failed to connect to cache: {e}")))?;

        let cache = Self { db, conn };
        cache.run_migrations().await?;
        Ok(cache)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        PokefetchError::SinkWrite(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Look up a single cached record.
    pub async fn get(&self, id: i64) -> Result<Option<Record>> {
        let mut rows = self
            .conn
            .query(
                "SELECT payload_json FROM records WHERE id = ?1",
                params![id],
            )
            .await
            .map_err(|e| PokefetchError::SinkRead(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(decode_row(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(PokefetchError::SinkRead(e.to_string())),
        }
    }

    /// Number of cached records.
    pub async fn count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM records", params![])
            .await
            .map_err(|e| PokefetchError::SinkRead(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map(|n| n as usize)
                .map_err(|e| PokefetchError::SinkRead(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(PokefetchError::SinkRead(e.to_string())),
        }
    }
}

#[async_trait]
impl RecordSink for Cache {
    #[instrument(skip_all, fields(records = records.len()))]
    async fn save(&self, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            debug!("nothing to save");
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| PokefetchError::SinkWrite(e.to_string()))?;

        for record in records {
            let payload = serde_json::to_string(record)
                .map_err(|e| PokefetchError::SinkWrite(format!("record {}: {e}", record.id)))?;

            tx.execute(
                "INSERT INTO records (id, name, payload_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   payload_json = excluded.payload_json,
                   updated_at = excluded.updated_at",
                params![record.id, record.name.as_str(), payload.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| PokefetchError::SinkWrite(format!("record {}: {e}", record.id)))?;
        }

        tx.commit()
            .await
            .map_err(|e| PokefetchError::SinkWrite(e.to_string()))?;

        info!(records = records.len(), "cache upserted");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Record>> {
        let mut rows = self
            .conn
            .query("SELECT payload_json FROM records ORDER BY id", params![])
            .await
            .map_err(|e| PokefetchError::SinkRead(e.to_string()))?;

        let mut results = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => results.push(decode_row(&row)?),
                Ok(None) => break,
                Err(e) => return Err(PokefetchError::SinkRead(e.to_string())),
            }
        }
        Ok(results)
    }
}

fn decode_row(row: &libsql::Row) -> Result<Record> {
    let payload = row
        .get::<String>(0)
        .map_err(|e| PokefetchError::SinkRead(e.to_string()))?;
    serde_json::from_str(&payload)
        .map_err(|e| PokefetchError::SinkRead(format!("corrupt cache entry: {e}")))
}
