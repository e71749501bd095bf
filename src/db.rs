use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use serde_json::Value;
use tracing::debug;

use crate::schema::record::VersionedRecord;
use crate::schema::{self, Entity, EntityKind, LoadError};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub kind: String,
    pub key: String,
    pub record: VersionedRecord<Value>,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSummary {
    pub kind: String,
    pub key: String,
    pub version: u32,
    pub updated_at: String,
}

#[derive(Debug)]
pub enum UpgradeOutcome {
    Upgraded { from: u32, to: u32 },
    Current,
    Missing,
    Failed(LoadError),
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.migrate()?;
        Ok(db)
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                kind TEXT NOT NULL,
                key TEXT NOT NULL,
                version INTEGER NOT NULL CHECK (version >= 1),
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (kind, key)
            );
            CREATE INDEX IF NOT EXISTS idx_records_updated_at ON records(updated_at DESC);
            "#,
        )?;
        Ok(())
    }

    pub fn put_record(&self, kind: EntityKind, key: &str, record: &VersionedRecord<Value>) -> Result<()> {
        write_record(&self.conn, kind, key, record)
    }

    pub fn store_entity(&self, entity: &Entity) -> Result<String> {
        let key = entity
            .storage_key()
            .with_context(|| format!("{} records are not stored on their own", entity.kind()))?;
        let record = entity.to_record()?;
        self.put_record(entity.kind(), &key, &record)?;
        Ok(key)
    }

    pub fn get_record(&self, kind: EntityKind, key: &str) -> Result<Option<StoredRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT version, data, updated_at FROM records WHERE kind = ?1 AND key = ?2",
                params![kind.as_str(), key],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;
        let Some((version, data, updated_at)) = row else {
            return Ok(None);
        };
        let data = serde_json::from_str(&data)
            .with_context(|| format!("stored {kind} record {key:?} is not valid JSON"))?;
        Ok(Some(StoredRecord {
            kind: kind.as_str().to_string(),
            key: key.to_string(),
            record: VersionedRecord { version, data },
            updated_at,
        }))
    }

    pub fn load_entity(&self, kind: EntityKind, key: &str) -> Result<Option<Entity>> {
        let Some(stored) = self.get_record(kind, key)? else {
            return Ok(None);
        };
        let entity = schema::load_record(kind, stored.record)
            .with_context(|| format!("stored {kind} record {key:?} cannot be loaded"))?;
        Ok(Some(entity))
    }

    pub fn list_records(&self, kind: Option<EntityKind>) -> Result<Vec<RecordSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT kind, key, version, updated_at FROM records
             WHERE ?1 IS NULL OR kind = ?1
             ORDER BY kind, key",
        )?;
        let rows = stmt.query_map(params![kind.map(EntityKind::as_str)], |row| {
            Ok(RecordSummary {
                kind: row.get(0)?,
                key: row.get(1)?,
                version: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn remove_record(&self, kind: EntityKind, key: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM records WHERE kind = ?1 AND key = ?2",
            params![kind.as_str(), key],
        )?;
        Ok(removed > 0)
    }

    // One IMMEDIATE transaction per key; a failed record is left untouched.
    pub fn upgrade_record(&mut self, kind: EntityKind, key: &str) -> Result<UpgradeOutcome> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some((version, raw)) = read_raw(&tx, kind, key)? else {
            return Ok(UpgradeOutcome::Missing);
        };
        let data = match serde_json::from_str::<Value>(&raw) {
            Ok(data) => data,
            Err(err) => return Ok(UpgradeOutcome::Failed(LoadError::Json(err))),
        };

        let entity = match schema::load_record(kind, VersionedRecord { version, data }) {
            Ok(entity) => entity,
            Err(err) => return Ok(UpgradeOutcome::Failed(err)),
        };
        let record = entity.to_record()?;
        if record.version == version {
            return Ok(UpgradeOutcome::Current);
        }

        write_record(&tx, kind, key, &record)?;
        tx.commit()?;
        debug!(%kind, key, from = version, to = record.version, "record upgraded in place");
        Ok(UpgradeOutcome::Upgraded {
            from: version,
            to: record.version,
        })
    }

    pub fn update_entity<F>(&mut self, kind: EntityKind, key: &str, change: F) -> Result<Option<Entity>>
    where
        F: FnOnce(Entity) -> Result<Entity>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some((version, raw)) = read_raw(&tx, kind, key)? else {
            return Ok(None);
        };
        let data = serde_json::from_str::<Value>(&raw)
            .with_context(|| format!("stored {kind} record {key:?} is not valid JSON"))?;
        let entity = schema::load_record(kind, VersionedRecord { version, data })
            .with_context(|| format!("stored {kind} record {key:?} cannot be loaded"))?;

        let changed = change(entity)?;
        write_record(&tx, kind, key, &changed.to_record()?)?;
        tx.commit()?;
        Ok(Some(changed))
    }
}

fn read_raw(tx: &Transaction<'_>, kind: EntityKind, key: &str) -> Result<Option<(u32, String)>> {
    let row = tx
        .query_row(
            "SELECT version, data FROM records WHERE kind = ?1 AND key = ?2",
            params![kind.as_str(), key],
            |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;
    Ok(row)
}

fn write_record(conn: &Connection, kind: EntityKind, key: &str, record: &VersionedRecord<Value>) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let data = serde_json::to_string(&record.data)?;
    conn.execute(
        r#"
        INSERT INTO records (kind, key, version, data, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(kind, key) DO UPDATE SET
            version = excluded.version,
            data = excluded.data,
            updated_at = excluded.updated_at
        "#,
        params![kind.as_str(), key, record.version, data, now],
    )?;
    Ok(())
}
