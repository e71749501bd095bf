use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedRecord<T> {
    pub version: u32,
    pub data: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", display_path(.path))]
pub struct UpgradeError {
    pub path: String,
    pub message: String,
}

impl UpgradeError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn missing(path: impl Into<String>) -> Self {
        Self::new(path, "is required")
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}

pub type Upgrade = fn(Value) -> Result<Value, UpgradeError>;

pub struct SchemaVersion {
    pub version: u32,
    pub upgrade: Option<Upgrade>,
}

pub struct Registry {
    pub entity: &'static str,
    pub versions: &'static [SchemaVersion],
}

impl Registry {
    pub fn latest(&self) -> u32 {
        self.versions
            .iter()
            .map(|step| step.version)
            .max()
            .unwrap_or(1)
    }

    fn next_after(&self, version: u32) -> Option<(u32, Upgrade)> {
        self.versions
            .iter()
            .filter(|step| step.version > version)
            .filter_map(|step| step.upgrade.map(|upgrade| (step.version, upgrade)))
            .min_by_key(|(version, _)| *version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    #[error("{entity} record has invalid version {found}")]
    InvalidVersion { entity: &'static str, found: String },

    #[error("{entity} record has version {found}, newer than the latest known version {latest}")]
    FutureVersion {
        entity: &'static str,
        found: u32,
        latest: u32,
    },

    #[error("{entity} upgrade from version {from} to {to} failed: {source}")]
    UpgradeFailed {
        entity: &'static str,
        from: u32,
        to: u32,
        #[source]
        source: UpgradeError,
    },
}

// Values without the `{version, data}` envelope predate it and are version 1.
pub fn from_stored(
    value: Value,
    registry: &Registry,
) -> Result<VersionedRecord<Value>, MigrationError> {
    let mut obj = match value {
        Value::Object(obj) if obj.contains_key("version") && obj.contains_key("data") => obj,
        legacy => {
            return Ok(VersionedRecord {
                version: 1,
                data: legacy,
            });
        }
    };
    let raw_version = obj.remove("version").unwrap_or(Value::Null);
    let version = raw_version
        .as_u64()
        .and_then(|version| u32::try_from(version).ok())
        .ok_or_else(|| MigrationError::InvalidVersion {
            entity: registry.entity,
            found: raw_version.to_string(),
        })?;
    let data = obj.remove("data").unwrap_or(Value::Null);
    Ok(VersionedRecord { version, data })
}

pub fn migrate(
    record: VersionedRecord<Value>,
    registry: &Registry,
) -> Result<VersionedRecord<Value>, MigrationError> {
    if record.version == 0 {
        return Err(MigrationError::InvalidVersion {
            entity: registry.entity,
            found: "0".to_string(),
        });
    }
    let latest = registry.latest();
    if record.version > latest {
        return Err(MigrationError::FutureVersion {
            entity: registry.entity,
            found: record.version,
            latest,
        });
    }

    let mut record = record;
    while let Some((to, upgrade)) = registry.next_after(record.version) {
        let from = record.version;
        debug!(entity = registry.entity, from, to, "upgrading record");
        let data = upgrade(record.data).map_err(|source| MigrationError::UpgradeFailed {
            entity: registry.entity,
            from,
            to,
            source,
        })?;
        record = VersionedRecord { version: to, data };
    }
    Ok(record)
}

pub fn into_object(value: Value, path: &str) -> Result<Map<String, Value>, UpgradeError> {
    match value {
        Value::Object(obj) => Ok(obj),
        _ => Err(UpgradeError::new(path, "expected an object")),
    }
}
