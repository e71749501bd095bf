pub mod comment;
pub mod episode;
pub mod options;
pub mod policy;
pub mod provider;
pub mod record;
pub mod season;
pub mod validate;

use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

use crate::danmaku::comment::CommentEntity;

use self::episode::CanonicalEpisode;
use self::options::ExtensionOptions;
use self::policy::PolicyEntry;
use self::record::{MigrationError, Registry, VersionedRecord, from_stored, migrate};
use self::season::CanonicalSeason;
use self::validate::ValidationErrors;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Season,
    Episode,
    Comments,
    Policy,
    Options,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Season,
        EntityKind::Episode,
        EntityKind::Comments,
        EntityKind::Policy,
        EntityKind::Options,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Season => "season",
            Self::Episode => "episode",
            Self::Comments => "comments",
            Self::Policy => "policy",
            Self::Options => "options",
        }
    }

    pub fn registry(self) -> &'static Registry {
        match self {
            Self::Season => &season::REGISTRY,
            Self::Episode => &episode::REGISTRY,
            Self::Comments => &comment::REGISTRY,
            Self::Policy => &policy::REGISTRY,
            Self::Options => &options::REGISTRY,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == raw)
            .ok_or_else(|| format!("unknown entity kind {raw:?}"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Season(CanonicalSeason),
    Episode(CanonicalEpisode),
    Comments(Vec<CommentEntity>),
    Policy(PolicyEntry),
    Options(ExtensionOptions),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Season(_) => EntityKind::Season,
            Self::Episode(_) => EntityKind::Episode,
            Self::Comments(_) => EntityKind::Comments,
            Self::Policy(_) => EntityKind::Policy,
            Self::Options(_) => EntityKind::Options,
        }
    }

    pub fn storage_key(&self) -> Option<String> {
        match self {
            Self::Season(season) => Some(season.storage_key()),
            Self::Episode(episode) => Some(episode.storage_key()),
            Self::Comments(_) => None,
            Self::Policy(entry) => Some(entry.name.clone()),
            Self::Options(_) => Some(options::OPTIONS_KEY.to_string()),
        }
    }

    pub fn to_record(&self) -> Result<VersionedRecord<Value>, serde_json::Error> {
        let data = match self {
            Self::Season(season) => serde_json::to_value(season)?,
            Self::Episode(episode) => serde_json::to_value(episode)?,
            Self::Comments(comments) => serde_json::to_value(comments)?,
            Self::Policy(entry) => serde_json::to_value(entry)?,
            Self::Options(options) => serde_json::to_value(options)?,
        };
        Ok(VersionedRecord {
            version: self.kind().registry().latest(),
            data,
        })
    }
}

pub fn load_value<T>(
    value: Value,
    registry: &Registry,
    validate: fn(&Value) -> Result<T, ValidationErrors>,
) -> Result<T, LoadError> {
    let record = migrate(from_stored(value, registry)?, registry)?;
    Ok(validate(&record.data)?)
}

pub fn load(kind: EntityKind, value: Value) -> Result<Entity, LoadError> {
    let registry = kind.registry();
    Ok(match kind {
        EntityKind::Season => Entity::Season(load_value(value, registry, season::validate)?),
        EntityKind::Episode => Entity::Episode(load_value(value, registry, episode::validate)?),
        EntityKind::Comments => Entity::Comments(load_value(value, registry, comment::validate)?),
        EntityKind::Policy => Entity::Policy(load_value(value, registry, policy::validate)?),
        EntityKind::Options => Entity::Options(load_value(value, registry, options::validate)?),
    })
}

pub fn load_record(
    kind: EntityKind,
    record: VersionedRecord<Value>,
) -> Result<Entity, LoadError> {
    let envelope = serde_json::to_value(record)?;
    load(kind, envelope)
}

pub fn load_batch(kind: EntityKind, values: Vec<Value>) -> Vec<Result<Entity, LoadError>> {
    values.into_iter().map(|value| load(kind, value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_kind_round_trips_through_its_name() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>(), Ok(kind));
        }
        assert!("movie".parse::<EntityKind>().is_err());
    }

    #[test]
    fn loaded_entity_reloads_unchanged_from_its_record() {
        let season = load(
            EntityKind::Season,
            json!({ "animeId": 1, "animeTitle": "Show" }),
        )
        .expect("legacy season loads");
        let record = season.to_record().expect("record");
        assert_eq!(record.version, 2);
        assert_eq!(load_record(EntityKind::Season, record).expect("reload"), season);
    }

    fn legacy_sample(kind: EntityKind) -> Value {
        match kind {
            EntityKind::Season => json!({ "animeId": 1, "animeTitle": "Show", "episodeCount": 12 }),
            EntityKind::Episode => json!({
                "animeId": 1,
                "episodeId": 10001,
                "episodeTitle": "Pilot",
                "episodeNumber": 1,
                "comments": [
                    { "cid": 3, "time": 1.5, "mode": "ltr", "color": 65280, "uid": "u", "text": "hi" }
                ]
            }),
            EntityKind::Comments => json!([
                { "time": 2, "mode": "bottom", "color": "#ff0000", "text": "red" }
            ]),
            EntityKind::Policy => json!({
                "name": "site",
                "policy": { "title": { "selector": "h1", "regex": ".+" } }
            }),
            EntityKind::Options => json!({
                "enabled": false,
                "theme": "dark",
                "danmakuSources": ["Tencent"]
            }),
        }
    }

    #[test]
    fn every_registry_migrates_idempotently_and_reloads_unchanged() {
        for kind in EntityKind::ALL {
            let registry = kind.registry();
            let stored = from_stored(legacy_sample(kind), registry).expect("legacy sample reads");
            assert_eq!(stored.version, 1, "{kind}");

            let once = migrate(stored, registry).expect("legacy sample migrates");
            assert_eq!(once.version, registry.latest(), "{kind}");
            let twice = migrate(once.clone(), registry).expect("latest migrates");
            assert_eq!(twice, once, "{kind}");

            let entity = load_record(kind, once).expect("migrated sample validates");
            let record = entity.to_record().expect("record");
            assert_eq!(migrate(record.clone(), registry).expect("current"), record, "{kind}");
            assert_eq!(load_record(kind, record).expect("reload"), entity, "{kind}");
        }
    }

    #[test]
    fn batch_load_keeps_going_after_a_bad_record() {
        let results = load_batch(
            EntityKind::Season,
            vec![
                json!({ "animeId": 1, "animeTitle": "One" }),
                json!({ "version": 9, "data": {} }),
                json!({ "version": 2, "data": { "provider": "Tencent", "providerIds": {}, "title": "x" } }),
                json!({ "animeId": 4, "animeTitle": "Four" }),
            ],
        );
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(LoadError::Migration(_))));
        assert!(matches!(results[2], Err(LoadError::Validation(_))));
        assert!(results[3].is_ok());
    }

    #[test]
    fn storage_keys_follow_the_entity() {
        let options = Entity::Options(ExtensionOptions::default());
        assert_eq!(options.storage_key().as_deref(), Some("options"));
        assert_eq!(Entity::Comments(Vec::new()).storage_key(), None);
    }
}
