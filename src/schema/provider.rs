use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

use super::validate::{Checker, ValidationErrors, join_path};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Provider {
    Custom,
    DanDanPlay,
    Bilibili,
    Tencent,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Custom,
        Provider::DanDanPlay,
        Provider::Bilibili,
        Provider::Tencent,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Custom => "Custom",
            Self::DanDanPlay => "DanDanPlay",
            Self::Bilibili => "Bilibili",
            Self::Tencent => "Tencent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|provider| provider.as_str() == raw)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "provider", content = "providerIds")]
pub enum SeasonIds {
    Custom {},
    #[serde(rename_all = "camelCase")]
    DanDanPlay { anime_id: i64 },
    #[serde(rename_all = "camelCase")]
    Bilibili { season_id: i64 },
    Tencent { cid: String },
}

impl SeasonIds {
    pub fn provider(&self) -> Provider {
        match self {
            Self::Custom {} => Provider::Custom,
            Self::DanDanPlay { .. } => Provider::DanDanPlay,
            Self::Bilibili { .. } => Provider::Bilibili,
            Self::Tencent { .. } => Provider::Tencent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "provider", content = "providerIds")]
pub enum EpisodeIds {
    Custom {},
    #[serde(rename_all = "camelCase")]
    DanDanPlay { anime_id: i64, episode_id: i64 },
    #[serde(rename_all = "camelCase")]
    Bilibili {
        season_id: i64,
        cid: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        epid: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        aid: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        bvid: Option<String>,
    },
    Tencent { cid: String, vid: String },
}

impl EpisodeIds {
    pub fn provider(&self) -> Provider {
        match self {
            Self::Custom {} => Provider::Custom,
            Self::DanDanPlay { .. } => Provider::DanDanPlay,
            Self::Bilibili { .. } => Provider::Bilibili,
            Self::Tencent { .. } => Provider::Tencent,
        }
    }

    pub fn episode_key(&self) -> Option<String> {
        match self {
            Self::Custom {} => None,
            Self::DanDanPlay { episode_id, .. } => Some(episode_id.to_string()),
            Self::Bilibili { cid, .. } => Some(cid.to_string()),
            Self::Tencent { vid, .. } => Some(vid.clone()),
        }
    }
}

pub fn check_episode_in_season(
    episode: &EpisodeIds,
    season: &SeasonIds,
) -> Result<(), ValidationErrors> {
    let mismatch = |field: &str, episode_value: String, season_value: String| {
        ValidationErrors::single(
            join_path("providerIds", field),
            format!("episode has {episode_value} but its season has {season_value}"),
        )
    };

    match (episode, season) {
        (EpisodeIds::Custom {}, SeasonIds::Custom {}) => Ok(()),
        (EpisodeIds::DanDanPlay { anime_id, .. }, SeasonIds::DanDanPlay { anime_id: season_id }) => {
            if anime_id == season_id {
                Ok(())
            } else {
                Err(mismatch("animeId", anime_id.to_string(), season_id.to_string()))
            }
        }
        (
            EpisodeIds::Bilibili { season_id, .. },
            SeasonIds::Bilibili {
                season_id: parent_id,
            },
        ) => {
            if season_id == parent_id {
                Ok(())
            } else {
                Err(mismatch("seasonId", season_id.to_string(), parent_id.to_string()))
            }
        }
        (EpisodeIds::Tencent { cid, .. }, SeasonIds::Tencent { cid: parent_cid }) => {
            if cid == parent_cid {
                Ok(())
            } else {
                Err(mismatch("cid", cid.clone(), parent_cid.clone()))
            }
        }
        _ => Err(ValidationErrors::single(
            "provider",
            format!(
                "episode provider {} does not match season provider {}",
                episode.provider(),
                season.provider()
            ),
        )),
    }
}

pub fn read_provider(checker: &mut Checker, obj: &Map<String, Value>) -> Option<Provider> {
    let raw = checker.string(obj, "", "provider");
    if raw.is_empty() {
        return None;
    }
    let provider = Provider::parse(&raw);
    if provider.is_none() {
        checker.push(
            "provider",
            format!(
                "unknown provider {raw:?}, expected one of {}",
                Provider::ALL.map(Provider::as_str).join(", ")
            ),
        );
    }
    provider
}

fn provider_ids<'v>(
    checker: &mut Checker,
    obj: &'v Map<String, Value>,
) -> Option<&'v Map<String, Value>> {
    checker.field_object(obj, "", "providerIds")
}

fn reject_foreign_ids(
    checker: &mut Checker,
    ids: &Map<String, Value>,
    provider: Provider,
    allowed: &[&str],
) {
    for key in ids.keys().filter(|key| !allowed.contains(&key.as_str())) {
        checker.push(
            join_path("providerIds", key),
            format!("not allowed for {provider}"),
        );
    }
}

pub fn read_season_ids(
    checker: &mut Checker,
    obj: &Map<String, Value>,
) -> Option<SeasonIds> {
    let provider = read_provider(checker, obj)?;
    let ids = provider_ids(checker, obj)?;
    let path = "providerIds";
    let allowed: &[&str] = match provider {
        Provider::Custom => &[],
        Provider::DanDanPlay => &["animeId"],
        Provider::Bilibili => &["seasonId"],
        Provider::Tencent => &["cid"],
    };
    reject_foreign_ids(checker, ids, provider, allowed);
    Some(match provider {
        Provider::Custom => SeasonIds::Custom {},
        Provider::DanDanPlay => SeasonIds::DanDanPlay {
            anime_id: checker.integer(ids, path, "animeId"),
        },
        Provider::Bilibili => SeasonIds::Bilibili {
            season_id: checker.integer(ids, path, "seasonId"),
        },
        Provider::Tencent => SeasonIds::Tencent {
            cid: checker.string(ids, path, "cid"),
        },
    })
}

pub fn read_episode_ids(
    checker: &mut Checker,
    obj: &Map<String, Value>,
) -> Option<EpisodeIds> {
    let provider = read_provider(checker, obj)?;
    let ids = provider_ids(checker, obj)?;
    let path = "providerIds";
    let allowed: &[&str] = match provider {
        Provider::Custom => &[],
        Provider::DanDanPlay => &["animeId", "episodeId"],
        Provider::Bilibili => &["seasonId", "cid", "epid", "aid", "bvid"],
        Provider::Tencent => &["cid", "vid"],
    };
    reject_foreign_ids(checker, ids, provider, allowed);
    Some(match provider {
        Provider::Custom => EpisodeIds::Custom {},
        Provider::DanDanPlay => EpisodeIds::DanDanPlay {
            anime_id: checker.integer(ids, path, "animeId"),
            episode_id: checker.integer(ids, path, "episodeId"),
        },
        Provider::Bilibili => EpisodeIds::Bilibili {
            season_id: checker.integer(ids, path, "seasonId"),
            cid: checker.integer(ids, path, "cid"),
            epid: checker.opt_integer(ids, path, "epid"),
            aid: checker.opt_integer(ids, path, "aid"),
            bvid: checker.opt_string(ids, path, "bvid"),
        },
        Provider::Tencent => EpisodeIds::Tencent {
            cid: checker.string(ids, path, "cid"),
            vid: checker.string(ids, path, "vid"),
        },
    })
}
