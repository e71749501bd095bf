use serde::Serialize;
use serde_json::{Map, Value, json};

use super::provider::{SeasonIds, read_season_ids};
use super::record::{Registry, SchemaVersion, UpgradeError, into_object};
use super::validate::{Checker, ValidationErrors};

pub static REGISTRY: Registry = Registry {
    entity: "season",
    versions: &[
        SchemaVersion {
            version: 1,
            upgrade: None,
        },
        SchemaVersion {
            version: 2,
            upgrade: Some(upgrade_v1_to_v2),
        },
    ],
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalSeason {
    #[serde(flatten)]
    pub ids: SeasonIds,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    pub alternative_titles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_link: Option<String>,
}

impl CanonicalSeason {
    pub fn storage_key(&self) -> String {
        let provider = self.ids.provider();
        match &self.ids {
            SeasonIds::Custom {} => format!("{provider}:{}", self.title),
            SeasonIds::DanDanPlay { anime_id } => format!("{provider}:{anime_id}"),
            SeasonIds::Bilibili { season_id } => format!("{provider}:{season_id}"),
            SeasonIds::Tencent { cid } => format!("{provider}:{cid}"),
        }
    }
}

// v1 only knew DanDanPlay: `{animeId, animeTitle, type?, imageUrl?, episodeCount?}`.
fn upgrade_v1_to_v2(data: Value) -> Result<Value, UpgradeError> {
    let mut legacy = into_object(data, "")?;
    let anime_id = legacy
        .remove("animeId")
        .ok_or_else(|| UpgradeError::missing("animeId"))?;
    let title = legacy
        .remove("animeTitle")
        .ok_or_else(|| UpgradeError::missing("animeTitle"))?;

    let mut out = Map::new();
    out.insert("provider".to_string(), json!("DanDanPlay"));
    out.insert("providerIds".to_string(), json!({ "animeId": anime_id }));
    out.insert("title".to_string(), title);
    out.insert(
        "type".to_string(),
        legacy.remove("type").unwrap_or_else(|| json!("unknown")),
    );
    for key in ["imageUrl", "episodeCount"] {
        if let Some(value) = legacy.remove(key) {
            out.insert(key.to_string(), value);
        }
    }
    out.insert("alternativeTitles".to_string(), json!([]));
    Ok(Value::Object(out))
}

pub fn validate(data: &Value) -> Result<CanonicalSeason, ValidationErrors> {
    let mut checker = Checker::default();
    let Some(obj) = checker.object("", data) else {
        return Err(checker.into_errors());
    };

    let ids = read_season_ids(&mut checker, obj);
    let season = CanonicalSeason {
        ids: ids.unwrap_or(SeasonIds::Custom {}),
        title: checker.string(obj, "", "title"),
        kind: checker
            .opt_string(obj, "", "type")
            .unwrap_or_else(|| "unknown".to_string()),
        image_url: checker.opt_string(obj, "", "imageUrl"),
        episode_count: checker.opt_integer(obj, "", "episodeCount"),
        year: checker.opt_integer(obj, "", "year"),
        alternative_titles: checker.string_list(obj, "", "alternativeTitles"),
        external_link: checker.opt_string(obj, "", "externalLink"),
    };
    if let Some(count) = season.episode_count
        && count < 0
    {
        checker.push("episodeCount", "must not be negative");
    }
    checker.finish(season)
}
