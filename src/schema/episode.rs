use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::danmaku::comment::{CommentEntity, DecodedBatch, decode_batch};

use super::comment::{read_comment_list, upgrade_comment_v1};
use super::provider::{EpisodeIds, read_episode_ids};
use super::record::{Registry, SchemaVersion, UpgradeError, into_object};
use super::validate::{Checker, ValidationErrors, index_path};

pub static REGISTRY: Registry = Registry {
    entity: "episode",
    versions: &[
        SchemaVersion {
            version: 1,
            upgrade: None,
        },
        SchemaVersion {
            version: 2,
            upgrade: Some(upgrade_v1_to_v2),
        },
        SchemaVersion {
            version: 3,
            upgrade: Some(upgrade_v2_to_v3),
        },
    ],
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEpisode {
    #[serde(flatten)]
    pub ids: EpisodeIds,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_number: Option<String>,
    pub comments: Vec<CommentEntity>,
    pub comment_count: usize,
    // epoch millis
    pub last_checked: i64,
}

impl CanonicalEpisode {
    pub fn storage_key(&self) -> String {
        let provider = self.ids.provider();
        match self.ids.episode_key() {
            Some(id) => format!("{provider}:{id}"),
            None => format!("{provider}:{}", self.title),
        }
    }

    pub fn replace_comments(&mut self, comments: Vec<CommentEntity>, checked_at: i64) {
        self.comment_count = comments.len();
        self.comments = comments;
        self.last_checked = checked_at;
    }

    pub fn decode_comments(&self) -> DecodedBatch {
        decode_batch(&self.comments)
    }
}

// v1 only knew DanDanPlay: `{animeId, episodeId, episodeTitle, episodeNumber?, comments, lastChecked?}`.
fn upgrade_v1_to_v2(data: Value) -> Result<Value, UpgradeError> {
    let mut legacy = into_object(data, "")?;
    let anime_id = legacy
        .remove("animeId")
        .ok_or_else(|| UpgradeError::missing("animeId"))?;
    let episode_id = legacy
        .remove("episodeId")
        .ok_or_else(|| UpgradeError::missing("episodeId"))?;
    let title = legacy
        .remove("episodeTitle")
        .ok_or_else(|| UpgradeError::missing("episodeTitle"))?;
    let comments = match legacy.remove("comments") {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => Vec::new(),
        Some(_) => return Err(UpgradeError::new("comments", "expected an array")),
    };

    let mut out = Map::new();
    out.insert("provider".to_string(), json!("DanDanPlay"));
    out.insert(
        "providerIds".to_string(),
        json!({ "animeId": anime_id, "episodeId": episode_id }),
    );
    out.insert("title".to_string(), title);
    match legacy.remove("episodeNumber") {
        Some(Value::Number(number)) => {
            out.insert("episodeNumber".to_string(), json!(number.to_string()));
        }
        Some(Value::String(label)) => {
            out.insert("episodeNumber".to_string(), json!(label));
        }
        _ => {}
    }
    out.insert("commentCount".to_string(), json!(comments.len()));
    out.insert("comments".to_string(), Value::Array(comments));
    out.insert(
        "lastChecked".to_string(),
        legacy.remove("lastChecked").unwrap_or_else(|| json!(0)),
    );
    Ok(Value::Object(out))
}

// v3 stores comments in the compact `{cid?, p, m}` form.
fn upgrade_v2_to_v3(data: Value) -> Result<Value, UpgradeError> {
    let mut episode = into_object(data, "")?;
    let comments = match episode.remove("comments") {
        Some(Value::Array(items)) => items,
        None | Some(Value::Null) => Vec::new(),
        Some(_) => return Err(UpgradeError::new("comments", "expected an array")),
    };
    let comments = comments
        .into_iter()
        .enumerate()
        .map(|(index, item)| upgrade_comment_v1(item, &index_path("comments", index)))
        .collect::<Result<Vec<_>, _>>()?;
    episode.insert("comments".to_string(), Value::Array(comments));
    Ok(Value::Object(episode))
}

pub fn validate(data: &Value) -> Result<CanonicalEpisode, ValidationErrors> {
    let mut checker = Checker::default();
    let Some(obj) = checker.object("", data) else {
        return Err(checker.into_errors());
    };

    let ids = read_episode_ids(&mut checker, obj);
    let title = checker.string(obj, "", "title");
    let episode_number = checker.opt_string(obj, "", "episodeNumber");
    let comments = match obj.get("comments") {
        Some(value) => read_comment_list(&mut checker, "comments", value),
        None => Vec::new(),
    };
    let last_checked = checker.opt_integer(obj, "", "lastChecked").unwrap_or(0);
    if last_checked < 0 {
        checker.push("lastChecked", "must not be negative");
    }

    checker.finish(CanonicalEpisode {
        ids: ids.unwrap_or(EpisodeIds::Custom {}),
        title,
        episode_number,
        comment_count: comments.len(),
        comments,
        last_checked,
    })
}
