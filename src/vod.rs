use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::VodConfig;
use crate::danmaku::play_url::{ParsedPlayUrl, parse_play_url};
use crate::http::get_text_with_retries;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VodItem {
    pub id: String,
    pub name: String,
    pub play_from: String,
    pub play_url: String,
}

impl VodItem {
    pub fn play_urls(&self) -> Vec<ParsedPlayUrl> {
        parse_play_url(&self.name, &self.play_from, &self.play_url)
    }
}

pub fn search(config: &VodConfig, query: &str) -> Result<Vec<VodItem>> {
    let base_url = config
        .base_url
        .as_deref()
        .context("no VOD API configured; set vod.base_url or DANMAKU_STORE_VOD_URL")?;

    info!(base_url, query, "searching VOD API");
    let raw = get_text_with_retries(
        base_url,
        &config.referer,
        &[("ac", "detail"), ("wd", query)],
        &config.retry_policy(),
    )
    .with_context(|| format!("VOD search for {query:?} failed"))?;

    let items = parse_vod_list(&raw).context("VOD API returned malformed JSON")?;
    debug!(count = items.len(), "parsed VOD results");
    Ok(items)
}

pub fn parse_vod_list(raw: &str) -> Result<Vec<VodItem>> {
    let parsed: Value = serde_json::from_str(raw)?;
    let Some(list) = parsed.pointer("/list").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    Ok(list
        .iter()
        .filter_map(|item| {
            let id = match item.get("vod_id")? {
                Value::String(id) => id.trim().to_string(),
                Value::Number(id) => id.to_string(),
                _ => return None,
            };
            let name = item.get("vod_name")?.as_str()?.trim();
            if id.is_empty() || name.is_empty() {
                return None;
            }
            let text = |key: &str| {
                item.get(key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };
            Some(VodItem {
                id,
                name: name.to_string(),
                play_from: text("vod_play_from"),
                play_url: text("vod_play_url"),
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_entries_and_skips_incomplete_ones() {
        let raw = r#"{
            "code": 1,
            "list": [
                { "vod_id": 101, "vod_name": "Frieren", "vod_play_from": "hd$$$backup",
                  "vod_play_url": "EP01$https://a/1.m3u8#EP02$https://a/2.m3u8$$$EP01$https://b/1.m3u8" },
                { "vod_id": "", "vod_name": "No Id" },
                { "vod_id": "77", "vod_name": "No Play Urls" }
            ]
        }"#;

        let items = parse_vod_list(raw).expect("valid json");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "101");
        assert_eq!(items[1].play_url, "");

        let urls = items[0].play_urls();
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[2].source, "backup");
        assert_eq!(urls[0].title, "Frieren - hd - EP01");
        assert!(items[1].play_urls().is_empty());
    }

    #[test]
    fn missing_list_is_empty_and_bad_json_is_an_error() {
        assert!(parse_vod_list("{\"code\":0}").expect("json").is_empty());
        assert!(parse_vod_list("<html>").is_err());
    }

    #[test]
    fn search_without_base_url_explains_how_to_configure() {
        let err = search(&VodConfig::default(), "frieren").expect_err("no url");
        assert!(err.to_string().contains("vod.base_url"));
    }
}
