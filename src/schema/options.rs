use serde::Serialize;
use serde_json::{Map, Value, json};

use super::record::{Registry, SchemaVersion, UpgradeError, into_object};
use super::validate::{Checker, ValidationErrors, join_path};

pub static REGISTRY: Registry = Registry {
    entity: "extension options",
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

pub const OPTIONS_KEY: &str = "options";
const SOURCE_NAMES: [&str; 3] = ["dandanplay", "bilibili", "tencent"];
const DEFAULT_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    System,
}

impl Theme {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceToggle {
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DanmakuSources {
    pub dandanplay: SourceToggle,
    pub bilibili: SourceToggle,
    pub tencent: SourceToggle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    pub enabled: bool,
    pub delete_comments_after_days: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionOptions {
    pub enabled: bool,
    pub theme: Theme,
    pub danmaku_sources: DanmakuSources,
    pub retention_policy: RetentionPolicy,
    pub show_episode_title: bool,
}

impl Default for ExtensionOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            theme: Theme::System,
            danmaku_sources: DanmakuSources {
                dandanplay: SourceToggle { enabled: true },
                bilibili: SourceToggle { enabled: true },
                tencent: SourceToggle { enabled: false },
            },
            retention_policy: RetentionPolicy {
                enabled: false,
                delete_comments_after_days: DEFAULT_RETENTION_DAYS,
            },
            show_episode_title: true,
        }
    }
}

// v1 kept the enabled sources as a list of names.
fn upgrade_v1_to_v2(data: Value) -> Result<Value, UpgradeError> {
    let mut options = into_object(data, "")?;
    let enabled_names = match options.remove("danmakuSources") {
        Some(Value::Array(names)) => {
            let mut out = Vec::with_capacity(names.len());
            for (index, name) in names.into_iter().enumerate() {
                match name {
                    Value::String(name) => out.push(name.to_ascii_lowercase()),
                    _ => {
                        return Err(UpgradeError::new(
                            format!("danmakuSources[{index}]"),
                            "expected a source name",
                        ));
                    }
                }
            }
            out
        }
        None | Some(Value::Null) => vec!["dandanplay".to_string(), "bilibili".to_string()],
        Some(_) => return Err(UpgradeError::new("danmakuSources", "expected an array")),
    };

    let mut sources = Map::new();
    for name in SOURCE_NAMES {
        let enabled = enabled_names.iter().any(|enabled| enabled == name);
        sources.insert(name.to_string(), json!({ "enabled": enabled }));
    }
    options.insert("danmakuSources".to_string(), Value::Object(sources));
    Ok(Value::Object(options))
}

fn upgrade_v2_to_v3(data: Value) -> Result<Value, UpgradeError> {
    let mut options = into_object(data, "")?;
    options.entry("retentionPolicy".to_string()).or_insert_with(|| {
        json!({ "enabled": false, "deleteCommentsAfterDays": DEFAULT_RETENTION_DAYS })
    });
    options
        .entry("showEpisodeTitle".to_string())
        .or_insert_with(|| json!(true));
    Ok(Value::Object(options))
}

fn read_toggle(
    checker: &mut Checker,
    sources: &Map<String, Value>,
    name: &str,
    default: bool,
) -> SourceToggle {
    let path = join_path("danmakuSources", name);
    match sources.get(name) {
        None => SourceToggle { enabled: default },
        Some(value) => match checker.object(&path, value) {
            Some(toggle) => SourceToggle {
                enabled: checker.boolean(toggle, &path, "enabled", default),
            },
            None => SourceToggle { enabled: default },
        },
    }
}

fn optional_object<'v>(
    checker: &mut Checker,
    obj: &'v Map<String, Value>,
    key: &str,
) -> Option<&'v Map<String, Value>> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(value) => checker.object(key, value),
    }
}

pub fn validate(data: &Value) -> Result<ExtensionOptions, ValidationErrors> {
    let mut checker = Checker::default();
    let Some(obj) = checker.object("", data) else {
        return Err(checker.into_errors());
    };
    let defaults = ExtensionOptions::default();

    let theme = match checker.opt_string(obj, "", "theme") {
        None => defaults.theme,
        Some(raw) => Theme::parse(&raw).unwrap_or_else(|| {
            checker.push("theme", format!("expected light, dark or system, found {raw:?}"));
            defaults.theme
        }),
    };

    let danmaku_sources = match optional_object(&mut checker, obj, "danmakuSources") {
        Some(sources) => DanmakuSources {
            dandanplay: read_toggle(&mut checker, sources, "dandanplay", true),
            bilibili: read_toggle(&mut checker, sources, "bilibili", true),
            tencent: read_toggle(&mut checker, sources, "tencent", false),
        },
        None => defaults.danmaku_sources,
    };

    let retention_policy = match optional_object(&mut checker, obj, "retentionPolicy") {
        Some(retention) => {
            let days = checker.integer(retention, "retentionPolicy", "deleteCommentsAfterDays");
            if days < 1 {
                checker.push(
                    "retentionPolicy.deleteCommentsAfterDays",
                    "must be at least 1",
                );
            }
            RetentionPolicy {
                enabled: checker.boolean(retention, "retentionPolicy", "enabled", false),
                delete_comments_after_days: days,
            }
        }
        None => defaults.retention_policy,
    };

    let enabled = checker.boolean(obj, "", "enabled", defaults.enabled);
    let show_episode_title =
        checker.boolean(obj, "", "showEpisodeTitle", defaults.show_episode_title);

    checker.finish(ExtensionOptions {
        enabled,
        theme,
        danmaku_sources,
        retention_policy,
        show_episode_title,
    })
}

pub fn apply_patch(
    current: &ExtensionOptions,
    patch: &Value,
) -> Result<ExtensionOptions, ValidationErrors> {
    if !patch.is_object() {
        return Err(ValidationErrors::single("", "patch must be a JSON object"));
    }
    let mut merged = serde_json::to_value(current)
        .map_err(|err| ValidationErrors::single("", err.to_string()))?;
    merge_patch(&mut merged, patch);
    validate(&merged)
}

fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                merge_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::record::{VersionedRecord, migrate};

    #[test]
    fn v1_options_gain_source_map_and_retention_policy() {
        let record = VersionedRecord {
            version: 1,
            data: json!({ "enabled": false, "theme": "dark", "danmakuSources": ["DanDanPlay", "tencent"] }),
        };
        let migrated = migrate(record, &REGISTRY).expect("migrate");
        assert_eq!(migrated.version, 3);

        let options = validate(&migrated.data).expect("valid options");
        assert!(!options.enabled);
        assert_eq!(options.theme, Theme::Dark);
        assert!(options.danmaku_sources.dandanplay.enabled);
        assert!(!options.danmaku_sources.bilibili.enabled);
        assert!(options.danmaku_sources.tencent.enabled);
        assert_eq!(options.retention_policy, ExtensionOptions::default().retention_policy);
        assert!(options.show_episode_title);
    }

    #[test]
    fn default_options_validate_as_themselves() {
        let defaults = ExtensionOptions::default();
        let value = serde_json::to_value(&defaults).expect("serialize");
        assert_eq!(validate(&value).expect("valid"), defaults);
    }

    #[test]
    fn patch_changes_only_the_named_fields() {
        let patched = apply_patch(
            &ExtensionOptions::default(),
            &json!({ "theme": "light", "danmakuSources": { "tencent": { "enabled": true } } }),
        )
        .expect("valid patch");
        assert_eq!(patched.theme, Theme::Light);
        assert!(patched.danmaku_sources.tencent.enabled);
        assert!(patched.danmaku_sources.bilibili.enabled);
    }

    #[test]
    fn patch_with_null_restores_default() {
        let mut current = ExtensionOptions::default();
        current.theme = Theme::Dark;
        let patched = apply_patch(&current, &json!({ "theme": null })).expect("valid patch");
        assert_eq!(patched.theme, Theme::System);
    }

    #[test]
    fn invalid_patch_is_rejected_with_paths() {
        let errors = apply_patch(
            &ExtensionOptions::default(),
            &json!({ "theme": "neon", "retentionPolicy": { "deleteCommentsAfterDays": 0 } }),
        )
        .expect_err("invalid patch");
        let paths = errors
            .errors()
            .iter()
            .map(|err| err.path.as_str())
            .collect::<Vec<_>>();
        assert_eq!(paths, vec!["theme", "retentionPolicy.deleteCommentsAfterDays"]);
    }
}
