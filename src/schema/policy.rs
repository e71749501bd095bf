use serde::Serialize;
use serde_json::{Map, Value, json};

use super::record::{Registry, SchemaVersion, UpgradeError, VersionedRecord, into_object};
use super::validate::{Checker, ValidationErrors, join_path, type_name};
use super::{LoadError, load_value};

pub static REGISTRY: Registry = Registry {
    entity: "integration policy",
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

pub const POLICY_FIELDS: [&str; 4] = ["title", "episode", "season", "episodeTitle"];
const RULE_KEYS: [&str; 2] = ["selector", "regex"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldRule {
    pub selector: Vec<String>,
    pub regex: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationPolicy {
    pub version: u32,
    pub title: FieldRule,
    pub episode: FieldRule,
    pub season: FieldRule,
    pub episode_title: FieldRule,
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub policy: IntegrationPolicy,
}

fn policy_object<'m>(root: &'m mut Map<String, Value>) -> Result<&'m mut Map<String, Value>, UpgradeError> {
    match root.get_mut("policy") {
        Some(Value::Object(policy)) => Ok(policy),
        Some(_) => Err(UpgradeError::new("policy", "expected an object")),
        None => Err(UpgradeError::missing("policy")),
    }
}

fn coerce_string_array(value: Value, path: &str) -> Result<Value, UpgradeError> {
    match value {
        Value::Null => Ok(json!([])),
        Value::String(text) => Ok(json!([text])),
        Value::Array(items) => Ok(Value::Array(items)),
        other => Err(UpgradeError::new(
            path,
            format!("expected a string or an array, found {}", type_name(&other)),
        )),
    }
}

// v1 policies were a flat `policy` with scalar or array selector/regex per field and no version.
fn upgrade_v1_to_v2(data: Value) -> Result<Value, UpgradeError> {
    let mut root = into_object(data, "")?;
    let policy = policy_object(&mut root)?;
    for field in POLICY_FIELDS {
        let path = join_path("policy", field);
        let rule = policy
            .entry(field.to_string())
            .or_insert_with(|| json!({}));
        let Value::Object(rule) = rule else {
            return Err(UpgradeError::new(path, "expected an object"));
        };
        for key in RULE_KEYS {
            let raw = rule.remove(key).unwrap_or(Value::Null);
            let coerced = coerce_string_array(raw, &join_path(&path, key))?;
            rule.insert(key.to_string(), coerced);
        }
    }
    policy.insert("version".to_string(), json!(2));
    Ok(Value::Object(root))
}

fn upgrade_v2_to_v3(data: Value) -> Result<Value, UpgradeError> {
    let mut root = into_object(data, "")?;
    let policy = policy_object(&mut root)?;
    policy
        .entry("options".to_string())
        .or_insert_with(|| json!({}));
    policy.insert("version".to_string(), json!(3));
    Ok(Value::Object(root))
}

fn read_rule(checker: &mut Checker, policy: &Map<String, Value>, field: &str) -> FieldRule {
    let Some(rule) = checker.field_object(policy, "policy", field) else {
        return FieldRule::default();
    };
    let path = join_path("policy", field);
    FieldRule {
        selector: checker.string_list(rule, &path, "selector"),
        regex: checker.string_list(rule, &path, "regex"),
    }
}

pub fn validate(data: &Value) -> Result<PolicyEntry, ValidationErrors> {
    let mut checker = Checker::default();
    let Some(obj) = checker.object("", data) else {
        return Err(checker.into_errors());
    };
    let name = checker.string(obj, "", "name");
    let id = checker.opt_string(obj, "", "id");
    let Some(policy) = checker.field_object(obj, "", "policy") else {
        return Err(checker.into_errors());
    };

    let latest = i64::from(REGISTRY.latest());
    match policy.get("version").map(Value::as_i64) {
        Some(Some(version)) if version == latest => {}
        Some(Some(version)) => {
            checker.push("policy.version", format!("expected {latest}, found {version}"));
        }
        _ => checker.push("policy.version", format!("expected {latest}")),
    }

    let title = read_rule(&mut checker, policy, "title");
    let episode = read_rule(&mut checker, policy, "episode");
    let season = read_rule(&mut checker, policy, "season");
    let episode_title = read_rule(&mut checker, policy, "episodeTitle");
    let options = match policy.get("options") {
        Some(Value::Object(options)) => options.clone(),
        Some(other) => {
            checker.push(
                "policy.options",
                format!("expected an object, found {}", type_name(other)),
            );
            Map::new()
        }
        None => {
            checker.push("policy.options", "is required");
            Map::new()
        }
    };

    checker.finish(PolicyEntry {
        name,
        id,
        policy: IntegrationPolicy {
            version: REGISTRY.latest(),
            title,
            episode,
            season,
            episode_title,
            options,
        },
    })
}

pub fn serialize(entry: &PolicyEntry) -> Result<String, serde_json::Error> {
    serde_json::to_string(&VersionedRecord {
        version: REGISTRY.latest(),
        data: entry,
    })
}

pub fn deserialize(raw: &str) -> Result<PolicyEntry, LoadError> {
    let value = serde_json::from_str::<Value>(raw)?;
    load_value(value, &REGISTRY, validate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v1_policy() -> Value {
        json!({
            "name": "example-vod",
            "policy": {
                "title": { "selector": "h1.title", "regex": ".+" },
                "episode": { "selector": ["span.ep", ".episode"], "regex": "\\d+" },
                "season": { "selector": "span.season" }
            }
        })
    }

    #[test]
    fn v1_policy_without_envelope_migrates_to_v3() {
        let entry = deserialize(&v1_policy().to_string()).expect("v1 policy loads");
        assert_eq!(entry.name, "example-vod");
        assert_eq!(entry.policy.version, 3);
        assert!(entry.policy.options.is_empty());
        assert_eq!(entry.policy.title.selector, vec!["h1.title"]);
        assert_eq!(entry.policy.title.regex, vec![".+"]);
        assert_eq!(entry.policy.episode.selector, vec!["span.ep", ".episode"]);
        assert!(entry.policy.season.regex.is_empty());
        assert_eq!(entry.policy.episode_title, FieldRule::default());

        let serialized: Value =
            serde_json::from_str(&serialize(&entry).expect("serialize")).expect("json");
        assert_eq!(serialized["version"], json!(3));
        assert_eq!(serialized["data"]["policy"]["version"], json!(3));
        assert_eq!(serialized["data"]["policy"]["options"], json!({}));
    }

    #[test]
    fn serialize_then_deserialize_preserves_the_policy() {
        let entry = deserialize(&v1_policy().to_string()).expect("v1 policy loads");
        let mut entry = entry;
        entry
            .policy
            .options
            .insert("titleOnly".to_string(), json!(true));
        let again = deserialize(&serialize(&entry).expect("serialize")).expect("reload");
        assert_eq!(again, entry);
    }

    #[test]
    fn v2_policy_keeps_existing_options() {
        let raw = json!({
            "version": 2,
            "data": {
                "name": "with-options",
                "policy": {
                    "version": 2,
                    "title": { "selector": ["h1"], "regex": [] },
                    "episode": { "selector": [], "regex": [] },
                    "season": { "selector": [], "regex": [] },
                    "episodeTitle": { "selector": [], "regex": [] },
                    "options": { "useChineseNumbers": true }
                }
            }
        });
        let entry = deserialize(&raw.to_string()).expect("v2 policy loads");
        assert_eq!(entry.policy.options.get("useChineseNumbers"), Some(&json!(true)));
    }

    #[test]
    fn invalid_policy_reports_field_errors() {
        let raw = json!({
            "version": 3,
            "data": {
                "name": "",
                "policy": {
                    "version": 3,
                    "title": { "selector": [], "regex": 5 },
                    "episode": { "selector": [], "regex": [] },
                    "season": { "selector": [], "regex": [] },
                    "episodeTitle": { "selector": [], "regex": [] },
                    "options": []
                }
            }
        });
        let err = deserialize(&raw.to_string()).expect_err("invalid policy");
        let LoadError::Validation(errors) = err else {
            panic!("expected validation errors, got {err:?}");
        };
        let paths = errors
            .errors()
            .iter()
            .map(|err| err.path.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            paths,
            vec![
                "name",
                "policy.title.regex",
                "policy.options"
            ]
        );
    }

    #[test]
    fn v1_policy_without_a_title_rule_loads_with_empty_rules() {
        let raw = json!({ "name": "n", "policy": { "episode": { "selector": "span.ep" } } });
        let entry = deserialize(&raw.to_string()).expect("missing fields become empty rules");
        assert_eq!(entry.policy.title, FieldRule::default());
        assert_eq!(entry.policy.episode.selector, vec!["span.ep"]);
        assert_eq!(deserialize(&serialize(&entry).expect("serialize")).expect("reload"), entry);
    }

    #[test]
    fn policy_from_a_newer_release_is_fatal() {
        let raw = json!({ "version": 4, "data": {} });
        let err = deserialize(&raw.to_string()).expect_err("future version");
        assert!(matches!(err, LoadError::Migration(_)));
    }

    #[test]
    fn non_json_input_is_a_parse_failure() {
        assert!(matches!(deserialize("{not json"), Err(LoadError::Json(_))));
    }
}
