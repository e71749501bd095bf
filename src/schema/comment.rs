use serde_json::{Map, Value, json};

use crate::danmaku::color::{clamp_color, int_to_hex, parse_hex_color};
use crate::danmaku::comment::{CommentEntity, CommentMode, CommentOptions, encode};

use super::record::{Registry, SchemaVersion, UpgradeError, into_object};
use super::validate::{Checker, ValidationErrors, index_path, type_name};

pub static REGISTRY: Registry = Registry {
    entity: "comments",
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

// v1 stored comments as `{cid?, time, mode: "rtl", color: "#ffffff" | 16777215, uid?, text}`.
fn upgrade_v1_to_v2(data: Value) -> Result<Value, UpgradeError> {
    let Value::Array(items) = data else {
        return Err(UpgradeError::new("", "expected an array of comments"));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| upgrade_comment_v1(item, &index_path("", index)))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

pub fn upgrade_comment_v1(item: Value, path: &str) -> Result<Value, UpgradeError> {
    let mut comment = into_object(item, path)?;
    let field = |key: &str| format!("{path}.{key}");

    let time = comment
        .get("time")
        .and_then(Value::as_f64)
        .filter(|time| time.is_finite() && *time >= 0.0)
        .ok_or_else(|| UpgradeError::new(field("time"), "expected a non-negative number"))?;
    let mode = comment
        .get("mode")
        .and_then(Value::as_str)
        .ok_or_else(|| UpgradeError::missing(field("mode")))?
        .parse::<CommentMode>()
        .map_err(|err| UpgradeError::new(field("mode"), err.to_string()))?;
    let color = match comment.get("color") {
        Some(Value::String(hex)) => match parse_hex_color(hex) {
            Some(packed) => int_to_hex(packed),
            None => {
                return Err(UpgradeError::new(
                    field("color"),
                    format!("expected #rrggbb, found {hex:?}"),
                ));
            }
        },
        Some(Value::Number(number)) => {
            let packed = number
                .as_i64()
                .ok_or_else(|| UpgradeError::new(field("color"), "expected an integer"))?;
            int_to_hex(clamp_color(packed))
        }
        Some(other) => {
            return Err(UpgradeError::new(
                field("color"),
                format!("expected a hex string or an integer, found {}", type_name(other)),
            ));
        }
        None => "#ffffff".to_string(),
    };
    let uid = match comment.remove("uid") {
        Some(Value::String(uid)) if !uid.is_empty() => Some(uid),
        Some(Value::Number(uid)) => Some(uid.to_string()),
        _ => None,
    };
    let text = match comment.remove("text") {
        Some(Value::String(text)) => text,
        _ => return Err(UpgradeError::missing(field("text"))),
    };

    let p = encode(&CommentOptions {
        time,
        mode,
        color,
        uid,
    })
    .map_err(|err| UpgradeError::new(field("color"), err.to_string()))?;

    let mut out = Map::new();
    if let Some(cid) = comment.remove("cid").filter(|cid| !cid.is_null()) {
        out.insert("cid".to_string(), cid);
    }
    out.insert("p".to_string(), json!(p));
    out.insert("m".to_string(), json!(text));
    Ok(Value::Object(out))
}

pub fn read_comment(checker: &mut Checker, path: &str, value: &Value) -> CommentEntity {
    let Some(obj) = checker.object(path, value) else {
        return CommentEntity {
            cid: None,
            p: String::new(),
            m: String::new(),
        };
    };
    CommentEntity {
        cid: checker.opt_integer(obj, path, "cid"),
        p: checker.string(obj, path, "p"),
        m: checker.text(obj, path, "m"),
    }
}

// Structural check only: `p` is decoded when the comments are read.
pub fn read_comment_list(
    checker: &mut Checker,
    path: &str,
    value: &Value,
) -> Vec<CommentEntity> {
    let Some(items) = value.as_array() else {
        checker.push(path, format!("expected an array, found {}", type_name(value)));
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .map(|(index, item)| read_comment(checker, &index_path(path, index), item))
        .collect()
}

pub fn validate(data: &Value) -> Result<Vec<CommentEntity>, ValidationErrors> {
    let mut checker = Checker::default();
    let comments = read_comment_list(&mut checker, "", data);
    checker.finish(comments)
}
