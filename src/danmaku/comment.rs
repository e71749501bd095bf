use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::color::{clamp_color, int_to_hex, parse_hex_color};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("comment is missing its {0} field")]
    MissingField(&'static str),

    #[error("comment time is not a non-negative number: {0:?}")]
    InvalidTime(String),

    #[error("comment mode is not an integer: {0:?}")]
    InvalidMode(String),

    #[error("unknown comment mode ordinal {0}")]
    UnknownMode(i64),

    #[error("unknown comment mode name {0:?}")]
    UnknownModeName(String),

    #[error("comment color is not valid: {0:?}")]
    InvalidColor(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentMode {
    Ltr,
    Rtl,
    Top,
    Bottom,
}

impl CommentMode {
    // Wire ordinals are inherited from the DanDanPlay format and are not contiguous.
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            6 => Some(Self::Ltr),
            1 => Some(Self::Rtl),
            5 => Some(Self::Top),
            4 => Some(Self::Bottom),
            _ => None,
        }
    }

    pub fn ordinal(self) -> i64 {
        match self {
            Self::Ltr => 6,
            Self::Rtl => 1,
            Self::Top => 5,
            Self::Bottom => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ltr => "ltr",
            Self::Rtl => "rtl",
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }
}

impl fmt::Display for CommentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentMode {
    type Err = ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ltr" => Ok(Self::Ltr),
            "rtl" => Ok(Self::Rtl),
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            _ => Err(ParseError::UnknownModeName(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentOptions {
    pub time: f64,
    pub mode: CommentMode,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cid: Option<i64>,
    pub p: String,
    pub m: String,
}

pub fn decode(p: &str) -> Result<CommentOptions, ParseError> {
    // The uid may itself contain commas, so only the first three separators count.
    let mut parts = p.splitn(4, ',');

    let time_raw = required_part(parts.next(), "time")?;
    let time = time_raw
        .parse::<f64>()
        .ok()
        .filter(|time| time.is_finite() && *time >= 0.0)
        .ok_or_else(|| ParseError::InvalidTime(time_raw.to_string()))?;

    let mode_raw = required_part(parts.next(), "mode")?;
    let ordinal = mode_raw
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidMode(mode_raw.to_string()))?;
    let mode = CommentMode::from_ordinal(ordinal).ok_or(ParseError::UnknownMode(ordinal))?;

    let color_raw = required_part(parts.next(), "color")?;
    let color = color_raw
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidColor(color_raw.to_string()))?;

    let uid = parts
        .next()
        .filter(|uid| !uid.is_empty())
        .map(str::to_string);

    Ok(CommentOptions {
        time,
        mode,
        color: int_to_hex(clamp_color(color)),
        uid,
    })
}

pub fn encode(options: &CommentOptions) -> Result<String, ParseError> {
    if !options.time.is_finite() || options.time < 0.0 {
        return Err(ParseError::InvalidTime(options.time.to_string()));
    }
    let color = parse_hex_color(&options.color)
        .ok_or_else(|| ParseError::InvalidColor(options.color.clone()))?;
    let mut out = format!(
        "{:.2},{},{}",
        options.time,
        options.mode.ordinal(),
        clamp_color(color)
    );
    if let Some(uid) = options.uid.as_deref().filter(|uid| !uid.is_empty()) {
        out.push(',');
        out.push_str(uid);
    }
    Ok(out)
}

fn required_part<'a>(part: Option<&'a str>, field: &'static str) -> Result<&'a str, ParseError> {
    part.map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(ParseError::MissingField(field))
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedComment {
    pub cid: Option<i64>,
    pub options: CommentOptions,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct DecodedBatch {
    pub comments: Vec<DecodedComment>,
    pub rejected: Vec<(usize, ParseError)>,
}

pub fn decode_batch(comments: &[CommentEntity]) -> DecodedBatch {
    let mut batch = DecodedBatch::default();
    for (index, comment) in comments.iter().enumerate() {
        match decode(&comment.p) {
            Ok(options) => batch.comments.push(DecodedComment {
                cid: comment.cid,
                options,
                text: comment.m.clone(),
            }),
            Err(err) => batch.rejected.push((index, err)),
        }
    }
    batch
}
