//! Client-side ordering for listing pages the upstream returned unsorted.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use std::cmp::Ordering;

const DESCENDING_TOKENS: &[&str] = &["desc", "descending", "-1"];
const TIMESTAMP_FIELDS: &[&str] = &["createdAt", "updatedAt"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

impl SortSpec {
    /// `field`, `-field` or `field:dir`; the `:dir` suffix overrides a leading dash.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut text = raw.trim();
        let mut descending = false;
        if let Some(rest) = text.strip_prefix('-') {
            descending = true;
            text = rest.trim();
        }
        if let Some((field, direction)) = text.split_once(':') {
            let direction = direction.trim().to_lowercase();
            descending = DESCENDING_TOKENS.contains(&direction.as_str());
            text = field.trim();
        }
        if text.is_empty() {
            return None;
        }
        Some(Self {
            field: text.to_string(),
            descending,
        })
    }
}

#[derive(Debug, Clone)]
enum SortKey {
    Time(DateTime<Utc>),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SortKey {
    fn rank(&self) -> u8 {
        match self {
            SortKey::Time(_) => 0,
            SortKey::Int(_) | SortKey::Float(_) => 1,
            SortKey::Text(_) => 2,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            SortKey::Int(value) => Some(*value as f64),
            SortKey::Float(value) => Some(*value),
            _ => None,
        }
    }
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Time(a), SortKey::Time(b)) => a.cmp(b),
            (SortKey::Int(a), SortKey::Int(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => self.rank().cmp(&other.rank()),
            },
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SortKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SortKey {}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn is_integer_text(text: &str) -> bool {
    let digits = text.strip_prefix(&['+', '-'][..]).unwrap_or(text);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn text_key(text: &str) -> SortKey {
    let trimmed = text.trim();
    if is_integer_text(trimmed) {
        if let Ok(value) = trimmed.parse::<i64>() {
            return SortKey::Int(value);
        }
    }
    match trimmed.parse::<f64>() {
        Ok(value) => SortKey::Float(value),
        Err(_) => SortKey::Text(text.to_string()),
    }
}

fn key_for(item: &Value, field: &str) -> SortKey {
    let value = item.get(field).unwrap_or(&Value::Null);
    if TIMESTAMP_FIELDS.contains(&field) {
        let parsed = value.as_str().and_then(parse_timestamp);
        return SortKey::Time(parsed.unwrap_or(DateTime::<Utc>::MIN_UTC));
    }
    match value {
        Value::Null => SortKey::Text(String::new()),
        Value::Bool(flag) => SortKey::Int(i64::from(*flag)),
        Value::Number(num) => match num.as_i64() {
            Some(value) => SortKey::Int(value),
            None => SortKey::Float(num.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(text) => text_key(text),
        other => SortKey::Text(other.to_string()),
    }
}

/// Stable sort by `spec`; ties keep their input order in both directions.
pub fn sort_by_spec(items: &[Value], spec: &SortSpec) -> Vec<Value> {
    let mut keyed: Vec<(SortKey, &Value)> = items
        .iter()
        .map(|item| (key_for(item, &spec.field), item))
        .collect();
    keyed.sort_by(|a, b| {
        if spec.descending {
            b.0.cmp(&a.0)
        } else {
            a.0.cmp(&b.0)
        }
    });
    keyed.into_iter().map(|(_, item)| item.clone()).collect()
}

/// Returns `items` unchanged when `sort_by` is absent or unparsable.
pub fn sort_items(items: &[Value], sort_by: Option<&str>) -> Vec<Value> {
    match sort_by.and_then(SortSpec::parse) {
        Some(spec) => sort_by_spec(items, &spec),
        None => items.to_vec(),
    }
}

/// Re-sorts the `items` (or `data`) list of a listing response in place.
pub fn sort_response_items(response: &mut Value, sort_by: Option<&str>) -> bool {
    let Some(spec) = sort_by.and_then(SortSpec::parse) else {
        return false;
    };
    for key in ["items", "data"] {
        if let Some(Value::Array(items)) = response.get_mut(key) {
            let sorted = sort_by_spec(items, &spec);
            *items = sorted;
            return true;
        }
    }
    false
}
