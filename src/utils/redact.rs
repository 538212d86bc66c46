use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

const REDACTED: &str = "[REDACTED]";
const MAX_LOGGED_STRING: usize = 512;

const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "passwd",
    "token",
    "accesstoken",
    "access_token",
    "refreshtoken",
    "refresh_token",
    "authorization",
    "secret",
    "jwt",
];

static INLINE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9\-._~+/]+=*").expect("inline redaction regex"),
            "Bearer ***REDACTED***",
        ),
        (
            Regex::new(r"\beyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+")
                .expect("inline redaction regex"),
            "***JWT***",
        ),
        (
            Regex::new(r#"(?i)\b(password|token|secret)\b\s*([:=])\s*([^\s"',]+)"#)
                .expect("inline redaction regex"),
            "$1$2***REDACTED***",
        ),
    ]
});

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = key.trim().to_lowercase();
    SENSITIVE_KEYS.contains(&normalized.as_str())
        || normalized.contains("token")
        || normalized.contains("password")
}

fn truncate(value: &str, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &value[..end])
}

pub fn redact_text(value: &str) -> String {
    let mut out = value.to_string();
    for (re, replacement) in INLINE_PATTERNS.iter() {
        if re.is_match(&out) {
            out = re.replace_all(&out, *replacement).to_string();
        }
    }
    truncate(&out, MAX_LOGGED_STRING)
}

/// Copy of `value` safe to write to logs.
pub fn redact_object(value: &Value) -> Value {
    match value {
        Value::String(text) => Value::String(redact_text(text)),
        Value::Array(items) => Value::Array(items.iter().map(redact_object).collect()),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, entry) in map {
                let redacted = if is_sensitive_key(key) && !entry.is_null() {
                    Value::String(REDACTED.to_string())
                } else {
                    redact_object(entry)
                };
                out.insert(key.clone(), redacted);
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}
