use crate::errors::ToolError;
use crate::utils::coerce::int_like;
use serde_json::{Map, Value};
use std::time::Duration;
use url::Url;

#[derive(Clone, Default)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_string(&self, value: &Value, label: &str) -> Result<String, ToolError> {
        let text = match value {
            Value::String(text) => text.trim().to_string(),
            Value::Number(num) => num.to_string(),
            _ => String::new(),
        };
        if text.is_empty() {
            return Err(ToolError::invalid_params(format!(
                "{} must be a non-empty string",
                label
            )));
        }
        Ok(text)
    }

    pub fn ensure_optional_string(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Option<String>, ToolError> {
        match value {
            None => Ok(None),
            Some(Value::Null) => Ok(None),
            Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
            Some(val) => self.ensure_string(val, label).map(Some),
        }
    }

    pub fn ensure_object<'a>(
        &self,
        value: Option<&'a Value>,
        label: &str,
    ) -> Result<&'a Map<String, Value>, ToolError> {
        value
            .and_then(Value::as_object)
            .ok_or_else(|| ToolError::invalid_params(format!("{} must be an object", label)))
    }

    pub fn ensure_positive_int(&self, value: Option<&Value>, label: &str) -> Result<i64, ToolError> {
        value
            .and_then(int_like)
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ToolError::invalid_params(format!("{} must be a positive integer", label))
            })
    }

    pub fn ensure_base_url(&self, raw: &str) -> Result<String, ToolError> {
        let parsed = Url::parse(raw.trim())
            .map_err(|_| ToolError::invalid_params(format!("Invalid baseUrl: {}", raw)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ToolError::invalid_params(
                "baseUrl must use http or https",
            ));
        }
        Ok(raw.trim().trim_end_matches('/').to_string())
    }

    /// Per-call timeout in seconds, if supplied.
    pub fn optional_timeout(&self, value: Option<&Value>) -> Result<Option<Duration>, ToolError> {
        let Some(value) = value.filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        let secs = value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .ok_or_else(|| ToolError::invalid_params("timeout must be a positive number of seconds"))?;
        Ok(Some(Duration::from_secs_f64(secs)))
    }
}
