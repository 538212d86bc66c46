use serde_json::{Map, Value};
use thiserror::Error;

/// Failure of one call against the Pilldoc admin API.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("HTTP {status} from upstream")]
    Status { status: u16, body: Value },
    #[error("upstream request timed out")]
    Timeout,
    #[error("upstream transport error: {0}")]
    Transport(String),
    #[error("could not decode upstream response: {0}")]
    Decode(String),
}

impl UpstreamError {
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            UpstreamError::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_unsupported_media_type(&self) -> bool {
        self.status() == Some(415)
    }

    /// Structured `{error, status?, body?, step?}` object returned to callers.
    pub fn payload(&self, step: Option<&str>) -> Value {
        let mut out = Map::new();
        out.insert("error".to_string(), Value::String(self.to_string()));
        if let Some(status) = self.status() {
            out.insert("status".to_string(), Value::from(status));
        }
        if let Some(body) = self.body() {
            out.insert("body".to_string(), body.clone());
        }
        if let Some(step) = step {
            out.insert("step".to_string(), Value::String(step.to_string()));
        }
        Value::Object(out)
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return UpstreamError::Timeout;
        }
        if err.is_decode() {
            return UpstreamError::Decode(err.to_string());
        }
        UpstreamError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::UpstreamError;
    use serde_json::json;

    #[test]
    fn payload_carries_status_body_and_step() {
        let err = UpstreamError::Status {
            status: 404,
            body: json!({"message": "no such pharmacy"}),
        };
        let payload = err.payload(Some("pharm"));
        assert_eq!(payload["status"], json!(404));
        assert_eq!(payload["body"]["message"], json!("no such pharmacy"));
        assert_eq!(payload["step"], json!("pharm"));
        assert!(payload["error"].as_str().unwrap_or("").contains("404"));
    }

    #[test]
    fn payload_omits_status_for_transport_failures() {
        let payload = UpstreamError::Timeout.payload(None);
        assert!(payload.get("status").is_none());
        assert!(payload.get("step").is_none());
    }
}
