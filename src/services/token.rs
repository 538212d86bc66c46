use crate::constants::auth::{
    DUPLICATE_LOGIN_CODE, DUPLICATE_LOGIN_MARKER, TOKEN_CONTAINERS, TOKEN_KEYS,
};
use crate::constants::network::ACCEPT_JSON;
use crate::errors::UpstreamError;
use crate::services::logger::Logger;
use crate::utils::coerce::scalar_text;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Credentials {
    pub login_url: String,
    pub user_id: String,
    pub password: String,
    pub force: bool,
}

impl Credentials {
    fn cache_key(&self) -> String {
        format!("{}|{}", self.login_url, self.user_id)
    }
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub forced: bool,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    obtained_at: Instant,
}

/// Bearer tokens obtained by logging in, cached per login URL and user.
#[derive(Clone)]
pub struct TokenProvider {
    logger: Logger,
    http: Client,
    cache: Arc<Mutex<HashMap<String, CachedToken>>>,
}

/// First token-looking string in a login response.
pub fn extract_token(data: &Value) -> Option<String> {
    match data {
        Value::Object(map) => {
            for key in TOKEN_KEYS {
                if let Some(token) = map
                    .get(*key)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|token| !token.is_empty())
                {
                    return Some(token.to_string());
                }
            }
            TOKEN_CONTAINERS
                .iter()
                .filter_map(|key| map.get(*key))
                .find_map(extract_token)
        }
        Value::Array(items) => items.iter().find_map(extract_token),
        _ => None,
    }
}

pub fn is_duplicate_login(body: &Value) -> bool {
    let message = body
        .get("message")
        .and_then(scalar_text)
        .unwrap_or_default();
    let code = body
        .get("resultCode")
        .and_then(scalar_text)
        .unwrap_or_default();
    message.contains(DUPLICATE_LOGIN_MARKER) || code == DUPLICATE_LOGIN_CODE
}

impl TokenProvider {
    pub fn new(logger: Logger, http: Client) -> Self {
        Self {
            logger: logger.child("token"),
            http,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn cached(&self, credentials: &Credentials) -> Option<String> {
        let guard = self.cache.lock().ok()?;
        guard
            .get(&credentials.cache_key())
            .map(|entry| entry.token.clone())
    }

    pub fn cached_count(&self) -> usize {
        self.cache.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    /// Age of the newest cached token, if any.
    pub fn newest_age(&self) -> Option<Duration> {
        let guard = self.cache.lock().ok()?;
        guard.values().map(|entry| entry.obtained_at.elapsed()).min()
    }

    fn store(&self, credentials: &Credentials, token: &str) {
        if let Ok(mut guard) = self.cache.lock() {
            guard.insert(
                credentials.cache_key(),
                CachedToken {
                    token: token.to_string(),
                    obtained_at: Instant::now(),
                },
            );
        }
    }

    pub fn forget(&self, credentials: &Credentials) {
        if let Ok(mut guard) = self.cache.lock() {
            guard.remove(&credentials.cache_key());
        }
    }

    /// Cached token if present, else a fresh login.
    pub async fn token_for(
        &self,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<String, UpstreamError> {
        if let Some(token) = self.cached(credentials) {
            return Ok(token);
        }
        self.login(credentials, timeout).await.map(|outcome| outcome.token)
    }

    async fn post_login(
        &self,
        credentials: &Credentials,
        force: bool,
        timeout: Duration,
    ) -> Result<(u16, Value), UpstreamError> {
        let payload = serde_json::json!({
            "userId": credentials.user_id,
            "password": credentials.password,
            "isForceLogin": force,
        });
        let response = self
            .http
            .post(&credentials.login_url)
            .header(ACCEPT, ACCEPT_JSON)
            .json(&payload)
            .timeout(timeout)
            .send()
            .await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok((status, body))
    }

    /// Logs in, retrying once with force when the account already has a session.
    pub async fn login(
        &self,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<LoginOutcome, UpstreamError> {
        let mut forced = credentials.force;
        let (mut status, mut body) = self.post_login(credentials, forced, timeout).await?;
        if !(200..300).contains(&status) && !forced && is_duplicate_login(&body) {
            self.logger.warn(
                "Duplicate session reported; retrying login with force",
                Some(&serde_json::json!({"user_id": credentials.user_id})),
            );
            forced = true;
            (status, body) = self.post_login(credentials, forced, timeout).await?;
        }
        if !(200..300).contains(&status) {
            return Err(UpstreamError::Status { status, body });
        }
        let token = extract_token(&body).ok_or_else(|| {
            UpstreamError::Decode("login response did not contain a token".to_string())
        })?;
        self.store(credentials, &token);
        self.logger.info(
            "Login succeeded",
            Some(&serde_json::json!({"user_id": credentials.user_id, "forced": forced})),
        );
        Ok(LoginOutcome { token, forced })
    }
}
