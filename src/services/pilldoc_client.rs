use crate::constants::network::ACCEPT_JSON;
use crate::constants::update::CONTENT_TYPES;
use crate::errors::{ToolError, UpstreamError};
use crate::services::logger::Logger;
use crate::services::settings::Settings;
use crate::services::token::{Credentials, TokenProvider};
use crate::services::validation::Validation;
use crate::utils::coerce::scalar_text;
use crate::utils::filter_builder::CanonicalFilter;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticsKind {
    Erp,
    Region,
}

impl StatisticsKind {
    fn segment(self) -> &'static str {
        match self {
            StatisticsKind::Erp => "erp",
            StatisticsKind::Region => "region",
        }
    }
}

/// Operations of the Pilldoc admin API used by the tools.
#[async_trait]
pub trait PilldocApi: Send + Sync {
    async fn list_accounts(&self, filter: &CanonicalFilter) -> Result<Value, UpstreamError>;
    async fn get_user(&self, account_id: &str) -> Result<Value, UpstreamError>;
    async fn get_pharm(&self, biz_no: &str) -> Result<Value, UpstreamError>;
    async fn get_rejected_campaigns(&self, biz_no: &str) -> Result<Value, UpstreamError>;
    async fn reject_campaign(
        &self,
        biz_no: &str,
        campaign_id: i64,
        comment: Option<&str>,
    ) -> Result<Value, UpstreamError>;
    async fn update_account(
        &self,
        account_id: &str,
        body: &Map<String, Value>,
    ) -> Result<Value, UpstreamError>;
    async fn get_statistics(
        &self,
        kind: StatisticsKind,
        query: &[(String, String)],
    ) -> Result<Value, UpstreamError>;
}

#[derive(Clone)]
pub struct PilldocClient {
    http: Client,
    base_url: String,
    token: String,
    timeout: Duration,
}

impl PilldocClient {
    pub fn new(http: Client, base_url: &str, token: &str, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            timeout,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|err| UpstreamError::Transport(format!("invalid base url: {}", err)))?;
        url.path_segments_mut()
            .map_err(|_| UpstreamError::Transport("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, ACCEPT_JSON)
            .timeout(self.timeout)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, UpstreamError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let parsed = serde_json::from_str::<Value>(&text).ok();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body: parsed.unwrap_or(Value::String(text)),
            });
        }
        Ok(parsed.unwrap_or_else(|| serde_json::json!({ "text": text })))
    }
}

/// Flat `key=value` pairs for a form-encoded body; nested values are sent as JSON text.
fn form_pairs(body: &Map<String, Value>) -> Vec<(String, String)> {
    body.iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let text = scalar_text(value).unwrap_or_else(|| value.to_string());
            (key.clone(), text)
        })
        .collect()
}

#[async_trait]
impl PilldocApi for PilldocClient {
    async fn list_accounts(&self, filter: &CanonicalFilter) -> Result<Value, UpstreamError> {
        let url = self.endpoint(&["v1", "pilldoc", "accounts"])?;
        self.send(self.request(Method::POST, url).json(&filter.to_value()))
            .await
    }

    async fn get_user(&self, account_id: &str) -> Result<Value, UpstreamError> {
        let url = self.endpoint(&["v1", "pilldoc", "user", account_id])?;
        self.send(self.request(Method::GET, url)).await
    }

    async fn get_pharm(&self, biz_no: &str) -> Result<Value, UpstreamError> {
        let url = self.endpoint(&["v1", "pilldoc", "pharm", biz_no])?;
        self.send(self.request(Method::GET, url)).await
    }

    async fn get_rejected_campaigns(&self, biz_no: &str) -> Result<Value, UpstreamError> {
        let url = self.endpoint(&["v1", "adps", "campain", biz_no, "reject"])?;
        self.send(self.request(Method::GET, url)).await
    }

    async fn reject_campaign(
        &self,
        biz_no: &str,
        campaign_id: i64,
        comment: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        let url = self.endpoint(&["v1", "adps", "campain", biz_no, "reject"])?;
        let body = serde_json::json!({
            "campaignId": campaign_id,
            "comment": comment.unwrap_or_default(),
        });
        self.send(self.request(Method::POST, url).json(&body)).await
    }

    async fn update_account(
        &self,
        account_id: &str,
        body: &Map<String, Value>,
    ) -> Result<Value, UpstreamError> {
        let url = self.endpoint(&["v1", "pilldoc", "account", account_id])?;
        let mut last_err = None;
        for content_type in CONTENT_TYPES {
            let payload = if content_type.starts_with("application/x-www-form-urlencoded") {
                serde_urlencoded::to_string(form_pairs(body))
                    .map_err(|err| UpstreamError::Decode(err.to_string()))?
            } else {
                serde_json::to_string(body).map_err(|err| UpstreamError::Decode(err.to_string()))?
            };
            let request = self
                .request(Method::PATCH, url.clone())
                .header(CONTENT_TYPE, *content_type)
                .body(payload);
            match self.send(request).await {
                Err(err) if err.is_unsupported_media_type() => last_err = Some(err),
                other => return other,
            }
        }
        Err(last_err.unwrap_or(UpstreamError::Status {
            status: 415,
            body: Value::Null,
        }))
    }

    async fn get_statistics(
        &self,
        kind: StatisticsKind,
        query: &[(String, String)],
    ) -> Result<Value, UpstreamError> {
        let url = self.endpoint(&["v1", "statistics", kind.segment()])?;
        self.send(self.request(Method::GET, url).query(query)).await
    }
}

#[derive(Debug)]
pub enum ConnectFailure {
    Invalid(ToolError),
    Login(UpstreamError),
}

impl From<ToolError> for ConnectFailure {
    fn from(err: ToolError) -> Self {
        ConnectFailure::Invalid(err)
    }
}

/// Produces an authenticated API handle for one tool call.
#[async_trait]
pub trait PilldocConnector: Send + Sync {
    async fn connect(&self, args: &Value) -> Result<Arc<dyn PilldocApi>, ConnectFailure>;
}

#[derive(Clone)]
pub struct HttpConnector {
    logger: Logger,
    settings: Arc<Settings>,
    validation: Validation,
    tokens: TokenProvider,
    http: Client,
}

impl HttpConnector {
    pub fn new(logger: Logger, settings: Arc<Settings>, tokens: TokenProvider, http: Client) -> Self {
        Self {
            logger: logger.child("connector"),
            settings,
            validation: Validation::new(),
            tokens,
            http,
        }
    }

    pub fn credentials(&self, args: &Value) -> Result<Option<Credentials>, ToolError> {
        let user_id = self
            .validation
            .ensure_optional_string(args.get("userId"), "userId")?
            .or_else(|| self.settings.user_id.clone());
        let password = self
            .validation
            .ensure_optional_string(args.get("password"), "password")?
            .or_else(|| self.settings.password.clone());
        let force = args
            .get("forceLogin")
            .and_then(crate::utils::coerce::bool_like)
            .unwrap_or(self.settings.force_login);
        Ok(match (user_id, password) {
            (Some(user_id), Some(password)) => Some(Credentials {
                login_url: self.settings.login_url.clone(),
                user_id,
                password,
                force,
            }),
            _ => None,
        })
    }

    pub fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn timeout_for(&self, args: &Value) -> Result<Duration, ToolError> {
        Ok(self
            .validation
            .optional_timeout(args.get("timeout"))?
            .unwrap_or(self.settings.timeout))
    }

    async fn resolve_token(
        &self,
        args: &Value,
        timeout: Duration,
    ) -> Result<String, ConnectFailure> {
        if let Some(token) = self
            .validation
            .ensure_optional_string(args.get("token"), "token")?
        {
            return Ok(strip_bearer(&token));
        }
        let credentials = self.credentials(args)?;
        if let Some(token) = credentials.as_ref().and_then(|c| self.tokens.cached(c)) {
            return Ok(token);
        }
        if let Some(token) = self.settings.token.as_deref() {
            return Ok(strip_bearer(token));
        }
        let Some(credentials) = credentials else {
            return Err(ConnectFailure::Invalid(
                ToolError::invalid_params("No API token available")
                    .with_hint("Pass token, or set EDB_TOKEN or EDB_USER_ID and EDB_PASSWORD"),
            ));
        };
        self.logger.debug(
            "Logging in for a fresh token",
            Some(&serde_json::json!({"user_id": credentials.user_id})),
        );
        self.tokens
            .token_for(&credentials, timeout)
            .await
            .map_err(ConnectFailure::Login)
    }
}

fn strip_bearer(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => trimmed[7..].trim().to_string(),
        _ => trimmed.to_string(),
    }
}

#[async_trait]
impl PilldocConnector for HttpConnector {
    async fn connect(&self, args: &Value) -> Result<Arc<dyn PilldocApi>, ConnectFailure> {
        let base_url = match self
            .validation
            .ensure_optional_string(args.get("baseUrl"), "baseUrl")?
        {
            Some(raw) => self.validation.ensure_base_url(&raw)?,
            None => self.settings.base_url.clone(),
        };
        let timeout = self.timeout_for(args)?;
        let token = self.resolve_token(args, timeout).await?;
        Ok(Arc::new(PilldocClient::new(
            self.http.clone(),
            &base_url,
            &token,
            timeout,
        )))
    }
}
