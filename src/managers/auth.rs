use crate::errors::ToolError;
use crate::managers::{finish, report, upstream, ActionResult};
use crate::services::logger::Logger;
use crate::services::pilldoc_client::HttpConnector;
use crate::services::tool_executor::ToolHandler;
use crate::utils::tool_errors::unknown_action_error;
use serde_json::Value;
use std::sync::Arc;

const AUTH_ACTIONS: &[&str] = &["login", "status"];

#[derive(Clone)]
pub struct AuthManager {
    logger: Logger,
    connector: Arc<HttpConnector>,
}

impl AuthManager {
    pub fn new(logger: Logger, connector: Arc<HttpConnector>) -> Self {
        Self {
            logger: logger.child("auth"),
            connector,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action");
        let result = match action.and_then(Value::as_str).unwrap_or("") {
            "login" => self.login(&args).await,
            "status" => Ok(self.status()),
            _ => return Err(unknown_action_error("pilldoc_auth", action, AUTH_ACTIONS)),
        };
        finish(result)
    }

    /// Always performs a fresh login; the new token replaces any cached one.
    async fn login(&self, args: &Value) -> ActionResult {
        let Some(credentials) = self.connector.credentials(args)? else {
            return Err(report(
                "userId and password are required (or EDB_USER_ID and EDB_PASSWORD)",
            ));
        };
        let timeout = self.connector.timeout_for(args)?;
        let tokens = self.connector.tokens();
        tokens.forget(&credentials);
        let outcome = tokens
            .login(&credentials, timeout)
            .await
            .map_err(|err| upstream(err, "login"))?;
        Ok(serde_json::json!({ "token": outcome.token, "forced": outcome.forced }))
    }

    fn status(&self) -> Value {
        let settings = self.connector.settings();
        let tokens = self.connector.tokens();
        serde_json::json!({
            "baseUrl": settings.base_url,
            "loginUrl": settings.login_url,
            "hasCredentials": settings.has_credentials(),
            "hasEnvToken": settings.token.is_some(),
            "cachedTokens": tokens.cached_count(),
            "cachedAgeSecs": tokens.newest_age().map(|age| age.as_secs()),
        })
    }
}

#[async_trait::async_trait]
impl ToolHandler for AuthManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle_action", args.get("action"));
        self.handle_action(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::settings::Settings;
    use crate::services::token::TokenProvider;
    use serde_json::json;

    fn manager(settings: Settings) -> AuthManager {
        let logger = Logger::new("test");
        let http = reqwest::Client::new();
        let tokens = TokenProvider::new(logger.clone(), http.clone());
        let connector = HttpConnector::new(logger.clone(), Arc::new(settings), tokens, http);
        AuthManager::new(logger, Arc::new(connector))
    }

    #[tokio::test]
    async fn status_never_reveals_tokens() {
        let settings = Settings::from_lookup(|key| match key {
            "EDB_TOKEN" => Some("secret-token".to_string()),
            "EDB_BASE_URL" => Some("https://api.example.test".to_string()),
            _ => None,
        });
        let out = manager(settings)
            .handle_action(json!({"action": "status"}))
            .await
            .expect("status");
        assert_eq!(out["hasEnvToken"], json!(true));
        assert_eq!(out["hasCredentials"], json!(false));
        assert_eq!(out["cachedTokens"], json!(0));
        assert_eq!(out["cachedAgeSecs"], Value::Null);
        assert!(!out.to_string().contains("secret-token"));
    }

    #[tokio::test]
    async fn login_without_credentials_is_reported() {
        let out = manager(Settings::from_lookup(|_| None))
            .handle_action(json!({"action": "login"}))
            .await
            .expect("report");
        assert!(out["error"].as_str().unwrap_or("").contains("userId"));
    }

    #[tokio::test]
    async fn unknown_action_is_rejected() {
        let err = manager(Settings::from_lookup(|_| None))
            .handle_action(json!({"action": "logout"}))
            .await
            .expect_err("unknown action");
        assert!(err.message.contains("logout"));
    }
}
