use crate::errors::ToolError;
use crate::managers;
use crate::mcp::aliases::tool_alias_map_owned;
use crate::mcp::catalog::tool_catalog;
use crate::services::logger::Logger;
use crate::services::pilldoc_client::{HttpConnector, PilldocConnector};
use crate::services::settings::Settings;
use crate::services::token::TokenProvider;
use crate::services::tool_executor::{ToolExecutor, ToolHandler};
use std::collections::HashMap;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub settings: Arc<Settings>,
    pub tool_executor: Arc<ToolExecutor>,
}

impl App {
    fn validate_tool_wiring(
        handlers: &HashMap<String, Arc<dyn ToolHandler>>,
        alias_map: &HashMap<String, String>,
    ) -> Result<(), ToolError> {
        let mut missing: Vec<String> = tool_catalog()
            .iter()
            .map(|tool| tool.name.clone())
            .filter(|name| !handlers.contains_key(name) && !alias_map.contains_key(name))
            .collect();
        let dangling: Vec<String> = alias_map
            .iter()
            .filter(|(_, target)| !handlers.contains_key(*target))
            .map(|(alias, _)| alias.clone())
            .collect();
        if missing.is_empty() && dangling.is_empty() {
            return Ok(());
        }
        missing.sort();
        Err(ToolError::internal("Tool wiring is incomplete")
            .with_hint(
                "Every tool in tool_catalog.json needs a handler, and every alias must point at one."
                    .to_string(),
            )
            .with_details(serde_json::json!({
                "missing_tools": missing,
                "dangling_aliases": dangling,
            })))
    }

    fn http_client() -> Result<reqwest::Client, ToolError> {
        reqwest::Client::builder()
            .user_agent(concat!("pilldoc/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| ToolError::internal(format!("Failed to build HTTP client: {}", err)))
    }

    pub fn initialize() -> Result<Self, ToolError> {
        let settings = Arc::new(Settings::from_env());
        Self::build(settings, None)
    }

    /// Wires the tools against an alternate upstream connector. Login and
    /// status still go through the HTTP token provider.
    pub fn with_connector(
        settings: Settings,
        connector: Arc<dyn PilldocConnector>,
    ) -> Result<Self, ToolError> {
        Self::build(Arc::new(settings), Some(connector))
    }

    fn build(
        settings: Arc<Settings>,
        connector: Option<Arc<dyn PilldocConnector>>,
    ) -> Result<Self, ToolError> {
        let logger = Logger::new("pilldoc");
        let http = Self::http_client()?;
        let tokens = TokenProvider::new(logger.clone(), http.clone());
        let http_connector = Arc::new(HttpConnector::new(
            logger.clone(),
            settings.clone(),
            tokens,
            http,
        ));
        let connector: Arc<dyn PilldocConnector> =
            connector.unwrap_or_else(|| http_connector.clone() as Arc<dyn PilldocConnector>);

        let accounts_manager = Arc::new(managers::accounts::AccountsManager::new(
            logger.clone(),
            settings.clone(),
            connector.clone(),
        ));
        let pharmacy_manager = Arc::new(managers::pharmacy::PharmacyManager::new(
            logger.clone(),
            settings.clone(),
            connector.clone(),
        ));
        let campaigns_manager = Arc::new(managers::campaigns::CampaignsManager::new(
            logger.clone(),
            connector.clone(),
        ));
        let stats_manager = Arc::new(managers::stats::StatsManager::new(
            logger.clone(),
            connector,
        ));
        let auth_manager = Arc::new(managers::auth::AuthManager::new(
            logger.clone(),
            http_connector,
        ));

        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        handlers.insert("pilldoc_accounts".to_string(), accounts_manager);
        handlers.insert("pilldoc_pharmacy".to_string(), pharmacy_manager);
        handlers.insert("pilldoc_campaigns".to_string(), campaigns_manager);
        handlers.insert("pilldoc_stats".to_string(), stats_manager);
        handlers.insert("pilldoc_auth".to_string(), auth_manager);

        let alias_map = tool_alias_map_owned();
        Self::validate_tool_wiring(&handlers, &alias_map)?;

        let tool_executor = Arc::new(ToolExecutor::new(logger.clone(), handlers, alias_map));

        Ok(Self {
            logger,
            settings,
            tool_executor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_tools_are_all_wired() {
        let app = App::with_connector(
            Settings::from_lookup(|_| None),
            Arc::new(HttpConnector::new(
                Logger::new("test"),
                Arc::new(Settings::from_lookup(|_| None)),
                TokenProvider::new(Logger::new("test"), reqwest::Client::new()),
                reqwest::Client::new(),
            )),
        )
        .expect("wiring");
        let names = app.tool_executor.tool_names();
        assert_eq!(
            names,
            vec![
                "pilldoc_accounts",
                "pilldoc_auth",
                "pilldoc_campaigns",
                "pilldoc_pharmacy",
                "pilldoc_stats"
            ]
        );
    }
}
