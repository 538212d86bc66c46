use crate::constants::search::{DEFAULT_MAX_PAGES, SEARCH_TYPE_BIZNO, SEARCH_TYPE_NAME};
use crate::errors::ToolError;
use crate::managers::{
    connect, finish, log_filter_diagnostics, report, search_filter, search_options, upstream,
    ActionResult, Exit,
};
use crate::services::logger::Logger;
use crate::services::pilldoc_client::PilldocConnector;
use crate::services::search::{
    enrich_matches, search_accounts, MatchCriteria, MatchMode, SearchOptions,
};
use crate::services::settings::Settings;
use crate::services::tool_executor::ToolHandler;
use crate::services::validation::Validation;
use crate::utils::filter_params::{keys, normalize_filter_value};
use crate::utils::records::normalize_bizno;
use crate::utils::tool_errors::unknown_action_error;
use serde_json::Value;
use std::sync::Arc;

const PHARMACY_ACTIONS: &[&str] = &["get", "find_by_name", "find"];

#[derive(Clone)]
pub struct PharmacyManager {
    logger: Logger,
    validation: Validation,
    settings: Arc<Settings>,
    connector: Arc<dyn PilldocConnector>,
}

impl PharmacyManager {
    pub fn new(
        logger: Logger,
        settings: Arc<Settings>,
        connector: Arc<dyn PilldocConnector>,
    ) -> Self {
        Self {
            logger: logger.child("pharmacy"),
            validation: Validation::new(),
            settings,
            connector,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action");
        let result = match action.and_then(Value::as_str).unwrap_or("") {
            "get" => self.get(&args).await,
            "find_by_name" => self.find_by_name(&args).await,
            "find" => self.find(&args).await,
            _ => return Err(unknown_action_error("pilldoc_pharmacy", action, PHARMACY_ACTIONS)),
        };
        finish(result)
    }

    async fn get(&self, args: &Value) -> ActionResult {
        let params = normalize_filter_value(args);
        let Some(biz_no) = params.text(keys::BIZ_NO).map(|raw| normalize_bizno(&raw)) else {
            return Err(report("bizNo is required"));
        };
        let api = connect(self.connector.as_ref(), args).await?;
        api.get_pharm(&biz_no)
            .await
            .map_err(|err| upstream(err, "pharm"))
    }

    async fn find_by_name(&self, args: &Value) -> ActionResult {
        let params = normalize_filter_value(args);
        log_filter_diagnostics(&self.logger, &params);
        let name = self
            .validation
            .ensure_optional_string(args.get("name"), "name")?
            .or_else(|| params.text(keys::PHARM_NAME));
        let Some(name) = name else {
            return Err(report("name is required"));
        };
        let criteria = MatchCriteria::new(Some(name.clone()), None, None);
        let filter = search_filter(&params, Some(&name), &[SEARCH_TYPE_NAME]);
        let options = search_options(
            &params,
            &self.settings,
            SearchOptions {
                mode: MatchMode::Keyword,
                exact: true,
                stop_on_first: true,
                use_pharm_detail: true,
                max_pages: DEFAULT_MAX_PAGES,
                budget: None,
            },
        );

        let api = connect(self.connector.as_ref(), args).await?;
        let found = search_accounts(api.as_ref(), &filter, &criteria, &options)
            .await
            .map_err(|failure| Exit::Report(failure.payload()))?;
        self.logger.debug(
            "Name search finished",
            Some(&serde_json::json!({
                "matches": found.matches.len(),
                "searched_pages": found.searched_pages,
            })),
        );
        Ok(serde_json::to_value(found).unwrap_or(Value::Null))
    }

    async fn find(&self, args: &Value) -> ActionResult {
        let params = normalize_filter_value(args);
        log_filter_diagnostics(&self.logger, &params);
        let criteria = MatchCriteria::new(
            params.text(keys::PHARM_NAME),
            params.text(keys::OWNER_NAME),
            params.text(keys::BIZ_NO),
        );
        if criteria.is_empty() {
            return Err(report("at least one of pharmName, ownerName or bizNo is required"));
        }
        let default_type = if criteria.biz_no.is_some() {
            SEARCH_TYPE_BIZNO
        } else {
            SEARCH_TYPE_NAME
        };
        let keyword = criteria
            .biz_no
            .as_deref()
            .or(criteria.pharm_name.as_deref())
            .or(criteria.owner_name.as_deref());
        let filter = search_filter(&params, keyword, &[default_type]);
        let options = search_options(
            &params,
            &self.settings,
            SearchOptions {
                mode: MatchMode::Strict,
                exact: true,
                stop_on_first: true,
                use_pharm_detail: true,
                ..SearchOptions::default()
            },
        );
        let enrich = params.flag("enrich").unwrap_or(true);

        let api = connect(self.connector.as_ref(), args).await?;
        let mut found = search_accounts(api.as_ref(), &filter, &criteria, &options)
            .await
            .map_err(|failure| Exit::Report(failure.payload()))?;
        if enrich {
            let matches = std::mem::take(&mut found.matches);
            found.matches = enrich_matches(api.as_ref(), matches).await;
        }
        Ok(serde_json::to_value(found).unwrap_or(Value::Null))
    }
}

#[async_trait::async_trait]
impl ToolHandler for PharmacyManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle_action", args.get("action"));
        self.handle_action(args).await
    }
}
