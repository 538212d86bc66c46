use crate::constants::pagination::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
use crate::constants::search::{SEARCH_TYPE_BIZNO, SEARCH_TYPE_NAME};
use crate::errors::ToolError;
use crate::managers::{
    connect, finish, log_filter_diagnostics, report, search_filter, search_options, upstream,
    ActionResult, Exit,
};
use crate::services::logger::Logger;
use crate::services::pilldoc_client::{PilldocApi, PilldocConnector};
use crate::services::search::{search_accounts, MatchCriteria, MatchMode, SearchOptions};
use crate::services::settings::Settings;
use crate::services::tool_executor::ToolHandler;
use crate::services::validation::Validation;
use crate::utils::coerce::{bool_like, int_like, scalar_text};
use crate::utils::filter_builder::{build_account_filter, AccountFilterArgs, CanonicalFilter};
use crate::utils::filter_params::{keys, normalize_filter_value, NormalizedParams};
use crate::utils::records::{account_id_of, ad_display_code_of, bizno_of, items_of};
use crate::utils::sort::{sort_items, sort_response_items};
use crate::utils::tool_errors::unknown_action_error;
use crate::utils::update_sanitizer::{sanitize_update, SanitizedUpdate};
use serde_json::{Map, Value};
use std::sync::Arc;

const ACCOUNT_ACTIONS: &[&str] = &[
    "list",
    "compact",
    "user",
    "user_from_accounts",
    "update",
    "update_by_search",
];
const DEFAULT_COMPACT_FIELDS: &[&str] = &["id", "bizno"];
const ACCOUNT_LIST_KEYS: &[&str] = &["data", "items", "results", "list"];

#[derive(Clone)]
pub struct AccountsManager {
    logger: Logger,
    validation: Validation,
    settings: Arc<Settings>,
    connector: Arc<dyn PilldocConnector>,
}

fn listing_filter(params: &NormalizedParams) -> CanonicalFilter {
    let mut filter = build_account_filter(&AccountFilterArgs::from_params(params));
    filter.page.get_or_insert(DEFAULT_PAGE);
    filter.page_size.get_or_insert(DEFAULT_PAGE_SIZE);
    filter
}

fn compact_item(item: &Value, fields: &[String], include_ad_flag: bool) -> Value {
    let mut slim = Map::new();
    for field in fields {
        let value = if field == "bizno" {
            bizno_of(item).map(Value::String).unwrap_or(Value::Null)
        } else {
            item.get(field).cloned().unwrap_or(Value::Null)
        };
        slim.insert(field.clone(), value);
    }
    if include_ad_flag {
        slim.insert(
            "isAdDisplay".to_string(),
            ad_display_code_of(item).map(Value::from).unwrap_or(Value::Null),
        );
    }
    Value::Object(slim)
}

/// Accounts carried in a previous listing response.
fn accounts_in(response: &Value) -> &[Value] {
    ACCOUNT_LIST_KEYS
        .iter()
        .filter_map(|key| response.get(*key).and_then(Value::as_array))
        .find(|list| !list.is_empty())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn same_scalar(left: Option<&Value>, right: &Value) -> bool {
    match (left.and_then(scalar_text), scalar_text(right)) {
        (Some(a), Some(b)) => a.trim() == b.trim(),
        _ => false,
    }
}

impl AccountsManager {
    pub fn new(
        logger: Logger,
        settings: Arc<Settings>,
        connector: Arc<dyn PilldocConnector>,
    ) -> Self {
        Self {
            logger: logger.child("accounts"),
            validation: Validation::new(),
            settings,
            connector,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action");
        let result = match action.and_then(Value::as_str).unwrap_or("") {
            "list" => self.list(&args).await,
            "compact" => self.compact(&args).await,
            "user" => self.user(&args).await,
            "user_from_accounts" => self.user_from_accounts(&args).await,
            "update" => self.update(&args).await,
            "update_by_search" => self.update_by_search(&args).await,
            _ => return Err(unknown_action_error("pilldoc_accounts", action, ACCOUNT_ACTIONS)),
        };
        finish(result)
    }

    async fn list(&self, args: &Value) -> ActionResult {
        let params = normalize_filter_value(args);
        log_filter_diagnostics(&self.logger, &params);
        let filter = listing_filter(&params);
        let api = connect(self.connector.as_ref(), args).await?;
        let mut response = api
            .list_accounts(&filter)
            .await
            .map_err(|err| upstream(err, "list_accounts"))?;
        if params.flag(keys::ENFORCE_SORT_LOCAL).unwrap_or(false) {
            sort_response_items(&mut response, filter.sort_by.as_deref());
        }
        Ok(response)
    }

    async fn compact(&self, args: &Value) -> ActionResult {
        let params = normalize_filter_value(args);
        log_filter_diagnostics(&self.logger, &params);
        let filter = listing_filter(&params);
        let fields: Vec<String> = args
            .get("fields")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(scalar_text).collect::<Vec<_>>())
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| DEFAULT_COMPACT_FIELDS.iter().map(|f| f.to_string()).collect());
        let include_ad_flag = args
            .get("includeAdBlockedBool")
            .and_then(bool_like)
            .unwrap_or(false);
        let include_items = args.get("includeItems").and_then(bool_like).unwrap_or(true);
        let limit = args
            .get("limitItems")
            .and_then(int_like)
            .map(|limit| limit.max(0) as usize);

        let api = connect(self.connector.as_ref(), args).await?;
        let response = api
            .list_accounts(&filter)
            .await
            .map_err(|err| upstream(err, "list_accounts"))?;

        let items = if params.flag(keys::ENFORCE_SORT_LOCAL).unwrap_or(true) {
            sort_items(items_of(&response), filter.sort_by.as_deref())
        } else {
            items_of(&response).to_vec()
        };
        let mut slim: Vec<Value> = items
            .iter()
            .filter(|item| item.is_object())
            .map(|item| compact_item(item, &fields, include_ad_flag))
            .collect();
        if let Some(limit) = limit {
            slim.truncate(limit);
        }

        let mut out = Map::new();
        for key in ["totalCount", "totalPage", "nowPage"] {
            if let Some(value) = response.get(key) {
                out.insert(key.to_string(), value.clone());
            }
        }
        out.insert("count".to_string(), Value::from(slim.len()));
        if include_items {
            out.insert("items".to_string(), Value::Array(slim));
        }
        Ok(Value::Object(out))
    }

    fn account_id(&self, args: &Value) -> Result<String, Exit> {
        self.validation
            .ensure_optional_string(args.get("accountId"), "accountId")?
            .ok_or_else(|| report("accountId is required"))
    }

    async fn user(&self, args: &Value) -> ActionResult {
        let account_id = self.account_id(args)?;
        let api = connect(self.connector.as_ref(), args).await?;
        api.get_user(&account_id)
            .await
            .map_err(|err| upstream(err, "user"))
    }

    async fn user_from_accounts(&self, args: &Value) -> ActionResult {
        let response = self.validation.ensure_object(args.get("accounts"), "accounts")?;
        let accounts = accounts_in(&Value::Object(response.clone())).to_vec();
        if accounts.is_empty() {
            return Err(report("accounts contains no account list"));
        }
        let field = self
            .validation
            .ensure_optional_string(args.get("accountField"), "accountField")?;
        let selected = match (field, args.get("accountValue")) {
            (Some(field), Some(wanted)) => accounts
                .iter()
                .find(|account| same_scalar(account.get(&field), wanted))
                .cloned()
                .ok_or_else(|| {
                    Exit::Report(serde_json::json!({
                        "error": "no account matched accountField/accountValue",
                        "accountField": field,
                        "accountValue": wanted,
                    }))
                })?,
            _ => {
                let index = args.get("index").and_then(int_like).unwrap_or(0);
                usize::try_from(index)
                    .ok()
                    .and_then(|i| accounts.get(i))
                    .cloned()
                    .ok_or_else(|| {
                        Exit::Report(serde_json::json!({
                            "error": "index out of range",
                            "index": index,
                            "count": accounts.len(),
                        }))
                    })?
            }
        };
        let Some(account_id) = account_id_of(&selected) else {
            return Err(Exit::Report(serde_json::json!({
                "error": "selected account has no id",
                "availableKeys": selected.as_object().map(|m| m.keys().cloned().collect::<Vec<_>>()),
            })));
        };
        let api = connect(self.connector.as_ref(), args).await?;
        let user = api
            .get_user(&account_id)
            .await
            .map_err(|err| upstream(err, "user"))?;
        Ok(serde_json::json!({"accountId": account_id, "user": user}))
    }

    fn sanitize(&self, args: &Value) -> Result<SanitizedUpdate, Exit> {
        let body = self.validation.ensure_object(args.get("body"), "body")?;
        let sanitized = sanitize_update(body);
        for entry in &sanitized.renamed {
            self.logger.info("Update field renamed", Some(entry));
        }
        for entry in &sanitized.converted {
            self.logger.info("Update field converted", Some(entry));
        }
        for entry in &sanitized.dropped {
            self.logger.warn("Update field dropped", Some(entry));
        }
        if sanitized.is_empty() {
            return Err(Exit::Report(serde_json::json!({
                "error": "no updatable fields left after sanitization",
                "sanitization": sanitized.report(),
            })));
        }
        Ok(sanitized)
    }

    async fn patch(
        &self,
        api: &dyn PilldocApi,
        account_id: &str,
        sanitized: &SanitizedUpdate,
    ) -> ActionResult {
        let result = api
            .update_account(account_id, &sanitized.body)
            .await
            .map_err(|err| upstream(err, "update_account"))?;
        self.logger.info(
            "Account updated",
            Some(&serde_json::json!({
                "account_id": account_id,
                "fields": sanitized.body.keys().collect::<Vec<_>>(),
            })),
        );
        Ok(result)
    }

    async fn update(&self, args: &Value) -> ActionResult {
        let account_id = self.account_id(args)?;
        let sanitized = self.sanitize(args)?;
        let api = connect(self.connector.as_ref(), args).await?;
        let result = self.patch(api.as_ref(), &account_id, &sanitized).await?;
        Ok(serde_json::json!({
            "accountId": account_id,
            "result": result,
            "sanitization": sanitized.report(),
        }))
    }

    async fn update_by_search(&self, args: &Value) -> ActionResult {
        let params = normalize_filter_value(args);
        log_filter_diagnostics(&self.logger, &params);
        let criteria = MatchCriteria::new(
            params.text(keys::PHARM_NAME),
            None,
            params.text(keys::BIZ_NO),
        );
        if criteria.is_empty() {
            return Err(report("pharmName or bizNo is required"));
        }
        let sanitized = self.sanitize(args)?;
        let default_type = if criteria.biz_no.is_some() {
            SEARCH_TYPE_BIZNO
        } else {
            SEARCH_TYPE_NAME
        };
        let keyword = criteria.biz_no.as_deref().or(criteria.pharm_name.as_deref());
        let filter = search_filter(&params, keyword, &[default_type]);
        let options = search_options(
            &params,
            &self.settings,
            SearchOptions {
                mode: MatchMode::Keyword,
                exact: true,
                ..SearchOptions::default()
            },
        );

        let api = connect(self.connector.as_ref(), args).await?;
        let found = search_accounts(api.as_ref(), &filter, &criteria, &options)
            .await
            .map_err(|failure| Exit::Report(failure.payload()))?;
        let count = found.matches.len();
        if count == 0 {
            return Err(Exit::Report(serde_json::json!({
                "error": "no account matched the search",
                "count": 0,
                "searchedPages": found.searched_pages,
            })));
        }
        let index = params.int("index").unwrap_or(0);
        let Some(selected) = usize::try_from(index).ok().and_then(|i| found.matches.get(i)) else {
            return Err(Exit::Report(serde_json::json!({
                "error": "index out of range",
                "index": index,
                "count": count,
            })));
        };
        let Some(account_id) = account_id_of(selected) else {
            return Err(Exit::Report(serde_json::json!({
                "error": "selected account has no id",
                "availableKeys": selected.as_object().map(|m| m.keys().cloned().collect::<Vec<_>>()),
            })));
        };
        let result = self.patch(api.as_ref(), &account_id, &sanitized).await?;
        Ok(serde_json::json!({
            "accountId": account_id,
            "candidates": count,
            "searchedPages": found.searched_pages,
            "result": result,
            "sanitization": sanitized.report(),
        }))
    }
}

#[async_trait::async_trait]
impl ToolHandler for AccountsManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle_action", args.get("action"));
        self.handle_action(args).await
    }
}
