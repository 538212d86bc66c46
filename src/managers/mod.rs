//! Tool handlers. Each manager dispatches on `args.action`.
//!
//! Actions finish in one of three ways: a result value, a `ToolError` for
//! malformed calls, or a structured `{error, ...}` report for failures the
//! caller should see as data (missing criteria, upstream errors).

pub mod accounts;
pub mod auth;
pub mod campaigns;
pub mod pharmacy;
pub mod stats;

use crate::constants::search::PAGE_SIZE;
use crate::errors::{ToolError, UpstreamError};
use crate::services::logger::Logger;
use crate::services::pilldoc_client::{ConnectFailure, PilldocApi, PilldocConnector};
use crate::services::search::SearchOptions;
use crate::services::settings::Settings;
use crate::utils::coerce::scalar_text;
use crate::utils::filter_builder::{build_search_filter, CanonicalFilter};
use crate::utils::filter_params::{keys, NormalizedParams};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

pub(crate) enum Exit {
    Error(ToolError),
    Report(Value),
}

impl From<ToolError> for Exit {
    fn from(err: ToolError) -> Self {
        Exit::Error(err)
    }
}

pub(crate) type ActionResult = Result<Value, Exit>;

pub(crate) fn upstream(err: UpstreamError, step: &str) -> Exit {
    Exit::Report(err.payload(Some(step)))
}

pub(crate) fn report(error: impl Into<String>) -> Exit {
    Exit::Report(serde_json::json!({ "error": error.into() }))
}

pub(crate) fn finish(result: ActionResult) -> Result<Value, ToolError> {
    match result {
        Ok(value) | Err(Exit::Report(value)) => Ok(value),
        Err(Exit::Error(err)) => Err(err),
    }
}

pub(crate) async fn connect(
    connector: &dyn PilldocConnector,
    args: &Value,
) -> Result<Arc<dyn PilldocApi>, Exit> {
    connector.connect(args).await.map_err(|failure| match failure {
        ConnectFailure::Invalid(err) => Exit::Error(err),
        ConnectFailure::Login(err) => upstream(err, "login"),
    })
}

pub(crate) fn log_filter_diagnostics(logger: &Logger, params: &NormalizedParams) {
    if let Some(diagnostics) = params.diagnostics() {
        logger.debug("Filter parameters normalized", Some(&diagnostics));
    }
}

/// `budgetMs` from the call, else the configured search budget.
pub(crate) fn search_budget(params: &NormalizedParams, settings: &Settings) -> Option<Duration> {
    params
        .int(keys::BUDGET_MS)
        .filter(|ms| *ms > 0)
        .map(|ms| Duration::from_millis(ms as u64))
        .or(settings.search_budget)
}

/// Search options with per-call flags layered over `defaults`.
pub(crate) fn search_options(
    params: &NormalizedParams,
    settings: &Settings,
    defaults: SearchOptions,
) -> SearchOptions {
    SearchOptions {
        exact: params.flag(keys::EXACT).unwrap_or(defaults.exact),
        stop_on_first: params.flag(keys::STOP_ON_FIRST).unwrap_or(defaults.stop_on_first),
        use_pharm_detail: params
            .flag(keys::USE_PHARM_DETAIL)
            .unwrap_or(defaults.use_pharm_detail),
        max_pages: params.int(keys::MAX_PAGES).unwrap_or(defaults.max_pages).max(0),
        budget: search_budget(params, settings),
        mode: defaults.mode,
    }
}

/// First-page search filter: caller's search types win over `default_types`,
/// listing filters are carried over from the call.
pub(crate) fn search_filter(
    params: &NormalizedParams,
    keyword: Option<&str>,
    default_types: &[&str],
) -> CanonicalFilter {
    let types: Vec<String> = params
        .list(keys::CURRENT_SEARCH_TYPE)
        .map(|codes| codes.iter().filter_map(scalar_text).collect())
        .filter(|codes: &Vec<String>| !codes.is_empty())
        .unwrap_or_else(|| default_types.iter().map(|code| code.to_string()).collect());
    let page_size = params.int(keys::PAGE_SIZE).unwrap_or(PAGE_SIZE);
    CanonicalFilter {
        account_type: params.text(keys::ACCOUNT_TYPE),
        pharm_chain: params.list(keys::PHARM_CHAIN),
        sales_channel: params.list(keys::SALES_CHANNEL),
        erp_kind: params.list(keys::ERP_KIND),
        ..build_search_filter(keyword, types, page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::search::MatchMode;
    use crate::utils::filter_params::normalize_filter_value;
    use serde_json::json;

    #[test]
    fn finish_turns_reports_into_results() {
        let ok = finish(Err(report("no criteria"))).expect("report is a result");
        assert_eq!(ok, json!({"error": "no criteria"}));
        assert!(finish(Err(Exit::Error(ToolError::invalid_params("bad")))).is_err());
    }

    #[test]
    fn call_flags_override_defaults() {
        let settings = Settings::from_lookup(|key| {
            (key == "PILLDOC_SEARCH_BUDGET_MS").then(|| "900".to_string())
        });
        let params = normalize_filter_value(&json!({"exact": "no", "max_pages": "3"}));
        let options = search_options(
            &params,
            &settings,
            SearchOptions {
                mode: MatchMode::Keyword,
                exact: true,
                stop_on_first: true,
                ..SearchOptions::default()
            },
        );
        assert!(!options.exact);
        assert!(options.stop_on_first);
        assert_eq!(options.max_pages, 3);
        assert_eq!(options.mode, MatchMode::Keyword);
        assert_eq!(options.budget, Some(Duration::from_millis(900)));

        let params = normalize_filter_value(&json!({"budgetMs": 50}));
        assert_eq!(search_budget(&params, &settings), Some(Duration::from_millis(50)));
    }

    #[test]
    fn search_filter_defaults_search_type_and_carries_filters() {
        let params = normalize_filter_value(&json!({"chain": "A", "account_type": "NORMAL"}));
        let filter = search_filter(&params, Some("행복약국"), &["s"]);
        assert_eq!(filter.page, Some(1));
        assert_eq!(filter.page_size, Some(100));
        assert_eq!(filter.current_search_type, Some(vec!["s".to_string()]));
        assert_eq!(filter.pharm_chain, Some(vec![json!("A")]));
        assert_eq!(filter.account_type.as_deref(), Some("NORMAL"));
        assert_eq!(filter.search_keyword.as_deref(), Some("행복약국"));

        let params = normalize_filter_value(&json!({"searchType": "b", "pageSize": 20}));
        let filter = search_filter(&params, None, &["s"]);
        assert_eq!(filter.current_search_type, Some(vec!["b".to_string()]));
        assert_eq!(filter.page_size, Some(20));
        assert_eq!(filter.search_keyword, None);
    }
}
