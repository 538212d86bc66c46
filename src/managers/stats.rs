use crate::constants::pagination::STATS_PAGE_SIZE;
use crate::constants::stats::{DEFAULT_REGION_GROUP_BY, ERP_TOP_N, REGION_TOP_N};
use crate::errors::ToolError;
use crate::managers::{connect, finish, log_filter_diagnostics, upstream, ActionResult, Exit};
use crate::services::logger::Logger;
use crate::services::pilldoc_client::{PilldocApi, PilldocConnector, StatisticsKind};
use crate::services::search::resolve_last_page;
use crate::services::tool_executor::ToolHandler;
use crate::utils::coerce::{bool_like, int_like, scalar_text};
use crate::utils::filter_builder::{build_account_filter, AccountFilterArgs, CanonicalFilter};
use crate::utils::filter_params::{keys, normalize_filter_value, NormalizedParams};
use crate::utils::records::{ad_display_code_of, items_of, reported_total_pages, text_field};
use crate::utils::sort::sort_items;
use crate::utils::tool_errors::unknown_action_error;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

const STATS_ACTIONS: &[&str] = &["summary", "accounts_stats", "erp", "region"];
const REGION_FIELDS: &[&str] = &["검색용주소", "주소"];
const SPLIT_BY_AD_DISPLAY: &str = "isAdDisplay";

#[derive(Clone)]
pub struct StatsManager {
    logger: Logger,
    connector: Arc<dyn PilldocConnector>,
}

/// Per-account aggregates collected while walking listing pages.
#[derive(Debug, Default)]
struct Tally {
    monthly: BTreeMap<String, i64>,
    region: BTreeMap<String, i64>,
    erp: BTreeMap<String, i64>,
    blocked: i64,
    not_blocked: i64,
    unknown: i64,
    first_created: Option<String>,
    last_created: Option<String>,
    accounts: i64,
}

fn region_of(item: &Value) -> Option<String> {
    REGION_FIELDS
        .iter()
        .filter_map(|key| text_field(item, key))
        .find(|text| text != "None")
        .and_then(|text| text.split_whitespace().next().map(str::to_string))
}

impl Tally {
    fn add(&mut self, item: &Value) {
        self.accounts += 1;
        if let Some(created) = text_field(item, "createdAt") {
            if self.first_created.as_ref().map_or(true, |first| created < *first) {
                self.first_created = Some(created.clone());
            }
            if self.last_created.as_ref().map_or(true, |last| created > *last) {
                self.last_created = Some(created.clone());
            }
            if let Some(month) = created.get(..7) {
                *self.monthly.entry(month.to_string()).or_default() += 1;
            }
        }
        if let Some(region) = region_of(item) {
            *self.region.entry(region).or_default() += 1;
        }
        let erp = item
            .get("erpCode")
            .and_then(scalar_text)
            .unwrap_or_else(|| "null".to_string());
        *self.erp.entry(erp).or_default() += 1;
        match ad_display_code_of(item) {
            Some(1) => self.blocked += 1,
            Some(_) => self.not_blocked += 1,
            None => self.unknown += 1,
        }
    }

    /// ERP codes in numeric order; non-numeric keys last.
    fn erp_counts(&self) -> Vec<Value> {
        let mut entries: Vec<(&String, &i64)> = self.erp.iter().collect();
        entries.sort_by_key(|(key, _)| (key.parse::<i64>().unwrap_or(i64::MAX), (*key).clone()));
        entries
            .into_iter()
            .map(|(key, count)| serde_json::json!({"key": key, "count": count}))
            .collect()
    }

    fn period(&self) -> Value {
        serde_json::json!({"from": self.first_created, "to": self.last_created})
    }

    fn stats(&self) -> Value {
        serde_json::json!({
            "monthly": self
                .monthly
                .iter()
                .map(|(month, count)| serde_json::json!({"month": month, "count": count}))
                .collect::<Vec<_>>(),
            "region": self
                .region
                .iter()
                .map(|(key, count)| serde_json::json!({"key": key, "count": count}))
                .collect::<Vec<_>>(),
            "erpCode": self.erp_counts(),
            "adBlocked": {
                "blocked": self.blocked,
                "notBlocked": self.not_blocked,
                "unknown": self.unknown,
            },
        })
    }
}

fn sum_field(items: &[Value], key: &str) -> i64 {
    items.iter().filter_map(|item| item.get(key).and_then(int_like)).sum()
}

/// Keeps the `top` entries by `printCount` and adds totals over the full list.
fn summarize_statistics(response: &mut Value, top: usize) {
    let Some(data) = response.get("data").and_then(Value::as_array).cloned() else {
        return;
    };
    if data.is_empty() {
        return;
    }
    let mut ranked = sort_items(&data, Some("-printCount"));
    ranked.truncate(top);
    let summary = serde_json::json!({
        "totalItems": data.len(),
        "showingTop": ranked.len(),
        "totalPharmacyCount": sum_field(&data, "pharmacyCount"),
        "totalPrintCount": sum_field(&data, "printCount"),
    });
    if let Some(map) = response.as_object_mut() {
        map.insert("data".to_string(), Value::Array(ranked));
        map.insert("summary".to_string(), summary);
    }
}

fn truncate_statistics(response: &mut Value, max_items: usize) {
    let Some(Value::Array(data)) = response.get_mut("data") else {
        return;
    };
    let total = data.len();
    if max_items == 0 || total <= max_items {
        return;
    }
    data.truncate(max_items);
    if let Some(map) = response.as_object_mut() {
        map.insert(
            "truncated".to_string(),
            serde_json::json!({"totalItems": total, "showing": max_items}),
        );
    }
}

impl StatsManager {
    pub fn new(logger: Logger, connector: Arc<dyn PilldocConnector>) -> Self {
        Self {
            logger: logger.child("stats"),
            connector,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action");
        let result = match action.and_then(Value::as_str).unwrap_or("") {
            "summary" => self.summary(&args).await,
            "accounts_stats" => self.accounts_stats(&args).await,
            "erp" => self.statistics(&args, StatisticsKind::Erp).await,
            "region" => self.statistics(&args, StatisticsKind::Region).await,
            _ => return Err(unknown_action_error("pilldoc_stats", action, STATS_ACTIONS)),
        };
        finish(result)
    }

    async fn count(&self, api: &dyn PilldocApi, filter: &CanonicalFilter) -> ActionResult {
        let response = api
            .list_accounts(filter)
            .await
            .map_err(|err| upstream(err, "list_accounts"))?;
        Ok(response
            .get("totalCount")
            .and_then(int_like)
            .map(Value::from)
            .unwrap_or(Value::Null))
    }

    async fn summary(&self, args: &Value) -> ActionResult {
        let params = normalize_filter_value(args);
        log_filter_diagnostics(&self.logger, &params);
        let metric = params.text("metric").unwrap_or_else(|| "count".to_string());
        if metric != "count" {
            return Err(Exit::Report(
                serde_json::json!({"error": "unsupported_metric", "metric": metric}),
            ));
        }
        let split_by = params.text("splitBy");
        let group_by = params.text("groupBy");
        let year = params.int("year");
        let base = CanonicalFilter {
            sort_by: None,
            month: params.int("month").filter(|m| (1..=12).contains(m)),
            year,
            ..build_account_filter(&AccountFilterArgs::from_params(&params))
        }
        .with_page(1)
        .with_page_size(1);

        match group_by.as_deref() {
            None => {}
            Some("month") if year.is_some() => {}
            Some(other) => {
                return Err(Exit::Report(serde_json::json!({
                    "error": "unsupported_groupBy",
                    "groupBy": other,
                    "hint": "groupBy=month requires year",
                })));
            }
        }

        let api = connect(self.connector.as_ref(), args).await?;
        if let (Some(year), Some(_)) = (year, group_by.as_deref()) {
            let mut monthly = Vec::with_capacity(12);
            for month in 1..=12 {
                let filter = CanonicalFilter {
                    month: Some(month),
                    ..base.clone()
                };
                let count = self.count(api.as_ref(), &filter).await?;
                monthly.push(serde_json::json!({
                    "month": format!("{}-{:02}", year, month),
                    "count": count,
                }));
            }
            return Ok(serde_json::json!({ "monthly": monthly }));
        }
        if split_by.as_deref() == Some(SPLIT_BY_AD_DISPLAY) && base.is_ad_display.is_none() {
            let displayed = CanonicalFilter {
                is_ad_display: Some(0),
                ..base.clone()
            };
            let blocked = CanonicalFilter {
                is_ad_display: Some(1),
                ..base.clone()
            };
            return Ok(serde_json::json!({
                "countDisplayed": self.count(api.as_ref(), &displayed).await?,
                "countBlocked": self.count(api.as_ref(), &blocked).await?,
            }));
        }
        Ok(serde_json::json!({ "count": self.count(api.as_ref(), &base).await? }))
    }

    async fn accounts_stats(&self, args: &Value) -> ActionResult {
        let params = normalize_filter_value(args);
        log_filter_diagnostics(&self.logger, &params);
        let page_size = params.int(keys::PAGE_SIZE).unwrap_or(STATS_PAGE_SIZE);
        let max_pages = params.int(keys::MAX_PAGES).unwrap_or(0).max(0);
        let base = build_account_filter(&AccountFilterArgs::from_params(&params))
            .with_page_size(page_size);

        let api = connect(self.connector.as_ref(), args).await?;
        let mut tally = Tally::default();
        let mut total_reported = None;
        let mut last_page = None;
        let mut pages_fetched = 0;
        let mut page = 1;
        loop {
            let response = api
                .list_accounts(&base.with_page(page))
                .await
                .map_err(|err| page_failure(err, page))?;
            if total_reported.is_none() {
                total_reported = response.get("totalCount").and_then(int_like);
            }
            let last = *last_page
                .get_or_insert_with(|| resolve_last_page(reported_total_pages(&response), max_pages));
            let items = items_of(&response);
            if items.is_empty() {
                break;
            }
            pages_fetched += 1;
            items
                .iter()
                .filter(|item| item.is_object())
                .for_each(|item| tally.add(item));
            if page >= last {
                break;
            }
            page += 1;
        }

        let mut out = Map::new();
        out.insert("filters".to_string(), base.to_value());
        out.insert("maxPages".to_string(), Value::from(max_pages));
        out.insert(
            "totalCountReported".to_string(),
            total_reported.map(Value::from).unwrap_or(Value::Null),
        );
        out.insert("pagesFetched".to_string(), Value::from(pages_fetched));
        out.insert("period".to_string(), tally.period());
        out.insert("totalAccounts".to_string(), Value::from(tally.accounts));
        out.insert("stats".to_string(), tally.stats());
        Ok(Value::Object(out))
    }

    fn statistics_query(
        &self,
        params: &NormalizedParams,
        kind: StatisticsKind,
    ) -> Vec<(String, String)> {
        let mut query = Vec::new();
        let mut push = |name: &str, value: Option<String>| {
            if let Some(value) = value {
                query.push((name.to_string(), value));
            }
        };
        push("StartDate", params.text("startDate"));
        push("EndDate", params.text("endDate"));
        if kind == StatisticsKind::Region {
            push("SidoName", params.text("sidoName"));
            push("SigunguName", params.text("sigunguName"));
            push(
                "GroupBy",
                Some(
                    params
                        .text("groupBy")
                        .unwrap_or_else(|| DEFAULT_REGION_GROUP_BY.to_string()),
                ),
            );
        }
        query
    }

    async fn statistics(&self, args: &Value, kind: StatisticsKind) -> ActionResult {
        let params = normalize_filter_value(args);
        let query = self.statistics_query(&params, kind);
        let summary_only = args.get("summaryOnly").and_then(bool_like).unwrap_or(false);
        let max_items = params
            .int("maxItems")
            .filter(|n| *n > 0)
            .map_or(0, |n| n as usize);
        let step = match kind {
            StatisticsKind::Erp => "erp_statistics",
            StatisticsKind::Region => "region_statistics",
        };

        let api = connect(self.connector.as_ref(), args).await?;
        let mut response = api
            .get_statistics(kind, &query)
            .await
            .map_err(|err| upstream(err, step))?;
        if summary_only {
            let top = match kind {
                StatisticsKind::Erp => ERP_TOP_N,
                StatisticsKind::Region => REGION_TOP_N,
            };
            summarize_statistics(&mut response, top);
        } else {
            truncate_statistics(&mut response, max_items);
        }
        Ok(response)
    }
}

fn page_failure(err: crate::errors::UpstreamError, page: i64) -> Exit {
    let mut payload = err.payload(Some("list_accounts"));
    if let Some(map) = payload.as_object_mut() {
        map.insert("page".to_string(), Value::from(page));
    }
    Exit::Report(payload)
}

#[async_trait::async_trait]
impl ToolHandler for StatsManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle_action", args.get("action"));
        self.handle_action(args).await
    }
}
