//! Page-by-page account search over the listing endpoint.
//!
//! Traversal is an explicit state machine: `Fetch` requests the current page,
//! `Scan` evaluates its items, and `Stop` ends the walk. Every transition out
//! of `Scan` either advances `page` toward `last_page` or stops, so a walk
//! issues at most `max(last_page, 1)` listing calls.

use crate::errors::UpstreamError;
use crate::services::pilldoc_client::PilldocApi;
use crate::utils::filter_builder::CanonicalFilter;
use crate::utils::records::{
    account_id_of, bizno_of, items_of, normalize_bizno, reported_total_pages, text_field,
    OWNER_NAME_FIELD, PHARM_NAME_FIELD,
};
use serde::Serialize;
use serde_json::Value;
use std::time::{Duration, Instant};

/// How an empty set of criteria is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Multi-field lookup; no criteria matches nothing.
    Strict,
    /// Keyword candidate search; no criteria matches everything.
    Keyword,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchCriteria {
    pub pharm_name: Option<String>,
    pub owner_name: Option<String>,
    pub biz_no: Option<String>,
}

fn trimmed(raw: Option<String>) -> Option<String> {
    raw.map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn field_matches(actual: Option<&str>, wanted: &str, exact: bool) -> bool {
    let actual = actual.map(str::trim).unwrap_or_default();
    if exact {
        actual == wanted
    } else {
        actual.to_lowercase().contains(&wanted.to_lowercase())
    }
}

impl MatchCriteria {
    pub fn new(
        pharm_name: Option<String>,
        owner_name: Option<String>,
        biz_no: Option<String>,
    ) -> Self {
        Self {
            pharm_name: trimmed(pharm_name),
            owner_name: trimmed(owner_name),
            biz_no: trimmed(biz_no).map(|raw| normalize_bizno(&raw)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pharm_name.is_none() && self.owner_name.is_none() && self.biz_no.is_none()
    }

    /// Conjunction over the supplied criteria. `name_override` replaces the
    /// record's pharmacy name, used when checking against the detail record.
    pub fn matches(
        &self,
        item: &Value,
        mode: MatchMode,
        exact: bool,
        name_override: Option<&str>,
    ) -> bool {
        if self.is_empty() {
            return mode == MatchMode::Keyword;
        }
        if let Some(wanted) = self.pharm_name.as_deref() {
            let actual = match name_override {
                Some(name) => Some(name.to_string()),
                None => text_field(item, PHARM_NAME_FIELD),
            };
            if !field_matches(actual.as_deref(), wanted, exact) {
                return false;
            }
        }
        if let Some(wanted) = self.owner_name.as_deref() {
            if !field_matches(text_field(item, OWNER_NAME_FIELD).as_deref(), wanted, exact) {
                return false;
            }
        }
        if let Some(wanted) = self.biz_no.as_deref() {
            if !field_matches(bizno_of(item).as_deref(), wanted, exact) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub mode: MatchMode,
    pub exact: bool,
    pub stop_on_first: bool,
    pub use_pharm_detail: bool,
    /// Hard page cap; `0` means "use the reported total".
    pub max_pages: i64,
    pub budget: Option<Duration>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: MatchMode::Strict,
            exact: false,
            stop_on_first: false,
            use_pharm_detail: false,
            max_pages: 0,
            budget: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailFailure {
    #[serde(rename = "bizNo")]
    pub biz_no: String,
    pub error: Value,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub matches: Vec<Value>,
    pub searched_pages: i64,
    pub total_checked: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub detail_failures: Vec<DetailFailure>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub budget_exhausted: bool,
}

/// A listing call that failed mid-traversal.
#[derive(Debug, Clone)]
pub struct SearchFailure {
    pub page: i64,
    pub error: UpstreamError,
}

impl SearchFailure {
    pub fn payload(&self) -> Value {
        let mut payload = self.error.payload(Some("list_accounts"));
        if let Some(map) = payload.as_object_mut() {
            map.insert("page".to_string(), Value::from(self.page));
        }
        payload
    }
}

/// Last page to visit, fixed after the first response.
pub fn resolve_last_page(reported: Option<i64>, cap: i64) -> i64 {
    let last = match (cap > 0, reported) {
        (true, Some(total)) => cap.min(total),
        (true, None) => cap,
        (false, Some(total)) => total,
        (false, None) => 1,
    };
    last.max(1)
}

enum Step {
    Fetch,
    Scan(Vec<Value>),
    Stop,
}

struct Traversal {
    page: i64,
    last_page: Option<i64>,
    started: Instant,
    result: MatchResult,
}

impl Traversal {
    fn new() -> Self {
        Self {
            page: 1,
            last_page: None,
            started: Instant::now(),
            result: MatchResult::default(),
        }
    }

    fn should_stop_early(&self, options: &SearchOptions) -> bool {
        options.stop_on_first && options.exact && !self.result.matches.is_empty()
    }
}

pub async fn search_accounts(
    api: &dyn PilldocApi,
    filter: &CanonicalFilter,
    criteria: &MatchCriteria,
    options: &SearchOptions,
) -> Result<MatchResult, SearchFailure> {
    let mut walk = Traversal::new();
    let mut step = Step::Fetch;
    loop {
        step = match step {
            Step::Fetch => {
                let response = api
                    .list_accounts(&filter.with_page(walk.page))
                    .await
                    .map_err(|error| SearchFailure {
                        page: walk.page,
                        error,
                    })?;
                if walk.last_page.is_none() {
                    walk.last_page = Some(resolve_last_page(
                        reported_total_pages(&response),
                        options.max_pages,
                    ));
                }
                let items = items_of(&response);
                if items.is_empty() {
                    Step::Stop
                } else {
                    Step::Scan(items.to_vec())
                }
            }
            Step::Scan(items) => {
                walk.result.searched_pages += 1;
                scan_page(api, &items, criteria, options, &mut walk.result).await;
                let last_page = walk.last_page.unwrap_or(1);
                if walk.should_stop_early(options) || walk.page >= last_page {
                    Step::Stop
                } else if options
                    .budget
                    .is_some_and(|budget| walk.started.elapsed() >= budget)
                {
                    walk.result.budget_exhausted = true;
                    Step::Stop
                } else {
                    walk.page += 1;
                    Step::Fetch
                }
            }
            Step::Stop => return Ok(walk.result),
        };
    }
}

async fn scan_page(
    api: &dyn PilldocApi,
    items: &[Value],
    criteria: &MatchCriteria,
    options: &SearchOptions,
    result: &mut MatchResult,
) {
    for item in items.iter().filter(|item| item.is_object()) {
        // A keyword search by name never counts a record without a name.
        if options.mode == MatchMode::Keyword
            && criteria.pharm_name.is_some()
            && is_nameless(item)
        {
            continue;
        }
        result.total_checked += 1;
        if criteria.matches(item, options.mode, options.exact, None)
            || confirm_by_detail(api, item, criteria, options, result).await
        {
            result.matches.push(item.clone());
            if options.stop_on_first && options.exact {
                return;
            }
        }
    }
}

fn is_nameless(item: &Value) -> bool {
    text_field(item, PHARM_NAME_FIELD).is_none()
}

/// Re-checks a listing miss against the pharmacy detail record, whose name
/// can be fresher than the listing's copy.
async fn confirm_by_detail(
    api: &dyn PilldocApi,
    item: &Value,
    criteria: &MatchCriteria,
    options: &SearchOptions,
    result: &mut MatchResult,
) -> bool {
    if !(options.use_pharm_detail && options.exact) {
        return false;
    }
    let Some(wanted) = criteria.pharm_name.as_deref() else {
        return false;
    };
    if field_matches(text_field(item, PHARM_NAME_FIELD).as_deref(), wanted, true) {
        return false;
    }
    let Some(biz_no) = bizno_of(item) else {
        return false;
    };
    match api.get_pharm(&biz_no).await {
        Ok(detail) => {
            let name = detail
                .get("data")
                .and_then(|data| text_field(data, PHARM_NAME_FIELD));
            match name {
                Some(name) => criteria.matches(item, options.mode, true, Some(&name)),
                None => false,
            }
        }
        Err(err) => {
            result.detail_failures.push(DetailFailure {
                biz_no,
                error: err.payload(Some("pharm")),
            });
            false
        }
    }
}

/// Attaches user, pharmacy and rejected-campaign details to each match.
/// A failed call is recorded in place of its detail.
pub async fn enrich_matches(api: &dyn PilldocApi, matches: Vec<Value>) -> Vec<Value> {
    let mut enriched = Vec::with_capacity(matches.len());
    for account in matches {
        let user = match account_id_of(&account) {
            Some(id) => api
                .get_user(&id)
                .await
                .unwrap_or_else(|err| err.payload(Some("user"))),
            None => Value::Null,
        };
        let (pharm, rejects) = match bizno_of(&account) {
            Some(biz_no) => (
                api.get_pharm(&biz_no)
                    .await
                    .unwrap_or_else(|err| err.payload(Some("pharm"))),
                api.get_rejected_campaigns(&biz_no)
                    .await
                    .unwrap_or_else(|err| err.payload(Some("adps_rejects"))),
            ),
            None => (Value::Null, Value::Null),
        };
        enriched.push(serde_json::json!({
            "account": account,
            "user": user,
            "pharm": pharm,
            "adpsRejects": rejects,
        }));
    }
    enriched
}
