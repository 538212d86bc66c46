//! Reduces caller-supplied filter parameters to canonical keys and shapes.
//!
//! Keys are resolved through a static alias table. When several raw keys land
//! on the same canonical key, aliases are applied first (in map order) and the
//! canonical spelling last, so the last write wins and an explicit canonical
//! key always beats its aliases. Coercion never fails: bad values fall back to
//! a default or are dropped, and every such decision is recorded.

use crate::constants::pagination::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::utils::coerce::{bool_like, int_like, scalar_text};
use crate::utils::records::ad_label_code;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub mod keys {
    pub const PAGE: &str = "page";
    pub const PAGE_SIZE: &str = "pageSize";
    pub const SORT_BY: &str = "sortBy";
    pub const ERP_KIND: &str = "erpKind";
    pub const IS_AD_DISPLAY: &str = "isAdDisplay";
    pub const AD_BLOCKED: &str = "adBlocked";
    pub const SALES_CHANNEL: &str = "salesChannel";
    pub const PHARM_CHAIN: &str = "pharmChain";
    pub const CURRENT_SEARCH_TYPE: &str = "currentSearchType";
    pub const SEARCH_KEYWORD: &str = "searchKeyword";
    pub const ACCOUNT_TYPE: &str = "accountType";
    pub const MAX_PAGES: &str = "maxPages";
    pub const STOP_ON_FIRST: &str = "stopOnFirst";
    pub const USE_PHARM_DETAIL: &str = "usePharmDetail";
    pub const EXACT: &str = "exact";
    pub const PHARM_NAME: &str = "pharmName";
    pub const OWNER_NAME: &str = "ownerName";
    pub const BIZ_NO: &str = "bizNo";
    pub const ENFORCE_SORT_LOCAL: &str = "enforceSortLocal";
    pub const BUDGET_MS: &str = "budgetMs";
}

const PARAM_ALIASES: &[(&str, &str)] = &[
    ("page_no", keys::PAGE),
    ("pageNo", keys::PAGE),
    ("page_num", keys::PAGE),
    ("pageNum", keys::PAGE),
    ("page_number", keys::PAGE),
    ("pageNumber", keys::PAGE),
    ("페이지", keys::PAGE),
    ("페이지번호", keys::PAGE),
    ("page_size", keys::PAGE_SIZE),
    ("page_count", keys::PAGE_SIZE),
    ("pageCount", keys::PAGE_SIZE),
    ("size", keys::PAGE_SIZE),
    ("limit", keys::PAGE_SIZE),
    ("per_page", keys::PAGE_SIZE),
    ("perPage", keys::PAGE_SIZE),
    ("페이지크기", keys::PAGE_SIZE),
    ("페이지당", keys::PAGE_SIZE),
    ("sort_by", keys::SORT_BY),
    ("sort", keys::SORT_BY),
    ("order_by", keys::SORT_BY),
    ("orderBy", keys::SORT_BY),
    ("정렬", keys::SORT_BY),
    ("erp_kind", keys::ERP_KIND),
    ("erpKinds", keys::ERP_KIND),
    ("erp", keys::ERP_KIND),
    ("ERP", keys::ERP_KIND),
    ("is_ad_display", keys::IS_AD_DISPLAY),
    ("adDisplay", keys::IS_AD_DISPLAY),
    ("ad_display", keys::IS_AD_DISPLAY),
    ("광고표시", keys::IS_AD_DISPLAY),
    ("ad_blocked", keys::AD_BLOCKED),
    ("adBlock", keys::AD_BLOCKED),
    ("광고차단", keys::AD_BLOCKED),
    ("sales_channel", keys::SALES_CHANNEL),
    ("salesChannels", keys::SALES_CHANNEL),
    ("channel", keys::SALES_CHANNEL),
    ("판매채널", keys::SALES_CHANNEL),
    ("채널", keys::SALES_CHANNEL),
    ("pharm_chain", keys::PHARM_CHAIN),
    ("pharmChains", keys::PHARM_CHAIN),
    ("chain", keys::PHARM_CHAIN),
    ("체인", keys::PHARM_CHAIN),
    ("약국체인", keys::PHARM_CHAIN),
    ("current_search_type", keys::CURRENT_SEARCH_TYPE),
    ("searchType", keys::CURRENT_SEARCH_TYPE),
    ("search_type", keys::CURRENT_SEARCH_TYPE),
    ("검색유형", keys::CURRENT_SEARCH_TYPE),
    ("search_keyword", keys::SEARCH_KEYWORD),
    ("keyword", keys::SEARCH_KEYWORD),
    ("search", keys::SEARCH_KEYWORD),
    ("query", keys::SEARCH_KEYWORD),
    ("q", keys::SEARCH_KEYWORD),
    ("검색어", keys::SEARCH_KEYWORD),
    ("키워드", keys::SEARCH_KEYWORD),
    ("account_type", keys::ACCOUNT_TYPE),
    ("계정유형", keys::ACCOUNT_TYPE),
    ("max_pages", keys::MAX_PAGES),
    ("최대페이지", keys::MAX_PAGES),
    ("stop_on_first", keys::STOP_ON_FIRST),
    ("use_pharm_detail", keys::USE_PHARM_DETAIL),
    ("useDetail", keys::USE_PHARM_DETAIL),
    ("exactMatch", keys::EXACT),
    ("exact_match", keys::EXACT),
    ("정확일치", keys::EXACT),
    ("pharm_name", keys::PHARM_NAME),
    ("pharmacy", keys::PHARM_NAME),
    ("pharmacyName", keys::PHARM_NAME),
    ("pharmacy_name", keys::PHARM_NAME),
    ("약국명", keys::PHARM_NAME),
    ("owner_name", keys::OWNER_NAME),
    ("displayName", keys::OWNER_NAME),
    ("display_name", keys::OWNER_NAME),
    ("약국장", keys::OWNER_NAME),
    ("대표자", keys::OWNER_NAME),
    ("biz_no", keys::BIZ_NO),
    ("bizno", keys::BIZ_NO),
    ("bizNO", keys::BIZ_NO),
    ("businessNumber", keys::BIZ_NO),
    ("사업자번호", keys::BIZ_NO),
    ("사업자등록번호", keys::BIZ_NO),
    ("enforce_sort_local", keys::ENFORCE_SORT_LOCAL),
    ("localSort", keys::ENFORCE_SORT_LOCAL),
    ("budget_ms", keys::BUDGET_MS),
];

static PARAM_ALIAS_MAP: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| PARAM_ALIASES.iter().copied().collect());

const LIST_FIELDS: &[&str] = &[keys::ERP_KIND, keys::SALES_CHANNEL, keys::PHARM_CHAIN];
const FLAG_FIELDS: &[&str] = &[
    keys::STOP_ON_FIRST,
    keys::USE_PHARM_DETAIL,
    keys::EXACT,
    keys::ENFORCE_SORT_LOCAL,
];
const TEXT_FIELDS: &[&str] = &[
    keys::SORT_BY,
    keys::SEARCH_KEYWORD,
    keys::ACCOUNT_TYPE,
    keys::PHARM_NAME,
    keys::OWNER_NAME,
    keys::BIZ_NO,
];
const MAX_SHORT_CODE_LEN: usize = 4;

pub fn param_aliases() -> &'static [(&'static str, &'static str)] {
    PARAM_ALIASES
}

pub fn canonical_param_name(key: &str) -> &str {
    PARAM_ALIAS_MAP.get(key).copied().unwrap_or(key)
}

#[derive(Debug, Default, Clone)]
struct NormalizationState {
    renamed: Vec<Value>,
    converted: Vec<Value>,
    dropped: Vec<Value>,
}

impl NormalizationState {
    fn convert(&mut self, key: &str, from: &Value, to: &Value) {
        if from != to {
            self.converted.push(serde_json::json!({"key": key, "from": from, "to": to}));
        }
    }

    fn discard(&mut self, key: &str, value: &Value, reason: &str) {
        self.dropped
            .push(serde_json::json!({"key": key, "value": value, "reason": reason}));
    }

    fn compact(&self) -> Option<Value> {
        let mut out = Map::new();
        if !self.renamed.is_empty() {
            out.insert("renamed".to_string(), Value::Array(self.renamed.clone()));
        }
        if !self.converted.is_empty() {
            out.insert("converted".to_string(), Value::Array(self.converted.clone()));
        }
        if !self.dropped.is_empty() {
            out.insert("dropped".to_string(), Value::Array(self.dropped.clone()));
        }
        if out.is_empty() {
            None
        } else {
            Some(Value::Object(out))
        }
    }
}

/// Canonical parameter mapping plus the coercion diagnostics that produced it.
#[derive(Debug, Clone)]
pub struct NormalizedParams {
    pub params: Map<String, Value>,
    state: NormalizationState,
}

impl NormalizedParams {
    pub fn diagnostics(&self) -> Option<Value> {
        self.state.compact()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Trimmed, non-empty text.
    pub fn text(&self, key: &str) -> Option<String> {
        self.params
            .get(key)
            .and_then(scalar_text)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        self.params.get(key).and_then(int_like)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.params.get(key).and_then(bool_like)
    }

    pub fn list(&self, key: &str) -> Option<Vec<Value>> {
        self.params.get(key).and_then(Value::as_array).cloned()
    }
}

/// Listing-filter polarity: `1` = blocked, `0` = displayed. `true` means blocked.
pub fn ad_display_filter_code(value: &Value) -> Option<i64> {
    match value {
        Value::Bool(flag) => Some(i64::from(*flag)),
        Value::Number(_) => int_like(value).filter(|code| *code == 0 || *code == 1),
        Value::String(text) => match text.trim() {
            "0" => Some(0),
            "1" => Some(1),
            other => ad_label_code(other),
        },
        _ => None,
    }
}

fn is_short_code(text: &str) -> bool {
    let count = text.chars().count();
    count > 0 && count <= MAX_SHORT_CODE_LEN && text.chars().all(|c| c.is_ascii_alphabetic())
}

fn search_type_codes(value: &Value) -> Value {
    match value {
        Value::Array(_) => value.clone(),
        Value::String(text) => {
            let trimmed = text.trim();
            if is_short_code(trimmed) {
                Value::Array(
                    trimmed
                        .chars()
                        .map(|c| Value::String(c.to_string()))
                        .collect(),
                )
            } else {
                Value::Array(vec![Value::String(trimmed.to_string())])
            }
        }
        other => Value::Array(vec![other.clone()]),
    }
}

fn resolve_keys(raw: &Map<String, Value>, state: &mut NormalizationState) -> Map<String, Value> {
    let (aliased, direct): (Vec<_>, Vec<_>) = raw
        .iter()
        .filter(|(_, value)| !value.is_null())
        .partition(|(key, _)| canonical_param_name(key) != key.as_str());

    let mut out = Map::new();
    for (key, value) in aliased.into_iter().chain(direct) {
        let canonical = canonical_param_name(key);
        if canonical != key.as_str() {
            state
                .renamed
                .push(serde_json::json!({"from": key, "to": canonical}));
        }
        if let Some(previous) = out.insert(canonical.to_string(), value.clone()) {
            state.discard(canonical, &previous, "superseded");
        }
    }
    out
}

fn coerce_paging(out: &mut Map<String, Value>, state: &mut NormalizationState) {
    if let Some(raw) = out.get(keys::PAGE_SIZE).cloned() {
        let size = int_like(&raw)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let coerced = Value::from(size);
        state.convert(keys::PAGE_SIZE, &raw, &coerced);
        out.insert(keys::PAGE_SIZE.to_string(), coerced);
    }
    if let Some(raw) = out.get(keys::PAGE).cloned() {
        let page = int_like(&raw).unwrap_or(DEFAULT_PAGE).max(1);
        let coerced = Value::from(page);
        state.convert(keys::PAGE, &raw, &coerced);
        out.insert(keys::PAGE.to_string(), coerced);
    }
    if let Some(raw) = out.get(keys::MAX_PAGES).cloned() {
        match int_like(&raw) {
            Some(pages) => {
                let coerced = Value::from(pages.max(0));
                state.convert(keys::MAX_PAGES, &raw, &coerced);
                out.insert(keys::MAX_PAGES.to_string(), coerced);
            }
            None => {
                out.remove(keys::MAX_PAGES);
                state.discard(keys::MAX_PAGES, &raw, "not_an_integer");
            }
        }
    }
}

fn coerce_ad_flags(out: &mut Map<String, Value>, state: &mut NormalizationState) {
    if let Some(raw) = out.get(keys::IS_AD_DISPLAY).cloned() {
        match ad_display_filter_code(&raw) {
            Some(code) => {
                let coerced = Value::from(code);
                state.convert(keys::IS_AD_DISPLAY, &raw, &coerced);
                out.insert(keys::IS_AD_DISPLAY.to_string(), coerced);
            }
            None => {
                out.remove(keys::IS_AD_DISPLAY);
                state.discard(keys::IS_AD_DISPLAY, &raw, "unrecognized_ad_display");
            }
        }
    }
    if let Some(raw) = out.remove(keys::AD_BLOCKED) {
        if out.contains_key(keys::IS_AD_DISPLAY) {
            state.discard(keys::AD_BLOCKED, &raw, "superseded");
            return;
        }
        let code = bool_like(&raw)
            .map(i64::from)
            .or_else(|| scalar_text(&raw).and_then(|text| ad_label_code(&text)));
        match code {
            Some(code) => {
                let coerced = Value::from(code);
                let target = keys::IS_AD_DISPLAY;
                state.converted.push(serde_json::json!({
                    "key": keys::AD_BLOCKED,
                    "from": raw,
                    "to": { target: coerced },
                }));
                out.insert(keys::IS_AD_DISPLAY.to_string(), coerced);
            }
            None => state.discard(keys::AD_BLOCKED, &raw, "unrecognized_ad_blocked"),
        }
    }
}

fn coerce_shapes(out: &mut Map<String, Value>, state: &mut NormalizationState) {
    for key in LIST_FIELDS {
        if let Some(raw) = out.get(*key).cloned() {
            if !raw.is_array() {
                let wrapped = Value::Array(vec![raw.clone()]);
                state.convert(key, &raw, &wrapped);
                out.insert(key.to_string(), wrapped);
            }
        }
    }
    if let Some(raw) = out.get(keys::CURRENT_SEARCH_TYPE).cloned() {
        let codes = search_type_codes(&raw);
        state.convert(keys::CURRENT_SEARCH_TYPE, &raw, &codes);
        out.insert(keys::CURRENT_SEARCH_TYPE.to_string(), codes);
    }
    for key in FLAG_FIELDS {
        if let Some(raw) = out.get(*key).cloned() {
            match bool_like(&raw) {
                Some(flag) => {
                    let coerced = Value::Bool(flag);
                    state.convert(key, &raw, &coerced);
                    out.insert(key.to_string(), coerced);
                }
                None => {
                    out.remove(*key);
                    state.discard(key, &raw, "not_a_boolean");
                }
            }
        }
    }
    for key in TEXT_FIELDS {
        if let Some(raw) = out.get(*key).cloned() {
            match scalar_text(&raw) {
                Some(text) => {
                    let coerced = Value::String(text);
                    state.convert(key, &raw, &coerced);
                    out.insert(key.to_string(), coerced);
                }
                None => {
                    out.remove(*key);
                    state.discard(key, &raw, "not_a_scalar");
                }
            }
        }
    }
}

pub fn normalize_filter_params(raw: &Map<String, Value>) -> NormalizedParams {
    let mut state = NormalizationState::default();
    let mut params = resolve_keys(raw, &mut state);
    coerce_paging(&mut params, &mut state);
    coerce_ad_flags(&mut params, &mut state);
    coerce_shapes(&mut params, &mut state);
    NormalizedParams { params, state }
}

/// Convenience for tool arguments that arrive as a JSON value.
pub fn normalize_filter_value(args: &Value) -> NormalizedParams {
    match args.as_object() {
        Some(map) => normalize_filter_params(map),
        None => normalize_filter_params(&Map::new()),
    }
}
