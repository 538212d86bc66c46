use crate::constants::pagination::MAX_PAGE_SIZE;
use crate::utils::coerce::scalar_text;
use crate::utils::filter_params::{keys, NormalizedParams};
use serde::Serialize;
use serde_json::Value;

/// Body of `POST /v1/pilldoc/accounts`. Absent filters are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub erp_kind: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_ad_display: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales_channel: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pharm_chain: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_search_type: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<i64>,
}

impl CanonicalFilter {
    pub fn with_page(&self, page: i64) -> Self {
        Self {
            page: Some(page.max(1)),
            ..self.clone()
        }
    }

    pub fn with_page_size(&self, page_size: i64) -> Self {
        Self {
            page_size: Some(page_size.clamp(1, MAX_PAGE_SIZE)),
            ..self.clone()
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

/// Individually named listing filters. `page_no` and `page_count` are legacy
/// spellings consulted only when the modern field is absent; `ad_blocked` is
/// consulted only when `is_ad_display` is absent.
///
/// `from_params` leaves those three unset: the parameter normalizer has
/// already folded them into `page`, `page_size` and `is_ad_display`. They are
/// for callers that build the args by hand.
#[derive(Debug, Clone, Default)]
pub struct AccountFilterArgs {
    pub page: Option<i64>,
    pub page_no: Option<i64>,
    pub page_size: Option<i64>,
    pub page_count: Option<i64>,
    pub sort_by: Option<String>,
    pub erp_kind: Option<Vec<Value>>,
    pub is_ad_display: Option<i64>,
    pub ad_blocked: Option<bool>,
    pub sales_channel: Option<Vec<Value>>,
    pub pharm_chain: Option<Vec<Value>>,
    pub current_search_type: Option<Vec<String>>,
    pub search_keyword: Option<String>,
    pub account_type: Option<String>,
}

impl AccountFilterArgs {
    pub fn from_params(params: &NormalizedParams) -> Self {
        Self {
            page: params.int(keys::PAGE),
            page_size: params.int(keys::PAGE_SIZE),
            sort_by: params.text(keys::SORT_BY),
            erp_kind: params.list(keys::ERP_KIND),
            is_ad_display: params.int(keys::IS_AD_DISPLAY),
            sales_channel: params.list(keys::SALES_CHANNEL),
            pharm_chain: params.list(keys::PHARM_CHAIN),
            current_search_type: params.list(keys::CURRENT_SEARCH_TYPE).map(|codes| {
                codes
                    .iter()
                    .filter_map(scalar_text)
                    .filter(|code| !code.trim().is_empty())
                    .collect()
            }),
            search_keyword: params.text(keys::SEARCH_KEYWORD),
            account_type: params.text(keys::ACCOUNT_TYPE),
            ..Self::default()
        }
    }
}

pub fn build_account_filter(args: &AccountFilterArgs) -> CanonicalFilter {
    let is_ad_display = args
        .is_ad_display
        .filter(|code| *code == 0 || *code == 1)
        .or_else(|| args.ad_blocked.map(i64::from));
    CanonicalFilter {
        page: args.page.or(args.page_no).map(|page| page.max(1)),
        page_size: args
            .page_size
            .or(args.page_count)
            .map(|size| size.clamp(1, MAX_PAGE_SIZE)),
        sort_by: args.sort_by.clone(),
        erp_kind: args.erp_kind.clone(),
        is_ad_display,
        sales_channel: args.sales_channel.clone(),
        pharm_chain: args.pharm_chain.clone(),
        current_search_type: args.current_search_type.clone(),
        search_keyword: args.search_keyword.clone(),
        account_type: args.account_type.clone(),
        year: None,
        month: None,
    }
}

/// First page of a keyword search.
pub fn build_search_filter(
    keyword: Option<&str>,
    search_types: Vec<String>,
    page_size: i64,
) -> CanonicalFilter {
    CanonicalFilter {
        page: Some(1),
        page_size: Some(page_size.clamp(1, MAX_PAGE_SIZE)),
        search_keyword: keyword
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string),
        current_search_type: if search_types.is_empty() {
            None
        } else {
            Some(search_types)
        },
        ..CanonicalFilter::default()
    }
}
