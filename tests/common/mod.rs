#![allow(dead_code)]

use async_trait::async_trait;
use once_cell::sync::Lazy;
use pilldoc::app::App;
use pilldoc::errors::UpstreamError;
use pilldoc::services::pilldoc_client::{
    ConnectFailure, PilldocApi, PilldocConnector, StatisticsKind,
};
use pilldoc::services::settings::Settings;
use pilldoc::utils::filter_builder::CanonicalFilter;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

pub static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub fn not_found(message: &str) -> UpstreamError {
    UpstreamError::Status {
        status: 404,
        body: json!({ "message": message }),
    }
}

/// One listing page in the upstream shape.
pub fn page(items: Vec<Value>, total_page: i64) -> Value {
    json!({ "items": items, "totalPage": total_page, "totalCount": items.len() })
}

pub fn account(id: i64, name: &str, bizno: &str) -> Value {
    json!({ "id": id, "약국명": name, "bizNO": bizno, "displayName": format!("owner{}", id) })
}

/// In-memory admin API: canned responses by page or key, plus a call log.
#[derive(Default)]
pub struct FakeApi {
    pages: HashMap<i64, Result<Value, UpstreamError>>,
    users: HashMap<String, Result<Value, UpstreamError>>,
    pharms: HashMap<String, Result<Value, UpstreamError>>,
    rejects: HashMap<String, Result<Value, UpstreamError>>,
    statistics: Option<Value>,
    pub listed: StdMutex<Vec<CanonicalFilter>>,
    pub calls: StdMutex<Vec<String>>,
    pub updates: StdMutex<Vec<(String, Map<String, Value>)>>,
    pub queries: StdMutex<Vec<Vec<(String, String)>>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, number: i64, body: Value) -> Self {
        self.pages.insert(number, Ok(body));
        self
    }

    pub fn with_failing_page(mut self, number: i64, err: UpstreamError) -> Self {
        self.pages.insert(number, Err(err));
        self
    }

    pub fn with_user(mut self, id: &str, result: Result<Value, UpstreamError>) -> Self {
        self.users.insert(id.to_string(), result);
        self
    }

    pub fn with_pharm(mut self, bizno: &str, result: Result<Value, UpstreamError>) -> Self {
        self.pharms.insert(bizno.to_string(), result);
        self
    }

    pub fn with_rejects(mut self, bizno: &str, result: Result<Value, UpstreamError>) -> Self {
        self.rejects.insert(bizno.to_string(), result);
        self
    }

    pub fn with_statistics(mut self, body: Value) -> Self {
        self.statistics = Some(body);
        self
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn listed_filters(&self) -> Vec<CanonicalFilter> {
        self.listed.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.call_log().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

#[async_trait]
impl PilldocApi for FakeApi {
    async fn list_accounts(&self, filter: &CanonicalFilter) -> Result<Value, UpstreamError> {
        let number = filter.page.unwrap_or(1);
        self.record(format!("list:{}", number));
        if let Ok(mut listed) = self.listed.lock() {
            listed.push(filter.clone());
        }
        self.pages
            .get(&number)
            .cloned()
            .unwrap_or_else(|| Ok(page(Vec::new(), 0)))
    }

    async fn get_user(&self, account_id: &str) -> Result<Value, UpstreamError> {
        self.record(format!("user:{}", account_id));
        self.users
            .get(account_id)
            .cloned()
            .unwrap_or_else(|| Ok(json!({ "id": account_id })))
    }

    async fn get_pharm(&self, biz_no: &str) -> Result<Value, UpstreamError> {
        self.record(format!("pharm:{}", biz_no));
        self.pharms
            .get(biz_no)
            .cloned()
            .unwrap_or_else(|| Err(not_found("no such pharmacy")))
    }

    async fn get_rejected_campaigns(&self, biz_no: &str) -> Result<Value, UpstreamError> {
        self.record(format!("rejects:{}", biz_no));
        self.rejects
            .get(biz_no)
            .cloned()
            .unwrap_or_else(|| Ok(json!({ "data": [] })))
    }

    async fn reject_campaign(
        &self,
        biz_no: &str,
        campaign_id: i64,
        comment: Option<&str>,
    ) -> Result<Value, UpstreamError> {
        self.record(format!("reject:{}:{}", biz_no, campaign_id));
        Ok(json!({ "campaignId": campaign_id, "comment": comment }))
    }

    async fn update_account(
        &self,
        account_id: &str,
        body: &Map<String, Value>,
    ) -> Result<Value, UpstreamError> {
        self.record(format!("update:{}", account_id));
        if let Ok(mut updates) = self.updates.lock() {
            updates.push((account_id.to_string(), body.clone()));
        }
        Ok(json!({ "success": true }))
    }

    async fn get_statistics(
        &self,
        kind: StatisticsKind,
        query: &[(String, String)],
    ) -> Result<Value, UpstreamError> {
        self.record(format!("statistics:{:?}", kind));
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.to_vec());
        }
        self.statistics
            .clone()
            .ok_or_else(|| not_found("no statistics"))
    }
}

pub struct FakeConnector {
    pub api: Arc<FakeApi>,
}

#[async_trait]
impl PilldocConnector for FakeConnector {
    async fn connect(&self, _args: &Value) -> Result<Arc<dyn PilldocApi>, ConnectFailure> {
        Ok(self.api.clone())
    }
}

pub fn connector(api: &Arc<FakeApi>) -> Arc<dyn PilldocConnector> {
    Arc::new(FakeConnector { api: api.clone() })
}

pub fn empty_settings() -> Arc<Settings> {
    Arc::new(Settings::from_lookup(|_| None))
}

pub fn app_with(api: &Arc<FakeApi>) -> Arc<App> {
    Arc::new(App::with_connector(Settings::from_lookup(|_| None), connector(api)).expect("app"))
}
