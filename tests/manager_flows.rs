mod common;

use common::{account, connector, empty_settings, page, FakeApi};
use pilldoc::managers::accounts::AccountsManager;
use pilldoc::managers::campaigns::CampaignsManager;
use pilldoc::managers::pharmacy::PharmacyManager;
use pilldoc::managers::stats::StatsManager;
use pilldoc::services::logger::Logger;
use serde_json::json;
use std::sync::Arc;

fn accounts(api: &Arc<FakeApi>) -> AccountsManager {
    AccountsManager::new(Logger::new("test"), empty_settings(), connector(api))
}

fn pharmacy(api: &Arc<FakeApi>) -> PharmacyManager {
    PharmacyManager::new(Logger::new("test"), empty_settings(), connector(api))
}

fn two_happy_pharmacies() -> FakeApi {
    FakeApi::new().with_page(
        1,
        page(
            vec![
                account(11, "행복약국", "111-11-11111"),
                account(12, "행복약국", "222-22-22222"),
                account(13, "행복약국 본점", "333-33-33333"),
            ],
            1,
        ),
    )
}

#[tokio::test]
async fn update_by_search_rejects_an_out_of_range_index() {
    let api = Arc::new(two_happy_pharmacies());

    let out = accounts(&api)
        .handle_action(json!({
            "action": "update_by_search",
            "pharmName": "행복약국",
            "index": 5,
            "body": {"displayName": "김약사"},
        }))
        .await
        .expect("report");

    assert_eq!(out, json!({"error": "index out of range", "index": 5, "count": 2}));
    assert_eq!(api.count_calls("update:"), 0);
}

#[tokio::test]
async fn update_by_search_patches_the_selected_candidate() {
    let api = Arc::new(two_happy_pharmacies());

    let out = accounts(&api)
        .handle_action(json!({
            "action": "update_by_search",
            "pharmName": "행복약국",
            "index": 1,
            "body": {"대표자": "김약사", "isAdDisplay": true, "unknownField": 1},
        }))
        .await
        .expect("update");

    assert_eq!(out["accountId"], json!("12"));
    assert_eq!(out["candidates"], json!(2));
    assert_eq!(out["searchedPages"], json!(1));
    let updates = api.updates.lock().expect("updates").clone();
    assert_eq!(updates.len(), 1);
    let (id, body) = &updates[0];
    assert_eq!(id, "12");
    assert_eq!(body.get("displayName"), Some(&json!("김약사")));
    assert_eq!(body.get("adBlockYn"), Some(&json!("N")));
    assert!(!body.contains_key("unknownField"));

    let filters = api.listed_filters();
    assert_eq!(filters[0].search_keyword.as_deref(), Some("행복약국"));
    assert_eq!(filters[0].current_search_type, Some(vec!["s".to_string()]));
}

#[tokio::test]
async fn update_with_nothing_left_to_send_is_reported() {
    let api = Arc::new(FakeApi::new());

    let out = accounts(&api)
        .handle_action(json!({
            "action": "update",
            "accountId": "12",
            "body": {"favoriteColor": "blue"},
        }))
        .await
        .expect("report");

    assert_eq!(out["error"], json!("no updatable fields left after sanitization"));
    assert_eq!(out["sanitization"]["dropped"][0]["key"], json!("favoriteColor"));
    assert!(api.call_log().is_empty());
}

#[tokio::test]
async fn update_requires_a_body_object() {
    let api = Arc::new(FakeApi::new());

    let err = accounts(&api)
        .handle_action(json!({"action": "update", "accountId": "12", "body": "x"}))
        .await
        .expect_err("body must be an object");

    assert!(err.message.contains("body"));
}

#[tokio::test]
async fn compact_listing_keeps_only_requested_fields() {
    let api = Arc::new(FakeApi::new().with_page(
        1,
        json!({
            "totalCount": 2,
            "totalPage": 1,
            "nowPage": 1,
            "items": [
                {"id": 2, "bizNO": "222-22-22222", "isAdDisplay": 0, "약국명": "나"},
                {"id": 1, "bizNO": "111-11-11111", "광고차단": "차단", "약국명": "가"},
            ],
        }),
    ));

    let out = accounts(&api)
        .handle_action(json!({
            "action": "compact",
            "sortBy": "id",
            "includeAdBlockedBool": true,
        }))
        .await
        .expect("compact");

    assert_eq!(
        out,
        json!({
            "totalCount": 2,
            "totalPage": 1,
            "nowPage": 1,
            "count": 2,
            "items": [
                {"id": 1, "bizno": "11111111111", "isAdDisplay": 1},
                {"id": 2, "bizno": "22222222222", "isAdDisplay": 0},
            ],
        })
    );
}

#[tokio::test]
async fn user_from_accounts_selects_by_field() {
    let api = Arc::new(FakeApi::new().with_user("77", Ok(json!({"name": "kim"}))));

    let out = accounts(&api)
        .handle_action(json!({
            "action": "user_from_accounts",
            "accounts": {"items": [{"id": 76, "bizNO": "1"}, {"id": 77, "bizNO": "2"}]},
            "accountField": "bizNO",
            "accountValue": "2",
        }))
        .await
        .expect("user");

    assert_eq!(out, json!({"accountId": "77", "user": {"name": "kim"}}));
}

#[tokio::test]
async fn find_without_criteria_is_reported_without_calls() {
    let api = Arc::new(FakeApi::new());

    let out = pharmacy(&api)
        .handle_action(json!({"action": "find", "ownerName": "  "}))
        .await
        .expect("report");

    assert!(out["error"].as_str().unwrap_or("").contains("pharmName"));
    assert!(api.call_log().is_empty());
}

#[tokio::test]
async fn find_by_bizno_enriches_matches() {
    let api = Arc::new(
        FakeApi::new()
            .with_page(1, page(vec![account(5, "행복약국", "123-45-67890")], 1))
            .with_pharm("1234567890", Ok(json!({"data": {"약국명": "행복약국"}}))),
    );

    let out = pharmacy(&api)
        .handle_action(json!({"action": "find", "bizNo": "123 45 67890"}))
        .await
        .expect("find");

    assert_eq!(out["searchedPages"], json!(1));
    assert_eq!(out["matches"].as_array().map(Vec::len), Some(1));
    assert_eq!(out["matches"][0]["account"]["id"], json!(5));
    assert_eq!(out["matches"][0]["user"], json!({"id": "5"}));
    assert_eq!(out["matches"][0]["pharm"]["data"]["약국명"], json!("행복약국"));
    let filters = api.listed_filters();
    assert_eq!(filters[0].search_keyword.as_deref(), Some("1234567890"));
    assert_eq!(filters[0].current_search_type, Some(vec!["b".to_string()]));
}

#[tokio::test]
async fn find_defaults_to_exact_first_hit() {
    let api = Arc::new(two_happy_pharmacies());

    let out = pharmacy(&api)
        .handle_action(json!({"action": "find", "pharmName": "행복약국", "enrich": false}))
        .await
        .expect("find");

    let ids: Vec<_> = out["matches"]
        .as_array()
        .map(|matches| matches.iter().map(|m| m["id"].clone()).collect())
        .unwrap_or_default();
    assert_eq!(ids, vec![json!(11)]);
    assert_eq!(out["totalChecked"], json!(1));
}

#[tokio::test]
async fn find_can_opt_out_of_exact_matching() {
    let api = Arc::new(two_happy_pharmacies());

    let out = pharmacy(&api)
        .handle_action(json!({
            "action": "find",
            "pharmName": "행복약국",
            "exact": false,
            "enrich": false
        }))
        .await
        .expect("find");

    assert_eq!(out["matches"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn find_confirms_renamed_pharmacies_by_detail() {
    let api = Arc::new(
        FakeApi::new()
            .with_page(1, page(vec![account(8, "옛이름약국", "444-44-44444")], 1))
            .with_pharm("4444444444", Ok(json!({"data": {"약국명": "새이름약국"}}))),
    );

    let out = pharmacy(&api)
        .handle_action(json!({"action": "find", "pharmName": "새이름약국", "enrich": false}))
        .await
        .expect("find");

    assert_eq!(out["matches"][0]["id"], json!(8));
    assert_eq!(api.call_log(), vec!["list:1", "pharm:4444444444"]);
}

#[tokio::test]
async fn find_by_name_stops_at_first_exact_match() {
    let api = Arc::new(
        FakeApi::new()
            .with_page(1, page(vec![account(1, "행복약국", "1")], 4))
            .with_page(2, page(vec![account(2, "행복약국", "2")], 4)),
    );

    let out = pharmacy(&api)
        .handle_action(json!({"action": "find_by_name", "name": "행복약국"}))
        .await
        .expect("find_by_name");

    assert_eq!(out["matches"].as_array().map(Vec::len), Some(1));
    assert_eq!(api.count_calls("list:"), 1);
}

#[tokio::test]
async fn pharmacy_lookup_failure_carries_the_step() {
    let api = Arc::new(FakeApi::new());

    let out = pharmacy(&api)
        .handle_action(json!({"action": "get", "bizNo": "999"}))
        .await
        .expect("report");

    assert_eq!(out["step"], json!("pharm"));
    assert_eq!(out["status"], json!(404));
}

#[tokio::test]
async fn campaign_reject_validates_the_campaign_id() {
    let api = Arc::new(FakeApi::new());
    let manager = CampaignsManager::new(Logger::new("test"), connector(&api));

    let err = manager
        .handle_action(json!({"action": "reject", "bizNo": "1", "campaignId": 0}))
        .await
        .expect_err("campaignId must be positive");
    assert!(err.message.contains("campaignId"));

    let out = manager
        .handle_action(json!({"action": "reject", "bizNo": "12-3", "campaignId": 4, "comment": "no"}))
        .await
        .expect("reject");
    assert_eq!(out, json!({"campaignId": 4, "comment": "no"}));
    assert_eq!(api.call_log(), vec!["reject:123:4"]);
}

#[tokio::test]
async fn accounts_stats_walks_every_page() {
    let api = Arc::new(
        FakeApi::new()
            .with_page(
                1,
                json!({
                    "totalCount": 3,
                    "totalPage": 2,
                    "items": [
                        {"createdAt": "2024-01-03", "주소": "서울 중구", "erpCode": 2, "isAdDisplay": 1},
                        {"createdAt": "2024-02-10", "주소": "서울 마포구", "erpCode": 2, "isAdDisplay": 0},
                    ],
                }),
            )
            .with_page(
                2,
                json!({
                    "totalPage": 2,
                    "items": [{"createdAt": "2023-12-31", "주소": "부산 동구"}],
                }),
            ),
    );
    let manager = StatsManager::new(Logger::new("test"), connector(&api));

    let out = manager
        .handle_action(json!({"action": "accounts_stats"}))
        .await
        .expect("stats");

    assert_eq!(out["pagesFetched"], json!(2));
    assert_eq!(out["totalCountReported"], json!(3));
    assert_eq!(out["totalAccounts"], json!(3));
    assert_eq!(out["period"], json!({"from": "2023-12-31", "to": "2024-02-10"}));
    assert_eq!(
        out["stats"]["region"],
        json!([{"key": "부산", "count": 1}, {"key": "서울", "count": 2}])
    );
    assert_eq!(
        out["stats"]["erpCode"],
        json!([{"key": "2", "count": 2}, {"key": "null", "count": 1}])
    );
    assert_eq!(
        out["stats"]["adBlocked"],
        json!({"blocked": 1, "notBlocked": 1, "unknown": 1})
    );
    assert_eq!(api.listed_filters()[0].page_size, Some(200));
}

#[tokio::test]
async fn summary_splits_by_ad_display() {
    let api = Arc::new(FakeApi::new());
    let manager = StatsManager::new(Logger::new("test"), connector(&api));

    let out = manager
        .handle_action(json!({"action": "summary", "splitBy": "isAdDisplay"}))
        .await
        .expect("summary");

    assert_eq!(out, json!({"countDisplayed": 0, "countBlocked": 0}));
    let codes: Vec<Option<i64>> = api.listed_filters().iter().map(|f| f.is_ad_display).collect();
    assert_eq!(codes, vec![Some(0), Some(1)]);
}

#[tokio::test]
async fn summary_rejects_unknown_metrics_and_groupings() {
    let api = Arc::new(FakeApi::new());
    let manager = StatsManager::new(Logger::new("test"), connector(&api));

    let out = manager
        .handle_action(json!({"action": "summary", "metric": "sum"}))
        .await
        .expect("report");
    assert_eq!(out, json!({"error": "unsupported_metric", "metric": "sum"}));

    let out = manager
        .handle_action(json!({"action": "summary", "groupBy": "region"}))
        .await
        .expect("report");
    assert_eq!(out["error"], json!("unsupported_groupBy"));
    assert!(api.call_log().is_empty());
}

#[tokio::test]
async fn summary_by_month_issues_one_count_per_month() {
    let api = Arc::new(FakeApi::new());
    let manager = StatsManager::new(Logger::new("test"), connector(&api));

    let out = manager
        .handle_action(json!({"action": "summary", "groupBy": "month", "year": 2024}))
        .await
        .expect("monthly");

    let monthly = out["monthly"].as_array().cloned().unwrap_or_default();
    assert_eq!(monthly.len(), 12);
    assert_eq!(monthly[0], json!({"month": "2024-01", "count": 0}));
    assert_eq!(monthly[11]["month"], json!("2024-12"));
    let filters = api.listed_filters();
    assert_eq!(filters[4].year, Some(2024));
    assert_eq!(filters[4].month, Some(5));
}

#[tokio::test]
async fn region_statistics_summary_keeps_the_top_entries() {
    let data: Vec<_> = (1..=12)
        .map(|i| json!({"name": format!("r{}", i), "printCount": i * 10, "pharmacyCount": 1}))
        .collect();
    let api = Arc::new(FakeApi::new().with_statistics(json!({"success": true, "data": data})));
    let manager = StatsManager::new(Logger::new("test"), connector(&api));

    let out = manager
        .handle_action(json!({
            "action": "region",
            "startDate": "2024-01-01",
            "summaryOnly": true,
        }))
        .await
        .expect("region");

    assert_eq!(out["data"].as_array().map(Vec::len), Some(10));
    assert_eq!(out["data"][0]["name"], json!("r12"));
    assert_eq!(out["summary"]["totalItems"], json!(12));
    assert_eq!(out["summary"]["totalPrintCount"], json!(780));
    let queries = api.queries.lock().expect("queries").clone();
    assert_eq!(
        queries[0],
        vec![
            ("StartDate".to_string(), "2024-01-01".to_string()),
            ("GroupBy".to_string(), "sigungu".to_string()),
        ]
    );
}

#[tokio::test]
async fn erp_statistics_truncate_to_max_items() {
    let api = Arc::new(FakeApi::new().with_statistics(json!({"data": [1, 2, 3, 4]})));
    let manager = StatsManager::new(Logger::new("test"), connector(&api));

    let out = manager
        .handle_action(json!({"action": "erp", "maxItems": 3}))
        .await
        .expect("erp");

    assert_eq!(out["data"], json!([1, 2, 3]));
    assert_eq!(out["truncated"], json!({"totalItems": 4, "showing": 3}));
}
