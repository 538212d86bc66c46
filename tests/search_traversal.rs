mod common;

use common::{account, not_found, page, FakeApi};
use pilldoc::services::search::{
    enrich_matches, search_accounts, MatchCriteria, MatchMode, SearchOptions,
};
use pilldoc::utils::filter_builder::build_search_filter;
use serde_json::json;
use std::time::Duration;

fn by_name(name: &str) -> MatchCriteria {
    MatchCriteria::new(Some(name.to_string()), None, None)
}

fn filter() -> pilldoc::utils::filter_builder::CanonicalFilter {
    build_search_filter(Some("약국"), vec!["s".to_string()], 100)
}

#[tokio::test]
async fn single_page_without_hits_reports_what_was_checked() {
    let items = (1..=10)
        .map(|i| account(i, &format!("다른약국{}", i), "1112233333"))
        .collect();
    let api = FakeApi::new().with_page(1, page(items, 1));

    let found = search_accounts(&api, &filter(), &by_name("행복약국"), &SearchOptions::default())
        .await
        .expect("search");

    assert_eq!(
        serde_json::to_value(&found).expect("serialize"),
        json!({"matches": [], "searchedPages": 1, "totalChecked": 10})
    );
    assert_eq!(api.count_calls("list:"), 1);
}

#[tokio::test]
async fn empty_second_page_ends_the_walk_without_counting_it() {
    let items = (1..=10)
        .map(|i| account(i, &format!("다른약국{}", i), "1112233333"))
        .collect();
    let api = FakeApi::new()
        .with_page(1, page(items, 2))
        .with_page(2, page(vec![], 2));

    let found = search_accounts(&api, &filter(), &by_name("행복약국"), &SearchOptions::default())
        .await
        .expect("search");

    assert_eq!(
        serde_json::to_value(&found).expect("serialize"),
        json!({"matches": [], "searchedPages": 1, "totalChecked": 10})
    );
    assert_eq!(api.call_log(), vec!["list:1", "list:2"]);
}

#[tokio::test]
async fn empty_first_page_stops_without_counting_it() {
    let api = FakeApi::new().with_page(1, page(vec![], 5));

    let found = search_accounts(&api, &filter(), &by_name("행복약국"), &SearchOptions::default())
        .await
        .expect("search");

    assert_eq!(found.searched_pages, 0);
    assert_eq!(found.total_checked, 0);
    assert_eq!(api.call_log(), vec!["list:1"]);
}

#[tokio::test]
async fn stop_on_first_ends_the_walk_at_the_first_exact_hit() {
    let api = FakeApi::new()
        .with_page(
            1,
            page(
                vec![
                    account(1, "다른약국", "1"),
                    account(2, "행복약국", "2"),
                    account(3, "행복약국", "3"),
                ],
                5,
            ),
        )
        .with_page(2, page(vec![account(4, "행복약국", "4")], 5));
    let options = SearchOptions {
        exact: true,
        stop_on_first: true,
        ..SearchOptions::default()
    };

    let found = search_accounts(&api, &filter(), &by_name("행복약국"), &options)
        .await
        .expect("search");

    assert_eq!(found.matches.len(), 1);
    assert_eq!(found.matches[0]["id"], json!(2));
    assert_eq!(found.total_checked, 2);
    assert_eq!(found.searched_pages, 1);
    assert_eq!(api.count_calls("list:"), 1);
}

#[tokio::test]
async fn page_cap_limits_listing_calls() {
    let mut api = FakeApi::new();
    for number in 1..=7 {
        api = api.with_page(number, page(vec![account(number, "약국", "1")], 7));
    }
    let options = SearchOptions {
        max_pages: 3,
        ..SearchOptions::default()
    };

    let found = search_accounts(&api, &filter(), &by_name("없는약국"), &options)
        .await
        .expect("search");

    assert_eq!(found.searched_pages, 3);
    assert_eq!(api.call_log(), vec!["list:1", "list:2", "list:3"]);
    let pages: Vec<Option<i64>> = api.listed_filters().iter().map(|f| f.page).collect();
    assert_eq!(pages, vec![Some(1), Some(2), Some(3)]);
}

#[tokio::test]
async fn reported_total_bounds_the_walk_when_uncapped() {
    let api = FakeApi::new()
        .with_page(1, page(vec![account(1, "약국", "1")], 2))
        .with_page(2, page(vec![account(2, "약국", "2")], 9))
        .with_page(3, page(vec![account(3, "약국", "3")], 9));

    let found = search_accounts(&api, &filter(), &by_name("약국"), &SearchOptions::default())
        .await
        .expect("search");

    assert_eq!(found.matches.len(), 2);
    assert_eq!(api.count_calls("list:"), 2);
}

#[tokio::test]
async fn stale_listing_name_is_confirmed_by_the_detail_record() {
    let api = FakeApi::new()
        .with_page(1, page(vec![account(9, "옛이름약국", "123-45-67890")], 1))
        .with_pharm("1234567890", Ok(json!({"data": {"약국명": "새이름약국"}})));
    let options = SearchOptions {
        exact: true,
        use_pharm_detail: true,
        ..SearchOptions::default()
    };

    let found = search_accounts(&api, &filter(), &by_name("새이름약국"), &options)
        .await
        .expect("search");

    assert_eq!(found.matches.len(), 1);
    assert_eq!(found.matches[0]["id"], json!(9));
    assert!(found.detail_failures.is_empty());
    assert_eq!(api.count_calls("pharm:1234567890"), 1);
}

#[tokio::test]
async fn detail_lookup_failures_are_kept_and_the_walk_continues() {
    let api = FakeApi::new().with_page(
        1,
        page(
            vec![account(1, "옛이름약국", "111"), account(2, "새이름약국", "222")],
            1,
        ),
    );
    let options = SearchOptions {
        exact: true,
        use_pharm_detail: true,
        ..SearchOptions::default()
    };

    let found = search_accounts(&api, &filter(), &by_name("새이름약국"), &options)
        .await
        .expect("search");

    assert_eq!(found.matches.len(), 1);
    assert_eq!(found.detail_failures.len(), 1);
    let value = serde_json::to_value(&found).expect("serialize");
    assert_eq!(value["detailFailures"][0]["bizNo"], json!("111"));
    assert_eq!(value["detailFailures"][0]["error"]["step"], json!("pharm"));
    assert_eq!(value["detailFailures"][0]["error"]["status"], json!(404));
}

#[tokio::test]
async fn detail_lookup_is_skipped_when_not_exact() {
    let api = FakeApi::new().with_page(1, page(vec![account(1, "옛이름약국", "111")], 1));
    let options = SearchOptions {
        use_pharm_detail: true,
        ..SearchOptions::default()
    };

    let found = search_accounts(&api, &filter(), &by_name("새이름"), &options)
        .await
        .expect("search");

    assert!(found.matches.is_empty());
    assert_eq!(api.count_calls("pharm:"), 0);
}

#[tokio::test]
async fn exhausted_budget_stops_between_pages() {
    let api = FakeApi::new()
        .with_page(1, page(vec![account(1, "행복약국", "1")], 4))
        .with_page(2, page(vec![account(2, "행복약국", "2")], 4));
    let options = SearchOptions {
        budget: Some(Duration::ZERO),
        ..SearchOptions::default()
    };

    let found = search_accounts(&api, &filter(), &by_name("행복약국"), &options)
        .await
        .expect("search");

    assert!(found.budget_exhausted);
    assert_eq!(found.searched_pages, 1);
    assert_eq!(found.matches.len(), 1);
    let value = serde_json::to_value(&found).expect("serialize");
    assert_eq!(value["budgetExhausted"], json!(true));
}

#[tokio::test]
async fn listing_failure_reports_the_failing_page() {
    let api = FakeApi::new()
        .with_page(1, page(vec![account(1, "약국", "1")], 3))
        .with_failing_page(2, not_found("gone"));

    let failure = search_accounts(&api, &filter(), &by_name("약국"), &SearchOptions::default())
        .await
        .expect_err("page 2 fails");

    assert_eq!(failure.page, 2);
    let payload = failure.payload();
    assert_eq!(payload["step"], json!("list_accounts"));
    assert_eq!(payload["page"], json!(2));
    assert_eq!(payload["status"], json!(404));
    assert_eq!(payload["body"], json!({"message": "gone"}));
}

#[tokio::test]
async fn keyword_mode_without_criteria_takes_every_record() {
    let api = FakeApi::new().with_page(
        1,
        page(vec![account(1, "가", "1"), json!("not a record"), account(2, "나", "2")], 1),
    );
    let options = SearchOptions {
        mode: MatchMode::Keyword,
        ..SearchOptions::default()
    };

    let found = search_accounts(&api, &filter(), &MatchCriteria::default(), &options)
        .await
        .expect("search");

    assert_eq!(found.matches.len(), 2);
    assert_eq!(found.total_checked, 2);
}

#[tokio::test]
async fn enrichment_records_failures_in_place() {
    let api = FakeApi::new()
        .with_user("7", Err(not_found("no user")))
        .with_pharm("1234567890", Ok(json!({"data": {"약국명": "행복약국"}})));

    let enriched = enrich_matches(&api, vec![account(7, "행복약국", "123-45-67890")]).await;

    assert_eq!(enriched.len(), 1);
    let entry = &enriched[0];
    assert_eq!(entry["account"]["id"], json!(7));
    assert_eq!(entry["user"]["step"], json!("user"));
    assert_eq!(entry["user"]["status"], json!(404));
    assert_eq!(entry["pharm"]["data"]["약국명"], json!("행복약국"));
    assert_eq!(entry["adpsRejects"], json!({"data": []}));
}

#[tokio::test]
async fn keyword_search_by_name_skips_nameless_records() {
    let api = FakeApi::new().with_page(
        1,
        page(
            vec![
                json!({"id": 1, "약국명": "", "bizNO": "1"}),
                json!({"id": 2, "bizNO": "2"}),
                account(3, "행복약국", "3"),
            ],
            1,
        ),
    );
    let options = SearchOptions {
        mode: MatchMode::Keyword,
        ..SearchOptions::default()
    };

    let found = search_accounts(&api, &filter(), &by_name("행복약국"), &options)
        .await
        .expect("search");

    assert_eq!(found.total_checked, 1);
    assert_eq!(found.matches.len(), 1);
    assert_eq!(found.matches[0]["id"], json!(3));
}
