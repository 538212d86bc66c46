//! Accessors for the loosely shaped records returned by the admin API.

use crate::utils::coerce::{int_like, scalar_text};
use serde_json::Value;

pub const PHARM_NAME_FIELD: &str = "약국명";
pub const OWNER_NAME_FIELD: &str = "displayName";
pub const AD_BLOCK_LABEL_FIELD: &str = "광고차단";

const BIZNO_KEYS: &[&str] = &["bizNO", "bizNo", "사업자등록번호"];
const ACCOUNT_ID_KEYS: &[&str] = &["id", "Id", "userId", "UserId", "accountId", "AccountId"];

const AD_BLOCKED_WORDS: &[&str] = &[
    "차단", "미표시", "blocked", "block", "hidden", "hide", "true", "yes", "y",
];
const AD_DISPLAYED_WORDS: &[&str] = &[
    "표시", "표시중", "displayed", "display", "shown", "show", "visible", "false", "no", "n",
];

/// Page items: `items`, falling back to `data`.
pub fn items_of(response: &Value) -> &[Value] {
    for key in ["items", "data"] {
        if let Some(items) = response.get(key).and_then(Value::as_array) {
            if !items.is_empty() {
                return items.as_slice();
            }
        }
    }
    &[]
}

/// Strips every non-digit; keeps the input when nothing is left.
pub fn normalize_bizno(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        raw.to_string()
    } else {
        digits
    }
}

fn first_text(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| item.get(*key).and_then(scalar_text))
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty())
}

pub fn text_field(item: &Value, key: &str) -> Option<String> {
    first_text(item, &[key])
}

pub fn bizno_of(item: &Value) -> Option<String> {
    first_text(item, BIZNO_KEYS).map(|raw| normalize_bizno(&raw))
}

pub fn account_id_of(item: &Value) -> Option<String> {
    first_text(item, ACCOUNT_ID_KEYS)
}

/// Decodes an ad-visibility label into the listing filter code:
/// `1` = blocked, `0` = displayed.
pub fn ad_label_code(label: &str) -> Option<i64> {
    let normalized = label.trim().to_lowercase();
    if AD_BLOCKED_WORDS.contains(&normalized.as_str()) {
        return Some(1);
    }
    if AD_DISPLAYED_WORDS.contains(&normalized.as_str()) {
        return Some(0);
    }
    None
}

/// Ad-block state of a listing record: numeric `isAdDisplay` first, then the label.
pub fn ad_display_code_of(item: &Value) -> Option<i64> {
    if let Some(code) = item
        .get("isAdDisplay")
        .and_then(int_like)
        .filter(|code| *code == 0 || *code == 1)
    {
        return Some(code);
    }
    item.get(AD_BLOCK_LABEL_FIELD)
        .and_then(scalar_text)
        .and_then(|label| ad_label_code(&label))
}

pub fn reported_total_pages(response: &Value) -> Option<i64> {
    response.get("totalPage").and_then(int_like)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_bizno_strips_separators() {
        assert_eq!(normalize_bizno("123-45-67890"), "1234567890");
        assert_eq!(normalize_bizno(" 123 45 67890 "), "1234567890");
    }

    #[test]
    fn normalize_bizno_keeps_input_without_digits() {
        assert_eq!(normalize_bizno(""), "");
        assert_eq!(normalize_bizno("n/a"), "n/a");
    }

    #[test]
    fn items_of_falls_back_to_data() {
        let response = json!({"items": [], "data": [{"id": 1}]});
        assert_eq!(items_of(&response).len(), 1);
        assert!(items_of(&json!({"totalCount": 0})).is_empty());
    }

    #[test]
    fn bizno_and_account_id_read_alternate_keys() {
        let item = json!({"사업자등록번호": "111-22-33333", "UserId": 77});
        assert_eq!(bizno_of(&item).as_deref(), Some("1112233333"));
        assert_eq!(account_id_of(&item).as_deref(), Some("77"));
    }

    #[test]
    fn ad_label_uses_blocked_as_one() {
        assert_eq!(ad_label_code("차단"), Some(1));
        assert_eq!(ad_label_code("미표시"), Some(1));
        assert_eq!(ad_label_code("표시중"), Some(0));
        assert_eq!(ad_label_code("?"), None);
        assert_eq!(ad_display_code_of(&json!({"isAdDisplay": "1"})), Some(1));
        assert_eq!(ad_display_code_of(&json!({"광고차단": "표시"})), Some(0));
    }
}
