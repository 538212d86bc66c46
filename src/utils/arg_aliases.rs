//! Tool-level argument sugar: action aliases and connection/identity key
//! renames applied before schema validation. Filter keys are handled later by
//! `filter_params`, per action.

use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Default)]
struct NormalizationState {
    renamed: Vec<Value>,
    converted: Vec<Value>,
    ignored: Vec<Value>,
}

const ACCOUNT_ACTION_ALIASES: &[(&str, &str)] = &[
    ("search", "list"),
    ("accounts", "list"),
    ("summary", "compact"),
    ("slim", "compact"),
    ("detail", "user"),
    ("get_user", "user"),
    ("user_detail", "user"),
    ("pick_user", "user_from_accounts"),
    ("patch", "update"),
    ("edit", "update"),
    ("update_account", "update"),
    ("find_and_update", "update_by_search"),
    ("search_and_update", "update_by_search"),
];

const PHARMACY_ACTION_ALIASES: &[(&str, &str)] = &[
    ("detail", "get"),
    ("pharm", "get"),
    ("search", "find"),
    ("lookup", "find"),
    ("by_name", "find_by_name"),
    ("search_name", "find_by_name"),
];

const CAMPAIGN_ACTION_ALIASES: &[(&str, &str)] = &[
    ("list", "rejects"),
    ("blocked", "rejects"),
    ("block", "reject"),
    ("add_reject", "reject"),
];

const STATS_ACTION_ALIASES: &[(&str, &str)] = &[
    ("count", "summary"),
    ("accounts", "accounts_stats"),
    ("erp_stats", "erp"),
    ("region_stats", "region"),
];

const AUTH_ACTION_ALIASES: &[(&str, &str)] = &[
    ("sign_in", "login"),
    ("signin", "login"),
    ("whoami", "status"),
];

fn action_aliases(tool: &str) -> &'static [(&'static str, &'static str)] {
    match tool {
        "pilldoc_accounts" => ACCOUNT_ACTION_ALIASES,
        "pilldoc_pharmacy" => PHARMACY_ACTION_ALIASES,
        "pilldoc_campaigns" => CAMPAIGN_ACTION_ALIASES,
        "pilldoc_stats" => STATS_ACTION_ALIASES,
        "pilldoc_auth" => AUTH_ACTION_ALIASES,
        _ => &[],
    }
}

fn resolve_action_alias(tool: &str, action: &str) -> Option<&'static str> {
    action_aliases(tool)
        .iter()
        .find(|(alias, _)| *alias == action)
        .map(|(_, canonical)| *canonical)
}

pub fn action_aliases_for_tool(tool: &str) -> Vec<(String, String)> {
    action_aliases(tool)
        .iter()
        .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
        .collect()
}

fn rename_key(
    map: &mut Map<String, Value>,
    from_key: &str,
    to_key: &str,
    state: &mut NormalizationState,
    allowed_keys: Option<&HashSet<String>>,
) {
    if !map.contains_key(from_key) {
        return;
    }
    if let Some(allowed) = allowed_keys {
        if !allowed.contains(to_key) {
            return;
        }
    }
    if map.contains_key(to_key) {
        map.remove(from_key);
        state.ignored.push(serde_json::json!({
            "from": from_key,
            "to": to_key,
            "reason": "canonical_already_set",
        }));
        return;
    }
    if let Some(value) = map.remove(from_key) {
        map.insert(to_key.to_string(), value);
        state.renamed.push(serde_json::json!({"from": from_key, "to": to_key}));
    }
}

fn convert_ms_to_seconds(
    map: &mut Map<String, Value>,
    from_key: &str,
    state: &mut NormalizationState,
) {
    let Some(raw) = map.get(from_key).cloned() else {
        return;
    };
    map.remove(from_key);
    if map.contains_key("timeout") {
        state.ignored.push(serde_json::json!({
            "from": from_key,
            "to": "timeout",
            "reason": "canonical_already_set",
        }));
        return;
    }
    let millis = raw
        .as_f64()
        .or_else(|| raw.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .filter(|ms| ms.is_finite() && *ms > 0.0);
    let Some(millis) = millis else {
        state.ignored.push(serde_json::json!({
            "from": from_key,
            "to": "timeout",
            "reason": "not_a_positive_number",
        }));
        return;
    };
    let seconds = (millis / 1000.0).ceil().max(1.0) as u64;
    map.insert("timeout".to_string(), Value::from(seconds));
    state.converted.push(serde_json::json!({
        "from": from_key,
        "to": "timeout",
        "value": raw,
        "seconds": seconds,
    }));
}

fn compact_state(state: NormalizationState) -> Option<Value> {
    let mut out = Map::new();
    if !state.renamed.is_empty() {
        out.insert("renamed".to_string(), Value::Array(state.renamed));
    }
    if !state.converted.is_empty() {
        out.insert("converted".to_string(), Value::Array(state.converted));
    }
    if !state.ignored.is_empty() {
        out.insert("ignored".to_string(), Value::Array(state.ignored));
    }
    if out.is_empty() {
        None
    } else {
        Some(Value::Object(out))
    }
}

pub fn normalize_args_aliases(
    args: &Value,
    tool: &str,
    allowed_keys: Option<&HashSet<String>>,
) -> (Value, Option<Value>) {
    let Some(obj) = args.as_object() else {
        return (args.clone(), None);
    };
    let mut out = obj.clone();
    let mut state = NormalizationState::default();

    if let Some(action_raw) = out.get("action").and_then(Value::as_str).map(str::to_string) {
        let normalized = action_raw.trim().to_lowercase();
        let mapped = resolve_action_alias(tool, &normalized).unwrap_or(normalized.as_str());
        if mapped != action_raw {
            out.insert("action".to_string(), Value::String(mapped.to_string()));
            state.renamed.push(serde_json::json!({
                "from": action_raw,
                "to": mapped,
                "note": "action_alias",
            }));
        }
    }

    for from in ["base_url", "baseURL"] {
        rename_key(&mut out, from, "baseUrl", &mut state, allowed_keys);
    }
    for from in ["access_token", "accessToken", "bearer"] {
        rename_key(&mut out, from, "token", &mut state, allowed_keys);
    }
    for from in ["timeout_s", "timeoutSeconds"] {
        rename_key(&mut out, from, "timeout", &mut state, allowed_keys);
    }
    for from in ["timeout_ms", "timeoutMs"] {
        convert_ms_to_seconds(&mut out, from, &mut state);
    }

    match tool {
        "pilldoc_accounts" => {
            for from in ["account_id", "id"] {
                rename_key(&mut out, from, "accountId", &mut state, allowed_keys);
            }
        }
        "pilldoc_auth" => {
            for from in ["user_id", "username", "login_id"] {
                rename_key(&mut out, from, "userId", &mut state, allowed_keys);
            }
            for from in ["pw", "passwd"] {
                rename_key(&mut out, from, "password", &mut state, allowed_keys);
            }
        }
        "pilldoc_campaigns" => {
            rename_key(&mut out, "campaign_id", "campaignId", &mut state, allowed_keys);
        }
        _ => {}
    }

    (Value::Object(out), compact_state(state))
}
