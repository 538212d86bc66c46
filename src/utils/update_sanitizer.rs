//! Turns a free-form account update into the narrow body the PATCH endpoint accepts.
//!
//! The ad toggle uses visibility polarity here: a truthy "show ads" means
//! `adBlockYn = "N"`. Listing filters use the opposite reading (`true` =
//! blocked, see `filter_params::ad_display_filter_code`). Numeric codes keep
//! the upstream meaning in both places: `0` displayed, `1` blocked.

use crate::constants::update::{
    ACCOUNT_TYPES, AD_BLOCKED, AD_BLOCK_FIELD, AD_DISPLAYED, MOBILE_PREFIXES, PHONE_MAX_DIGITS,
    PHONE_MIN_DIGITS,
};
use crate::utils::coerce::{bool_like, float_like, int_like, scalar_text};
use crate::utils::records::ad_label_code;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub mod fields {
    pub const PHARM_NAME: &str = "pharmName";
    pub const DISPLAY_NAME: &str = "displayName";
    pub const PHONE: &str = "phone";
    pub const MOBILE: &str = "mobile";
    pub const EMAIL: &str = "email";
    pub const ADDRESS: &str = "address";
    pub const ADDRESS_DETAIL: &str = "addressDetail";
    pub const ZIP_CODE: &str = "zipCode";
    pub const LATITUDE: &str = "latitude";
    pub const LONGITUDE: &str = "longitude";
    pub const ERP_CODE: &str = "erpCode";
    pub const SALES_CHANNEL: &str = "salesChannel";
    pub const PHARM_CHAIN: &str = "pharmChain";
    pub const ACCOUNT_TYPE: &str = "accountType";
    pub const MEMO: &str = "memo";
    pub const AD_VISIBILITY: &str = "isAdDisplay";
    pub const AD_BLOCKED: &str = "adBlocked";
}

pub const ALLOWED_UPDATE_FIELDS: &[&str] = &[
    fields::PHARM_NAME,
    fields::DISPLAY_NAME,
    fields::PHONE,
    fields::MOBILE,
    fields::EMAIL,
    fields::ADDRESS,
    fields::ADDRESS_DETAIL,
    fields::ZIP_CODE,
    fields::LATITUDE,
    fields::LONGITUDE,
    fields::ERP_CODE,
    fields::SALES_CHANNEL,
    fields::PHARM_CHAIN,
    fields::ACCOUNT_TYPE,
    fields::MEMO,
    AD_BLOCK_FIELD,
];

const UPDATE_FIELD_ALIASES: &[(&str, &str)] = &[
    ("약국명", fields::PHARM_NAME),
    ("pharm_name", fields::PHARM_NAME),
    ("pharmacyName", fields::PHARM_NAME),
    ("pharmacy_name", fields::PHARM_NAME),
    ("name", fields::PHARM_NAME),
    ("대표자", fields::DISPLAY_NAME),
    ("약국장", fields::DISPLAY_NAME),
    ("owner_name", fields::DISPLAY_NAME),
    ("ownerName", fields::DISPLAY_NAME),
    ("display_name", fields::DISPLAY_NAME),
    ("전화번호", fields::PHONE),
    ("tel", fields::PHONE),
    ("telephone", fields::PHONE),
    ("phone_number", fields::PHONE),
    ("phoneNumber", fields::PHONE),
    ("휴대폰", fields::MOBILE),
    ("휴대전화", fields::MOBILE),
    ("mobile_phone", fields::MOBILE),
    ("mobilePhone", fields::MOBILE),
    ("cellphone", fields::MOBILE),
    ("이메일", fields::EMAIL),
    ("e-mail", fields::EMAIL),
    ("mail", fields::EMAIL),
    ("주소", fields::ADDRESS),
    ("addr", fields::ADDRESS),
    ("상세주소", fields::ADDRESS_DETAIL),
    ("address_detail", fields::ADDRESS_DETAIL),
    ("우편번호", fields::ZIP_CODE),
    ("zip", fields::ZIP_CODE),
    ("zip_code", fields::ZIP_CODE),
    ("postcode", fields::ZIP_CODE),
    ("위도", fields::LATITUDE),
    ("lat", fields::LATITUDE),
    ("경도", fields::LONGITUDE),
    ("lng", fields::LONGITUDE),
    ("lon", fields::LONGITUDE),
    ("erp_code", fields::ERP_CODE),
    ("erp", fields::ERP_CODE),
    ("sales_channel", fields::SALES_CHANNEL),
    ("channel", fields::SALES_CHANNEL),
    ("판매채널", fields::SALES_CHANNEL),
    ("pharm_chain", fields::PHARM_CHAIN),
    ("chain", fields::PHARM_CHAIN),
    ("체인", fields::PHARM_CHAIN),
    ("account_type", fields::ACCOUNT_TYPE),
    ("계정유형", fields::ACCOUNT_TYPE),
    ("메모", fields::MEMO),
    ("note", fields::MEMO),
    ("ad_block_yn", AD_BLOCK_FIELD),
    ("adBlockYN", AD_BLOCK_FIELD),
    ("adDisplay", fields::AD_VISIBILITY),
    ("ad_display", fields::AD_VISIBILITY),
    ("is_ad_display", fields::AD_VISIBILITY),
    ("showAd", fields::AD_VISIBILITY),
    ("showAds", fields::AD_VISIBILITY),
    ("광고표시", fields::AD_VISIBILITY),
    ("ad_blocked", fields::AD_BLOCKED),
    ("광고차단", fields::AD_BLOCKED),
];

static UPDATE_ALIAS_MAP: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| UPDATE_FIELD_ALIASES.iter().copied().collect());

const TEXT_FIELDS: &[&str] = &[
    fields::PHARM_NAME,
    fields::DISPLAY_NAME,
    fields::ADDRESS,
    fields::ADDRESS_DETAIL,
    fields::ZIP_CODE,
    fields::SALES_CHANNEL,
    fields::PHARM_CHAIN,
    fields::MEMO,
];

pub fn update_field_aliases() -> &'static [(&'static str, &'static str)] {
    UPDATE_FIELD_ALIASES
}

pub fn canonical_update_field(key: &str) -> &str {
    UPDATE_ALIAS_MAP.get(key).copied().unwrap_or(key)
}

#[derive(Debug, Clone, Default)]
pub struct SanitizedUpdate {
    pub body: Map<String, Value>,
    pub renamed: Vec<Value>,
    pub converted: Vec<Value>,
    pub dropped: Vec<Value>,
}

impl SanitizedUpdate {
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    pub fn report(&self) -> Value {
        serde_json::json!({
            "fields": self.body.keys().cloned().collect::<Vec<_>>(),
            "renamed": self.renamed,
            "converted": self.converted,
            "dropped": self.dropped,
        })
    }

    fn drop_field(&mut self, key: &str, value: Value, reason: &str) {
        self.body.remove(key);
        self.dropped
            .push(serde_json::json!({"key": key, "value": value, "reason": reason}));
    }

    fn replace(&mut self, key: &str, from: &Value, to: Value) {
        if from != &to {
            self.converted
                .push(serde_json::json!({"key": key, "from": from, "to": to}));
        }
        self.body.insert(key.to_string(), to);
    }
}

/// Visibility polarity: truthy means "show ads" and maps to `"N"`.
pub fn ad_token_from_visibility(value: &Value) -> Option<&'static str> {
    match value {
        Value::Bool(true) => Some(AD_DISPLAYED),
        Value::Bool(false) => Some(AD_BLOCKED),
        Value::Number(_) => match int_like(value) {
            Some(0) => Some(AD_DISPLAYED),
            Some(1) => Some(AD_BLOCKED),
            _ => None,
        },
        Value::String(text) => match text.trim().to_lowercase().as_str() {
            "0" => Some(AD_DISPLAYED),
            "1" => Some(AD_BLOCKED),
            "true" | "yes" | "y" | "on" | "표시" | "표시중" | "display" | "displayed" | "show"
            | "visible" => Some(AD_DISPLAYED),
            "false" | "no" | "n" | "off" | "미표시" | "차단" | "blocked" | "hide" | "hidden" => {
                Some(AD_BLOCKED)
            }
            _ => None,
        },
        _ => None,
    }
}

/// Blocked polarity: truthy means "block ads" and maps to `"Y"`.
pub fn ad_token_from_blocked(value: &Value) -> Option<&'static str> {
    let code = bool_like(value)
        .map(i64::from)
        .or_else(|| scalar_text(value).and_then(|text| ad_label_code(&text)))?;
    Some(if code == 1 { AD_BLOCKED } else { AD_DISPLAYED })
}

/// Digits-only phone check and reformat. Mobile numbers must use a known
/// `01x` prefix; `mobile_only` rejects landlines.
pub fn normalize_phone(raw: &str, mobile_only: bool) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < PHONE_MIN_DIGITS || digits.len() > PHONE_MAX_DIGITS {
        return None;
    }
    if !digits.starts_with('0') {
        return None;
    }
    let is_mobile = digits.starts_with("01");
    if is_mobile && !MOBILE_PREFIXES.iter().any(|prefix| digits.starts_with(prefix)) {
        return None;
    }
    if mobile_only && !is_mobile {
        return None;
    }
    let (first, second) = if digits.starts_with("02") {
        match digits.len() {
            9 => (2, 5),
            10 => (2, 6),
            _ => return None,
        }
    } else {
        match digits.len() {
            10 => (3, 6),
            11 => (3, 7),
            _ => return None,
        }
    };
    Some(format!(
        "{}-{}-{}",
        &digits[..first],
        &digits[first..second],
        &digits[second..]
    ))
}

pub fn is_valid_email(raw: &str) -> bool {
    let text = raw.trim();
    if text.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = text.rsplit_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

fn rewrite_aliases(raw: &Map<String, Value>, out: &mut SanitizedUpdate) {
    let (aliased, direct): (Vec<_>, Vec<_>) = raw
        .iter()
        .partition(|(key, _)| canonical_update_field(key) != key.as_str());
    for (key, value) in aliased.into_iter().chain(direct) {
        let canonical = canonical_update_field(key);
        if value.is_null() {
            out.dropped
                .push(serde_json::json!({"key": key, "value": null, "reason": "null"}));
            continue;
        }
        if canonical != key.as_str() {
            out.renamed
                .push(serde_json::json!({"from": key, "to": canonical}));
        }
        if let Some(previous) = out.body.insert(canonical.to_string(), value.clone()) {
            out.dropped.push(
                serde_json::json!({"key": canonical, "value": previous, "reason": "superseded"}),
            );
        }
    }
}

type AdTranslator = fn(&Value) -> Option<&'static str>;

fn translate_ad_toggles(out: &mut SanitizedUpdate) {
    let visibility = out.body.remove(fields::AD_VISIBILITY);
    let blocked = out.body.remove(fields::AD_BLOCKED);
    let candidates: [(&str, Option<Value>, AdTranslator); 2] = [
        (fields::AD_VISIBILITY, visibility, ad_token_from_visibility),
        (fields::AD_BLOCKED, blocked, ad_token_from_blocked),
    ];
    for (key, raw, translate) in candidates {
        let Some(raw) = raw else {
            continue;
        };
        if out.body.contains_key(AD_BLOCK_FIELD) {
            out.drop_field(key, raw, "superseded");
            continue;
        }
        match translate(&raw) {
            Some(token) => {
                out.converted.push(serde_json::json!({
                    "key": key,
                    "from": raw,
                    "to": { AD_BLOCK_FIELD: token },
                }));
                out.body
                    .insert(AD_BLOCK_FIELD.to_string(), Value::String(token.to_string()));
            }
            None => out.drop_field(key, raw, "unrecognized_ad_toggle"),
        }
    }
}

fn validate_enum(out: &mut SanitizedUpdate, key: &str, allowed: &[&str]) {
    let Some(raw) = out.body.get(key).cloned() else {
        return;
    };
    match scalar_text(&raw).map(|text| text.trim().to_string()) {
        Some(text) if allowed.contains(&text.as_str()) => {
            out.replace(key, &raw, Value::String(text));
        }
        _ => out.drop_field(key, raw, "not_in_enum"),
    }
}

fn coerce_coordinate(out: &mut SanitizedUpdate, key: &str, bound: f64) {
    let Some(raw) = out.body.get(key).cloned() else {
        return;
    };
    match float_like(&raw) {
        Some(value) if value.abs() <= bound => match serde_json::Number::from_f64(value) {
            Some(num) => out.replace(key, &raw, Value::Number(num)),
            None => out.drop_field(key, raw, "not_a_number"),
        },
        Some(_) => out.drop_field(key, raw, "out_of_range"),
        None => out.drop_field(key, raw, "not_a_number"),
    }
}

fn coerce_numbers(out: &mut SanitizedUpdate) {
    coerce_coordinate(out, fields::LATITUDE, 90.0);
    coerce_coordinate(out, fields::LONGITUDE, 180.0);
    if let Some(raw) = out.body.get(fields::ERP_CODE).cloned() {
        match int_like(&raw) {
            Some(code) => out.replace(fields::ERP_CODE, &raw, Value::from(code)),
            None => out.drop_field(fields::ERP_CODE, raw, "not_a_number"),
        }
    }
}

fn normalize_phones(out: &mut SanitizedUpdate) {
    for (key, mobile_only) in [(fields::PHONE, false), (fields::MOBILE, true)] {
        let Some(raw) = out.body.get(key).cloned() else {
            continue;
        };
        match scalar_text(&raw).and_then(|text| normalize_phone(&text, mobile_only)) {
            Some(phone) => out.replace(key, &raw, Value::String(phone)),
            None => out.drop_field(key, raw, "invalid_phone"),
        }
    }
}

fn validate_email(out: &mut SanitizedUpdate) {
    let Some(raw) = out.body.get(fields::EMAIL).cloned() else {
        return;
    };
    let email = raw
        .as_str()
        .map(str::trim)
        .filter(|email| is_valid_email(email))
        .map(str::to_string);
    match email {
        Some(email) => out.replace(fields::EMAIL, &raw, Value::String(email)),
        None => out.drop_field(fields::EMAIL, raw, "invalid_email"),
    }
}

fn coerce_text(out: &mut SanitizedUpdate) {
    for key in TEXT_FIELDS {
        let Some(raw) = out.body.get(*key).cloned() else {
            continue;
        };
        match scalar_text(&raw) {
            Some(text) => out.replace(key, &raw, Value::String(text.trim().to_string())),
            None => out.drop_field(key, raw, "not_a_scalar"),
        }
    }
}

fn enforce_allowlist(out: &mut SanitizedUpdate) {
    let rejected: Vec<String> = out
        .body
        .keys()
        .filter(|key| !ALLOWED_UPDATE_FIELDS.contains(&key.as_str()))
        .cloned()
        .collect();
    for key in rejected {
        if let Some(raw) = out.body.get(&key).cloned() {
            out.drop_field(&key, raw, "not_allowed");
        }
    }
}

/// Never fails; invalid input is dropped and listed in `dropped`.
pub fn sanitize_update(raw: &Map<String, Value>) -> SanitizedUpdate {
    let mut out = SanitizedUpdate::default();
    rewrite_aliases(raw, &mut out);
    translate_ad_toggles(&mut out);
    validate_enum(&mut out, AD_BLOCK_FIELD, &[AD_BLOCKED, AD_DISPLAYED]);
    validate_enum(&mut out, fields::ACCOUNT_TYPE, ACCOUNT_TYPES);
    coerce_numbers(&mut out);
    normalize_phones(&mut out);
    validate_email(&mut out);
    coerce_text(&mut out);
    enforce_allowlist(&mut out);
    out
}
