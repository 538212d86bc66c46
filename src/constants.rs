pub mod network {
    pub const DEFAULT_BASE_URL: &str = "https://dev-adminapi.edbintra.co.kr";
    pub const LOGIN_PATH: &str = "/v1/member/sign-in";
    pub const TIMEOUT_API_REQUEST_S: u64 = 15;
    pub const ACCEPT_JSON: &str = "application/json";
}

pub mod pagination {
    pub const DEFAULT_PAGE: i64 = 1;
    pub const DEFAULT_PAGE_SIZE: i64 = 100;
    pub const MAX_PAGE_SIZE: i64 = 1_000;
    pub const STATS_PAGE_SIZE: i64 = 200;
}

pub mod search {
    pub const DEFAULT_MAX_PAGES: i64 = 10;
    pub const PAGE_SIZE: i64 = 100;
    pub const SEARCH_TYPE_NAME: &str = "s";
    pub const SEARCH_TYPE_BIZNO: &str = "b";
}

pub mod update {
    /// Tried in order; the next one is used only when the previous got HTTP 415.
    pub const CONTENT_TYPES: &[&str] = &[
        "application/json; charset=utf-8",
        "application/json",
        "application/merge-patch+json",
        "application/x-www-form-urlencoded",
    ];
    pub const AD_BLOCK_FIELD: &str = "adBlockYn";
    pub const AD_DISPLAYED: &str = "N";
    pub const AD_BLOCKED: &str = "Y";
    pub const ACCOUNT_TYPES: &[&str] = &["NORMAL", "TEST"];
    pub const PHONE_MIN_DIGITS: usize = 9;
    pub const PHONE_MAX_DIGITS: usize = 11;
    pub const MOBILE_PREFIXES: &[&str] = &["010", "011", "016", "017", "018", "019"];
}

pub mod stats {
    pub const ERP_TOP_N: usize = 5;
    pub const REGION_TOP_N: usize = 10;
    pub const DEFAULT_REGION_GROUP_BY: &str = "sigungu";
}

pub mod auth {
    pub const DUPLICATE_LOGIN_MARKER: &str = "중복로그인";
    pub const DUPLICATE_LOGIN_CODE: &str = "4100";
    pub const TOKEN_KEYS: &[&str] = &[
        "accessToken",
        "access_token",
        "refreshToken",
        "refresh_token",
        "token",
        "jwt",
        "id_token",
        "idToken",
    ];
    pub const TOKEN_CONTAINERS: &[&str] = &["data", "result", "payload", "response"];
}
