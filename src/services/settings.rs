use crate::constants::network::{DEFAULT_BASE_URL, LOGIN_PATH, TIMEOUT_API_REQUEST_S};
use std::time::Duration;

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub login_url: String,
    pub user_id: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub force_login: bool,
    pub timeout: Duration,
    pub search_budget: Option<Duration>,
}

/// Loads `.env` then `.env.local`; variables already set in the environment win.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
    let _ = dotenvy::from_filename(".env.local");
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_flag(raw: Option<String>) -> bool {
    matches!(
        raw.as_deref().map(|v| v.trim().to_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = non_empty(lookup("EDB_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let login_url = non_empty(lookup("EDB_LOGIN_URL"))
            .unwrap_or_else(|| format!("{}{}", base_url, LOGIN_PATH));
        let timeout = non_empty(lookup("PILLDOC_TIMEOUT_S"))
            .and_then(|raw| raw.parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64)
            .unwrap_or(Duration::from_secs(TIMEOUT_API_REQUEST_S));
        let search_budget = non_empty(lookup("PILLDOC_SEARCH_BUDGET_MS"))
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        Self {
            base_url,
            login_url,
            user_id: non_empty(lookup("EDB_USER_ID")),
            password: non_empty(lookup("EDB_PASSWORD")),
            token: non_empty(lookup("EDB_TOKEN")),
            force_login: parse_flag(lookup("EDB_FORCE_LOGIN")),
            timeout,
            search_budget,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.user_id.is_some() && self.password.is_some()
    }
}
