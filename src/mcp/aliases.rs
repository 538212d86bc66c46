use once_cell::sync::Lazy;
use std::collections::HashMap;

pub const TOOL_ALIASES: &[(&str, &str)] = &[
    ("accounts", "pilldoc_accounts"),
    ("account", "pilldoc_accounts"),
    ("pharmacy", "pilldoc_pharmacy"),
    ("pharm", "pilldoc_pharmacy"),
    ("campaigns", "pilldoc_campaigns"),
    ("adps", "pilldoc_campaigns"),
    ("stats", "pilldoc_stats"),
    ("statistics", "pilldoc_stats"),
    ("auth", "pilldoc_auth"),
    ("login", "pilldoc_auth"),
];

static TOOL_ALIAS_MAP: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| TOOL_ALIASES.iter().copied().collect());

pub fn canonical_tool_name(tool: &str) -> &str {
    TOOL_ALIAS_MAP.get(tool).copied().unwrap_or(tool)
}

pub fn tool_alias_map_owned() -> HashMap<String, String> {
    TOOL_ALIASES
        .iter()
        .map(|(alias, target)| (alias.to_string(), target.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_resolve_to_tools() {
        assert_eq!(canonical_tool_name("stats"), "pilldoc_stats");
        assert_eq!(canonical_tool_name("pilldoc_auth"), "pilldoc_auth");
        assert_eq!(canonical_tool_name("nope"), "nope");
    }
}
