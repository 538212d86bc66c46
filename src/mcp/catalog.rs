use crate::errors::{ErrorCode, McpError};
use crate::mcp::aliases::TOOL_ALIASES;
use crate::utils::arg_aliases::action_aliases_for_tool;
use crate::utils::suggest::suggest;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

static TOOL_CATALOG: Lazy<Vec<ToolDef>> = Lazy::new(|| {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tool_catalog.json"));
    serde_json::from_str(raw).expect("tool_catalog.json must be valid JSON")
});

static TOOL_MAP: Lazy<HashMap<String, ToolDef>> = Lazy::new(|| {
    TOOL_CATALOG
        .iter()
        .cloned()
        .map(|tool| (tool.name.clone(), tool))
        .collect()
});

static TOOL_VALIDATORS: Lazy<HashMap<String, JSONSchema>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for tool in TOOL_CATALOG.iter() {
        if let Ok(schema) = JSONSchema::compile(&tool.input_schema) {
            map.insert(tool.name.clone(), schema);
        }
    }
    map
});

pub fn tool_catalog() -> &'static Vec<ToolDef> {
    &TOOL_CATALOG
}

pub fn tool_by_name(name: &str) -> Option<&'static ToolDef> {
    TOOL_MAP.get(name)
}

/// Declared top-level argument names of a tool.
pub fn tool_properties(name: &str) -> Option<HashSet<String>> {
    tool_by_name(name)
        .and_then(|tool| tool.input_schema.get("properties"))
        .and_then(Value::as_object)
        .map(|props| props.keys().cloned().collect())
}

/// Values of the `action` enum of a tool schema.
pub fn tool_actions(name: &str) -> Vec<String> {
    tool_by_name(name)
        .and_then(|tool| tool.input_schema.pointer("/properties/action/enum"))
        .and_then(Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn validate_tool_args(tool_name: &str, args: &Value) -> Result<(), McpError> {
    let Some(schema) = TOOL_VALIDATORS.get(tool_name) else {
        return Ok(());
    };
    if let Err(errors) = schema.validate(args) {
        let message = format_schema_errors(tool_name, args, errors);
        return Err(McpError::new(ErrorCode::InvalidParams, message));
    }
    Ok(())
}

fn format_schema_errors(tool_name: &str, args: &Value, errors: jsonschema::ErrorIterator) -> String {
    let action = args.get("action").and_then(Value::as_str);
    let header = match action {
        Some(action) => format!("Invalid arguments for {}:{}", tool_name, action),
        None => format!("Invalid arguments for {}", tool_name),
    };
    let mut rendered = Vec::new();
    let mut did_you_mean = Vec::new();

    for err in errors.take(10) {
        let path = err.instance_path.to_string();
        let location = if path.is_empty() {
            "(root)".to_string()
        } else {
            path.clone()
        };
        match &err.kind {
            jsonschema::error::ValidationErrorKind::Enum { options } => {
                let allowed: Vec<String> = options
                    .as_array()
                    .map(|values| {
                        values
                            .iter()
                            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                            .collect()
                    })
                    .unwrap_or_default();
                rendered.push(format!("{}: expected one of {}", location, allowed.join(", ")));
                let received = args.pointer(&path).and_then(Value::as_str).unwrap_or("");
                let suggestions = suggest(received, &allowed, 3);
                if !suggestions.is_empty() {
                    did_you_mean.push(format!("{}: {}", location, suggestions.join(", ")));
                }
            }
            jsonschema::error::ValidationErrorKind::Required { property } => {
                let prop = property
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| property.to_string());
                rendered.push(format!("{}: missing required field '{}'", location, prop));
            }
            jsonschema::error::ValidationErrorKind::Type { kind } => {
                rendered.push(format!("{}: expected {}", location, format_type_kind(kind)));
            }
            _ => rendered.push(format!("{}: {}", location, err)),
        }
    }

    let mut lines = vec![header];
    lines.extend(rendered.iter().map(|line| format!("- {}", line)));
    if !did_you_mean.is_empty() {
        lines.push(format!("Did you mean: {}", did_you_mean.join(" | ")));
    }
    lines.join("\n")
}

fn format_type_kind(kind: &jsonschema::error::TypeKind) -> String {
    match kind {
        jsonschema::error::TypeKind::Single(primitive) => primitive.to_string(),
        jsonschema::error::TypeKind::Multiple(types) => {
            let list: Vec<String> = (*types).into_iter().map(|t| t.to_string()).collect();
            if list.is_empty() {
                "unknown".to_string()
            } else {
                list.join(" | ")
            }
        }
    }
}

/// Rewrites `type: [..]` unions as `anyOf` for clients that reject type arrays.
pub fn normalize_schema_for_clients(schema: &Value) -> Value {
    match schema {
        Value::Array(items) => Value::Array(items.iter().map(normalize_schema_for_clients).collect()),
        Value::Object(map) => {
            let mut out = map.clone();
            if let Some(props) = map.get("properties").and_then(Value::as_object) {
                let normalized = props
                    .iter()
                    .map(|(key, value)| (key.clone(), normalize_schema_for_clients(value)))
                    .collect();
                out.insert("properties".to_string(), Value::Object(normalized));
            }
            if let Some(items) = map.get("items") {
                out.insert("items".to_string(), normalize_schema_for_clients(items));
            }
            if let Some(types) = map.get("type").and_then(Value::as_array) {
                let items = out.remove("items");
                out.remove("type");
                let any_of = types
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|kind| {
                        if kind == "array" {
                            serde_json::json!({
                                "type": "array",
                                "items": items.clone().unwrap_or(Value::Object(Default::default())),
                            })
                        } else {
                            serde_json::json!({"type": kind})
                        }
                    })
                    .collect();
                out.insert("anyOf".to_string(), Value::Array(any_of));
            }
            Value::Object(out)
        }
        _ => schema.clone(),
    }
}

fn action_alias_pairs(tool: &str) -> Vec<(String, String)> {
    let actions = tool_actions(tool);
    action_aliases_for_tool(tool)
        .into_iter()
        .filter(|(_, target)| actions.contains(target))
        .collect()
}

fn describe(tool: &ToolDef) -> String {
    let aliases: Vec<String> = action_alias_pairs(&tool.name)
        .into_iter()
        .map(|(alias, target)| format!("{} -> {}", alias, target))
        .collect();
    if aliases.is_empty() {
        return tool.description.clone();
    }
    format!("{} Action aliases: {}.", tool.description, aliases.join(", "))
}

/// Catalog tools followed by their short aliases.
pub fn list_tools() -> Vec<ToolDef> {
    let mut tools: Vec<ToolDef> = TOOL_CATALOG
        .iter()
        .map(|tool| ToolDef {
            name: tool.name.clone(),
            description: describe(tool),
            input_schema: normalize_schema_for_clients(&tool.input_schema),
        })
        .collect();
    let mut names: HashSet<String> = tools.iter().map(|tool| tool.name.clone()).collect();
    for (alias, target) in TOOL_ALIASES {
        if names.contains(*alias) {
            continue;
        }
        let Some(target_tool) = tools.iter().find(|tool| tool.name == *target).cloned() else {
            continue;
        };
        tools.push(ToolDef {
            name: (*alias).to_string(),
            description: format!("Alias for {}.", target),
            input_schema: target_tool.input_schema,
        });
        names.insert((*alias).to_string());
    }
    tools
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_alias_targets_a_catalog_tool() {
        for (alias, target) in TOOL_ALIASES {
            assert!(tool_by_name(target).is_some(), "{} -> {}", alias, target);
        }
    }

    #[test]
    fn actions_come_from_the_schema_enum() {
        assert_eq!(tool_actions("pilldoc_campaigns"), vec!["rejects", "reject"]);
        assert!(tool_actions("unknown").is_empty());
    }

    #[test]
    fn every_action_alias_targets_a_declared_action() {
        for tool in tool_catalog() {
            let declared = action_alias_pairs(&tool.name).len();
            assert_eq!(declared, action_aliases_for_tool(&tool.name).len(), "{}", tool.name);
        }
        let pharmacy = list_tools()
            .into_iter()
            .find(|tool| tool.name == "pilldoc_pharmacy")
            .map(|tool| tool.description)
            .unwrap_or_default();
        assert!(pharmacy.contains("search -> find"));
    }

    #[test]
    fn invalid_action_gets_a_suggestion() {
        let err = validate_tool_args("pilldoc_pharmacy", &json!({"action": "fnd"}))
            .expect_err("enum violation");
        assert_eq!(err.code, ErrorCode::InvalidParams);
        assert!(err.message.contains("expected one of get, find_by_name, find"));
        assert!(err.message.contains("Did you mean: /action: find"));
    }

    #[test]
    fn missing_action_is_reported() {
        let err = validate_tool_args("pilldoc_stats", &json!({})).expect_err("required");
        assert!(err.message.contains("missing required field 'action'"));
    }

    #[test]
    fn type_unions_become_any_of() {
        let schema = json!({"type": "object", "properties": {"erpKind": {"type": ["array", "string"]}}});
        let normalized = normalize_schema_for_clients(&schema);
        assert_eq!(
            normalized["properties"]["erpKind"],
            json!({"anyOf": [{"type": "array", "items": {}}, {"type": "string"}]})
        );
    }
}
