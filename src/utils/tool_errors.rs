use crate::errors::ToolError;
use crate::utils::suggest::suggest;
use serde_json::Value;

fn did_you_mean(input: &str, known: &[String]) -> Vec<String> {
    if input.is_empty() {
        Vec::new()
    } else {
        suggest(input, known, 5)
    }
}

pub fn unknown_action_error(
    tool: &str,
    action: Option<&Value>,
    known_actions: &[&str],
) -> ToolError {
    let action_value = action.and_then(Value::as_str).unwrap_or("").to_string();
    let known: Vec<String> = known_actions.iter().map(|s| s.to_string()).collect();
    let suggestions = did_you_mean(&action_value, &known);

    let mut hint = format!("Use one of: {}.", known.join(", "));
    if !suggestions.is_empty() {
        hint = format!("Did you mean: {}? {}", suggestions.join(", "), hint);
    }
    let message = if action_value.is_empty() {
        format!("{} requires an action", tool)
    } else {
        format!("Unknown {} action: {}", tool, action_value)
    };
    ToolError::invalid_params(message)
        .with_hint(hint)
        .with_details(serde_json::json!({
            "known_actions": known,
            "did_you_mean": suggestions,
        }))
}

pub fn unknown_tool_error(tool: &str, known_tools: &[String]) -> ToolError {
    let suggestions = did_you_mean(tool, known_tools);
    let mut err = ToolError::not_found(format!("Unknown tool: {}", tool));
    if !suggestions.is_empty() {
        err = err.with_hint(format!("Did you mean: {}?", suggestions.join(", ")));
    }
    err.with_details(serde_json::json!({"did_you_mean": suggestions}))
}
