use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::errors::ToolError;
use crate::services::logger::Logger;
use crate::utils::redact::redact_object;
use crate::utils::tool_errors::unknown_tool_error;

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, args: Value) -> Result<Value, ToolError>;
}

#[derive(Clone)]
pub struct ToolExecutor {
    logger: Logger,
    handlers: Arc<HashMap<String, Arc<dyn ToolHandler>>>,
    alias_map: HashMap<String, String>,
}

impl ToolExecutor {
    pub fn new(
        logger: Logger,
        handlers: HashMap<String, Arc<dyn ToolHandler>>,
        alias_map: HashMap<String, String>,
    ) -> Self {
        Self {
            logger: logger.child("executor"),
            handlers: Arc::new(handlers),
            alias_map,
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    fn resolve_alias(&self, tool: &str) -> (String, Option<String>) {
        if self.handlers.contains_key(tool) {
            return (tool.to_string(), None);
        }
        match self.alias_map.get(tool) {
            Some(mapped) => (mapped.clone(), Some(tool.to_string())),
            None => (tool.to_string(), None),
        }
    }

    /// Runs one tool call and wraps its result as `{ok, tool, action, result, meta}`.
    pub async fn execute(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        let started = Instant::now();
        let (resolved, invoked_as) = self.resolve_alias(tool);
        let Some(handler) = self.handlers.get(&resolved).cloned() else {
            let mut known = self.tool_names();
            known.extend(self.alias_map.keys().cloned());
            return Err(unknown_tool_error(tool, &known));
        };
        let trace_id = args
            .get("trace_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let action = args.get("action").cloned().unwrap_or(Value::Null);

        let mut handler_args = args;
        if let Value::Object(map) = &mut handler_args {
            map.remove("trace_id");
        }
        self.logger.info(
            "Tool call started",
            Some(&serde_json::json!({
                "tool": resolved,
                "action": action,
                "trace_id": trace_id,
                "args": redact_object(&handler_args),
            })),
        );

        let outcome = handler.handle(handler_args).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                self.logger.warn(
                    "Tool call failed",
                    Some(&serde_json::json!({
                        "tool": resolved,
                        "action": action,
                        "trace_id": trace_id,
                        "code": err.code,
                        "message": err.message,
                        "duration_ms": duration_ms,
                    })),
                );
                return Err(err);
            }
        };
        self.logger.info(
            "Tool call finished",
            Some(&serde_json::json!({
                "tool": resolved,
                "action": action,
                "trace_id": trace_id,
                "duration_ms": duration_ms,
            })),
        );

        let mut meta = serde_json::json!({
            "trace_id": trace_id,
            "duration_ms": duration_ms,
        });
        if let (Some(name), Value::Object(map)) = (invoked_as, &mut meta) {
            map.insert("invoked_as".to_string(), Value::String(name));
        }
        Ok(serde_json::json!({
            "ok": true,
            "tool": resolved,
            "action": action,
            "result": result,
            "meta": meta,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::logger::LogLevel;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn handle(&self, args: Value) -> Result<Value, ToolError> {
            Ok(json!({"echo": args}))
        }
    }

    fn executor() -> ToolExecutor {
        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        handlers.insert("pilldoc_auth".to_string(), Arc::new(Echo));
        let aliases = HashMap::from([("auth".to_string(), "pilldoc_auth".to_string())]);
        ToolExecutor::new(Logger::with_level("test", LogLevel::Error), handlers, aliases)
    }

    #[tokio::test]
    async fn wraps_result_with_meta_and_alias() {
        let out = executor()
            .execute("auth", json!({"action": "status", "trace_id": "t-1"}))
            .await
            .expect("executes");
        assert_eq!(out["ok"], json!(true));
        assert_eq!(out["tool"], json!("pilldoc_auth"));
        assert_eq!(out["action"], json!("status"));
        assert_eq!(out["meta"]["trace_id"], json!("t-1"));
        assert_eq!(out["meta"]["invoked_as"], json!("auth"));
        assert_eq!(out["result"]["echo"], json!({"action": "status"}));
    }

    #[tokio::test]
    async fn unknown_tool_suggests_names() {
        let err = executor()
            .execute("pilldoc_aut", json!({}))
            .await
            .expect_err("unknown tool");
        assert!(err.message.contains("pilldoc_aut"));
        assert!(err.hint.unwrap_or_default().contains("pilldoc_auth"));
    }
}
