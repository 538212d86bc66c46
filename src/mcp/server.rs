use crate::app::App;
use crate::errors::{ErrorCode, McpError, ToolError, ToolErrorKind};
use crate::mcp::aliases::canonical_tool_name;
use crate::mcp::catalog::{list_tools, tool_properties, validate_tool_args};
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse};
use crate::utils::arg_aliases::normalize_args_aliases;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

const PROTOCOL_VERSION: &str = "2025-06-18";
const SERVER_NAME: &str = "pilldoc";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn map_tool_error(tool: &str, error: &ToolError) -> McpError {
    let mut lines = vec![
        "PilldocError".to_string(),
        format!("tool: {}", tool),
        format!("kind: {:?}", error.kind).to_lowercase(),
        format!("code: {}", error.code),
        format!("retryable: {}", error.retryable),
        format!("message: {}", error.message),
    ];
    if let Some(hint) = &error.hint {
        lines.push(format!("hint: {}", hint));
    }
    let message = lines.join("\n");

    match error.kind {
        ToolErrorKind::InvalidParams => McpError::new(ErrorCode::InvalidParams, message),
        ToolErrorKind::Timeout => McpError::new(ErrorCode::RequestTimeout, message),
        ToolErrorKind::NotFound => McpError::new(ErrorCode::InvalidRequest, message),
        _ => McpError::new(ErrorCode::InternalError, message),
    }
}

/// Null arguments are treated as absent.
fn drop_null_args(args: Value) -> Result<Value, McpError> {
    match args {
        Value::Null => Ok(Value::Object(Default::default())),
        Value::Object(mut map) => {
            map.retain(|_, value| !value.is_null());
            Ok(Value::Object(map))
        }
        _ => Err(McpError::invalid_params("arguments must be an object")),
    }
}

pub struct McpServer {
    app: Arc<App>,
}

impl McpServer {
    pub fn new() -> Result<Self, ToolError> {
        let app = App::initialize()?;
        Ok(Self { app: Arc::new(app) })
    }

    pub fn with_app(app: Arc<App>) -> Self {
        Self { app }
    }

    fn handle_initialize(&self) -> Value {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {"name": SERVER_NAME, "version": SERVER_VERSION},
        })
    }

    fn handle_tools_list(&self) -> Value {
        serde_json::json!({ "tools": list_tools() })
    }

    pub async fn handle_tools_call(&self, name: &str, raw_args: Value) -> Result<Value, McpError> {
        let canonical_tool = canonical_tool_name(name);
        let args = drop_null_args(raw_args)?;
        let allowed_keys = tool_properties(canonical_tool);
        let (args, normalization) =
            normalize_args_aliases(&args, canonical_tool, allowed_keys.as_ref());
        validate_tool_args(canonical_tool, &args)?;

        let mut envelope = self
            .app
            .tool_executor
            .execute(name, args)
            .await
            .map_err(|err| map_tool_error(canonical_tool, &err))?;
        if let (Some(normalization), Value::Object(map)) = (normalization, &mut envelope) {
            map.insert("normalization".to_string(), normalization);
        }

        let text = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());
        Ok(serde_json::json!({
            "content": [ { "type": "text", "text": text } ]
        }))
    }

    /// Response for one request; `None` for notifications.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            return None;
        }
        let id = request.id.clone().unwrap_or(Value::Null);
        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.handle_initialize()),
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            "tools/list" => JsonRpcResponse::success(id, self.handle_tools_list()),
            "tools/call" => {
                let name = request
                    .params
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if name.is_empty() {
                    return Some(JsonRpcResponse::failure(
                        id,
                        ErrorCode::InvalidParams.as_i32(),
                        "Missing tool name",
                    ));
                }
                let args = request
                    .params
                    .get("arguments")
                    .cloned()
                    .unwrap_or(Value::Null);
                match self.handle_tools_call(name, args).await {
                    Ok(result) => JsonRpcResponse::success(id, result),
                    Err(err) => JsonRpcResponse::from_error(id, err),
                }
            }
            _ => JsonRpcResponse::failure(id, ErrorCode::MethodNotFound.as_i32(), "Method not found"),
        };
        Some(response)
    }

    fn parse_line(line: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
        let parsed: Value = serde_json::from_str(line).map_err(|_| {
            JsonRpcResponse::failure(Value::Null, ErrorCode::ParseError.as_i32(), "Parse error")
        })?;
        serde_json::from_value(parsed).map_err(|_| {
            JsonRpcResponse::failure(
                Value::Null,
                ErrorCode::InvalidRequest.as_i32(),
                "Invalid request",
            )
        })
    }

    pub async fn run_stdio(&self) -> Result<(), ToolError> {
        let mut reader = BufReader::new(tokio::io::stdin()).lines();
        let mut writer = BufWriter::new(tokio::io::stdout());
        self.app.logger.info(
            "Server ready",
            Some(&serde_json::json!({"version": SERVER_VERSION, "base_url": self.app.settings.base_url})),
        );

        while let Some(line) = reader
            .next_line()
            .await
            .map_err(|err| ToolError::internal(err.to_string()))?
        {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let response = match Self::parse_line(trimmed) {
                Ok(request) => self.handle_request(request).await,
                Err(failure) => Some(failure),
            };
            if let Some(response) = response {
                let payload = serde_json::to_string(&response).unwrap_or_default();
                writer.write_all(payload.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        self.app
            .logger
            .info("Input closed; shutting down", Some(&self.app.logger.stats()));
        Ok(())
    }
}

pub async fn run_stdio() -> Result<(), ToolError> {
    let server = McpServer::new()?;
    server.run_stdio().await
}
