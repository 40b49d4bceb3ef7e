//! 基于 MCP (JSON-RPC 2.0 over Streamable HTTP) 的工具网关

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{ToolDescriptor, ToolError, ToolGateway};
use crate::config::{McpServerConfig, ToolsConfig};

pub const MCP_PROTOCOL_VERSION: &str = "2025-03-26";
const SESSION_HEADER: &str = "mcp-session-id";
const ACCEPT: &str = "application/json, text/event-stream";

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcNotification<'a> {
    jsonrpc: &'static str,
    method: &'a str,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct McpTool {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    input_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ListToolsResult {
    #[serde(default)]
    tools: Vec<McpTool>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct CallToolResult {
    #[serde(default)]
    content: Vec<ToolContent>,
    #[serde(rename = "isError", default)]
    is_error: bool,
}

/// MCP工具网关，按工具名把调用路由到提供该工具的服务
pub struct McpToolGateway {
    http: reqwest::Client,
    servers: Vec<McpServerConfig>,
    timeout_seconds: u64,
    next_id: AtomicU64,
    /// 服务名 -> 会话ID（服务未下发时为None）
    sessions: RwLock<HashMap<String, Option<String>>>,
    /// 工具名 -> 服务下标
    routes: RwLock<HashMap<String, usize>>,
}

impl McpToolGateway {
    pub fn new(config: &ToolsConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to build MCP http client")?;

        Ok(Self {
            http,
            servers: config.servers.clone(),
            timeout_seconds: config.timeout_seconds,
            next_id: AtomicU64::new(1),
            sessions: RwLock::new(HashMap::new()),
            routes: RwLock::new(HashMap::new()),
        })
    }

    fn map_transport_error(&self, server: &McpServerConfig, err: reqwest::Error) -> ToolError {
        if err.is_timeout() {
            ToolError::Timeout {
                tool: server.name.clone(),
                seconds: self.timeout_seconds,
            }
        } else {
            ToolError::Unavailable(format!("{} ({}): {}", server.name, server.url, err))
        }
    }

    async fn post<T: Serialize>(
        &self,
        server: &McpServerConfig,
        session: Option<&str>,
        body: &T,
    ) -> Result<(Option<String>, String, String), ToolError> {
        let mut request = self
            .http
            .post(&server.url)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .json(body);
        if let Some(session_id) = session {
            request = request.header(SESSION_HEADER, session_id);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport_error(server, e))?;

        let status = response.status();
        let session_id = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(server, e))?;

        if !status.is_success() {
            return Err(ToolError::Unavailable(format!(
                "{} responded with HTTP {}",
                server.name, status
            )));
        }

        Ok((session_id, content_type, text))
    }

    /// 初始化会话（每个服务只做一次）
    async fn ensure_session(&self, index: usize) -> Result<Option<String>, ToolError> {
        let server = &self.servers[index];
        if let Some(session) = self.sessions.read().await.get(&server.name) {
            return Ok(session.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method: "initialize",
            params: json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                }
            }),
        };
        let (session_id, content_type, body) = self.post(server, None, &request).await?;
        decode_rpc_response(&content_type, &body, id)?;

        let notification = JsonRpcNotification {
            jsonrpc: "2.0",
            method: "notifications/initialized",
        };
        self.post(server, session_id.as_deref(), &notification)
            .await?;

        debug!("🔌 MCP服务 {} 已初始化", server.name);
        self.sessions
            .write()
            .await
            .insert(server.name.clone(), session_id.clone());
        Ok(session_id)
    }

    async fn rpc(&self, index: usize, method: &str, params: Value) -> Result<Value, ToolError> {
        let session = self.ensure_session(index).await?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let (_, content_type, body) = self
            .post(&self.servers[index], session.as_deref(), &request)
            .await?;
        decode_rpc_response(&content_type, &body, id)
    }

    async fn list_server_tools(&self, index: usize) -> Result<Vec<ToolDescriptor>, ToolError> {
        let result = self.rpc(index, "tools/list", json!({})).await?;
        let listed: ListToolsResult = serde_json::from_value(result)
            .map_err(|e| ToolError::Protocol(format!("invalid tools/list result: {}", e)))?;

        Ok(listed
            .tools
            .into_iter()
            .map(|tool| ToolDescriptor {
                name: tool.name,
                description: tool.description.unwrap_or_default(),
                input_schema: tool
                    .input_schema
                    .unwrap_or_else(|| json!({"type": "object", "properties": {}})),
            })
            .collect())
    }
}

#[async_trait]
impl ToolGateway for McpToolGateway {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let mut tools = Vec::new();
        let mut routes = HashMap::new();
        let mut failures = Vec::new();

        for index in 0..self.servers.len() {
            match self.list_server_tools(index).await {
                Ok(server_tools) => {
                    for tool in server_tools {
                        routes.insert(tool.name.clone(), index);
                        tools.push(tool);
                    }
                }
                Err(e) => {
                    warn!("⚠️ MCP服务 {} 不可用: {}", self.servers[index].name, e);
                    failures.push(e.to_string());
                }
            }
        }

        if tools.is_empty() {
            return Err(ToolError::Unavailable(if failures.is_empty() {
                "no MCP servers configured".to_string()
            } else {
                failures.join("; ")
            }));
        }

        info!("🧰 已加载 {} 个研究工具", tools.len());
        *self.routes.write().await = routes;
        Ok(tools)
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        if self.routes.read().await.is_empty() {
            self.list_tools().await?;
        }
        let index = self
            .routes
            .read()
            .await
            .get(name)
            .copied()
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        debug!("🔧 调用工具 {} @ {}", name, self.servers[index].name);
        let result = self
            .rpc(
                index,
                "tools/call",
                json!({ "name": name, "arguments": arguments }),
            )
            .await
            .map_err(|e| match e {
                ToolError::Timeout { seconds, .. } => ToolError::Timeout {
                    tool: name.to_string(),
                    seconds,
                },
                other => other,
            })?;

        let call: CallToolResult = serde_json::from_value(result)
            .map_err(|e| ToolError::Protocol(format!("invalid tools/call result: {}", e)))?;
        let text = call
            .content
            .into_iter()
            .filter_map(|c| match c {
                ToolContent::Text { text } => Some(text),
                ToolContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        if call.is_error {
            return Err(ToolError::Execution {
                tool: name.to_string(),
                message: text,
            });
        }
        Ok(text)
    }
}

/// 解析JSON-RPC响应，兼容JSON与SSE两种响应体
fn decode_rpc_response(content_type: &str, body: &str, id: u64) -> Result<Value, ToolError> {
    let candidates: Vec<&str> = if content_type.starts_with("text/event-stream") {
        body.lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim)
            .filter(|data| !data.is_empty())
            .collect()
    } else {
        vec![body.trim()]
    };

    for candidate in candidates {
        let Ok(response) = serde_json::from_str::<JsonRpcResponse>(candidate) else {
            continue;
        };
        if response.id.as_ref().and_then(Value::as_u64) != Some(id) {
            continue;
        }
        if let Some(error) = response.error {
            return Err(ToolError::Protocol(format!(
                "JSON-RPC error {}: {}",
                error.code, error.message
            )));
        }
        return Ok(response.result.unwrap_or(Value::Null));
    }

    Err(ToolError::Protocol(format!(
        "no JSON-RPC response with id {} in body",
        id
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_plain_json_response() {
        let body = r#"{"jsonrpc":"2.0","id":7,"result":{"tools":[]}}"#;

        let result = decode_rpc_response("application/json", body, 7).unwrap();

        assert_eq!(result, json!({"tools": []}));
    }

    #[test]
    fn test_decode_sse_response_skips_other_messages() {
        let body = "event: message\n\
                    data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n\n\
                    event: message\n\
                    data: {\"jsonrpc\":\"2.0\",\"id\":3,\"result\":{\"content\":[{\"type\":\"text\",\"text\":\"ok\"}]}}\n\n";

        let result = decode_rpc_response("text/event-stream; charset=utf-8", body, 3).unwrap();
        let call: CallToolResult = serde_json::from_value(result).unwrap();

        assert!(!call.is_error);
        assert!(matches!(&call.content[0], ToolContent::Text { text } if text == "ok"));
    }

    #[test]
    fn test_decode_rpc_error() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"Unknown tool"}}"#;

        let err = decode_rpc_response("application/json", body, 1).unwrap_err();

        assert!(err.to_string().contains("-32602"));
    }

    #[test]
    fn test_decode_mismatched_id() {
        let body = r#"{"jsonrpc":"2.0","id":2,"result":{}}"#;

        assert!(matches!(
            decode_rpc_response("application/json", body, 9),
            Err(ToolError::Protocol(_))
        ));
    }

    #[test]
    fn test_call_result_ignores_non_text_content() {
        let value = json!({
            "content": [
                {"type": "image", "data": "...", "mimeType": "image/png"},
                {"type": "text", "text": "body"}
            ],
            "isError": true
        });

        let call: CallToolResult = serde_json::from_value(value).unwrap();

        assert!(call.is_error);
        assert!(matches!(call.content[0], ToolContent::Other));
    }

    #[tokio::test]
    async fn test_unreachable_servers_are_unavailable() {
        let config = ToolsConfig {
            timeout_seconds: 2,
            servers: vec![McpServerConfig {
                name: "ddg".to_string(),
                url: "http://127.0.0.1:9/mcp".to_string(),
            }],
        };
        let gateway = McpToolGateway::new(&config).unwrap();

        let err = gateway.list_tools().await.unwrap_err();

        assert!(matches!(
            err,
            ToolError::Unavailable(_) | ToolError::Timeout { .. }
        ));
    }
}
