//! 外部研究工具的统一网关

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod mcp;

pub use mcp::McpToolGateway;

/// 发现型搜索：返回 {title, url, snippet} 列表
pub const DISCOVERY_SEARCH: &str = "ddg_search";
/// 聚合深度搜索：返回 {direct_answer, sources}
pub const DEEP_SEARCH: &str = "research_query";
/// 动态网页抓取：返回正文文本
pub const SCRAPE_PAGE: &str = "scrape_dynamic_webpage";

/// 工具描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// 工具网关错误
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("tool service unavailable: {0}")]
    Unavailable(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },

    #[error("tool '{tool}' timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// 工具网关：列举可用工具并按名称调用
#[async_trait]
pub trait ToolGateway: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError>;

    async fn invoke(&self, name: &str, arguments: Value) -> Result<String, ToolError>;
}
