//! 与具体Provider无关的模型调用类型

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::tools::ToolDescriptor;

/// 模型档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ModelTier {
    /// 高能效模型，失败时回退到Powerful
    #[default]
    Efficient,
    Powerful,
}

/// 模型请求的工具调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// 发送给模型的消息
#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant {
        text: String,
        tool_calls: Vec<ToolCall>,
    },
    /// 工具执行结果（包括捕获的错误文本）
    Observation { tool: String, content: String },
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        ChatMessage::System(text.into())
    }

    pub fn user(text: impl Into<String>) -> Self {
        ChatMessage::User(text.into())
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        ChatMessage::Assistant {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn observation(tool: impl Into<String>, content: impl Into<String>) -> Self {
        ChatMessage::Observation {
            tool: tool.into(),
            content: content.into(),
        }
    }

    pub fn is_observation(&self) -> bool {
        matches!(self, ChatMessage::Observation { .. })
    }

    /// 消息的纯文本形式
    pub fn text(&self) -> &str {
        match self {
            ChatMessage::System(text) | ChatMessage::User(text) => text,
            ChatMessage::Assistant { text, .. } => text,
            ChatMessage::Observation { content, .. } => content,
        }
    }

    /// 渲染为可以作为普通对话内容发送的文本
    pub fn render(&self) -> String {
        match self {
            ChatMessage::System(text) | ChatMessage::User(text) => text.clone(),
            ChatMessage::Assistant { text, tool_calls } => {
                let mut rendered = text.clone();
                for call in tool_calls {
                    if !rendered.is_empty() {
                        rendered.push('\n');
                    }
                    rendered.push_str(&format!("[tool call] {}({})", call.name, call.arguments));
                }
                rendered
            }
            ChatMessage::Observation { tool, content } => {
                format!("Tool '{}' Output: {}", tool, content)
            }
        }
    }
}

/// 一次模型调用请求
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDescriptor>,
    pub tier: ModelTier,
    pub temperature: Option<f64>,
}

impl CompletionRequest {
    pub fn new(tier: ModelTier) -> Self {
        Self {
            tier,
            ..Default::default()
        }
    }

    pub fn system(mut self, text: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::system(text));
        self
    }

    pub fn user(mut self, text: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::user(text));
        self
    }

    pub fn messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolDescriptor>) -> Self {
        self.tools = tools;
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// 模型返回
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    pub fn into_message(self) -> ChatMessage {
        ChatMessage::Assistant {
            text: self.text,
            tool_calls: self.tool_calls,
        }
    }
}

/// 语言模型接口
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion>;
}
