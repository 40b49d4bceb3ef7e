//! 单元测试使用的模型与工具替身

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config::Config;
use crate::generator::context::GeneratorContext;
use crate::llm::client::{Completion, CompletionRequest, LanguageModel, ToolCall};
use crate::llm::tools::{
    DEEP_SEARCH, DISCOVERY_SEARCH, SCRAPE_PAGE, ToolDescriptor, ToolError, ToolGateway,
};

/// 按脚本依次返回结果的模型
#[derive(Default)]
pub struct ScriptedModel {
    script: Mutex<VecDeque<Result<Completion, String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Ok(Completion::text(text)));
        self
    }

    pub fn tool_calls(self, calls: &[(&str, Value)]) -> Self {
        let tool_calls = calls
            .iter()
            .enumerate()
            .map(|(i, (name, arguments))| ToolCall {
                id: format!("call_{}", i),
                name: name.to_string(),
                arguments: arguments.clone(),
            })
            .collect();
        self.script.lock().unwrap().push_back(Ok(Completion {
            text: String::new(),
            tool_calls,
        }));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        self.requests.lock().unwrap().push(request);
        match self.script.lock().unwrap().pop_front() {
            Some(Ok(completion)) => Ok(completion),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("script exhausted")),
        }
    }
}

/// 记录调用的工具网关替身
pub struct StubGateway {
    available: bool,
    tools: Vec<ToolDescriptor>,
    overrides: HashMap<String, Result<String, String>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl StubGateway {
    /// 提供三个标准研究工具
    pub fn standard() -> Self {
        let tools = [DISCOVERY_SEARCH, DEEP_SEARCH, SCRAPE_PAGE]
            .into_iter()
            .map(|name| ToolDescriptor {
                name: name.to_string(),
                description: format!("{} tool", name),
                input_schema: json!({"type": "object"}),
            })
            .collect();
        Self {
            available: true,
            tools,
            overrides: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::standard()
        }
    }

    pub fn respond(mut self, tool: &str, output: &str) -> Self {
        self.overrides
            .insert(tool.to_string(), Ok(output.to_string()));
        self
    }

    pub fn fail(mut self, tool: &str, message: &str) -> Self {
        self.overrides
            .insert(tool.to_string(), Err(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, tool: &str) -> usize {
        self.calls().iter().filter(|(name, _)| name == tool).count()
    }

    fn default_output(name: &str, arguments: &Value) -> String {
        match name {
            DISCOVERY_SEARCH => json!([
                {"title": "Result A", "url": "https://example.com/a", "snippet": "a"},
                {"title": "Result B", "url": "https://example.com/b", "snippet": "b"},
                {"title": "Result C", "url": "https://example.com/c", "snippet": "c"}
            ])
            .to_string(),
            DEEP_SEARCH => json!({
                "direct_answer": "Deep search answer with revenue figures and recent news.",
                "sources": [{"url": "https://deep.example.com/report"}]
            })
            .to_string(),
            _ => format!(
                "Scraped content of {}",
                arguments.get("url").and_then(Value::as_str).unwrap_or("?")
            ),
        }
    }
}

#[async_trait]
impl ToolGateway for StubGateway {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        if !self.available {
            return Err(ToolError::Unavailable("connection refused".to_string()));
        }
        Ok(self.tools.clone())
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));

        if !self.tools.iter().any(|t| t.name == name) {
            return Err(ToolError::UnknownTool(name.to_string()));
        }
        match self.overrides.get(name) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(message)) => Err(ToolError::Execution {
                tool: name.to_string(),
                message: message.clone(),
            }),
            None => Ok(Self::default_output(name, &arguments)),
        }
    }
}

pub fn test_context(model: Arc<ScriptedModel>, gateway: Arc<StubGateway>) -> GeneratorContext {
    GeneratorContext::with_parts(Config::default(), model, gateway)
}
