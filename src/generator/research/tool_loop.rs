//! 有界的工具调用循环

use serde_json::Value;
use tracing::{debug, warn};

use crate::generator::context::GeneratorContext;
use crate::generator::state::TraceEntry;
use crate::llm::client::{ChatMessage, CompletionRequest, ModelTier, ToolCall};
use crate::llm::tools::{DEEP_SEARCH, SCRAPE_PAGE, ToolDescriptor};
use crate::utils::text::{dedup_preserving_order, excerpt, extract_urls};

/// 工具循环的退出方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// 模型不再请求工具
    Answered,
    /// 达到轮次上限
    Exhausted,
    /// 模型调用失败
    Failed,
}

/// 单个研究步骤内累积的消息、轨迹与来源
pub struct ResearchSession<'a> {
    context: &'a GeneratorContext,
    tools: &'a [ToolDescriptor],
    step: String,
    pub messages: Vec<ChatMessage>,
    pub trace: Vec<TraceEntry>,
    pub harvested_urls: Vec<String>,
    pub scraped_urls: Vec<String>,
}

impl<'a> ResearchSession<'a> {
    pub fn new(
        context: &'a GeneratorContext,
        tools: &'a [ToolDescriptor],
        step: impl Into<String>,
        messages: Vec<ChatMessage>,
    ) -> Self {
        Self {
            context,
            tools,
            step: step.into(),
            messages,
            trace: Vec::new(),
            harvested_urls: Vec::new(),
            scraped_urls: Vec::new(),
        }
    }

    pub fn step(&self) -> &str {
        &self.step
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }

    pub fn used_tool(&self, name: &str) -> bool {
        self.trace.iter().any(|entry| entry.tool_name() == Some(name))
    }

    /// 本步骤是否已经使用过深度搜索
    pub fn deep_search_used(&self) -> bool {
        self.used_tool(DEEP_SEARCH)
    }

    /// 本步骤涉及的全部链接，去重
    pub fn sources(&self) -> Vec<String> {
        dedup_preserving_order(
            self.harvested_urls
                .iter()
                .chain(self.scraped_urls.iter())
                .cloned(),
        )
    }

    pub fn last_is_observation(&self) -> bool {
        self.messages.last().is_some_and(ChatMessage::is_observation)
    }

    pub fn trace_error(&mut self, content: impl Into<String>) {
        self.trace.push(TraceEntry::error(self.step.clone(), content));
    }

    /// 让模型在限定轮次内自主调用工具
    pub async fn run(&mut self, max_turns: usize) -> LoopExit {
        for turn in 0..max_turns {
            let request = CompletionRequest::new(ModelTier::Powerful)
                .messages(self.messages.clone())
                .tools(self.tools.to_vec())
                .temperature(0.0);

            let completion = match self.context.llm.complete(request).await {
                Ok(completion) => completion,
                Err(e) => {
                    warn!("❌ 研究步骤模型调用失败: {}", e);
                    self.trace_error(format!("Model call failed: {}", e));
                    return LoopExit::Failed;
                }
            };

            if !completion.has_tool_calls() {
                self.messages.push(completion.into_message());
                debug!("第 {} 轮模型给出答案，结束工具循环", turn + 1);
                return LoopExit::Answered;
            }

            let calls = completion.tool_calls.clone();
            self.messages.push(completion.into_message());

            for call in calls {
                self.execute_call(call).await;
            }
        }
        LoopExit::Exhausted
    }

    async fn execute_call(&mut self, call: ToolCall) {
        debug!("🔧 调用工具 {}: {}", call.name, call.arguments);
        let output = if self.has_tool(&call.name) {
            match self
                .context
                .tools
                .invoke(&call.name, call.arguments.clone())
                .await
            {
                Ok(output) => output,
                Err(e) => format!("Error executing {}: {}", call.name, e),
            }
        } else {
            format!(
                "Error executing {}: tool is not available in this session",
                call.name
            )
        };

        self.harvested_urls.extend(extract_urls(&output));
        self.harvested_urls.extend(argument_urls(&call.arguments));
        if call.name == SCRAPE_PAGE
            && let Some(url) = call.arguments.get("url").and_then(Value::as_str)
        {
            self.scraped_urls.push(url.to_string());
        }

        self.record(&call.name, call.arguments, output);
    }

    /// 记录一次工具执行的观察结果与轨迹
    pub fn record(&mut self, tool: &str, input: Value, output: String) {
        let trace_chars = self.context.config.research.trace_output_chars;
        self.trace.push(TraceEntry::ToolExecution {
            step: self.step.clone(),
            tool: tool.to_string(),
            input,
            output: excerpt(&output, trace_chars),
        });
        self.messages.push(ChatMessage::observation(tool, output));
    }

    /// 已抓取的不同链接数
    pub fn distinct_scraped(&self) -> usize {
        dedup_preserving_order(self.scraped_urls.iter().cloned()).len()
    }
}

/// 从 `url` / `urls` 参数中取出链接
pub fn argument_urls(arguments: &Value) -> Vec<String> {
    let mut urls = Vec::new();
    if let Some(url) = arguments.get("url").and_then(Value::as_str) {
        urls.push(url.to_string());
    }
    if let Some(list) = arguments.get("urls").and_then(Value::as_array) {
        urls.extend(list.iter().filter_map(Value::as_str).map(String::from));
    }
    urls
}
