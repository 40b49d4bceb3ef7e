//! LLM Provider支持模块

use anyhow::Result;
use rig::{
    client::CompletionClient,
    completion::{AssistantContent, CompletionModel, Message, ToolDefinition},
    providers::gemini::completion::gemini_api_types::{AdditionalParameters, GenerationConfig},
};
use serde_json::Value;

use super::types::{ChatMessage, Completion, CompletionRequest, ToolCall};
use crate::config::{LLMConfig, LLMProvider};

/// 统一的Provider客户端枚举
#[derive(Clone)]
pub enum ProviderClient {
    OpenAI(rig::providers::openai::Client),
    DeepSeek(rig::providers::deepseek::Client),
    OpenRouter(rig::providers::openrouter::Client),
    Anthropic(rig::providers::anthropic::Client),
    Gemini(rig::providers::gemini::Client),
    Ollama(rig::providers::ollama::Client),
}

impl ProviderClient {
    /// 根据配置创建相应的provider客户端
    pub fn new(config: &LLMConfig) -> Result<Self> {
        match config.provider {
            LLMProvider::OpenAI => {
                let client = rig::providers::openai::Client::builder(&config.api_key)
                    .base_url(&config.api_base_url)
                    .build();
                Ok(ProviderClient::OpenAI(client))
            }
            LLMProvider::DeepSeek => {
                let client = rig::providers::deepseek::Client::builder(&config.api_key)
                    .base_url(&config.api_base_url)
                    .build();
                Ok(ProviderClient::DeepSeek(client))
            }
            LLMProvider::OpenRouter => {
                let client = rig::providers::openrouter::Client::builder(&config.api_key).build();
                Ok(ProviderClient::OpenRouter(client))
            }
            LLMProvider::Anthropic => {
                let client =
                    rig::providers::anthropic::ClientBuilder::new(&config.api_key).build()?;
                Ok(ProviderClient::Anthropic(client))
            }
            LLMProvider::Gemini => {
                let client = rig::providers::gemini::Client::builder(&config.api_key).build()?;
                Ok(ProviderClient::Gemini(client))
            }
            LLMProvider::Ollama => {
                let client = rig::providers::ollama::Client::builder().build();
                Ok(ProviderClient::Ollama(client))
            }
        }
    }

    /// 使用指定模型执行一次补全
    pub async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
        config: &LLMConfig,
    ) -> Result<Completion> {
        match self {
            ProviderClient::OpenAI(client) => {
                let completion_model = client.completion_model(model).completions_api();
                send(completion_model, request, config, None).await
            }
            ProviderClient::DeepSeek(client) => {
                send(client.completion_model(model), request, config, None).await
            }
            ProviderClient::OpenRouter(client) => {
                send(client.completion_model(model), request, config, None).await
            }
            ProviderClient::Anthropic(client) => {
                send(client.completion_model(model), request, config, None).await
            }
            ProviderClient::Gemini(client) => {
                let gen_cfg = GenerationConfig::default();
                let cfg = AdditionalParameters::default().with_config(gen_cfg);
                let params = serde_json::to_value(cfg)?;
                send(client.completion_model(model), request, config, Some(params)).await
            }
            ProviderClient::Ollama(client) => {
                send(client.completion_model(model), request, config, None).await
            }
        }
    }
}

/// 将消息序列拆分为 preamble、历史和最后一条提示
fn split_messages(messages: &[ChatMessage]) -> (String, Vec<Message>, Message) {
    let mut preamble = Vec::new();
    let mut turns = Vec::new();

    for message in messages {
        match message {
            ChatMessage::System(text) => preamble.push(text.clone()),
            ChatMessage::User(_) | ChatMessage::Observation { .. } => {
                turns.push(Message::user(message.render()))
            }
            ChatMessage::Assistant { .. } => turns.push(Message::assistant(message.render())),
        }
    }

    // rig要求以一条提示结尾，空会话时补一条空提示
    let prompt = turns.pop().unwrap_or_else(|| Message::user(""));
    (preamble.join("\n\n"), turns, prompt)
}

async fn send<M>(
    model: M,
    request: &CompletionRequest,
    config: &LLMConfig,
    additional_params: Option<Value>,
) -> Result<Completion>
where
    M: CompletionModel,
{
    let (preamble, history, prompt) = split_messages(&request.messages);
    let tools: Vec<ToolDefinition> = request
        .tools
        .iter()
        .map(|tool| ToolDefinition {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.input_schema.clone(),
        })
        .collect();

    let mut builder = model
        .completion_request(prompt)
        .messages(history)
        .tools(tools)
        .temperature(request.temperature.unwrap_or(config.temperature))
        .max_tokens(config.max_tokens.into());
    if !preamble.is_empty() {
        builder = builder.preamble(preamble);
    }
    if let Some(params) = additional_params {
        builder = builder.additional_params(params);
    }

    let response = builder.send().await?;

    let mut completion = Completion::default();
    for content in response.choice.into_iter() {
        match content {
            AssistantContent::Text(text) => {
                if !completion.text.is_empty() {
                    completion.text.push('\n');
                }
                completion.text.push_str(&text.text);
            }
            AssistantContent::ToolCall(call) => completion.tool_calls.push(ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            }),
            _ => {}
        }
    }

    Ok(completion)
}
