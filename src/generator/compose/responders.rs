//! 闲聊与澄清两个终止阶段

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::generator::context::GeneratorContext;
use crate::generator::prompts::{self, render};
use crate::generator::research::clarification_message;
use crate::generator::state::{ConversationState, Persona, StateUpdate};
use crate::generator::types::{Stage, StageNode};
use crate::llm::client::{ChatMessage, CompletionRequest, ModelTier};
use crate::types::{Role, TurnMessage};

pub const CHAT_FALLBACK: &str = "I'm here to help with company research and business analysis. What company would you like me to research?";

pub const IRRELEVANT_DEFAULT: &str = "I can only help with company research and business analysis. Please provide a relevant research request.";

pub const CLARIFIER_FALLBACK: &str = "I'd love to help, but I need a bit more detail first:\n\n\
1. Which company would you like me to research?\n\
2. Which aspect matters most to you (financials, competitors, leadership, recent news)?\n\
3. Is there a time frame you care about?\n\n\
For example: \"Research Tesla's financial performance in 2024\" or \"Quick summary of Nvidia's recent news\".";

const CHAT_TEMPERATURE: f64 = 0.7;

fn reply(text: String) -> StateUpdate {
    StateUpdate {
        messages: vec![TurnMessage::assistant(text.clone())],
        final_report: Some(text),
        ..Default::default()
    }
}

/// 最近 `recent_turns` 条历史加上本轮输入，更早的内容由滚动摘要承载
fn history_messages(state: &ConversationState, recent_turns: usize) -> Vec<ChatMessage> {
    let start = state
        .messages
        .len()
        .saturating_sub(recent_turns.saturating_add(1));
    state.messages[start..]
        .iter()
        .map(|m| match m.role {
            Role::User => ChatMessage::user(m.content.clone()),
            Role::Assistant => ChatMessage::assistant(m.content.clone()),
        })
        .collect()
}

#[derive(Default)]
pub struct Chat;

#[async_trait]
impl StageNode for Chat {
    fn stage(&self) -> Stage {
        Stage::Chat
    }

    async fn execute(
        &self,
        context: &GeneratorContext,
        state: &ConversationState,
    ) -> Result<StateUpdate> {
        if state.persona == Persona::Irrelevant {
            let message = if state.final_report.trim().is_empty() {
                IRRELEVANT_DEFAULT.to_string()
            } else {
                state.final_report.clone()
            };
            return Ok(reply(message));
        }

        let mut system = prompts::CHAT_SYSTEM.to_string();
        if state.persona == Persona::Chatty {
            system.push_str(prompts::CHAT_CHATTY_ADDENDUM);
        }
        if !state.conversation_summary.trim().is_empty() {
            system.push_str("\n\nConversation Summary:\n");
            system.push_str(state.conversation_summary.trim());
        }
        let recent_turns = context.config.conversation.recent_turns;
        let request = CompletionRequest::new(ModelTier::Efficient)
            .system(system)
            .messages(history_messages(state, recent_turns))
            .temperature(CHAT_TEMPERATURE);

        let text = match context.llm.complete(request).await {
            Ok(completion) if !completion.text.trim().is_empty() => {
                completion.text.trim().to_string()
            }
            Ok(_) => CHAT_FALLBACK.to_string(),
            Err(e) => {
                warn!("⚠️ 闲聊回复失败: {}", e);
                CHAT_FALLBACK.to_string()
            }
        };
        info!("💬 闲聊回复完成");
        Ok(reply(text))
    }
}

#[derive(Default)]
pub struct Clarifier;

#[async_trait]
impl StageNode for Clarifier {
    fn stage(&self) -> Stage {
        Stage::Clarifier
    }

    async fn execute(
        &self,
        context: &GeneratorContext,
        state: &ConversationState,
    ) -> Result<StateUpdate> {
        let text = match state.clarification_question.as_deref() {
            Some(question) if !question.trim().is_empty() => clarification_message(question.trim()),
            _ => {
                let persona = state.persona.to_string();
                let request = CompletionRequest::new(ModelTier::Efficient)
                    .system(prompts::CLARIFIER_SYSTEM)
                    .user(render(
                        prompts::CLARIFIER_USER,
                        &[
                            ("input", state.latest_user_input()),
                            ("persona", persona.as_str()),
                        ],
                    ))
                    .temperature(CHAT_TEMPERATURE);
                match context.llm.complete(request).await {
                    Ok(completion) if !completion.text.trim().is_empty() => {
                        completion.text.trim().to_string()
                    }
                    Ok(_) => CLARIFIER_FALLBACK.to_string(),
                    Err(e) => {
                        warn!("⚠️ 澄清问题生成失败: {}", e);
                        CLARIFIER_FALLBACK.to_string()
                    }
                }
            }
        };

        info!("❓ 请求用户澄清");
        Ok(StateUpdate {
            clarification_needed: Some(true),
            ..reply(text)
        })
    }
}
