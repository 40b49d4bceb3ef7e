//! 意图识别：输入防护、滚动摘要与用户画像分类

use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::generator::context::GeneratorContext;
use crate::generator::decode::{decode, schema_hint};
use crate::generator::preprocess::guard::InputGuard;
use crate::generator::prompts::{self, render};
use crate::generator::state::{ConversationState, Persona, StateUpdate, TraceEntry};
use crate::generator::types::{Stage, StageNode};
use crate::llm::client::{CompletionRequest, ModelTier};
use crate::utils::text::tail_chars;

/// 模型返回的分类结果
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct ManagerDecision {
    /// One of CHATTY, CONFUSED, TASK, EFFICIENT, UPDATE, EDIT, IRRELEVANT
    #[serde(default)]
    pub persona: String,
    /// Short note on how downstream stages should respond
    #[serde(default)]
    pub response_guidance: Option<String>,
    /// Self-contained research query with pronouns resolved
    #[serde(default)]
    pub refined_query: Option<String>,
    /// Company named or implied by the user, if any
    #[serde(default)]
    pub detected_entity: Option<String>,
}

pub struct Manager {
    guard: InputGuard,
}

impl Manager {
    pub fn new(config: &Config) -> Self {
        Self {
            guard: InputGuard::new(&config.guard),
        }
    }

    /// 历史超过阈值时刷新滚动摘要
    async fn refresh_summary(
        &self,
        context: &GeneratorContext,
        state: &ConversationState,
    ) -> Result<Option<String>> {
        let conversation = &context.config.conversation;
        if state.messages.len() <= conversation.summary_threshold {
            return Ok(None);
        }

        let prior = state.prior_messages();
        let existing = state.conversation_summary.trim();
        let segment = if existing.is_empty() {
            prior
        } else {
            &prior[prior.len().saturating_sub(conversation.summary_window)..]
        };

        let transcript = segment
            .iter()
            .map(|m| m.transcript_line())
            .collect::<Vec<_>>()
            .join("\n");
        let transcript = tail_chars(&transcript, conversation.summary_input_chars);

        let user_prompt = render(
            prompts::SUMMARY_USER,
            &[
                ("summary", if existing.is_empty() { "None" } else { existing }),
                ("segment", transcript),
            ],
        );
        let request = CompletionRequest::new(ModelTier::Efficient)
            .system(prompts::SUMMARY_SYSTEM)
            .user(user_prompt)
            .temperature(0.0);

        let summary = context.llm.complete(request).await?.text.trim().to_string();
        Ok((!summary.is_empty()).then_some(summary))
    }

    async fn classify(
        &self,
        context: &GeneratorContext,
        state: &ConversationState,
        summary: &str,
        sanitized: &str,
    ) -> Result<ManagerDecision> {
        let recent_turns = context.config.conversation.recent_turns;
        let prior = state.prior_messages();
        let history = prior[prior.len().saturating_sub(recent_turns)..]
            .iter()
            .map(|m| m.transcript_line())
            .collect::<Vec<_>>()
            .join("\n");

        let schema = schema_hint::<ManagerDecision>();
        let user_prompt = render(
            prompts::MANAGER_USER,
            &[
                ("summary", if summary.is_empty() { "None" } else { summary }),
                ("history", history.as_str()),
                ("input", sanitized),
            ],
        );
        let request = CompletionRequest::new(ModelTier::Efficient)
            .system(render(prompts::MANAGER_SYSTEM, &[("schema", schema.as_str())]))
            .user(user_prompt)
            .temperature(0.0);

        let completion = context.llm.complete(request).await?;
        decode::<ManagerDecision>(&completion.text).map_err(anyhow::Error::msg)
    }
}

#[async_trait]
impl StageNode for Manager {
    fn stage(&self) -> Stage {
        Stage::Manager
    }

    async fn execute(
        &self,
        context: &GeneratorContext,
        state: &ConversationState,
    ) -> Result<StateUpdate> {
        let raw = state.latest_user_input();
        let sanitized = match self.guard.validate(raw) {
            Ok(sanitized) => sanitized,
            Err(reason) => {
                warn!("🛡️ 输入被拦截: {}", reason);
                return Ok(StateUpdate {
                    persona: Some(Persona::Irrelevant),
                    final_report: Some(rejection_message(&reason.to_string())),
                    ..Default::default()
                });
            }
        };

        let mut update = StateUpdate {
            sanitized_input: Some(sanitized.clone()),
            ..Default::default()
        };

        let refreshed = match self.refresh_summary(context, state).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                warn!("⚠️ 会话摘要刷新失败，沿用已有摘要: {}", e);
                None
            }
        };
        let summary = refreshed
            .clone()
            .unwrap_or_else(|| state.conversation_summary.clone());
        update.conversation_summary = refreshed;

        let (persona, company_input) =
            match self.classify(context, state, &summary, &sanitized).await {
                Ok(decision) => {
                    debug!("意图识别结果: {:?}", decision);
                    let persona = Persona::parse_or_default(&decision.persona);
                    (persona, resolve_company_input(&decision, &sanitized))
                }
                Err(e) => {
                    let persona = heuristic_persona(&sanitized);
                    warn!("⚠️ 意图识别失败，使用关键词规则 ({}): {}", persona, e);
                    update.thought_trace.push(TraceEntry::diagnostic(
                        Stage::Manager.as_str(),
                        format!(
                            "Classification failed: {}, using heuristic persona {}",
                            e, persona
                        ),
                    ));
                    (persona, sanitized.clone())
                }
            };

        info!("🧭 意图识别: {} -> {}", persona, company_input);
        update.persona = Some(persona);
        update.company_input = Some(company_input);
        Ok(update)
    }
}

pub fn rejection_message(reason: &str) -> String {
    format!(
        "I cannot process this request. {}. Please provide a valid company research request.",
        reason
    )
}

/// 优先使用更完整的改写查询；只识别出公司时以公司名作前缀
pub fn resolve_company_input(decision: &ManagerDecision, sanitized: &str) -> String {
    let refined = decision
        .refined_query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty());
    let entity = decision
        .detected_entity
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    match (refined, entity) {
        (Some(refined), _) if refined.chars().count() > sanitized.chars().count() => {
            refined.to_string()
        }
        (None, Some(entity)) => format!("{}: {}", entity, sanitized),
        _ => sanitized.to_string(),
    }
}

/// 按整词匹配的关键词规则
pub fn heuristic_persona(input: &str) -> Persona {
    let lowered = input.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let has_any = |keys: &[&str]| words.iter().any(|w| keys.contains(w));

    if has_any(&["hello", "hi", "hey"]) {
        Persona::Chatty
    } else if has_any(&["help", "what", "how"]) {
        Persona::Confused
    } else if has_any(&["quick", "fast", "summary"]) {
        Persona::Efficient
    } else if has_any(&["rewrite", "format", "table", "edit", "change"]) {
        Persona::Edit
    } else {
        Persona::Task
    }
}
