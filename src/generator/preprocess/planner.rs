//! 研究计划生成

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::PlannerConfig;
use crate::generator::context::GeneratorContext;
use crate::generator::decode::decode;
use crate::generator::prompts::{self, render};
use crate::generator::state::{ConversationState, Persona, StateUpdate, StepCursor, TraceEntry};
use crate::generator::types::{Stage, StageNode};
use crate::llm::client::{CompletionRequest, ModelTier};
use crate::types::last_report;
use crate::utils::text::{excerpt, truncate_chars};

/// 计划中表示请求存在歧义的前缀
pub const AMBIGUITY_MARKER: &str = "AMBIGUOUS_REQUEST:";

/// 用户输入中的指代词，命中时需要带上一份报告作为上下文
const ANAPHORIC_REFERENCES: [&str; 5] = ["the company", "this company", "it ", "its ", "their "];

pub const BLANK_INPUT_MESSAGE: &str = "Please provide a specific company or research topic.";

/// 计划解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    Steps(Vec<String>),
    NeedsClarification { question: String },
}

/// 清洗模型返回的计划：丢弃空步骤与非字符串项，逐条截断后限制步骤数
pub fn parse_plan(
    raw: &str,
    max_steps: usize,
    max_step_chars: usize,
) -> Result<PlanOutcome, String> {
    let items: Vec<Value> = decode(raw)?;
    if items.is_empty() {
        return Err("Invalid plan structure".to_string());
    }

    let steps: Vec<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|step| !step.is_empty())
        .map(|step| truncate_chars(step, max_step_chars).to_string())
        .take(max_steps)
        .collect();

    if steps.is_empty() {
        return Err("No valid steps in plan".to_string());
    }

    if let [only] = steps.as_slice()
        && let Some(question) = only.strip_prefix(AMBIGUITY_MARKER)
    {
        return Ok(PlanOutcome::NeedsClarification {
            question: question.trim().to_string(),
        });
    }

    Ok(PlanOutcome::Steps(steps))
}

pub fn fallback_plan(company_input: &str) -> Vec<String> {
    vec![
        format!("Research company overview for {}", company_input),
        format!("Analyze market position of {}", company_input),
    ]
}

fn step_limit(config: &PlannerConfig, persona: Persona) -> usize {
    match persona {
        Persona::Efficient => config.efficient_max_steps.min(config.max_steps),
        _ => config.max_steps,
    }
}

fn needs_previous_report(persona: Persona, company_input: &str) -> bool {
    match persona {
        Persona::Update | Persona::Edit => true,
        Persona::Task | Persona::Efficient => {
            let lowered = company_input.to_lowercase();
            ANAPHORIC_REFERENCES.iter().any(|r| lowered.contains(r))
        }
        _ => false,
    }
}

#[derive(Default)]
pub struct Planner;

impl Planner {
    /// 组装摘要与上一份报告的上下文
    fn build_context(&self, context: &GeneratorContext, state: &ConversationState) -> String {
        let mut sections = Vec::new();

        if !state.conversation_summary.trim().is_empty() {
            sections.push(format!(
                "CONVERSATION SUMMARY:\n{}",
                state.conversation_summary
            ));
        }

        if needs_previous_report(state.persona, &state.company_input)
            && let Some(report) = last_report(state.prior_messages())
        {
            let excerpt_chars = context.config.conversation.report_excerpt_chars;
            sections.push(format!(
                "PREVIOUS REPORT CONTEXT:\n{}",
                excerpt(&report.content, excerpt_chars)
            ));
        }

        sections.join("\n\n")
    }

    async fn request_plan(
        &self,
        context: &GeneratorContext,
        state: &ConversationState,
        max_steps: usize,
    ) -> Result<PlanOutcome> {
        let system = match state.persona {
            Persona::Efficient => prompts::PLANNER_EFFICIENT_SYSTEM,
            _ => prompts::PLANNER_SYSTEM,
        };
        let max_steps_text = max_steps.to_string();
        let plan_context = self.build_context(context, state);
        let persona = state.persona.to_string();

        let request = CompletionRequest::new(ModelTier::Powerful)
            .system(render(system, &[("max_steps", max_steps_text.as_str())]))
            .user(render(
                prompts::PLANNER_USER,
                &[
                    ("query", state.company_input.as_str()),
                    ("persona", persona.as_str()),
                    ("context", plan_context.as_str()),
                ],
            ))
            .temperature(0.0);

        let completion = context.llm.complete(request).await?;
        parse_plan(
            &completion.text,
            max_steps,
            context.config.planner.max_step_chars,
        )
        .map_err(anyhow::Error::msg)
    }
}

#[async_trait]
impl StageNode for Planner {
    fn stage(&self) -> Stage {
        Stage::Planner
    }

    async fn execute(
        &self,
        context: &GeneratorContext,
        state: &ConversationState,
    ) -> Result<StateUpdate> {
        let mut update = StateUpdate {
            cursor: Some(StepCursor::Reset),
            reset_research: true,
            ..Default::default()
        };

        let company_input = state.company_input.trim();
        if company_input.is_empty() {
            update.research_plan = Some(Vec::new());
            update.final_report = Some(BLANK_INPUT_MESSAGE.to_string());
            return Ok(update);
        }

        let max_steps = step_limit(&context.config.planner, state.persona);
        match self.request_plan(context, state, max_steps).await {
            Ok(PlanOutcome::Steps(steps)) => {
                info!("📋 生成研究计划，共 {} 个步骤", steps.len());
                update.research_plan = Some(steps);
            }
            Ok(PlanOutcome::NeedsClarification { question }) => {
                info!("❓ 研究目标存在歧义，需要用户澄清");
                update.research_plan = Some(Vec::new());
                update.clarification_needed = Some(true);
                update.clarification_question = Some(question.clone());
                update.final_report = Some(question);
            }
            Err(e) => {
                warn!("⚠️ 研究计划生成失败，使用默认计划: {}", e);
                update.research_plan = Some(fallback_plan(company_input));
                update.thought_trace.push(TraceEntry::error(
                    "planning",
                    format!("Plan generation failed: {}, using fallback plan", e),
                ));
            }
        }

        Ok(update)
    }
}
