//! 报告撰写

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::generator::context::GeneratorContext;
use crate::generator::prompts::{self, render};
use crate::generator::state::{ConversationState, Finding, FindingWarning, StateUpdate};
use crate::generator::types::{Stage, StageNode};
use crate::llm::client::{CompletionRequest, ModelTier};
use crate::types::last_report;

pub const NO_RESEARCH_DATA: &str =
    "No new research data gathered. Rely on Previous Report and User Instructions.";

pub const NO_PREVIOUS_REPORT: &str = "No previous report found in conversation history.";

pub const UNCERTAINTY_HEADER: &str = "Outstanding Questions & Critical Uncertainties";

const WRITER_FAILURE: &str = "I was unable to compile the final report due to a model error. \
Here are the raw research findings gathered so far:";

const WRITER_TEMPERATURE: f64 = 0.4;

pub fn render_research_data(findings: &[Finding]) -> String {
    if findings.is_empty() {
        return NO_RESEARCH_DATA.to_string();
    }
    findings
        .iter()
        .map(Finding::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 最近一份报告，其次是本轮携带的报告，均加上会话摘要
pub fn previous_report(state: &ConversationState) -> String {
    let report = match last_report(state.prior_messages()) {
        Some(message) => message.content.clone(),
        None if !state.final_report.trim().is_empty() => state.final_report.clone(),
        None => NO_PREVIOUS_REPORT.to_string(),
    };

    let summary = state.conversation_summary.trim();
    if summary.is_empty() {
        report
    } else {
        format!("Conversation Summary:\n{}\n\n{}", summary, report)
    }
}

/// 去重后的结论告警，保持出现顺序
pub fn collect_warnings(findings: &[Finding]) -> Vec<FindingWarning> {
    let mut warnings: Vec<FindingWarning> = Vec::new();
    for warning in findings.iter().filter_map(Finding::warning) {
        if !warnings.contains(warning) {
            warnings.push(warning.clone());
        }
    }
    warnings
}

/// 有告警且正文尚未包含待确认问题章节时追加该章节
pub fn append_uncertainty_section(report: &str, warnings: &[FindingWarning]) -> String {
    let mut output = report.to_string();
    if warnings.is_empty() || report.contains(UNCERTAINTY_HEADER) {
        return output;
    }

    output.push_str(&format!("\n\n### ❓ {}\n", UNCERTAINTY_HEADER));
    for warning in warnings {
        output.push_str(&format!("- {}: {}\n", warning.status, warning.question));
    }
    output
}

#[derive(Default)]
pub struct Writer;

#[async_trait]
impl StageNode for Writer {
    fn stage(&self) -> Stage {
        Stage::Writer
    }

    async fn execute(
        &self,
        context: &GeneratorContext,
        state: &ConversationState,
    ) -> Result<StateUpdate> {
        let research_data = render_research_data(&state.research_data);
        let previous = previous_report(state);
        let warnings = collect_warnings(&state.research_data);

        let date = chrono::Utc::now().format("%B %d, %Y").to_string();
        let persona = state.persona.to_string();
        let target = if state.company_input.trim().is_empty() {
            state.latest_user_input()
        } else {
            state.company_input.as_str()
        };

        let request = CompletionRequest::new(ModelTier::Powerful)
            .system(render(
                prompts::WRITER_SYSTEM,
                &[
                    ("date", date.as_str()),
                    ("persona", persona.as_str()),
                    (
                        "language",
                        context.config.target_language.prompt_instruction(),
                    ),
                ],
            ))
            .user(render(
                prompts::WRITER_USER,
                &[
                    ("target", target),
                    ("research_data", research_data.as_str()),
                    ("previous_report", previous.as_str()),
                ],
            ))
            .temperature(WRITER_TEMPERATURE);

        let report = match context.llm.complete(request).await {
            Ok(completion) => {
                info!("📝 报告撰写完成，共 {} 个研究结论", state.research_data.len());
                completion.text.trim().to_string()
            }
            Err(e) => {
                warn!("❌ 报告撰写失败，返回原始研究结论: {}", e);
                format!("{}\n\n{}", WRITER_FAILURE, research_data)
            }
        };

        Ok(StateUpdate {
            final_report: Some(append_uncertainty_section(&report, &warnings)),
            ..Default::default()
        })
    }
}
