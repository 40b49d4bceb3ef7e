//! 研究结论审查

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::generator::context::GeneratorContext;
use crate::generator::decode::{decode_or_else, schema_hint};
use crate::generator::prompts::{self, render};
use crate::generator::state::{FindingWarning, SupervisorStatus};
use crate::llm::client::{CompletionRequest, ModelTier};
use crate::utils::text::truncate_chars;

/// 模型输出的原始审查结论
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
struct RawVerdict {
    /// One of CLEAR, CONFLICT, AMBIGUOUS, INSUFFICIENT_DATA
    #[serde(default)]
    status: String,
    /// Why this status was chosen
    #[serde(default)]
    reasoning: String,
    /// Question for the user when status is not CLEAR
    #[serde(default)]
    user_question: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SupervisorVerdict {
    pub status: SupervisorStatus,
    pub reasoning: String,
    pub user_question: Option<String>,
    /// 调用或解析失败时的诊断信息
    pub diagnostic: Option<String>,
}

impl SupervisorVerdict {
    /// 非CLEAR但没有给出问题时按CLEAR处理
    pub fn effective_status(&self) -> SupervisorStatus {
        match self.question() {
            Some(_) => self.status,
            None => SupervisorStatus::Clear,
        }
    }

    pub fn question(&self) -> Option<&str> {
        self.user_question
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    pub fn warning(&self) -> Option<FindingWarning> {
        match self.effective_status() {
            SupervisorStatus::Clear => None,
            status => Some(FindingWarning {
                status,
                question: self.question().unwrap_or_default().to_string(),
            }),
        }
    }
}

pub struct Supervisor<'a> {
    context: &'a GeneratorContext,
}

impl<'a> Supervisor<'a> {
    pub fn new(context: &'a GeneratorContext) -> Self {
        Self { context }
    }

    /// 审查单个步骤的结论；解析或调用失败时视为CLEAR
    pub async fn review(&self, task: &str, findings: &str) -> SupervisorVerdict {
        let max_chars = self.context.config.research.max_supervisor_chars;
        let schema = schema_hint::<RawVerdict>();
        let request = CompletionRequest::new(ModelTier::Efficient)
            .system(render(prompts::SUPERVISOR_SYSTEM, &[("schema", schema.as_str())]))
            .user(render(
                prompts::SUPERVISOR_USER,
                &[
                    ("task", task),
                    ("findings", truncate_chars(findings, max_chars)),
                ],
            ))
            .temperature(0.0);

        let raw = match self.context.llm.complete(request).await {
            Ok(completion) => completion.text,
            Err(e) => {
                warn!("⚠️ 结论审查调用失败，按CLEAR处理: {}", e);
                return SupervisorVerdict {
                    diagnostic: Some(format!("Supervisor call failed: {}, treated as CLEAR", e)),
                    ..Default::default()
                };
            }
        };

        let decoded = decode_or_else(&raw, RawVerdict::default);
        let diagnostic = decoded.diagnostic.map(|d| {
            debug!("审查结论解析失败，按CLEAR处理: {}", d);
            format!("Supervisor output unparsable: {}, treated as CLEAR", d)
        });
        let verdict = decoded.value;
        SupervisorVerdict {
            status: SupervisorStatus::parse_or_default(&verdict.status),
            reasoning: verdict.reasoning,
            user_question: verdict.user_question,
            diagnostic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(status: SupervisorStatus, question: Option<&str>) -> SupervisorVerdict {
        SupervisorVerdict {
            status,
            reasoning: String::new(),
            user_question: question.map(String::from),
            diagnostic: None,
        }
    }

    #[test]
    fn test_status_without_question_is_clear() {
        assert_eq!(
            verdict(SupervisorStatus::Conflict, Some("  ")).effective_status(),
            SupervisorStatus::Clear
        );
        assert_eq!(
            verdict(SupervisorStatus::Conflict, Some("Which year?")).effective_status(),
            SupervisorStatus::Conflict
        );
        assert!(verdict(SupervisorStatus::Ambiguous, None).warning().is_none());
    }

    #[test]
    fn test_warning_carries_question() {
        let warning = verdict(SupervisorStatus::InsufficientData, Some("Private company?"))
            .warning()
            .unwrap();
        assert_eq!(warning.status, SupervisorStatus::InsufficientData);
        assert_eq!(warning.question, "Private company?");
    }
}
