//! 单轮对话内在各阶段之间传递的会话状态

use std::fmt::{Display, Formatter};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::TurnMessage;

/// 用户意图分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Persona {
    Chatty,
    Confused,
    #[default]
    Task,
    Efficient,
    Update,
    Edit,
    Irrelevant,
}

impl Persona {
    pub const ALL: [Persona; 7] = [
        Persona::Chatty,
        Persona::Confused,
        Persona::Task,
        Persona::Efficient,
        Persona::Update,
        Persona::Edit,
        Persona::Irrelevant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Chatty => "CHATTY",
            Persona::Confused => "CONFUSED",
            Persona::Task => "TASK",
            Persona::Efficient => "EFFICIENT",
            Persona::Update => "UPDATE",
            Persona::Edit => "EDIT",
            Persona::Irrelevant => "IRRELEVANT",
        }
    }

    /// 无法识别的取值一律归为 TASK
    pub fn parse_or_default(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl Display for Persona {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Persona {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        Persona::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| format!("Unknown persona: {}", s))
    }
}

/// 结论审查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SupervisorStatus {
    #[default]
    Clear,
    Conflict,
    Ambiguous,
    InsufficientData,
}

impl SupervisorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SupervisorStatus::Clear => "CLEAR",
            SupervisorStatus::Conflict => "CONFLICT",
            SupervisorStatus::Ambiguous => "AMBIGUOUS",
            SupervisorStatus::InsufficientData => "INSUFFICIENT_DATA",
        }
    }

    /// 无法识别的取值一律归为 CLEAR
    pub fn parse_or_default(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().replace([' ', '-'], "_").as_str() {
            "CONFLICT" => SupervisorStatus::Conflict,
            "AMBIGUOUS" => SupervisorStatus::Ambiguous,
            "INSUFFICIENT_DATA" => SupervisorStatus::InsufficientData,
            _ => SupervisorStatus::Clear,
        }
    }
}

impl Display for SupervisorStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 非CLEAR的审查结论，附带需要向用户确认的问题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingWarning {
    pub status: SupervisorStatus,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingBody {
    Synthesized {
        text: String,
        warning: Option<FindingWarning>,
    },
    /// 工具服务不可用等导致该步骤未能执行
    Failed { error: String },
}

/// 单个研究步骤的结论
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub task: String,
    pub body: FindingBody,
}

impl Finding {
    pub fn synthesized(
        task: impl Into<String>,
        text: impl Into<String>,
        warning: Option<FindingWarning>,
    ) -> Self {
        Self {
            task: task.into(),
            body: FindingBody::Synthesized {
                text: text.into(),
                warning,
            },
        }
    }

    pub fn failed(task: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            body: FindingBody::Failed {
                error: error.into(),
            },
        }
    }

    pub fn warning(&self) -> Option<&FindingWarning> {
        match &self.body {
            FindingBody::Synthesized { warning, .. } => warning.as_ref(),
            FindingBody::Failed { .. } => None,
        }
    }

    /// 渲染为交给报告撰写阶段的文本
    pub fn render(&self) -> String {
        match &self.body {
            FindingBody::Synthesized { text, warning } => {
                let mut rendered = format!("Step: {}\nFinding: {}", self.task, text);
                if let Some(warning) = warning {
                    rendered.push_str(&format!(
                        "\n\n[WARNING: {}] {}",
                        warning.status, warning.question
                    ));
                }
                rendered
            }
            FindingBody::Failed { error } => format!("Step: {}\nError: {}", self.task, error),
        }
    }
}

/// 执行轨迹条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEntry {
    ToolExecution {
        step: String,
        tool: String,
        input: Value,
        output: String,
    },
    Error {
        step: String,
        content: String,
    },
    Supervisor {
        step: String,
        status: SupervisorStatus,
        reasoning: String,
        question: Option<String>,
    },
    /// 模型输出解析失败等可恢复的诊断信息
    Diagnostic {
        stage: String,
        content: String,
    },
}

impl TraceEntry {
    pub fn error(step: impl Into<String>, content: impl Into<String>) -> Self {
        TraceEntry::Error {
            step: step.into(),
            content: content.into(),
        }
    }

    pub fn diagnostic(stage: impl Into<String>, content: impl Into<String>) -> Self {
        TraceEntry::Diagnostic {
            stage: stage.into(),
            content: content.into(),
        }
    }

    pub fn tool_name(&self) -> Option<&str> {
        match self {
            TraceEntry::ToolExecution { tool, .. } => Some(tool),
            _ => None,
        }
    }
}

/// 会话状态
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub messages: Vec<TurnMessage>,
    pub company_input: String,
    pub persona: Persona,
    pub user_provided_urls: Vec<String>,
    pub clarification_needed: bool,
    /// 计划阶段解析出的澄清问题
    pub clarification_question: Option<String>,
    pub conversation_summary: String,
    pub research_plan: Vec<String>,
    pub current_step_index: usize,
    pub research_data: Vec<Finding>,
    pub sources_used: Vec<String>,
    pub thought_trace: Vec<TraceEntry>,
    pub final_report: String,
}

/// 步骤游标操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepCursor {
    Reset,
    Advance,
}

/// 单个阶段对状态的修改，由编排器统一应用
///
/// `Option` 字段为覆盖语义；`Vec` 字段为追加语义。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub messages: Vec<TurnMessage>,
    /// 覆盖最新一条用户消息的内容
    pub sanitized_input: Option<String>,
    pub company_input: Option<String>,
    pub persona: Option<Persona>,
    pub clarification_needed: Option<bool>,
    pub clarification_question: Option<String>,
    pub conversation_summary: Option<String>,
    pub research_plan: Option<Vec<String>>,
    pub cursor: Option<StepCursor>,
    /// 清空 research_data 与 thought_trace，先于追加字段生效
    pub reset_research: bool,
    pub research_data: Vec<Finding>,
    pub sources_used: Vec<String>,
    pub thought_trace: Vec<TraceEntry>,
    pub final_report: Option<String>,
}

impl StateUpdate {
    pub fn is_empty(&self) -> bool {
        *self == StateUpdate::default()
    }
}

impl ConversationState {
    pub fn new(
        messages: Vec<TurnMessage>,
        user_provided_urls: Vec<String>,
        conversation_summary: String,
    ) -> Self {
        Self {
            messages,
            user_provided_urls,
            conversation_summary,
            ..Default::default()
        }
    }

    /// 当前最新的用户输入
    pub fn latest_user_input(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::types::Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    /// 除最后一条之外的历史消息
    pub fn prior_messages(&self) -> &[TurnMessage] {
        match self.messages.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    pub fn current_task(&self) -> Option<&str> {
        self.research_plan
            .get(self.current_step_index)
            .map(String::as_str)
    }

    pub fn has_remaining_steps(&self) -> bool {
        self.current_step_index < self.research_plan.len()
    }

    pub fn apply(&mut self, update: StateUpdate) {
        if update.reset_research {
            self.research_data.clear();
            self.thought_trace.clear();
        }
        if let Some(company_input) = update.company_input {
            self.company_input = company_input;
        }
        if let Some(persona) = update.persona {
            self.persona = persona;
        }
        if let Some(flag) = update.clarification_needed {
            self.clarification_needed = flag;
        }
        if let Some(question) = update.clarification_question {
            self.clarification_question = Some(question);
        }
        if let Some(summary) = update.conversation_summary {
            self.conversation_summary = summary;
        }
        if let Some(plan) = update.research_plan {
            self.research_plan = plan;
        }
        if let Some(report) = update.final_report {
            self.final_report = report;
        }
        if let Some(sanitized) = update.sanitized_input
            && let Some(message) = self
                .messages
                .iter_mut()
                .rev()
                .find(|m| m.role == crate::types::Role::User)
        {
            message.content = sanitized;
        }

        self.messages.extend(update.messages);
        self.research_data.extend(update.research_data);
        self.sources_used.extend(update.sources_used);
        self.thought_trace.extend(update.thought_trace);

        match update.cursor {
            Some(StepCursor::Reset) => self.current_step_index = 0,
            Some(StepCursor::Advance) => self.current_step_index += 1,
            None => {}
        }
        self.current_step_index = self.current_step_index.min(self.research_plan.len());
    }
}
