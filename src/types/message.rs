use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// 报告类消息的章节标记
const REPORT_MARKERS: [&str; 2] = ["Executive Summary", "Company Overview"];

/// 超过该长度的助手消息视为一份报告
const REPORT_MIN_CHARS: usize = 400;

/// 对话角色
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Display for Role {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "USER"),
            Role::Assistant => write!(f, "ASSISTANT"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" | "human" => Ok(Role::User),
            "assistant" | "ai" => Ok(Role::Assistant),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// 一条已完成的对话消息
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TurnMessage {
    pub role: Role,
    pub content: String,
}

impl TurnMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// 是否是一份可以作为后续编辑/更新基础的报告
    pub fn is_report_like(&self) -> bool {
        self.role == Role::Assistant
            && !self.content.is_empty()
            && (self.content.chars().count() > REPORT_MIN_CHARS
                || REPORT_MARKERS.iter().any(|m| self.content.contains(m)))
    }

    /// 以 `ROLE: content` 的形式渲染，用于拼接上下文
    pub fn transcript_line(&self) -> String {
        format!("{}: {}", self.role, self.content)
    }
}

/// 从历史中找出最近一份报告
pub fn last_report(history: &[TurnMessage]) -> Option<&TurnMessage> {
    history.iter().rev().find(|m| m.is_report_like())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_detection_by_length_and_marker() {
        assert!(TurnMessage::assistant("x".repeat(401)).is_report_like());
        assert!(!TurnMessage::assistant("x".repeat(400)).is_report_like());
        assert!(TurnMessage::assistant("## Executive Summary\nshort").is_report_like());
        assert!(!TurnMessage::user("x".repeat(900)).is_report_like());
    }

    #[test]
    fn test_last_report_picks_most_recent() {
        let history = vec![
            TurnMessage::assistant("## Company Overview\nfirst"),
            TurnMessage::user("thanks"),
            TurnMessage::assistant("## Company Overview\nsecond"),
            TurnMessage::assistant("ok"),
        ];

        let report = last_report(&history).unwrap();
        assert!(report.content.ends_with("second"));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("AI".parse::<Role>().unwrap(), Role::Assistant);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("system".parse::<Role>().is_err());
    }
}
