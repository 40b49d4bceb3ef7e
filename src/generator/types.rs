use std::fmt::{Display, Formatter};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::generator::context::GeneratorContext;
use crate::generator::state::{ConversationState, StateUpdate};

/// 工作流中的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Manager,
    Planner,
    Researcher,
    Writer,
    Chat,
    Clarifier,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Manager => "manager",
            Stage::Planner => "planner",
            Stage::Researcher => "researcher",
            Stage::Writer => "writer",
            Stage::Chat => "chat",
            Stage::Clarifier => "clarifier",
        }
    }

    /// 执行完即结束本轮对话的阶段
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Writer | Stage::Chat | Stage::Clarifier)
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 阶段节点：读取当前状态，返回待应用的状态修改
#[async_trait]
pub trait StageNode: Send + Sync {
    fn stage(&self) -> Stage;

    async fn execute(
        &self,
        context: &GeneratorContext,
        state: &ConversationState,
    ) -> Result<StateUpdate>;
}
