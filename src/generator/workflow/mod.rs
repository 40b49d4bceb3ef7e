//! 阶段图的执行器：按路由规则驱动会话状态直到终止阶段

use std::sync::Arc;
use std::time::Instant;

use futures::channel::mpsc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::generator::compose::{Chat, Clarifier, Writer};
use crate::generator::context::GeneratorContext;
use crate::generator::preprocess::{Manager, Planner};
use crate::generator::research::Researcher;
use crate::generator::state::{ConversationState, Persona, StateUpdate};
use crate::generator::types::{Stage, StageNode};
use crate::types::TurnMessage;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("transition budget of {0} exhausted before reaching a terminal stage")]
    TransitionBudgetExceeded(usize),

    #[error("stage {stage} failed: {message}")]
    Stage { stage: Stage, message: String },
}

/// 一轮对话的输入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    /// 本轮之前的历史消息
    pub history: Vec<TurnMessage>,
    /// 本轮用户输入
    pub company_input: String,
    pub user_provided_urls: Vec<String>,
    pub conversation_summary: String,
}

/// 单个阶段产生的状态修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDelta {
    pub stage: Stage,
    pub update: StateUpdate,
    /// 是否为本轮最后一个阶段
    pub terminal: bool,
    /// 仅在终止时携带
    pub final_report: Option<String>,
}

/// 下一跳
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Stage(Stage),
    End,
}

pub fn route_manager(state: &ConversationState) -> Next {
    match state.persona {
        Persona::Task | Persona::Update | Persona::Efficient => Next::Stage(Stage::Planner),
        Persona::Edit => Next::Stage(Stage::Writer),
        Persona::Confused => Next::Stage(Stage::Clarifier),
        Persona::Irrelevant | Persona::Chatty => Next::Stage(Stage::Chat),
    }
}

pub fn route_planner(state: &ConversationState) -> Next {
    if state.clarification_needed {
        Next::Stage(Stage::Clarifier)
    } else if state.research_plan.is_empty() {
        Next::End
    } else {
        Next::Stage(Stage::Researcher)
    }
}

pub fn route_researcher(state: &ConversationState) -> Next {
    if state.clarification_needed {
        Next::End
    } else if state.has_remaining_steps() {
        Next::Stage(Stage::Researcher)
    } else {
        Next::Stage(Stage::Writer)
    }
}

pub fn next_stage(stage: Stage, state: &ConversationState) -> Next {
    if stage.is_terminal() {
        return Next::End;
    }
    match stage {
        Stage::Manager => route_manager(state),
        Stage::Planner => route_planner(state),
        Stage::Researcher => route_researcher(state),
        _ => Next::End,
    }
}

pub struct Orchestrator {
    context: GeneratorContext,
    manager: Manager,
    planner: Planner,
    researcher: Researcher,
    writer: Writer,
    chat: Chat,
    clarifier: Clarifier,
}

impl Orchestrator {
    pub fn new(context: GeneratorContext) -> Self {
        let manager = Manager::new(&context.config);
        Self {
            context,
            manager,
            planner: Planner,
            researcher: Researcher,
            writer: Writer,
            chat: Chat,
            clarifier: Clarifier,
        }
    }

    pub fn context(&self) -> &GeneratorContext {
        &self.context
    }

    fn node(&self, stage: Stage) -> &dyn StageNode {
        match stage {
            Stage::Manager => &self.manager,
            Stage::Planner => &self.planner,
            Stage::Researcher => &self.researcher,
            Stage::Writer => &self.writer,
            Stage::Chat => &self.chat,
            Stage::Clarifier => &self.clarifier,
        }
    }

    /// 执行一轮对话并返回最终状态
    pub async fn run_turn(&self, request: TurnRequest) -> Result<ConversationState, WorkflowError> {
        self.drive(request, |_| {}).await
    }

    /// 在后台执行一轮对话，逐个推送阶段修改
    pub fn stream_turn(
        self: Arc<Self>,
        request: TurnRequest,
    ) -> (
        mpsc::UnboundedReceiver<StageDelta>,
        JoinHandle<Result<ConversationState, WorkflowError>>,
    ) {
        let (tx, rx) = mpsc::unbounded();
        let handle = tokio::spawn(async move {
            self.drive(request, move |delta| {
                if tx.unbounded_send(delta).is_err() {
                    debug!("阶段修改的接收方已关闭");
                }
            })
            .await
        });
        (rx, handle)
    }

    async fn drive<F>(
        &self,
        request: TurnRequest,
        mut observer: F,
    ) -> Result<ConversationState, WorkflowError>
    where
        F: FnMut(StageDelta) + Send,
    {
        let mut messages = request.history;
        messages.push(TurnMessage::user(request.company_input));
        let mut state = ConversationState::new(
            messages,
            request.user_provided_urls,
            request.conversation_summary,
        );

        let budget = self.context.config.max_transitions;
        let mut transitions = 0;
        let mut stage = Stage::Manager;

        loop {
            if transitions >= budget {
                warn!("❌ 阶段跳转次数超过上限 {}", budget);
                return Err(WorkflowError::TransitionBudgetExceeded(budget));
            }
            transitions += 1;

            let node = self.node(stage);
            info!("▶️ 执行阶段: {}", node.stage());
            let started = Instant::now();
            let update = node
                .execute(&self.context, &state)
                .await
                .map_err(|e| WorkflowError::Stage {
                    stage: node.stage(),
                    message: e.to_string(),
                })?;
            debug!("阶段 {} 耗时 {:.2}秒", stage, started.elapsed().as_secs_f64());

            state.apply(update.clone());
            let next = next_stage(stage, &state);
            let terminal = next == Next::End;

            observer(StageDelta {
                stage,
                update,
                terminal,
                final_report: terminal.then(|| state.final_report.clone()),
            });

            match next {
                Next::Stage(following) => stage = following,
                Next::End => {
                    info!("✅ 本轮对话结束于阶段 {}", stage);
                    return Ok(state);
                }
            }
        }
    }
}
