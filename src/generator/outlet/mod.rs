//! 会话驱动：加载历史、执行一轮对话并持久化结果

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use tracing::{info, warn};

use crate::generator::state::ConversationState;
use crate::generator::workflow::{Orchestrator, StageDelta, TurnRequest};
use crate::store::{DEFAULT_SESSION_NAME, SessionStore};
use crate::types::Role;
use crate::utils::text::truncate_chars;

/// 用首条输入命名会话时的最大长度
const SESSION_TITLE_CHARS: usize = 40;

/// 一轮对话的结果
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: String,
    pub state: ConversationState,
}

pub struct SessionDriver {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn SessionStore>,
}

impl SessionDriver {
    pub fn new(orchestrator: Arc<Orchestrator>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            orchestrator,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// 指定会话时直接使用；否则复用空的默认会话，没有则新建
    pub async fn resolve_session(&self, requested: Option<&str>) -> Result<String> {
        if let Some(id) = requested {
            self.store
                .get_messages(id)
                .await
                .with_context(|| format!("无法打开会话 {}", id))?;
            return Ok(id.to_string());
        }

        if let Some(id) = self.store.last_empty_session().await? {
            return Ok(id);
        }
        Ok(self.store.create_session(DEFAULT_SESSION_NAME).await?)
    }

    /// 执行一轮对话，逐个回调阶段修改，结束后保存输入、回复与摘要
    pub async fn ask<F>(
        &self,
        session_id: &str,
        input: &str,
        user_provided_urls: Vec<String>,
        mut observer: F,
    ) -> Result<TurnOutcome>
    where
        F: FnMut(&StageDelta),
    {
        let history = self.store.get_messages(session_id).await?;
        let previous_summary = self.store.get_summary(session_id).await?.unwrap_or_default();
        let is_first_turn = history.is_empty();

        let request = TurnRequest {
            history,
            company_input: input.to_string(),
            user_provided_urls,
            conversation_summary: previous_summary.clone(),
        };

        let (mut deltas, handle) = self.orchestrator.clone().stream_turn(request);
        while let Some(delta) = deltas.next().await {
            observer(&delta);
        }
        let state = handle.await.context("对话任务异常退出")??;

        self.store.save_message(session_id, Role::User, input).await?;
        if !state.final_report.trim().is_empty() {
            self.store
                .save_message(session_id, Role::Assistant, &state.final_report)
                .await?;
        }
        if !state.conversation_summary.is_empty() && state.conversation_summary != previous_summary
        {
            self.store
                .save_summary(session_id, &state.conversation_summary)
                .await?;
        }
        if is_first_turn {
            self.name_session(session_id, input).await;
        }

        info!("💾 会话 {} 已保存", session_id);
        Ok(TurnOutcome {
            session_id: session_id.to_string(),
            state,
        })
    }

    /// 默认名称的会话以首条输入命名
    async fn name_session(&self, session_id: &str, input: &str) {
        let sessions = match self.store.list_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("⚠️ 读取会话列表失败: {}", e);
                return;
            }
        };
        let is_default = sessions
            .iter()
            .any(|s| s.id == session_id && s.name == DEFAULT_SESSION_NAME);
        if !is_default {
            return;
        }

        let title = truncate_chars(input.trim(), SESSION_TITLE_CHARS);
        if let Err(e) = self.store.rename_session(session_id, title).await {
            warn!("⚠️ 会话重命名失败: {}", e);
        }
    }
}

/// 将报告写入磁盘
pub fn save_report(path: &Path, report: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("无法创建目录 {}", parent.display()))?;
    }
    std::fs::write(path, report).with_context(|| format!("无法写入报告 {}", path.display()))?;
    info!("💾 已保存报告: {}", path.display());
    Ok(())
}
