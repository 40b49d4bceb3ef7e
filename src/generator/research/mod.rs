//! 研究阶段：按计划逐步调用外部工具收集资料并审查结论

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::generator::context::GeneratorContext;
use crate::generator::prompts::{self, render};
use crate::generator::state::{
    ConversationState, Finding, StateUpdate, StepCursor, SupervisorStatus, TraceEntry,
};
use crate::generator::types::{Stage, StageNode};
use crate::llm::client::{ChatMessage, CompletionRequest, ModelTier};
use crate::llm::tools::SCRAPE_PAGE;
use crate::types::TurnMessage;
use crate::utils::text::dedup_preserving_order;

pub mod strategy;
pub mod supervisor;
pub mod tool_loop;

pub use strategy::ResearchStrategy;
pub use supervisor::{Supervisor, SupervisorVerdict};
pub use tool_loop::{LoopExit, ResearchSession};

/// 需要用户澄清时的消息前缀
pub const CLARIFICATION_PREFIX: &str = "⚠️ **Clarification Needed:**";

pub fn clarification_message(question: &str) -> String {
    format!("{} {}", CLARIFICATION_PREFIX, question)
}

#[derive(Default)]
pub struct Researcher;

impl Researcher {
    /// 抓取的来源不足时补充抓取：先用户提供的链接，再搜索得到的链接
    async fn enforce_scraping(
        &self,
        context: &GeneratorContext,
        session: &mut ResearchSession<'_>,
        user_urls: &[String],
    ) {
        let research = &context.config.research;
        if session.distinct_scraped() >= research.min_scraped_sources
            || !session.has_tool(SCRAPE_PAGE)
        {
            return;
        }

        let scraped: HashSet<String> = session.scraped_urls.iter().cloned().collect();
        let candidates: Vec<String> = dedup_preserving_order(
            user_urls
                .iter()
                .chain(session.harvested_urls.iter())
                .cloned(),
        )
        .into_iter()
        .filter(|url| !scraped.contains(url))
        .collect();

        let mut succeeded = 0;
        for url in candidates {
            if succeeded >= research.max_enforced_scrapes {
                break;
            }
            let arguments = json!({ "url": url });
            match context.tools.invoke(SCRAPE_PAGE, arguments.clone()).await {
                Ok(output) => {
                    info!("📄 补充抓取: {}", url);
                    session.scraped_urls.push(url);
                    session.record(SCRAPE_PAGE, arguments, output);
                    succeeded += 1;
                }
                Err(e) => {
                    warn!("⚠️ 补充抓取失败 {}: {}", url, e);
                    session.trace_error(format!("Scrape failed: {}", e));
                }
            }
        }
    }

    /// 生成本步骤结论；最后一条是工具结果时强制模型不带工具作答
    async fn finalize(
        &self,
        context: &GeneratorContext,
        session: &mut ResearchSession<'_>,
    ) -> String {
        if !session.last_is_observation() {
            return match session.messages.last() {
                Some(ChatMessage::Assistant { text, .. }) => text.clone(),
                _ => String::new(),
            };
        }

        let request = CompletionRequest::new(ModelTier::Powerful)
            .messages(session.messages.clone())
            .user(render(prompts::FORCED_SYNTHESIS, &[("task", session.step())]))
            .temperature(0.0);

        match context.llm.complete(request).await {
            Ok(completion) => {
                session.messages.push(ChatMessage::assistant(completion.text.clone()));
                completion.text
            }
            Err(e) => {
                warn!("❌ 研究结论生成失败: {}", e);
                session.trace_error(format!("Finalization failed: {}", e));
                String::new()
            }
        }
    }
}

fn record_diagnostic(session: &mut ResearchSession<'_>, verdict: &mut SupervisorVerdict) {
    if let Some(diagnostic) = verdict.diagnostic.take() {
        session
            .trace
            .push(TraceEntry::diagnostic(Stage::Researcher.as_str(), diagnostic));
    }
}

fn needs_fallback(verdict: &SupervisorVerdict, content: &str, min_chars: usize) -> bool {
    verdict.status == SupervisorStatus::InsufficientData
        || content.trim().chars().count() < min_chars
}

#[async_trait]
impl StageNode for Researcher {
    fn stage(&self) -> Stage {
        Stage::Researcher
    }

    async fn execute(
        &self,
        context: &GeneratorContext,
        state: &ConversationState,
    ) -> Result<StateUpdate> {
        let Some(task) = state.current_task() else {
            return Ok(StateUpdate::default());
        };
        let index = state.current_step_index;
        info!(
            "🔎 执行研究步骤 {}/{}: {}",
            index + 1,
            state.research_plan.len(),
            task
        );

        let tools = match context.tools.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                warn!("❌ 无法连接研究工具服务: {}", e);
                return Ok(StateUpdate {
                    research_data: vec![Finding::failed(
                        task,
                        format!(
                            "Failed to connect to MCP tools. Please ensure the services are running. Details: {}",
                            e
                        ),
                    )],
                    thought_trace: vec![TraceEntry::error(task, e.to_string())],
                    cursor: Some(StepCursor::Advance),
                    ..Default::default()
                });
            }
        };

        let research = &context.config.research;
        let strategy = ResearchStrategy::for_persona(state.persona, research);
        let date = chrono::Utc::now().format("%B %d, %Y").to_string();
        let messages = vec![
            ChatMessage::system(strategy.system_prompt(&date)),
            ChatMessage::user(strategy.task_message(task, &state.user_provided_urls)),
        ];
        let mut session = ResearchSession::new(context, &tools, task, messages);

        let exit = session.run(strategy.primary_max_turns).await;
        if exit == LoopExit::Exhausted {
            info!("⏳ 工具循环达到 {} 轮上限", strategy.primary_max_turns);
        }
        if strategy.enforce_scraping {
            self.enforce_scraping(context, &mut session, &state.user_provided_urls)
                .await;
        }

        let supervisor = Supervisor::new(context);
        let mut content = self.finalize(context, &mut session).await;
        let mut verdict = supervisor.review(task, &content).await;
        record_diagnostic(&mut session, &mut verdict);

        if strategy.allow_fallback
            && needs_fallback(&verdict, &content, research.min_finding_chars)
            && !session.deep_search_used()
        {
            info!("🔁 资料不足，切换到深度搜索重试: {}", task);
            session
                .messages
                .push(ChatMessage::user(render(prompts::FALLBACK_INSTRUCTION, &[("task", task)])));
            session.run(strategy.fallback_max_turns).await;
            content = self.finalize(context, &mut session).await;
            verdict = supervisor.review(task, &content).await;
            record_diagnostic(&mut session, &mut verdict);
        }

        let status = verdict.effective_status();
        info!("🧐 结论审查: {} ({})", status, task);
        session.trace.push(TraceEntry::Supervisor {
            step: task.to_string(),
            status,
            reasoning: verdict.reasoning.clone(),
            question: verdict.question().map(String::from),
        });

        let sources_used = session.sources();

        if status == SupervisorStatus::Ambiguous && index == 0 {
            let question = verdict.question().unwrap_or_default().to_string();
            let message = clarification_message(&question);
            return Ok(StateUpdate {
                messages: vec![TurnMessage::assistant(message.clone())],
                clarification_needed: Some(true),
                clarification_question: Some(question),
                final_report: Some(message),
                sources_used,
                thought_trace: session.trace,
                ..Default::default()
            });
        }

        Ok(StateUpdate {
            research_data: vec![Finding::synthesized(task, content, verdict.warning())],
            sources_used,
            thought_trace: session.trace,
            cursor: Some(StepCursor::Advance),
            ..Default::default()
        })
    }
}
