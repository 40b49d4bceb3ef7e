//! LLM客户端 - 提供统一的LLM服务接口

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::{config::Config, llm::client::utils::evaluate_befitting_model};

mod providers;
pub mod types;
pub mod utils;

pub use types::{ChatMessage, Completion, CompletionRequest, LanguageModel, ModelTier, ToolCall};

use providers::ProviderClient;

/// LLM客户端 - 提供统一的LLM服务接口
#[derive(Clone)]
pub struct LLMClient {
    config: Config,
    client: ProviderClient,
}

impl LLMClient {
    /// 创建新的LLM客户端
    pub fn new(config: Config) -> Result<Self> {
        let client = ProviderClient::new(&config.llm)?;
        Ok(Self { client, config })
    }

    /// 按配置次数重试，每次等待时间翻倍
    async fn retry_with_backoff<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.config.llm.retry_attempts.max(1);
        let mut delay = Duration::from_millis(self.config.llm.retry_delay_ms);

        let mut attempt = 1;
        loop {
            let err = match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => err,
            };
            if attempt >= attempts {
                return Err(err);
            }
            warn!("⚠️ 模型调用失败 ({}/{})，{:?} 后重试: {}", attempt, attempts, delay, err);
            tokio::time::sleep(delay).await;
            delay = delay.saturating_mul(2);
            attempt += 1;
        }
    }

    async fn complete_inner(
        &self,
        request: &CompletionRequest,
        befitting_model: String,
        fallover_model: Option<String>,
    ) -> Result<Completion> {
        let llm_config = &self.config.llm;
        let timeout = Duration::from_secs(llm_config.timeout_seconds);

        let result = self
            .retry_with_backoff(|| async {
                match tokio::time::timeout(
                    timeout,
                    self.client.complete(&befitting_model, request, llm_config),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(anyhow!(
                        "模型 {} 调用超时 ({}s)",
                        befitting_model,
                        llm_config.timeout_seconds
                    )),
                }
            })
            .await;

        match (result, fallover_model) {
            (Ok(completion), _) => Ok(completion),
            (Err(e), Some(model)) => {
                warn!("🔀 {} 不可用，切换到备选模型 {}: {}", befitting_model, model, e);
                Box::pin(self.complete_inner(request, model, None)).await
            }
            (Err(e), None) => {
                warn!("❌ 模型 {} 调用失败: {}", befitting_model, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl LanguageModel for LLMClient {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        let (befitting_model, fallover_model) =
            evaluate_befitting_model(&self.config.llm, &request);

        self.complete_inner(&request, befitting_model, fallover_model)
            .await
    }
}
