use std::sync::Arc;

use anyhow::Result;

use crate::{
    config::Config,
    llm::client::{LLMClient, LanguageModel},
    llm::tools::{McpToolGateway, ToolGateway},
};

/// 各阶段共享的运行时依赖
#[derive(Clone)]
pub struct GeneratorContext {
    /// LLM调用器，用于与AI通信。
    pub llm: Arc<dyn LanguageModel>,
    /// 外部研究工具
    pub tools: Arc<dyn ToolGateway>,
    /// 配置
    pub config: Config,
}

impl GeneratorContext {
    /// 基于配置创建真实的模型与工具网关
    pub fn new(config: Config) -> Result<Self> {
        let llm = Arc::new(LLMClient::new(config.clone())?);
        let tools = Arc::new(McpToolGateway::new(&config.tools)?);

        Ok(Self {
            llm,
            tools,
            config,
        })
    }

    pub fn with_parts(
        config: Config,
        llm: Arc<dyn LanguageModel>,
        tools: Arc<dyn ToolGateway>,
    ) -> Self {
        Self { llm, tools, config }
    }
}
