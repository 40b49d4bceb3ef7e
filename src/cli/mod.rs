use crate::config::{Config, LLMProvider};
use crate::i18n::TargetLanguage;
use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Corporate Profiler - 对话式企业调研助手
#[derive(Parser, Debug)]
#[command(name = "corporate-profiler")]
#[command(
    about = "Conversational company research assistant. Classifies intent, plans multi-step research, runs web search and scraping tools, validates findings and writes a structured intelligence report."
)]
#[command(version)]
pub struct Args {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// 是否启用详细日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// LLM Provider (openai, deepseek, openrouter, anthropic, gemini, ollama)
    #[arg(long, global = true)]
    pub llm_provider: Option<String>,

    /// LLM API KEY
    #[arg(long, global = true)]
    pub llm_api_key: Option<String>,

    /// LLM API基地址
    #[arg(long, global = true)]
    pub llm_api_base_url: Option<String>,

    /// 高能效模型，用于意图识别、结论审查与摘要
    #[arg(long, global = true)]
    pub model_efficient: Option<String>,

    /// 高质量模型，用于计划、研究与报告撰写，以及作为efficient失效情况下的兜底
    #[arg(long, global = true)]
    pub model_powerful: Option<String>,

    /// 温度参数
    #[arg(long, global = true)]
    pub temperature: Option<f64>,

    /// 最大tokens数
    #[arg(long, global = true)]
    pub max_tokens: Option<u32>,

    /// 报告语言 (en, zh, ja, ko, de, fr, ru)
    #[arg(long, global = true)]
    pub target_language: Option<String>,

    /// 会话数据目录
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// 在会话中提出一个调研请求
    Ask {
        /// 用户输入
        prompt: String,

        /// 会话ID，不指定时复用空会话或新建
        #[arg(short, long)]
        session: Option<String>,

        /// 需要优先抓取的网页，可重复指定
        #[arg(short, long = "url")]
        urls: Vec<String>,

        /// 将最终回复另存为文件
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 管理会话
    Sessions {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum SessionAction {
    /// 列出全部会话（最新在前）
    List,
    /// 新建会话
    New {
        #[arg(default_value = crate::store::DEFAULT_SESSION_NAME)]
        name: String,
    },
    /// 删除会话
    Delete { id: String },
    /// 重命名会话
    Rename { id: String, name: String },
    /// 查看会话消息
    Show { id: String },
}

impl Args {
    /// 将CLI参数转换为配置，命令行参数优先于配置文件
    pub fn into_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(provider_str) = &self.llm_provider {
            config.llm.provider = provider_str
                .parse::<LLMProvider>()
                .map_err(|e| anyhow!(e))?;
        }
        if let Some(llm_api_base_url) = &self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url.clone();
        }
        if let Some(llm_api_key) = &self.llm_api_key {
            config.llm.api_key = llm_api_key.clone();
        }
        if let Some(model_efficient) = &self.model_efficient {
            config.llm.model_efficient = model_efficient.clone();
        }
        if let Some(model_powerful) = &self.model_powerful {
            config.llm.model_powerful = model_powerful.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            config.llm.max_tokens = max_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.llm.temperature = temperature;
        }

        if let Some(target_language_str) = &self.target_language {
            config.target_language = target_language_str
                .parse::<TargetLanguage>()
                .map_err(|e| anyhow!(e))?;
        }
        if let Some(data_dir) = &self.data_dir {
            config.store.data_dir = data_dir.clone();
        }
        config.verbose = config.verbose || self.verbose;

        Ok(config)
    }
}

// Include tests
#[cfg(test)]
mod tests;
