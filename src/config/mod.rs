use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::i18n::TargetLanguage;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "profiler.toml";

/// 模型服务提供方，序列化为小写名称
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    #[default]
    OpenAI,
    DeepSeek,
    OpenRouter,
    Anthropic,
    Gemini,
    Ollama,
}

impl LLMProvider {
    pub const ALL: [LLMProvider; 6] = [
        LLMProvider::OpenAI,
        LLMProvider::DeepSeek,
        LLMProvider::OpenRouter,
        LLMProvider::Anthropic,
        LLMProvider::Gemini,
        LLMProvider::Ollama,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LLMProvider::OpenAI => "openai",
            LLMProvider::DeepSeek => "deepseek",
            LLMProvider::OpenRouter => "openrouter",
            LLMProvider::Anthropic => "anthropic",
            LLMProvider::Gemini => "gemini",
            LLMProvider::Ollama => "ollama",
        }
    }
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str() == wanted)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(LLMProvider::as_str).collect();
                format!("Unknown provider: {} (expected one of {})", s, known.join(", "))
            })
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 报告输出语言
    pub target_language: TargetLanguage,

    /// 单轮对话内允许的最大阶段跳转次数
    pub max_transitions: usize,

    /// 是否启用详细日志
    pub verbose: bool,

    /// LLM模型配置
    pub llm: LLMConfig,

    /// 外部工具(MCP)配置
    pub tools: ToolsConfig,

    /// 研究执行配置
    pub research: ResearchConfig,

    /// 研究计划配置
    pub planner: PlannerConfig,

    /// 会话上下文配置
    pub conversation: ConversationConfig,

    /// 输入校验配置
    pub guard: GuardConfig,

    /// 会话存储配置
    pub store: StoreConfig,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址
    pub api_base_url: String,

    /// 高能效模型，用于意图分类、结论审查和会话摘要
    pub model_efficient: String,

    /// 高质量模型，用于计划、调研和报告撰写，以及作为efficient失效情况下的兜底
    pub model_powerful: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 默认温度
    pub temperature: f64,

    /// 重试次数
    pub retry_attempts: u32,

    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,

    /// 超时时间（秒）
    pub timeout_seconds: u64,
}

/// 单个MCP工具服务
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct McpServerConfig {
    pub name: String,
    pub url: String,
}

/// 工具网关配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ToolsConfig {
    /// 单次工具调用超时（秒）
    pub timeout_seconds: u64,

    /// MCP服务列表
    pub servers: Vec<McpServerConfig>,
}

/// 研究执行器配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ResearchConfig {
    /// 主循环最大模型-工具轮次
    pub primary_max_turns: usize,

    /// 兜底循环最大轮次
    pub fallback_max_turns: usize,

    /// 非EFFICIENT模式下要求的最少抓取页面数
    pub min_scraped_sources: usize,

    /// 补抓阶段最多追加抓取的页面数
    pub max_enforced_scrapes: usize,

    /// 低于该长度的结论视为不充分
    pub min_finding_chars: usize,

    /// 送审结论的最大长度
    pub max_supervisor_chars: usize,

    /// 思考轨迹中工具输出的截断长度
    pub trace_output_chars: usize,
}

/// 计划生成配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PlannerConfig {
    pub max_steps: usize,
    pub efficient_max_steps: usize,
    pub max_step_chars: usize,
}

/// 会话上下文配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ConversationConfig {
    /// 消息数超过该值后开始维护滚动摘要
    pub summary_threshold: usize,

    /// 已有摘要时，仅对最近的若干条消息做增量摘要
    pub summary_window: usize,

    /// 摘要输入的最大字符数（取末尾）
    pub summary_input_chars: usize,

    /// 意图分类时附带的最近消息条数
    pub recent_turns: usize,

    /// 历史报告摘录长度
    pub report_excerpt_chars: usize,
}

/// 输入校验配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GuardConfig {
    pub max_input_chars: usize,
    pub max_special_char_ratio: f64,
}

/// 会话存储配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// 会话文件目录
    pub data_dir: PathBuf,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件 {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("配置文件格式错误 {}", path.display()))
    }

    /// 按优先级加载配置：显式路径 > 当前目录下的默认配置文件 > 默认值
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let default_config_path = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILE);

        if default_config_path.exists() {
            Self::from_file(&default_config_path)
        } else {
            Ok(Config::default())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_language: TargetLanguage::default(),
            max_transitions: 40,
            verbose: false,
            llm: LLMConfig::default(),
            tools: ToolsConfig::default(),
            research: ResearchConfig::default(),
            planner: PlannerConfig::default(),
            conversation: ConversationConfig::default(),
            guard: GuardConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: std::env::var("PROFILER_LLM_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api.openai.com/v1"),
            model_efficient: String::from("gpt-4.1-mini"),
            model_powerful: String::from("gpt-4.1"),
            max_tokens: 16384,
            temperature: 0.0,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            timeout_seconds: 180,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        let server = |name: &str, env_key: &str, fallback: &str| McpServerConfig {
            name: name.to_string(),
            url: std::env::var(env_key).unwrap_or_else(|_| fallback.to_string()),
        };

        Self {
            servers: vec![
                server("tavily", "MCP_TAVILY_URL", "http://localhost:8001/mcp"),
                server("ddg", "MCP_DDG_URL", "http://localhost:8002/mcp"),
                server("scraper", "MCP_SCRAPER_URL", "http://localhost:8003/mcp"),
            ],
            timeout_seconds: 90,
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            primary_max_turns: 5,
            fallback_max_turns: 3,
            min_scraped_sources: 2,
            max_enforced_scrapes: 3,
            min_finding_chars: 100,
            max_supervisor_chars: 10_000,
            trace_output_chars: 1000,
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            efficient_max_steps: 3,
            max_step_chars: 500,
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            summary_threshold: 10,
            summary_window: 8,
            summary_input_chars: 4000,
            recent_turns: 4,
            report_excerpt_chars: 2000,
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 1000,
            max_special_char_ratio: 0.3,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".profiler/sessions"),
        }
    }
}
