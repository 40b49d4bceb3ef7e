use crate::config::ResearchConfig;
use crate::generator::prompts::{self, render};
use crate::generator::state::Persona;

/// 按用户画像确定的研究策略
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchStrategy {
    pub persona: Persona,
    pub primary_max_turns: usize,
    pub fallback_max_turns: usize,
    /// 是否在工具循环结束后补充抓取网页
    pub enforce_scraping: bool,
    /// 资料不足时是否切换到深度搜索重试
    pub allow_fallback: bool,
}

impl ResearchStrategy {
    pub fn for_persona(persona: Persona, config: &ResearchConfig) -> Self {
        let thorough = persona != Persona::Efficient;
        Self {
            persona,
            primary_max_turns: config.primary_max_turns,
            fallback_max_turns: config.fallback_max_turns,
            enforce_scraping: thorough,
            allow_fallback: thorough,
        }
    }

    pub fn system_prompt(&self, date: &str) -> String {
        let template = match self.persona {
            Persona::Efficient => prompts::RESEARCHER_EFFICIENT_SYSTEM,
            _ => prompts::RESEARCHER_STANDARD_SYSTEM,
        };
        render(template, &[("date", date)])
    }

    pub fn task_message(&self, task: &str, user_urls: &[String]) -> String {
        let mut message = render(prompts::RESEARCH_TASK, &[("task", task)]);
        if !user_urls.is_empty() {
            let urls = user_urls.join(", ");
            message.push_str("\n\n");
            message.push_str(&render(prompts::RESEARCH_USER_URLS, &[("urls", urls.as_str())]));
        }
        message.push_str(&format!(
            "\n\nGoal: Gather detailed, comprehensive information to satisfy the task \"{}\".",
            task
        ));
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_efficient_skips_enforcement_and_fallback() {
        let strategy =
            ResearchStrategy::for_persona(Persona::Efficient, &ResearchConfig::default());
        assert!(!strategy.enforce_scraping);
        assert!(!strategy.allow_fallback);
        assert!(strategy.system_prompt("May 01, 2025").contains("research_query first"));

        let thorough = ResearchStrategy::for_persona(Persona::Update, &ResearchConfig::default());
        assert!(thorough.enforce_scraping && thorough.allow_fallback);
        assert_eq!(thorough.primary_max_turns, 5);
        assert_eq!(thorough.fallback_max_turns, 3);
    }

    #[test]
    fn test_task_message_announces_user_urls() {
        let strategy = ResearchStrategy::for_persona(Persona::Task, &ResearchConfig::default());
        let message = strategy.task_message(
            "Research Tesla overview",
            &["https://ir.tesla.com".to_string()],
        );

        assert!(message.starts_with("Execute this Research Task: \"Research Tesla overview\""));
        assert!(message.contains(
            "The user has provided specific URLs to check: https://ir.tesla.com. Start by scraping these."
        ));
        assert!(!strategy.task_message("x", &[]).contains("provided specific URLs"));
    }
}
