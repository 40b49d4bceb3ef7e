use crate::config::LLMConfig;
use crate::llm::client::types::{CompletionRequest, ModelTier};

/// 超过该长度的请求直接交给高质量模型
const EFFICIENT_REQUEST_CHARS: usize = 32 * 1024;

/// 选择首选模型与备选模型
pub fn evaluate_befitting_model(
    llm_config: &LLMConfig,
    request: &CompletionRequest,
) -> (String, Option<String>) {
    let request_chars: usize = request.messages.iter().map(|m| m.text().len()).sum();

    if request.tier == ModelTier::Efficient && request_chars <= EFFICIENT_REQUEST_CHARS {
        let fallover = (llm_config.model_powerful != llm_config.model_efficient)
            .then(|| llm_config.model_powerful.clone());
        return (llm_config.model_efficient.clone(), fallover);
    }
    (llm_config.model_powerful.clone(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_efficient_tier_falls_over_to_powerful() {
        let config = LLMConfig::default();
        let request = CompletionRequest::new(ModelTier::Efficient).user("classify this");

        let (model, fallover) = evaluate_befitting_model(&config, &request);

        assert_eq!(model, config.model_efficient);
        assert_eq!(fallover, Some(config.model_powerful.clone()));
    }

    #[test]
    fn test_large_or_powerful_requests_use_powerful_model() {
        let config = LLMConfig::default();
        let large = CompletionRequest::new(ModelTier::Efficient).user("x".repeat(40 * 1024));
        let powerful = CompletionRequest::new(ModelTier::Powerful).user("plan");

        assert_eq!(
            evaluate_befitting_model(&config, &large),
            (config.model_powerful.clone(), None)
        );
        assert_eq!(
            evaluate_befitting_model(&config, &powerful),
            (config.model_powerful.clone(), None)
        );
    }

    #[test]
    fn test_identical_models_have_no_fallover() {
        let mut config = LLMConfig::default();
        config.model_powerful = config.model_efficient.clone();
        let request = CompletionRequest::new(ModelTier::Efficient).user("hi");

        assert_eq!(evaluate_befitting_model(&config, &request).1, None);
    }
}
