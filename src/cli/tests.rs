#[cfg(test)]
mod tests {
    use crate::cli::{Args, Command, SessionAction};
    use crate::config::LLMProvider;
    use crate::i18n::TargetLanguage;
    use crate::store::DEFAULT_SESSION_NAME;
    use clap::Parser;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_config(temp_dir: &TempDir, content: &str) -> PathBuf {
        let path = temp_dir.path().join("profiler.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_ask_default_values() {
        let args = Args::try_parse_from(&["corporate-profiler", "ask", "Research Acme"]).unwrap();

        assert!(!args.verbose);
        assert!(args.config.is_none());
        assert!(args.llm_provider.is_none());
        assert_eq!(
            args.command,
            Command::Ask {
                prompt: "Research Acme".to_string(),
                session: None,
                urls: vec![],
                output: None,
            }
        );
    }

    #[test]
    fn test_ask_with_session_urls_and_output() {
        let args = Args::try_parse_from(&[
            "corporate-profiler",
            "ask", "Compare with competitors",
            "-s", "abc-123",
            "--url", "https://acme.com/about",
            "--url", "https://acme.com/investors",
            "-o", "/tmp/acme.md",
            "-v",
        ])
        .unwrap();

        assert!(args.verbose);
        match args.command {
            Command::Ask {
                prompt,
                session,
                urls,
                output,
            } => {
                assert_eq!(prompt, "Compare with competitors");
                assert_eq!(session.as_deref(), Some("abc-123"));
                assert_eq!(
                    urls,
                    vec!["https://acme.com/about", "https://acme.com/investors"]
                );
                assert_eq!(output, Some(PathBuf::from("/tmp/acme.md")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_llm_options() {
        let args = Args::try_parse_from(&[
            "corporate-profiler",
            "--llm-provider", "deepseek",
            "--llm-api-key", "sk-test",
            "--llm-api-base-url", "https://api.deepseek.com",
            "--model-efficient", "deepseek-chat",
            "--model-powerful", "deepseek-reasoner",
            "--temperature", "0.2",
            "--max-tokens", "4096",
            "--target-language", "zh",
            "ask", "Research Acme",
        ])
        .unwrap();

        assert_eq!(args.llm_provider.as_deref(), Some("deepseek"));
        assert_eq!(args.llm_api_key.as_deref(), Some("sk-test"));
        assert_eq!(args.model_efficient.as_deref(), Some("deepseek-chat"));
        assert_eq!(args.model_powerful.as_deref(), Some("deepseek-reasoner"));
        assert_eq!(args.temperature, Some(0.2));
        assert_eq!(args.max_tokens, Some(4096));
        assert_eq!(args.target_language.as_deref(), Some("zh"));
    }

    #[test]
    fn test_sessions_subcommands() {
        let args = Args::try_parse_from(&["corporate-profiler", "sessions", "list"]).unwrap();
        assert_eq!(
            args.command,
            Command::Sessions {
                action: SessionAction::List
            }
        );

        let args = Args::try_parse_from(&["corporate-profiler", "sessions", "new"]).unwrap();
        assert_eq!(
            args.command,
            Command::Sessions {
                action: SessionAction::New {
                    name: DEFAULT_SESSION_NAME.to_string()
                }
            }
        );

        let args =
            Args::try_parse_from(&["corporate-profiler", "sessions", "rename", "id-1", "Acme"])
                .unwrap();
        assert_eq!(
            args.command,
            Command::Sessions {
                action: SessionAction::Rename {
                    id: "id-1".to_string(),
                    name: "Acme".to_string()
                }
            }
        );
    }

    #[test]
    fn test_missing_subcommand_is_rejected() {
        assert!(Args::try_parse_from(&["corporate-profiler"]).is_err());
        assert!(Args::try_parse_from(&["corporate-profiler", "ask"]).is_err());
    }

    #[test]
    fn test_into_config_overrides_file_values() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(
            &temp_dir,
            "[llm]\nprovider = \"openai\"\nmodel_powerful = \"from-file\"\nmax_tokens = 1000\n",
        );
        let config_arg = config_path.to_string_lossy().to_string();

        let args = Args::try_parse_from(&[
            "corporate-profiler",
            "-c", config_arg.as_str(),
            "--llm-provider", "anthropic",
            "--max-tokens", "2048",
            "--target-language", "de",
            "--data-dir", "/tmp/profiler-sessions",
            "-v",
            "sessions", "list",
        ])
        .unwrap();
        let config = args.into_config().unwrap();

        assert_eq!(config.llm.provider, LLMProvider::Anthropic);
        assert_eq!(config.llm.model_powerful, "from-file");
        assert_eq!(config.llm.max_tokens, 2048);
        assert_eq!(config.target_language, TargetLanguage::German);
        assert_eq!(config.store.data_dir, PathBuf::from("/tmp/profiler-sessions"));
        assert!(config.verbose);
    }

    #[test]
    fn test_into_config_rejects_unknown_values() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = write_config(&temp_dir, "");
        let config_arg = config_path.to_string_lossy().to_string();

        let args = Args::try_parse_from(&[
            "corporate-profiler",
            "-c", config_arg.as_str(),
            "--llm-provider", "unknown-provider",
            "sessions", "list",
        ])
        .unwrap();
        assert!(args.into_config().is_err());

        let args = Args::try_parse_from(&[
            "corporate-profiler",
            "-c", config_arg.as_str(),
            "--target-language", "xx",
            "sessions", "list",
        ])
        .unwrap();
        assert!(args.into_config().is_err());
    }
}
