#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::generator::compose::responders::{
        CHAT_FALLBACK, CLARIFIER_FALLBACK, IRRELEVANT_DEFAULT,
    };
    use crate::generator::compose::writer::{
        NO_PREVIOUS_REPORT, NO_RESEARCH_DATA, append_uncertainty_section, collect_warnings,
        previous_report, render_research_data,
    };
    use crate::generator::compose::{Chat, Clarifier, Writer};
    use crate::generator::state::{
        ConversationState, Finding, FindingWarning, Persona, SupervisorStatus,
    };
    use crate::generator::test_support::{ScriptedModel, StubGateway, test_context};
    use crate::generator::types::StageNode;
    use crate::llm::client::ChatMessage;
    use crate::types::TurnMessage;

    fn warning(status: SupervisorStatus, question: &str) -> Option<FindingWarning> {
        Some(FindingWarning {
            status,
            question: question.to_string(),
        })
    }

    #[test]
    fn test_render_research_data() {
        assert_eq!(render_research_data(&[]), NO_RESEARCH_DATA);
        let rendered = render_research_data(&[
            Finding::synthesized("a", "first", None),
            Finding::failed("b", "down"),
        ]);
        assert_eq!(rendered, "Step: a\nFinding: first\n\nStep: b\nError: down");
    }

    #[test]
    fn test_previous_report_resolution() {
        let mut state = ConversationState::new(
            vec![TurnMessage::user("Make it a table")],
            vec![],
            String::new(),
        );
        assert_eq!(previous_report(&state), NO_PREVIOUS_REPORT);

        state.conversation_summary = "Current Focus Company: Tesla".to_string();
        state.messages.insert(0, TurnMessage::assistant("## Company Overview\nTesla makes EVs."));
        assert_eq!(
            previous_report(&state),
            "Conversation Summary:\nCurrent Focus Company: Tesla\n\n## Company Overview\nTesla makes EVs."
        );
    }

    #[test]
    fn test_uncertainty_section() {
        let findings = vec![
            Finding::synthesized("a", "x", warning(SupervisorStatus::Conflict, "Which year?")),
            Finding::synthesized("b", "y", warning(SupervisorStatus::Conflict, "Which year?")),
            Finding::synthesized("c", "z", warning(SupervisorStatus::InsufficientData, "Private?")),
            Finding::synthesized("d", "w", None),
        ];
        let warnings = collect_warnings(&findings);
        assert_eq!(warnings.len(), 2);

        let report = append_uncertainty_section("# Report", &warnings);
        assert_eq!(
            report,
            "# Report\n\n### ❓ Outstanding Questions & Critical Uncertainties\n- CONFLICT: Which year?\n- INSUFFICIENT_DATA: Private?\n"
        );

        let existing = "# Report\n### Outstanding Questions & Critical Uncertainties\n- done";
        assert_eq!(append_uncertainty_section(existing, &warnings), existing);
        assert_eq!(append_uncertainty_section("# Report", &[]), "# Report");
    }

    #[tokio::test]
    async fn test_writer_braces_in_data_do_not_corrupt_prompt() {
        let model = Arc::new(ScriptedModel::new().reply("## Executive Summary\nDone."));
        let context = test_context(model.clone(), Arc::new(StubGateway::standard()));
        let state = ConversationState {
            company_input: "Acme".to_string(),
            persona: Persona::Task,
            research_data: vec![Finding::synthesized("a", "JSON {\"rev\": 10} {date}", None)],
            ..ConversationState::new(
                vec![TurnMessage::user("Research Acme")],
                vec![],
                String::new(),
            )
        };

        let update = Writer.execute(&context, &state).await.unwrap();

        assert_eq!(update.final_report.as_deref(), Some("## Executive Summary\nDone."));
        let request = &model.requests()[0];
        assert_eq!(request.temperature, Some(0.4));
        assert!(request.messages[1].text().contains("JSON {\"rev\": 10} {date}"));
    }

    #[tokio::test]
    async fn test_writer_failure_returns_raw_findings_with_warnings() {
        let model = Arc::new(ScriptedModel::new().fail("quota exceeded"));
        let context = test_context(model, Arc::new(StubGateway::standard()));
        let state = ConversationState {
            company_input: "Acme".to_string(),
            research_data: vec![Finding::synthesized(
                "Revenue",
                "$10B",
                warning(SupervisorStatus::Conflict, "FY2023 or FY2024?"),
            )],
            ..Default::default()
        };

        let update = Writer.execute(&context, &state).await.unwrap();
        let report = update.final_report.unwrap();

        assert!(report.contains("Step: Revenue\nFinding: $10B"));
        assert!(report.ends_with("- CONFLICT: FY2023 or FY2024?\n"));
    }

    #[tokio::test]
    async fn test_chat_irrelevant_uses_precomputed_rejection() {
        let model = Arc::new(ScriptedModel::new());
        let context = test_context(model.clone(), Arc::new(StubGateway::standard()));
        let mut state = ConversationState {
            persona: Persona::Irrelevant,
            final_report:
                "I cannot process this request. Empty input. Please provide a valid company research request."
                    .to_string(),
            ..Default::default()
        };

        let update = Chat.execute(&context, &state).await.unwrap();
        assert!(update.final_report.unwrap().starts_with("I cannot process this request."));

        state.final_report.clear();
        let update = Chat.execute(&context, &state).await.unwrap();
        assert_eq!(update.final_report.as_deref(), Some(IRRELEVANT_DEFAULT));
        assert_eq!(update.messages, vec![TurnMessage::assistant(IRRELEVANT_DEFAULT)]);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_chat_chatty_reply_and_fallback() {
        let model = Arc::new(
            ScriptedModel::new()
                .reply("Hi! Which company should I research?")
                .fail("offline"),
        );
        let context = test_context(model.clone(), Arc::new(StubGateway::standard()));
        let state = ConversationState {
            persona: Persona::Chatty,
            ..ConversationState::new(vec![TurnMessage::user("hello")], vec![], String::new())
        };

        let update = Chat.execute(&context, &state).await.unwrap();
        assert_eq!(
            update.final_report.as_deref(),
            Some("Hi! Which company should I research?")
        );
        let request = &model.requests()[0];
        assert!(matches!(&request.messages[0], ChatMessage::System(s) if s.contains("small talk")));
        assert_eq!(request.temperature, Some(0.7));

        let update = Chat.execute(&context, &state).await.unwrap();
        assert_eq!(update.final_report.as_deref(), Some(CHAT_FALLBACK));
    }

    #[tokio::test]
    async fn test_chat_bounds_history_to_recent_turns() {
        let model = Arc::new(ScriptedModel::new().reply("Anything else about Acme?"));
        let context = test_context(model.clone(), Arc::new(StubGateway::standard()));
        let mut messages: Vec<TurnMessage> = (0..10)
            .map(|i| {
                if i % 2 == 0 {
                    TurnMessage::user(format!("question {}", i))
                } else {
                    TurnMessage::assistant(format!("answer {}", i))
                }
            })
            .collect();
        messages.push(TurnMessage::user("thanks!"));
        let state = ConversationState {
            persona: Persona::Chatty,
            ..ConversationState::new(messages, vec![], "Current Focus Company: Acme".to_string())
        };

        Chat.execute(&context, &state).await.unwrap();

        let request = &model.requests()[0];
        // 系统提示 + 4 条历史 + 本轮输入
        assert_eq!(request.messages.len(), 6);
        assert!(request.messages[0].text().contains("Current Focus Company: Acme"));
        assert_eq!(request.messages[1].text(), "question 6");
        assert_eq!(request.messages[5].text(), "thanks!");
    }

    #[tokio::test]
    async fn test_clarifier_uses_planner_question() {
        let model = Arc::new(ScriptedModel::new());
        let context = test_context(model.clone(), Arc::new(StubGateway::standard()));
        let state = ConversationState {
            clarification_question: Some("Delta Air Lines or Delta Faucet?".to_string()),
            ..Default::default()
        };

        let update = Clarifier.execute(&context, &state).await.unwrap();

        assert_eq!(update.clarification_needed, Some(true));
        assert_eq!(
            update.final_report.as_deref(),
            Some("⚠️ **Clarification Needed:** Delta Air Lines or Delta Faucet?")
        );
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_clarifier_generates_questions_or_falls_back() {
        let model = Arc::new(
            ScriptedModel::new()
                .reply("Which company do you have in mind?")
                .fail("offline"),
        );
        let context = test_context(model, Arc::new(StubGateway::standard()));
        let state = ConversationState {
            persona: Persona::Confused,
            ..ConversationState::new(vec![TurnMessage::user("help")], vec![], String::new())
        };

        let update = Clarifier.execute(&context, &state).await.unwrap();
        assert_eq!(
            update.final_report.as_deref(),
            Some("Which company do you have in mind?")
        );

        let update = Clarifier.execute(&context, &state).await.unwrap();
        assert_eq!(update.final_report.as_deref(), Some(CLARIFIER_FALLBACK));
        assert_eq!(update.clarification_needed, Some(true));
    }
}
