mod support;

use serde_json::json;
use sqlito::credentials::CredentialStore;
use sqlito::error::{ChatError, GatewayError, ProviderError};
use sqlito::orchestrator::RunOutcome;
use sqlito_schema::anthropic::AnthropicErrorObject;
use sqlito_schema::{ChatEvent, ContentBlock};
use std::time::Duration;
use support::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn empty_messages_fail_validation_without_opening_a_gateway() {
    let model = ScriptedModel::new(vec![]);
    let launcher = MockLauncher::new();
    let orch = orchestrator(model.clone(), launcher.clone(), 5).await;

    let body = chat_body(json!({"messages": [], "apiKey": "sk-ant-test", "projectRef": PROJECT}));
    let err = orch
        .prepare(body, Some(ACCESS_TOKEN.to_string()))
        .await
        .err()
        .expect("validation must fail");

    assert!(matches!(err, ChatError::Validation(ref m) if m == "At least one message is required"));
    assert_eq!(launcher.counters.opens(), 0);
    assert_eq!(model.request_count(), 0);
}

#[tokio::test]
async fn validation_messages_are_joined() {
    let launcher = MockLauncher::new();
    let orch = orchestrator(ScriptedModel::new(vec![]), launcher.clone(), 5).await;

    let body = chat_body(json!({"messages": [], "apiKey": "", "projectRef": " "}));
    let err = orch.prepare(body, None).await.err().expect("must fail");
    assert_eq!(
        err.to_string(),
        "At least one message is required, API key is required, Project reference is required"
    );
    assert_eq!(launcher.counters.opens(), 0);
}

#[tokio::test]
async fn assistant_only_history_has_no_user_message() {
    let launcher = MockLauncher::new();
    let orch = orchestrator(ScriptedModel::new(vec![]), launcher.clone(), 5).await;

    let body = chat_body(json!({
        "messages": [{"role": "assistant", "content": "Hi, ask me anything."}],
        "apiKey": "sk-ant-test",
        "projectRef": PROJECT
    }));
    let err = orch
        .prepare(body, Some(ACCESS_TOKEN.to_string()))
        .await
        .err()
        .expect("must fail");
    assert!(matches!(err, ChatError::NoUserMessage));
    assert_eq!(launcher.counters.opens(), 0);
}

#[tokio::test]
async fn missing_session_and_missing_password_are_reported_before_opening() {
    let launcher = MockLauncher::new();
    let orch = orchestrator(ScriptedModel::new(vec![]), launcher.clone(), 5).await;

    let err = orch.prepare(question("hi"), None).await.err().expect("must fail");
    assert!(matches!(err, ChatError::NotAuthenticated));

    let body = chat_body(json!({
        "messages": [{"role": "user", "content": "hi"}],
        "apiKey": "sk-ant-test",
        "projectRef": "otherproject"
    }));
    let err = orch
        .prepare(body, Some(ACCESS_TOKEN.to_string()))
        .await
        .err()
        .expect("must fail");
    assert_eq!(err.status(), axum::http::StatusCode::PRECONDITION_REQUIRED);
    assert_eq!(launcher.counters.opens(), 0);
}

#[tokio::test]
async fn missing_tool_server_command_is_503_before_any_model_call() {
    let model = ScriptedModel::new(vec![text_step("unreachable")]);
    let launcher = MockLauncher::without_command("npx");
    let orch = orchestrator(model.clone(), launcher.clone(), 5).await;

    let err = orch
        .prepare(question("How many orders?"), Some(ACCESS_TOKEN.to_string()))
        .await
        .err()
        .expect("launcher is missing");

    assert!(matches!(
        err,
        ChatError::GatewayUnavailable(GatewayError::LauncherMissing { ref command }) if command == "npx"
    ));
    assert_eq!(err.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(launcher.counters.opens(), 1);
    assert_eq!(launcher.counters.closes(), 0);
    assert_eq!(model.request_count(), 0);
}

#[tokio::test]
async fn stored_api_key_fills_in_for_an_empty_one() {
    let model = ScriptedModel::new(vec![text_step("Hello.")]);
    let launcher = MockLauncher::new();
    let orch = orchestrator(model.clone(), launcher.clone(), 5).await;
    orch.store.set_api_key("sk-ant-stored").await;

    let body = chat_body(json!({
        "messages": [{"role": "user", "content": "hi"}],
        "projectRef": PROJECT
    }));
    let run = orch
        .prepare(body, Some(ACCESS_TOKEN.to_string()))
        .await
        .expect("stored key is enough");
    let (tx, rx) = mpsc::channel(16);
    run.run(tx, CancellationToken::new()).await;
    collect_events(rx).await;

    assert_eq!(model.requests.lock().unwrap()[0].api_key, "sk-ant-stored");
}

#[tokio::test]
async fn only_the_latest_user_message_is_sent_and_the_connection_is_pooled() {
    let model = ScriptedModel::new(vec![text_step("Done.")]);
    let launcher = MockLauncher::new();
    let orch = orchestrator(model.clone(), launcher.clone(), 5).await;

    let body = chat_body(json!({
        "messages": [
            {"role": "user", "content": "first question"},
            {"role": "assistant", "content": "first answer"},
            {"role": "user", "content": "How many orders?"}
        ],
        "apiKey": "sk-ant-test",
        "projectRef": PROJECT
    }));
    let run = orch
        .prepare(body, Some(ACCESS_TOKEN.to_string()))
        .await
        .expect("prepare");
    let (tx, rx) = mpsc::channel(16);
    run.run(tx, CancellationToken::new()).await;
    collect_events(rx).await;

    let requests = model.requests.lock().unwrap();
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(
        requests[0].messages[0].content,
        vec![ContentBlock::Text {
            text: "How many orders?".to_string()
        }]
    );
    assert!(requests[0].system.contains(PROJECT));

    let bindings = launcher.bindings.lock().unwrap();
    assert_eq!(bindings[0].access_token, ACCESS_TOKEN);
    assert!(
        bindings[0]
            .connection_string
            .contains(&format!("postgres.{PROJECT}:s3cret@aws-0-us-east-2.pooler.supabase.com")),
        "unexpected connection string"
    );
}

#[tokio::test]
async fn text_precedes_tool_execution_and_steps_are_ordered() {
    let model = ScriptedModel::new(vec![
        tool_step(
            "Let me look at the tables.",
            "toolu_1",
            "list_tables",
            json!({"project_id": PROJECT}),
        ),
        text_step("You have two tables: orders and customers."),
    ]);
    let launcher = MockLauncher::new();
    let orch = orchestrator(model.clone(), launcher.clone(), 5).await;

    let run = orch
        .prepare(question("What tables do I have?"), Some(ACCESS_TOKEN.to_string()))
        .await
        .expect("prepare");
    let (tx, rx) = mpsc::channel(16);
    let outcome = run.run(tx, CancellationToken::new()).await;
    let events = collect_events(rx).await;

    assert_eq!(
        outcome,
        RunOutcome::Finished {
            steps: 2,
            tool_calls: 1
        }
    );
    let kinds: Vec<_> = events.iter().map(|e| (e.kind(), e.step_number())).collect();
    assert_eq!(
        kinds,
        vec![
            ("text-update", Some(1)),
            ("tool-execution", Some(1)),
            ("step-progress", Some(1)),
            ("text-update", Some(2)),
            ("step-progress", Some(2)),
            ("conversation-summary", None),
        ]
    );

    match &events[1] {
        ChatEvent::ToolExecution {
            tool_calls,
            finish_reason,
            ..
        } => {
            assert_eq!(finish_reason, "tool-calls");
            assert_eq!(tool_calls[0].tool_name, "list_tables");
            assert!(!tool_calls[0].is_error);
            assert!(tool_calls[0].result.contains("orders"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    match &events[2] {
        ChatEvent::StepProgress {
            step_type,
            has_tool_calls,
            tools_used,
            ..
        } => {
            assert_eq!(step_type, "initial");
            assert!(*has_tool_calls);
            assert_eq!(tools_used, &vec!["list_tables".to_string()]);
        }
        other => panic!("unexpected event {other:?}"),
    }
    match &events[4] {
        ChatEvent::StepProgress {
            step_type,
            finish_reason,
            ..
        } => {
            assert_eq!(step_type, "tool-result");
            assert_eq!(finish_reason, "stop");
        }
        other => panic!("unexpected event {other:?}"),
    }

    // The second call sees the assistant tool_use turn and the tool result.
    let requests = model.requests.lock().unwrap();
    let second = &requests[1].messages;
    assert_eq!(second.len(), 3);
    assert!(matches!(
        &second[2].content[0],
        ContentBlock::ToolResult { tool_use_id, is_error: false, .. } if tool_use_id == "toolu_1"
    ));
    assert_eq!(launcher.counters.closes(), 1);
}

#[tokio::test]
async fn failing_tool_is_folded_into_the_conversation() {
    let model = ScriptedModel::new(vec![
        tool_step(
            "",
            "toolu_1",
            "execute_sql",
            json!({"project_id": PROJECT, "query": "SELECT * FROM nope"}),
        ),
        text_step("That table does not exist."),
    ]);
    let launcher = MockLauncher::new();
    let orch = orchestrator(model, launcher.clone(), 5).await;

    let run = orch
        .prepare(question("Show nope"), Some(ACCESS_TOKEN.to_string()))
        .await
        .expect("prepare");
    let (tx, rx) = mpsc::channel(16);
    let outcome = run.run(tx, CancellationToken::new()).await;
    let events = collect_events(rx).await;

    assert!(matches!(outcome, RunOutcome::Finished { steps: 2, .. }));
    // No text in step 1, so the first record is the tool execution.
    match &events[0] {
        ChatEvent::ToolExecution { tool_calls, .. } => assert!(tool_calls[0].is_error),
        other => panic!("unexpected event {other:?}"),
    }
    assert!(matches!(
        events.last(),
        Some(ChatEvent::ConversationSummary { completed: true, .. })
    ));
}

#[tokio::test]
async fn step_budget_caps_the_run() {
    let steps = (1..=6)
        .map(|i| {
            tool_step(
                "",
                &format!("toolu_{i}"),
                "list_tables",
                json!({"project_id": PROJECT}),
            )
        })
        .collect();
    let model = ScriptedModel::new(steps);
    let launcher = MockLauncher::new();
    let orch = orchestrator(model.clone(), launcher.clone(), 5).await;

    let run = orch
        .prepare(question("loop forever"), Some(ACCESS_TOKEN.to_string()))
        .await
        .expect("prepare");
    let (tx, rx) = mpsc::channel(64);
    run.run(tx, CancellationToken::new()).await;
    let events = collect_events(rx).await;

    assert_eq!(model.request_count(), 5);
    // Tool calls of the last step still run.
    assert_eq!(launcher.counters.invokes(), 5);
    assert!(events.iter().all(|e| e.step_number().is_none_or(|n| n <= 5)));
    assert_eq!(
        events.last(),
        Some(&ChatEvent::ConversationSummary {
            step_count: 5,
            tool_call_count: 5,
            completed: true
        })
    );
    assert_eq!(launcher.counters.closes(), 1);
}

#[tokio::test]
async fn disconnect_mid_run_releases_the_gateway_once() {
    // Steps 1 and 2 call tools; step 3 never returns.
    let model = ScriptedModel::new(vec![
        tool_step("", "toolu_1", "list_tables", json!({"project_id": PROJECT})),
        tool_step("", "toolu_2", "list_tables", json!({"project_id": PROJECT})),
    ]);
    let launcher = MockLauncher::new();
    let orch = orchestrator(model.clone(), launcher.clone(), 5).await;

    let run = orch
        .prepare(question("keep going"), Some(ACCESS_TOKEN.to_string()))
        .await
        .expect("prepare");
    let (tx, mut rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run.run(tx, cancel.clone()));

    let mut seen = Vec::new();
    while let Some(ev) = rx.recv().await {
        let done = matches!(ev, ChatEvent::StepProgress { step_number: 2, .. });
        seen.push(ev);
        if done {
            break;
        }
    }
    drop(rx);

    let outcome = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("run must stop after disconnect")
        .expect("run task panicked");

    assert!(matches!(outcome, RunOutcome::Cancelled { steps: 2 }));
    assert!(cancel.is_cancelled());
    assert_eq!(launcher.counters.closes(), 1);
    assert!(seen.iter().all(|e| e.step_number().is_some_and(|n| n <= 2)));
}

#[tokio::test]
async fn provider_failure_emits_one_error_record_and_closes() {
    let model = ScriptedModel::new(vec![
        tool_step("Checking.", "toolu_1", "list_tables", json!({"project_id": PROJECT})),
        Err(ProviderError::StreamError(AnthropicErrorObject {
            r#type: "overloaded_error".to_string(),
            message: "Overloaded".to_string(),
        })),
    ]);
    let launcher = MockLauncher::new();
    let orch = orchestrator(model, launcher.clone(), 5).await;

    let run = orch
        .prepare(question("hi"), Some(ACCESS_TOKEN.to_string()))
        .await
        .expect("prepare");
    let (tx, rx) = mpsc::channel(16);
    let outcome = run.run(tx, CancellationToken::new()).await;
    let events = collect_events(rx).await;

    assert_eq!(outcome, RunOutcome::Errored { steps: 1 });
    // Step 1 records stay; the stream ends with exactly one error and no summary.
    assert_eq!(events.len(), 4);
    assert_eq!(
        events.last(),
        Some(&ChatEvent::Error {
            error: "Overloaded".to_string()
        })
    );
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ChatEvent::Error { .. }))
            .count(),
        1
    );
    assert_eq!(launcher.counters.closes(), 1);
}
