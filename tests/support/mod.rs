#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use sqlito::connection::ConnectionResolver;
use sqlito::credentials::{CredentialStore, SecretCipher};
use sqlito::error::{GatewayError, ProviderError};
use sqlito::gateway::{GatewayBinding, GatewayLauncher, ToolGateway, ToolOutcome, fixed_tools};
use sqlito::llm::{FinishReason, LanguageModel, ModelRequest, ModelStep, ModelToolCall};
use sqlito::orchestrator::Orchestrator;
use sqlito_schema::{ChatEvent, ChatRequestBody, ToolSpec};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const PROJECT: &str = "abcdefghijklmnop";
pub const ACCESS_TOKEN: &str = "sbp_test_token";

/// Plays back a fixed list of step results, then blocks forever.
pub struct ScriptedModel {
    steps: Mutex<VecDeque<Result<ModelStep, ProviderError>>>,
    pub requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedModel {
    pub fn new(steps: Vec<Result<ModelStep, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn step(&self, request: &ModelRequest) -> Result<ModelStep, ProviderError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.steps.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

pub fn text_step(text: &str) -> Result<ModelStep, ProviderError> {
    Ok(ModelStep {
        text: text.to_string(),
        tool_calls: Vec::new(),
        finish_reason: FinishReason::Stop,
    })
}

pub fn tool_step(text: &str, id: &str, name: &str, input: Value) -> Result<ModelStep, ProviderError> {
    Ok(ModelStep {
        text: text.to_string(),
        tool_calls: vec![ModelToolCall {
            id: id.to_string(),
            name: name.to_string(),
            input,
        }],
        finish_reason: FinishReason::ToolCalls,
    })
}

#[derive(Default)]
pub struct GatewayCounters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub invokes: AtomicUsize,
}

impl GatewayCounters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn invokes(&self) -> usize {
        self.invokes.load(Ordering::SeqCst)
    }
}

pub struct MockLauncher {
    pub counters: Arc<GatewayCounters>,
    pub bindings: Mutex<Vec<GatewayBinding>>,
    /// When set, `open` fails as if this command were not installed.
    missing_command: Option<String>,
}

impl MockLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            counters: Arc::new(GatewayCounters::default()),
            bindings: Mutex::new(Vec::new()),
            missing_command: None,
        })
    }

    pub fn without_command(command: &str) -> Arc<Self> {
        Arc::new(Self {
            counters: Arc::new(GatewayCounters::default()),
            bindings: Mutex::new(Vec::new()),
            missing_command: Some(command.to_string()),
        })
    }
}

#[async_trait]
impl GatewayLauncher for MockLauncher {
    async fn open(&self, binding: &GatewayBinding) -> Result<Box<dyn ToolGateway>, GatewayError> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        self.bindings.lock().unwrap().push(binding.clone());
        if let Some(command) = &self.missing_command {
            return Err(GatewayError::LauncherMissing {
                command: command.clone(),
            });
        }
        Ok(Box::new(MockGateway {
            counters: self.counters.clone(),
            closed: false,
        }))
    }
}

/// Answers `list_tables` with two tables and fails everything else.
struct MockGateway {
    counters: Arc<GatewayCounters>,
    closed: bool,
}

#[async_trait]
impl ToolGateway for MockGateway {
    fn list_tools(&self) -> Vec<ToolSpec> {
        fixed_tools()
    }

    async fn invoke(&mut self, name: &str, _args: &Value) -> ToolOutcome {
        self.counters.invokes.fetch_add(1, Ordering::SeqCst);
        match name {
            "list_tables" => ToolOutcome {
                text: json!([{"name": "orders"}, {"name": "customers"}]).to_string(),
                is_error: false,
            },
            other => ToolOutcome::error(format!("tool {other} failed")),
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Orchestrator over a memory-only credential store that already holds a password for
/// [`PROJECT`].
pub async fn orchestrator(
    model: Arc<ScriptedModel>,
    launcher: Arc<MockLauncher>,
    max_steps: u32,
) -> Orchestrator {
    let store = sqlito::credentials::spawn(SecretCipher::new("test-key"), None).await;
    store.set_password(PROJECT, "s3cret").await;
    Orchestrator {
        store: Arc::new(store),
        launcher,
        model,
        resolver: ConnectionResolver::default(),
        management: None,
        max_steps,
    }
}

pub fn chat_body(json: Value) -> ChatRequestBody {
    serde_json::from_value(json).expect("valid chat body")
}

pub fn question(text: &str) -> ChatRequestBody {
    chat_body(json!({
        "messages": [{"role": "user", "content": text}],
        "apiKey": "sk-ant-test",
        "projectRef": PROJECT
    }))
}

/// Drain every event until the sender side is dropped.
pub async fn collect_events(mut rx: mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    while let Some(ev) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("event stream stalled")
    {
        events.push(ev);
    }
    events
}
