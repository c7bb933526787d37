//! Scripted backends, counting tools and recording observers shared by the
//! integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use stepwise_agent::Summarizer;
use stepwise_core::{
    AgentEvent, CancellationToken, EventKind, Message, Observer, Provider, ProviderError,
    ProviderRequest, ProviderResponse, RunState, RunStatus, Tool, ToolCall, ToolError, Usage,
};

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that plays back scripted results in sequence.
///
/// Once the script runs out it repeats `fallback`, or panics if there is none.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    fallback: Option<ProviderResponse>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn ok(responses: Vec<ProviderResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok).collect())
    }

    /// Always answer with `response`.
    pub fn always(response: ProviderResponse) -> Self {
        Self {
            fallback: Some(response),
            ..Self::new(vec![])
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.fallback {
            Some(response) => Ok(response.clone()),
            None => panic!("ScriptedProvider exhausted after {} calls", self.calls()),
        }
    }
}

pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
        finish_reason: Some("stop".into()),
    }
}

pub fn tool_response(calls: Vec<ToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tool_calls("", calls),
        usage: Some(Usage {
            prompt_tokens: 20,
            completion_tokens: 8,
            total_tokens: 28,
        }),
        model: "mock-model".into(),
        finish_reason: Some("tool_calls".into()),
    }
}

// ── Mock Tools ───────────────────────────────────────────────────────────

/// Adds integers in `expr` ("2+2") and counts every execution.
#[derive(Default)]
pub struct CalcTool {
    pub executions: Arc<AtomicUsize>,
}

impl CalcTool {
    /// A calculator plus a handle on its execution counter.
    pub fn counted() -> (Self, Arc<AtomicUsize>) {
        let tool = Self::default();
        let counter = tool.executions.clone();
        (tool, counter)
    }
}

#[async_trait]
impl Tool for CalcTool {
    fn name(&self) -> &str {
        "calc"
    }

    fn description(&self) -> &str {
        "Adds the integers in an expression like 2+2"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "expr": { "type": "string" } },
            "required": ["expr"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let expr = arguments["expr"].as_str().unwrap_or_default();
        let mut sum = 0i64;
        for term in expr.split('+') {
            sum += term
                .trim()
                .parse::<i64>()
                .map_err(|e| ToolError::failed("calc", format!("bad term '{term}': {e}")))?;
        }
        Ok(sum.to_string())
    }
}

/// Sleeps for `ms` milliseconds, then echoes `label`.
pub struct SleepTool;

#[async_trait]
impl Tool for SleepTool {
    fn name(&self) -> &str {
        "sleep"
    }

    fn description(&self) -> &str {
        "Waits, then echoes a label"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ms": { "type": "integer", "minimum": 0 },
                "label": { "type": "string" }
            },
            "required": ["ms", "label"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<String, ToolError> {
        let ms = arguments["ms"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(arguments["label"].as_str().unwrap_or_default().to_string())
    }
}

/// Requests cancellation while it runs, then finishes normally.
pub struct CancellingTool {
    pub token: CancellationToken,
    pub finished: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for CancellingTool {
    fn name(&self) -> &str {
        "long_job"
    }

    fn description(&self) -> &str {
        "A slow job during which the user hits Ctrl-C"
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    async fn execute(&self, _arguments: Value) -> Result<String, ToolError> {
        self.token.cancel();
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok("job finished".into())
    }
}

// ── Summarizers ──────────────────────────────────────────────────────────

pub struct StaticSummarizer {
    pub fail: bool,
    pub calls: AtomicUsize,
}

impl StaticSummarizer {
    pub fn ok() -> Self {
        Self { fail: false, calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { fail: true, calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl Summarizer for StaticSummarizer {
    async fn summarize(&self, messages: &[Message]) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::ApiError {
                status_code: 500,
                message: "summarizer offline".into(),
            });
        }
        Ok(format!("{} earlier messages", messages.len()))
    }
}

// ── Observers ────────────────────────────────────────────────────────────

/// Kinds named by the run contract; LLM_* and TOKEN_USAGE are extra detail.
pub const CORE_KINDS: &[EventKind] = &[
    EventKind::RunStart,
    EventKind::RunEnd,
    EventKind::StepStart,
    EventKind::StepEnd,
    EventKind::ToolCall,
    EventKind::ToolResult,
    EventKind::Summarize,
    EventKind::Error,
    EventKind::Cancelled,
];

#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<AgentEvent>>,
    states: Mutex<Vec<RunState>>,
}

impl EventLog {
    pub fn events(&self) -> Vec<AgentEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events().iter().map(|e| e.kind()).collect()
    }

    pub fn core_kinds(&self) -> Vec<EventKind> {
        self.kinds()
            .into_iter()
            .filter(|k| CORE_KINDS.contains(k))
            .collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.kinds().iter().filter(|k| **k == kind).count()
    }

    pub fn states(&self) -> Vec<RunState> {
        self.states.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<RunStatus> {
        self.states().iter().map(|s| s.status).collect()
    }
}

impl Observer for EventLog {
    fn on_event(&self, event: &AgentEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn on_state_change(&self, state: &RunState) {
        self.states.lock().unwrap().push(state.clone());
    }
}

pub struct PanickingObserver;

impl Observer for PanickingObserver {
    fn on_event(&self, _event: &AgentEvent) {
        panic!("observer bug");
    }

    fn on_state_change(&self, _state: &RunState) {
        panic!("observer bug");
    }
}
