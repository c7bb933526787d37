//! Shared test helpers for the agent crate's unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use stepwise_core::agent::{RunState, RunStatus};
use stepwise_core::error::ProviderError;
use stepwise_core::event::{AgentEvent, EventKind, Observer};
use stepwise_core::message::Message;
use stepwise_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use stepwise_core::tool::ToolCall;

/// A mock provider that returns a sequence of scripted results.
///
/// Panics if more calls are made than results provided.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("ScriptedProvider: no more responses")
    }
}

/// Create a simple text response (no tool calls).
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

/// Create a response that requests the given tool calls.
pub fn tool_call_response(calls: Vec<ToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tool_calls("", calls),
        usage: None,
        model: "mock-model".into(),
        finish_reason: Some("tool_calls".into()),
    }
}

/// Records event kinds and state statuses.
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<AgentEvent>>,
    states: Mutex<Vec<RunState>>,
}

impl EventLog {
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind()).collect()
    }

    pub fn statuses(&self) -> Vec<RunStatus> {
        self.states.lock().unwrap().iter().map(|s| s.status).collect()
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
