//! Run events and the fan-out channel that delivers them.
//!
//! The loop never prints, renders, or logs presentation output itself. It
//! emits [`AgentEvent`]s through an [`EventChannel`], and any number of
//! [`Observer`]s (terminal, web socket bridge, logger, test recorder) consume
//! them.
//!
//! Delivery is synchronous and in registration order: an observer that
//! blocks, blocks the loop. Observers that need isolation should hand events
//! off to their own queue (see the broadcast observer in the agent crate).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::error;

use crate::agent::RunState;

/// One immutable progress record of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    /// The run that produced this event
    pub run_id: String,

    /// When the event was constructed
    pub timestamp: DateTime<Utc>,

    /// Kind-specific fields
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl AgentEvent {
    pub fn new(run_id: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            run_id: run_id.into(),
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// Where an ERROR event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    /// The backend call failed fatally; the run terminates.
    Backend,
    /// The summarization call failed; compaction was skipped.
    Summarization,
}

/// Event-specific data, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    RunStart {
        max_steps: u32,
    },
    RunEnd {
        content: String,
        /// True when the run stopped because the step budget ran out.
        exhausted: bool,
    },
    StepStart {
        step: u32,
        max_steps: u32,
    },
    StepEnd {
        step: u32,
        elapsed_ms: u64,
    },
    LlmRequest {
        step: u32,
        message_count: usize,
        estimated_tokens: usize,
    },
    LlmResponse {
        step: u32,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thinking: Option<String>,
        tool_call_count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
    },
    ToolCall {
        step: u32,
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },
    ToolResult {
        step: u32,
        call_id: String,
        tool_name: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        elapsed_ms: u64,
    },
    TokenUsage {
        prompt_tokens: u32,
        completion_tokens: u32,
        total_tokens: u32,
        run_total_tokens: u64,
    },
    Summarize {
        before_tokens: usize,
        after_tokens: usize,
        summarized_messages: usize,
        kept_messages: usize,
    },
    Error {
        source: ErrorSource,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attempts: Option<u32>,
    },
    Cancelled {
        step: u32,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::RunStart { .. } => EventKind::RunStart,
            Self::RunEnd { .. } => EventKind::RunEnd,
            Self::StepStart { .. } => EventKind::StepStart,
            Self::StepEnd { .. } => EventKind::StepEnd,
            Self::LlmRequest { .. } => EventKind::LlmRequest,
            Self::LlmResponse { .. } => EventKind::LlmResponse,
            Self::ToolCall { .. } => EventKind::ToolCall,
            Self::ToolResult { .. } => EventKind::ToolResult,
            Self::TokenUsage { .. } => EventKind::TokenUsage,
            Self::Summarize { .. } => EventKind::Summarize,
            Self::Error { .. } => EventKind::Error,
            Self::Cancelled { .. } => EventKind::Cancelled,
        }
    }
}

/// Fieldless event discriminant, convenient for filtering and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    RunStart,
    RunEnd,
    StepStart,
    StepEnd,
    LlmRequest,
    LlmResponse,
    ToolCall,
    ToolResult,
    TokenUsage,
    Summarize,
    Error,
    Cancelled,
}

impl EventKind {
    /// Wire name, matching the serialized `type` tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RunStart => "run_start",
            Self::RunEnd => "run_end",
            Self::StepStart => "step_start",
            Self::StepEnd => "step_end",
            Self::LlmRequest => "llm_request",
            Self::LlmResponse => "llm_response",
            Self::ToolCall => "tool_call",
            Self::ToolResult => "tool_result",
            Self::TokenUsage => "token_usage",
            Self::Summarize => "summarize",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// An external consumer of run events and state snapshots.
///
/// Implementations must not block for long; panics are caught and
/// suppressed at the emission boundary.
pub trait Observer: Send + Sync {
    fn on_event(&self, event: &AgentEvent);

    fn on_state_change(&self, _state: &RunState) {}
}

/// Fan-out publisher for one run's events.
#[derive(Clone, Default)]
pub struct EventChannel {
    observers: Vec<Arc<dyn Observer>>,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Delivery follows registration order.
    pub fn subscribe(&mut self, observer: Arc<dyn Observer>) {
        self.observers.push(observer);
    }

    /// Builder-style [`subscribe`](Self::subscribe).
    pub fn with(mut self, observer: Arc<dyn Observer>) -> Self {
        self.subscribe(observer);
        self
    }

    pub fn observers(&self) -> &[Arc<dyn Observer>] {
        &self.observers
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver an event to every observer, suppressing observer panics.
    pub fn emit(&self, event: AgentEvent) {
        for (idx, observer) in self.observers.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| observer.on_event(&event))).is_err() {
                error!(
                    observer = idx,
                    kind = event.kind().as_str(),
                    "Observer panicked while handling event; suppressed"
                );
            }
        }
    }
}

impl std::fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("observers", &self.observers.len())
            .finish()
    }
}
