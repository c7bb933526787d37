//! Tracing observer: run events as structured log records.

use stepwise_core::agent::RunState;
use stepwise_core::event::{AgentEvent, ErrorSource, EventPayload, Observer};
use tracing::{debug, error, info, warn};

/// Maps every event to a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Observer for TracingObserver {
    fn on_event(&self, event: &AgentEvent) {
        let run_id = event.run_id.as_str();
        match &event.payload {
            EventPayload::RunStart { max_steps } => {
                info!(run_id, max_steps, "Run started");
            }
            EventPayload::RunEnd { content, exhausted } => {
                info!(run_id, exhausted, chars = content.len(), "Run finished");
            }
            EventPayload::StepStart { step, max_steps } => {
                debug!(run_id, step, max_steps, "Step started");
            }
            EventPayload::StepEnd { step, elapsed_ms } => {
                debug!(run_id, step, elapsed_ms, "Step finished");
            }
            EventPayload::LlmRequest {
                step,
                message_count,
                estimated_tokens,
            } => {
                debug!(run_id, step, message_count, estimated_tokens, "LLM request");
            }
            EventPayload::LlmResponse {
                step,
                tool_call_count,
                finish_reason,
                ..
            } => {
                debug!(run_id, step, tool_call_count, finish_reason = ?finish_reason, "LLM response");
            }
            EventPayload::ToolCall {
                step,
                call_id,
                tool_name,
                ..
            } => {
                info!(run_id, step, call_id = %call_id, tool = %tool_name, "Tool call");
            }
            EventPayload::ToolResult {
                step,
                call_id,
                tool_name,
                success,
                error,
                elapsed_ms,
                ..
            } => {
                if *success {
                    info!(run_id, step, call_id = %call_id, tool = %tool_name, elapsed_ms, "Tool succeeded");
                } else {
                    warn!(
                        run_id,
                        step,
                        call_id = %call_id,
                        tool = %tool_name,
                        elapsed_ms,
                        error = error.as_deref().unwrap_or(""),
                        "Tool failed"
                    );
                }
            }
            EventPayload::TokenUsage {
                prompt_tokens,
                completion_tokens,
                total_tokens,
                run_total_tokens,
            } => {
                debug!(
                    run_id,
                    prompt_tokens, completion_tokens, total_tokens, run_total_tokens, "Token usage"
                );
            }
            EventPayload::Summarize {
                before_tokens,
                after_tokens,
                summarized_messages,
                kept_messages,
            } => {
                info!(
                    run_id,
                    before_tokens, after_tokens, summarized_messages, kept_messages, "History summarized"
                );
            }
            EventPayload::Error {
                source,
                message,
                attempts,
            } => match source {
                ErrorSource::Backend => {
                    error!(run_id, attempts = ?attempts, error = %message, "Backend failed");
                }
                ErrorSource::Summarization => {
                    warn!(run_id, error = %message, "Summarization failed; compaction skipped");
                }
            },
            EventPayload::Cancelled { step } => {
                warn!(run_id, step, "Run cancelled");
            }
        }
    }

    fn on_state_change(&self, state: &RunState) {
        debug!(
            run_id = %state.run_id,
            status = %state.status,
            step = state.current_step,
            total_tokens = state.total_tokens,
            "Run state changed"
        );
    }
}
