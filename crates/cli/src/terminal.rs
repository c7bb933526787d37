//! Terminal rendering of run events.
//!
//! Progress goes to stderr so stdout carries only the final answer.

use stepwise_core::event::{AgentEvent, ErrorSource, EventPayload, Observer};

/// Tool output longer than this is shortened in the terminal view.
const PREVIEW_CHARS: usize = 300;

pub struct TerminalObserver {
    show_thinking: bool,
}

impl TerminalObserver {
    pub fn new(show_thinking: bool) -> Self {
        Self { show_thinking }
    }

    /// One rendered block per event, or `None` for events not shown.
    pub fn render(&self, event: &AgentEvent) -> Option<String> {
        match &event.payload {
            EventPayload::RunStart { max_steps } => {
                Some(format!("▶ Run {} started (max {max_steps} steps)", short_id(&event.run_id)))
            }
            EventPayload::StepStart { step, max_steps } => {
                Some(format!("\n── Step {step}/{max_steps} ──"))
            }
            EventPayload::LlmResponse {
                content,
                thinking,
                tool_call_count,
                ..
            } => {
                let mut out = Vec::new();
                if self.show_thinking
                    && let Some(thinking) = thinking
                {
                    out.push(format!("  💭 {}", preview(thinking)));
                }
                // The final answer goes to stdout after the run
                if *tool_call_count > 0 && !content.trim().is_empty() {
                    out.push(format!("  🤖 {}", content.trim()));
                }
                (!out.is_empty()).then(|| out.join("\n"))
            }
            EventPayload::ToolCall {
                tool_name,
                arguments,
                ..
            } => Some(format!("  🔧 {tool_name} {}", preview(&arguments.to_string()))),
            EventPayload::ToolResult {
                tool_name,
                success,
                content,
                error,
                elapsed_ms,
                ..
            } => {
                let (mark, body) = if *success {
                    ("✓", content.as_deref().unwrap_or_default())
                } else {
                    ("✗", error.as_deref().unwrap_or_default())
                };
                Some(format!("  {mark} {tool_name} ({elapsed_ms} ms): {}", preview(body)))
            }
            EventPayload::Summarize {
                before_tokens,
                after_tokens,
                summarized_messages,
                ..
            } => Some(format!(
                "  📝 Summarized {summarized_messages} messages (~{before_tokens} → ~{after_tokens} tokens)"
            )),
            EventPayload::Error {
                source,
                message,
                attempts,
            } => Some(match (source, attempts) {
                (ErrorSource::Backend, Some(n)) => format!("  ❌ Backend failed after {n} attempt(s): {message}"),
                (ErrorSource::Backend, None) => format!("  ❌ Backend failed: {message}"),
                (ErrorSource::Summarization, _) => format!("  ⚠ Summarization skipped: {message}"),
            }),
            EventPayload::Cancelled { step } => Some(format!("\n⏹ Cancelled at step {step}")),
            EventPayload::RunEnd { exhausted, .. } => Some(if *exhausted {
                "\n⚠ Step budget exhausted".to_string()
            } else {
                "\n✅ Done".to_string()
            }),
            EventPayload::StepEnd { .. }
            | EventPayload::LlmRequest { .. }
            | EventPayload::TokenUsage { .. } => None,
        }
    }
}

impl Observer for TerminalObserver {
    fn on_event(&self, event: &AgentEvent) {
        if let Some(line) = self.render(event) {
            eprintln!("{line}");
        }
    }
}

fn short_id(run_id: &str) -> &str {
    run_id.get(..8).unwrap_or(run_id)
}

fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ⏎ ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}…")
    }
}
