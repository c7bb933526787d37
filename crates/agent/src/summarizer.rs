//! Summarization backend used by history compaction.

use async_trait::async_trait;
use std::sync::Arc;
use stepwise_core::error::ProviderError;
use stepwise_core::message::{Message, Role};
use stepwise_core::provider::{Provider, ProviderRequest};

use crate::retry::RetryPolicy;

/// Instruction sent with every summarization request.
pub const SUMMARY_INSTRUCTION: &str =
    "Summarize the following exchange preserving facts needed to continue the task.";

/// Turns a span of history into a single summary text.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, messages: &[Message]) -> Result<String, ProviderError>;
}

/// Summarizes by making one extra call to the run's own backend.
pub struct ProviderSummarizer {
    provider: Arc<dyn Provider>,
    model: String,
    retry: RetryPolicy,
}

impl ProviderSummarizer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            retry: RetryPolicy::no_retry(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Summarizer for ProviderSummarizer {
    async fn summarize(&self, messages: &[Message]) -> Result<String, ProviderError> {
        let transcript = render_transcript(messages);
        let request = ProviderRequest {
            temperature: 0.0,
            ..ProviderRequest::new(
                &self.model,
                vec![
                    Message::system("You are an assistant that writes concise, factual summaries of agent transcripts."),
                    Message::user(format!("{SUMMARY_INSTRUCTION}\n\n{transcript}")),
                ],
            )
        };

        let provider = self.provider.clone();
        let response = self
            .retry
            .call(|| {
                let provider = provider.clone();
                let request = request.clone();
                async move { provider.complete(request).await }
            })
            .await
            .map_err(|e| e.source)?;

        let summary = response.message.content.trim().to_string();
        if summary.is_empty() {
            return Err(ProviderError::InvalidResponse(
                "summarization returned empty content".into(),
            ));
        }
        Ok(summary)
    }
}

/// Plain-text rendering of messages for the summarization prompt.
pub fn render_transcript(messages: &[Message]) -> String {
    let mut out = String::new();
    for msg in messages {
        match msg.role {
            Role::Tool => {
                let name = msg.name.as_deref().unwrap_or("tool");
                out.push_str(&format!("[tool result: {name}]\n{}\n\n", msg.content));
            }
            role => {
                out.push_str(&format!("[{role}]\n{}\n", msg.content));
                for call in &msg.tool_calls {
                    out.push_str(&format!("-> called {}({})\n", call.name, call.arguments));
                }
                out.push('\n');
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_core::provider::ProviderResponse;
    use stepwise_core::tool::ToolCall;
    use std::sync::Mutex;

    struct CapturingProvider {
        reply: String,
        seen: Mutex<Vec<ProviderRequest>>,
    }

    #[async_trait]
    impl Provider for CapturingProvider {
        fn name(&self) -> &str {
            "capture"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.seen.lock().unwrap().push(request);
            Ok(ProviderResponse {
                message: Message::assistant(&self.reply),
                usage: None,
                model: "mock".into(),
                finish_reason: None,
            })
        }
    }

    #[test]
    fn transcript_shows_calls_and_results() {
        let text = render_transcript(&[
            Message::user("what is 2+2"),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCall::new("c1", "calc", serde_json::json!({"expr": "2+2"}))],
            ),
            Message::tool_result("c1", "calc", "4"),
        ]);
        assert!(text.contains("[user]\nwhat is 2+2"));
        assert!(text.contains("-> called calc("));
        assert!(text.contains("[tool result: calc]\n4"));
    }

    #[tokio::test]
    async fn sends_instruction_with_transcript() {
        let provider = Arc::new(CapturingProvider {
            reply: "  The user wants a sum.  ".into(),
            seen: Mutex::new(Vec::new()),
        });
        let summarizer = ProviderSummarizer::new(provider.clone(), "gpt-4o");

        let summary = summarizer
            .summarize(&[Message::user("add numbers")])
            .await
            .unwrap();
        assert_eq!(summary, "The user wants a sum.");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].tools.is_empty());
        assert!(seen[0].messages[1].content.starts_with(SUMMARY_INSTRUCTION));
        assert!(seen[0].messages[1].content.contains("add numbers"));
    }

    #[tokio::test]
    async fn empty_summary_is_an_error() {
        let provider = Arc::new(CapturingProvider {
            reply: "   ".into(),
            seen: Mutex::new(Vec::new()),
        });
        let summarizer = ProviderSummarizer::new(provider, "gpt-4o");
        assert!(matches!(
            summarizer.summarize(&[Message::user("x")]).await,
            Err(ProviderError::InvalidResponse(_))
        ));
    }
}
