//! Conversation history with summarizing compaction.
//!
//! The history always starts with the system message. When the estimated
//! size (or the size last reported by the backend) crosses the budget, the
//! span between the system message and the most recent `keep_recent`
//! messages is replaced by one assistant-role summary message.
//!
//! The span boundary is moved backward until it does not separate an
//! assistant message that requested tools from the results that answer it.

use serde_json::Value;
use stepwise_core::error::ProviderError;
use stepwise_core::message::{Message, Role};
use tracing::{debug, info};

use crate::summarizer::Summarizer;
use crate::token::estimate_messages_tokens;

/// Prefix of the synthetic summary message.
pub const SUMMARY_PREFIX: &str = "[Summary of earlier conversation]";

/// What a successful compaction did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionReport {
    pub before_tokens: usize,
    pub after_tokens: usize,
    /// Messages folded into the summary
    pub summarized_messages: usize,
    /// Messages preserved verbatim after the summary
    pub kept_messages: usize,
}

/// Ordered message log for one run.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    messages: Vec<Message>,
    keep_recent: usize,
    /// Set by a successful compaction, cleared by the next append
    compacted_since_append: bool,
    /// Prompt size the backend last reported, cleared by compaction
    reported_prompt_tokens: Option<u32>,
}

impl HistoryManager {
    /// Seed a history with its system message.
    pub fn new(system_prompt: impl Into<String>, keep_recent: usize) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
            keep_recent,
            compacted_since_append: false,
            reported_prompt_tokens: None,
        }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.compacted_since_append = false;
    }

    /// Ordered copy of the current history.
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn estimated_tokens(&self) -> usize {
        estimate_messages_tokens(&self.messages)
    }

    /// Record the prompt size the backend reported for the latest request.
    pub fn record_reported_prompt_tokens(&mut self, tokens: u32) {
        self.reported_prompt_tokens = Some(tokens);
    }

    pub fn reported_prompt_tokens(&self) -> Option<u32> {
        self.reported_prompt_tokens
    }

    /// Whether either size signal is over `token_budget`.
    pub fn exceeds(&self, token_budget: usize) -> bool {
        let reported = self
            .reported_prompt_tokens
            .is_some_and(|t| t as usize > token_budget);
        reported || self.estimated_tokens() > token_budget
    }

    /// End (exclusive) of the span to summarize, or `None` if nothing can be.
    ///
    /// The span always starts right after the system message.
    fn compaction_boundary(&self) -> Option<usize> {
        let len = self.messages.len();
        let mut end = len.saturating_sub(self.keep_recent).max(1);
        while end > 1 && self.splits_tool_group(end) {
            end -= 1;
        }
        // Folding a single message into a summary saves nothing.
        (end >= 3).then_some(end)
    }

    fn splits_tool_group(&self, end: usize) -> bool {
        let next_is_result = self
            .messages
            .get(end)
            .is_some_and(|m| m.role == Role::Tool);
        next_is_result || self.messages[end - 1].requests_tools()
    }

    /// Compact if the history is over `token_budget`.
    ///
    /// Returns `Ok(None)` when nothing changed. A second call with no append
    /// in between is always a no-op. On summarizer failure the history is
    /// left exactly as it was.
    pub async fn maybe_compact(
        &mut self,
        token_budget: usize,
        summarizer: &dyn Summarizer,
    ) -> Result<Option<CompactionReport>, ProviderError> {
        if self.compacted_since_append || !self.exceeds(token_budget) {
            return Ok(None);
        }

        let Some(end) = self.compaction_boundary() else {
            debug!(
                messages = self.messages.len(),
                keep_recent = self.keep_recent,
                "History over budget but no span can be compacted"
            );
            return Ok(None);
        };

        let before_tokens = self.estimated_tokens();
        let summary = summarizer.summarize(&self.messages[1..end]).await?;

        let mut summary_msg = Message::assistant(format!("{SUMMARY_PREFIX}\n{summary}"));
        summary_msg.metadata.insert("summary".into(), Value::Bool(true));

        let kept = self.messages.len() - end;
        let tail = self.messages.split_off(end);
        let summarized = self.messages.len() - 1;
        self.messages.truncate(1);
        self.messages.push(summary_msg);
        self.messages.extend(tail);

        self.compacted_since_append = true;
        self.reported_prompt_tokens = None;

        let report = CompactionReport {
            before_tokens,
            after_tokens: self.estimated_tokens(),
            summarized_messages: summarized,
            kept_messages: kept,
        };
        info!(
            before = report.before_tokens,
            after = report.after_tokens,
            summarized = report.summarized_messages,
            kept = report.kept_messages,
            "Compacted history"
        );
        Ok(Some(report))
    }
}
