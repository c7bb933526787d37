//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token.
//! This approximation is accurate within ~10% for BPE tokenizers on
//! English text and is only used to decide when history compaction runs.

use stepwise_core::message::Message;

/// Per-message overhead for role name, delimiters and formatting markers.
const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    text.len().div_ceil(4)
}

/// Estimate tokens for a single message including per-message overhead.
///
/// Counts content, thinking, and the serialized tool-call requests.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let mut tokens = MESSAGE_OVERHEAD + estimate_tokens(&message.content);
    if let Some(thinking) = &message.thinking {
        tokens += estimate_tokens(thinking);
    }
    if !message.tool_calls.is_empty() {
        let json = serde_json::to_string(&message.tool_calls).unwrap_or_default();
        tokens += estimate_tokens(&json);
    }
    tokens
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}
