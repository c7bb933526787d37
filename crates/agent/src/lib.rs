//! The step loop at the heart of Stepwise.
//!
//! Each run alternates between the model backend and the tools it asks for:
//!
//! 1. **Seed** the history with the system prompt and the user message
//! 2. **Call the backend** through the retry wrapper
//! 3. **If tool calls**: dispatch them, compact history if needed, append
//!    the results in request order, and go back to step 2
//! 4. **If no tool calls**: that message is the final answer
//!
//! The run also stops on cancellation (checked at the top of every step), on
//! a fatal backend fault, or when the step budget runs out. Progress is only
//! ever reported through the run's [`EventChannel`](stepwise_core::EventChannel).

pub mod dispatcher;
pub mod history;
pub mod loop_runner;
pub mod observers;
pub mod retry;
pub mod summarizer;
pub mod token;

#[cfg(test)]
mod test_helpers;

pub use dispatcher::ToolDispatcher;
pub use history::{CompactionReport, HistoryManager};
pub use loop_runner::{AgentLoop, CANCELLED_MESSAGE, RunOutcome, RunRequest, exhausted_message};
pub use observers::{BroadcastObserver, JsonlRecorder, TracingObserver};
pub use retry::{RetryError, RetryPolicy};
pub use summarizer::{ProviderSummarizer, Summarizer};
