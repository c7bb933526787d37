//! # Stepwise Core
//!
//! Domain types, traits, and error definitions for the Stepwise agent
//! step machine. This crate has **no runtime policy** of its own: it defines
//! the vocabulary (messages, tools, backends, events, run state) that the
//! agent loop and its collaborators implement against.
//!
//! ## Design Philosophy
//!
//! Every external capability is a trait here:
//! - [`Provider`]: the model backend (`complete(history)`)
//! - [`Tool`]: a named capability with a parameter schema
//! - [`Observer`]: a consumer of events and state snapshots
//!
//! Implementations live in their respective crates, so the loop can be
//! exercised end to end with scripted providers and counting tools.

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{RunState, RunStatus, StateContainer};
pub use error::{ProviderError, ToolError};
pub use event::{AgentEvent, ErrorSource, EventChannel, EventKind, EventPayload, Observer};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolCall, ToolOutcome, ToolRegistry, ToolResult};

/// Cooperative cancellation handle passed into a run.
///
/// `cancel()` sets the flag; the loop observes it at the next step boundary.
pub use tokio_util::sync::CancellationToken;
