//! Built-in observers.
//!
//! Presentation lives outside the loop; these are the consumers every
//! deployment tends to want.

mod broadcast;
mod jsonl;
mod logging;

pub use broadcast::BroadcastObserver;
pub use jsonl::JsonlRecorder;
pub use logging::TracingObserver;
