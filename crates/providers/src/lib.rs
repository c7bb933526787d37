//! Model backend implementations for Stepwise.
//!
//! All backends implement the `stepwise_core::Provider` trait. The only
//! wire protocol shipped is the OpenAI-compatible chat completions API.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
