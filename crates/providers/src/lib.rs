//! Language model clients for Unison.
//!
//! All clients implement the synchronous `unison_core::LanguageModel`
//! trait so the agent loop can call them directly.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatModel;
