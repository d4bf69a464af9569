//! # Unison Core
//!
//! Domain types, traits, and error definitions for the Unison multi-agent
//! runtime. This crate does no I/O of its own: it defines the model
//! that the agent loop, the MCP bridge, and the concrete tools build on.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here. Implementations live in their respective
//! crates:
//! - [`LanguageModel`]: the text generator behind an agent
//! - [`Tool`]: any callable capability, local or bridged
//!
//! Everything is synchronous. The only asynchronous code in the workspace
//! lives behind the MCP bridge, which crosses into its own runtime.

pub mod error;
pub mod message;
pub mod model;
pub mod task;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, IssueKind, ParameterIssue, ProviderError, Result, ToolError, ValidationError};
pub use message::{Message, Role, Transcript};
pub use model::{LanguageModel, ModelRequest};
pub use task::TaskResult;
pub use tool::{
    ExecutionResult, ParamMap, ParamType, Tool, ToolParameter, ToolRegistry, panic_message,
    validate_arguments,
};
