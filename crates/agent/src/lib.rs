//! The agent runtime for Unison.
//!
//! An [`Agent`] runs a **prompt → parse → dispatch** cycle:
//!
//! 1. **Prompt** the model with the task, or with the newest context
//! 2. **Parse** YAML command blocks out of the raw response
//! 3. **Dispatch** each block: a tool call, a question for the user, a
//!    message to a clan mate, or the final result
//!
//! The cycle repeats until the agent passes a result, the response looks
//! finished, or the iteration ceiling is hit. A [`Clan`] plans once and
//! lets its manager delegate to the other members.

pub mod clan;
pub mod history;
pub mod input;
pub mod loop_runner;
pub mod parser;
pub mod prompts;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use clan::{Clan, ClanError, ClanMembership, strip_think};
pub use history::HistoryStore;
pub use input::{Interrupter, StdinInput, UserInput};
pub use loop_runner::{Agent, DEFAULT_MAX_ITERATIONS, Dispatch};
pub use parser::{Command, CommandBlock, normalize_params, parse_response};
