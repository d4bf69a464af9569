//! Built-in tool implementations for Unison.
//!
//! Tools give an agent something to do between model turns: arithmetic,
//! reading the clock, and keeping a running ledger. Every call to
//! [`default_registry`] builds fresh instances, so stateful tools such as
//! the ledger are never shared between agents.

pub mod calculator;
pub mod ledger;
pub mod time;

use unison_core::tool::{Tool, ToolRegistry};

pub use calculator::Calculator;
pub use ledger::Ledger;
pub use time::TimeTool;

/// Names of every built-in tool, in registry order.
pub const BUILTIN_TOOLS: &[&str] = &["calculator", "ledger", "time_tool"];

/// Create a registry with one fresh instance of each built-in tool.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for name in BUILTIN_TOOLS {
        if let Some(tool) = by_name(name) {
            registry.register(tool);
        }
    }
    registry
}

/// Build a single built-in tool by name.
pub fn by_name(name: &str) -> Option<Box<dyn Tool>> {
    match name {
        "calculator" => Some(Box::new(Calculator::new())),
        "ledger" => Some(Box::new(Ledger::new())),
        "time_tool" => Some(Box::new(TimeTool::new())),
        _ => None,
    }
}
