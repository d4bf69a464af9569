//! Ledger tool: a running list of labelled amounts.
//!
//! Entries live in the tool instance, so they persist across invocations
//! within one agent and are never shared with another agent's ledger.

use serde_json::{Value, json};
use unison_core::error::ToolError;
use unison_core::tool::{ParamMap, ParamType, Tool, ToolParameter};

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    label: String,
    amount: f64,
}

pub struct Ledger {
    params: Vec<ToolParameter>,
    entries: Vec<Entry>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            params: vec![
                ToolParameter::new("action", "What to do with the ledger", ParamType::String)
                    .with_choices(["add", "total", "list", "clear"]),
                ToolParameter::new("label", "Entry label (for add)", ParamType::String).optional(),
                ToolParameter::new("amount", "Entry amount (for add)", ParamType::Float).optional(),
            ],
            entries: Vec::new(),
        }
    }

    fn total(&self) -> f64 {
        self.entries.iter().map(|e| e.amount).sum()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for Ledger {
    fn name(&self) -> &str {
        "ledger"
    }

    fn description(&self) -> &str {
        "Keep a running ledger of amounts. Actions: add (label, amount), total, list, clear."
    }

    fn parameters(&self) -> &[ToolParameter] {
        &self.params
    }

    fn run(&mut self, args: &ParamMap) -> Result<Value, ToolError> {
        let action = args.get("action").and_then(Value::as_str).unwrap_or_default();

        match action {
            "add" => {
                let amount = args.get("amount").and_then(Value::as_f64).ok_or_else(|| {
                    ToolError::InvalidArguments("'amount' is required for add".into())
                })?;
                let label = args
                    .get("label")
                    .and_then(Value::as_str)
                    .unwrap_or("entry")
                    .to_string();
                self.entries.push(Entry { label, amount });
                Ok(json!({"entries": self.entries.len(), "total": self.total()}))
            }
            "total" => Ok(json!(self.total())),
            "list" => Ok(Value::Array(
                self.entries
                    .iter()
                    .map(|e| json!({"label": e.label, "amount": e.amount}))
                    .collect(),
            )),
            "clear" => {
                let removed = self.entries.len();
                self.entries.clear();
                Ok(json!({"removed": removed}))
            }
            other => Err(ToolError::InvalidArguments(format!("unknown action '{other}'"))),
        }
    }
}
