//! Local clock.

use chrono::Local;
use serde_json::Value;
use std::fmt::Write;
use unison_core::error::ToolError;
use unison_core::tool::{ParamMap, ParamType, Tool, ToolParameter};

pub struct TimeTool {
    params: Vec<ToolParameter>,
}

impl TimeTool {
    pub fn new() -> Self {
        Self {
            params: vec![
                ToolParameter::new("format", "strftime-style format string", ParamType::String)
                    .with_default("%H:%M:%S"),
            ],
        }
    }
}

impl Default for TimeTool {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for TimeTool {
    fn name(&self) -> &str {
        "time_tool"
    }

    fn description(&self) -> &str {
        "Get the current local time, formatted with a strftime-style pattern."
    }

    fn parameters(&self) -> &[ToolParameter] {
        &self.params
    }

    fn run(&mut self, args: &ParamMap) -> Result<Value, ToolError> {
        let format = args.get("format").and_then(Value::as_str).unwrap_or("%H:%M:%S");

        // chrono reports bad specifiers through fmt::Error rather than a Result.
        let mut out = String::new();
        write!(out, "{}", Local::now().format(format)).map_err(|_| {
            ToolError::failed(self.name(), format!("invalid time format '{format}'"))
        })?;
        Ok(Value::String(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_format_is_clock_time() {
        let mut tool = TimeTool::new();
        let result = tool.execute(&ParamMap::new());
        assert!(result.success);
        let text = result.text().unwrap();
        assert_eq!(text.len(), 8);
        assert_eq!(text.matches(':').count(), 2);
    }

    #[test]
    fn custom_format() {
        let mut tool = TimeTool::new();
        let args = json!({"format": "%Y"}).as_object().cloned().unwrap();
        let year = tool.execute(&args).text().unwrap();
        assert_eq!(year.len(), 4);
        assert!(year.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn invalid_format_fails_cleanly() {
        let mut tool = TimeTool::new();
        let args = json!({"format": "%Q%"}).as_object().cloned().unwrap();
        let result = tool.execute(&args);
        assert!(!result.success);
        assert!(result.error.unwrap().contains("invalid time format"));
    }
}
