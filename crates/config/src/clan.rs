//! Clan definition files.
//!
//! ```toml
//! name = "research"
//! goal = "Write a short report on Rust adoption"
//! shared_instruction = "Be concise and cite numbers."
//! manager = "Lead"
//!
//! [[members]]
//! identity = "Lead"
//! description = "Coordinates the team"
//! task = "Deliver the final report"
//!
//! [[members]]
//! identity = "Analyst"
//! description = "Crunches numbers"
//! task = "Compute statistics"
//! tools = ["calculator"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClanFile {
    pub name: String,
    pub goal: String,
    pub shared_instruction: String,

    /// Identity of the member that drives execution
    pub manager: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,

    /// Overrides `agent.max_iterations` for every member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,

    #[serde(default)]
    pub members: Vec<MemberConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberConfig {
    pub identity: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub task: String,

    /// Built-in or bridged tool names
    #[serde(default)]
    pub tools: Vec<String>,
}

impl ClanFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let clan: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        clan.validate()?;
        Ok(clan)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let blank = [
            ("name", &self.name),
            ("goal", &self.goal),
            ("shared_instruction", &self.shared_instruction),
            ("manager", &self.manager),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());
        if let Some((field, _)) = blank {
            return Err(ConfigError::ValidationError(format!("clan {field} must not be empty")));
        }

        if self.max_iterations == Some(0) {
            return Err(ConfigError::ValidationError(
                "clan max_iterations must be at least 1".into(),
            ));
        }

        let mut seen = HashSet::new();
        for member in &self.members {
            if member.identity.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "member identity must not be empty".into(),
                ));
            }
            if !seen.insert(member.identity.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate member identity '{}'",
                    member.identity
                )));
            }
        }

        if !seen.contains(self.manager.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "manager '{}' is not one of the clan members",
                self.manager
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLAN: &str = r#"
name = "research"
goal = "Summarise the ledger"
shared_instruction = "Be brief."
manager = "Lead"
output_file = "out/clan.txt"

[[members]]
identity = "Lead"
description = "Coordinates"

[[members]]
identity = "Analyst"
description = "Numbers"
task = "Compute totals"
tools = ["calculator", "ledger"]
"#;

    #[test]
    fn parses_members_and_tools() {
        let clan: ClanFile = toml::from_str(CLAN).unwrap();
        clan.validate().unwrap();
        assert_eq!(clan.members.len(), 2);
        assert_eq!(clan.members[1].tools, vec!["calculator", "ledger"]);
        assert!(clan.members[0].tools.is_empty());
        assert_eq!(clan.output_file, Some(PathBuf::from("out/clan.txt")));
    }

    #[test]
    fn manager_must_be_a_member() {
        let mut clan: ClanFile = toml::from_str(CLAN).unwrap();
        clan.manager = "Ghost".into();
        let err = clan.validate().unwrap_err();
        assert!(err.to_string().contains("Ghost"));
    }

    #[test]
    fn duplicate_identities_rejected() {
        let mut clan: ClanFile = toml::from_str(CLAN).unwrap();
        clan.members[1].identity = "Lead".into();
        assert!(clan.validate().unwrap_err().to_string().contains("duplicate"));
    }

    #[test]
    fn blank_goal_rejected() {
        let mut clan: ClanFile = toml::from_str(CLAN).unwrap();
        clan.goal = "  ".into();
        assert!(clan.validate().unwrap_err().to_string().contains("goal"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clan.toml");
        std::fs::write(&path, CLAN).unwrap();
        let clan = ClanFile::load(&path).unwrap();
        assert_eq!(clan.name, "research");

        let missing = ClanFile::load(&dir.path().join("none.toml"));
        assert!(matches!(missing, Err(ConfigError::ReadError { .. })));
    }
}
