//! Outcome of one task attempt by an agent or a clan.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Result of task execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Whether the task attempt finished without a critical error
    pub success: bool,

    /// The final result text (or a failure notice)
    pub result: String,

    /// Identity of the executing agent (`Clan-<name>` for clans)
    pub agent_identity: String,

    /// Wall-clock time of the attempt
    #[serde(with = "secs_f64")]
    pub execution_time: Duration,

    /// Iterations used (rounds, for clans)
    pub iterations_used: u32,

    /// Error message if the task failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskResult {
    pub fn completed(
        agent_identity: impl Into<String>,
        result: impl Into<String>,
        execution_time: Duration,
        iterations_used: u32,
    ) -> Self {
        Self {
            success: true,
            result: result.into(),
            agent_identity: agent_identity.into(),
            execution_time,
            iterations_used,
            error: None,
        }
    }

    pub fn failed(
        agent_identity: impl Into<String>,
        result: impl Into<String>,
        error: impl Into<String>,
        execution_time: Duration,
        iterations_used: u32,
    ) -> Self {
        Self {
            success: false,
            result: result.into(),
            agent_identity: agent_identity.into(),
            execution_time,
            iterations_used,
            error: Some(error.into()),
        }
    }
}

/// Serialize a `Duration` as fractional seconds.
pub(crate) mod secs_f64 {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::try_from_secs_f64(secs).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_carries_error() {
        let r = TaskResult::failed("scout", "gave up", "boom", Duration::from_millis(1500), 3);
        assert!(!r.success);
        assert_eq!(r.error.as_deref(), Some("boom"));
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["execution_time"], 1.5);
        assert_eq!(json["iterations_used"], 3);
    }
}
