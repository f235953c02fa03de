use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Lifecycle state of a task run.
///
/// A run is created `Running` and moves to exactly one terminal state, exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Registered by `start`, no terminal call yet.
    Running,
    /// Closed by `finish`.
    Succeeded,
    /// Closed by `fail`.
    Failed,
}

impl RunStatus {
    /// Returns `true` if the run won't transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }

    /// Validate a transition from `self` to `next`.
    ///
    /// Only `Running -> Succeeded` and `Running -> Failed` are allowed.
    pub fn transition(self, next: RunStatus) -> Result<RunStatus, ModelError> {
        match (self, next) {
            (RunStatus::Running, RunStatus::Succeeded | RunStatus::Failed) => Ok(next),
            (from, to) => Err(ModelError::InvalidTransition { from, to }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Succeeded => "SUCCEEDED",
            RunStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RUNNING" => Ok(RunStatus::Running),
            "SUCCEEDED" => Ok(RunStatus::Succeeded),
            "FAILED" => Ok(RunStatus::Failed),
            _ => Err(ModelError::UnknownStatus(s.to_string())),
        }
    }
}
