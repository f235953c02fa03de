use serde::{Deserialize, Serialize};

use crate::TaskCode;

/// A recurring unit of work, registered by an operator outside the worker.
///
/// Read-only to the worker; only `enabled` is ever consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub task_code: TaskCode,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub enabled: bool,
}

impl TaskDefinition {
    pub fn new(task_code: TaskCode, name: impl Into<String>) -> Self {
        Self {
            task_code,
            name: name.into(),
            description: None,
            owner: None,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
