use thiserror::Error;

use crate::RunStatus;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("task code must not be empty")]
    EmptyTaskCode,
    #[error("invalid run status transition: {from} -> {to}")]
    InvalidTransition { from: RunStatus, to: RunStatus },
    #[error("unknown run status: {0}")]
    UnknownStatus(String),
}
