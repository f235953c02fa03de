use std::{fmt, ops::Deref};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Unique key of a recurring task definition (e.g. `AUTO_SYNC_FLAT`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskCode(String);

impl TaskCode {
    /// Delta export / change-tracking sync.
    pub const AUTO_SYNC_FLAT: &'static str = "AUTO_SYNC_FLAT";
    /// Flat vs. crosstab reconciliation.
    pub const PARITY_CHECK: &'static str = "PARITY_CHECK";

    pub fn new(code: impl Into<String>) -> Result<Self, ModelError> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(ModelError::EmptyTaskCode);
        }
        Ok(Self(code))
    }

    pub fn auto_sync_flat() -> Self {
        Self(Self::AUTO_SYNC_FLAT.to_string())
    }

    pub fn parity_check() -> Self {
        Self(Self::PARITY_CHECK.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for TaskCode {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for TaskCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_code() {
        assert_eq!(TaskCode::new("  "), Err(ModelError::EmptyTaskCode));
        assert_eq!(TaskCode::new(""), Err(ModelError::EmptyTaskCode));
    }

    #[test]
    fn well_known_codes() {
        assert_eq!(TaskCode::auto_sync_flat().as_str(), "AUTO_SYNC_FLAT");
        assert_eq!(TaskCode::parity_check().to_string(), "PARITY_CHECK");
    }
}
