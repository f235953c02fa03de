use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{Artifacts, ModelError, RowCount, RunId, RunStatus, TaskCode};

/// One audited execution of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRun {
    pub run_id: RunId,
    pub task_code: TaskCode,
    pub status: RunStatus,
    #[serde(with = "time_serde")]
    pub started_at: SystemTime,
    #[serde(default, with = "time_serde::option")]
    pub ended_at: Option<SystemTime>,
    pub host: String,
    pub pid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_read: Option<RowCount>,
    #[serde(default)]
    pub artifacts: Artifacts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl TaskRun {
    /// A freshly started run.
    pub fn start(
        run_id: RunId,
        task_code: TaskCode,
        pid: impl Into<String>,
        host: impl Into<String>,
        note: Option<String>,
    ) -> Self {
        Self {
            run_id,
            task_code,
            status: RunStatus::Running,
            started_at: SystemTime::now(),
            ended_at: None,
            host: host.into(),
            pid: pid.into(),
            note,
            rows_read: None,
            artifacts: Artifacts::Null,
            error_message: None,
        }
    }

    /// Close the run as `Succeeded`.
    ///
    /// A `None` note keeps the note given on start.
    pub fn finish(
        &mut self,
        note: Option<String>,
        rows_read: Option<RowCount>,
        artifacts: Artifacts,
    ) -> Result<(), ModelError> {
        self.status = self.status.transition(RunStatus::Succeeded)?;
        self.ended_at = Some(SystemTime::now());
        if note.is_some() {
            self.note = note;
        }
        self.rows_read = rows_read;
        self.artifacts = artifacts;
        Ok(())
    }

    /// Close the run as `Failed`.
    pub fn fail(&mut self, error_message: impl Into<String>) -> Result<(), ModelError> {
        self.status = self.status.transition(RunStatus::Failed)?;
        self.ended_at = Some(SystemTime::now());
        self.error_message = Some(error_message.into());
        Ok(())
    }
}

mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        since_epoch.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_secs(secs))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match time {
                Some(t) => {
                    let since_epoch = t
                        .duration_since(UNIX_EPOCH)
                        .map_err(serde::ser::Error::custom)?;
                    serializer.serialize_some(&since_epoch.as_secs())
                }
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let secs = Option::<u64>::deserialize(deserializer)?;
            Ok(secs.map(|s| UNIX_EPOCH + Duration::from_secs(s)))
        }
    }
}
