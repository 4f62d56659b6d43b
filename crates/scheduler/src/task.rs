use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a queued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle position of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Scheduled,
    Running,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Scheduled => "scheduled",
            TaskStatus::Running => "running",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One queued research prompt and the result of its last execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub prompt: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Where the report of the last successful run was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,

    /// Why the last run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskRecord {
    pub fn new(prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new_random(),
            prompt: prompt.into(),
            status: TaskStatus::Scheduled,
            created_at: now,
            updated_at: now,
            report_path: None,
            error: None,
        }
    }

    pub(crate) fn transition(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_scheduled() {
        let task = TaskRecord::new("explain X");
        assert_eq!(task.status, TaskStatus::Scheduled);
        assert_eq!(task.created_at, task.updated_at);
        assert!(task.report_path.is_none());
    }

    #[test]
    fn yaml_uses_lowercase_status_and_omits_empty_fields() {
        let yaml = serde_yaml::to_string(&TaskRecord::new("explain X")).unwrap();
        assert!(yaml.contains("status: scheduled"), "{yaml}");
        assert!(!yaml.contains("report_path"));
        assert!(!yaml.contains("error"));
    }
}
