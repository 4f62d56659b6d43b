//! The YAML-backed queue and its sequential runner.

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{QueueError, TaskId, TaskRecord, TaskStatus};

/// Result of executing one task: the written report, or why there is none.
pub type TaskOutcome = Result<PathBuf, String>;

/// Counts from one [`TaskQueue::run_pending`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueRunSummary {
    pub done: usize,
    pub failed: usize,
    /// Tasks still scheduled when the call returned (non-zero after a stop).
    pub remaining: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct QueueFile {
    #[serde(default)]
    tasks: Vec<TaskRecord>,
}

/// A task list persisted as YAML at a fixed path.
///
/// The queue assumes a single writer: concurrent `queue add` calls while a
/// `queue run` is in progress may be overwritten by the runner.
#[derive(Debug)]
pub struct TaskQueue {
    path: PathBuf,
    tasks: Vec<TaskRecord>,
}

impl TaskQueue {
    /// Loads the queue at `path`; a missing file is an empty queue.
    ///
    /// Tasks left `running` by an interrupted process come back as
    /// `scheduled`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, QueueError> {
        let path = path.into();
        let mut file = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => QueueFile::default(),
            Ok(content) => {
                serde_yaml::from_str::<QueueFile>(&content).map_err(|source| QueueError::Parse {
                    path: path.clone(),
                    source,
                })?
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => QueueFile::default(),
            Err(source) => return Err(QueueError::Io { path, source }),
        };

        for task in file
            .tasks
            .iter_mut()
            .filter(|t| t.status == TaskStatus::Running)
        {
            warn!(task_id = %task.id, "task was interrupted while running, rescheduling");
            task.transition(TaskStatus::Scheduled);
        }

        Ok(Self {
            path,
            tasks: file.tasks,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All tasks in submission order.
    pub fn tasks(&self) -> &[TaskRecord] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    /// Appends a scheduled task for `prompt` and persists the queue.
    pub fn add(&mut self, prompt: &str) -> Result<TaskId, QueueError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(QueueError::EmptyPrompt);
        }
        let task = TaskRecord::new(prompt);
        let id = task.id;
        self.tasks.push(task);
        self.persist()?;
        info!(task_id = %id, "task queued");
        Ok(id)
    }

    /// Moves every failed task back to `scheduled`, clearing its error.
    /// Returns how many were reset.
    pub fn reset_failed(&mut self) -> Result<usize, QueueError> {
        let mut reset = 0;
        for task in self
            .tasks
            .iter_mut()
            .filter(|t| t.status == TaskStatus::Failed)
        {
            task.transition(TaskStatus::Scheduled);
            task.error = None;
            reset += 1;
        }
        if reset > 0 {
            self.persist()?;
        }
        Ok(reset)
    }

    /// Runs scheduled tasks one at a time, in submission order, until none is
    /// left or `cancel` fires.
    ///
    /// The `running` status is persisted before `runner` is called, and the
    /// outcome is persisted before the next task starts. Cancellation is
    /// checked between tasks; the in-flight task always receives its outcome.
    pub async fn run_pending<F, Fut>(
        &mut self,
        cancel: &CancellationToken,
        mut runner: F,
    ) -> Result<QueueRunSummary, QueueError>
    where
        F: FnMut(TaskRecord) -> Fut,
        Fut: Future<Output = TaskOutcome>,
    {
        let mut summary = QueueRunSummary::default();

        while !cancel.is_cancelled() {
            let Some(index) = self
                .tasks
                .iter()
                .position(|t| t.status == TaskStatus::Scheduled)
            else {
                break;
            };

            self.tasks[index].transition(TaskStatus::Running);
            self.persist()?;
            let task = self.tasks[index].clone();
            info!(task_id = %task.id, "running queued task");

            let outcome = runner(task).await;

            let task = &mut self.tasks[index];
            match outcome {
                Ok(report_path) => {
                    info!(task_id = %task.id, report = %report_path.display(), "queued task done");
                    task.transition(TaskStatus::Done);
                    task.report_path = Some(report_path);
                    task.error = None;
                    summary.done += 1;
                }
                Err(reason) => {
                    warn!(task_id = %task.id, %reason, "queued task failed");
                    task.transition(TaskStatus::Failed);
                    task.error = Some(reason);
                    summary.failed += 1;
                }
            }
            self.persist()?;
        }

        summary.remaining = self.count(TaskStatus::Scheduled);
        if summary.remaining > 0 {
            warn!(remaining = summary.remaining, "queue run stopped before all tasks ran");
        }
        Ok(summary)
    }

    /// Writes the queue to a sibling temporary file and renames it over the
    /// queue file.
    fn persist(&self) -> Result<(), QueueError> {
        let io_error = |source: std::io::Error| QueueError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let yaml = serde_yaml::to_string(&QueueFile {
            tasks: self.tasks.clone(),
        })
        .map_err(QueueError::Serialize)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, yaml).map_err(io_error)?;
        std::fs::rename(&tmp, &self.path).map_err(io_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_an_empty_queue() {
        let dir = tempdir().unwrap();
        let queue = TaskQueue::open(dir.path().join("queue.yaml")).unwrap();
        assert!(queue.tasks().is_empty());
    }

    #[test]
    fn added_tasks_are_persisted_in_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("queue.yaml");
        let mut queue = TaskQueue::open(&path).unwrap();
        let first = queue.add("  first prompt ").unwrap();
        let second = queue.add("second prompt").unwrap();

        let reloaded = TaskQueue::open(&path).unwrap();
        let ids: Vec<_> = reloaded.tasks().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![first, second]);
        assert_eq!(reloaded.tasks()[0].prompt, "first prompt");
        assert_eq!(reloaded.count(TaskStatus::Scheduled), 2);
    }

    #[test]
    fn blank_prompt_is_rejected() {
        let dir = tempdir().unwrap();
        let mut queue = TaskQueue::open(dir.path().join("queue.yaml")).unwrap();
        assert!(matches!(queue.add(" \n "), Err(QueueError::EmptyPrompt)));
        assert!(!dir.path().join("queue.yaml").exists());
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.yaml");
        std::fs::write(&path, "tasks: [ {id: 1").unwrap();
        assert!(matches!(TaskQueue::open(&path), Err(QueueError::Parse { .. })));
    }

    #[test]
    fn interrupted_tasks_are_rescheduled_on_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.yaml");
        let mut queue = TaskQueue::open(&path).unwrap();
        let id = queue.add("prompt").unwrap();
        queue.tasks[0].transition(TaskStatus::Running);
        queue.persist().unwrap();

        let reloaded = TaskQueue::open(&path).unwrap();
        assert_eq!(reloaded.get(id).unwrap().status, TaskStatus::Scheduled);
    }

    #[tokio::test]
    async fn runs_tasks_sequentially_and_records_outcomes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.yaml");
        let mut queue = TaskQueue::open(&path).unwrap();
        let ok = queue.add("works").unwrap();
        let bad = queue.add("breaks").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&seen);
        let summary = queue
            .run_pending(&CancellationToken::new(), move |task| {
                let log = Arc::clone(&log);
                async move {
                    log.lock().unwrap().push(task.prompt.clone());
                    if task.prompt == "works" {
                        Ok(PathBuf::from("reports/works.md"))
                    } else {
                        Err("no report produced".to_string())
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["works", "breaks"]);
        assert_eq!(
            summary,
            QueueRunSummary {
                done: 1,
                failed: 1,
                remaining: 0
            }
        );
        let reloaded = TaskQueue::open(&path).unwrap();
        let done = reloaded.get(ok).unwrap();
        assert_eq!(done.status, TaskStatus::Done);
        assert_eq!(done.report_path.as_deref(), Some(Path::new("reports/works.md")));
        let failed = reloaded.get(bad).unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("no report produced"));
    }

    #[tokio::test]
    async fn running_status_is_persisted_before_the_runner_starts() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.yaml");
        let mut queue = TaskQueue::open(&path).unwrap();
        queue.add("prompt").unwrap();

        let raw = Arc::new(Mutex::new(String::new()));
        let captured = Arc::clone(&raw);
        let runner_path = path.clone();
        queue
            .run_pending(&CancellationToken::new(), move |_| {
                let content = std::fs::read_to_string(&runner_path).unwrap();
                *captured.lock().unwrap() = content;
                async { Ok::<_, String>(PathBuf::from("r.md")) }
            })
            .await
            .unwrap();

        assert!(raw.lock().unwrap().contains("status: running"));
    }

    #[tokio::test]
    async fn cancellation_stops_between_tasks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.yaml");
        let mut queue = TaskQueue::open(&path).unwrap();
        queue.add("one").unwrap();
        queue.add("two").unwrap();
        let cancel = CancellationToken::new();

        let token = cancel.clone();
        let summary = queue
            .run_pending(&cancel, move |_| {
                token.cancel();
                async { Ok::<_, String>(PathBuf::from("r.md")) }
            })
            .await
            .unwrap();

        assert_eq!(summary.done, 1);
        assert_eq!(summary.remaining, 1);
        assert_eq!(TaskQueue::open(&path).unwrap().count(TaskStatus::Scheduled), 1);
    }

    #[test]
    fn reset_failed_reschedules_and_clears_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.yaml");
        let mut queue = TaskQueue::open(&path).unwrap();
        let id = queue.add("prompt").unwrap();
        queue.tasks[0].transition(TaskStatus::Failed);
        queue.tasks[0].error = Some("boom".to_string());
        queue.persist().unwrap();

        assert_eq!(queue.reset_failed().unwrap(), 1);
        assert_eq!(queue.reset_failed().unwrap(), 0);

        let reloaded = TaskQueue::open(&path).unwrap();
        let task = reloaded.get(id).unwrap();
        assert_eq!(task.status, TaskStatus::Scheduled);
        assert!(task.error.is_none());
    }
}
