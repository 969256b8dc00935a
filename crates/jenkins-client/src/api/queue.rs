//! The build queue.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::Pollable;
use super::build::Build;
use super::job::Job;
use crate::client::Jenkins;
use crate::error::{Error, Result};
use crate::types::{BuildRef, Cause, Parameter};

const QUEUE: &str = "/queue";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskInfo {
    pub name: String,
    pub url: String,
    pub color: Option<String>,
}

/// `GET /queue/item/{id}/api/json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskResponse {
    #[serde(rename = "_class")]
    pub class: String,
    pub actions: Vec<Value>,
    pub blocked: bool,
    pub buildable: bool,
    pub buildable_start_milliseconds: i64,
    pub cancelled: bool,
    pub executable: Option<BuildRef>,
    pub id: i64,
    pub in_queue_since: i64,
    pub params: String,
    pub pending: bool,
    pub stuck: bool,
    pub task: TaskInfo,
    pub url: String,
    pub why: Option<String>,
}

/// `GET /queue/api/json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueResponse {
    pub items: Vec<TaskResponse>,
}

/// Where a queue item stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Cancelled,
    /// Left the queue and became build `number`.
    Executable { number: i64 },
}

/// One queue item.
#[derive(Debug, Clone)]
pub struct Task {
    jenkins: Jenkins,
    base: String,
    raw: TaskResponse,
}

impl Pollable for Task {
    type Raw = TaskResponse;

    fn jenkins(&self) -> &Jenkins {
        &self.jenkins
    }

    fn base(&self) -> &str {
        &self.base
    }

    fn set_raw(&mut self, raw: TaskResponse) {
        self.raw = raw;
    }
}

impl Task {
    pub fn new(jenkins: &Jenkins, id: i64) -> Self {
        Self {
            jenkins: jenkins.clone(),
            base: format!("{QUEUE}/item/{id}"),
            raw: TaskResponse {
                id,
                ..TaskResponse::default()
            },
        }
    }

    fn from_raw(jenkins: &Jenkins, raw: TaskResponse) -> Self {
        Self {
            jenkins: jenkins.clone(),
            base: format!("{QUEUE}/item/{}", raw.id),
            raw,
        }
    }

    pub fn id(&self) -> i64 {
        self.raw.id
    }

    pub fn info(&self) -> &TaskResponse {
        &self.raw
    }

    /// Name of the queued job.
    pub fn job_name(&self) -> &str {
        &self.raw.task.name
    }

    pub fn why(&self) -> Option<&str> {
        self.raw.why.as_deref()
    }

    pub fn parameters(&self) -> Vec<Parameter> {
        self.scan("parameters")
    }

    pub fn causes(&self) -> Vec<Cause> {
        self.scan("causes")
    }

    fn scan<T: serde::de::DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.raw
            .actions
            .iter()
            .filter_map(|action| action.get(key).and_then(Value::as_array))
            .flatten()
            .filter_map(|item| serde_json::from_value(item.clone()).ok())
            .collect()
    }

    pub fn state(&self) -> TaskState {
        if self.raw.cancelled {
            TaskState::Cancelled
        } else if let Some(executable) = &self.raw.executable {
            TaskState::Executable {
                number: executable.number,
            }
        } else {
            TaskState::Queued
        }
    }

    pub async fn cancel(&self, cancel: &CancellationToken) -> Result<bool> {
        self.jenkins.cancel_queue_item(cancel, self.raw.id).await
    }

    /// The job this item will build.
    pub async fn get_job(&self, cancel: &CancellationToken) -> Result<Job> {
        if self.raw.task.url.is_empty() {
            return Err(Error::not_found("job for queue item", &self.raw.id.to_string()));
        }
        let mut job = Job::new(self.jenkins.clone(), self.jenkins.path_from_url(&self.raw.task.url));
        job.poll(cancel)
            .await
            .map_err(|e| e.or_not_found("job", &self.raw.task.name))?;
        Ok(job)
    }

    /// Poll until the item leaves the queue, sleeping `backoff` between
    /// polls, for at most `max_attempts` polls. Returns the last state seen,
    /// which is `Queued` when the attempts ran out.
    pub async fn wait_for_build(
        &mut self,
        cancel: &CancellationToken,
        backoff: Duration,
        max_attempts: u32,
    ) -> Result<TaskState> {
        for attempt in 0..max_attempts {
            if attempt > 0 {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }
            self.poll(cancel)
                .await
                .map_err(|e| e.or_not_found("queue item", &self.raw.id.to_string()))?;
            let state = self.state();
            debug!(id = self.raw.id, attempt, ?state, "Polled queue item");
            if state != TaskState::Queued {
                return Ok(state);
            }
        }
        Ok(TaskState::Queued)
    }

    /// The build this item became, once it has left the queue.
    pub async fn get_build(&self, cancel: &CancellationToken) -> Result<Build> {
        let Some(executable) = &self.raw.executable else {
            return Err(Error::not_found("build for queue item", &self.raw.id.to_string()));
        };
        let mut build = Build::new(self.jenkins.clone(), self.jenkins.path_from_url(&executable.url));
        build.poll(cancel).await?;
        Ok(build)
    }
}

/// Snapshot of the whole queue.
#[derive(Debug, Clone)]
pub struct Queue {
    jenkins: Jenkins,
    raw: QueueResponse,
}

impl Pollable for Queue {
    type Raw = QueueResponse;

    fn jenkins(&self) -> &Jenkins {
        &self.jenkins
    }

    fn base(&self) -> &str {
        QUEUE
    }

    fn set_raw(&mut self, raw: QueueResponse) {
        self.raw = raw;
    }
}

impl Queue {
    pub fn new(jenkins: &Jenkins) -> Self {
        Self {
            jenkins: jenkins.clone(),
            raw: QueueResponse::default(),
        }
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.raw
            .items
            .iter()
            .map(|item| Task::from_raw(&self.jenkins, item.clone()))
            .collect()
    }

    pub fn task_by_id(&self, id: i64) -> Option<Task> {
        self.raw
            .items
            .iter()
            .find(|item| item.id == id)
            .map(|item| Task::from_raw(&self.jenkins, item.clone()))
    }

    pub fn tasks_for_job(&self, name: &str) -> Vec<Task> {
        self.raw
            .items
            .iter()
            .filter(|item| item.task.name == name)
            .map(|item| Task::from_raw(&self.jenkins, item.clone()))
            .collect()
    }

    pub async fn cancel_task(&self, cancel: &CancellationToken, id: i64) -> Result<bool> {
        self.jenkins.cancel_queue_item(cancel, id).await
    }
}

impl Jenkins {
    pub async fn get_queue(&self, cancel: &CancellationToken) -> Result<Queue> {
        let mut queue = Queue::new(self);
        queue.poll(cancel).await?;
        Ok(queue)
    }

    pub async fn get_task(&self, cancel: &CancellationToken, id: i64) -> Result<Task> {
        let mut task = Task::new(self, id);
        task.poll(cancel)
            .await
            .map_err(|e| e.or_not_found("queue item", &id.to_string()))?;
        Ok(task)
    }

    /// Remove a waiting item from the queue.
    pub async fn cancel_queue_item(&self, cancel: &CancellationToken, id: i64) -> Result<bool> {
        let id = id.to_string();
        let response = self
            .requester()
            .post_form(cancel, &format!("{QUEUE}/cancelItem"), &[], &[("id", id.as_str())])
            .await
            .map_err(|e| e.or_not_found("queue item", &id))?;
        Ok(response.is_success() || (300..400).contains(&response.status))
    }

    /// Wait for queue item `id` to start and return its build.
    pub async fn get_build_from_queue_id(
        &self,
        cancel: &CancellationToken,
        id: i64,
        backoff: Duration,
        max_attempts: u32,
    ) -> Result<Build> {
        let mut task = Task::new(self, id);
        match task.wait_for_build(cancel, backoff, max_attempts).await? {
            TaskState::Executable { .. } => task.get_build(cancel).await,
            TaskState::Cancelled => Err(Error::not_found("build for cancelled queue item", &id.to_string())),
            TaskState::Queued => Err(Error::Protocol(format!(
                "queue item {id} still waiting after {max_attempts} polls"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> Queue {
        let jenkins = Jenkins::new("http://localhost:8080").unwrap();
        let mut queue = Queue::new(&jenkins);
        queue.set_raw(
            serde_json::from_str(
                r#"{"items": [
                {"id": 4, "why": "Waiting for next available executor",
                 "task": {"name": "demo", "url": "http://localhost:8080/job/demo/"},
                 "actions": [{"parameters": [{"name": "branch", "value": "main"}]},
                             {"causes": [{"shortDescription": "Started by user admin", "userId": "admin"}]}]},
                {"id": 5, "task": {"name": "other"}, "cancelled": true},
                {"id": 6, "task": {"name": "demo"}, "executable": {"number": 9, "url": "http://localhost:8080/job/demo/9/"}}
            ]}"#,
            )
            .unwrap(),
        );
        queue
    }

    #[test]
    fn test_queue_lookup() {
        let queue = queue();
        assert_eq!(queue.tasks().len(), 3);
        assert_eq!(queue.tasks_for_job("demo").len(), 2);
        assert!(queue.task_by_id(7).is_none());

        let task = queue.task_by_id(4).unwrap();
        assert_eq!(task.base(), "/queue/item/4");
        assert_eq!(task.why(), Some("Waiting for next available executor"));
        assert_eq!(task.parameters()[0].value_string(), "main");
        assert_eq!(task.causes()[0].user_id.as_deref(), Some("admin"));
    }

    #[test]
    fn test_task_state() {
        let queue = queue();
        assert_eq!(queue.task_by_id(4).unwrap().state(), TaskState::Queued);
        assert_eq!(queue.task_by_id(5).unwrap().state(), TaskState::Cancelled);
        assert_eq!(
            queue.task_by_id(6).unwrap().state(),
            TaskState::Executable { number: 9 }
        );
    }

    #[tokio::test]
    async fn test_wait_for_build_honours_cancellation() {
        let jenkins = Jenkins::new("http://localhost:1").unwrap();
        let mut task = Task::new(&jenkins, 4);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = task
            .wait_for_build(&cancel, Duration::from_millis(10), 3)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
