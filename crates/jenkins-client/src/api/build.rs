//! Builds of a job.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::artifact::Artifact;
use super::job::Job;
use super::{Pollable, full_name_from_path};
use crate::client::Jenkins;
use crate::error::{Error, Result};
use crate::types::{Cause, Parameter};

const DEFAULT_DEPTH: u32 = 1;

/// An archived file as listed by its build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildArtifact {
    pub display_path: Option<String>,
    pub file_name: String,
    pub relative_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Culprit {
    pub absolute_url: String,
    pub full_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildBranch {
    #[serde(rename = "SHA1")]
    pub sha1: String,
    pub name: String,
}

/// `lastBuiltRevision` of the git action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildRevision {
    #[serde(rename = "SHA1")]
    pub sha1: String,
    pub branch: Vec<BuildBranch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangeSetItem {
    pub affected_paths: Vec<String>,
    pub author: Option<Culprit>,
    pub comment: String,
    pub commit_id: Option<String>,
    pub msg: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvnRevision {
    pub module: String,
    pub revision: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeSet {
    pub kind: Option<String>,
    pub items: Vec<ChangeSetItem>,
    pub revisions: Vec<SvnRevision>,
}

/// `GET /job/{name}/{n}/api/json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildResponse {
    #[serde(rename = "_class")]
    pub class: String,
    pub actions: Vec<Value>,
    pub artifacts: Vec<BuildArtifact>,
    pub building: bool,
    pub built_on: Option<String>,
    pub change_set: ChangeSet,
    pub culprits: Vec<Culprit>,
    pub description: Option<String>,
    pub display_name: String,
    /// Milliseconds.
    pub duration: i64,
    pub estimated_duration: i64,
    pub executor: Option<Value>,
    pub full_display_name: String,
    pub id: String,
    pub keep_log: bool,
    pub number: i64,
    pub queue_id: i64,
    /// `None` while building.
    pub result: Option<String>,
    /// Start time, epoch milliseconds.
    pub timestamp: i64,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TestCase {
    pub age: i64,
    pub class_name: String,
    /// Seconds.
    pub duration: f64,
    pub error_details: Option<String>,
    pub error_stack_trace: Option<String>,
    pub failed_since: i64,
    pub name: String,
    pub skipped: bool,
    pub skipped_message: Option<String>,
    pub status: String,
    pub stderr: Option<String>,
    pub stdout: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TestSuite {
    pub cases: Vec<TestCase>,
    pub duration: f64,
    pub id: Option<String>,
    pub name: String,
    pub timestamp: Option<String>,
}

/// `GET /job/{name}/{n}/testReport/api/json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TestResult {
    pub duration: f64,
    pub empty: bool,
    pub fail_count: i64,
    pub pass_count: i64,
    pub skip_count: i64,
    pub suites: Vec<TestSuite>,
}

/// One slice of progressive console text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleChunk {
    pub content: String,
    /// Where the next read starts.
    pub offset: u64,
    /// The build is still writing.
    pub has_more: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct InjectedEnvVars {
    env_map: BTreeMap<String, String>,
}

/// A build addressed by `{job path}/{number}`.
#[derive(Debug, Clone)]
pub struct Build {
    jenkins: Jenkins,
    base: String,
    depth: u32,
    raw: BuildResponse,
}

impl Pollable for Build {
    type Raw = BuildResponse;

    fn jenkins(&self) -> &Jenkins {
        &self.jenkins
    }

    fn base(&self) -> &str {
        &self.base
    }

    fn poll_query(&self) -> Vec<(&'static str, String)> {
        vec![("depth", self.depth.to_string())]
    }

    fn set_raw(&mut self, raw: BuildResponse) {
        self.raw = raw;
    }
}

impl Build {
    pub(crate) fn new(jenkins: Jenkins, base: String) -> Self {
        Self {
            jenkins,
            base,
            depth: DEFAULT_DEPTH,
            raw: BuildResponse::default(),
        }
    }

    /// Tree depth used by [`Pollable::poll`] (default 1).
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn info(&self) -> &BuildResponse {
        &self.raw
    }

    pub fn number(&self) -> i64 {
        self.raw.number
    }

    pub fn url(&self) -> &str {
        &self.raw.url
    }

    pub fn result(&self) -> Option<&str> {
        self.raw.result.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.raw.description.as_deref()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(u64::try_from(self.raw.duration).unwrap_or(0))
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.raw.timestamp)
    }

    pub fn culprits(&self) -> &[Culprit] {
        &self.raw.culprits
    }

    pub fn actions(&self) -> &[Value] {
        &self.raw.actions
    }

    /// Full name of the job this build belongs to.
    pub fn job_name(&self) -> String {
        full_name_from_path(parent_build_path(&self.base))
    }

    pub fn artifacts(&self) -> Vec<Artifact> {
        self.raw
            .artifacts
            .iter()
            .map(|a| {
                Artifact::new(
                    self.jenkins.clone(),
                    format!("{}/artifact/{}", self.base, a.relative_path),
                    a.file_name.clone(),
                    self.job_name(),
                    self.raw.number,
                )
            })
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.raw.building
    }

    pub fn is_good(&self) -> bool {
        !self.raw.building && self.raw.result.as_deref() == Some("SUCCESS")
    }

    /// Causes from the first action that lists any.
    pub fn causes(&self) -> Vec<Cause> {
        scan_actions(&self.raw.actions, "causes")
    }

    /// Parameters from the first action that lists any.
    pub fn parameters(&self) -> Vec<Parameter> {
        scan_actions(&self.raw.actions, "parameters")
    }

    fn upstream_cause(&self) -> Option<Cause> {
        self.causes()
            .into_iter()
            .find(|c| c.upstream_project.is_some())
    }

    /// The job whose build triggered this one, if any.
    pub async fn get_upstream_job(&self, cancel: &CancellationToken) -> Result<Option<Job>> {
        match self.upstream_cause().and_then(|c| c.upstream_project) {
            Some(project) => Ok(Some(self.jenkins.get_job(cancel, &project).await?)),
            None => Ok(None),
        }
    }

    pub async fn get_upstream_build(&self, cancel: &CancellationToken) -> Result<Option<Build>> {
        let Some(cause) = self.upstream_cause() else {
            return Ok(None);
        };
        match (cause.upstream_project, cause.upstream_build) {
            (Some(project), Some(number)) => Ok(Some(
                self.jenkins.get_build(cancel, &project, number).await?,
            )),
            _ => Ok(None),
        }
    }

    /// Revision this build checked out: git SHA1, Mercurial revision or
    /// Subversion revision number.
    pub fn revision(&self) -> Option<String> {
        match self.raw.change_set.kind.as_deref() {
            Some("git") | Some("hg") => self.raw.actions.iter().find_map(|action| {
                let sha = action
                    .pointer("/lastBuiltRevision/SHA1")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty());
                let hg = action
                    .get("mercurialRevisionNumber")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty());
                sha.or(hg).map(str::to_string)
            }),
            Some("svn") => self
                .raw
                .change_set
                .revisions
                .first()
                .map(|r| r.revision.to_string()),
            _ => None,
        }
    }

    /// Branch of the git revision this build checked out.
    pub fn revision_branch(&self) -> Option<BuildBranch> {
        if self.raw.change_set.kind.as_deref() != Some("git") {
            return None;
        }
        self.raw.actions.iter().find_map(|action| {
            let revision: BuildRevision =
                serde_json::from_value(action.get("lastBuiltRevision")?.clone()).ok()?;
            revision.branch.into_iter().find(|b| !b.sha1.is_empty())
        })
    }

    /// Test report, or `None` when the build published none.
    pub async fn test_result(&self, cancel: &CancellationToken) -> Result<Option<TestResult>> {
        match self
            .jenkins
            .requester()
            .get_json::<TestResult>(cancel, &format!("{}/testReport", self.base), &[])
            .await
        {
            Ok(response) => Ok(Some(response.body)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn console_output(&self, cancel: &CancellationToken) -> Result<String> {
        let response = self
            .jenkins
            .requester()
            .get_text(cancel, &format!("{}/consoleText", self.base), &[])
            .await
            .map_err(|e| e.or_not_found("build", &self.base))?;
        Ok(response.body)
    }

    /// Console text from byte `offset` on.
    ///
    /// `has_more` is true only when the server says `X-More-Data: true`.
    pub async fn console_output_from(
        &self,
        cancel: &CancellationToken,
        offset: u64,
    ) -> Result<ConsoleChunk> {
        let start = offset.to_string();
        let response = self
            .jenkins
            .requester()
            .get_text(
                cancel,
                &format!("{}/logText/progressiveText", self.base),
                &[("start", start.as_str())],
            )
            .await
            .map_err(|e| e.or_not_found("build", &self.base))?;

        let next = response
            .header("X-Text-Size")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(offset + response.body.len() as u64);
        let has_more = response
            .header("X-More-Data")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
        debug!(build = %self.base, offset, next, has_more, "Read console chunk");
        Ok(ConsoleChunk {
            content: response.body,
            offset: next,
            has_more,
        })
    }

    /// Variables recorded by the EnvInject plugin.
    pub async fn injected_env_vars(
        &self,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, String>> {
        let response = self
            .jenkins
            .requester()
            .get_json::<InjectedEnvVars>(cancel, &format!("{}/injectedEnvVars", self.base), &[])
            .await?;
        Ok(response.body.env_map)
    }

    pub async fn set_description(&self, cancel: &CancellationToken, description: &str) -> Result<bool> {
        let response = self
            .jenkins
            .requester()
            .post_form(
                cancel,
                &format!("{}/submitDescription", self.base),
                &[("description", description)],
                &[],
            )
            .await
            .map_err(|e| e.or_not_found("build", &self.base))?;
        Ok(response.is_success())
    }

    /// Abort the build. A build that already finished counts as stopped.
    pub async fn stop(&self, cancel: &CancellationToken) -> Result<bool> {
        if !self.is_running() {
            return Ok(true);
        }
        self.jenkins
            .post_action(cancel, &format!("{}/stop", self.base))
            .await
            .map_err(|e| e.or_not_found("build", &self.base))
    }
}

/// Decode `key` of the first action carrying it.
fn scan_actions<T: DeserializeOwned>(actions: &[Value], key: &str) -> Vec<T> {
    actions
        .iter()
        .find_map(|action| action.get(key).and_then(Value::as_array))
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// `/job/a/job/b/3` → `/job/a/job/b`.
fn parent_build_path(base: &str) -> &str {
    match base.rsplit_once('/') {
        Some((job, _)) => job,
        None => base,
    }
}
