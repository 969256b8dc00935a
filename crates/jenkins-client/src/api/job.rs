//! Jobs and folders.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::build::Build;
use super::pipeline::PipelineRun;
use super::{Pollable, job_path, nested_job_path, parent_path, segment};
use crate::client::Jenkins;
use crate::error::{Error, Result};
use crate::requester::ApiResponse;
use crate::types::{BuildRef, JobRef};

const FOLDER_CLASS: &str = "com.cloudbees.hudson.plugins.folder.Folder";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthReport {
    pub description: String,
    pub icon_class_name: String,
    pub score: i64,
}

/// Default value of a parameter definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultParameterValue {
    pub name: String,
    pub value: Value,
}

/// A build parameter the job declares.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParameterDefinition {
    pub default_parameter_value: Option<DefaultParameterValue>,
    pub description: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobProperty {
    pub parameter_definitions: Vec<ParameterDefinition>,
}

/// `GET /job/{name}/api/json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JobResponse {
    #[serde(rename = "_class")]
    pub class: String,
    pub actions: Vec<Value>,
    pub buildable: bool,
    pub builds: Vec<BuildRef>,
    pub color: String,
    pub concurrent_build: bool,
    pub description: Option<String>,
    pub display_name: String,
    pub downstream_projects: Vec<JobRef>,
    pub first_build: Option<BuildRef>,
    pub full_name: String,
    pub health_report: Vec<HealthReport>,
    pub in_queue: bool,
    pub keep_dependencies: bool,
    pub last_build: Option<BuildRef>,
    pub last_completed_build: Option<BuildRef>,
    pub last_failed_build: Option<BuildRef>,
    pub last_stable_build: Option<BuildRef>,
    pub last_successful_build: Option<BuildRef>,
    pub last_unstable_build: Option<BuildRef>,
    pub last_unsuccessful_build: Option<BuildRef>,
    pub name: String,
    pub next_build_number: i64,
    pub property: Vec<JobProperty>,
    pub queue_item: Option<Value>,
    pub upstream_projects: Vec<JobRef>,
    pub url: String,
    /// Children, when the job is a folder.
    pub jobs: Vec<JobRef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AllBuilds {
    all_builds: Vec<BuildRef>,
}

/// Options for [`Job::invoke`].
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    pub params: Vec<(String, String)>,
    /// Uploaded as file parameters; forces the `/build` endpoint.
    pub files: Vec<PathBuf>,
    /// Do not trigger while a build is running.
    pub skip_if_running: bool,
    pub cause: Option<String>,
    /// Remote trigger token configured on the job.
    pub security_token: Option<String>,
}

/// A job (or folder) addressed by its path.
#[derive(Debug, Clone)]
pub struct Job {
    jenkins: Jenkins,
    base: String,
    raw: JobResponse,
}

impl Pollable for Job {
    type Raw = JobResponse;

    fn jenkins(&self) -> &Jenkins {
        &self.jenkins
    }

    fn base(&self) -> &str {
        &self.base
    }

    fn set_raw(&mut self, raw: JobResponse) {
        self.raw = raw;
    }
}

impl Job {
    pub(crate) fn new(jenkins: Jenkins, base: String) -> Self {
        Self {
            jenkins,
            base,
            raw: JobResponse::default(),
        }
    }

    /// Job at `full_name` (`team/app/demo`), not yet polled.
    pub fn at(jenkins: &Jenkins, full_name: &str) -> Self {
        Self::new(jenkins.clone(), job_path(full_name))
    }

    pub fn name(&self) -> &str {
        &self.raw.name
    }

    /// Name including enclosing folders.
    pub fn full_name(&self) -> &str {
        &self.raw.full_name
    }

    pub fn description(&self) -> &str {
        self.raw.description.as_deref().unwrap_or_default()
    }

    pub fn url(&self) -> &str {
        &self.raw.url
    }

    pub fn details(&self) -> &JobResponse {
        &self.raw
    }

    pub fn is_folder(&self) -> bool {
        self.raw.class == FOLDER_CLASS
    }

    pub fn is_enabled(&self) -> bool {
        self.raw.color != "disabled"
    }

    pub fn is_queued(&self) -> bool {
        self.raw.in_queue
    }

    /// The ball colour animates while a build runs.
    pub fn is_running(&self) -> bool {
        self.raw.color.ends_with("_anime")
    }

    pub fn has_queued_build(&self) -> bool {
        self.raw.queue_item.as_ref().is_some_and(|item| !item.is_null())
    }

    pub fn parameters(&self) -> Vec<&ParameterDefinition> {
        self.raw
            .property
            .iter()
            .flat_map(|p| p.parameter_definitions.iter())
            .collect()
    }

    /// Children of a folder.
    pub fn inner_jobs(&self) -> &[JobRef] {
        &self.raw.jobs
    }

    pub fn upstream_jobs_metadata(&self) -> &[JobRef] {
        &self.raw.upstream_projects
    }

    pub fn downstream_jobs_metadata(&self) -> &[JobRef] {
        &self.raw.downstream_projects
    }

    pub async fn get_upstream_jobs(&self, cancel: &CancellationToken) -> Result<Vec<Job>> {
        self.load_refs(cancel, &self.raw.upstream_projects).await
    }

    pub async fn get_downstream_jobs(&self, cancel: &CancellationToken) -> Result<Vec<Job>> {
        self.load_refs(cancel, &self.raw.downstream_projects).await
    }

    /// Folder children, polled.
    pub async fn get_inner_jobs(&self, cancel: &CancellationToken) -> Result<Vec<Job>> {
        self.load_refs(cancel, &self.raw.jobs).await
    }

    async fn load_refs(&self, cancel: &CancellationToken, refs: &[JobRef]) -> Result<Vec<Job>> {
        let mut jobs = Vec::with_capacity(refs.len());
        for job_ref in refs {
            let path = self.jenkins.path_from_url(&job_ref.url);
            let mut job = Job::new(self.jenkins.clone(), path);
            job.poll(cancel)
                .await
                .map_err(|e| e.or_not_found("job", &job_ref.name))?;
            jobs.push(job);
        }
        Ok(jobs)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builds
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_build(&self, cancel: &CancellationToken, number: i64) -> Result<Build> {
        let mut build = Build::new(self.jenkins.clone(), format!("{}/{}", self.base, number));
        build
            .poll(cancel)
            .await
            .map_err(|e| e.or_not_found("build", &format!("{}#{}", self.display(), number)))?;
        Ok(build)
    }

    async fn build_of(
        &self,
        cancel: &CancellationToken,
        which: &str,
        build: Option<&BuildRef>,
    ) -> Result<Build> {
        match build {
            Some(build) => self.get_build(cancel, build.number).await,
            None => Err(Error::not_found(which, self.display())),
        }
    }

    pub async fn get_first_build(&self, cancel: &CancellationToken) -> Result<Build> {
        self.build_of(cancel, "first build of", self.raw.first_build.as_ref())
            .await
    }

    pub async fn get_last_build(&self, cancel: &CancellationToken) -> Result<Build> {
        self.build_of(cancel, "last build of", self.raw.last_build.as_ref())
            .await
    }

    pub async fn get_last_stable_build(&self, cancel: &CancellationToken) -> Result<Build> {
        self.build_of(cancel, "stable build of", self.raw.last_stable_build.as_ref())
            .await
    }

    pub async fn get_last_successful_build(&self, cancel: &CancellationToken) -> Result<Build> {
        self.build_of(
            cancel,
            "successful build of",
            self.raw.last_successful_build.as_ref(),
        )
        .await
    }

    pub async fn get_last_failed_build(&self, cancel: &CancellationToken) -> Result<Build> {
        self.build_of(cancel, "failed build of", self.raw.last_failed_build.as_ref())
            .await
    }

    pub async fn get_last_completed_build(&self, cancel: &CancellationToken) -> Result<Build> {
        self.build_of(
            cancel,
            "completed build of",
            self.raw.last_completed_build.as_ref(),
        )
        .await
    }

    /// Every build number the server still keeps, newest first.
    pub async fn get_all_build_ids(&self, cancel: &CancellationToken) -> Result<Vec<BuildRef>> {
        let response = self
            .jenkins
            .requester()
            .get_json::<AllBuilds>(cancel, &self.base, &[("tree", "allBuilds[number,url]")])
            .await?;
        Ok(response.body.all_builds)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutators
    // ─────────────────────────────────────────────────────────────────────────

    async fn action(&self, cancel: &CancellationToken, action: &str) -> Result<bool> {
        self.jenkins
            .post_action(cancel, &format!("{}/{}", self.base, action))
            .await
            .map_err(|e| e.or_not_found("job", self.display()))
    }

    pub async fn enable(&self, cancel: &CancellationToken) -> Result<bool> {
        self.action(cancel, "enable").await
    }

    pub async fn disable(&self, cancel: &CancellationToken) -> Result<bool> {
        self.action(cancel, "disable").await
    }

    pub async fn delete(&self, cancel: &CancellationToken) -> Result<bool> {
        self.action(cancel, "doDelete").await
    }

    /// Rename in place. The job keeps its folder; its base path follows
    /// the new name.
    pub async fn rename(&mut self, cancel: &CancellationToken, new_name: &str) -> Result<bool> {
        let response = self
            .jenkins
            .requester()
            .post_form(
                cancel,
                &format!("{}/doRename", self.base),
                &[("newName", new_name)],
                &[],
            )
            .await
            .map_err(|e| e.or_not_found("job", self.display()))?;
        self.base = format!("{}/job/{}", parent_path(&self.base), segment(new_name));
        Ok(response.is_success())
    }

    /// Copy this job to `new_name` in the same folder.
    pub async fn copy(&self, cancel: &CancellationToken, new_name: &str) -> Result<Job> {
        let from = if self.raw.full_name.is_empty() {
            self.raw.name.as_str()
        } else {
            self.raw.full_name.as_str()
        };
        let parent = parent_path(&self.base);
        self.jenkins
            .requester()
            .post_form(
                cancel,
                &format!("{parent}/createItem"),
                &[],
                &[("name", new_name), ("mode", "copy"), ("from", from)],
            )
            .await
            .map_err(|e| e.or_not_found("job", from))?;

        let mut job = Job::new(
            self.jenkins.clone(),
            format!("{parent}/job/{}", segment(new_name)),
        );
        job.poll(cancel).await?;
        Ok(job)
    }

    /// Create this job from `config_xml`, inside its parent folder.
    pub async fn create(&mut self, cancel: &CancellationToken, config_xml: &str) -> Result<u16> {
        let name = match self.base.rsplit_once("/job/") {
            Some((_, name)) => urlencoding::decode(name)
                .map_err(|_| Error::Config(format!("bad job path '{}'", self.base)))?
                .into_owned(),
            None => return Err(Error::Config(format!("bad job path '{}'", self.base))),
        };
        let parent = parent_path(&self.base);
        self.jenkins
            .requester()
            .post_xml(
                cancel,
                &format!("{parent}/createItem"),
                config_xml,
                &[("name", name.as_str())],
            )
            .await?;
        self.poll(cancel).await
    }

    pub async fn get_config(&self, cancel: &CancellationToken) -> Result<String> {
        let response = self
            .jenkins
            .requester()
            .get_xml::<String>(cancel, &format!("{}/config.xml", self.base), &[])
            .await
            .map_err(|e| e.or_not_found("job", self.display()))?;
        Ok(response.body)
    }

    pub async fn update_config(&self, cancel: &CancellationToken, config_xml: &str) -> Result<bool> {
        let response = self
            .jenkins
            .requester()
            .post_xml(cancel, &format!("{}/config.xml", self.base), config_xml, &[])
            .await
            .map_err(|e| e.or_not_found("job", self.display()))?;
        Ok(response.is_success())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Triggering
    // ─────────────────────────────────────────────────────────────────────────

    /// Trigger a build and return its queue id.
    ///
    /// Uses `buildWithParameters` when parameters are given or the job
    /// declares any (poll first for the latter).
    pub async fn invoke_simple(
        &self,
        cancel: &CancellationToken,
        params: &[(&str, &str)],
    ) -> Result<i64> {
        let endpoint = if params.is_empty() && self.parameters().is_empty() {
            format!("{}/build", self.base)
        } else {
            format!("{}/buildWithParameters", self.base)
        };
        let response = self
            .jenkins
            .requester()
            .post_form(cancel, &endpoint, params, &[])
            .await
            .map_err(|e| e.or_not_found("job", self.display()))?;
        queue_id(&response)
    }

    /// Trigger a build with the full set of options.
    ///
    /// Refreshes the snapshot first. Returns `None` without triggering when
    /// the job is already queued, or running with `skip_if_running` set.
    pub async fn invoke(
        &mut self,
        cancel: &CancellationToken,
        options: &InvokeOptions,
    ) -> Result<Option<i64>> {
        self.poll(cancel)
            .await
            .map_err(|e| e.or_not_found("job", self.display()))?;
        if self.is_queued() {
            warn!(job = %self.display(), "Job is already queued, not triggering");
            return Ok(None);
        }
        if self.is_running() && options.skip_if_running {
            warn!(job = %self.display(), "Job is running, not triggering");
            return Ok(None);
        }

        let mut query = Vec::new();
        if let Some(token) = &options.security_token {
            query.push(("token", token.as_str()));
        }
        if let Some(cause) = &options.cause {
            query.push(("cause", cause.as_str()));
        }

        let requester = self.jenkins.requester();
        let response = if !options.files.is_empty() {
            let json = parameter_json(&options.params);
            requester
                .post_files(
                    cancel,
                    &format!("{}/build", self.base),
                    &[("json", json.as_str())],
                    &query,
                    &options.files,
                )
                .await
        } else if !options.params.is_empty() {
            let form: Vec<(&str, &str)> = options
                .params
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            requester
                .post_form(
                    cancel,
                    &format!("{}/buildWithParameters", self.base),
                    &form,
                    &query,
                )
                .await
        } else {
            let json = parameter_json(&[]);
            requester
                .post_form(
                    cancel,
                    &format!("{}/build", self.base),
                    &[("json", json.as_str())],
                    &query,
                )
                .await
        }
        .map_err(|e| e.or_not_found("job", self.display()))?;

        queue_id(&response).map(Some)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline runs
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_pipeline_runs(&self, cancel: &CancellationToken) -> Result<Vec<PipelineRun>> {
        let response = self
            .jenkins
            .requester()
            .get_json::<Option<Vec<Value>>>(cancel, &format!("{}/wfapi/runs", self.base), &[])
            .await
            .map_err(|e| e.or_not_found("job", self.display()))?;
        response
            .body
            .unwrap_or_default()
            .into_iter()
            .map(|value| PipelineRun::from_value(self.jenkins.clone(), &self.base, value))
            .collect()
    }

    pub async fn get_pipeline_run(&self, cancel: &CancellationToken, id: &str) -> Result<PipelineRun> {
        let response = self
            .jenkins
            .requester()
            .get_json::<Value>(
                cancel,
                &format!("{}/{}/wfapi/describe", self.base, segment(id)),
                &[],
            )
            .await
            .map_err(|e| e.or_not_found("pipeline run", id))?;
        PipelineRun::from_value(self.jenkins.clone(), &self.base, response.body)
    }

    fn display(&self) -> &str {
        if !self.raw.full_name.is_empty() {
            &self.raw.full_name
        } else if !self.raw.name.is_empty() {
            &self.raw.name
        } else {
            &self.base
        }
    }
}

/// `{"parameter": [{"name": ..., "value": ...}]}` as the `json` form field.
fn parameter_json(params: &[(String, String)]) -> String {
    let parameter: Vec<Value> = params
        .iter()
        .map(|(name, value)| json!({ "name": name, "value": value }))
        .collect();
    json!({ "parameter": parameter }).to_string()
}

/// Queue id from the `Location` of a build trigger.
fn queue_id<T>(response: &ApiResponse<T>) -> Result<i64> {
    let location = response.location().ok_or_else(|| {
        Error::Protocol(format!(
            "build trigger answered {} without a Location header",
            response.status
        ))
    })?;
    parse_queue_location(location).ok_or_else(|| {
        Error::Protocol(format!("unexpected build trigger Location '{location}'"))
    })
}

fn parse_queue_location(location: &str) -> Option<i64> {
    let (_, rest) = location.split_once("/queue/item/")?;
    rest.trim_end_matches('/').parse().ok()
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection shortcuts
// ─────────────────────────────────────────────────────────────────────────────

impl Jenkins {
    /// Fetch a job by full name (`team/app/demo`).
    pub async fn get_job(&self, cancel: &CancellationToken, full_name: &str) -> Result<Job> {
        let mut job = Job::at(self, full_name);
        job.poll(cancel)
            .await
            .map_err(|e| e.or_not_found("job", full_name))?;
        Ok(job)
    }

    /// Fetch a job inside nested folders, outermost first.
    pub async fn get_job_in_folder(
        &self,
        cancel: &CancellationToken,
        name: &str,
        parents: &[&str],
    ) -> Result<Job> {
        let mut job = Job::new(self.clone(), nested_job_path(parents, name));
        job.poll(cancel)
            .await
            .map_err(|e| e.or_not_found("job", name))?;
        Ok(job)
    }

    /// Create a top-level job from its `config.xml`.
    pub async fn create_job(
        &self,
        cancel: &CancellationToken,
        name: &str,
        config_xml: &str,
    ) -> Result<Job> {
        self.create_job_in_folder(cancel, name, config_xml, &[]).await
    }

    /// Create a job inside nested folders, outermost first.
    pub async fn create_job_in_folder(
        &self,
        cancel: &CancellationToken,
        name: &str,
        config_xml: &str,
        parents: &[&str],
    ) -> Result<Job> {
        let mut job = Job::new(self.clone(), nested_job_path(parents, name));
        job.create(cancel, config_xml).await?;
        debug!(job = name, "Created job");
        Ok(job)
    }

    /// Create a folder, optionally inside other folders.
    pub async fn create_folder(
        &self,
        cancel: &CancellationToken,
        name: &str,
        parents: &[&str],
    ) -> Result<Job> {
        let parent = nested_job_path(parents, "");
        let parent = parent.trim_end_matches("/job/");
        let json = json!({
            "name": name,
            "mode": FOLDER_CLASS,
            "from": "",
            "Submit": "OK",
        })
        .to_string();
        self.requester()
            .post_form(
                cancel,
                &format!("{parent}/createItem"),
                &[
                    ("name", name),
                    ("mode", FOLDER_CLASS),
                    ("from", ""),
                    ("Submit", "OK"),
                    ("json", json.as_str()),
                ],
                &[("name", name)],
            )
            .await?;
        self.get_folder(cancel, name, parents).await
    }

    /// Fetch a folder, checking that the item really is one.
    pub async fn get_folder(
        &self,
        cancel: &CancellationToken,
        name: &str,
        parents: &[&str],
    ) -> Result<Job> {
        let folder = self.get_job_in_folder(cancel, name, parents).await?;
        if !folder.is_folder() {
            return Err(Error::not_found("folder", name));
        }
        Ok(folder)
    }

    pub async fn rename_job(
        &self,
        cancel: &CancellationToken,
        full_name: &str,
        new_name: &str,
    ) -> Result<Job> {
        let mut job = Job::at(self, full_name);
        job.rename(cancel, new_name).await?;
        job.poll(cancel).await?;
        Ok(job)
    }

    pub async fn copy_job(
        &self,
        cancel: &CancellationToken,
        from: &str,
        new_name: &str,
    ) -> Result<Job> {
        let job = self.get_job(cancel, from).await?;
        job.copy(cancel, new_name).await
    }

    pub async fn delete_job(&self, cancel: &CancellationToken, full_name: &str) -> Result<bool> {
        Job::at(self, full_name).delete(cancel).await
    }

    /// Trigger a build of `full_name`, returning its queue id.
    pub async fn build_job(
        &self,
        cancel: &CancellationToken,
        full_name: &str,
        params: &[(&str, &str)],
    ) -> Result<i64> {
        let job = self.get_job(cancel, full_name).await?;
        job.invoke_simple(cancel, params).await
    }

    /// Top-level jobs, each polled.
    pub async fn get_all_jobs(&self, cancel: &CancellationToken) -> Result<Vec<Job>> {
        self.poll(cancel).await?;
        let refs = self.info().jobs;
        let mut jobs = Vec::with_capacity(refs.len());
        for job_ref in &refs {
            let mut job = Job::new(self.clone(), self.path_from_url(&job_ref.url));
            job.poll(cancel)
                .await
                .map_err(|e| e.or_not_found("job", &job_ref.name))?;
            jobs.push(job);
        }
        Ok(jobs)
    }

    /// Build `number` of `job` (full name).
    pub async fn get_build(
        &self,
        cancel: &CancellationToken,
        job: &str,
        number: i64,
    ) -> Result<Build> {
        Job::at(self, job).get_build(cancel, number).await
    }

    /// Every build of `job`, each polled.
    pub async fn get_all_builds(&self, cancel: &CancellationToken, job: &str) -> Result<Vec<Build>> {
        let job = Job::at(self, job);
        let ids = job.get_all_build_ids(cancel).await?;
        let mut builds = Vec::with_capacity(ids.len());
        for build in ids {
            builds.push(job.get_build(cancel, build.number).await?);
        }
        Ok(builds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(raw: &str) -> Job {
        let jenkins = Jenkins::new("http://localhost:8080").unwrap();
        let mut job = Job::at(&jenkins, "demo");
        job.set_raw(serde_json::from_str(raw).unwrap());
        job
    }

    #[test]
    fn test_accessors_read_snapshot() {
        let job = job(r#"{
            "_class": "hudson.model.FreeStyleProject",
            "name": "demo",
            "fullName": "team/demo",
            "description": null,
            "color": "blue_anime",
            "inQueue": false,
            "queueItem": null,
            "lastBuild": {"number": 7, "url": "http://localhost:8080/job/demo/7/"},
            "property": [
                {"_class": "hudson.model.ParametersDefinitionProperty",
                 "parameterDefinitions": [
                    {"name": "branch", "type": "StringParameterDefinition",
                     "defaultParameterValue": {"name": "branch", "value": "main"}}
                 ]},
                {}
            ]
        }"#);
        assert_eq!(job.name(), "demo");
        assert_eq!(job.full_name(), "team/demo");
        assert_eq!(job.description(), "");
        assert!(job.is_enabled());
        assert!(job.is_running());
        assert!(!job.has_queued_build());
        assert!(!job.is_folder());
        assert_eq!(job.details().last_build.as_ref().unwrap().number, 7);
        let params = job.parameters();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].kind, "StringParameterDefinition");
        assert_eq!(params[0].default_parameter_value.as_ref().unwrap().value, "main");
    }

    #[test]
    fn test_disabled_folder() {
        let job = job(r#"{
            "_class": "com.cloudbees.hudson.plugins.folder.Folder",
            "name": "team",
            "color": "disabled",
            "jobs": [{"name": "demo", "url": "http://localhost:8080/job/team/job/demo/"}]
        }"#);
        assert!(job.is_folder());
        assert!(!job.is_enabled());
        assert!(!job.is_running());
        assert_eq!(job.inner_jobs()[0].name, "demo");
    }

    #[test]
    fn test_parse_queue_location() {
        assert_eq!(parse_queue_location("http://host/queue/item/17/"), Some(17));
        assert_eq!(parse_queue_location("/jenkins/queue/item/4"), Some(4));
        assert_eq!(parse_queue_location("http://host/job/demo/"), None);
        assert_eq!(parse_queue_location("http://host/queue/item/x/"), None);
    }

    #[test]
    fn test_parameter_json() {
        let json = parameter_json(&[("branch".into(), "main".into())]);
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["parameter"][0]["name"], "branch");
        assert_eq!(value["parameter"][0]["value"], "main");
        assert_eq!(parameter_json(&[]), r#"{"parameter":[]}"#);
    }

    #[test]
    fn test_nested_base_path() {
        let jenkins = Jenkins::new("http://localhost:8080").unwrap();
        let job = Job::at(&jenkins, "team/app/demo");
        assert_eq!(job.base(), "/job/team/job/app/job/demo");
        assert_eq!(job.display(), "/job/team/job/app/job/demo");
    }
}
