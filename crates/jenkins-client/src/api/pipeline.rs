//! Pipeline runs through the Workflow REST API (`wfapi`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::segment;
use crate::client::Jenkins;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Link {
    pub href: String,
}

/// A stage, or a step inside one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineStage {
    pub id: String,
    pub name: String,
    pub exec_node: String,
    pub status: String,
    pub start_time_millis: i64,
    pub duration_millis: i64,
    pub pause_duration_millis: i64,
    pub parameter_description: Option<String>,
    #[serde(rename = "_links")]
    pub links: BTreeMap<String, Link>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RunDescription {
    id: String,
    name: String,
    status: String,
    start_time_millis: i64,
    end_time_millis: i64,
    duration_millis: i64,
    stages: Vec<PipelineStage>,
    #[serde(rename = "_links")]
    links: BTreeMap<String, Link>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct NodeDescription {
    id: String,
    name: String,
    status: String,
    start_time_millis: i64,
    duration_millis: i64,
    stage_flow_nodes: Vec<PipelineStage>,
}

/// An archived file as listed by `wfapi/artifacts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineArtifact {
    pub id: String,
    pub name: String,
    pub path: String,
    pub url: String,
    pub size: i64,
}

/// Log of one flow node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineNodeLog {
    pub node_id: String,
    pub node_status: String,
    pub length: i64,
    pub has_more: bool,
    pub text: String,
    pub console_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct InputDescription {
    id: String,
    message: String,
    proceed_text: String,
    proceed_url: String,
    abort_url: String,
    inputs: Vec<Value>,
}

/// One run of a pipeline job.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    jenkins: Jenkins,
    base: String,
    raw: RunDescription,
}

impl PipelineRun {
    /// Decode a run description. Its `_links.self` names the run; failing
    /// that, the run id is appended to `job_base`.
    pub(crate) fn from_value(jenkins: Jenkins, job_base: &str, value: Value) -> Result<Self> {
        let raw: RunDescription = serde_json::from_value(value)?;
        let base = match raw.links.get("self") {
            Some(link) if !link.href.is_empty() => {
                let path = jenkins.path_from_url(&link.href);
                path.strip_suffix("/wfapi/describe")
                    .unwrap_or(&path)
                    .to_string()
            }
            _ => format!("{}/{}", job_base, segment(&raw.id)),
        };
        Ok(Self { jenkins, base, raw })
    }

    pub fn id(&self) -> &str {
        &self.raw.id
    }

    pub fn name(&self) -> &str {
        &self.raw.name
    }

    pub fn status(&self) -> &str {
        &self.raw.status
    }

    pub fn start_time_millis(&self) -> i64 {
        self.raw.start_time_millis
    }

    pub fn end_time_millis(&self) -> i64 {
        self.raw.end_time_millis
    }

    pub fn duration_millis(&self) -> i64 {
        self.raw.duration_millis
    }

    pub fn stages(&self) -> &[PipelineStage] {
        &self.raw.stages
    }

    /// Build path of this run, e.g. `/job/demo/42`.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub async fn pending_input_actions(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<PipelineInputAction>> {
        let response = self
            .jenkins
            .requester()
            .get_json::<Option<Vec<InputDescription>>>(
                cancel,
                &format!("{}/wfapi/pendingInputActions", self.base),
                &[],
            )
            .await?;
        Ok(response
            .body
            .unwrap_or_default()
            .into_iter()
            .map(|raw| PipelineInputAction {
                jenkins: self.jenkins.clone(),
                run_base: self.base.clone(),
                raw,
            })
            .collect())
    }

    pub async fn artifacts(&self, cancel: &CancellationToken) -> Result<Vec<PipelineArtifact>> {
        let response = self
            .jenkins
            .requester()
            .get_json::<Option<Vec<PipelineArtifact>>>(
                cancel,
                &format!("{}/wfapi/artifacts", self.base),
                &[],
            )
            .await?;
        Ok(response.body.unwrap_or_default())
    }

    /// Describe flow node `id` (a stage or step).
    pub async fn node(&self, cancel: &CancellationToken, id: &str) -> Result<PipelineNode> {
        let response = self
            .jenkins
            .requester()
            .get_json::<NodeDescription>(
                cancel,
                &format!("{}/execution/node/{}/wfapi/describe", self.base, segment(id)),
                &[],
            )
            .await
            .map_err(|e| e.or_not_found("pipeline node", id))?;
        Ok(PipelineNode {
            jenkins: self.jenkins.clone(),
            run_base: self.base.clone(),
            raw: response.body,
        })
    }
}

/// A flow node of a run.
#[derive(Debug, Clone)]
pub struct PipelineNode {
    jenkins: Jenkins,
    run_base: String,
    raw: NodeDescription,
}

impl PipelineNode {
    pub fn id(&self) -> &str {
        &self.raw.id
    }

    pub fn name(&self) -> &str {
        &self.raw.name
    }

    pub fn status(&self) -> &str {
        &self.raw.status
    }

    pub fn start_time_millis(&self) -> i64 {
        self.raw.start_time_millis
    }

    pub fn duration_millis(&self) -> i64 {
        self.raw.duration_millis
    }

    /// Steps inside a stage.
    pub fn steps(&self) -> &[PipelineStage] {
        &self.raw.stage_flow_nodes
    }

    pub async fn log(&self, cancel: &CancellationToken) -> Result<PipelineNodeLog> {
        let response = self
            .jenkins
            .requester()
            .get_json::<PipelineNodeLog>(
                cancel,
                &format!(
                    "{}/execution/node/{}/wfapi/log",
                    self.run_base,
                    segment(&self.raw.id)
                ),
                &[],
            )
            .await?;
        Ok(response.body)
    }
}

/// A paused `input` step waiting for an answer.
#[derive(Debug, Clone)]
pub struct PipelineInputAction {
    jenkins: Jenkins,
    run_base: String,
    raw: InputDescription,
}

impl PipelineInputAction {
    pub fn id(&self) -> &str {
        &self.raw.id
    }

    pub fn message(&self) -> &str {
        &self.raw.message
    }

    pub fn proceed_text(&self) -> &str {
        &self.raw.proceed_text
    }

    pub fn proceed_url(&self) -> &str {
        &self.raw.proceed_url
    }

    pub fn abort_url(&self) -> &str {
        &self.raw.abort_url
    }

    /// Parameter definitions the input asks for.
    pub fn inputs(&self) -> &[Value] {
        &self.raw.inputs
    }

    fn input_path(&self, action: &str) -> String {
        format!("{}/input/{}/{}", self.run_base, segment(&self.raw.id), action)
    }

    /// Continue without parameters.
    pub async fn proceed(&self, cancel: &CancellationToken) -> Result<bool> {
        self.jenkins
            .post_action(cancel, &self.input_path("proceedEmpty"))
            .await
    }

    pub async fn abort(&self, cancel: &CancellationToken) -> Result<bool> {
        self.jenkins
            .post_action(cancel, &self.input_path("abort"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jenkins() -> Jenkins {
        Jenkins::new("http://localhost:8080/jenkins").unwrap()
    }

    #[test]
    fn test_run_base_from_self_link() {
        let run = PipelineRun::from_value(
            jenkins(),
            "/job/demo",
            serde_json::json!({
                "id": "42", "name": "#42", "status": "SUCCESS", "durationMillis": 12345,
                "_links": {"self": {"href": "/jenkins/job/demo/42/wfapi/describe"}},
                "stages": [
                    {"id": "6", "name": "Build", "status": "SUCCESS",
                     "_links": {"self": {"href": "/jenkins/job/demo/42/execution/node/6/wfapi/describe"}}},
                    {"id": "11", "name": "Test", "status": "SUCCESS"}
                ]
            }),
        )
        .unwrap();
        assert_eq!(run.base(), "/job/demo/42");
        assert_eq!(run.id(), "42");
        assert_eq!(run.duration_millis(), 12345);
        assert_eq!(run.stages().len(), 2);
        assert_eq!(run.stages()[0].links["self"].href, "/jenkins/job/demo/42/execution/node/6/wfapi/describe");
    }

    #[test]
    fn test_run_base_without_links() {
        let run = PipelineRun::from_value(jenkins(), "/job/demo", serde_json::json!({"id": "7"})).unwrap();
        assert_eq!(run.base(), "/job/demo/7");
    }

    #[test]
    fn test_input_paths() {
        let action = PipelineInputAction {
            jenkins: jenkins(),
            run_base: "/job/demo/42".into(),
            raw: serde_json::from_str(
                r#"{"id": "Approve", "message": "Deploy?", "proceedText": "Yes",
                    "abortUrl": "/jenkins/job/demo/42/input/Approve/abort"}"#,
            )
            .unwrap(),
        };
        assert_eq!(action.message(), "Deploy?");
        assert_eq!(action.input_path("proceedEmpty"), "/job/demo/42/input/Approve/proceedEmpty");
    }
}
