//! Entities of the Jenkins object model.
//!
//! Each entity holds a clone of its [`Jenkins`] connection, its base path
//! (absolute, never ending in `/`) and the last JSON snapshot. Accessors
//! read the snapshot; [`Pollable::poll`] is the only thing that refreshes
//! it. Mutating calls do not refresh it either, so poll again to observe
//! their effect.
//!
//! Snapshots are not synchronised. An entity shared between tasks must be
//! treated as read-only after its first poll.

mod api_token;
mod artifact;
mod build;
mod cloud;
mod credentials;
mod fingerprint;
mod job;
mod label;
mod node;
mod pipeline;
mod plugin;
mod queue;
mod user;
mod view;

pub use api_token::{ApiToken, ApiTokenData, ApiTokenResponse};
pub use artifact::Artifact;
pub use build::{
    Build, BuildArtifact, BuildBranch, BuildResponse, BuildRevision, ChangeSet, ChangeSetItem,
    ConsoleChunk, Culprit, SvnRevision, TestCase, TestResult, TestSuite,
};
pub use cloud::{CloudConfig, CloudOperation, KubernetesCloud};
pub use credentials::{CredentialStore, CredentialsManager};
pub use fingerprint::{
    Fingerprint, FingerprintOriginal, FingerprintRange, FingerprintRanges, FingerprintResponse,
    FingerprintUsage,
};
pub use job::{
    DefaultParameterValue, HealthReport, InvokeOptions, Job, JobProperty, JobResponse,
    ParameterDefinition,
};
pub use label::{Label, LabelNode, LabelResponse};
pub use node::{Node, NodeResponse, Nodes, NodesResponse};
pub use pipeline::{
    Link, PipelineArtifact, PipelineInputAction, PipelineNode, PipelineNodeLog, PipelineRun,
    PipelineStage,
};
pub use plugin::{Plugin, PluginDependency, Plugins, PluginsResponse};
pub use queue::{Queue, QueueResponse, Task, TaskInfo, TaskResponse, TaskState};
pub use user::{User, UserResponse};
pub use view::{View, ViewResponse, ViewType};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::client::Jenkins;
use crate::error::Result;

/// Refresh contract shared by every entity.
#[async_trait]
pub trait Pollable: Send + Sync {
    /// The decoded JSON snapshot.
    type Raw: DeserializeOwned + Send;

    fn jenkins(&self) -> &Jenkins;

    /// Canonical path, e.g. `/job/team/job/demo`.
    fn base(&self) -> &str;

    /// Extra query values for the refresh GET (`depth`, `tree`).
    fn poll_query(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn set_raw(&mut self, raw: Self::Raw);

    /// Re-read the snapshot from the server. Returns the response status.
    async fn poll(&mut self, cancel: &CancellationToken) -> Result<u16> {
        let query = self.poll_query();
        let query: Vec<(&str, &str)> = query.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let response = self
            .jenkins()
            .requester()
            .get_json::<Self::Raw>(cancel, self.base(), &query)
            .await?;
        self.set_raw(response.body);
        Ok(response.status)
    }
}

/// Percent-encode one path segment.
pub(crate) fn segment(name: &str) -> String {
    urlencoding::encode(name).into_owned()
}

/// Path of a job from its full name (`team/app/demo`).
pub(crate) fn job_path(full_name: &str) -> String {
    full_name
        .split('/')
        .filter(|part| !part.is_empty())
        .map(|part| format!("/job/{}", segment(part)))
        .collect()
}

/// Path of `name` inside the folders `parents`, outermost first.
pub(crate) fn nested_job_path(parents: &[&str], name: &str) -> String {
    parents
        .iter()
        .chain(std::iter::once(&name))
        .map(|part| format!("/job/{}", segment(part)))
        .collect()
}

/// Full name (`team/demo`) from a job path (`/job/team/job/demo`).
pub(crate) fn full_name_from_path(path: &str) -> String {
    path.split("/job/")
        .skip(1)
        .map(|part| {
            let part = part.trim_end_matches('/');
            urlencoding::decode(part)
                .map(|p| p.into_owned())
                .unwrap_or_else(|_| part.to_string())
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Path of the folder containing the job at `base` (empty at top level).
pub(crate) fn parent_path(base: &str) -> &str {
    match base.rfind("/job/") {
        Some(i) => &base[..i],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_paths() {
        assert_eq!(job_path("demo"), "/job/demo");
        assert_eq!(job_path("team/app demo"), "/job/team/job/app%20demo");
        assert_eq!(nested_job_path(&["a", "b"], "c"), "/job/a/job/b/job/c");
        assert_eq!(nested_job_path(&[], "c"), "/job/c");
        assert_eq!(full_name_from_path("/job/team/job/app%20demo"), "team/app demo");
        assert_eq!(full_name_from_path("/job/demo"), "demo");
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("/job/my-folder"), "");
        assert_eq!(parent_path("/job/parent/job/child"), "/job/parent");
        assert_eq!(
            parent_path("/job/level1/job/level2/job/level3"),
            "/job/level1/job/level2"
        );
    }
}
