//! Views.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use super::{Pollable, segment};
use crate::client::Jenkins;
use crate::error::Result;
use crate::types::{JobRef, ViewRef};

/// Kind of view to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewType {
    List,
    Nested,
    My,
    Dashboard,
    Pipeline,
}

impl ViewType {
    pub fn class(&self) -> &'static str {
        match self {
            ViewType::List => "hudson.model.ListView",
            ViewType::Nested => "hudson.plugins.nested_view.NestedView",
            ViewType::My => "hudson.model.MyView",
            ViewType::Dashboard => "hudson.plugins.view.dashboard.Dashboard",
            ViewType::Pipeline => {
                "au.com.centrumsystems.hudson.plugin.buildpipeline.BuildPipelineView"
            }
        }
    }
}

/// `GET /view/{name}/api/json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewResponse {
    #[serde(rename = "_class")]
    pub class: String,
    pub description: Option<String>,
    pub jobs: Vec<JobRef>,
    pub name: String,
    pub property: Vec<Value>,
    pub url: String,
    /// Sub-views of a nested view.
    pub views: Vec<ViewRef>,
}

#[derive(Debug, Clone)]
pub struct View {
    jenkins: Jenkins,
    base: String,
    raw: ViewResponse,
}

impl Pollable for View {
    type Raw = ViewResponse;

    fn jenkins(&self) -> &Jenkins {
        &self.jenkins
    }

    fn base(&self) -> &str {
        &self.base
    }

    fn set_raw(&mut self, raw: ViewResponse) {
        self.raw = raw;
    }
}

impl View {
    pub fn new(jenkins: &Jenkins, name: &str) -> Self {
        Self {
            jenkins: jenkins.clone(),
            base: format!("/view/{}", segment(name)),
            raw: ViewResponse {
                name: name.to_string(),
                ..ViewResponse::default()
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.raw.name
    }

    pub fn description(&self) -> &str {
        self.raw.description.as_deref().unwrap_or_default()
    }

    pub fn url(&self) -> &str {
        &self.raw.url
    }

    pub fn jobs(&self) -> &[JobRef] {
        &self.raw.jobs
    }

    async fn job_action(&self, cancel: &CancellationToken, action: &str, job: &str) -> Result<bool> {
        let response = self
            .jenkins
            .requester()
            .post_form(
                cancel,
                &format!("{}/{}", self.base, action),
                &[],
                &[("name", job)],
            )
            .await
            .map_err(|e| e.or_not_found("view", self.name()))?;
        Ok(response.is_success())
    }

    pub async fn add_job(&self, cancel: &CancellationToken, job: &str) -> Result<bool> {
        self.job_action(cancel, "addJobToView", job).await
    }

    pub async fn remove_job(&self, cancel: &CancellationToken, job: &str) -> Result<bool> {
        self.job_action(cancel, "removeJobFromView", job).await
    }
}

impl Jenkins {
    pub async fn get_view(&self, cancel: &CancellationToken, name: &str) -> Result<View> {
        let mut view = View::new(self, name);
        view.poll(cancel)
            .await
            .map_err(|e| e.or_not_found("view", name))?;
        Ok(view)
    }

    /// Every top-level view, each polled.
    pub async fn get_all_views(&self, cancel: &CancellationToken) -> Result<Vec<View>> {
        self.poll(cancel).await?;
        let mut views = Vec::new();
        for view_ref in self.info().views {
            let mut view = View::new(self, &view_ref.name);
            view.base = self.path_from_url(&view_ref.url);
            view.poll(cancel)
                .await
                .map_err(|e| e.or_not_found("view", &view_ref.name))?;
            views.push(view);
        }
        Ok(views)
    }

    pub async fn create_view(
        &self,
        cancel: &CancellationToken,
        name: &str,
        view_type: ViewType,
    ) -> Result<View> {
        let mode = view_type.class();
        let json = json!({ "name": name, "mode": mode }).to_string();
        self.requester()
            .post_form(
                cancel,
                "/createView",
                &[
                    ("name", name),
                    ("mode", mode),
                    ("Submit", "OK"),
                    ("json", json.as_str()),
                ],
                &[("name", name)],
            )
            .await?;
        self.get_view(cancel, name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_classes() {
        assert_eq!(ViewType::List.class(), "hudson.model.ListView");
        assert_eq!(ViewType::Nested.class(), "hudson.plugins.nested_view.NestedView");
        assert!(ViewType::Pipeline.class().ends_with("BuildPipelineView"));
    }

    #[test]
    fn test_view_snapshot() {
        let jenkins = Jenkins::new("http://localhost:8080").unwrap();
        let mut view = View::new(&jenkins, "my view");
        assert_eq!(view.base(), "/view/my%20view");
        view.set_raw(
            serde_json::from_str(
                r#"{"_class": "hudson.model.ListView", "name": "my view", "description": null,
                    "jobs": [{"name": "demo", "url": "http://localhost:8080/job/demo/", "color": "blue"}],
                    "url": "http://localhost:8080/view/my%20view/"}"#,
            )
            .unwrap(),
        );
        assert_eq!(view.name(), "my view");
        assert_eq!(view.description(), "");
        assert_eq!(view.jobs()[0].color.as_deref(), Some("blue"));
    }
}
