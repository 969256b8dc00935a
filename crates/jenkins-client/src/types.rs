//! JSON shapes shared by several endpoints.
//!
//! Every struct defaults missing fields so that older or plugin-trimmed
//! responses still decode.

use serde::{Deserialize, Serialize};

/// `GET /api/json` on the server root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExecutorResponse {
    #[serde(rename = "_class")]
    pub class: String,
    pub assigned_labels: Vec<LabelRef>,
    pub description: Option<String>,
    pub jobs: Vec<JobRef>,
    pub mode: String,
    pub node_description: String,
    pub node_name: String,
    pub num_executors: i64,
    pub primary_view: Option<ViewRef>,
    pub quieting_down: bool,
    pub slave_agent_port: i64,
    pub use_crumbs: bool,
    pub use_security: bool,
    pub views: Vec<ViewRef>,
}

/// A job as listed by its parent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobRef {
    #[serde(rename = "_class")]
    pub class: String,
    pub name: String,
    pub url: String,
    pub color: Option<String>,
}

/// A build as listed by its job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildRef {
    pub number: i64,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewRef {
    #[serde(rename = "_class")]
    pub class: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelRef {
    pub name: String,
}

/// A person referenced by a build or user listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserRef {
    pub absolute_url: String,
    pub full_name: String,
}

/// One build parameter: `{"name": ..., "value": ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameter {
    pub name: String,
    pub value: serde_json::Value,
}

impl Parameter {
    /// Value rendered as a string (`true`, `42`, `main`).
    pub fn value_string(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Why a build or queue item exists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Cause {
    #[serde(rename = "_class")]
    pub class: String,
    pub short_description: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub upstream_build: Option<i64>,
    pub upstream_project: Option<String>,
    pub upstream_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_snapshot_tolerates_nulls_and_missing() {
        let json = r#"{
            "_class": "hudson.model.Hudson",
            "description": null,
            "jobs": [{"_class": "com.cloudbees.hudson.plugins.folder.Folder", "name": "team", "url": "http://h/job/team/"}],
            "mode": "NORMAL",
            "numExecutors": 2,
            "useCrumbs": true
        }"#;
        let root: ExecutorResponse = serde_json::from_str(json).unwrap();
        assert_eq!(root.jobs[0].name, "team");
        assert_eq!(root.jobs[0].color, None);
        assert!(root.use_crumbs);
        assert!(root.views.is_empty());
    }

    #[test]
    fn test_parameter_value_string() {
        let p: Parameter = serde_json::from_str(r#"{"name":"DRY_RUN","value":true}"#).unwrap();
        assert_eq!(p.value_string(), "true");
        let p: Parameter = serde_json::from_str(r#"{"name":"BRANCH","value":"main"}"#).unwrap();
        assert_eq!(p.value_string(), "main");
    }
}
