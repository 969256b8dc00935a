//! Labels and the nodes carrying them.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{Pollable, segment};
use crate::client::Jenkins;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LabelNode {
    #[serde(rename = "_class")]
    pub class: String,
    pub node_name: String,
    pub node_description: String,
    pub num_executors: i64,
    pub mode: String,
}

/// `GET /label/{name}/api/json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LabelResponse {
    pub name: String,
    pub description: Option<String>,
    pub nodes: Vec<LabelNode>,
    pub offline: bool,
    pub idle_executors: i64,
    pub busy_executors: i64,
    pub total_executors: i64,
}

#[derive(Debug, Clone)]
pub struct Label {
    jenkins: Jenkins,
    base: String,
    raw: LabelResponse,
}

impl Pollable for Label {
    type Raw = LabelResponse;

    fn jenkins(&self) -> &Jenkins {
        &self.jenkins
    }

    fn base(&self) -> &str {
        &self.base
    }

    fn set_raw(&mut self, raw: LabelResponse) {
        self.raw = raw;
    }
}

impl Label {
    pub fn new(jenkins: &Jenkins, name: &str) -> Self {
        Self {
            jenkins: jenkins.clone(),
            base: format!("/label/{}", segment(name)),
            raw: LabelResponse {
                name: name.to_string(),
                ..LabelResponse::default()
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.raw.name
    }

    pub fn nodes(&self) -> &[LabelNode] {
        &self.raw.nodes
    }

    pub fn info(&self) -> &LabelResponse {
        &self.raw
    }
}

impl Jenkins {
    pub async fn get_label(&self, cancel: &CancellationToken, name: &str) -> Result<Label> {
        let mut label = Label::new(self, name);
        label
            .poll(cancel)
            .await
            .map_err(|e| e.or_not_found("label", name))?;
        Ok(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_snapshot() {
        let jenkins = Jenkins::new("http://localhost:8080").unwrap();
        let mut label = Label::new(&jenkins, "linux && docker");
        assert_eq!(label.base(), "/label/linux%20%26%26%20docker");
        assert_eq!(label.name(), "linux && docker");
        label.set_raw(
            serde_json::from_str(
                r#"{"name": "linux", "nodes": [{"nodeName": "agent-1", "numExecutors": 2, "mode": "NORMAL"}],
                    "totalExecutors": 2}"#,
            )
            .unwrap(),
        );
        assert_eq!(label.nodes()[0].node_name, "agent-1");
        assert_eq!(label.info().total_executors, 2);
    }
}
