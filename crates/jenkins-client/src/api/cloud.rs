//! Kubernetes cloud configuration through the script console.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::Jenkins;
use crate::error::{Error, Result};

const SCRIPT_TEXT: &str = "/scriptText";
const TEMPLATE: &str = include_str!("../../templates/manage_clouds.groovy");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudOperation {
    #[default]
    Add,
    Delete,
}

impl CloudOperation {
    fn as_str(self) -> &'static str {
        match self {
            CloudOperation::Add => "add",
            CloudOperation::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub cloud_name: String,
    pub namespace: String,
    pub jenkins_url: String,
    pub jenkins_tunnel: String,
    pub operation: CloudOperation,
}

/// Adds or removes a Kubernetes cloud. Requires the kubernetes plugin and
/// script console access.
#[derive(Debug, Clone)]
pub struct KubernetesCloud {
    jenkins: Jenkins,
    config: CloudConfig,
}

impl KubernetesCloud {
    pub fn new(jenkins: &Jenkins, config: CloudConfig) -> Self {
        Self {
            jenkins: jenkins.clone(),
            config,
        }
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    /// The Groovy script for this configuration.
    pub fn render(&self) -> Result<String> {
        if self.config.cloud_name.is_empty() {
            return Err(Error::Config("cloud name must not be empty".to_string()));
        }
        let values = [
            ("cloud_name", self.config.cloud_name.as_str()),
            ("operation", self.config.operation.as_str()),
            ("namespace", self.config.namespace.as_str()),
            ("jenkins_url", self.config.jenkins_url.as_str()),
            ("jenkins_tunnel", self.config.jenkins_tunnel.as_str()),
        ];
        let mut script = String::with_capacity(TEMPLATE.len());
        let mut rest = TEMPLATE;
        while let Some(start) = rest.find("{{") {
            script.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                return Err(Error::Config("unterminated template placeholder".to_string()));
            };
            let key = &after[..end];
            let value = values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| *value)
                .ok_or_else(|| Error::Config(format!("unknown template placeholder '{key}'")))?;
            script.push_str(&groovy_escape(value));
            rest = &after[end + 2..];
        }
        script.push_str(rest);
        Ok(script)
    }

    /// Run the script and return the console output.
    pub async fn configure(&self, cancel: &CancellationToken) -> Result<String> {
        let script = self.render()?;
        let response = self
            .jenkins
            .requester()
            .post_form(cancel, SCRIPT_TEXT, &[("script", script.as_str())], &[])
            .await?;
        info!(
            cloud = %self.config.cloud_name,
            operation = self.config.operation.as_str(),
            "Configured Kubernetes cloud"
        );
        Ok(response.text())
    }
}

/// Escape for a single-quoted Groovy string.
fn groovy_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

impl Jenkins {
    pub fn kubernetes_cloud(&self, config: CloudConfig) -> KubernetesCloud {
        KubernetesCloud::new(self, config)
    }
}
