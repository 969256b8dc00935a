//! Installed plugins.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Pollable, segment};
use crate::client::Jenkins;
use crate::error::Result;

const PLUGIN_MANAGER: &str = "/pluginManager";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PluginDependency {
    pub optional: bool,
    pub short_name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Plugin {
    pub active: bool,
    pub backup_version: Option<String>,
    pub bundled: bool,
    pub deleted: bool,
    pub dependencies: Vec<PluginDependency>,
    pub downgradable: bool,
    pub enabled: bool,
    pub has_update: bool,
    pub long_name: String,
    pub pinned: bool,
    pub short_name: String,
    pub url: Option<String>,
    pub version: String,
}

/// `GET /pluginManager/api/json?depth={d}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsResponse {
    pub plugins: Vec<Plugin>,
}

/// The plugin manager's listing. Plugins only appear at depth 1 or more.
#[derive(Debug, Clone)]
pub struct Plugins {
    jenkins: Jenkins,
    depth: u32,
    raw: PluginsResponse,
}

impl Pollable for Plugins {
    type Raw = PluginsResponse;

    fn jenkins(&self) -> &Jenkins {
        &self.jenkins
    }

    fn base(&self) -> &str {
        PLUGIN_MANAGER
    }

    fn poll_query(&self) -> Vec<(&'static str, String)> {
        vec![("depth", self.depth.to_string())]
    }

    fn set_raw(&mut self, raw: PluginsResponse) {
        self.raw = raw;
    }
}

impl Plugins {
    pub fn new(jenkins: &Jenkins, depth: u32) -> Self {
        Self {
            jenkins: jenkins.clone(),
            depth,
            raw: PluginsResponse::default(),
        }
    }

    pub fn count(&self) -> usize {
        self.raw.plugins.len()
    }

    /// Look a plugin up by short or long name.
    pub fn contains(&self, name: &str) -> Option<&Plugin> {
        self.raw
            .plugins
            .iter()
            .find(|p| p.short_name == name || p.long_name == name)
    }

    pub fn plugins(&self) -> &[Plugin] {
        &self.raw.plugins
    }
}

impl Jenkins {
    pub async fn get_plugins(&self, cancel: &CancellationToken, depth: u32) -> Result<Plugins> {
        let mut plugins = Plugins::new(self, depth);
        plugins.poll(cancel).await?;
        Ok(plugins)
    }

    pub async fn has_plugin(&self, cancel: &CancellationToken, name: &str) -> Result<Option<Plugin>> {
        let plugins = self.get_plugins(cancel, 1).await?;
        Ok(plugins.contains(name).cloned())
    }

    /// Ask the update center to install `short_name` at `version`
    /// (`latest` for the newest).
    pub async fn install_plugin(
        &self,
        cancel: &CancellationToken,
        short_name: &str,
        version: &str,
    ) -> Result<bool> {
        let document = jenkins_xml::install_plugins_document(&[(short_name, version)]);
        let response = self
            .requester()
            .post_xml(
                cancel,
                &format!("{PLUGIN_MANAGER}/installNecessaryPlugins"),
                &document,
                &[],
            )
            .await?;
        info!(plugin = short_name, version, "Requested plugin install");
        Ok(response.is_success() || (300..400).contains(&response.status))
    }

    pub async fn uninstall_plugin(&self, cancel: &CancellationToken, short_name: &str) -> Result<bool> {
        let response = self
            .requester()
            .post_form(
                cancel,
                &format!("{PLUGIN_MANAGER}/plugin/{}/doUninstall", segment(short_name)),
                &[],
                &[],
            )
            .await
            .map_err(|e| e.or_not_found("plugin", short_name))?;
        Ok(response.is_success() || (300..400).contains(&response.status))
    }

    /// Upload a `.hpi`/`.jpi` file.
    pub async fn upload_plugin(&self, cancel: &CancellationToken, path: impl Into<PathBuf>) -> Result<bool> {
        let path = path.into();
        let response = self
            .requester()
            .post_files(
                cancel,
                &format!("{PLUGIN_MANAGER}/uploadPlugin"),
                &[],
                &[],
                std::slice::from_ref(&path),
            )
            .await?;
        info!(file = %path.display(), "Uploaded plugin");
        Ok(response.is_success() || (300..400).contains(&response.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugins_lookup() {
        let jenkins = Jenkins::new("http://localhost:8080").unwrap();
        let mut plugins = Plugins::new(&jenkins, 1);
        assert_eq!(plugins.poll_query(), vec![("depth", "1".to_string())]);
        plugins.set_raw(
            serde_json::from_str(
                r#"{"plugins": [
                {"shortName": "git", "longName": "Git plugin", "version": "5.2.0", "active": true,
                 "dependencies": [{"shortName": "scm-api", "version": "683", "optional": false}]},
                {"shortName": "ws-cleanup", "longName": "Workspace Cleanup Plugin", "version": "0.45"}
            ]}"#,
            )
            .unwrap(),
        );
        assert_eq!(plugins.count(), 2);
        assert_eq!(plugins.contains("git").unwrap().version, "5.2.0");
        assert!(plugins.contains("Workspace Cleanup Plugin").is_some());
        assert!(plugins.contains("docker").is_none());
        assert_eq!(plugins.plugins()[0].dependencies[0].short_name, "scm-api");
    }
}
