//! Agents (computers) and their configuration.

use std::collections::BTreeMap;

use jenkins_xml::{JnlpLauncher, Launcher, NodeProperties, SlaveConfig, XmlDocument};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{Pollable, segment};
use crate::client::Jenkins;
use crate::error::{Error, Result};
use crate::types::LabelRef;

const COMPUTER: &str = "/computer";
const DUMB_SLAVE_DESCRIPTOR: &str = "hudson.slaves.DumbSlave$DescriptorImpl";

/// `GET /computer/{name}/api/json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodeResponse {
    #[serde(rename = "_class")]
    pub class: String,
    pub actions: Vec<Value>,
    pub assigned_labels: Vec<LabelRef>,
    pub description: Option<String>,
    pub display_name: String,
    pub executors: Vec<Value>,
    pub icon: String,
    pub idle: bool,
    pub jnlp_agent: bool,
    pub launch_supported: bool,
    pub manual_launch_allowed: bool,
    /// Keyed by monitor class, e.g. `hudson.node_monitors.DiskSpaceMonitor`.
    pub monitor_data: BTreeMap<String, Value>,
    pub num_executors: i64,
    pub offline: bool,
    pub offline_cause_reason: Option<String>,
    pub temporarily_offline: bool,
}

/// `GET /computer/api/json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NodesResponse {
    pub busy_executors: i64,
    pub computer: Vec<NodeResponse>,
    pub display_name: String,
    pub total_executors: i64,
}

/// One agent, addressed as `/computer/{name}`.
#[derive(Debug, Clone)]
pub struct Node {
    jenkins: Jenkins,
    name: String,
    base: String,
    raw: NodeResponse,
}

impl Pollable for Node {
    type Raw = NodeResponse;

    fn jenkins(&self) -> &Jenkins {
        &self.jenkins
    }

    fn base(&self) -> &str {
        &self.base
    }

    fn set_raw(&mut self, raw: NodeResponse) {
        self.raw = raw;
    }
}

impl Node {
    pub fn new(jenkins: &Jenkins, name: &str) -> Self {
        Self {
            jenkins: jenkins.clone(),
            name: name.to_string(),
            base: format!("{COMPUTER}/{}", segment(name)),
            raw: NodeResponse::default(),
        }
    }

    fn from_raw(jenkins: &Jenkins, raw: NodeResponse) -> Self {
        let mut node = Self::new(jenkins, &raw.display_name);
        node.raw = raw;
        node
    }

    pub fn name(&self) -> &str {
        if self.raw.display_name.is_empty() {
            &self.name
        } else {
            &self.raw.display_name
        }
    }

    pub fn info(&self) -> &NodeResponse {
        &self.raw
    }

    pub fn is_online(&self) -> bool {
        !self.raw.offline
    }

    pub fn is_temporarily_offline(&self) -> bool {
        self.raw.temporarily_offline
    }

    pub fn is_idle(&self) -> bool {
        self.raw.idle
    }

    pub fn is_jnlp_agent(&self) -> bool {
        self.raw.jnlp_agent
    }

    fn not_found(&self, e: Error) -> Error {
        e.or_not_found("node", &self.name)
    }

    async fn action(
        &self,
        cancel: &CancellationToken,
        action: &str,
        form: &[(&str, &str)],
    ) -> Result<bool> {
        let response = self
            .jenkins
            .requester()
            .post_form(cancel, &format!("{}/{}", self.base, action), form, &[])
            .await
            .map_err(|e| self.not_found(e))?;
        Ok(response.is_success())
    }

    /// Bring a temporarily offline node back. Refreshes the snapshot first.
    ///
    /// A node that is offline for any other reason cannot be brought online
    /// this way and yields [`Error::Conflict`]; use [`launch`](Self::launch).
    pub async fn set_online(&mut self, cancel: &CancellationToken) -> Result<bool> {
        self.poll(cancel).await.map_err(|e| self.not_found(e))?;
        if self.raw.temporarily_offline {
            return self.toggle_temporarily_offline(cancel, "").await;
        }
        if self.raw.offline {
            return Err(Error::Conflict(format!(
                "node '{}' is offline and not temporarily; launch it instead",
                self.name
            )));
        }
        Ok(true)
    }

    /// Mark the node temporarily offline unless it already is offline.
    pub async fn set_offline(&mut self, cancel: &CancellationToken, message: &str) -> Result<bool> {
        self.poll(cancel).await.map_err(|e| self.not_found(e))?;
        if self.raw.offline {
            return Ok(true);
        }
        self.toggle_temporarily_offline(cancel, message).await
    }

    pub async fn toggle_temporarily_offline(
        &self,
        cancel: &CancellationToken,
        message: &str,
    ) -> Result<bool> {
        self.action(cancel, "toggleOffline", &[("offlineMessage", message)])
            .await
    }

    /// Start the agent through its launcher.
    pub async fn launch(&self, cancel: &CancellationToken) -> Result<bool> {
        self.action(cancel, "launchSlaveAgent", &[]).await
    }

    pub async fn disconnect(&self, cancel: &CancellationToken, message: &str) -> Result<bool> {
        self.action(cancel, "doDisconnect", &[("offlineMessage", message)])
            .await
    }

    pub async fn delete(&self, cancel: &CancellationToken) -> Result<bool> {
        self.action(cancel, "doDelete", &[]).await
    }

    /// The agent's connection log.
    pub async fn log_text(&self, cancel: &CancellationToken) -> Result<String> {
        let response = self
            .jenkins
            .requester()
            .get_text(cancel, &format!("{}/logText/progressiveText", self.base), &[])
            .await
            .map_err(|e| self.not_found(e))?;
        Ok(response.body)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // config.xml
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_config(&self, cancel: &CancellationToken) -> Result<SlaveConfig> {
        let response = self
            .jenkins
            .requester()
            .get_xml::<SlaveConfig>(cancel, &format!("{}/config.xml", self.base), &[])
            .await
            .map_err(|e| self.not_found(e))?;
        Ok(response.body)
    }

    /// Replace the whole agent configuration.
    pub async fn update_node(&self, cancel: &CancellationToken, config: &SlaveConfig) -> Result<bool> {
        let response = self
            .jenkins
            .requester()
            .post_xml(
                cancel,
                &format!("{}/config.xml", self.base),
                &config.to_xml(),
                &[],
            )
            .await
            .map_err(|e| self.not_found(e))?;
        Ok(response.is_success())
    }

    pub async fn launcher_config(&self, cancel: &CancellationToken) -> Result<Option<Launcher>> {
        Ok(self.get_config(cancel).await?.launcher)
    }

    /// Swap the launcher, keeping the rest of the configuration.
    pub async fn set_launcher(&self, cancel: &CancellationToken, launcher: Launcher) -> Result<bool> {
        let mut config = self.get_config(cancel).await?;
        config.launcher = Some(launcher);
        self.update_node(cancel, &config).await
    }

    pub async fn node_properties(&self, cancel: &CancellationToken) -> Result<NodeProperties> {
        Ok(self.get_config(cancel).await?.node_properties)
    }

    /// Replace the node properties, keeping the rest of the configuration.
    pub async fn set_node_properties(
        &self,
        cancel: &CancellationToken,
        properties: NodeProperties,
    ) -> Result<bool> {
        let mut config = self.get_config(cancel).await?;
        config.node_properties = properties;
        self.update_node(cancel, &config).await
    }

    /// Secret an inbound agent passes to `agent.jar`, read from the
    /// agent's JNLP file.
    pub async fn jnlp_secret(&self, cancel: &CancellationToken) -> Result<Option<String>> {
        let response = self
            .jenkins
            .requester()
            .get_text(cancel, &format!("{}/slave-agent.jnlp", self.base), &[])
            .await
            .map_err(|e| self.not_found(e))?;
        Ok(jenkins_xml::jnlp_secret(&response.body)?)
    }
}

/// Every agent, from one `/computer` listing.
#[derive(Debug, Clone)]
pub struct Nodes {
    jenkins: Jenkins,
    raw: NodesResponse,
}

impl Pollable for Nodes {
    type Raw = NodesResponse;

    fn jenkins(&self) -> &Jenkins {
        &self.jenkins
    }

    fn base(&self) -> &str {
        COMPUTER
    }

    fn set_raw(&mut self, raw: NodesResponse) {
        self.raw = raw;
    }
}

impl Nodes {
    pub fn new(jenkins: &Jenkins) -> Self {
        Self {
            jenkins: jenkins.clone(),
            raw: NodesResponse::default(),
        }
    }

    pub fn info(&self) -> &NodesResponse {
        &self.raw
    }

    pub fn count(&self) -> usize {
        self.raw.computer.len()
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.raw
            .computer
            .iter()
            .map(|raw| Node::from_raw(&self.jenkins, raw.clone()))
            .collect()
    }
}

/// JSON description of a launcher for the `doCreateItem` form.
fn launcher_json(launcher: &Launcher) -> Result<Value> {
    let mut object = match launcher {
        Launcher::Ssh(ssh) => into_object(serde_json::to_value(ssh)?),
        Launcher::Jnlp(jnlp) => into_object(serde_json::to_value(jnlp)?),
        Launcher::Empty { .. } | Launcher::Raw(_) => Map::new(),
    };
    let class = Value::String(launcher.class().to_string());
    object.insert("stapler-class".to_string(), class.clone());
    object.insert("$class".to_string(), class);
    Ok(Value::Object(object))
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// The `json` field of `POST /computer/doCreateItem`.
fn create_form_json(config: &SlaveConfig) -> Result<String> {
    let launcher = match &config.launcher {
        Some(launcher) => launcher.clone(),
        None => Launcher::Jnlp(JnlpLauncher::default()),
    };
    let retention = config
        .retention_strategy
        .class()
        .unwrap_or(jenkins_xml::slave::RETENTION_ALWAYS_CLASS);
    Ok(json!({
        "name": config.name,
        "nodeDescription": config.description,
        "remoteFS": config.remote_fs,
        "numExecutors": config.num_executors,
        "mode": config.mode.as_str(),
        "labelString": config.label,
        "type": DUMB_SLAVE_DESCRIPTOR,
        "retentionStrategy": { "stapler-class": retention, "$class": retention },
        "nodeProperties": { "stapler-class-bag": "true" },
        "launcher": launcher_json(&launcher)?,
    })
    .to_string())
}

impl Jenkins {
    pub async fn get_node(&self, cancel: &CancellationToken, name: &str) -> Result<Node> {
        let mut node = Node::new(self, name);
        node.poll(cancel)
            .await
            .map_err(|e| e.or_not_found("node", name))?;
        Ok(node)
    }

    pub async fn get_all_nodes(&self, cancel: &CancellationToken) -> Result<Vec<Node>> {
        let mut nodes = Nodes::new(self);
        nodes.poll(cancel).await?;
        Ok(nodes.nodes())
    }

    /// Create a permanent agent from `config`.
    ///
    /// The agent is created through the descriptor form; node properties,
    /// which that form does not carry, are applied with a follow-up
    /// `config.xml` update. An existing node of the same name is returned
    /// unchanged.
    pub async fn create_node(&self, cancel: &CancellationToken, config: &SlaveConfig) -> Result<Node> {
        match self.get_node(cancel, &config.name).await {
            Ok(node) => {
                debug!(node = %config.name, "Node already exists");
                return Ok(node);
            }
            Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let json = create_form_json(config)?;
        self.requester()
            .post_form(
                cancel,
                &format!("{COMPUTER}/doCreateItem"),
                &[
                    ("name", config.name.as_str()),
                    ("type", DUMB_SLAVE_DESCRIPTOR),
                    ("json", json.as_str()),
                ],
                &[],
            )
            .await?;
        info!(node = %config.name, launcher = config.launcher.as_ref().map(Launcher::class), "Created node");

        let node = Node::new(self, &config.name);
        if !config.node_properties.properties.is_empty() {
            node.set_node_properties(cancel, config.node_properties.clone())
                .await?;
        }
        self.get_node(cancel, &config.name).await
    }

    pub async fn delete_node(&self, cancel: &CancellationToken, name: &str) -> Result<bool> {
        Node::new(self, name).delete(cancel).await
    }
}
