//! Permanent agent configuration (`/computer/{name}/config.xml`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::XmlDocument;
use crate::element::{RawElement, XmlWriter};
use crate::error::{Result, XmlError};
use crate::launcher::Launcher;
use crate::node_property::NodeProperties;

pub const DUMB_SLAVE_CLASS: &str = "hudson.slaves.DumbSlave";
pub const RETENTION_ALWAYS_CLASS: &str = "hudson.slaves.RetentionStrategy$Always";

/// How the scheduler uses a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeMode {
    /// Use the node as much as possible.
    #[default]
    Normal,
    /// Only run jobs whose label expression matches.
    Exclusive,
}

impl NodeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeMode::Normal => "NORMAL",
            NodeMode::Exclusive => "EXCLUSIVE",
        }
    }
}

impl fmt::Display for NodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeMode {
    type Err = XmlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NORMAL" => Ok(NodeMode::Normal),
            "EXCLUSIVE" => Ok(NodeMode::Exclusive),
            other => Err(XmlError::InvalidValue {
                field: "mode".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

const KNOWN_CHILDREN: &[&str] = &[
    "name",
    "description",
    "remoteFS",
    "numExecutors",
    "mode",
    "retentionStrategy",
    "launcher",
    "label",
    "nodeProperties",
];

/// The `config.xml` of a permanent agent.
///
/// Children this type does not model are kept in `extra` and written back
/// after the known ones, so a read-modify-write cycle loses nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveConfig {
    /// Root element name and attributes (`<slave>` for permanent agents).
    pub root: RawElement,
    pub name: String,
    pub description: String,
    pub remote_fs: String,
    pub num_executors: u32,
    pub mode: NodeMode,
    pub label: String,
    pub retention_strategy: RawElement,
    pub launcher: Option<Launcher>,
    pub node_properties: NodeProperties,
    pub extra: Vec<RawElement>,
}

impl SlaveConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            root: RawElement::new("slave", ""),
            name: name.into(),
            description: String::new(),
            remote_fs: String::new(),
            num_executors: 1,
            mode: NodeMode::Normal,
            label: String::new(),
            retention_strategy: RawElement::new("retentionStrategy", "")
                .with_attribute("class", RETENTION_ALWAYS_CLASS),
            launcher: None,
            node_properties: NodeProperties::default(),
            extra: Vec::new(),
        }
    }
}

impl XmlDocument for SlaveConfig {
    fn from_xml(xml: &str) -> Result<Self> {
        let root = RawElement::parse(xml)?;
        let mut config = SlaveConfig {
            root: RawElement {
                inner_xml: String::new(),
                ..root.clone()
            },
            ..SlaveConfig::new("")
        };

        for child in root.children()? {
            match child.name.as_str() {
                "name" => config.name = child.text()?,
                "description" => config.description = child.text()?,
                "remoteFS" => config.remote_fs = child.text()?,
                "numExecutors" => {
                    let text = child.text()?;
                    config.num_executors =
                        text.trim().parse().map_err(|_| XmlError::InvalidValue {
                            field: "numExecutors".to_string(),
                            value: text.clone(),
                        })?;
                }
                "mode" => config.mode = child.text()?.trim().parse()?,
                "retentionStrategy" => config.retention_strategy = child,
                "launcher" => config.launcher = Some(Launcher::from_element(&child)?),
                "label" => config.label = child.text()?,
                "nodeProperties" => config.node_properties = NodeProperties::from_element(&child)?,
                _ => config.extra.push(child),
            }
        }

        Ok(config)
    }

    fn to_xml(&self) -> String {
        let mut w = XmlWriter::new();
        let attrs: Vec<(&str, &str)> = self
            .root
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        w.open(&self.root.name, &attrs);
        w.text_element("name", &self.name);
        w.text_element("description", &self.description);
        w.text_element("remoteFS", &self.remote_fs);
        w.display_element("numExecutors", self.num_executors);
        w.display_element("mode", self.mode);
        self.retention_strategy.write(&mut w);
        if let Some(launcher) = &self.launcher {
            launcher.write(&mut w);
        }
        w.text_element("label", &self.label);
        self.node_properties.write(&mut w);
        for extra in &self.extra {
            extra.write(&mut w);
        }
        w.close(&self.root.name);
        w.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::{JnlpLauncher, SshLauncher};
    use crate::node_property::NodeProperty;

    const SERVER_CONFIG: &str = r#"<?xml version="1.1" encoding="UTF-8"?>
<slave>
  <name>agent-1</name>
  <description>linux builder</description>
  <remoteFS>/home/jenkins</remoteFS>
  <numExecutors>2</numExecutors>
  <mode>EXCLUSIVE</mode>
  <retentionStrategy class="hudson.slaves.RetentionStrategy$Always"/>
  <launcher class="hudson.plugins.sshslaves.SSHLauncher" plugin="ssh-slaves@1.31.2">
    <host>h</host>
    <port>22</port>
    <credentialsId>c</credentialsId>
    <launchTimeoutSeconds>60</launchTimeoutSeconds>
    <maxNumRetries>10</maxNumRetries>
    <retryWaitTime>15</retryWaitTime>
    <sshHostKeyVerificationStrategy class="hudson.plugins.sshslaves.verifiers.NonVerifyingKeyVerificationStrategy"/>
    <tcpNoDelay>true</tcpNoDelay>
  </launcher>
  <label>linux docker</label>
  <nodeProperties>
    <hudson.slaves.EnvironmentVariablesNodeProperty>
      <envVars serialization="custom">
        <unserializable-parents/>
        <tree-map>
          <default><comparator class="java.lang.String$CaseInsensitiveComparator"/></default>
          <int>1</int>
          <string>K1</string>
          <string>V1</string>
        </tree-map>
      </envVars>
    </hudson.slaves.EnvironmentVariablesNodeProperty>
    <org.example.UnknownProperty><x>1</x></org.example.UnknownProperty>
  </nodeProperties>
  <userId>admin</userId>
</slave>"#;

    #[test]
    fn test_decode_server_config() {
        let config = SlaveConfig::from_xml(SERVER_CONFIG).unwrap();
        assert_eq!(config.name, "agent-1");
        assert_eq!(config.remote_fs, "/home/jenkins");
        assert_eq!(config.num_executors, 2);
        assert_eq!(config.mode, NodeMode::Exclusive);
        assert_eq!(config.label, "linux docker");
        assert_eq!(config.retention_strategy.class(), Some(RETENTION_ALWAYS_CLASS));

        let Some(Launcher::Ssh(ssh)) = &config.launcher else {
            panic!("expected ssh launcher");
        };
        assert_eq!(ssh.host, "h");
        assert_eq!(ssh.port, 22);
        assert_eq!(ssh.credentials_id, "c");
        assert_eq!(ssh.max_num_retries, 10);

        let props = &config.node_properties.properties;
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].env_var("K1"), Some("V1"));
        assert!(matches!(&props[1], NodeProperty::Raw(raw) if raw.name == "org.example.UnknownProperty"));

        assert_eq!(config.extra.len(), 1);
        assert_eq!(config.extra[0].name, "userId");
    }

    #[test]
    fn test_config_round_trip() {
        let config = SlaveConfig::from_xml(SERVER_CONFIG).unwrap();
        let again = SlaveConfig::from_xml(&config.to_xml()).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn test_property_update_keeps_launcher_details() {
        let mut config = SlaveConfig::from_xml(SERVER_CONFIG).unwrap();
        config.node_properties = vec![NodeProperty::workspace_cleanup()].into();
        let xml = config.to_xml();

        assert!(xml.contains(
            r#"<launcher class="hudson.plugins.sshslaves.SSHLauncher" plugin="ssh-slaves@1.31.2">"#
        ));
        assert!(xml.contains(
            r#"<sshHostKeyVerificationStrategy class="hudson.plugins.sshslaves.verifiers.NonVerifyingKeyVerificationStrategy"/>"#
        ));
        assert!(xml.contains("<tcpNoDelay>true</tcpNoDelay>"));
        assert!(!xml.contains("org.example.UnknownProperty"));

        let again = SlaveConfig::from_xml(&xml).unwrap();
        assert_eq!(again.launcher, config.launcher);
    }

    #[test]
    fn test_new_config_round_trip() {
        let mut config = SlaveConfig::new("agent-2");
        config.remote_fs = "/var/lib/agent".to_string();
        config.launcher = Some(Launcher::Jnlp(JnlpLauncher::default()));
        config.node_properties = vec![NodeProperty::workspace_cleanup()].into();
        let again = SlaveConfig::from_xml(&config.to_xml()).unwrap();
        assert_eq!(again, config);

        config.launcher = Some(Launcher::Ssh(SshLauncher::new("h", 22, "c")));
        let again = SlaveConfig::from_xml(&config.to_xml()).unwrap();
        assert_eq!(again.launcher, config.launcher);
    }

    #[test]
    fn test_bad_mode() {
        let err = SlaveConfig::from_xml("<slave><mode>SOMETIMES</mode></slave>").unwrap_err();
        assert!(matches!(err, XmlError::InvalidValue { .. }));
    }
}
