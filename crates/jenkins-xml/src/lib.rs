//! Polymorphic XML codec for Jenkins configuration documents.
//!
//! Jenkins serialises configuration with XStream. Several parts of those
//! documents are tagged unions whose concrete type is named by a `class`
//! attribute (agent launchers), by the element name itself (node
//! properties, credentials), or both. This crate models each union as a
//! closed set of known variants plus a raw variant that carries the tag and
//! inner XML of anything it does not recognise, so documents round-trip
//! without loss.
//!
//! # Example
//!
//! ```
//! use jenkins_xml::{Launcher, NodeProperty, SlaveConfig, SshLauncher, XmlDocument};
//!
//! let mut config = SlaveConfig::new("agent-1");
//! config.remote_fs = "/home/jenkins".to_string();
//! config.launcher = Some(Launcher::Ssh(SshLauncher::new("build-01", 22, "ssh-key")));
//! config.node_properties = vec![NodeProperty::env_vars([("JAVA_HOME", "/opt/jdk")])].into();
//!
//! let xml = config.to_xml();
//! assert_eq!(SlaveConfig::from_xml(&xml).unwrap(), config);
//! ```

pub mod credential;
pub mod document;
pub mod element;
pub mod error;
pub mod launcher;
pub mod node_property;
pub mod slave;

pub use credential::{
    Credential, DockerServerCredential, FileCredential, PrivateKeySource, SecretTextCredential,
    SshPrivateKeyCredential, UsernamePasswordCredential,
};
pub use document::{XmlDocument, install_plugins_document, jnlp_secret};
pub use element::{RawElement, XmlWriter, canonical_name, parse_children};
pub use error::{Result, XmlError};
pub use launcher::{JnlpLauncher, Launcher, SshLauncher, WorkDirSettings};
pub use node_property::{
    DiskSpaceMonitor, EnvVar, NodeProperties, NodeProperty, ToolLocation, WorkspaceCleanup,
};
pub use slave::{NodeMode, SlaveConfig};
