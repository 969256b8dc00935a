//! Agent launchers: the `<launcher class="...">` element of a node config.

use serde::{Deserialize, Serialize};

use crate::element::{Fields, RawElement, XmlWriter};
use crate::error::{Result, XmlError};

pub const SSH_LAUNCHER_CLASS: &str = "hudson.plugins.sshslaves.SSHLauncher";
pub const JNLP_LAUNCHER_CLASS: &str = "hudson.slaves.JNLPLauncher";

/// Launches the agent over SSH.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshLauncher {
    pub host: String,
    pub port: u16,
    pub credentials_id: String,
    pub launch_timeout_seconds: u32,
    pub max_num_retries: u32,
    pub retry_wait_time: u32,
    pub jvm_options: String,
    pub java_path: String,
    pub prefix_start_slave_cmd: String,
    pub suffix_start_slave_cmd: String,
    /// Attributes of `<launcher>` besides `class`, e.g. `plugin`.
    #[serde(skip)]
    pub attributes: Vec<(String, String)>,
    /// Children not modelled above, such as `sshHostKeyVerificationStrategy`.
    #[serde(skip)]
    pub extra: Vec<RawElement>,
}

impl SshLauncher {
    pub fn new(host: impl Into<String>, port: u16, credentials_id: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            credentials_id: credentials_id.into(),
            ..Default::default()
        }
    }
}

impl Default for SshLauncher {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            credentials_id: String::new(),
            launch_timeout_seconds: 60,
            max_num_retries: 0,
            retry_wait_time: 0,
            jvm_options: String::new(),
            java_path: String::new(),
            prefix_start_slave_cmd: String::new(),
            suffix_start_slave_cmd: String::new(),
            attributes: Vec::new(),
            extra: Vec::new(),
        }
    }
}

/// Remoting work directory options of an inbound agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkDirSettings {
    pub disabled: bool,
    pub internal_dir: String,
    pub fail_if_work_dir_is_missing: bool,
}

impl Default for WorkDirSettings {
    fn default() -> Self {
        Self {
            disabled: false,
            internal_dir: "remoting".to_string(),
            fail_if_work_dir_is_missing: false,
        }
    }
}

/// Inbound agent that connects to the controller itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JnlpLauncher {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir_settings: Option<WorkDirSettings>,
    pub web_socket: bool,
    #[serde(skip)]
    pub attributes: Vec<(String, String)>,
    /// Children not modelled above, e.g. `tunnel` or `vmargs`.
    #[serde(skip)]
    pub extra: Vec<RawElement>,
}

impl Default for JnlpLauncher {
    fn default() -> Self {
        Self {
            work_dir_settings: Some(WorkDirSettings::default()),
            web_socket: false,
            attributes: Vec::new(),
            extra: Vec::new(),
        }
    }
}

/// A launcher, tagged by its `class` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launcher {
    Ssh(SshLauncher),
    Jnlp(JnlpLauncher),
    /// A launcher element with a class and no body.
    Empty { class: String },
    /// A launcher type this crate does not model, kept whole.
    Raw(RawElement),
}

impl Launcher {
    pub fn class(&self) -> &str {
        match self {
            Launcher::Ssh(_) => SSH_LAUNCHER_CLASS,
            Launcher::Jnlp(_) => JNLP_LAUNCHER_CLASS,
            Launcher::Empty { class } => class,
            Launcher::Raw(raw) => raw.class().unwrap_or_default(),
        }
    }

    pub fn is_jnlp(&self) -> bool {
        self.class() == JNLP_LAUNCHER_CLASS
    }

    /// Decode from a captured element, dispatching on `class`.
    pub fn from_element(element: &RawElement) -> Result<Self> {
        let class = element
            .class()
            .ok_or_else(|| XmlError::MissingAttribute {
                element: element.name.clone(),
                attribute: "class".to_string(),
            })?
            .to_string();

        if element.is_empty() {
            if element.attributes.len() > 1 {
                return Ok(Launcher::Raw(element.clone()));
            }
            return Ok(Launcher::Empty { class });
        }

        match class.as_str() {
            SSH_LAUNCHER_CLASS => decode_ssh(element).map(Launcher::Ssh),
            JNLP_LAUNCHER_CLASS => decode_jnlp(element).map(Launcher::Jnlp),
            _ => Ok(Launcher::Raw(element.clone())),
        }
    }

    /// Emit as `<launcher class="...">`.
    pub fn write(&self, w: &mut XmlWriter) {
        match self {
            Launcher::Empty { class } => w.empty("launcher", &[("class", class.as_str())]),
            Launcher::Raw(raw) => RawElement {
                name: "launcher".to_string(),
                ..raw.clone()
            }
            .write(w),
            Launcher::Ssh(ssh) => {
                w.open("launcher", &launcher_attributes(SSH_LAUNCHER_CLASS, &ssh.attributes));
                encode_ssh(ssh, w);
                w.close("launcher");
            }
            Launcher::Jnlp(jnlp) => {
                w.open("launcher", &launcher_attributes(JNLP_LAUNCHER_CLASS, &jnlp.attributes));
                encode_jnlp(jnlp, w);
                w.close("launcher");
            }
        }
    }

    pub fn to_xml(&self) -> String {
        let mut w = XmlWriter::new();
        self.write(&mut w);
        w.finish()
    }
}

/// `class` first, then the preserved attributes.
fn launcher_attributes<'a>(class: &'a str, rest: &'a [(String, String)]) -> Vec<(&'a str, &'a str)> {
    std::iter::once(("class", class))
        .chain(rest.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .collect()
}

fn other_attributes(element: &RawElement) -> Vec<(String, String)> {
    element
        .attributes
        .iter()
        .filter(|(k, _)| k != "class")
        .cloned()
        .collect()
}

const SSH_FIELDS: &[&str] = &[
    "host",
    "port",
    "credentialsId",
    "launchTimeoutSeconds",
    "maxNumRetries",
    "retryWaitTime",
    "jvmOptions",
    "javaPath",
    "prefixStartSlaveCmd",
    "suffixStartSlaveCmd",
];

const JNLP_FIELDS: &[&str] = &["workDirSettings", "webSocket"];

fn decode_ssh(element: &RawElement) -> Result<SshLauncher> {
    let f = Fields::of(element)?;
    let defaults = SshLauncher::default();
    Ok(SshLauncher {
        host: f.text("host")?,
        port: f.parse("port", defaults.port)?,
        credentials_id: f.text("credentialsId")?,
        launch_timeout_seconds: f.parse("launchTimeoutSeconds", defaults.launch_timeout_seconds)?,
        max_num_retries: f.parse("maxNumRetries", 0)?,
        retry_wait_time: f.parse("retryWaitTime", 0)?,
        jvm_options: f.text("jvmOptions")?,
        java_path: f.text("javaPath")?,
        prefix_start_slave_cmd: f.text("prefixStartSlaveCmd")?,
        suffix_start_slave_cmd: f.text("suffixStartSlaveCmd")?,
        attributes: other_attributes(element),
        extra: f.rest(SSH_FIELDS),
    })
}

fn encode_ssh(ssh: &SshLauncher, w: &mut XmlWriter) {
    w.text_element("host", &ssh.host);
    w.display_element("port", ssh.port);
    w.text_element("credentialsId", &ssh.credentials_id);
    w.display_element("launchTimeoutSeconds", ssh.launch_timeout_seconds);
    w.display_element("maxNumRetries", ssh.max_num_retries);
    w.display_element("retryWaitTime", ssh.retry_wait_time);
    w.text_element("jvmOptions", &ssh.jvm_options);
    w.text_element("javaPath", &ssh.java_path);
    w.text_element("prefixStartSlaveCmd", &ssh.prefix_start_slave_cmd);
    w.text_element("suffixStartSlaveCmd", &ssh.suffix_start_slave_cmd);
    for extra in &ssh.extra {
        extra.write(w);
    }
}

fn decode_jnlp(element: &RawElement) -> Result<JnlpLauncher> {
    let f = Fields::of(element)?;
    let work_dir_settings = match f.get("workDirSettings") {
        Some(settings) => {
            let s = Fields::of(settings)?;
            Some(WorkDirSettings {
                disabled: s.flag("disabled")?,
                internal_dir: s.text("internalDir")?,
                fail_if_work_dir_is_missing: s.flag("failIfWorkDirIsMissing")?,
            })
        }
        None => None,
    };
    let web_socket = f.flag("webSocket")?;
    Ok(JnlpLauncher {
        work_dir_settings,
        web_socket,
        attributes: other_attributes(element),
        extra: f.rest(JNLP_FIELDS),
    })
}

fn encode_jnlp(jnlp: &JnlpLauncher, w: &mut XmlWriter) {
    if let Some(settings) = &jnlp.work_dir_settings {
        w.open("workDirSettings", &[]);
        w.display_element("disabled", settings.disabled);
        w.text_element("internalDir", &settings.internal_dir);
        w.display_element("failIfWorkDirIsMissing", settings.fail_if_work_dir_is_missing);
        w.close("workDirSettings");
    }
    w.display_element("webSocket", jnlp.web_socket);
    for extra in &jnlp.extra {
        extra.write(w);
    }
}
