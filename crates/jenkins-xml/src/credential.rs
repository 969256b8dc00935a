//! Credential documents of the credentials store.
//!
//! The root element name of each document is the implementing class.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use crate::document::XmlDocument;
use crate::element::{Fields, RawElement, XmlWriter};
use crate::error::{Result, XmlError};

pub const USERNAME_PASSWORD_CLASS: &str =
    "com.cloudbees.plugins.credentials.impl.UsernamePasswordCredentialsImpl";
pub const SECRET_TEXT_CLASS: &str =
    "org.jenkinsci.plugins.plaincredentials.impl.StringCredentialsImpl";
pub const FILE_CLASS: &str = "org.jenkinsci.plugins.plaincredentials.impl.FileCredentialsImpl";
pub const SSH_PRIVATE_KEY_CLASS: &str =
    "com.cloudbees.jenkins.plugins.sshcredentials.impl.BasicSSHUserPrivateKey";
pub const DOCKER_SERVER_CLASS: &str =
    "org.jenkinsci.plugins.docker.commons.credentials.DockerServerCredentials";

pub const DIRECT_ENTRY_KEY_SOURCE: &str =
    "com.cloudbees.jenkins.plugins.sshcredentials.impl.BasicSSHUserPrivateKey$DirectEntryPrivateKeySource";
pub const FILE_ON_MASTER_KEY_SOURCE: &str =
    "com.cloudbees.jenkins.plugins.sshcredentials.impl.BasicSSHUserPrivateKey$FileOnMasterPrivateKeySource";

pub const GLOBAL_SCOPE: &str = "GLOBAL";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsernamePasswordCredential {
    pub id: String,
    pub scope: String,
    pub description: String,
    pub username: String,
    pub password: String,
}

impl UsernamePasswordCredential {
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            scope: GLOBAL_SCOPE.to_string(),
            description: String::new(),
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretTextCredential {
    pub id: String,
    pub scope: String,
    pub description: String,
    pub secret: String,
}

impl SecretTextCredential {
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope: GLOBAL_SCOPE.to_string(),
            description: String::new(),
            secret: secret.into(),
        }
    }
}

/// A secret file. `secret_bytes` holds the base64 of the file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCredential {
    pub id: String,
    pub scope: String,
    pub description: String,
    pub file_name: String,
    pub secret_bytes: String,
}

impl FileCredential {
    pub fn new(id: impl Into<String>, file_name: impl Into<String>, content: &[u8]) -> Self {
        Self {
            id: id.into(),
            scope: GLOBAL_SCOPE.to_string(),
            description: String::new(),
            file_name: file_name.into(),
            secret_bytes: STANDARD.encode(content),
        }
    }

    /// Decoded file content.
    pub fn content(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(self.secret_bytes.trim())
            .map_err(|_| XmlError::InvalidValue {
                field: "secretBytes".to_string(),
                value: self.secret_bytes.clone(),
            })
    }
}

/// Where an SSH credential's private key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivateKeySource {
    /// Key pasted into the credential.
    DirectEntry(String),
    /// Path of a key file on the controller.
    FileOnMaster(String),
    Raw { class: String, inner_xml: String },
}

impl PrivateKeySource {
    pub fn class(&self) -> &str {
        match self {
            PrivateKeySource::DirectEntry(_) => DIRECT_ENTRY_KEY_SOURCE,
            PrivateKeySource::FileOnMaster(_) => FILE_ON_MASTER_KEY_SOURCE,
            PrivateKeySource::Raw { class, .. } => class,
        }
    }

    fn from_element(element: &RawElement) -> Result<Self> {
        let class = element.class().unwrap_or_default();
        let f = Fields::of(element)?;
        Ok(match class {
            DIRECT_ENTRY_KEY_SOURCE => PrivateKeySource::DirectEntry(f.text("privateKey")?),
            FILE_ON_MASTER_KEY_SOURCE => PrivateKeySource::FileOnMaster(f.text("privateKeyFile")?),
            _ => PrivateKeySource::Raw {
                class: class.to_string(),
                inner_xml: element.inner_xml.clone(),
            },
        })
    }

    fn write(&self, w: &mut XmlWriter) {
        w.open("privateKeySource", &[("class", self.class())]);
        match self {
            PrivateKeySource::DirectEntry(key) => w.text_element("privateKey", key),
            PrivateKeySource::FileOnMaster(path) => w.text_element("privateKeyFile", path),
            PrivateKeySource::Raw { inner_xml, .. } => w.raw(inner_xml),
        }
        w.close("privateKeySource");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshPrivateKeyCredential {
    pub id: String,
    pub scope: String,
    pub description: String,
    pub username: String,
    pub private_key_source: PrivateKeySource,
    pub passphrase: String,
}

impl SshPrivateKeyCredential {
    pub fn new(
        id: impl Into<String>,
        username: impl Into<String>,
        private_key_source: PrivateKeySource,
    ) -> Self {
        Self {
            id: id.into(),
            scope: GLOBAL_SCOPE.to_string(),
            description: String::new(),
            username: username.into(),
            private_key_source,
            passphrase: String::new(),
        }
    }
}

/// Client certificate material for a Docker daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerServerCredential {
    pub id: String,
    pub scope: String,
    pub description: String,
    pub client_key: String,
    pub client_certificate: String,
    pub server_ca_certificate: String,
}

/// A credential, tagged by its root element name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    UsernamePassword(UsernamePasswordCredential),
    SecretText(SecretTextCredential),
    File(FileCredential),
    SshPrivateKey(SshPrivateKeyCredential),
    DockerServer(DockerServerCredential),
    Raw(RawElement),
}

impl Credential {
    pub fn class(&self) -> String {
        match self {
            Credential::UsernamePassword(_) => USERNAME_PASSWORD_CLASS.to_string(),
            Credential::SecretText(_) => SECRET_TEXT_CLASS.to_string(),
            Credential::File(_) => FILE_CLASS.to_string(),
            Credential::SshPrivateKey(_) => SSH_PRIVATE_KEY_CLASS.to_string(),
            Credential::DockerServer(_) => DOCKER_SERVER_CLASS.to_string(),
            Credential::Raw(raw) => raw.canonical_name().into_owned(),
        }
    }

    /// Credential id. For raw credentials this reads the `<id>` child.
    pub fn id(&self) -> Option<String> {
        match self {
            Credential::UsernamePassword(c) => Some(c.id.clone()),
            Credential::SecretText(c) => Some(c.id.clone()),
            Credential::File(c) => Some(c.id.clone()),
            Credential::SshPrivateKey(c) => Some(c.id.clone()),
            Credential::DockerServer(c) => Some(c.id.clone()),
            Credential::Raw(raw) => Fields::of(raw).ok()?.opt_text("id").ok()?,
        }
    }

    pub fn from_element(element: &RawElement) -> Result<Self> {
        let tag = element.canonical_name();
        let f = Fields::of(element)?;
        let scope = f
            .opt_text("scope")?
            .unwrap_or_else(|| GLOBAL_SCOPE.to_string());

        Ok(match tag.as_ref() {
            USERNAME_PASSWORD_CLASS => Credential::UsernamePassword(UsernamePasswordCredential {
                id: f.text("id")?,
                scope,
                description: f.text("description")?,
                username: f.text("username")?,
                password: f.text("password")?,
            }),
            SECRET_TEXT_CLASS => Credential::SecretText(SecretTextCredential {
                id: f.text("id")?,
                scope,
                description: f.text("description")?,
                secret: f.text("secret")?,
            }),
            FILE_CLASS => Credential::File(FileCredential {
                id: f.text("id")?,
                scope,
                description: f.text("description")?,
                file_name: f.text("fileName")?,
                secret_bytes: f.text("secretBytes")?,
            }),
            SSH_PRIVATE_KEY_CLASS => {
                let source = f.get("privateKeySource").ok_or_else(|| XmlError::InvalidValue {
                    field: "privateKeySource".to_string(),
                    value: String::new(),
                })?;
                Credential::SshPrivateKey(SshPrivateKeyCredential {
                    id: f.text("id")?,
                    scope,
                    description: f.text("description")?,
                    username: f.text("username")?,
                    private_key_source: PrivateKeySource::from_element(source)?,
                    passphrase: f.text("passphrase")?,
                })
            }
            DOCKER_SERVER_CLASS => Credential::DockerServer(DockerServerCredential {
                id: f.text("id")?,
                scope,
                description: f.text("description")?,
                client_key: f.text("clientKey")?,
                client_certificate: f.text("clientCertificate")?,
                server_ca_certificate: f.text("serverCaCertificate")?,
            }),
            _ => Credential::Raw(element.clone()),
        })
    }

    pub fn write(&self, w: &mut XmlWriter) {
        let class = self.class();
        match self {
            Credential::UsernamePassword(c) => {
                w.open(&class, &[]);
                common(w, &c.scope, &c.id, &c.description);
                w.text_element("username", &c.username);
                w.text_element("password", &c.password);
                w.close(&class);
            }
            Credential::SecretText(c) => {
                w.open(&class, &[]);
                common(w, &c.scope, &c.id, &c.description);
                w.text_element("secret", &c.secret);
                w.close(&class);
            }
            Credential::File(c) => {
                w.open(&class, &[]);
                common(w, &c.scope, &c.id, &c.description);
                w.text_element("fileName", &c.file_name);
                w.text_element("secretBytes", &c.secret_bytes);
                w.close(&class);
            }
            Credential::SshPrivateKey(c) => {
                w.open(&class, &[]);
                common(w, &c.scope, &c.id, &c.description);
                w.text_element("username", &c.username);
                c.private_key_source.write(w);
                w.text_element("passphrase", &c.passphrase);
                w.close(&class);
            }
            Credential::DockerServer(c) => {
                w.open(&class, &[]);
                common(w, &c.scope, &c.id, &c.description);
                w.text_element("clientKey", &c.client_key);
                w.text_element("clientCertificate", &c.client_certificate);
                w.text_element("serverCaCertificate", &c.server_ca_certificate);
                w.close(&class);
            }
            Credential::Raw(raw) => raw.write(w),
        }
    }
}

fn common(w: &mut XmlWriter, scope: &str, id: &str, description: &str) {
    w.text_element("scope", scope);
    w.text_element("id", id);
    w.text_element("description", description);
}

impl XmlDocument for Credential {
    fn from_xml(xml: &str) -> Result<Self> {
        Credential::from_element(&RawElement::parse(xml)?)
    }

    fn to_xml(&self) -> String {
        let mut w = XmlWriter::new();
        self.write(&mut w);
        w.finish()
    }
}

impl From<UsernamePasswordCredential> for Credential {
    fn from(c: UsernamePasswordCredential) -> Self {
        Credential::UsernamePassword(c)
    }
}

impl From<SecretTextCredential> for Credential {
    fn from(c: SecretTextCredential) -> Self {
        Credential::SecretText(c)
    }
}

impl From<FileCredential> for Credential {
    fn from(c: FileCredential) -> Self {
        Credential::File(c)
    }
}

impl From<SshPrivateKeyCredential> for Credential {
    fn from(c: SshPrivateKeyCredential) -> Self {
        Credential::SshPrivateKey(c)
    }
}

impl From<DockerServerCredential> for Credential {
    fn from(c: DockerServerCredential) -> Self {
        Credential::DockerServer(c)
    }
}
