//! Connection settings that can be deserialized or read from the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{Jenkins, JenkinsBuilder};
use crate::error::{Error, Result};

/// Serializable connection settings.
///
/// A token takes precedence over a password when both are set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JenkinsConfig {
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub ssl_verify: bool,
    pub timeout_secs: Option<u64>,
}

impl Default for JenkinsConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            username: None,
            password: None,
            token: None,
            ssl_verify: true,
            timeout_secs: None,
        }
    }
}

impl JenkinsConfig {
    /// Read `JENKINS_URL`, `JENKINS_USER`, `JENKINS_PASSWORD`,
    /// `JENKINS_API_TOKEN` and `JENKINS_SSL_VERIFY`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let server = lookup("JENKINS_URL")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::Config("JENKINS_URL is not set".to_string()))?;

        let ssl_verify = match lookup("JENKINS_SSL_VERIFY") {
            None => true,
            Some(value) => parse_bool(&value).ok_or_else(|| {
                Error::Config(format!("JENKINS_SSL_VERIFY: expected a boolean, got '{value}'"))
            })?,
        };

        Ok(Self {
            server,
            username: lookup("JENKINS_USER"),
            password: lookup("JENKINS_PASSWORD"),
            token: lookup("JENKINS_API_TOKEN"),
            ssl_verify,
            timeout_secs: None,
        })
    }

    /// A builder preloaded with these settings.
    pub fn builder(&self) -> JenkinsBuilder {
        let mut builder = Jenkins::builder()
            .base_url(self.server.clone())
            .ssl_verify(self.ssl_verify)
            .timeout(self.timeout_secs.map(Duration::from_secs));

        if let Some(username) = &self.username {
            if let Some(token) = &self.token {
                builder = builder.api_token(username.clone(), token.clone());
            } else if let Some(password) = &self.password {
                builder = builder.basic_auth(username.clone(), password.clone());
            }
        }
        builder
    }

    pub fn build(&self) -> Result<Jenkins> {
        self.builder().build()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
