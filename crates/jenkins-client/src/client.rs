//! Connection façade.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

use crate::error::{Error, Result};
use crate::requester::{Auth, Requester, redirect_policy};
use crate::types::ExecutorResponse;

/// Lifecycle of a [`Jenkins`] connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Created,
    Connecting,
    Ready,
    Closed,
}

/// A connection to one Jenkins server.
///
/// Cheap to clone; clones share the requester, cookie jar and crumb cache.
/// Entities obtained from it keep a clone.
///
/// # Example
///
/// ```no_run
/// use jenkins_client::{Jenkins, Result};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<()> {
/// let jenkins = Jenkins::builder()
///     .base_url("http://localhost:8080")
///     .api_token("admin", "11aa22bb")
///     .build()?;
///
/// let cancel = CancellationToken::new();
/// jenkins.connect(&cancel).await?;
/// println!("Jenkins {}", jenkins.version().unwrap_or_default());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Jenkins {
    inner: Arc<JenkinsInner>,
}

struct JenkinsInner {
    requester: Requester,
    base_url: Url,
    state: RwLock<ConnectionState>,
    version: RwLock<Option<String>>,
    raw: RwLock<ExecutorResponse>,
}

impl std::fmt::Debug for Jenkins {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Jenkins")
            .field("base_url", &self.inner.base_url.as_str())
            .field("state", &self.state())
            .finish()
    }
}

impl Jenkins {
    /// Create a new connection builder.
    pub fn builder() -> JenkinsBuilder {
        JenkinsBuilder::new()
    }

    /// Anonymous connection to `base_url` with default settings.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::builder().base_url(base_url).build()
    }

    /// Server root, always ending in `/`.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The shared request engine.
    pub fn requester(&self) -> &Requester {
        &self.inner.requester
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    /// Server version from the `X-Jenkins` header, once connected.
    pub fn version(&self) -> Option<String> {
        self.inner.version.read().clone()
    }

    /// Last root snapshot.
    pub fn info(&self) -> ExecutorResponse {
        self.inner.raw.read().clone()
    }

    /// Fetch the server version and root snapshot.
    ///
    /// A failure leaves a ready connection ready.
    pub async fn connect(&self, cancel: &CancellationToken) -> Result<()> {
        let previous = {
            let mut state = self.inner.state.write();
            if *state == ConnectionState::Closed {
                return Err(Error::Closed);
            }
            std::mem::replace(&mut *state, ConnectionState::Connecting)
        };

        let result = self.poll(cancel).await;

        let mut state = self.inner.state.write();
        if *state != ConnectionState::Connecting {
            return result.map(|_| ());
        }
        match result {
            Ok(_) => {
                *state = ConnectionState::Ready;
                info!(
                    url = %self.inner.base_url,
                    version = self.version().as_deref().unwrap_or("unknown"),
                    "Connected to Jenkins"
                );
                Ok(())
            }
            Err(e) => {
                *state = if previous == ConnectionState::Ready {
                    ConnectionState::Ready
                } else {
                    ConnectionState::Created
                };
                Err(e)
            }
        }
    }

    /// Refresh the root snapshot and version.
    pub async fn poll(&self, cancel: &CancellationToken) -> Result<u16> {
        let response = self
            .inner
            .requester
            .get_json::<ExecutorResponse>(cancel, "/", &[])
            .await?;
        if let Some(version) = response.header("X-Jenkins") {
            *self.inner.version.write() = Some(version.to_string());
        }
        *self.inner.raw.write() = response.body;
        Ok(response.status)
    }

    /// Dispose of the HTTP client and cookie jar.
    pub fn close(&self) {
        self.inner.requester.close();
        *self.inner.state.write() = ConnectionState::Closed;
        info!(url = %self.inner.base_url, "Connection closed");
    }

    /// Restart once running builds finish.
    pub async fn safe_restart(&self, cancel: &CancellationToken) -> Result<bool> {
        self.post_action(cancel, "/safeRestart").await
    }

    /// Stop scheduling new builds.
    pub async fn quiet_down(&self, cancel: &CancellationToken) -> Result<bool> {
        self.post_action(cancel, "/quietDown").await
    }

    pub async fn cancel_quiet_down(&self, cancel: &CancellationToken) -> Result<bool> {
        self.post_action(cancel, "/cancelQuietDown").await
    }

    /// POST with an empty form; true on 2xx.
    pub(crate) async fn post_action(&self, cancel: &CancellationToken, endpoint: &str) -> Result<bool> {
        let response = self
            .inner
            .requester
            .post_form(cancel, endpoint, &[], &[])
            .await?;
        Ok(response.is_success())
    }

    /// Entity path from an absolute URL the server handed back, relative to
    /// the server root and without a trailing slash.
    pub(crate) fn path_from_url(&self, url: &str) -> String {
        let path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => url.to_string(),
        };
        let root = self.inner.base_url.path().trim_end_matches('/');
        let path = path.strip_prefix(root).unwrap_or(&path);
        let path = path.trim_end_matches('/');
        if path.starts_with('/') || path.is_empty() {
            path.to_string()
        } else {
            format!("/{path}")
        }
    }
}

/// Builder for creating a [`Jenkins`] connection.
#[derive(Debug)]
pub struct JenkinsBuilder {
    base_url: Option<String>,
    auth: Option<Auth>,
    ssl_verify: bool,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    headers: Vec<(String, String)>,
}

impl JenkinsBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            auth: None,
            ssl_verify: true,
            timeout: None,
            user_agent: None,
            headers: Vec::new(),
        }
    }

    /// Set the server root URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Authenticate with a username and password.
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(Auth::Password {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Authenticate with a username and API token.
    pub fn api_token(mut self, username: impl Into<String>, token: impl Into<String>) -> Self {
        self.auth = Some(Auth::ApiToken {
            username: username.into(),
            token: token.into(),
        });
        self
    }

    /// Verify TLS certificates (default `true`).
    pub fn ssl_verify(mut self, verify: bool) -> Self {
        self.ssl_verify = verify;
        self
    }

    /// Per-request timeout. `None` (the default) applies no deadline.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Add a header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Build the connection. No request is made until [`Jenkins::connect`].
    pub fn build(self) -> Result<Jenkins> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        // Parse and normalize base URL
        let mut base_url = Url::parse(&base_url)?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "unsupported URL scheme '{}'",
                base_url.scheme()
            )));
        }
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::Config(format!("Invalid header name '{name}'")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| Error::Config(format!("Invalid value for header '{name}'")))?;
            headers.insert(name, value);
        }

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("jenkins-client/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .cookie_store(true)
            .redirect(redirect_policy())
            .danger_accept_invalid_certs(!self.ssl_verify)
            .build()?;

        Ok(Jenkins {
            inner: Arc::new(JenkinsInner {
                requester: Requester::new(&base_url, self.auth, self.timeout, http),
                base_url,
                state: RwLock::new(ConnectionState::Created),
                version: RwLock::new(None),
                raw: RwLock::new(ExecutorResponse::default()),
            }),
        })
    }
}

impl Default for JenkinsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
