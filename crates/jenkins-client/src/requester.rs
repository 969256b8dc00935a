//! The request/response engine every entity sits on.
//!
//! A [`Requester`] owns the server root, the credentials, the crumb cache
//! and the HTTP client (with its cookie jar). Each verb takes a
//! cancellation token, an endpoint path relative to the server root and an
//! optional query, and returns an [`ApiResponse`] carrying the status,
//! headers and decoded body.
//!
//! Status policy: 2xx and 3xx are returned to the caller; 4xx and 5xx
//! become [`Error`]s with the status preserved. GET and HEAD are retried
//! once after a transient transport failure. State-changing requests carry
//! the CSRF crumb and are retried once, after re-acquiring it, when the
//! server rejects the crumb.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, LOCATION};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use jenkins_xml::XmlDocument;

use crate::crumb::{Crumb, CrumbCache, CrumbState, is_crumb_mismatch};
use crate::error::{Error, Result};
use crate::retry::{IDEMPOTENT_RETRIES, RETRY_BACKOFF, with_retry};

const CRUMB_ISSUER: &str = "/crumbIssuer/api/json";
const MAX_REDIRECTS: usize = 10;
const JSON: &str = "application/json";
const XML: &str = "application/xml";

/// Credentials sent as HTTP Basic auth on every request.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    Password { username: String, password: String },
    ApiToken { username: String, token: String },
}

impl Auth {
    pub fn username(&self) -> &str {
        match self {
            Auth::Password { username, .. } | Auth::ApiToken { username, .. } => username,
        }
    }

    fn secret(&self) -> &str {
        match self {
            Auth::Password { password, .. } => password,
            Auth::ApiToken { token, .. } => token,
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Auth::Password { .. } => "Password",
            Auth::ApiToken { .. } => "ApiToken",
        };
        f.debug_struct(kind)
            .field("username", &self.username())
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Response metadata plus a decoded body.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub headers: HeaderMap,
    /// Final URL, after any redirects.
    pub url: Url,
    pub body: T,
}

impl<T> ApiResponse<T> {
    /// A header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            status: self.status,
            headers: self.headers,
            url: self.url,
            body: f(self.body),
        }
    }
}

impl ApiResponse<Bytes> {
    /// Body as text, lossy on invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body as JSON. An empty body decodes as `null`.
    pub fn json<U: DeserializeOwned>(&self) -> Result<U> {
        let body: &[u8] = if self.body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &self.body
        };
        Ok(serde_json::from_slice(body)?)
    }

    pub fn xml<U: XmlDocument>(&self) -> Result<U> {
        Ok(U::from_xml(&self.text())?)
    }

    pub(crate) fn into_json<U: DeserializeOwned>(self) -> Result<ApiResponse<U>> {
        let body = self.json()?;
        Ok(self.map(|_| body))
    }
}

/// A file read into memory for a multipart upload.
#[derive(Debug, Clone)]
struct FilePart {
    file_name: String,
    mime: String,
    data: Bytes,
}

impl FilePart {
    async fn read(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Config(format!("not a file path: {}", path.display())))?;
        let mime = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self {
            file_name,
            mime,
            data: Bytes::from(data),
        })
    }
}

/// Request body of a state-changing call. Kept around so the request can
/// be rebuilt after a crumb rejection.
enum Payload<'a> {
    Form(&'a [(&'a str, &'a str)]),
    Json(Vec<u8>),
    Xml(&'a str),
    Multipart {
        form: &'a [(&'a str, &'a str)],
        files: Vec<FilePart>,
    },
}

impl Payload<'_> {
    fn attach(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self {
            Payload::Form(form) => req.form(form),
            Payload::Json(body) => req.header(CONTENT_TYPE, JSON).body(body.clone()),
            Payload::Xml(xml) => req.header(CONTENT_TYPE, XML).body(xml.to_string()),
            Payload::Multipart { form, files } => {
                let mut multipart = Form::new();
                for (key, value) in form.iter() {
                    multipart = multipart.text(key.to_string(), value.to_string());
                }
                for file in files {
                    let part = Part::bytes(file.data.to_vec())
                        .file_name(file.file_name.clone())
                        .mime_str(&file.mime)?;
                    multipart = multipart.part("file", part);
                }
                req.multipart(multipart)
            }
        })
    }
}

/// The HTTP engine shared by a connection and all of its entities.
///
/// Safe to use from many tasks at once: the HTTP client and cookie jar are
/// shared and the crumb cache is behind a mutex.
pub struct Requester {
    root: String,
    auth: Option<Auth>,
    timeout: Option<Duration>,
    http: RwLock<Option<reqwest::Client>>,
    crumbs: CrumbCache,
}

impl fmt::Debug for Requester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requester")
            .field("root", &self.root)
            .field("auth", &self.auth)
            .field("timeout", &self.timeout)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Requester {
    pub(crate) fn new(
        root: &Url,
        auth: Option<Auth>,
        timeout: Option<Duration>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            root: root.as_str().trim_end_matches('/').to_string(),
            auth,
            timeout,
            http: RwLock::new(Some(http)),
            crumbs: CrumbCache::default(),
        }
    }

    /// Server root without a trailing slash.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn crumb_state(&self) -> CrumbState {
        self.crumbs.state()
    }

    pub fn is_closed(&self) -> bool {
        self.http.read().is_none()
    }

    /// Drop the HTTP client and its cookie jar. Later calls fail with
    /// [`Error::Closed`].
    pub(crate) fn close(&self) {
        self.http.write().take();
    }

    /// Root + endpoint + query. An empty query adds no `?`.
    pub fn url(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            Url::parse(endpoint)?
        } else if endpoint.starts_with('/') {
            Url::parse(&format!("{}{}", self.root, endpoint))?
        } else {
            Url::parse(&format!("{}/{}", self.root, endpoint))?
        };
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read verbs
    // ─────────────────────────────────────────────────────────────────────────

    /// GET `endpoint` as JSON. `/api/json` is appended unless the path is
    /// already an API path.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse<T>> {
        let endpoint = json_endpoint(endpoint);
        self.read(cancel, Method::GET, &endpoint, query, Some(JSON))
            .await?
            .into_json()
    }

    /// GET `endpoint` and decode the body as an XML document.
    pub async fn get_xml<T: XmlDocument>(
        &self,
        cancel: &CancellationToken,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse<T>> {
        let response = self.read(cancel, Method::GET, endpoint, query, Some(XML)).await?;
        let body = response.xml()?;
        Ok(response.map(|_| body))
    }

    /// GET `endpoint` and return the body bytes untouched.
    pub async fn get_raw(
        &self,
        cancel: &CancellationToken,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse<Bytes>> {
        self.read(cancel, Method::GET, endpoint, query, None).await
    }

    /// GET `endpoint` as text.
    pub async fn get_text(
        &self,
        cancel: &CancellationToken,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse<String>> {
        let response = self.get_raw(cancel, endpoint, query).await?;
        let text = response.text();
        Ok(response.map(|_| text))
    }

    pub async fn head(
        &self,
        cancel: &CancellationToken,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse<()>> {
        Ok(self
            .read(cancel, Method::HEAD, endpoint, query, None)
            .await?
            .map(|_| ()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // State-changing verbs
    // ─────────────────────────────────────────────────────────────────────────

    /// POST an `application/x-www-form-urlencoded` body.
    pub async fn post_form(
        &self,
        cancel: &CancellationToken,
        endpoint: &str,
        form: &[(&str, &str)],
        query: &[(&str, &str)],
    ) -> Result<ApiResponse<Bytes>> {
        self.post(cancel, endpoint, query, Payload::Form(form)).await
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<B, T>(
        &self,
        cancel: &CancellationToken,
        endpoint: &str,
        body: &B,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_vec(body)?;
        self.post(cancel, endpoint, query, Payload::Json(body))
            .await?
            .into_json()
    }

    /// POST an `application/xml` body.
    pub async fn post_xml(
        &self,
        cancel: &CancellationToken,
        endpoint: &str,
        xml: &str,
        query: &[(&str, &str)],
    ) -> Result<ApiResponse<Bytes>> {
        self.post(cancel, endpoint, query, Payload::Xml(xml)).await
    }

    /// POST `multipart/form-data`: the form fields first, then one `file`
    /// part per path, named by its basename.
    pub async fn post_files(
        &self,
        cancel: &CancellationToken,
        endpoint: &str,
        form: &[(&str, &str)],
        query: &[(&str, &str)],
        files: &[PathBuf],
    ) -> Result<ApiResponse<Bytes>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut parts = Vec::with_capacity(files.len());
        for path in files {
            parts.push(FilePart::read(path).await?);
        }
        self.post(
            cancel,
            endpoint,
            query,
            Payload::Multipart { form, files: parts },
        )
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        let http = self.http.read().clone().ok_or(Error::Closed)?;
        let mut req = http.request(method, url);
        if let Some(auth) = &self.auth {
            req = req.basic_auth(auth.username(), Some(auth.secret()));
        }
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        Ok(req)
    }

    async fn dispatch(&self, cancel: &CancellationToken, req: RequestBuilder) -> Result<Response> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        cancellable(cancel, req.send()).await
    }

    async fn read(
        &self,
        cancel: &CancellationToken,
        method: Method,
        endpoint: &str,
        query: &[(&str, &str)],
        accept: Option<&'static str>,
    ) -> Result<ApiResponse<Bytes>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let url = self.url(endpoint, query)?;
        let response = with_retry(IDEMPOTENT_RETRIES, RETRY_BACKOFF, cancel, || {
            let req = self.request(method.clone(), url.clone());
            async move {
                let mut req = req?;
                if let Some(accept) = accept {
                    req = req.header(ACCEPT, accept);
                }
                self.dispatch(cancel, req).await
            }
        })
        .await?;
        complete(cancel, &method, response).await
    }

    async fn post(
        &self,
        cancel: &CancellationToken,
        endpoint: &str,
        query: &[(&str, &str)],
        payload: Payload<'_>,
    ) -> Result<ApiResponse<Bytes>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let url = self.url(endpoint, query)?;

        let crumb = self.crumb(cancel).await?;
        let response = self.send_post(cancel, &url, &payload, crumb.as_ref()).await?;
        if response.status() != StatusCode::FORBIDDEN {
            return complete(cancel, &Method::POST, response).await;
        }

        let body = cancellable(cancel, response.bytes()).await?;
        if !is_crumb_mismatch(&body) {
            return Err(Error::Authorization(summary(&body, StatusCode::FORBIDDEN)));
        }

        warn!(endpoint, "Crumb rejected, re-acquiring");
        self.crumbs.invalidate();
        let crumb = self.crumb(cancel).await?;
        let response = self.send_post(cancel, &url, &payload, crumb.as_ref()).await?;
        if response.status() == StatusCode::FORBIDDEN {
            let body = cancellable(cancel, response.bytes()).await?;
            return Err(Error::Authentication {
                status: 403,
                message: summary(&body, StatusCode::FORBIDDEN),
            });
        }
        complete(cancel, &Method::POST, response).await
    }

    async fn send_post(
        &self,
        cancel: &CancellationToken,
        url: &Url,
        payload: &Payload<'_>,
        crumb: Option<&Crumb>,
    ) -> Result<Response> {
        let mut req = self.request(Method::POST, url.clone())?;
        if let Some(crumb) = crumb {
            req = req.header(crumb.field.as_str(), crumb.value.as_str());
        }
        let req = payload.attach(req)?;
        self.dispatch(cancel, req).await
    }

    /// The cached crumb, fetching one if needed. `None` when the server has
    /// no crumb issuer.
    async fn crumb(&self, cancel: &CancellationToken) -> Result<Option<Crumb>> {
        if let Some(crumb) = self.crumbs.current() {
            return Ok(Some(crumb));
        }
        match self
            .read(cancel, Method::GET, CRUMB_ISSUER, &[], Some(JSON))
            .await
        {
            Ok(response) => {
                let crumb: Crumb = response.json()?;
                debug!(field = %crumb.field, "Acquired crumb");
                self.crumbs.store(crumb.clone());
                Ok(Some(crumb))
            }
            Err(Error::NotFound(_)) => {
                debug!("Crumb issuer not available, continuing without crumb");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Race `fut` against the token.
async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = reqwest::Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result.map_err(Error::from),
    }
}

async fn complete(
    cancel: &CancellationToken,
    method: &Method,
    response: Response,
) -> Result<ApiResponse<Bytes>> {
    let status = response.status();
    let headers = response.headers().clone();
    let url = response.url().clone();
    debug!(%method, %url, status = status.as_u16(), "Request completed");

    let body = cancellable(cancel, response.bytes()).await?;
    check_status(method, status, &url, &body)?;
    Ok(ApiResponse {
        status: status.as_u16(),
        headers,
        url,
        body,
    })
}

fn check_status(method: &Method, status: StatusCode, url: &Url, body: &[u8]) -> Result<()> {
    if status.is_success() || status.is_redirection() {
        return Ok(());
    }
    let message = summary(body, status);
    Err(match status.as_u16() {
        401 => Error::Authentication {
            status: 401,
            message,
        },
        403 => Error::Authorization(message),
        404 if *method == Method::GET || *method == Method::HEAD => {
            Error::NotFound(url.path().to_string())
        }
        409 => Error::Conflict(message),
        code => Error::Server {
            status: code,
            message,
            body: serde_json::from_slice(body).ok(),
        },
    })
}

/// Short description of an error body. HTML pages collapse to the reason
/// phrase.
fn summary(body: &[u8], status: StatusCode) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() || text.starts_with('<') {
        return status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    }
    text.chars().take(200).collect()
}

/// Append `/api/json` unless the path already addresses an API.
fn json_endpoint(endpoint: &str) -> String {
    let (path, query) = match endpoint.find('?') {
        Some(i) => endpoint.split_at(i),
        None => (endpoint, ""),
    };
    if path.contains("/api/") || path.ends_with("/api") || path.contains("/wfapi") {
        return endpoint.to_string();
    }
    format!("{}/api/json{}", path.trim_end_matches('/'), query)
}

fn is_build_trigger(path: &str) -> bool {
    let path = path.trim_end_matches('/');
    path.ends_with("/build") || path.ends_with("/buildWithParameters")
}

/// Follow up to ten redirects, but never for build triggers: the caller
/// needs their `Location` header.
pub(crate) fn redirect_policy() -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(|attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        let trigger = attempt
            .previous()
            .first()
            .is_some_and(|url| is_build_trigger(url.path()));
        if trigger {
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requester(root: &str) -> Requester {
        Requester::new(
            &Url::parse(root).unwrap(),
            None,
            None,
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_json_endpoint() {
        assert_eq!(json_endpoint("/job/demo"), "/job/demo/api/json");
        assert_eq!(json_endpoint("/job/demo/"), "/job/demo/api/json");
        assert_eq!(json_endpoint(""), "/api/json");
        assert_eq!(json_endpoint("/"), "/api/json");
        assert_eq!(json_endpoint("/queue/api/json"), "/queue/api/json");
        assert_eq!(json_endpoint("/job/demo/wfapi/runs"), "/job/demo/wfapi/runs");
        assert_eq!(
            json_endpoint("/computer?tree=computer[displayName]"),
            "/computer/api/json?tree=computer[displayName]"
        );
    }

    #[test]
    fn test_url_assembly() {
        let r = requester("http://localhost:8080/jenkins/");
        assert_eq!(r.root(), "http://localhost:8080/jenkins");
        assert_eq!(
            r.url("/job/demo", &[]).unwrap().as_str(),
            "http://localhost:8080/jenkins/job/demo"
        );
        assert_eq!(
            r.url("job/demo", &[("depth", "1")]).unwrap().as_str(),
            "http://localhost:8080/jenkins/job/demo?depth=1"
        );
        assert_eq!(
            r.url("/createItem", &[("name", "a b&c")]).unwrap().as_str(),
            "http://localhost:8080/jenkins/createItem?name=a+b%26c"
        );
    }

    #[test]
    fn test_build_trigger_paths() {
        assert!(is_build_trigger("/job/demo/build"));
        assert!(is_build_trigger("/job/f/job/demo/buildWithParameters/"));
        assert!(!is_build_trigger("/job/build-tools/doDelete"));
        assert!(!is_build_trigger("/job/demo/builds"));
    }

    #[test]
    fn test_status_policy() {
        let url = Url::parse("http://h/job/x/api/json").unwrap();
        assert!(check_status(&Method::GET, StatusCode::OK, &url, b"").is_ok());
        assert!(check_status(&Method::POST, StatusCode::FOUND, &url, b"").is_ok());

        let err = check_status(&Method::GET, StatusCode::NOT_FOUND, &url, b"").unwrap_err();
        assert!(err.is_not_found());

        let err = check_status(&Method::POST, StatusCode::NOT_FOUND, &url, b"").unwrap_err();
        assert!(matches!(err, Error::Server { status: 404, .. }));

        let err = check_status(&Method::POST, StatusCode::CONFLICT, &url, b"exists").unwrap_err();
        assert!(err.is_conflict());

        let err = check_status(
            &Method::GET,
            StatusCode::INTERNAL_SERVER_ERROR,
            &url,
            br#"{"message":"boom"}"#,
        )
        .unwrap_err();
        let Error::Server { status, body, .. } = err else {
            panic!("expected server error");
        };
        assert_eq!(status, 500);
        assert_eq!(body.unwrap()["message"], "boom");
    }

    #[test]
    fn test_summary_hides_html() {
        assert_eq!(
            summary(b"<html>oops</html>", StatusCode::BAD_GATEWAY),
            "Bad Gateway"
        );
        assert_eq!(summary(b" plain text ", StatusCode::BAD_GATEWAY), "plain text");
    }

    #[test]
    fn test_empty_body_is_json_null() {
        let response = ApiResponse {
            status: 200,
            headers: HeaderMap::new(),
            url: Url::parse("http://h/").unwrap(),
            body: Bytes::new(),
        };
        let value: Option<serde_json::Value> = response.json().unwrap();
        assert!(value.is_none());
        let _: () = response.json().unwrap();
    }

    #[test]
    fn test_auth_debug_redacts_secret() {
        let auth = Auth::ApiToken {
            username: "admin".into(),
            token: "11aa".into(),
        };
        let printed = format!("{auth:?}");
        assert!(printed.contains("admin"));
        assert!(!printed.contains("11aa"));
    }

    #[tokio::test]
    async fn test_closed_requester_fails() {
        let r = requester("http://localhost:1");
        r.close();
        assert!(r.is_closed());
        let err = r
            .get_raw(&CancellationToken::new(), "/", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Closed));
    }
}
