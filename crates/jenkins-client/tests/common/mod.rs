//! Shared fixtures for the wiremock-backed tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use jenkins_client::Jenkins;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CRUMB: &str = "c0ffee";

/// Route client logs to the test writer. `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A connection to `server` authenticated as `admin`.
pub fn jenkins(server: &MockServer) -> Jenkins {
    Jenkins::builder()
        .base_url(server.uri())
        .api_token("admin", "11aa22bb")
        .build()
        .unwrap()
}

/// Serve a crumb so POSTs go through.
pub async fn mount_crumb(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/crumbIssuer/api/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_class": "hudson.security.csrf.DefaultCrumbIssuer",
            "crumb": CRUMB,
            "crumbRequestField": "Jenkins-Crumb"
        })))
        .mount(server)
        .await;
}

/// A server that answers the crumb issuer with 404 and hangs up on every
/// other request after reading its headers. Returns the base URL and the
/// number of hang-ups so far.
pub async fn hang_up_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let hang_ups = Arc::new(AtomicUsize::new(0));
    let counter = hang_ups.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut head = Vec::new();
            let mut buf = [0u8; 4096];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                }
            }
            if head.starts_with(b"GET /crumbIssuer/") {
                let _ = socket
                    .write_all(b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                    .await;
            } else {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    });

    (url, hang_ups)
}

pub const AGENT_CONFIG: &str = r#"<?xml version="1.1" encoding="UTF-8"?>
<slave>
  <name>agent-1</name>
  <description>linux builder</description>
  <remoteFS>/home/jenkins</remoteFS>
  <numExecutors>2</numExecutors>
  <mode>NORMAL</mode>
  <retentionStrategy class="hudson.slaves.RetentionStrategy$Always"/>
  <launcher class="hudson.plugins.sshslaves.SSHLauncher" plugin="ssh-slaves@1.31.2">
    <host>build-01</host>
    <port>22</port>
    <credentialsId>ssh-key</credentialsId>
    <launchTimeoutSeconds>60</launchTimeoutSeconds>
    <maxNumRetries>10</maxNumRetries>
    <retryWaitTime>15</retryWaitTime>
    <sshHostKeyVerificationStrategy class="hudson.plugins.sshslaves.verifiers.KnownHostsFileKeyVerificationStrategy"/>
  </launcher>
  <label>linux</label>
  <nodeProperties>
    <hudson.slaves.EnvironmentVariablesNodeProperty>
      <envVars serialization="custom">
        <unserializable-parents/>
        <tree-map>
          <default><comparator class="java.lang.String$CaseInsensitiveComparator"/></default>
          <int>1</int>
          <string>JAVA_HOME</string>
          <string>/opt/jdk</string>
        </tree-map>
      </envVars>
    </hudson.slaves.EnvironmentVariablesNodeProperty>
    <org.example.RackProperty><rack>r12</rack></org.example.RackProperty>
  </nodeProperties>
  <userId>admin</userId>
</slave>"#;
