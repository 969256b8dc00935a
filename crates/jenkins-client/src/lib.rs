//! Async client for the Jenkins REST API.
//!
//! A [`Jenkins`] connection owns one [`Requester`]: the authenticated HTTP
//! session with its cookie jar and CSRF crumb cache. Entities (jobs,
//! builds, nodes, views, queue items, ...) are obtained from the
//! connection, keep a clone of it, and refresh their JSON snapshot through
//! [`Pollable::poll`]. Configuration documents (agent `config.xml`,
//! credentials) go through the [`jenkins_xml`] codec.
//!
//! Every network call takes a [`CancellationToken`](tokio_util::sync::CancellationToken).
//!
//! # Example
//!
//! ```no_run
//! use jenkins_client::{Jenkins, Result, TaskState};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<()> {
//! let jenkins = Jenkins::builder()
//!     .base_url("http://localhost:8080")
//!     .api_token("admin", "11aa22bb")
//!     .build()?;
//! let cancel = CancellationToken::new();
//! jenkins.connect(&cancel).await?;
//!
//! // Trigger a parameterised build and wait for it to leave the queue
//! let queue_id = jenkins
//!     .build_job(&cancel, "team/demo", &[("BRANCH", "main")])
//!     .await?;
//! let mut task = jenkins.get_task(&cancel, queue_id).await?;
//! if let TaskState::Executable { number } =
//!     task.wait_for_build(&cancel, Duration::from_secs(1), 30).await?
//! {
//!     let build = jenkins.get_build(&cancel, "team/demo", number).await?;
//!     println!("{}", build.console_output(&cancel).await?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # API Coverage
//!
//! - **Jobs and folders**: create, configure, copy, rename, trigger, delete
//! - **Builds**: results, causes, parameters, console, tests, artifacts
//! - **Queue**: items, cancellation, queue id to build resolution
//! - **Nodes**: status, online/offline, launcher and property config, creation
//! - **Views, labels, plugins, users, API tokens, credentials**
//! - **Pipelines**: runs, stages, logs and input steps through `wfapi`
//! - **Fingerprints**: artifact validation
//! - **Kubernetes clouds**: add/remove through the script console

pub mod api;
pub mod client;
pub mod config;
pub mod crumb;
pub mod error;
pub mod requester;
mod retry;
pub mod types;

pub use api::*;
pub use client::{ConnectionState, Jenkins, JenkinsBuilder};
pub use config::JenkinsConfig;
pub use crumb::{Crumb, CrumbState};
pub use error::{Error, ErrorKind, Result};
pub use requester::{ApiResponse, Auth, Requester};
pub use types::*;

pub use jenkins_xml;
