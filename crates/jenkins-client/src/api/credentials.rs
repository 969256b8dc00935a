//! Credentials stores.

use jenkins_xml::{Credential, XmlDocument};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{job_path, segment};
use crate::client::Jenkins;
use crate::error::Result;

/// Which store a [`CredentialsManager`] talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStore {
    /// The global (system) store.
    System,
    /// The store of a folder, by full name.
    Folder(String),
}

impl CredentialStore {
    fn root(&self) -> String {
        match self {
            CredentialStore::System => "/credentials/store/system".to_string(),
            CredentialStore::Folder(folder) => {
                format!("{}/credentials/store/folder", job_path(folder))
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CredentialIds {
    credentials: Vec<CredentialId>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CredentialId {
    id: String,
}

/// CRUD over the credentials of one store. Domains are addressed by name;
/// the global domain is `_`.
#[derive(Debug, Clone)]
pub struct CredentialsManager {
    jenkins: Jenkins,
    store: CredentialStore,
}

impl CredentialsManager {
    pub fn new(jenkins: &Jenkins, store: CredentialStore) -> Self {
        Self {
            jenkins: jenkins.clone(),
            store,
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    fn domain_path(&self, domain: &str) -> String {
        format!("{}/domain/{}", self.store.root(), segment(domain))
    }

    fn credential_path(&self, domain: &str, id: &str) -> String {
        format!("{}/credential/{}", self.domain_path(domain), segment(id))
    }

    /// Ids of every credential in `domain`.
    pub async fn list(&self, cancel: &CancellationToken, domain: &str) -> Result<Vec<String>> {
        let response = self
            .jenkins
            .requester()
            .get_json::<CredentialIds>(
                cancel,
                &self.domain_path(domain),
                &[("tree", "credentials[id]")],
            )
            .await
            .map_err(|e| e.or_not_found("credentials domain", domain))?;
        Ok(response
            .body
            .credentials
            .into_iter()
            .map(|c| c.id)
            .collect())
    }

    pub async fn get(&self, cancel: &CancellationToken, domain: &str, id: &str) -> Result<Credential> {
        let response = self
            .jenkins
            .requester()
            .get_xml::<Credential>(
                cancel,
                &format!("{}/config.xml", self.credential_path(domain, id)),
                &[],
            )
            .await
            .map_err(|e| e.or_not_found("credential", id))?;
        Ok(response.body)
    }

    /// Add a credential. An existing id yields [`Error::Conflict`](crate::Error::Conflict).
    pub async fn add(
        &self,
        cancel: &CancellationToken,
        domain: &str,
        credential: &Credential,
    ) -> Result<()> {
        self.jenkins
            .requester()
            .post_xml(
                cancel,
                &format!("{}/createCredentials", self.domain_path(domain)),
                &credential.to_xml(),
                &[],
            )
            .await
            .map_err(|e| e.or_not_found("credentials domain", domain))?;
        debug!(class = %credential.class(), domain, "Added credential");
        Ok(())
    }

    /// Replace credential `id` with `credential`.
    pub async fn update(
        &self,
        cancel: &CancellationToken,
        domain: &str,
        id: &str,
        credential: &Credential,
    ) -> Result<()> {
        self.jenkins
            .requester()
            .post_xml(
                cancel,
                &format!("{}/config.xml", self.credential_path(domain, id)),
                &credential.to_xml(),
                &[],
            )
            .await
            .map_err(|e| e.or_not_found("credential", id))?;
        Ok(())
    }

    pub async fn delete(&self, cancel: &CancellationToken, domain: &str, id: &str) -> Result<()> {
        self.jenkins
            .requester()
            .post_form(
                cancel,
                &format!("{}/doDelete", self.credential_path(domain, id)),
                &[],
                &[],
            )
            .await
            .map_err(|e| e.or_not_found("credential", id))?;
        Ok(())
    }
}

impl Jenkins {
    /// Manager for the system credentials store.
    pub fn credentials(&self) -> CredentialsManager {
        CredentialsManager::new(self, CredentialStore::System)
    }

    /// Manager for the credentials store of `folder` (full name).
    pub fn folder_credentials(&self, folder: &str) -> CredentialsManager {
        CredentialsManager::new(self, CredentialStore::Folder(folder.to_string()))
    }
}
