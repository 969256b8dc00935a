//! Users of the built-in security realm.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Pollable, segment};
use crate::client::Jenkins;
use crate::error::Result;

/// `GET /user/{name}/api/json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserResponse {
    #[serde(rename = "_class")]
    pub class: String,
    pub absolute_url: String,
    pub description: Option<String>,
    pub full_name: String,
    pub id: String,
    pub property: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct User {
    jenkins: Jenkins,
    base: String,
    raw: UserResponse,
}

impl Pollable for User {
    type Raw = UserResponse;

    fn jenkins(&self) -> &Jenkins {
        &self.jenkins
    }

    fn base(&self) -> &str {
        &self.base
    }

    fn set_raw(&mut self, raw: UserResponse) {
        self.raw = raw;
    }
}

impl User {
    pub fn new(jenkins: &Jenkins, id: &str) -> Self {
        Self::from_raw(
            jenkins,
            UserResponse {
                id: id.to_string(),
                ..UserResponse::default()
            },
        )
    }

    fn from_raw(jenkins: &Jenkins, raw: UserResponse) -> Self {
        Self {
            jenkins: jenkins.clone(),
            base: format!("/user/{}", segment(&raw.id)),
            raw,
        }
    }

    pub fn id(&self) -> &str {
        &self.raw.id
    }

    pub fn full_name(&self) -> &str {
        &self.raw.full_name
    }

    pub fn description(&self) -> Option<&str> {
        self.raw.description.as_deref()
    }

    /// Address from the mailer property, when the plugin is installed.
    pub fn email(&self) -> Option<&str> {
        self.raw
            .property
            .iter()
            .find_map(|p| p.get("address").and_then(Value::as_str))
    }

    pub fn info(&self) -> &UserResponse {
        &self.raw
    }

    pub async fn delete(&self, cancel: &CancellationToken) -> Result<()> {
        self.jenkins.delete_user(cancel, &self.raw.id).await
    }
}

/// Users from a realm or people listing. Entries are either user objects
/// or `{"user": {...}}` wrappers.
fn users_from_listing(listing: &Value) -> Vec<UserResponse> {
    let entries = listing
        .get("users")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    entries
        .iter()
        .map(|entry| entry.get("user").unwrap_or(entry))
        .filter_map(|user| serde_json::from_value::<UserResponse>(user.clone()).ok())
        .filter(|user| !user.id.is_empty())
        .collect()
}

impl Jenkins {
    /// Create a user in the built-in realm. The returned user carries the
    /// submitted name; poll it to read the server's view.
    pub async fn create_user(
        &self,
        cancel: &CancellationToken,
        username: &str,
        password: &str,
        full_name: &str,
        email: &str,
    ) -> Result<User> {
        self.requester()
            .post_form(
                cancel,
                "/securityRealm/createAccountByAdmin",
                &[
                    ("username", username),
                    ("password1", password),
                    ("password2", password),
                    ("fullname", full_name),
                    ("email", email),
                ],
                &[],
            )
            .await?;
        info!(user = username, "Created user");
        let mut user = User::new(self, username);
        user.raw.full_name = full_name.to_string();
        Ok(user)
    }

    pub async fn delete_user(&self, cancel: &CancellationToken, username: &str) -> Result<()> {
        self.requester()
            .post_form(
                cancel,
                &format!("/securityRealm/user/{}/doDelete", segment(username)),
                &[("Submit", "Yes")],
                &[],
            )
            .await
            .map_err(|e| e.or_not_found("user", username))?;
        Ok(())
    }

    pub async fn get_user(&self, cancel: &CancellationToken, username: &str) -> Result<User> {
        let mut user = User::new(self, username);
        user.poll(cancel)
            .await
            .map_err(|e| e.or_not_found("user", username))?;
        Ok(user)
    }

    pub async fn get_all_users(&self, cancel: &CancellationToken) -> Result<Vec<User>> {
        let response = self
            .requester()
            .get_json::<Value>(cancel, "/securityRealm", &[("depth", "1")])
            .await?;
        Ok(users_from_listing(&response.body)
            .into_iter()
            .map(|raw| User::from_raw(self, raw))
            .collect())
    }
}
