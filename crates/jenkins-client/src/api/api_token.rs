//! API tokens of the authenticated user.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::Jenkins;
use crate::error::{Error, Result};

const API_TOKEN_PROPERTY: &str = "/me/descriptorByName/jenkins.security.ApiTokenProperty";

/// A token. `value` is only known right after generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiTokenData {
    #[serde(rename = "tokenName")]
    pub name: String,
    #[serde(rename = "tokenUuid")]
    pub uuid: String,
    #[serde(rename = "tokenValue")]
    pub value: String,
}

/// Reply of `generateNewToken`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiTokenResponse {
    pub status: String,
    pub data: ApiTokenData,
}

#[derive(Debug, Clone)]
pub struct ApiToken {
    jenkins: Jenkins,
    data: ApiTokenData,
}

impl ApiToken {
    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn uuid(&self) -> &str {
        &self.data.uuid
    }

    pub fn value(&self) -> &str {
        &self.data.value
    }

    pub async fn revoke(&self, cancel: &CancellationToken) -> Result<()> {
        self.jenkins.revoke_api_token(cancel, &self.data.uuid).await
    }
}

impl Jenkins {
    pub async fn generate_api_token(&self, cancel: &CancellationToken, name: &str) -> Result<ApiToken> {
        let response = self
            .requester()
            .post_form(
                cancel,
                &format!("{API_TOKEN_PROPERTY}/generateNewToken"),
                &[("newTokenName", name)],
                &[],
            )
            .await?;
        let body: ApiTokenResponse = response.json()?;
        if body.status != "ok" || body.data.uuid.is_empty() {
            return Err(Error::Protocol(format!(
                "token generation answered status '{}'",
                body.status
            )));
        }
        info!(token = name, "Generated API token");
        Ok(ApiToken {
            jenkins: self.clone(),
            data: body.data,
        })
    }

    /// Revoke one token. An unknown uuid surfaces as the server's 404.
    pub async fn revoke_api_token(&self, cancel: &CancellationToken, uuid: &str) -> Result<()> {
        self.requester()
            .post_form(
                cancel,
                &format!("{API_TOKEN_PROPERTY}/revoke"),
                &[("tokenUuid", uuid)],
                &[],
            )
            .await?;
        Ok(())
    }

    pub async fn revoke_all_api_tokens(&self, cancel: &CancellationToken) -> Result<()> {
        self.requester()
            .post_form(cancel, &format!("{API_TOKEN_PROPERTY}/revokeAll"), &[], &[])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_response_decodes() {
        let body: ApiTokenResponse = serde_json::from_str(
            r#"{"status": "ok", "data": {"tokenName": "ci", "tokenUuid": "abc", "tokenValue": "11aa"}}"#,
        )
        .unwrap();
        assert_eq!(body.data.name, "ci");
        assert_eq!(body.data.uuid, "abc");
        assert_eq!(body.data.value, "11aa");
    }
}
