//! File fingerprints (MD5) tracked by the server.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Pollable, segment};
use crate::client::Jenkins;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintOriginal {
    pub name: String,
    pub number: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintRange {
    pub start: i64,
    /// Exclusive.
    pub end: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintRanges {
    pub ranges: Vec<FingerprintRange>,
}

/// Builds of one job that used the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintUsage {
    pub name: String,
    pub ranges: FingerprintRanges,
}

impl FingerprintUsage {
    pub fn contains(&self, number: i64) -> bool {
        self.ranges
            .ranges
            .iter()
            .any(|r| r.start <= number && number < r.end)
    }
}

/// `GET /fingerprint/{md5}/api/json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FingerprintResponse {
    pub file_name: String,
    pub hash: String,
    pub original: Option<FingerprintOriginal>,
    pub timestamp: i64,
    pub usage: Vec<FingerprintUsage>,
}

#[derive(Debug, Clone)]
pub struct Fingerprint {
    jenkins: Jenkins,
    id: String,
    base: String,
    raw: FingerprintResponse,
}

impl Pollable for Fingerprint {
    type Raw = FingerprintResponse;

    fn jenkins(&self) -> &Jenkins {
        &self.jenkins
    }

    fn base(&self) -> &str {
        &self.base
    }

    fn set_raw(&mut self, raw: FingerprintResponse) {
        self.raw = raw;
    }
}

impl Fingerprint {
    /// Fingerprint of the file whose MD5 is `id` (lowercase hex).
    pub fn new(jenkins: &Jenkins, id: &str) -> Self {
        Self {
            jenkins: jenkins.clone(),
            id: id.to_string(),
            base: format!("/fingerprint/{}", segment(id)),
            raw: FingerprintResponse::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn info(&self) -> &FingerprintResponse {
        &self.raw
    }

    /// Whether the server knows this hash. Refreshes the snapshot.
    pub async fn is_valid(&mut self, cancel: &CancellationToken) -> Result<bool> {
        match self.poll(cancel).await {
            Ok(_) => {}
            Err(Error::NotFound(_)) => {
                info!(fingerprint = %self.id, "Fingerprint unknown to the server");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }
        Ok(self.raw.hash.eq_ignore_ascii_case(&self.id))
    }

    /// Whether the server recorded this hash for `file_name` as produced or
    /// used by build `number` of `job`.
    pub async fn validate_for_build(
        &mut self,
        cancel: &CancellationToken,
        file_name: &str,
        job: &str,
        number: i64,
    ) -> Result<bool> {
        if !self.is_valid(cancel).await? {
            return Ok(false);
        }
        if self.raw.file_name != file_name {
            return Ok(false);
        }
        Ok(self.matches_build(job, number))
    }

    fn matches_build(&self, job: &str, number: i64) -> bool {
        let original = self
            .raw
            .original
            .as_ref()
            .is_some_and(|o| o.name == job && o.number == number);
        original
            || self
                .raw
                .usage
                .iter()
                .any(|u| u.name == job && u.contains(number))
    }
}

impl Jenkins {
    pub async fn get_fingerprint(&self, cancel: &CancellationToken, id: &str) -> Result<Fingerprint> {
        let mut fingerprint = Fingerprint::new(self, id);
        fingerprint
            .poll(cancel)
            .await
            .map_err(|e| e.or_not_found("fingerprint", id))?;
        Ok(fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_build() {
        let jenkins = Jenkins::new("http://localhost:8080").unwrap();
        let mut fp = Fingerprint::new(&jenkins, "0cc175b9c0f1b6a831c399e269772661");
        assert_eq!(fp.base(), "/fingerprint/0cc175b9c0f1b6a831c399e269772661");
        fp.set_raw(
            serde_json::from_str(
                r#"{
                "fileName": "app.jar",
                "hash": "0cc175b9c0f1b6a831c399e269772661",
                "original": {"name": "team/demo", "number": 3},
                "usage": [{"name": "team/deploy", "ranges": {"ranges": [{"start": 10, "end": 12}]}}]
            }"#,
            )
            .unwrap(),
        );
        assert!(fp.matches_build("team/demo", 3));
        assert!(fp.matches_build("team/deploy", 11));
        assert!(!fp.matches_build("team/deploy", 12));
        assert!(!fp.matches_build("team/demo", 4));
    }
}
