//! Build artifacts.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use md5::{Digest, Md5};
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::fingerprint::Fingerprint;
use crate::client::Jenkins;
use crate::error::{Error, Result};

/// Files are hashed in slices of this size.
const HASH_CHUNK: usize = 1 << 20;

/// A file archived by a build.
#[derive(Debug, Clone)]
pub struct Artifact {
    jenkins: Jenkins,
    path: String,
    file_name: String,
    job: String,
    build: i64,
}

impl Artifact {
    pub(crate) fn new(
        jenkins: Jenkins,
        path: String,
        file_name: String,
        job: String,
        build: i64,
    ) -> Self {
        Self {
            jenkins,
            path,
            file_name,
            job,
            build,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Download path, relative to the server root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub async fn data(&self, cancel: &CancellationToken) -> Result<Bytes> {
        let response = self
            .jenkins
            .requester()
            .get_raw(cancel, &self.path, &[])
            .await
            .map_err(|e| e.or_not_found("artifact", &self.file_name))?;
        Ok(response.body)
    }

    /// Download to `path`, overwriting, then check the local MD5 against
    /// the server fingerprint. Returns whether the check passed.
    pub async fn save(&self, cancel: &CancellationToken, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        info!(artifact = %self.path, to = %path.display(), "Saving artifact");
        let data = self.data(cancel).await?;
        if tokio::fs::try_exists(path).await? {
            warn!(path = %path.display(), "Local copy exists, overwriting");
        }
        tokio::fs::write(path, &data).await?;
        self.validate_download(cancel, path).await
    }

    /// Download into `dir` under the artifact's own file name.
    pub async fn save_to_dir(
        &self,
        cancel: &CancellationToken,
        dir: impl AsRef<Path>,
    ) -> Result<(PathBuf, bool)> {
        let dir = dir.as_ref();
        if !tokio::fs::metadata(dir).await?.is_dir() {
            return Err(Error::Config(format!("{} is not a directory", dir.display())));
        }
        let target = dir.join(&self.file_name);
        let valid = self.save(cancel, &target).await?;
        Ok((target, valid))
    }

    async fn validate_download(&self, cancel: &CancellationToken, path: &Path) -> Result<bool> {
        let hash = local_md5(path).await?;
        let mut fingerprint = Fingerprint::new(&self.jenkins, &hash);
        let valid = fingerprint
            .validate_for_build(cancel, &self.file_name, &self.job, self.build)
            .await?;
        if !valid {
            warn!(artifact = %self.file_name, %hash, "Downloaded artifact failed fingerprint check");
        }
        Ok(valid)
    }
}

/// Lowercase hex MD5 of a local file.
pub(crate) async fn local_md5(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; HASH_CHUNK];
    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
