use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING};
use reqwest::Client;
use sha1::{Digest, Sha1};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

const USER_AGENT: &str = concat!("launchpad/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// SHA-1 validated downloader over a shared HTTP client.
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new() -> LauncherResult<Self> {
        // Checksums cover the stored bytes, so bodies must arrive unencoded.
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    /// Fetch a small text resource (checksum sidecars). `Ok(None)` on 404.
    pub async fn fetch_text(&self, url: &str) -> LauncherResult<Option<String>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(Some(response.text().await?))
    }

    /// Download a single file to `dest`, optionally validating SHA-1.
    ///
    /// The body is validated in memory and written to a `.part` file that is
    /// renamed into place, so a failed download never leaves a truncated
    /// artifact in the local repository.
    pub async fn download_file(
        &self,
        url: &str,
        dest: &Path,
        sha1_expected: Option<&str>,
    ) -> LauncherResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;

        if let Some(expected) = sha1_expected {
            let actual = sha1_hex(&bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(LauncherError::Sha1Mismatch {
                    path: dest.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        let mut partial = dest.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        {
            let mut file = tokio::fs::File::create(&partial)
                .await
                .map_err(|e| LauncherError::Io {
                    path: partial.clone(),
                    source: e,
                })?;
            file.write_all(&bytes).await.map_err(|e| LauncherError::Io {
                path: partial.clone(),
                source: e,
            })?;
            file.flush().await.map_err(|e| LauncherError::Io {
                path: partial.clone(),
                source: e,
            })?;
        }
        tokio::fs::rename(&partial, dest)
            .await
            .map_err(|e| LauncherError::Io {
                path: dest.to_path_buf(),
                source: e,
            })?;

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(())
    }
}

/// Lowercase hex SHA-1 of a buffer.
pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Maven `.sha1` sidecars sometimes carry the file name after the digest.
pub fn parse_sha1_sidecar(raw: &str) -> Option<String> {
    let digest = raw.split_whitespace().next()?.trim().to_ascii_lowercase();
    (digest.len() == 40 && digest.chars().all(|c| c.is_ascii_hexdigit())).then_some(digest)
}
