use crate::api::ReleaseApi;
use crate::config::Config;
use crate::error::{GovmError, Result};
use crate::models::GoVersion;
use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

pub fn http_client() -> Result<Client> {
    Ok(Client::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .connect_timeout(Duration::from_secs(30))
        .build()?)
}

/// Send a request, giving up if no response arrives within `secs`.
pub async fn send_with_timeout(request: RequestBuilder, url: &str, secs: u64) -> Result<Response> {
    match tokio::time::timeout(Duration::from_secs(secs), request.send()).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(GovmError::DownloadFailed {
            url: url.to_string(),
            source: e,
        }),
        Err(_) => Err(GovmError::Timeout {
            url: url.to_string(),
            secs,
        }),
    }
}

/// Fetches a release archive into the cache
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_archive(&self, version: &GoVersion, dest: &Path) -> Result<()>;
}

pub struct Downloader {
    client: Client,
    api: ReleaseApi,
    base_url: String,
    timeout_secs: u64,
    verify_checksums: bool,
}

impl Downloader {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            api: ReleaseApi::new(config)?,
            base_url: config.download_base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.request_timeout_secs,
            verify_checksums: config.verify_checksums,
        })
    }

    pub fn archive_url(&self, filename: &str) -> String {
        format!("{}/{}", self.base_url, filename)
    }

    /// Download `url` to `dest` with progress indication.
    ///
    /// The body is written to `dest.part` and only renamed once complete, so a
    /// failed transfer never leaves a file under the final name.
    pub async fn download_with_progress(&self, url: &str, dest: &Path, label: &str) -> Result<u64> {
        let response = send_with_timeout(self.client.get(url), url, self.timeout_secs).await?;

        if response.status() != StatusCode::OK {
            tracing::debug!("GET {} returned {}", url, response.status());
            return Err(GovmError::NotFound(label.to_string()));
        }

        let part = part_path(dest);
        match write_body(response, url, &part, label).await {
            Ok(written) => {
                tokio::fs::rename(&part, dest).await?;
                Ok(written)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&part).await {
                    tracing::warn!("Could not remove {}: {}", part.display(), cleanup);
                }
                Err(e)
            }
        }
    }

    async fn verify_published_checksum(&self, filename: &str, path: &Path) -> Result<()> {
        match self.api.archive_checksum(filename).await {
            Ok(Some(expected)) => {
                if !Self::verify_checksum(path, &expected).await? {
                    tokio::fs::remove_file(path).await?;
                    return Err(GovmError::ChecksumMismatch {
                        file: path.display().to_string(),
                    });
                }
                tracing::debug!("Checksum verified for {}", filename);
            }
            Ok(None) => tracing::warn!("No published checksum for {}", filename),
            Err(e) => tracing::warn!("Skipping checksum verification for {}: {}", filename, e),
        }
        Ok(())
    }

    /// Verify file checksum
    pub async fn verify_checksum<P: AsRef<Path>>(path: P, expected_checksum: &str) -> Result<bool> {
        let mut file = tokio::fs::File::open(path.as_ref()).await?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0; 8192];

        use tokio::io::AsyncReadExt;
        loop {
            let bytes_read = file.read(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        let computed = format!("{:x}", hasher.finalize());
        Ok(computed.eq_ignore_ascii_case(expected_checksum))
    }
}

#[async_trait]
impl Fetcher for Downloader {
    async fn fetch_archive(&self, version: &GoVersion, dest: &Path) -> Result<()> {
        let filename = dest
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| GovmError::ConfigError(format!("bad archive path {}", dest.display())))?;
        let url = self.archive_url(filename);

        self.download_with_progress(&url, dest, &version.dir_name())
            .await?;

        if self.verify_checksums {
            self.verify_published_checksum(filename, dest).await?;
        }
        Ok(())
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

async fn write_body(response: Response, url: &str, part: &Path, label: &str) -> Result<u64> {
    let total_size = response.content_length().unwrap_or(0);

    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .map_err(|e| GovmError::ConfigError(e.to_string()))?
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Downloading {}", label));

    let mut file = File::create(part).await?;
    let mut downloaded: u64 = 0;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| GovmError::DownloadFailed {
            url: url.to_string(),
            source: e,
        })?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    file.flush().await?;
    file.sync_all().await?;

    if total_size > 0 && downloaded != total_size {
        pb.abandon();
        return Err(GovmError::IncompleteDownload {
            url: url.to_string(),
            expected: total_size,
            actual: downloaded,
        });
    }

    pb.finish_with_message("Download complete");
    Ok(downloaded)
}
