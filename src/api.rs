use crate::config::Config;
use crate::download::{http_client, send_with_timeout};
use crate::error::Result;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;

const GITHUB_API_BASE: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct GoRelease {
    #[allow(dead_code)]
    version: String,
    files: Vec<GoReleaseFile>,
}

#[derive(Debug, Deserialize)]
struct GoReleaseFile {
    filename: String,
    sha256: String,
}

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
}

/// Metadata lookups against the Go download index and GitHub releases
pub struct ReleaseApi {
    client: Client,
    download_base_url: String,
    github_api_base: String,
    timeout_secs: u64,
}

impl ReleaseApi {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            download_base_url: config.download_base_url.trim_end_matches('/').to_string(),
            github_api_base: GITHUB_API_BASE.to_string(),
            timeout_secs: config.request_timeout_secs,
        })
    }

    #[cfg(test)]
    pub fn with_github_api(mut self, base: &str) -> Self {
        self.github_api_base = base.trim_end_matches('/').to_string();
        self
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = send_with_timeout(self.client.get(url), url, self.timeout_secs).await?;
        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }

    /// SHA-256 published for a release file, if the index lists it
    pub async fn archive_checksum(&self, filename: &str) -> Result<Option<String>> {
        let url = format!("{}/?mode=json&include=all", self.download_base_url);
        let releases: Vec<GoRelease> = self.get_json(&url).await?;

        Ok(releases
            .into_iter()
            .flat_map(|release| release.files)
            .find(|file| file.filename == filename)
            .map(|file| file.sha256)
            .filter(|sum| !sum.is_empty()))
    }

    /// Tag of the latest published govm release
    pub async fn latest_tag(&self, repo: &str) -> Result<String> {
        let url = format!("{}/repos/{}/releases/latest", self.github_api_base, repo);
        let release: GithubRelease = self.get_json(&url).await?;
        Ok(release.tag_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_archive_checksum_lookup() {
        let mut server = mockito::Server::new_async().await;
        let body = r#"[{"version":"go1.21.0","stable":true,"files":[
            {"filename":"go1.21.0.linux-amd64.tar.gz","os":"linux","arch":"amd64","sha256":"abc123","size":10,"kind":"archive"},
            {"filename":"go1.21.0.src.tar.gz","os":"","arch":"","sha256":"def456","size":5,"kind":"source"}]}]"#;
        let mock = server
            .mock("GET", "/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body)
            .expect(2)
            .create_async()
            .await;

        let mut config = Config::for_root("/tmp/govm".into());
        config.download_base_url = server.url();
        let api = ReleaseApi::new(&config).unwrap();

        let sum = api
            .archive_checksum("go1.21.0.linux-amd64.tar.gz")
            .await
            .unwrap();
        assert_eq!(sum.as_deref(), Some("abc123"));

        let missing = api.archive_checksum("go1.99.0.linux-amd64.tar.gz").await.unwrap();
        assert!(missing.is_none());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_latest_tag() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/emmadal/govm/releases/latest")
            .with_status(200)
            .with_body(r#"{"tag_name":"v1.3.0","name":"v1.3.0"}"#)
            .create_async()
            .await;

        let config = Config::for_root("/tmp/govm".into());
        let api = ReleaseApi::new(&config).unwrap().with_github_api(&server.url());

        assert_eq!(api.latest_tag("emmadal/govm").await.unwrap(), "v1.3.0");
    }
}
