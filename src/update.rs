use crate::api::ReleaseApi;
use crate::config::Config;
use crate::download::Downloader;
use crate::error::{GovmError, Result};
use crate::models::Platform;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

/// File next to the govm binary recording which release it came from
pub const MARKER_FILE: &str = "VERSION";

const TAG_TIMEOUT: Duration = Duration::from_secs(60);
const RELEASE_HOST: &str = "https://github.com";

/// Contents of the `VERSION` marker: the release tag, then `time: <RFC3339>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMarker {
    pub tag: String,
    pub updated_at: Option<DateTime<Utc>>,
}

impl VersionMarker {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            updated_at: Some(Utc::now()),
        }
    }

    pub fn parse(contents: &str) -> Option<Self> {
        let mut lines = contents.lines().map(str::trim);
        let tag = lines.next().filter(|t| !t.is_empty())?.to_string();

        let updated_at = lines
            .find_map(|line| line.strip_prefix("time:"))
            .and_then(|ts| DateTime::parse_from_rfc3339(ts.trim()).ok())
            .map(|ts| ts.with_timezone(&Utc));

        Some(Self { tag, updated_at })
    }

    pub fn render(&self) -> String {
        match &self.updated_at {
            Some(ts) => format!("{}\ntime: {}\n", self.tag, ts.to_rfc3339()),
            None => format!("{}\n", self.tag),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate { tag: String },
    Updated { tag: String, binary: PathBuf },
}

pub struct SelfUpdater {
    api: ReleaseApi,
    downloader: Downloader,
    repo: String,
    release_host: String,
    platform: Platform,
    binary: PathBuf,
}

impl SelfUpdater {
    /// Updater for the currently running executable.
    pub fn new(config: &Config, platform: Platform) -> Result<Self> {
        let binary = std::env::current_exe()?;
        Self::for_binary(config, platform, binary)
    }

    pub fn for_binary(config: &Config, platform: Platform, binary: PathBuf) -> Result<Self> {
        Ok(Self {
            api: ReleaseApi::new(config)?,
            downloader: Downloader::new(config)?,
            repo: config.release_repo.clone(),
            release_host: RELEASE_HOST.to_string(),
            platform,
            binary,
        })
    }

    #[cfg(test)]
    pub fn with_hosts(mut self, github_api: &str, release_host: &str) -> Self {
        self.api = self.api.with_github_api(github_api);
        self.release_host = release_host.trim_end_matches('/').to_string();
        self
    }

    fn install_dir(&self) -> Result<&Path> {
        self.binary.parent().ok_or_else(|| {
            GovmError::ConfigError(format!("{} has no parent directory", self.binary.display()))
        })
    }

    pub fn marker_path(&self) -> Result<PathBuf> {
        Ok(self.install_dir()?.join(MARKER_FILE))
    }

    pub fn asset_name(&self) -> String {
        format!(
            "govm_{}_{}{}",
            self.platform.os,
            self.platform.arch,
            std::env::consts::EXE_SUFFIX
        )
    }

    pub fn binary_url(&self) -> String {
        format!(
            "{}/{}/releases/latest/download/{}",
            self.release_host,
            self.repo,
            self.asset_name()
        )
    }

    pub fn installed_marker(&self) -> Option<VersionMarker> {
        let path = self.marker_path().ok()?;
        let contents = std::fs::read_to_string(path).ok()?;
        VersionMarker::parse(&contents)
    }

    /// Fetch the latest tag and binary together, then swap the binary in if the tag is new.
    pub async fn run(&self) -> Result<UpdateOutcome> {
        let staging = TempDir::new()?;
        let staged = staging.path().join(self.asset_name());
        let url = self.binary_url();

        tracing::debug!("Fetching latest release of {} from {}", self.repo, url);
        let (tag, download) = tokio::join!(
            tokio::time::timeout(TAG_TIMEOUT, self.api.latest_tag(&self.repo)),
            self.downloader.download_with_progress(&url, &staged, "govm"),
        );

        // the tag decides everything; a binary without one is discarded with `staging`
        let tag = match tag {
            Ok(tag) => tag?,
            Err(_) => {
                return Err(GovmError::Timeout {
                    url: format!("latest release of {}", self.repo),
                    secs: TAG_TIMEOUT.as_secs(),
                })
            }
        };
        download.map_err(|e| match e {
            GovmError::NotFound(_) => GovmError::ReleaseNotFound(url.clone()),
            other => other,
        })?;

        if self
            .installed_marker()
            .is_some_and(|marker| marker.tag == tag)
        {
            return Ok(UpdateOutcome::UpToDate { tag });
        }

        self.replace_binary(&staged)?;
        std::fs::write(self.marker_path()?, VersionMarker::new(&tag).render())?;

        Ok(UpdateOutcome::Updated {
            tag,
            binary: self.binary.clone(),
        })
    }

    /// Copy `staged` beside the binary, mark it executable and rename it into place.
    fn replace_binary(&self, staged: &Path) -> Result<()> {
        let dir = self.install_dir()?;
        let temp = NamedTempFile::new_in(dir)?;
        std::fs::copy(staged, temp.path())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(temp.path(), std::fs::Permissions::from_mode(0o755))?;
        }

        temp.persist(&self.binary)?;
        tracing::debug!("Replaced {}", self.binary.display());
        Ok(())
    }
}
