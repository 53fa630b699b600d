use crate::error::{GovmError, Result};
use crate::models::{GoVersion, Platform};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Process environment captured once at startup and threaded through every component.
#[derive(Debug, Clone)]
pub struct Environment {
    pub home: PathBuf,
    pub shell: Option<String>,
    pub path: OsString,
    pub root_override: Option<String>,
    pub platform: Platform,
    /// Whether PATH changes are also applied to the running process
    propagate: bool,
}

impl Environment {
    pub fn new(home: PathBuf, shell: Option<String>, path: OsString, platform: Platform) -> Self {
        Self {
            home,
            shell,
            path,
            root_override: None,
            platform,
            propagate: false,
        }
    }

    pub fn capture() -> Result<Self> {
        let home = std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .filter(|h| !h.as_os_str().is_empty())
            .ok_or(GovmError::NoHomeDir)?;

        Ok(Self {
            home,
            shell: std::env::var("SHELL").ok().filter(|s| !s.is_empty()),
            path: std::env::var_os("PATH").unwrap_or_default(),
            root_override: std::env::var("GOVM_DIR").ok().filter(|s| !s.is_empty()),
            platform: Platform::current()?,
            propagate: true,
        })
    }

    /// Whether `dir` is the first PATH entry, i.e. nothing shadows it.
    pub fn path_starts_with(&self, dir: &Path) -> bool {
        std::env::split_paths(&self.path).next().as_deref() == Some(dir)
    }

    /// Put `dir` first on PATH for this process and the children it spawns.
    /// Later copies of `dir` are dropped.
    pub fn prepend_path(&mut self, dir: &Path) -> Result<()> {
        let rest: Vec<_> = std::env::split_paths(&self.path)
            .filter(|entry| entry != dir)
            .collect();
        let entries = std::iter::once(dir.to_path_buf()).chain(rest);
        self.path = std::env::join_paths(entries)
            .map_err(|e| GovmError::ConfigError(format!("invalid PATH entry: {}", e)))?;

        if self.propagate {
            std::env::set_var("PATH", &self.path);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub govm_dir: PathBuf,

    #[serde(skip)]
    pub versions_dir: PathBuf,

    #[serde(skip)]
    pub cache_dir: PathBuf,

    #[serde(skip)]
    pub config_file: PathBuf,

    /// Base URL of the upstream release host
    pub download_base_url: String,

    /// GitHub repository publishing govm releases
    pub release_repo: String,

    /// Oldest Go release `install` accepts
    pub minimum_version: String,

    /// Seconds to wait for a response before giving up
    pub request_timeout_secs: u64,

    /// Verify archives against the upstream SHA-256 listing
    pub verify_checksums: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_root(PathBuf::from(shellexpand::tilde("~/.govm").to_string()))
    }
}

impl Config {
    /// Fixed on-disk layout below `root`.
    pub fn for_root(root: PathBuf) -> Self {
        Self {
            versions_dir: root.join("versions").join("go"),
            cache_dir: root.join(".cache"),
            config_file: root.join("config.toml"),
            govm_dir: root,
            download_base_url: "https://go.dev/dl".to_string(),
            release_repo: "emmadal/govm".to_string(),
            minimum_version: "1.21.0".to_string(),
            request_timeout_secs: 60,
            verify_checksums: true,
        }
    }

    pub fn root_for(env: &Environment) -> PathBuf {
        match &env.root_override {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).to_string()),
            None => env.home.join(".govm"),
        }
    }

    pub fn load(env: &Environment) -> Result<Self> {
        let mut config = Self::for_root(Self::root_for(env));

        if config.config_file.exists() {
            let contents = std::fs::read_to_string(&config.config_file)?;
            let file_config: Config = toml::from_str(&contents)?;

            config.download_base_url = file_config.download_base_url;
            config.release_repo = file_config.release_repo;
            config.minimum_version = file_config.minimum_version;
            config.request_timeout_secs = file_config.request_timeout_secs;
            config.verify_checksums = file_config.verify_checksums;
        }

        Ok(config)
    }

    pub fn minimum_version(&self) -> Result<GoVersion> {
        self.minimum_version.parse().map_err(|_| {
            GovmError::ConfigError(format!(
                "minimum_version '{}' is not a valid version",
                self.minimum_version
            ))
        })
    }
}
