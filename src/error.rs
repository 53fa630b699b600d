use thiserror::Error;

#[derive(Error, Debug)]
pub enum GovmError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0} was not found upstream. Please check the version number")]
    NotFound(String),

    #[error("No govm release binary at {0}")]
    ReleaseNotFound(String),

    #[error("go{0} is not installed. Run 'govm install {0}' first")]
    NotInstalled(String),

    #[error("No cached archive for go{0}")]
    NotCached(String),

    #[error("go{0} is the active version and cannot be removed")]
    IsActive(String),

    #[error("Unsupported shell: {0}")]
    ShellUnsupported(String),

    #[error("Unsupported platform: {os} {arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Unable to determine the user home directory")]
    NoHomeDir,

    #[error("Could not determine the active Go version")]
    NotDetectable,

    #[error("Failed to download from {url}: {source}")]
    DownloadFailed {
        url: String,
        source: reqwest::Error,
    },

    #[error("Timed out after {secs}s waiting for {url}")]
    Timeout { url: String, secs: u64 },

    #[error("Incomplete download from {url}: expected {expected} bytes, got {actual}")]
    IncompleteDownload {
        url: String,
        expected: u64,
        actual: u64,
    },

    #[error("Checksum verification failed for {file}")]
    ChecksumMismatch { file: String },

    #[error("Failed to extract archive: {0}")]
    ExtractionFailed(String),

    #[error("Failed to remove go{version}: {errors}")]
    RemovalFailed { version: String, errors: String },

    #[error("Failed to read input: {0}")]
    Prompt(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to replace file: {0}")]
    PersistError(#[from] tempfile::PersistError),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    RequestError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, GovmError>;
