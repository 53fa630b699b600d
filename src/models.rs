use crate::error::{GovmError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Name of the managed toolchain binary. Version arguments must not contain it.
pub const TOOLCHAIN_NAME: &str = "go";

/// Go release version, e.g. `1.21.0` or `1.22.0rc1`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GoVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub suffix: Option<String>,
}

impl GoVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            suffix: None,
        }
    }

    /// Numeric comparison on the first three components only.
    pub fn is_at_least(&self, minimum: &GoVersion) -> bool {
        self.triple() >= minimum.triple()
    }

    fn triple(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch)
    }

    /// Directory and archive prefix, e.g. `go1.21.0`
    pub fn dir_name(&self) -> String {
        format!("{}{}", TOOLCHAIN_NAME, self)
    }
}

impl fmt::Display for GoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(suffix) = &self.suffix {
            write!(f, "{}", suffix)?;
        }
        Ok(())
    }
}

impl FromStr for GoVersion {
    type Err = GovmError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();

        if trimmed.contains(TOOLCHAIN_NAME) {
            return Err(GovmError::InvalidArgument(format!(
                "'{}' looks like a binary name; pass the bare version, e.g. 1.21.0",
                s
            )));
        }

        let parts: Vec<&str> = trimmed.splitn(3, '.').collect();
        if parts.len() < 3 {
            return Err(GovmError::InvalidArgument(format!(
                "'{}' must have three components (MAJOR.MINOR.PATCH)",
                s
            )));
        }

        let invalid = || GovmError::InvalidArgument(format!("'{}' is not a valid version", s));

        let major = parts[0].parse::<u32>().map_err(|_| invalid())?;
        let minor = parts[1].parse::<u32>().map_err(|_| invalid())?;

        let rest = parts[2];
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let patch = rest[..digits_end].parse::<u32>().map_err(|_| invalid())?;
        let suffix = Some(&rest[digits_end..])
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(GoVersion {
            major,
            minor,
            patch,
            suffix,
        })
    }
}

impl Ord for GoVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.triple()
            .cmp(&other.triple())
            .then_with(|| match (&self.suffix, &other.suffix) {
                (None, None) => Ordering::Equal,
                // a pre-release sorts before its final release
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for GoVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Operating systems with upstream Go releases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Linux,
    Darwin,
    Windows,
    FreeBsd,
}

impl Os {
    pub fn current() -> Result<Self> {
        match std::env::consts::OS {
            "linux" => Ok(Os::Linux),
            "macos" => Ok(Os::Darwin),
            "windows" => Ok(Os::Windows),
            "freebsd" => Ok(Os::FreeBsd),
            os => Err(GovmError::UnsupportedPlatform {
                os: os.to_string(),
                arch: std::env::consts::ARCH.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Darwin => "darwin",
            Os::Windows => "windows",
            Os::FreeBsd => "freebsd",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Architectures, spelled the way Go release file names spell them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    Amd64,
    Arm64,
    X86,
    Armv6l,
}

impl Arch {
    pub fn current() -> Result<Self> {
        match std::env::consts::ARCH {
            "x86_64" => Ok(Arch::Amd64),
            "aarch64" => Ok(Arch::Arm64),
            "x86" => Ok(Arch::X86),
            "arm" => Ok(Arch::Armv6l),
            arch => Err(GovmError::UnsupportedPlatform {
                os: std::env::consts::OS.to_string(),
                arch: arch.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
            Arch::X86 => "386",
            Arch::Armv6l => "armv6l",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self { os, arch }
    }

    pub fn current() -> Result<Self> {
        Ok(Self::new(Os::current()?, Arch::current()?))
    }

    pub fn archive_ext(&self) -> &'static str {
        match self.os {
            Os::Windows => "zip",
            _ => "tar.gz",
        }
    }

    /// Trailing part of a release file name, e.g. `linux-amd64.tar.gz`
    pub fn archive_suffix(&self) -> String {
        format!("{}-{}.{}", self.os, self.arch, self.archive_ext())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

/// How a version is present on disk. Archive and tree may legitimately drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    Both,
    CachedOnly,
    InstalledOnly,
    Neither,
}

impl VersionStatus {
    pub fn from_presence(cached: bool, installed: bool) -> Self {
        match (cached, installed) {
            (true, true) => VersionStatus::Both,
            (true, false) => VersionStatus::CachedOnly,
            (false, true) => VersionStatus::InstalledOnly,
            (false, false) => VersionStatus::Neither,
        }
    }

    pub fn is_cached(&self) -> bool {
        matches!(self, VersionStatus::Both | VersionStatus::CachedOnly)
    }

    pub fn is_installed(&self) -> bool {
        matches!(self, VersionStatus::Both | VersionStatus::InstalledOnly)
    }
}

/// One row of `govm list`
#[derive(Debug, Clone)]
pub struct VersionEntry {
    pub version: GoVersion,
    pub status: VersionStatus,
    pub active: bool,
}
