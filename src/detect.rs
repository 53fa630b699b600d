use crate::models::{GoVersion, TOOLCHAIN_NAME};
use regex::Regex;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Asks whatever `go` is first on a PATH which version it is.
pub trait VersionProbe {
    /// Raw output of the toolchain's version command, `None` if nothing runs.
    fn version_output(&self, search_path: &OsStr) -> Option<String>;
}

/// Runs the real `go version`
#[derive(Debug, Default, Clone, Copy)]
pub struct GoDetector;

impl GoDetector {
    fn binary_name() -> String {
        format!("{}{}", TOOLCHAIN_NAME, std::env::consts::EXE_SUFFIX)
    }

    /// First `go` executable on `search_path`
    pub fn find_binary(search_path: &OsStr) -> Option<PathBuf> {
        let name = Self::binary_name();
        std::env::split_paths(search_path)
            .map(|dir| dir.join(&name))
            .find(|candidate| is_executable(candidate))
    }
}

impl VersionProbe for GoDetector {
    fn version_output(&self, search_path: &OsStr) -> Option<String> {
        let binary = Self::find_binary(search_path)?;
        tracing::debug!("Probing {}", binary.display());

        let output = Command::new(&binary)
            .arg("version")
            .env("PATH", search_path)
            .output()
            .ok()?;

        if !output.status.success() {
            return None;
        }
        Some(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Extract the version from output like `go version go1.22.0 linux/amd64`.
pub fn parse_version_output(output: &str) -> Option<GoVersion> {
    let pattern = Regex::new(r"go(\d+\.\d+\.\d+\S*)").ok()?;
    let caps = pattern.captures(output)?;
    caps[1].parse().ok()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn test_parse_version_output() {
        let v = parse_version_output("go version go1.22.0 linux/amd64\n").unwrap();
        assert_eq!(v, GoVersion::new(1, 22, 0));

        let rc = parse_version_output("go version go1.23.0rc2 darwin/arm64").unwrap();
        assert_eq!(rc.suffix.as_deref(), Some("rc2"));

        assert!(parse_version_output("go version devel +abc123").is_none());
        assert!(parse_version_output("go version go1.22 linux/amd64").is_none());
    }

    #[test]
    fn test_missing_binary_yields_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = OsString::from(dir.path());
        assert!(GoDetector.version_output(&path).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_detects_first_binary_on_path() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        for (bin_dir, version) in [(&first, "1.22.1"), (&second, "1.21.0")] {
            std::fs::create_dir_all(bin_dir).unwrap();
            let go = bin_dir.join("go");
            std::fs::write(
                &go,
                format!("#!/bin/sh\necho \"go version go{} linux/amd64\"\n", version),
            )
            .unwrap();
            std::fs::set_permissions(&go, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let path = std::env::join_paths([&first, &second]).unwrap();
        let output = GoDetector.version_output(&path).unwrap();
        assert_eq!(
            parse_version_output(&output),
            Some(GoVersion::new(1, 22, 1))
        );
    }
}
