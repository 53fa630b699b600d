use crate::config::Environment;
use crate::error::{GovmError, Result};
use crate::models::Os;
use regex::bytes::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Comment written above the managed PATH line
const MARKER: &str = "# govm: active Go toolchain";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    Dash,
}

impl Shell {
    /// Pick a shell from the value of `$SHELL`, matching on its basename.
    pub fn detect(shell_var: Option<&str>) -> Result<Self> {
        let shell = shell_var.ok_or_else(|| {
            GovmError::ShellUnsupported("SHELL environment variable is empty".to_string())
        })?;
        let name = Path::new(shell)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if name.contains("zsh") {
            Ok(Shell::Zsh)
        } else if name.contains("bash") {
            Ok(Shell::Bash)
        } else if name.contains("fish") {
            Ok(Shell::Fish)
        } else if name.contains("dash") {
            Ok(Shell::Dash)
        } else {
            Err(GovmError::ShellUnsupported(shell.to_string()))
        }
    }

    /// Startup file relative to the home directory
    pub fn profile_file(&self, os: Os) -> &'static str {
        match self {
            Shell::Zsh => ".zshrc",
            Shell::Bash if os == Os::Darwin => ".bash_profile",
            Shell::Bash => ".bashrc",
            Shell::Fish => ".config/fish/config.fish",
            Shell::Dash => ".profile",
        }
    }

    pub fn profile_path(&self, home: &Path, os: Os) -> PathBuf {
        home.join(self.profile_file(os))
    }

    pub fn export_line(&self, bin_dir: &Path) -> String {
        match self {
            Shell::Fish => format!("set -gx PATH \"{}\" $PATH", bin_dir.display()),
            _ => format!("export PATH=\"{}:$PATH\"", bin_dir.display()),
        }
    }
}

pub fn resolve_profile(env: &Environment) -> Result<(Shell, PathBuf)> {
    let shell = Shell::detect(env.shell.as_deref())?;
    let profile = shell.profile_path(&env.home, env.platform.os);
    Ok((shell, profile))
}

/// Keeps at most one govm PATH line in a shell startup file.
///
/// Profiles are edited as bytes; lines that are not ours pass through untouched
/// even when they are not valid UTF-8.
pub struct ProfileEditor {
    path: PathBuf,
    shell: Shell,
    managed: Vec<Regex>,
}

impl ProfileEditor {
    pub fn new(path: PathBuf, shell: Shell, versions_root: &Path) -> Result<Self> {
        let root = regex::escape(&versions_root.to_string_lossy());
        let tree = format!(r"(?:{}|\.govm/versions)", root);

        let managed = [
            r"^\s*# govm\b".to_string(),
            format!(r"^\s*(?:export\s+PATH=|set\s+-gx\s+PATH\s).*{}", tree),
            format!(r"^\s*(?:export\s+GOROOT=|set\s+-gx\s+GOROOT\s).*{}", tree),
        ]
        .iter()
        .map(|pattern| Regex::new(pattern))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| GovmError::ConfigError(e.to_string()))?;

        Ok(Self {
            path,
            shell,
            managed,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_managed(&self, line: &[u8]) -> bool {
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        self.managed.iter().any(|pattern| pattern.is_match(line))
    }

    fn pruned(&self, contents: &[u8]) -> Vec<u8> {
        contents
            .split_inclusive(|&b| b == b'\n')
            .filter(|line| !self.is_managed(line))
            .flatten()
            .copied()
            .collect()
    }

    fn read(&self) -> Result<Vec<u8>> {
        match std::fs::read(&self.path) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop every managed line. Returns whether the file changed.
    pub fn prune(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }

        let contents = self.read()?;
        let pruned = self.pruned(&contents);
        if pruned == contents {
            return Ok(false);
        }

        self.replace(&pruned)?;
        tracing::debug!("Pruned govm entries from {}", self.path.display());
        Ok(true)
    }

    pub fn append(&self, bin_dir: &Path) -> Result<()> {
        let mut contents = self.read()?;
        if contents.last().is_some_and(|&b| b != b'\n') {
            contents.push(b'\n');
        }
        contents.extend_from_slice(MARKER.as_bytes());
        contents.push(b'\n');
        contents.extend_from_slice(self.shell.export_line(bin_dir).as_bytes());
        contents.push(b'\n');

        self.replace(&contents)
    }

    pub fn set_active_path(&self, bin_dir: &Path) -> Result<()> {
        self.prune()?;
        self.append(bin_dir)
    }

    /// Write through a sibling temp file and rename it over the profile.
    fn replace(&self, contents: &[u8]) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| GovmError::ConfigError(format!("{} has no parent", self.path.display())))?;
        std::fs::create_dir_all(dir)?;

        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(contents)?;
        temp.as_file().sync_all()?;

        if let Ok(metadata) = std::fs::metadata(&self.path) {
            std::fs::set_permissions(temp.path(), metadata.permissions())?;
        }

        temp.persist(&self.path)?;
        Ok(())
    }
}
