use crate::config::Config;
use crate::error::{GovmError, Result};
use crate::models::{GoVersion, Platform, VersionStatus, TOOLCHAIN_NAME};
use regex::Regex;
use std::path::{Path, PathBuf};

/// On-disk archive cache and unpacked version trees.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    cache_dir: PathBuf,
    versions_dir: PathBuf,
    platform: Platform,
}

impl ArchiveStore {
    pub fn new(config: &Config, platform: Platform) -> Self {
        Self {
            cache_dir: config.cache_dir.clone(),
            versions_dir: config.versions_dir.clone(),
            platform,
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn versions_dir(&self) -> &Path {
        &self.versions_dir
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// e.g. `go1.21.0.linux-amd64.tar.gz`
    pub fn archive_name(&self, version: &GoVersion) -> String {
        format!("{}.{}", version.dir_name(), self.platform.archive_suffix())
    }

    pub fn archive_path(&self, version: &GoVersion) -> PathBuf {
        self.cache_dir.join(self.archive_name(version))
    }

    pub fn install_dir(&self, version: &GoVersion) -> PathBuf {
        self.versions_dir.join(version.dir_name())
    }

    pub fn bin_dir(&self, version: &GoVersion) -> PathBuf {
        self.install_dir(version).join("bin")
    }

    pub fn locate_cached(&self, version: &GoVersion) -> Result<PathBuf> {
        let path = self.archive_path(version);
        if path.is_file() {
            Ok(path)
        } else {
            Err(GovmError::NotCached(version.to_string()))
        }
    }

    pub fn is_installed(&self, version: &GoVersion) -> bool {
        self.install_dir(version).is_dir()
    }

    pub fn status(&self, version: &GoVersion) -> VersionStatus {
        VersionStatus::from_presence(
            self.archive_path(version).is_file(),
            self.is_installed(version),
        )
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;
        std::fs::create_dir_all(&self.versions_dir)?;
        Ok(())
    }

    fn archive_pattern(&self) -> Result<Regex> {
        let pattern = format!(
            r"^{}(\d+\.\d+\.\d+\S*?)\.{}$",
            TOOLCHAIN_NAME,
            regex::escape(&self.platform.archive_suffix())
        );
        Regex::new(&pattern).map_err(|e| GovmError::ConfigError(e.to_string()))
    }

    /// Versions with an archive for this platform in the cache
    pub fn cached_versions(&self) -> Result<Vec<GoVersion>> {
        let pattern = self.archive_pattern()?;
        let names = read_names(&self.cache_dir, |path| path.is_file())?;

        Ok(names
            .iter()
            .filter_map(|name| pattern.captures(name))
            .filter_map(|caps| caps[1].parse().ok())
            .collect())
    }

    /// Versions with an unpacked `go{version}` tree
    pub fn installed_versions(&self) -> Result<Vec<GoVersion>> {
        let names = read_names(&self.versions_dir, |path| path.is_dir())?;

        Ok(names
            .iter()
            .filter_map(|name| name.strip_prefix(TOOLCHAIN_NAME))
            .filter_map(|version| version.parse().ok())
            .collect())
    }
}

fn read_names(dir: &Path, keep: impl Fn(&Path) -> bool) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !keep(&entry.path()) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Arch, Os};
    use tempfile::TempDir;

    fn store(root: &Path) -> ArchiveStore {
        let config = Config::for_root(root.to_path_buf());
        ArchiveStore::new(&config, Platform::new(Os::Linux, Arch::Amd64))
    }

    #[test]
    fn test_layout_names() {
        let store = store(Path::new("/home/gopher/.govm"));
        let version: GoVersion = "1.21.0".parse().unwrap();

        assert_eq!(store.archive_name(&version), "go1.21.0.linux-amd64.tar.gz");
        assert_eq!(
            store.bin_dir(&version),
            PathBuf::from("/home/gopher/.govm/versions/go/go1.21.0/bin")
        );
    }

    #[test]
    fn test_status_and_listing() {
        let temp = TempDir::new().unwrap();
        let store = store(temp.path());
        store.ensure_dirs().unwrap();
        store.ensure_dirs().unwrap();

        let cached: GoVersion = "1.21.5".parse().unwrap();
        let both: GoVersion = "1.22.0".parse().unwrap();
        let installed: GoVersion = "1.20.3".parse().unwrap();

        std::fs::write(store.archive_path(&cached), b"archive").unwrap();
        std::fs::write(store.archive_path(&both), b"archive").unwrap();
        std::fs::create_dir_all(store.install_dir(&both)).unwrap();
        std::fs::create_dir_all(store.install_dir(&installed)).unwrap();
        // other platforms and partial downloads are ignored
        std::fs::write(store.cache_dir().join("go1.19.0.darwin-arm64.tar.gz"), b"").unwrap();
        std::fs::write(
            store.cache_dir().join("go1.23.0.linux-amd64.tar.gz.part"),
            b"",
        )
        .unwrap();

        assert_eq!(store.status(&cached), VersionStatus::CachedOnly);
        assert_eq!(store.status(&both), VersionStatus::Both);
        assert_eq!(store.status(&installed), VersionStatus::InstalledOnly);
        assert_eq!(
            store.status(&GoVersion::new(1, 18, 0)),
            VersionStatus::Neither
        );

        let mut cached_versions = store.cached_versions().unwrap();
        cached_versions.sort();
        assert_eq!(cached_versions, vec![cached.clone(), both.clone()]);

        let mut installed_versions = store.installed_versions().unwrap();
        installed_versions.sort();
        assert_eq!(installed_versions, vec![installed, both]);

        assert!(store.locate_cached(&cached).is_ok());
        assert!(matches!(
            store.locate_cached(&GoVersion::new(1, 18, 0)),
            Err(GovmError::NotCached(_))
        ));
    }

    #[test]
    fn test_listing_missing_dirs() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp.path().join("absent"));
        assert!(store.cached_versions().unwrap().is_empty());
        assert!(store.installed_versions().unwrap().is_empty());
    }
}
