use crate::config::{Config, Environment};
use crate::detect::{parse_version_output, GoDetector, VersionProbe};
use crate::error::{GovmError, Result};
use crate::models::{GoVersion, VersionEntry, VersionStatus};
use crate::shell::{resolve_profile, ProfileEditor};
use crate::store::ArchiveStore;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Outcome of `activate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// The bin directory was already first on PATH; nothing was written
    AlreadyActive,
    Switched { profile: PathBuf },
}

/// Outcome of `remove`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    Cancelled,
}

pub struct VersionManager<P: VersionProbe = GoDetector> {
    env: Environment,
    store: ArchiveStore,
    probe: P,
}

impl VersionManager<GoDetector> {
    pub fn new(config: &Config, env: Environment) -> Self {
        Self::with_probe(config, env, GoDetector)
    }
}

impl<P: VersionProbe> VersionManager<P> {
    pub fn with_probe(config: &Config, env: Environment, probe: P) -> Self {
        let store = ArchiveStore::new(config, env.platform);
        Self { env, store, probe }
    }

    pub fn store(&self) -> &ArchiveStore {
        &self.store
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Make `version` the toolchain found first on PATH, now and in new shells.
    pub fn activate(&mut self, version: &GoVersion) -> Result<Activation> {
        let bin_dir = self.store.bin_dir(version);
        if !bin_dir.is_dir() {
            return Err(GovmError::NotInstalled(version.to_string()));
        }

        let (shell, profile) = resolve_profile(&self.env)?;

        if self.env.path_starts_with(&bin_dir) {
            tracing::debug!("{} already first on PATH", bin_dir.display());
            return Ok(Activation::AlreadyActive);
        }

        self.env.prepend_path(&bin_dir)?;

        let editor = ProfileEditor::new(profile.clone(), shell, self.store.versions_dir())?;
        editor.set_active_path(&bin_dir)?;
        tracing::debug!("Wrote {} to {}", bin_dir.display(), profile.display());

        Ok(Activation::Switched { profile })
    }

    /// Version reported by the first `go` on the context PATH
    pub fn active_version(&self) -> Result<GoVersion> {
        self.probe
            .version_output(&self.env.path)
            .as_deref()
            .and_then(parse_version_output)
            .ok_or(GovmError::NotDetectable)
    }

    /// Every version with an archive, a tree, or both, oldest first.
    pub fn list_versions(&self) -> Result<Vec<VersionEntry>> {
        let mut versions: BTreeSet<GoVersion> = self.store.cached_versions()?.into_iter().collect();
        versions.extend(self.store.installed_versions()?);

        let active = self.active_version().ok();

        Ok(versions
            .into_iter()
            .map(|version| VersionEntry {
                status: self.store.status(&version),
                active: active.as_ref() == Some(&version),
                version,
            })
            .collect())
    }

    /// Delete the archive and tree of `version` after `confirm` agrees.
    pub async fn remove<F>(&self, version: &GoVersion, confirm: F) -> Result<Removal>
    where
        F: FnOnce(&GoVersion) -> Result<bool>,
    {
        if let Ok(active) = self.active_version() {
            if &active == version {
                return Err(GovmError::IsActive(version.to_string()));
            }
        }

        if self.store.status(version) == VersionStatus::Neither {
            return Err(GovmError::NotInstalled(version.to_string()));
        }

        if !confirm(version)? {
            return Ok(Removal::Cancelled);
        }

        let archive = self.store.archive_path(version);
        let tree = self.store.install_dir(version);
        let (archive_result, tree_result) =
            tokio::join!(remove_file_if_present(&archive), remove_tree_if_present(&tree));

        let errors: Vec<String> = [(archive, archive_result), (tree, tree_result)]
            .into_iter()
            .filter_map(|(path, result)| {
                result
                    .err()
                    .map(|e| format!("{}: {}", path.display(), e))
            })
            .collect();

        if !errors.is_empty() {
            return Err(GovmError::RemovalFailed {
                version: version.to_string(),
                errors: errors.join("; "),
            });
        }

        Ok(Removal::Removed)
    }
}

async fn remove_file_if_present(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

async fn remove_tree_if_present(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Arch, Os, Platform};
    use std::ffi::{OsStr, OsString};
    use tempfile::TempDir;

    struct FixedProbe(Option<&'static str>);

    impl VersionProbe for FixedProbe {
        fn version_output(&self, _search_path: &OsStr) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    fn sandbox(temp: &TempDir, path: &str) -> (Config, Environment) {
        let env = Environment::new(
            temp.path().to_path_buf(),
            Some("/bin/zsh".to_string()),
            OsString::from(path),
            Platform::new(Os::Linux, Arch::Amd64),
        );
        let config = Config::load(&env).unwrap();
        (config, env)
    }

    fn fake_install(store: &ArchiveStore, version: &GoVersion) {
        std::fs::create_dir_all(store.bin_dir(version)).unwrap();
        store.ensure_dirs().unwrap();
        std::fs::write(store.archive_path(version), b"archive").unwrap();
    }

    #[test]
    fn test_activation_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let (config, env) = sandbox(&temp, "/usr/bin");
        let mut manager = VersionManager::with_probe(&config, env, FixedProbe(None));
        let version = GoVersion::new(1, 21, 0);
        fake_install(manager.store(), &version);

        let profile = temp.path().join(".zshrc");
        assert_eq!(
            manager.activate(&version).unwrap(),
            Activation::Switched {
                profile: profile.clone()
            }
        );
        assert_eq!(manager.activate(&version).unwrap(), Activation::AlreadyActive);

        let bin = manager.store().bin_dir(&version);
        let on_path = std::env::split_paths(&manager.env().path)
            .filter(|p| p == &bin)
            .count();
        assert_eq!(on_path, 1);

        let contents = std::fs::read_to_string(&profile).unwrap();
        let exports = contents
            .lines()
            .filter(|l| l.starts_with("export PATH="))
            .count();
        assert_eq!(exports, 1);
    }

    #[test]
    fn test_activate_switches_when_shadowed() {
        let temp = TempDir::new().unwrap();
        let (config, env) = sandbox(&temp, "/usr/bin");
        let older = GoVersion::new(1, 21, 5);
        let newer = GoVersion::new(1, 22, 0);

        let store = ArchiveStore::new(&config, env.platform);
        fake_install(&store, &older);
        fake_install(&store, &newer);

        let mut env = env;
        env.path = std::env::join_paths([store.bin_dir(&newer), store.bin_dir(&older)]).unwrap();
        let mut manager = VersionManager::with_probe(&config, env, FixedProbe(None));

        let profile = temp.path().join(".zshrc");
        std::fs::write(
            &profile,
            format!("export PATH=\"{}:$PATH\"\n", store.bin_dir(&newer).display()),
        )
        .unwrap();
        assert_eq!(
            manager.activate(&older).unwrap(),
            Activation::Switched {
                profile: profile.clone()
            }
        );

        let entries: Vec<_> = std::env::split_paths(&manager.env().path).collect();
        assert_eq!(entries, vec![store.bin_dir(&older), store.bin_dir(&newer)]);

        let contents = std::fs::read_to_string(&profile).unwrap();
        let exports: Vec<_> = contents.lines().filter(|l| l.starts_with("export PATH=")).collect();
        assert_eq!(exports.len(), 1);
        assert!(exports[0].contains("go1.21.5"));
    }

    #[test]
    fn test_activate_requires_tree() {
        let temp = TempDir::new().unwrap();
        let (config, env) = sandbox(&temp, "/usr/bin");
        let mut manager = VersionManager::with_probe(&config, env, FixedProbe(None));

        assert!(matches!(
            manager.activate(&GoVersion::new(1, 21, 0)),
            Err(GovmError::NotInstalled(_))
        ));
        assert!(!temp.path().join(".zshrc").exists());
    }

    #[tokio::test]
    async fn test_remove_refuses_active_version() {
        let temp = TempDir::new().unwrap();
        let (config, env) = sandbox(&temp, "/usr/bin");
        let manager = VersionManager::with_probe(
            &config,
            env,
            FixedProbe(Some("go version go1.22.0 linux/amd64\n")),
        );
        let active = GoVersion::new(1, 22, 0);
        let other = GoVersion::new(1, 21, 0);
        fake_install(manager.store(), &active);
        fake_install(manager.store(), &other);

        let result = manager
            .remove(&active, |_| panic!("must not prompt for the active version"))
            .await;
        assert!(matches!(result, Err(GovmError::IsActive(_))));
        assert!(manager.store().is_installed(&active));

        let removal = manager.remove(&other, |_| Ok(true)).await.unwrap();
        assert_eq!(removal, Removal::Removed);
        assert_eq!(manager.store().status(&other), VersionStatus::Neither);
    }

    #[tokio::test]
    async fn test_remove_cancelled_and_missing() {
        let temp = TempDir::new().unwrap();
        let (config, env) = sandbox(&temp, "/usr/bin");
        let manager = VersionManager::with_probe(&config, env, FixedProbe(None));
        let version = GoVersion::new(1, 21, 3);
        fake_install(manager.store(), &version);

        let removal = manager.remove(&version, |_| Ok(false)).await.unwrap();
        assert_eq!(removal, Removal::Cancelled);
        assert_eq!(manager.store().status(&version), VersionStatus::Both);

        let missing = manager.remove(&GoVersion::new(1, 23, 0), |_| Ok(true)).await;
        assert!(matches!(missing, Err(GovmError::NotInstalled(_))));
    }

    #[tokio::test]
    async fn test_remove_reports_failure_but_deletes_other_side() {
        let temp = TempDir::new().unwrap();
        let (config, env) = sandbox(&temp, "/usr/bin");
        let manager = VersionManager::with_probe(&config, env, FixedProbe(None));
        let version = GoVersion::new(1, 21, 4);
        let store = manager.store();

        std::fs::create_dir_all(store.bin_dir(&version)).unwrap();
        // a directory where the archive should be cannot be removed as a file
        std::fs::create_dir_all(store.archive_path(&version)).unwrap();

        let result = manager.remove(&version, |_| Ok(true)).await;
        match result {
            Err(GovmError::RemovalFailed { version: v, errors }) => {
                assert_eq!(v, "1.21.4");
                assert!(errors.contains(&store.archive_name(&version)));
            }
            other => panic!("expected RemovalFailed, got {:?}", other),
        }
        assert!(!store.is_installed(&version));
        assert!(store.archive_path(&version).exists());
    }

    #[tokio::test]
    async fn test_remove_cached_only_archive() {
        let temp = TempDir::new().unwrap();
        let (config, env) = sandbox(&temp, "/usr/bin");
        let manager = VersionManager::with_probe(&config, env, FixedProbe(None));
        let version = GoVersion::new(1, 21, 3);
        manager.store().ensure_dirs().unwrap();
        std::fs::write(manager.store().archive_path(&version), b"archive").unwrap();

        assert_eq!(
            manager.remove(&version, |_| Ok(true)).await.unwrap(),
            Removal::Removed
        );
        assert!(!manager.store().archive_path(&version).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_install_list_use_round_trip() {
        use crate::install::Installer;
        use crate::test_support::{go_tarball, StaticFetcher};

        let temp = TempDir::new().unwrap();
        let (config, env) = sandbox(&temp, "/nonexistent");
        let mut manager = VersionManager::new(&config, env);
        let version: GoVersion = "1.21.5".parse().unwrap();

        let installer = Installer::new(
            manager.store().clone(),
            StaticFetcher::new(go_tarball("1.21.5")),
        );
        installer.install(&version).await.unwrap();

        let listed = manager.list_versions().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].version, version);
        assert!(listed[0].status.is_cached());
        assert!(!listed[0].active);
        assert!(matches!(
            manager.active_version(),
            Err(GovmError::NotDetectable)
        ));

        manager.activate(&version).unwrap();

        let listed = manager.list_versions().unwrap();
        assert!(listed[0].active);
        assert_eq!(manager.active_version().unwrap(), version);
    }
}
