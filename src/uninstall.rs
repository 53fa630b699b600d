use crate::config::{Config, Environment};
use crate::error::Result;
use crate::shell::{resolve_profile, ProfileEditor};
use crate::update::MARKER_FILE;
use crate::version_manager::Removal;
use std::path::{Path, PathBuf};

/// Removes govm itself: its root, its profile lines, its binary.
pub struct Uninstaller {
    config: Config,
    env: Environment,
    binary: PathBuf,
}

impl Uninstaller {
    pub fn new(config: Config, env: Environment) -> Result<Self> {
        let binary = std::env::current_exe()?;
        Ok(Self::for_binary(config, env, binary))
    }

    pub fn for_binary(config: Config, env: Environment, binary: PathBuf) -> Self {
        Self {
            config,
            env,
            binary,
        }
    }

    fn marker_path(&self) -> Option<PathBuf> {
        self.binary.parent().map(|dir| dir.join(MARKER_FILE))
    }

    /// Everything that will be deleted, for the confirmation prompt
    pub fn targets(&self) -> Vec<PathBuf> {
        let mut targets = vec![self.config.govm_dir.clone()];
        targets.extend(self.marker_path());
        targets.push(self.binary.clone());
        targets
    }

    pub fn run<F>(&self, confirm: F) -> Result<Removal>
    where
        F: FnOnce(&[PathBuf]) -> Result<bool>,
    {
        if !confirm(&self.targets())? {
            return Ok(Removal::Cancelled);
        }

        if self.config.govm_dir.exists() {
            std::fs::remove_dir_all(&self.config.govm_dir)?;
            tracing::debug!("Removed {}", self.config.govm_dir.display());
        }

        match resolve_profile(&self.env) {
            Ok((shell, profile)) => {
                let editor = ProfileEditor::new(profile, shell, &self.config.versions_dir)?;
                if editor.prune()? {
                    tracing::debug!("Cleaned {}", editor.path().display());
                }
            }
            Err(e) => tracing::warn!("Leaving shell profile untouched: {}", e),
        }

        if let Some(marker) = self.marker_path() {
            remove_best_effort(&marker);
        }
        remove_best_effort(&self.binary);

        Ok(Removal::Removed)
    }
}

fn remove_best_effort(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Could not remove {}: {}", path.display(), e),
    }
}
