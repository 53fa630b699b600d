use crate::download::Fetcher;
use crate::error::{GovmError, Result};
use crate::models::GoVersion;
use crate::store::ArchiveStore;
use colored::*;
use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use tar::Archive;

/// Where an archive came from during `install`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveSource {
    Cache,
    Downloaded,
}

pub struct Installer<F: Fetcher> {
    store: ArchiveStore,
    fetcher: F,
}

impl<F: Fetcher> Installer<F> {
    pub fn new(store: ArchiveStore, fetcher: F) -> Self {
        Self { store, fetcher }
    }

    /// Return the cached archive for `version`, downloading it first if needed.
    pub async fn ensure_archive(&self, version: &GoVersion) -> Result<(PathBuf, ArchiveSource)> {
        self.store.ensure_dirs()?;

        if let Ok(cached) = self.store.locate_cached(version) {
            return Ok((cached, ArchiveSource::Cache));
        }

        let dest = self.store.archive_path(version);
        self.fetcher.fetch_archive(version, &dest).await?;
        Ok((dest, ArchiveSource::Downloaded))
    }

    /// Download (if needed) and unpack `version`. Returns the install directory.
    pub async fn install(&self, version: &GoVersion) -> Result<(PathBuf, ArchiveSource)> {
        let (archive, source) = self.ensure_archive(version).await?;

        let action = match source {
            ArchiveSource::Cache => "Reinstalling",
            ArchiveSource::Downloaded => "Installing",
        };
        println!(
            "{} {} for {}",
            action.green().bold(),
            version.dir_name().cyan(),
            self.store.platform().to_string().yellow()
        );

        let install_dir = self.unpack(&archive, version)?;
        Ok((install_dir, source))
    }

    /// Unpack a cached archive into `versions_dir/go{version}`, replacing any previous tree.
    pub fn unpack(&self, archive: &Path, version: &GoVersion) -> Result<PathBuf> {
        self.store.ensure_dirs()?;

        let install_dir = self.store.install_dir(version);
        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(self.store.versions_dir())?;

        extract_archive(archive, staging.path())?;

        if install_dir.exists() {
            std::fs::remove_dir_all(&install_dir)?;
        }
        std::fs::rename(staging.path(), &install_dir)?;
        // nothing left at the staging path for the guard to clean up
        drop(staging);

        tracing::debug!("Unpacked {} into {}", archive.display(), install_dir.display());
        Ok(install_dir)
    }
}

/// Extract an archive, stripping its single top-level folder.
pub fn extract_archive(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .map_err(|e| GovmError::ConfigError(e.to_string()))?,
    );
    pb.set_message("Extracting...");

    std::fs::create_dir_all(dest_dir)?;

    let file_name = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") {
        extract_tar_gz(archive_path, dest_dir)?;
    } else if file_name.ends_with(".zip") {
        extract_zip(archive_path, dest_dir)?;
    } else {
        pb.abandon();
        return Err(GovmError::ExtractionFailed(format!(
            "Unsupported archive format: {}",
            file_name
        )));
    }

    pb.finish_with_message("Extraction complete");
    Ok(())
}

/// Drop the first path component; `None` for the root itself or unsafe paths.
fn strip_root(path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    components.next()?;

    let stripped: PathBuf = components.collect();
    let safe = stripped
        .components()
        .all(|c| matches!(c, Component::Normal(_)));

    (safe && !stripped.as_os_str().is_empty()).then_some(stripped)
}

fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let tar_gz = File::open(archive_path)?;
    let tar = GzDecoder::new(tar_gz);
    let mut archive = Archive::new(tar);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();

        let Some(stripped) = strip_root(&path) else {
            continue;
        };

        let dest_path = dest_dir.join(&stripped);
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&dest_path)?;
    }

    Ok(())
}

fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| GovmError::ExtractionFailed(e.to_string()))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| GovmError::ExtractionFailed(e.to_string()))?;

        let Some(stripped) = file.enclosed_name().and_then(|p| strip_root(&p)) else {
            continue;
        };
        let outpath = dest_dir.join(stripped);

        if file.is_dir() {
            std::fs::create_dir_all(&outpath)?;
        } else {
            if let Some(p) = outpath.parent() {
                std::fs::create_dir_all(p)?;
            }
            let mut outfile = File::create(&outpath)?;
            std::io::copy(&mut file, &mut outfile)?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))?;
            }
        }
    }

    Ok(())
}
