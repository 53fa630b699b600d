use crate::config::{Config, Environment};
use crate::download::Downloader;
use crate::error::{GovmError, Result};
use crate::install::{ArchiveSource, Installer};
use crate::models::{GoVersion, VersionEntry, VersionStatus};
use crate::store::ArchiveStore;
use crate::uninstall::Uninstaller;
use crate::update::{SelfUpdater, UpdateOutcome};
use crate::utils::{confirm, dir_size, format_size, print_info, print_success, print_warning};
use crate::version_manager::{Activation, Removal, VersionManager};
use clap::{Parser, Subcommand};
use colored::*;
use std::ffi::OsString;

#[derive(Parser)]
#[command(name = "govm")]
#[command(about = "Go Version Manager", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(skip)]
    config: Config,
}

#[derive(Subcommand)]
enum Commands {
    /// Download, install and activate a Go version
    Install {
        /// Version to install (e.g., 1.22.0)
        version: String,
    },

    /// Switch to an installed or downloaded Go version
    Use {
        /// Version to use
        version: String,
    },

    /// List downloaded and installed Go versions
    #[command(alias = "ls")]
    List,

    /// Remove a Go version and its cached archive
    Rm {
        /// Version to remove
        version: String,
    },

    /// Update govm to the latest release
    Update,

    /// Remove govm, every installed version and its shell setup
    Uninstall,
}

impl Cli {
    pub fn new(config: Config) -> Result<Self> {
        Self::from_args(std::env::args_os(), config)
    }

    /// Parse `args`. `--help` and `--version` print and exit 0; usage errors
    /// come back as `InvalidArgument` so they share the normal error path.
    pub fn from_args<I, T>(args: I, config: Config) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let mut cli = match Self::try_parse_from(args) {
            Ok(cli) => cli,
            Err(e) if !e.use_stderr() => e.exit(),
            Err(e) => return Err(usage_error(&e)),
        };
        cli.config = config;
        Ok(cli)
    }

    pub async fn run(self, env: Environment) -> Result<()> {
        match self.command {
            Commands::Install { ref version } => self.install(version, env).await,
            Commands::Use { ref version } => self.use_version(version, env),
            Commands::List => self.list(env),
            Commands::Rm { ref version } => self.remove(version, env).await,
            Commands::Update => self.update(&env).await,
            Commands::Uninstall => self.uninstall(env),
        }
    }

    fn installer(&self, store: ArchiveStore) -> Result<Installer<Downloader>> {
        Ok(Installer::new(store, Downloader::new(&self.config)?))
    }

    async fn install(&self, version_str: &str, env: Environment) -> Result<()> {
        let version: GoVersion = version_str.parse()?;
        let minimum = self.config.minimum_version()?;
        if !version.is_at_least(&minimum) {
            return Err(GovmError::InvalidArgument(format!(
                "minimum supported version is {}. Please install an up-to-date version",
                minimum
            )));
        }

        let mut manager = VersionManager::new(&self.config, env);
        let installer = self.installer(manager.store().clone())?;

        if manager.store().status(&version).is_cached() {
            print_info(&format!("{} already downloaded", version.dir_name()));
        }

        let (install_dir, source) = installer.install(&version).await?;
        if source == ArchiveSource::Downloaded {
            tracing::debug!("Cached {}", manager.store().archive_name(&version));
        }

        print_success(&format!("{} installed successfully", version.dir_name()));
        println!("  Path: {}", install_dir.display().to_string().dimmed());

        let activation = manager.activate(&version)?;
        report_activation(&version, &activation);
        Ok(())
    }

    fn use_version(&self, version_str: &str, env: Environment) -> Result<()> {
        let version: GoVersion = version_str.parse()?;
        let mut manager = VersionManager::new(&self.config, env);

        match manager.store().status(&version) {
            VersionStatus::Neither => {
                return Err(GovmError::NotInstalled(version.to_string()));
            }
            VersionStatus::CachedOnly => {
                print_info(&format!(
                    "{} is downloaded but not installed, extracting it first",
                    version.dir_name()
                ));
                let installer = self.installer(manager.store().clone())?;
                let archive = manager.store().locate_cached(&version)?;
                installer.unpack(&archive, &version)?;
            }
            VersionStatus::Both | VersionStatus::InstalledOnly => {}
        }

        let activation = manager.activate(&version)?;
        report_activation(&version, &activation);
        Ok(())
    }

    fn list(&self, env: Environment) -> Result<()> {
        let manager = VersionManager::new(&self.config, env);
        let entries = manager.list_versions()?;

        if entries.is_empty() {
            print_warning("No Go versions installed");
            println!("\n{}", "Install a version:".yellow());
            println!("  govm install {}", self.config.minimum_version);
            return Ok(());
        }

        println!("{}", "Go Versions:".green().bold());
        for entry in &entries {
            println!("{}", format_entry(manager.store(), entry));
        }

        if !entries.iter().any(|e| e.active) {
            println!("\n{}", "Activate a version:".yellow());
            println!("  govm use <version>");
        }

        Ok(())
    }

    async fn remove(&self, version_str: &str, env: Environment) -> Result<()> {
        let version: GoVersion = version_str.parse()?;
        let manager = VersionManager::new(&self.config, env);

        let removal = manager
            .remove(&version, |v| {
                confirm(
                    &format!("Are you sure you want to remove {}?", v.dir_name()),
                    "Removal cancelled.",
                )
            })
            .await?;

        if removal == Removal::Removed {
            print_success(&format!("{} removed", version.dir_name()));
        }
        Ok(())
    }

    async fn update(&self, env: &Environment) -> Result<()> {
        println!("{}", "Updating govm - Go Version Manager".blue().bold());

        let updater = SelfUpdater::new(&self.config, env.platform)?;
        match updater.run().await? {
            UpdateOutcome::UpToDate { tag } => {
                print_info(&format!("govm is already up to date ({})", tag));
            }
            UpdateOutcome::Updated { tag, binary } => {
                print_success(&format!("govm has been updated to {}", tag));
                println!("  Path: {}", binary.display().to_string().dimmed());
            }
        }
        Ok(())
    }

    fn uninstall(&self, env: Environment) -> Result<()> {
        let uninstaller = Uninstaller::new(self.config.clone(), env)?;

        let removal = uninstaller.run(|targets| {
            println!("{}", "The following will be removed:".red().bold());
            for target in targets {
                println!("  {}", target.display());
            }
            confirm("Uninstall govm?", "Uninstall cancelled.")
        })?;

        if removal == Removal::Removed {
            print_success("govm has been uninstalled");
            println!("Restart your terminal to drop govm from PATH.");
        }
        Ok(())
    }
}

fn usage_error(e: &clap::Error) -> GovmError {
    let rendered = e.to_string();
    let first = rendered.lines().next().unwrap_or_default();
    GovmError::InvalidArgument(first.trim_start_matches("error: ").trim().to_string())
}

fn report_activation(version: &GoVersion, activation: &Activation) {
    match activation {
        Activation::AlreadyActive => {
            print_info(&format!("{} is already active", version.dir_name()));
        }
        Activation::Switched { profile } => {
            print_success(&format!(
                "Switched to {}. Run 'source {}' or restart your terminal to apply permanently.",
                version.dir_name(),
                profile.display()
            ));
        }
    }
}

fn format_entry(store: &ArchiveStore, entry: &VersionEntry) -> String {
    let prefix = if entry.active {
        "→".green().bold()
    } else {
        " ".normal()
    };

    let state = match entry.status {
        VersionStatus::Both => "installed".green(),
        VersionStatus::CachedOnly => "downloaded, not installed".yellow(),
        VersionStatus::InstalledOnly => "installed, archive missing".yellow(),
        VersionStatus::Neither => "missing".red(),
    };

    let size = if entry.status.is_installed() {
        dir_size(&store.install_dir(&entry.version))
    } else {
        std::fs::metadata(store.archive_path(&entry.version))
            .map(|m| m.len())
            .unwrap_or(0)
    };

    let active = if entry.active {
        format!(" {}", "(active)".green())
    } else {
        String::new()
    };

    format!(
        "  {} {}{}  {} {}",
        prefix,
        entry.version.dir_name().cyan(),
        active,
        state,
        format_size(size).dimmed()
    )
}
