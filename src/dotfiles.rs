// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Dotfile deployment.
//!
//! Place every mapped source under the dotfile source root at its target
//! path, either as a copy or as a symlink. All sources are validated before
//! anything is touched. An existing target is backed up first when the
//! machine prefers backups and a backup directory is configured.
//!
//! Backups are named `<basename>.<YYYYmmdd_HHMMSS>.backup`.

use crate::{
    config::{DeployStrategy, DotfilesConfig},
    state::{StateError, StateStore},
};

use chrono::Local;
use ignore::WalkBuilder;
use mkdirp::mkdirp;
use std::{
    fs::{copy, remove_dir_all, remove_file, symlink_metadata},
    io,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Deploy dotfile mappings.
#[derive(Debug)]
pub struct DotfileDeployer<'a> {
    config: &'a DotfilesConfig,
    dry_run: bool,
}

impl<'a> DotfileDeployer<'a> {
    /// Construct new deployer of target dotfile configuration.
    pub fn new(config: &'a DotfilesConfig, dry_run: bool) -> Self {
        Self { config, dry_run }
    }

    /// Deploy every mapping, returning how many were deployed.
    ///
    /// If any backup is taken, then the state's last backup time is refreshed
    /// and saved.
    ///
    /// # Errors
    ///
    /// - Return [`DotfilesError::MissingSource`] if any source does not
    ///   exist, before anything is deployed.
    /// - Return [`DotfilesError`] if backup, removal, or placement fails.
    /// - Return [`DotfilesError::State`] if state cannot be saved.
    #[instrument(skip(self, store), level = "debug")]
    pub fn deploy(&self, store: &mut StateStore) -> Result<usize> {
        if self.config.mappings.is_empty() {
            info!("no dotfile mappings configured");
            return Ok(0);
        }

        let mappings = self
            .config
            .mappings
            .iter()
            .map(|(source, target)| (self.config.source_root.join(source), target.as_path()))
            .collect::<Vec<_>>();
        for (source, _) in &mappings {
            if symlink_metadata(source).is_err() {
                return Err(DotfilesError::MissingSource { path: source.clone() });
            }
        }

        let backup_dir = self
            .config
            .backup_dir
            .as_deref()
            .filter(|_| store.state().preferences.backup_before_changes);

        let mut backed_up = false;
        for (source, target) in &mappings {
            if let Some(backup_dir) = backup_dir {
                backed_up |= self.backup(target, backup_dir)?;
            }
            self.place(source, target)?;
        }

        if backed_up && !self.dry_run {
            store.mark_backup();
            store.save()?;
        }

        info!("deployed {} dotfiles", mappings.len());
        Ok(mappings.len())
    }

    fn backup(&self, target: &Path, backup_dir: &Path) -> Result<bool> {
        if symlink_metadata(target).is_err() {
            return Ok(false);
        }

        let basename = target
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".into());
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let destination = backup_dir.join(format!("{basename}.{timestamp}.backup"));

        if self.dry_run {
            info!(
                "[dry run] would back up {:?} to {:?}",
                target.display(),
                destination.display()
            );
            return Ok(true);
        }

        info!("backing up {:?} to {:?}", target.display(), destination.display());
        copy_path(target, &destination, CopyFilter::Everything).map_err(|err| {
            DotfilesError::Backup {
                source: err,
                path: target.to_path_buf(),
            }
        })?;

        Ok(true)
    }

    fn place(&self, source: &Path, target: &Path) -> Result<()> {
        if self.dry_run {
            info!(
                "[dry run] would {} {:?} to {:?}",
                strategy_verb(self.config.strategy),
                source.display(),
                target.display()
            );
            return Ok(());
        }

        remove_path(target).map_err(|err| DotfilesError::Remove {
            source: err,
            path: target.to_path_buf(),
        })?;

        debug!(
            "{} {:?} to {:?}",
            strategy_verb(self.config.strategy),
            source.display(),
            target.display()
        );
        let placed = match self.config.strategy {
            DeployStrategy::Copy => copy_path(source, target, CopyFilter::Deployable),
            DeployStrategy::Symlink => link_path(source, target),
        };

        placed.map_err(|err| DotfilesError::Place {
            source: err,
            path: target.to_path_buf(),
        })
    }
}

fn strategy_verb(strategy: DeployStrategy) -> &'static str {
    match strategy {
        DeployStrategy::Copy => "copy",
        DeployStrategy::Symlink => "symlink",
    }
}

fn remove_path(path: &Path) -> io::Result<()> {
    match symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => remove_dir_all(path),
        Ok(_) => remove_file(path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Which entries of a directory tree get copied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CopyFilter {
    /// Skip ".git" and anything ignore files exclude.
    Deployable,

    /// Copy every entry, ignored or not.
    Everything,
}

fn copy_path(source: &Path, destination: &Path, filter: CopyFilter) -> io::Result<()> {
    if !source.is_dir() {
        let parent = destination.parent().filter(|parent| !parent.as_os_str().is_empty());
        if let Some(parent) = parent {
            mkdirp(parent)?;
        }
        copy(source, destination)?;
        return Ok(());
    }

    let mut builder = WalkBuilder::new(source);
    match filter {
        CopyFilter::Deployable => builder
            .hidden(false)
            .require_git(false)
            .filter_entry(|entry| entry.file_name() != ".git"),
        CopyFilter::Everything => builder.standard_filters(false),
    };

    for entry in builder.build() {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let destination = destination.join(relative);

        if entry.file_type().is_some_and(|kind| kind.is_dir()) {
            mkdirp(&destination)?;
        } else {
            if let Some(parent) = destination.parent() {
                mkdirp(parent)?;
            }
            copy(entry.path(), &destination)?;
        }
    }

    Ok(())
}

fn link_path(source: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        mkdirp(parent)?;
    }

    let source = source.canonicalize()?;
    symlink(&source, target)
}

#[cfg(unix)]
fn symlink(source: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, target)
}

#[cfg(not(unix))]
fn symlink(_: &Path, _: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlink deployment is only supported on unix",
    ))
}

/// Dotfile deployment error types.
#[derive(Debug, thiserror::Error)]
pub enum DotfilesError {
    /// Mapped source does not exist.
    #[error("dotfile source {:?} does not exist", path.display())]
    MissingSource { path: PathBuf },

    /// Existing target could not be backed up.
    #[error("failed to back up {:?}", path.display())]
    Backup {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Existing target could not be removed.
    #[error("failed to remove {:?}", path.display())]
    Remove {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// Source could not be placed at target.
    #[error("failed to deploy dotfile to {:?}", path.display())]
    Place {
        #[source]
        source: io::Error,
        path: PathBuf,
    },

    /// State could not be saved after a backup.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Friendly result alias :3
pub type Result<T, E = DotfilesError> = std::result::Result<T, E>;
