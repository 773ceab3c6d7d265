// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Homebrew package manager.
//!
//! Homebrew doubles as the installer of package-manager tools, and as the
//! supplier of dependencies for everything else. If Homebrew is missing, it
//! is bootstrapped with its official install script, which only works on
//! macOS.

use crate::{
    config::{PackageManagerConfig, ToolConfig},
    install::{InstallError, Result, Strategy},
    state::ToolSource,
    syscall::{CommandRunner, Syscall},
};

use serde_json::Value;
use std::cell::Cell;
use tracing::{debug, info, instrument, warn};

/// Name of the Homebrew executable.
pub const BREW: &str = "brew";

const BOOTSTRAP_SCRIPT: &str = concat!(
    r#"/bin/bash -c "$(curl -fsSL "#,
    r#"https://raw.githubusercontent.com/Homebrew/install/HEAD/install.sh)""#,
);

/// Package manager strategy backed by Homebrew.
#[derive(Debug)]
pub struct PackageManager<'r, R>
where
    R: CommandRunner,
{
    runner: &'r R,
    config: PackageManagerConfig,
    dry_run: bool,
    platform: &'static str,
    ensured: Cell<bool>,
}

impl<'r, R> PackageManager<'r, R>
where
    R: CommandRunner,
{
    /// Construct new package manager for the current platform.
    pub fn new(runner: &'r R, config: PackageManagerConfig, dry_run: bool) -> Self {
        Self {
            runner,
            config,
            dry_run,
            platform: std::env::consts::OS,
            ensured: Cell::new(false),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_platform(mut self, platform: &'static str) -> Self {
        self.platform = platform;
        self
    }

    /// Check if Homebrew is on the search path.
    pub fn is_available(&self) -> bool {
        self.runner.locate(BREW).is_some()
    }

    /// Make sure Homebrew is installed and its index is up to date.
    ///
    /// Only does its work once. Later calls return right away.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::UnsupportedOs`] if Homebrew is missing on
    ///   anything but macOS.
    /// - Return [`InstallError::Bootstrap`] if the install script fails.
    #[instrument(skip(self), level = "debug")]
    pub fn ensure_installed(&self) -> Result<()> {
        if self.ensured.get() {
            return Ok(());
        }

        if self.is_available() {
            debug!("package manager already installed");
            self.update();
        } else {
            if self.platform != "macos" {
                return Err(InstallError::UnsupportedOs {
                    os: self.platform.into(),
                });
            }

            if self.dry_run {
                info!("[dry run] would install package manager");
            } else {
                info!("installing package manager");
                self.runner
                    .run_interactive(&Syscall::shell(BOOTSTRAP_SCRIPT).forward_stdin())
                    .map_err(InstallError::Bootstrap)?;
            }
        }

        self.ensured.set(true);
        Ok(())
    }

    /// Update package index. Failure is only a warning.
    pub fn update(&self) {
        if !self.config.auto_update {
            debug!("automatic package index update disabled");
            return;
        }

        if self.dry_run {
            info!("[dry run] would update package index");
            return;
        }

        info!("updating package index");
        if let Err(error) = self.runner.run_captured(&Syscall::new(BREW).arg("update")) {
            warn!("failed to update package index, continuing anyway: {error}");
        }
    }

    /// Check if package is installed as either a formula or a cask.
    ///
    /// Always false in a dry run, since nothing gets queried.
    pub fn is_package_installed(&self, package: &str) -> bool {
        if self.dry_run {
            return false;
        }

        ["--formula", "--cask"].into_iter().any(|kind| {
            self.runner
                .run_captured(&Syscall::new(BREW).args(["list", kind, package]))
                .is_ok()
        })
    }

    /// Install every listed package that is not installed yet.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::Package`] for the first package that fails.
    pub fn install_packages(&self, packages: &[String]) -> Result<()> {
        self.ensure_installed()?;
        for package in packages {
            self.install_package(package, &[])?;
        }

        Ok(())
    }

    /// Install package with extra arguments, unless it is installed already.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::Package`] if installation fails.
    #[instrument(skip(self, args), level = "debug")]
    pub fn install_package(&self, package: &str, args: &[String]) -> Result<()> {
        if self.is_package_installed(package) {
            info!("package {package} already installed");
            return Ok(());
        }

        let syscall = Syscall::new(BREW).arg("install").args(args).arg(package);
        if self.dry_run {
            info!("[dry run] would run {syscall}");
            return Ok(());
        }

        info!("installing package {package}");
        self.runner
            .run_interactive(&syscall)
            .map_err(|err| InstallError::Package {
                package: package.into(),
                source: err,
            })
    }

    /// Query installed version of package.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::VersionQuery`] if the query fails.
    /// - Return [`InstallError::VersionFormat`] if no version is reported.
    pub fn installed_version(&self, package: &str) -> Result<String> {
        let output = self
            .runner
            .run_captured(&Syscall::new(BREW).args(["info", "--json=v2", package]))
            .map_err(|err| InstallError::VersionQuery {
                package: package.into(),
                source: err,
            })?;

        parse_installed_version(&output).ok_or_else(|| InstallError::VersionFormat {
            package: package.into(),
        })
    }

    /// Remove stale downloads and old versions. Failure is only a warning.
    pub fn cleanup(&self) {
        if !self.config.cleanup_after {
            debug!("package manager cleanup disabled");
            return;
        }

        if self.dry_run {
            info!("[dry run] would clean up package manager");
            return;
        }

        info!("cleaning up package manager");
        if let Err(error) = self.runner.run_captured(&Syscall::new(BREW).arg("cleanup")) {
            warn!("package manager cleanup failed: {error}");
        }
    }
}

impl<R> Strategy for PackageManager<'_, R>
where
    R: CommandRunner,
{
    fn source(&self) -> ToolSource {
        ToolSource::PackageManager
    }

    fn install(&self, name: &str, tool: &ToolConfig) -> Result<()> {
        self.ensure_installed()?;
        self.install_package(name, &tool.package_args)
    }
}

/// Extract installed version from `brew info --json=v2` output.
///
/// Formulae list every installed version, the first of which is used. Casks
/// report a single installed version.
pub fn parse_installed_version(json: &str) -> Option<String> {
    let info: Value = serde_json::from_str(json).ok()?;
    info.pointer("/formulae/0/installed/0/version")
        .or_else(|| info.pointer("/casks/0/installed"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}
