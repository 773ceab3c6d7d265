// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Build tools from source.
//!
//! Every source-built tool gets its own working copy at
//! `<build root>/<tool name>`. The working copy is cloned on first use, and
//! fetched on every use after that. Then the requested version is checked out,
//! previous build artifacts are cleaned, and the build steps followed by the
//! install steps are run from inside the working copy.
//!
//! # Version Resolution
//!
//! | Declared version     | Checked out                                  |
//! |----------------------|----------------------------------------------|
//! | empty or "nightly"   | development branch, pulled to latest         |
//! | "stable"             | "stable" branch, pulled to latest            |
//! | anything else        | that exact tag or revision, detached         |

use crate::{
    config::{BuildSpec, ToolConfig},
    install::{
        brew::PackageManager,
        vcs::SourceControl,
        InstallError, Result, Strategy,
    },
    state::ToolSource,
    syscall::{CommandRunner, Syscall},
};

use mkdirp::mkdirp;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// What to checkout in a working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutTarget {
    /// Floating branch that gets pulled to its latest commit.
    Branch(String),

    /// Pinned tag or revision.
    Revision(String),
}

impl CheckoutTarget {
    /// Resolve declared version against the development branch.
    pub fn resolve(version: &str, development_branch: &str) -> Self {
        match version {
            "" | "nightly" => Self::Branch(development_branch.into()),
            "stable" => Self::Branch("stable".into()),
            pinned => Self::Revision(pinned.into()),
        }
    }
}

impl Display for CheckoutTarget {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Branch(branch) => write!(fmt, "branch {branch}"),
            Self::Revision(revision) => write!(fmt, "revision {revision}"),
        }
    }
}

/// Which group of steps is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Build,
    Install,
}

impl Display for Stage {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Build => fmt.write_str("build"),
            Self::Install => fmt.write_str("install"),
        }
    }
}

/// Build from source strategy.
pub struct SourceBuild<'a, R, V>
where
    R: CommandRunner,
    V: SourceControl,
{
    brew: &'a PackageManager<'a, R>,
    runner: &'a R,
    vcs: &'a V,
    build_root: &'a Path,
    dry_run: bool,
}

impl<'a, R, V> SourceBuild<'a, R, V>
where
    R: CommandRunner,
    V: SourceControl,
{
    /// Construct new source build strategy.
    pub fn new(
        brew: &'a PackageManager<'a, R>,
        runner: &'a R,
        vcs: &'a V,
        build_root: &'a Path,
        dry_run: bool,
    ) -> Self {
        Self {
            brew,
            runner,
            vcs,
            build_root,
            dry_run,
        }
    }

    /// Clone or update working copy, then checkout the requested version.
    ///
    /// A failure to pull a floating branch only produces a warning. The
    /// build goes ahead with whatever the working copy has.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::BuildDir`] if build root cannot be created.
    /// - Return [`InstallError::Repository`] if clone, fetch, or checkout
    ///   fails.
    #[instrument(skip(self, spec), level = "debug")]
    pub fn prepare_repository(
        &self,
        name: &str,
        spec: &BuildSpec,
        version: &str,
    ) -> Result<PathBuf> {
        let repo_dir = self.build_root.join(name);
        let target = CheckoutTarget::resolve(version, &spec.branch);
        let repository_error = |err| InstallError::Repository {
            name: name.into(),
            source: err,
        };

        if self.dry_run {
            info!(
                "[dry run] would clone or update {} at {:?} and checkout {target}",
                spec.repository,
                repo_dir.display()
            );
            return Ok(repo_dir);
        }

        if repo_dir.join(".git").exists() {
            debug!("working copy of {name} exists, fetching updates");
            self.vcs.fetch(&repo_dir).map_err(repository_error)?;
        } else {
            mkdirp(self.build_root).map_err(|err| InstallError::BuildDir {
                path: self.build_root.to_path_buf(),
                source: err,
            })?;
            info!("cloning {} into {:?}", spec.repository, repo_dir.display());
            self.vcs
                .clone_repo(&spec.repository, &repo_dir)
                .map_err(repository_error)?;
        }

        self.vcs.checkout(&repo_dir, &target).map_err(repository_error)?;
        if let CheckoutTarget::Branch(branch) = &target {
            if let Err(error) = self.vcs.pull(&repo_dir, branch) {
                warn!(
                    "failed to pull latest changes of {name}, building what is checked out: {error}"
                );
            }
        }

        Ok(repo_dir)
    }

    // INVARIANT: Clean step failures never stop a build.
    fn clean(&self, repo_dir: &Path, spec: &BuildSpec) {
        for step in &spec.clean_steps {
            let syscall = Syscall::shell(step).current_dir(repo_dir);
            if self.dry_run {
                info!("[dry run] would run clean step: {step}");
                continue;
            }

            debug!("clean step: {step}");
            if let Err(error) = self.runner.run_captured(&syscall) {
                debug!("ignoring failed clean step: {error}");
            }
        }
    }

    fn run_steps(&self, name: &str, stage: Stage, repo_dir: &Path, steps: &[String]) -> Result<()> {
        if steps.is_empty() {
            debug!("no {stage} steps declared for {name}");
            return Ok(());
        }

        let total = steps.len();
        for (index, step) in steps.iter().enumerate() {
            let index = index + 1;
            info!(tool = name, step = %step, "{stage} step {index}/{total}");

            // Install steps commonly need sudo, which needs the terminal.
            let mut syscall = Syscall::shell(step).current_dir(repo_dir);
            if stage == Stage::Install {
                syscall = syscall.forward_stdin();
            }

            if self.dry_run {
                info!("[dry run] would run {stage} step: {step}");
                continue;
            }

            self.runner
                .run_interactive(&syscall)
                .map_err(|err| InstallError::Step {
                    name: name.into(),
                    stage,
                    index,
                    total,
                    source: err,
                })?;
        }

        Ok(())
    }
}

impl<R, V> Strategy for SourceBuild<'_, R, V>
where
    R: CommandRunner,
    V: SourceControl,
{
    fn source(&self) -> ToolSource {
        ToolSource::BuiltFromSource
    }

    fn install(&self, name: &str, tool: &ToolConfig) -> Result<()> {
        let spec = tool.build.as_ref().ok_or_else(|| InstallError::MissingBuildSpec {
            name: name.into(),
        })?;
        info!("building {name} from {}", spec.repository);

        if !spec.dependencies.is_empty() {
            info!("installing build dependencies of {name}: {}", spec.dependencies.join(", "));
            self.brew.install_packages(&spec.dependencies)?;
        }

        let repo_dir = self.prepare_repository(name, spec, &tool.version)?;
        if !spec.build_steps.is_empty() {
            self.clean(&repo_dir, spec);
        }
        self.run_steps(name, Stage::Build, &repo_dir, &spec.build_steps)?;
        self.run_steps(name, Stage::Install, &repo_dir, &spec.install_steps)?;

        Ok(())
    }
}
