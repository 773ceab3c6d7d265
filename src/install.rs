// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tool installation.
//!
//! The [`ToolRunner`] drives a batch of declared tools to their installed
//! state. Each tool goes through the same steps:
//!
//! 1. Skip it if it is disabled.
//! 2. Skip it if it is current, i.e., recorded as installed at the expected
//!    version _and_ still found on the search path.
//! 3. Install its dependencies through the package manager.
//! 4. Hand it to the [`Strategy`] its source kind selects.
//! 5. Record the installation and save state right away.
//!
//! The first tool that fails ends the batch. Tools that were installed before
//! it stay installed and recorded.
//!
//! # Strategies
//!
//! - [`brew::PackageManager`] installs through Homebrew.
//! - [`source::SourceBuild`] clones a repository and runs build steps.
//! - [`script::CustomScript`] is declared, but not supported yet.

pub mod brew;
pub mod script;
pub mod source;
pub mod vcs;

use crate::{
    config::{PackageManagerConfig, SourceKind, ToolConfig},
    detect::{ToolDetector, UNKNOWN_VERSION},
    install::{
        brew::PackageManager,
        script::CustomScript,
        source::{SourceBuild, Stage},
        vcs::{Git2SourceControl, SourceControl, SourceControlError},
    },
    state::{StateError, StateStore, ToolSource, ToolStatus},
    syscall::{CommandRunner, SyscallError, SystemRunner},
};

use chrono::Utc;
use std::{collections::BTreeMap, path::PathBuf};
use tracing::{debug, info, instrument, warn};

/// Installation strategy for one kind of tool source.
pub trait Strategy {
    /// How tools installed through this strategy are recorded.
    fn source(&self) -> ToolSource;

    /// Install named tool according to its declaration.
    fn install(&self, name: &str, tool: &ToolConfig) -> Result<()>;
}

/// Options that hold for a whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Log what would happen without changing anything.
    pub dry_run: bool,

    /// Reinstall tools even if they are current.
    pub force: bool,

    /// Directory holding one working copy per source-built tool.
    pub build_root: PathBuf,
}

/// What happened to one tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Installed,
    Current,
    Disabled,
}

/// Tally of a finished batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub installed: Vec<String>,
    pub current: Vec<String>,
    pub disabled: Vec<String>,
}

impl RunSummary {
    fn tally(&mut self, name: &str, outcome: Outcome) {
        let bucket = match outcome {
            Outcome::Installed => &mut self.installed,
            Outcome::Current => &mut self.current,
            Outcome::Disabled => &mut self.disabled,
        };
        bucket.push(name.into());
    }
}

/// Drive declared tools to their installed state.
#[derive(Debug)]
pub struct ToolRunner<'a, R = SystemRunner, V = Git2SourceControl>
where
    R: CommandRunner,
    V: SourceControl,
{
    store: &'a mut StateStore,
    runner: &'a R,
    vcs: &'a V,
    brew: PackageManager<'a, R>,
    options: RunOptions,
}

impl<'a, R, V> ToolRunner<'a, R, V>
where
    R: CommandRunner,
    V: SourceControl,
{
    /// Construct new tool runner.
    pub fn new(
        store: &'a mut StateStore,
        runner: &'a R,
        vcs: &'a V,
        package_manager: PackageManagerConfig,
        options: RunOptions,
    ) -> Self {
        let brew = PackageManager::new(runner, package_manager, options.dry_run);
        Self {
            store,
            runner,
            vcs,
            brew,
            options,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_platform(mut self, platform: &'static str) -> Self {
        self.brew = self.brew.with_platform(platform);
        self
    }

    /// Install every tool in the batch, in name order.
    ///
    /// The package manager is made available once up front if any enabled
    /// tool needs it, and cleaned up once at the end.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::Tool`] for the first tool that fails.
    /// - Return [`InstallError`] if the package manager cannot be made
    ///   available.
    #[instrument(skip(self, tools), level = "debug")]
    pub fn install_tools(&mut self, tools: &BTreeMap<String, ToolConfig>) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut enabled = Vec::new();
        for (name, tool) in tools {
            if tool.enabled {
                enabled.push((name, tool));
            } else {
                debug!("{name} is disabled, skipping");
                summary.tally(name, Outcome::Disabled);
            }
        }

        if enabled.is_empty() {
            info!("no tools enabled for installation");
            return Ok(summary);
        }

        let needs_package_manager = enabled.iter().any(|(_, tool)| uses_package_manager(tool));
        if needs_package_manager {
            self.brew.ensure_installed()?;
        }

        info!("processing {} tools", enabled.len());
        for (name, tool) in enabled {
            let outcome = self.install_tool(name, tool).map_err(|err| InstallError::Tool {
                name: name.clone(),
                source: Box::new(err),
            })?;
            summary.tally(name, outcome);
        }

        if needs_package_manager {
            self.brew.cleanup();
        }

        info!(
            "all tools processed: {} installed, {} current, {} disabled",
            summary.installed.len(),
            summary.current.len(),
            summary.disabled.len()
        );
        Ok(summary)
    }

    /// Install a single tool unless it is disabled or current.
    ///
    /// # Errors
    ///
    /// - Return [`InstallError::UnknownSource`] if source kind is unknown.
    /// - Return [`InstallError::MissingBuildSpec`] if a source build has no
    ///   build configuration.
    /// - Return [`InstallError`] if any step of the installation fails.
    /// - Return [`InstallError::State`] if state cannot be saved afterwards.
    #[instrument(skip(self, tool), level = "debug")]
    pub fn install_tool(&mut self, name: &str, tool: &ToolConfig) -> Result<Outcome> {
        if !tool.enabled {
            debug!("{name} is disabled, skipping");
            return Ok(Outcome::Disabled);
        }

        if self.is_current(name, tool) {
            info!(tool = name, "already current, skipping");
            return Ok(Outcome::Current);
        }

        check_source(name, tool)?;
        info!(tool = name, source = %tool.source, "installing");
        if !tool.dependencies.is_empty() {
            info!("installing dependencies of {name}: {}", tool.dependencies.join(", "));
            self.brew.install_packages(&tool.dependencies)?;
        }

        let source = self.dispatch(name, tool)?;
        self.record(name, tool, source)?;
        info!(tool = name, "installed");

        Ok(Outcome::Installed)
    }

    /// Check if a tool needs no work.
    ///
    /// A tool is current if force mode is off, recorded state says it is
    /// installed at the expected version, and its executable is still on the
    /// search path. Anything else means it gets installed again.
    pub fn is_current(&self, name: &str, tool: &ToolConfig) -> bool {
        if self.options.force {
            debug!("force mode enabled, {name} will be reinstalled");
            return false;
        }

        if !self.store.is_tool_current(name, &tool.version) {
            debug!("{name} is not recorded as current");
            return false;
        }

        let binary = tool.binary_name(name);
        if !ToolDetector::new(self.runner).is_installed(binary) {
            warn!("{name} is recorded as installed, but {binary} is not on the search path");
            return false;
        }

        true
    }

    fn dispatch(&self, name: &str, tool: &ToolConfig) -> Result<ToolSource> {
        let build;
        let script;
        let strategy: &dyn Strategy = match &tool.source {
            SourceKind::PackageManager => &self.brew,
            SourceKind::Build => {
                build = SourceBuild::new(
                    &self.brew,
                    self.runner,
                    self.vcs,
                    &self.options.build_root,
                    self.options.dry_run,
                );
                &build
            }
            SourceKind::Script => {
                script = CustomScript::new(self.options.dry_run);
                &script
            }
            SourceKind::Unknown(kind) => {
                return Err(InstallError::UnknownSource {
                    name: name.into(),
                    kind: kind.clone(),
                })
            }
        };

        strategy.install(name, tool)?;
        Ok(strategy.source())
    }

    // INVARIANT: Dry runs never touch the state file.
    fn record(&mut self, name: &str, tool: &ToolConfig, source: ToolSource) -> Result<()> {
        if self.options.dry_run {
            debug!("dry run, not recording {name}");
            return Ok(());
        }

        let detector = ToolDetector::new(self.runner);
        let binary = tool.binary_name(name);
        let detected = match source {
            ToolSource::PackageManager => self
                .brew
                .installed_version(name)
                .map_err(|error| warn!("{error}"))
                .ok(),
            _ => detector
                .version(binary)
                .map_err(|error| warn!("{error}"))
                .ok(),
        };
        let version = detected
            .filter(|version| version != UNKNOWN_VERSION)
            .or_else(|| (!tool.version.is_empty()).then(|| tool.version.clone()))
            .unwrap_or_else(|| UNKNOWN_VERSION.into());

        let now = Utc::now();
        self.store.set_status(
            name,
            ToolStatus {
                installed: true,
                version,
                installed_at: now,
                last_checked: now,
                source,
                binary_path: detector.locate(binary),
                config_current: true,
            },
        );
        self.store.save()?;

        Ok(())
    }
}

// INVARIANT: Configuration mistakes are reported before any command runs,
//            including dependency installation.
fn check_source(name: &str, tool: &ToolConfig) -> Result<()> {
    match &tool.source {
        SourceKind::Unknown(kind) => Err(InstallError::UnknownSource {
            name: name.into(),
            kind: kind.clone(),
        }),
        SourceKind::Build if tool.build.is_none() => Err(InstallError::MissingBuildSpec {
            name: name.into(),
        }),
        _ => Ok(()),
    }
}

fn uses_package_manager(tool: &ToolConfig) -> bool {
    tool.source == SourceKind::PackageManager
        || !tool.dependencies.is_empty()
        || tool
            .build
            .as_ref()
            .is_some_and(|build| !build.dependencies.is_empty())
}

/// Installation error types.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// Named tool failed, ending the batch.
    #[error("failed to install {name:?}")]
    Tool {
        name: String,
        #[source]
        source: Box<InstallError>,
    },

    /// Tool declares a source kind nobody knows how to handle.
    #[error("unknown installation source {kind:?} for {name:?}")]
    UnknownSource { name: String, kind: String },

    /// Tool is built from source, but has no build configuration.
    #[error("{name:?} is built from source, but declares no build configuration")]
    MissingBuildSpec { name: String },

    /// Custom script installation was requested.
    #[error("custom script installation is not supported yet, cannot install {name:?}")]
    ScriptUnsupported { name: String },

    /// Package manager is missing, and cannot be bootstrapped here.
    #[error("package manager can only be bootstrapped on macos, not {os}")]
    UnsupportedOs { os: String },

    /// Package manager bootstrap script failed.
    #[error("failed to bootstrap package manager")]
    Bootstrap(#[source] SyscallError),

    /// Package manager failed to install a package.
    #[error("failed to install package {package:?}")]
    Package {
        package: String,
        #[source]
        source: SyscallError,
    },

    /// Package manager failed to report an installed version.
    #[error("failed to query installed version of {package:?}")]
    VersionQuery {
        package: String,
        #[source]
        source: SyscallError,
    },

    /// Package manager reported something other than an installed version.
    #[error("no installed version of {package:?} reported by package manager")]
    VersionFormat { package: String },

    /// Working copy of a source build could not be prepared.
    #[error("failed to prepare repository of {name:?}")]
    Repository {
        name: String,
        #[source]
        source: SourceControlError,
    },

    /// Build root directory could not be created.
    #[error("failed to create build directory at {:?}", path.display())]
    BuildDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Build or install step of a source build failed.
    #[error("{stage} step {index}/{total} of {name:?} failed")]
    Step {
        name: String,
        stage: Stage,
        index: usize,
        total: usize,
        #[source]
        source: SyscallError,
    },

    /// State could not be saved after an installation.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Friendly result alias :3
pub type Result<T, E = InstallError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::BuildSpec,
        state::StateStore,
        testing::{FakeRunner, FakeSourceControl},
    };
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::path::Path;

    const BREW_INFO: &str =
        r#"{"formulae":[{"name":"ripgrep","installed":[{"version":"14.1.0"}]}],"casks":[]}"#;

    fn options() -> RunOptions {
        RunOptions {
            dry_run: false,
            force: false,
            build_root: PathBuf::from("builds"),
        }
    }

    fn recorded(version: &str, source: ToolSource) -> ToolStatus {
        ToolStatus {
            installed: true,
            version: version.into(),
            installed_at: Utc::now(),
            last_checked: Utc::now(),
            source,
            binary_path: None,
            config_current: true,
        }
    }

    fn tools(
        entries: impl IntoIterator<Item = (&'static str, ToolConfig)>,
    ) -> BTreeMap<String, ToolConfig> {
        entries
            .into_iter()
            .map(|(name, tool)| (name.to_string(), tool))
            .collect()
    }

    fn widget() -> ToolConfig {
        let mut build = BuildSpec::new("https://example.com/widget.git");
        build.build_steps = vec!["make".into()];
        build.install_steps = vec!["make install".into()];
        build.clean_steps = Vec::new();

        let mut tool = ToolConfig::new(SourceKind::Build);
        tool.build = Some(build);
        tool
    }

    #[sealed_test]
    fn disabled_tool_is_left_alone() -> anyhow::Result<()> {
        let mut store = StateStore::fresh("state.json");
        let runner = FakeRunner::new().with_program("brew");
        let vcs = FakeSourceControl::new();
        let mut tool = ToolConfig::new(SourceKind::PackageManager);
        tool.enabled = false;

        let mut installer =
            ToolRunner::new(&mut store, &runner, &vcs, PackageManagerConfig::default(), options());
        let summary = installer.install_tools(&tools([("jq", tool)]))?;

        assert_eq!(summary.disabled, vec!["jq"]);
        assert!(runner.lines().is_empty());
        assert!(vcs.operations().is_empty());
        assert!(store.status("jq").is_none());
        assert!(!Path::new("state.json").exists());

        Ok(())
    }

    #[sealed_test]
    fn current_tool_is_skipped_without_mutation() -> anyhow::Result<()> {
        let mut store = StateStore::fresh("state.json");
        store.set_status("git", recorded("2.43.0", ToolSource::PackageManager));
        let before = store.status("git").cloned();

        let runner = FakeRunner::new().with_program("git");
        let vcs = FakeSourceControl::new();
        let mut tool = ToolConfig::new(SourceKind::PackageManager);
        tool.version = "2.43.0".into();

        let mut installer =
            ToolRunner::new(&mut store, &runner, &vcs, PackageManagerConfig::default(), options());
        let outcome = installer.install_tool("git", &tool)?;

        assert_eq!(outcome, Outcome::Current);
        assert!(runner.lines().is_empty());
        assert_eq!(store.status("git").cloned(), before);
        assert!(!Path::new("state.json").exists());

        Ok(())
    }

    #[sealed_test]
    fn recorded_tool_missing_from_search_path_is_reinstalled() -> anyhow::Result<()> {
        let mut store = StateStore::fresh("state.json");
        store.set_status("ripgrep", recorded("14.1.0", ToolSource::PackageManager));

        let runner = FakeRunner::new()
            .with_program("brew")
            .failing("brew list")
            .with_output("brew info", BREW_INFO);
        let vcs = FakeSourceControl::new();
        let mut tool = ToolConfig::new(SourceKind::PackageManager);
        tool.binary = Some("rg".into());

        let mut installer =
            ToolRunner::new(&mut store, &runner, &vcs, PackageManagerConfig::default(), options());
        let outcome = installer.install_tool("ripgrep", &tool)?;

        assert_eq!(outcome, Outcome::Installed);
        assert!(runner.lines().contains(&"brew install ripgrep".to_string()));

        Ok(())
    }

    #[sealed_test]
    fn force_reinstalls_current_tool() -> anyhow::Result<()> {
        let mut store = StateStore::fresh("state.json");
        store.set_status("ripgrep", recorded("14.1.0", ToolSource::PackageManager));

        let runner = FakeRunner::new()
            .with_program("brew")
            .with_program("ripgrep")
            .failing("brew list")
            .with_output("brew info", BREW_INFO);
        let vcs = FakeSourceControl::new();
        let tool = ToolConfig::new(SourceKind::PackageManager);

        let mut options = options();
        options.force = true;
        let mut installer =
            ToolRunner::new(&mut store, &runner, &vcs, PackageManagerConfig::default(), options);
        let outcome = installer.install_tool("ripgrep", &tool)?;

        assert_eq!(outcome, Outcome::Installed);
        assert!(runner.lines().contains(&"brew install ripgrep".to_string()));

        Ok(())
    }

    #[sealed_test]
    fn package_install_is_recorded_and_saved() -> anyhow::Result<()> {
        let mut store = StateStore::fresh("state.json");
        let runner = FakeRunner::new()
            .with_program("brew")
            .with_program("rg")
            .failing("brew list")
            .with_output("brew info", BREW_INFO);
        let vcs = FakeSourceControl::new();
        let mut tool = ToolConfig::new(SourceKind::PackageManager);
        tool.binary = Some("rg".into());
        tool.package_args = vec!["--quiet".into()];

        let before = Utc::now();
        let mut installer =
            ToolRunner::new(&mut store, &runner, &vcs, PackageManagerConfig::default(), options());
        let summary = installer.install_tools(&tools([("ripgrep", tool)]))?;

        assert_eq!(summary.installed, vec!["ripgrep"]);
        assert_eq!(
            runner.lines(),
            vec![
                "brew update",
                "brew list --formula ripgrep",
                "brew list --cask ripgrep",
                "brew install --quiet ripgrep",
                "brew info --json=v2 ripgrep",
                "brew cleanup",
            ]
        );

        let status = store.status("ripgrep").cloned().ok_or_else(|| anyhow::anyhow!("no record"))?;
        assert!(status.installed);
        assert!(status.config_current);
        assert_eq!(status.version, "14.1.0");
        assert_eq!(status.source, ToolSource::PackageManager);
        assert_eq!(status.binary_path, Some(PathBuf::from("/usr/local/bin/rg")));
        assert!(status.last_checked >= before);

        let saved = StateStore::load("state.json")?;
        assert_eq!(saved.status("ripgrep"), Some(&status));

        Ok(())
    }

    #[sealed_test]
    fn source_build_runs_steps_in_its_working_copy() -> anyhow::Result<()> {
        let mut store = StateStore::fresh("state.json");
        let runner = FakeRunner::new().with_output("widget --version", "widget 1.2.3\nbuilt today");
        let vcs = FakeSourceControl::new();

        let mut installer =
            ToolRunner::new(&mut store, &runner, &vcs, PackageManagerConfig::default(), options());
        installer.install_tools(&tools([("widget", widget())]))?;

        let steps = runner
            .recorded()
            .into_iter()
            .filter(|syscall| syscall.program() == "sh")
            .collect::<Vec<_>>();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].to_string(), "sh -c make");
        assert_eq!(steps[1].to_string(), "sh -c make install");
        for step in &steps {
            assert_eq!(step.working_dir(), Some(Path::new("builds/widget")));
        }

        let status = store.status("widget").cloned().ok_or_else(|| anyhow::anyhow!("no record"))?;
        assert_eq!(status.source, ToolSource::BuiltFromSource);
        assert_eq!(status.version, "widget 1.2.3");

        Ok(())
    }

    #[sealed_test]
    fn floating_source_target_records_detected_version() -> anyhow::Result<()> {
        let mut store = StateStore::fresh("state.json");
        let runner = FakeRunner::new()
            .with_program("nvim")
            .with_output("nvim --version", "NVIM v0.9.5\nBuild type: Release");
        let vcs = FakeSourceControl::new();
        let mut nvim = widget();
        nvim.version = "stable".into();

        let mut installer =
            ToolRunner::new(&mut store, &runner, &vcs, PackageManagerConfig::default(), options());
        installer.install_tool("nvim", &nvim)?;
        let current = installer.is_current("nvim", &nvim);

        let status = store.status("nvim").cloned().ok_or_else(|| anyhow::anyhow!("no record"))?;
        assert_eq!(status.version, "0.9.5");
        assert!(!current);

        Ok(())
    }

        #[sealed_test]
    fn failed_install_step_fails_only_that_tool() -> anyhow::Result<()> {
        let mut store = StateStore::fresh("state.json");
        let runner = FakeRunner::new().failing("sh -c make install");
        let vcs = FakeSourceControl::new();

        let mut installer =
            ToolRunner::new(&mut store, &runner, &vcs, PackageManagerConfig::default(), options());
        let result = installer.install_tool("widget", &widget());

        match result {
            Err(InstallError::Step { stage, index, total, .. }) => {
                assert_eq!(stage, Stage::Install);
                assert_eq!((index, total), (1, 1));
            }
            other => panic!("expected install step failure, got {other:?}"),
        }
        assert!(runner.lines().contains(&"sh -c make".to_string()));
        assert!(store.status("widget").is_none());
        assert!(!Path::new("state.json").exists());

        Ok(())
    }

    #[sealed_test]
    fn unknown_source_aborts_batch_without_installing() -> anyhow::Result<()> {
        let mut store = StateStore::fresh("state.json");
        let runner = FakeRunner::new().with_program("brew").failing("brew list");
        let vcs = FakeSourceControl::new();
        let ftp = ToolConfig::new(SourceKind::Unknown("ftp".into()));
        let zsh = ToolConfig::new(SourceKind::PackageManager);

        let mut installer =
            ToolRunner::new(&mut store, &runner, &vcs, PackageManagerConfig::default(), options());
        let result = installer.install_tools(&tools([("legacy", ftp), ("zsh", zsh)]));

        match result {
            Err(InstallError::Tool { name, source }) => {
                assert_eq!(name, "legacy");
                assert!(matches!(*source, InstallError::UnknownSource { .. }));
            }
            other => panic!("expected unknown source failure, got {other:?}"),
        }
        assert!(!runner.lines().iter().any(|line| line.starts_with("brew install")));
        assert!(vcs.operations().is_empty());
        assert!(store.status("legacy").is_none());
        assert!(store.status("zsh").is_none());

        Ok(())
    }

    #[sealed_test]
    fn unknown_source_is_rejected_before_dependencies() -> anyhow::Result<()> {
        let mut store = StateStore::fresh("state.json");
        let runner = FakeRunner::new().with_program("brew").failing("brew list");
        let vcs = FakeSourceControl::new();
        let mut ftp = ToolConfig::new(SourceKind::Unknown("ftp".into()));
        ftp.dependencies = vec!["curl".into()];

        let mut installer =
            ToolRunner::new(&mut store, &runner, &vcs, PackageManagerConfig::default(), options());
        let result = installer.install_tool("legacy", &ftp);

        assert!(matches!(result, Err(InstallError::UnknownSource { .. })));
        assert!(runner.lines().is_empty());

        Ok(())
    }

    #[sealed_test]
    fn missing_build_config_is_rejected_before_dependencies() -> anyhow::Result<()> {
        let mut store = StateStore::fresh("state.json");
        let runner = FakeRunner::new().with_program("brew").failing("brew list");
        let vcs = FakeSourceControl::new();
        let mut widget = ToolConfig::new(SourceKind::Build);
        widget.dependencies = vec!["cmake".into()];

        let mut installer =
            ToolRunner::new(&mut store, &runner, &vcs, PackageManagerConfig::default(), options());
        let result = installer.install_tool("widget", &widget);

        assert!(matches!(result, Err(InstallError::MissingBuildSpec { .. })));
        assert!(runner.lines().is_empty());
        assert!(vcs.operations().is_empty());
        assert!(store.status("widget").is_none());

        Ok(())
    }

    #[sealed_test]
    fn script_source_is_rejected() -> anyhow::Result<()> {
        let mut store = StateStore::fresh("state.json");
        let runner = FakeRunner::new();
        let vcs = FakeSourceControl::new();

        let mut installer =
            ToolRunner::new(&mut store, &runner, &vcs, PackageManagerConfig::default(), options());
        let result = installer.install_tool("dotsetup", &ToolConfig::new(SourceKind::Script));

        assert!(matches!(result, Err(InstallError::ScriptUnsupported { .. })));
        assert!(store.status("dotsetup").is_none());

        Ok(())
    }

    #[sealed_test]
    fn dry_run_changes_nothing() -> anyhow::Result<()> {
        let mut store = StateStore::fresh("state.json");
        let runner = FakeRunner::new().with_program("brew");
        let vcs = FakeSourceControl::new();
        let mut options = options();
        options.dry_run = true;

        let mut installer =
            ToolRunner::new(&mut store, &runner, &vcs, PackageManagerConfig::default(), options);
        let summary = installer.install_tools(&tools([
            ("ripgrep", ToolConfig::new(SourceKind::PackageManager)),
            ("widget", widget()),
        ]))?;

        assert_eq!(summary.installed, vec!["ripgrep", "widget"]);
        assert!(runner.lines().is_empty());
        assert!(vcs.operations().is_empty());
        assert!(store.status("ripgrep").is_none());
        assert!(!Path::new("state.json").exists());
        assert!(!Path::new("builds").exists());

        Ok(())
    }

    #[sealed_test]
    fn package_manager_is_prepared_once_per_batch() -> anyhow::Result<()> {
        let mut store = StateStore::fresh("state.json");
        let runner = FakeRunner::new()
            .with_program("brew")
            .failing("brew list")
            .with_output("brew info", BREW_INFO);
        let vcs = FakeSourceControl::new();
        let mut fzf = ToolConfig::new(SourceKind::PackageManager);
        fzf.dependencies = vec!["bat".into()];

        let mut installer =
            ToolRunner::new(&mut store, &runner, &vcs, PackageManagerConfig::default(), options());
        installer.install_tools(&tools([
            ("fzf", fzf),
            ("jq", ToolConfig::new(SourceKind::PackageManager)),
        ]))?;

        let lines = runner.lines();
        assert_eq!(lines.iter().filter(|line| *line == "brew update").count(), 1);
        assert_eq!(lines.iter().filter(|line| *line == "brew cleanup").count(), 1);
        let bat = lines.iter().position(|line| line == "brew install bat");
        let fzf = lines.iter().position(|line| line == "brew install fzf");
        assert!(bat.is_some() && bat < fzf);

        Ok(())
    }

    #[sealed_test]
    fn missing_package_manager_outside_macos_fails() -> anyhow::Result<()> {
        let mut store = StateStore::fresh("state.json");
        let runner = FakeRunner::new();
        let vcs = FakeSourceControl::new();

        let mut installer =
            ToolRunner::new(&mut store, &runner, &vcs, PackageManagerConfig::default(), options())
                .with_platform("linux");
        let jq = ToolConfig::new(SourceKind::PackageManager);
        let result = installer.install_tools(&tools([("jq", jq)]));

        assert!(matches!(result, Err(InstallError::UnsupportedOs { .. })));
        assert!(runner.lines().is_empty());

        Ok(())
    }
}
