// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the YAML configuration file that declares which
//! tools devtool should install, how to install them, and where dotfiles
//! should be deployed.
//!
//! # General Layout
//!
//! ```yaml
//! version: "1"
//! tools:
//!   git:
//!     source: package-manager
//!   neovim:
//!     version: stable
//!     source: build
//!     binary: nvim
//!     build_config:
//!       repository: https://github.com/neovim/neovim.git
//!       build_steps: ["make CMAKE_BUILD_TYPE=Release"]
//!       install_steps: ["sudo make install"]
//!       dependencies: [cmake, gettext]
//! profiles:
//!   minimal:
//!     description: bare essentials
//!     include: [git]
//! dotfiles:
//!   source_root: ~/dotfiles
//!   backup_dir: ~/.devtool/backups
//!   mappings:
//!     zshrc: ~/.zshrc
//! ```
//!
//! Tools are keyed by name. The name doubles as the package name for the
//! package manager, and as the executable name unless `binary` says otherwise.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Top-level configuration.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Configuration schema version.
    pub version: String,

    /// Declared tools keyed by name.
    pub tools: BTreeMap<String, ToolConfig>,

    /// Named subsets of declared tools.
    pub profiles: BTreeMap<String, Profile>,

    /// Dotfile deployment settings.
    pub dotfiles: DotfilesConfig,

    /// Package manager behaviour.
    #[serde(alias = "homebrew")]
    pub package_manager: PackageManagerConfig,

    /// Logging behaviour.
    pub logging: LoggingConfig,

    /// Synchronization settings. Parsed, but not acted upon.
    pub sync: SyncConfig,
}

impl Config {
    /// Load configuration file at target path.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::NotFound`] if no file exists at target path.
    /// - Return [`ConfigError::Read`] if file cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file is not valid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = read_to_string(path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => ConfigError::NotFound {
                path: path.to_path_buf(),
            },
            _ => ConfigError::Read {
                source: err,
                path: path.to_path_buf(),
            },
        })?;

        data.parse()
    }

    /// Minimal configuration to fall back on when no configuration file
    /// exists.
    pub fn with_default_tools() -> Self {
        let mut tools = BTreeMap::new();
        tools.insert("git".into(), ToolConfig::default());
        tools.insert(
            "ripgrep".into(),
            ToolConfig {
                binary: Some("rg".into()),
                ..ToolConfig::default()
            },
        );
        tools.insert("fzf".into(), ToolConfig::default());

        Self {
            version: "1".into(),
            tools,
            ..Self::default()
        }
    }

    /// Narrow declared tools down to a selection.
    ///
    /// Profile membership is applied first, then the explicit tool listing,
    /// then the name pattern. The `enabled` flag is not considered here.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::UnknownProfile`] if selected profile is not
    ///   declared.
    /// - Return [`ConfigError::UnknownTool`] if an explicitly listed tool is
    ///   not declared.
    /// - Return [`ConfigError::Pattern`] if name pattern is invalid.
    pub fn select(&self, selection: &ToolSelection) -> Result<BTreeMap<String, ToolConfig>> {
        let mut selected = self.tools.clone();

        if let Some(name) = &selection.profile {
            let profile = self
                .profiles
                .get(name)
                .ok_or_else(|| ConfigError::UnknownProfile { name: name.clone() })?;
            selected.retain(|tool_name, tool| profile.includes(name, tool_name, tool));
        }

        if !selection.tools.is_empty() {
            if let Some(missing) = selection
                .tools
                .iter()
                .find(|name| !self.tools.contains_key(name.as_str()))
            {
                return Err(ConfigError::UnknownTool {
                    name: missing.clone(),
                });
            }
            selected.retain(|tool_name, _| selection.tools.contains(tool_name));
        }

        if let Some(pattern) = &selection.pattern {
            let pattern = glob::Pattern::new(pattern)?;
            selected.retain(|tool_name, _| pattern.matches(tool_name));
        }

        Ok(selected)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: Config = serde_yaml::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on all dotfile paths.
        let dotfiles = &mut config.dotfiles;
        dotfiles.source_root = expand_path(&dotfiles.source_root)?;
        dotfiles.backup_dir = dotfiles.backup_dir.as_deref().map(expand_path).transpose()?;
        for target in dotfiles.mappings.values_mut() {
            *target = expand_path(target)?;
        }

        Ok(config)
    }
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            serde_yaml::to_string(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Declared tool.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ToolConfig {
    /// Desired version. Empty means any version is acceptable.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Installation strategy to use.
    #[serde(default)]
    pub source: SourceKind,

    /// Packages to install through the package manager beforehand.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Build specification for source builds.
    #[serde(default, rename = "build_config", skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSpec>,

    /// Extra arguments handed to the package manager's install command.
    #[serde(default, alias = "homebrew_args", skip_serializing_if = "Vec::is_empty")]
    pub package_args: Vec<String>,

    /// Profiles this tool is tagged with.
    #[serde(default, rename = "profile", skip_serializing_if = "Vec::is_empty")]
    pub profiles: Vec<String>,

    /// Whether the tool should be processed at all.
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,

    /// Executable name if it differs from the tool name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
}

impl ToolConfig {
    /// Construct new enabled tool declaration using given source.
    pub fn new(source: SourceKind) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    /// Executable name to probe for given tool name.
    pub fn binary_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.binary.as_deref().unwrap_or(name)
    }
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            version: String::new(),
            source: SourceKind::default(),
            dependencies: Vec::new(),
            build: None,
            package_args: Vec::new(),
            profiles: Vec::new(),
            enabled: true,
            binary: None,
        }
    }
}

fn enabled_by_default() -> bool {
    true
}

/// Kind of installation strategy a tool declares.
///
/// Unrecognized kinds are kept as [`SourceKind::Unknown`] so that a single
/// bad declaration is rejected when that tool is processed, rather than
/// failing the whole configuration file.
#[derive(Debug, Default, PartialEq, Eq, Clone, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum SourceKind {
    #[default]
    PackageManager,
    Build,
    Script,
    Unknown(String),
}

impl From<String> for SourceKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "package-manager" | "homebrew" => Self::PackageManager,
            "build" => Self::Build,
            "script" => Self::Script,
            _ => Self::Unknown(kind),
        }
    }
}

impl From<SourceKind> for String {
    fn from(kind: SourceKind) -> Self {
        kind.to_string()
    }
}

impl Display for SourceKind {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::PackageManager => fmt.write_str("package-manager"),
            Self::Build => fmt.write_str("build"),
            Self::Script => fmt.write_str("script"),
            Self::Unknown(kind) => fmt.write_str(kind),
        }
    }
}

/// How to build a tool from source.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct BuildSpec {
    /// Remote repository to clone from.
    pub repository: String,

    /// Development branch to track for "nightly" or unpinned versions.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Shell commands that build the tool, in order.
    #[serde(default)]
    pub build_steps: Vec<String>,

    /// Shell commands that install the built tool, in order.
    #[serde(default)]
    pub install_steps: Vec<String>,

    /// Shell commands that clean a previous build. Failures are ignored.
    #[serde(default = "default_clean_steps")]
    pub clean_steps: Vec<String>,

    /// Packages to install through the package manager before building.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl BuildSpec {
    /// Construct new build specification for target repository.
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            branch: default_branch(),
            build_steps: Vec::new(),
            install_steps: Vec::new(),
            clean_steps: default_clean_steps(),
            dependencies: Vec::new(),
        }
    }
}

fn default_branch() -> String {
    "master".into()
}

fn default_clean_steps() -> Vec<String> {
    vec!["make distclean".into()]
}

/// Named subset of declared tools.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Profile {
    /// Brief description of the profile.
    pub description: String,

    /// Tools that belong to the profile.
    pub include: Vec<String>,

    /// Tools that never belong to the profile.
    pub exclude: Vec<String>,
}

impl Profile {
    fn includes(&self, profile_name: &str, tool_name: &str, tool: &ToolConfig) -> bool {
        let member = self.include.iter().any(|name| name == tool_name)
            || tool.profiles.iter().any(|name| name == profile_name);
        member && !self.exclude.iter().any(|name| name == tool_name)
    }
}

/// Dotfile deployment settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DotfilesConfig {
    /// Directory that all mapping sources are relative to.
    pub source_root: PathBuf,

    /// Directory to store backups of replaced targets in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,

    /// How to place sources at their targets.
    pub strategy: DeployStrategy,

    /// Source path relative to source root mapped to target path.
    pub mappings: BTreeMap<String, PathBuf>,
}

/// Placement method for deployed dotfiles.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStrategy {
    #[default]
    Copy,
    Symlink,
}

/// Package manager behaviour.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PackageManagerConfig {
    /// Update the package index before installing anything.
    pub auto_update: bool,

    /// Run the package manager's cleanup after all tools are processed.
    pub cleanup_after: bool,
}

impl Default for PackageManagerConfig {
    fn default() -> Self {
        Self {
            auto_update: true,
            cleanup_after: true,
        }
    }
}

/// Logging behaviour.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g., "info" or "devtool=debug".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Output format.
    pub format: LogFormat,
}

/// Log output format.
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

/// Synchronization settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSyncConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud: Option<CloudSyncConfig>,
}

#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GitSyncConfig {
    pub repository: String,
    pub branch: String,
    pub auth_type: String,
}

#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CloudSyncConfig {
    pub provider: String,
    pub bucket: String,
    pub region: String,
    pub prefix: String,
}

/// Which declared tools to operate on.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct ToolSelection {
    /// Glob pattern matched against tool names.
    pub pattern: Option<String>,

    /// Explicit listing of tool names.
    pub tools: Vec<String>,

    /// Profile to narrow tools down to.
    pub profile: Option<String>,
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())?.into_owned(),
    ))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file does not exist.
    #[error("no configuration file at {:?}", path.display())]
    NotFound { path: PathBuf },

    /// Configuration file cannot be read.
    #[error("failed to read configuration file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(serde_yaml::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(serde_yaml::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Selected profile is not declared.
    #[error("profile {name:?} is not declared")]
    UnknownProfile { name: String },

    /// Selected tool is not declared.
    #[error("tool {name:?} is not declared")]
    UnknownTool { name: String },

    /// Tool name pattern is invalid.
    #[error(transparent)]
    Pattern(#[from] glob::PatternError),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
