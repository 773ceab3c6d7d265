// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Local installation state.
//!
//! Devtool remembers what it installed on the current machine inside of a
//! human-readable JSON file called the __state file__. The state file is the
//! single source of truth for whether a tool is _current_, i.e., installed at
//! a version that satisfies its declaration.
//!
//! # Ownership
//!
//! The [`StateStore`] exclusively owns the in-memory [`LocalState`] and is the
//! only writer of the state file. Everything else reads and writes tool
//! status through the store's accessors. The in-memory state is only valid
//! for the lifetime of one invocation. Nothing guards against two invocations
//! writing the same state file at once.
//!
//! # Machine Identity
//!
//! A machine identity is generated once from the host name and the creation
//! time of the state. It is _not_ a stable hardware fingerprint, so a wiped
//! state file yields a brand new identity.

use chrono::{DateTime, Utc};
use mkdirp::mkdirp;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

/// Current schema version of the state file.
pub const SCHEMA_VERSION: &str = "1.0";

/// Aggregate state of the current machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalState {
    pub machine_id: String,
    pub version: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
    pub hostname: String,
    pub os: String,
    pub arch: String,
    #[serde(rename = "installed_tools", default)]
    pub tools: BTreeMap<String, ToolStatus>,
    #[serde(default = "default_profile")]
    pub active_profile: String,
    #[serde(default)]
    pub preferences: MachinePreferences,
    #[serde(default)]
    pub last_backup: Option<DateTime<Utc>>,
}

impl LocalState {
    /// Construct fresh state for the current machine.
    ///
    /// Generates a new machine identity, and starts with no tools recorded.
    pub fn fresh() -> Self {
        let now = Utc::now();
        let hostname = sysinfo::System::host_name().unwrap_or_else(|| "unknown".into());

        Self {
            machine_id: format!("{hostname}-{}", now.timestamp()),
            version: SCHEMA_VERSION.into(),
            last_updated: now,
            last_sync: None,
            hostname,
            os: std::env::consts::OS.into(),
            arch: std::env::consts::ARCH.into(),
            tools: BTreeMap::new(),
            active_profile: default_profile(),
            preferences: MachinePreferences::default(),
            last_backup: None,
        }
    }
}

fn default_profile() -> String {
    "default".into()
}

/// Recorded installation status of one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStatus {
    pub installed: bool,
    pub version: String,
    pub installed_at: DateTime<Utc>,
    pub last_checked: DateTime<Utc>,
    pub source: ToolSource,
    #[serde(default)]
    pub binary_path: Option<PathBuf>,
    pub config_current: bool,
}

/// How a tool ended up installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolSource {
    #[serde(alias = "homebrew")]
    PackageManager,
    #[serde(alias = "built_from_source")]
    BuiltFromSource,
    Script,
}

impl std::fmt::Display for ToolSource {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PackageManager => fmt.write_str("package-manager"),
            Self::BuiltFromSource => fmt.write_str("built-from-source"),
            Self::Script => fmt.write_str("script"),
        }
    }
}

/// Per-machine preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachinePreferences {
    pub auto_update: bool,
    #[serde(alias = "build_neovim_from_source")]
    pub build_from_source: bool,
    pub backup_before_changes: bool,
}

impl Default for MachinePreferences {
    fn default() -> Self {
        Self {
            auto_update: true,
            build_from_source: false,
            backup_before_changes: true,
        }
    }
}

/// Durable store of local installation state.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    state: LocalState,
}

impl StateStore {
    /// Construct new store with fresh state backed by target path.
    ///
    /// Nothing is written until [`StateStore::save`] is called.
    pub fn fresh(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: LocalState::fresh(),
        }
    }

    /// Load state file at target path.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::Read`] if state file cannot be read.
    /// - Return [`StateError::Parse`] if state file is not valid.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        debug!("load state file {:?}", path.display());
        let data = read_to_string(&path).map_err(|err| StateError::Read {
            source: err,
            path: path.clone(),
        })?;
        let state = serde_json::from_str(&data).map_err(|err| StateError::Parse {
            source: err,
            path: path.clone(),
        })?;

        Ok(Self { path, state })
    }

    /// Load state file at target path, or start fresh.
    ///
    /// A missing state file just means this is the first run. A state file
    /// that cannot be read or parsed is reported, and replaced by fresh state
    /// on the next save.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path) {
            Ok(store) => store,
            Err(StateError::Read { source, .. })
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                debug!("no state file at {:?}, starting fresh", path.display());
                Self::fresh(path)
            }
            Err(error) => {
                warn!("{error}, starting with fresh state");
                Self::fresh(path)
            }
        }
    }

    /// Path to backing state file.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Current in-memory state.
    pub fn state(&self) -> &LocalState {
        &self.state
    }

    /// Lookup recorded status of a tool.
    pub fn status(&self, name: impl AsRef<str>) -> Option<&ToolStatus> {
        self.state.tools.get(name.as_ref())
    }

    /// Insert or overwrite recorded status of a tool.
    ///
    /// Always stamps `last_checked` with the current time, even if the caller
    /// already set it.
    pub fn set_status(&mut self, name: impl Into<String>, mut status: ToolStatus) {
        status.last_checked = Utc::now();
        self.state.tools.insert(name.into(), status);
    }

    /// Check if a tool is current according to recorded state alone.
    ///
    /// A tool is current if and only if it has a record, that record is marked
    /// installed, and either no version is expected or the recorded version
    /// equals the expected version.
    pub fn is_tool_current(
        &self,
        name: impl AsRef<str>,
        expected_version: impl AsRef<str>,
    ) -> bool {
        let expected_version = expected_version.as_ref();
        self.status(name).is_some_and(|status| {
            status.installed && (expected_version.is_empty() || status.version == expected_version)
        })
    }

    /// Set active profile name.
    pub fn set_active_profile(&mut self, name: impl Into<String>) {
        self.state.active_profile = name.into();
    }

    /// Record that a backup was just taken.
    pub fn mark_backup(&mut self) {
        self.state.last_backup = Some(Utc::now());
    }

    /// Write state to state file.
    ///
    /// Creates missing parent directories, and refreshes `last_updated`.
    ///
    /// # Errors
    ///
    /// - Return [`StateError::CreateDir`] if parent directory cannot be made.
    /// - Return [`StateError::Serialize`] if state cannot be serialized.
    /// - Return [`StateError::Write`] if state file cannot be written.
    #[instrument(skip(self), level = "debug")]
    pub fn save(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            mkdirp(parent).map_err(|err| StateError::CreateDir {
                source: err,
                path: parent.to_path_buf(),
            })?;
        }

        self.state.last_updated = Utc::now();
        let data = serde_json::to_string_pretty(&self.state)?;
        write(&self.path, data).map_err(|err| StateError::Write {
            source: err,
            path: self.path.clone(),
        })?;
        debug!("saved state file {:?}", self.path.display());

        Ok(())
    }
}

/// State store error types.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// State file cannot be read.
    #[error("failed to read state file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// State file is not valid JSON state.
    #[error("failed to parse state file at {:?}", path.display())]
    Parse {
        #[source]
        source: serde_json::Error,
        path: PathBuf,
    },

    /// Parent directory of state file cannot be created.
    #[error("failed to create state directory at {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// State cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),

    /// State file cannot be written.
    #[error("failed to write state file at {:?}", path.display())]
    Write {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = StateError> = std::result::Result<T, E>;
