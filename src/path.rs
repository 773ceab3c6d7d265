// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that devtool needs
//! to read, write, or build inside of.
//!
//! # Data Directory Layout
//!
//! Everything devtool owns lives under `$HOME/.devtool`:
//!
//! - `state.json` holds the installation state of the current machine.
//! - `builds/<tool>` holds the working copy of each tool built from source.
//!
//! The configuration file lives outside of that directory at
//! `$HOME/.devtool.yaml` so it can be tracked with the rest of the user's
//! dotfiles.

use std::path::PathBuf;

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine absolute path to devtool's data directory.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn data_dir() -> Result<PathBuf> {
    home_dir().map(|path| path.join(".devtool"))
}

/// Determine default absolute path to the state file.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_state_file() -> Result<PathBuf> {
    data_dir().map(|path| path.join("state.json"))
}

/// Determine default absolute path to the root of all source build
/// directories.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_build_root() -> Result<PathBuf> {
    data_dir().map(|path| path.join("builds"))
}

/// Determine default absolute path to the configuration file.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_config_file() -> Result<PathBuf> {
    home_dir().map(|path| path.join(".devtool.yaml"))
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
