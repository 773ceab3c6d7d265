// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Bootstrap a development machine from one configuration file.
//!
//! Devtool reads a declarative list of tools, figures out which of them are
//! missing or out of date on the current machine, and installs those through
//! the right strategy: Homebrew, a build from source, or a custom script.
//! What got installed, at which version, and how, is recorded in a JSON state
//! file so that the next run only does what is left to do.
//!
//! # Currency
//!
//! A tool is __current__ when the state file says it is installed at the
//! expected version, and its executable can still be found on the search
//! path. Current tools are skipped entirely. Everything else gets installed,
//! even if the state file claims otherwise.
//!
//! # Dry Runs
//!
//! Every operation honors a dry-run mode that logs what would happen without
//! running commands, touching repositories, or writing state.

pub mod config;
pub mod detect;
pub mod dotfiles;
pub mod install;
pub mod path;
pub mod state;
pub mod syscall;

#[cfg(test)]
pub(crate) mod testing;
