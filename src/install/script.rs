// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Custom script installation.
//!
//! Tools may declare the "script" source, but no script format exists yet.
//! Such tools are rejected with [`InstallError::ScriptUnsupported`] instead
//! of being silently reported as installed.

use crate::{
    config::ToolConfig,
    install::{InstallError, Result, Strategy},
    state::ToolSource,
};

use tracing::info;

/// Custom script strategy.
#[derive(Debug, Default, Clone, Copy)]
pub struct CustomScript {
    dry_run: bool,
}

impl CustomScript {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

impl Strategy for CustomScript {
    fn source(&self) -> ToolSource {
        ToolSource::Script
    }

    fn install(&self, name: &str, _tool: &ToolConfig) -> Result<()> {
        if self.dry_run {
            info!("[dry run] would run custom script for {name}");
        }

        Err(InstallError::ScriptUnsupported { name: name.into() })
    }
}
