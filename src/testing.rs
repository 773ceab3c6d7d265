// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Recording fakes for unit tests.

use crate::{
    install::{
        source::CheckoutTarget,
        vcs::{SourceControl, SourceControlError},
    },
    syscall::{CommandRunner, Syscall, SyscallError},
};

use std::{
    cell::RefCell,
    fs::create_dir_all,
    path::{Path, PathBuf},
    process::ExitStatus,
};

/// Command runner that records every command instead of running it.
///
/// Commands succeed with empty output unless told otherwise. Matching is done
/// by prefix against the command line as displayed, e.g., "brew list" matches
/// "brew list --formula git".
#[derive(Debug, Default)]
pub(crate) struct FakeRunner {
    calls: RefCell<Vec<Syscall>>,
    failures: Vec<String>,
    outputs: Vec<(String, String)>,
    programs: Vec<String>,
}

impl FakeRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make program resolvable on the fake search path.
    pub(crate) fn with_program(mut self, program: impl Into<String>) -> Self {
        self.programs.push(program.into());
        self
    }

    /// Make commands starting with prefix fail.
    pub(crate) fn failing(mut self, prefix: impl Into<String>) -> Self {
        self.failures.push(prefix.into());
        self
    }

    /// Make commands starting with prefix print output.
    pub(crate) fn with_output(
        mut self,
        prefix: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        self.outputs.push((prefix.into(), output.into()));
        self
    }

    /// Every command run so far, in order.
    pub(crate) fn recorded(&self) -> Vec<Syscall> {
        self.calls.borrow().clone()
    }

    /// Every command line run so far, in order.
    pub(crate) fn lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(ToString::to_string).collect()
    }

    fn record(&self, syscall: &Syscall) -> Result<String, SyscallError> {
        let line = syscall.to_string();
        self.calls.borrow_mut().push(syscall.clone());

        if self.failures.iter().any(|prefix| line.starts_with(prefix.as_str())) {
            return Err(SyscallError::Failed {
                command: line,
                status: failed_status(),
                message: "fake failure".into(),
            });
        }

        Ok(self
            .outputs
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default())
    }
}

impl CommandRunner for FakeRunner {
    fn run_interactive(&self, syscall: &Syscall) -> Result<(), SyscallError> {
        self.record(syscall).map(|_| ())
    }

    fn run_captured(&self, syscall: &Syscall) -> Result<String, SyscallError> {
        self.record(syscall)
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        self.programs
            .iter()
            .any(|known| known == program)
            .then(|| PathBuf::from("/usr/local/bin").join(program))
    }
}

#[cfg(unix)]
fn failed_status() -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(1 << 8)
}

#[cfg(windows)]
fn failed_status() -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(1)
}

/// Source control that records operations instead of touching the network.
///
/// Cloning creates an empty ".git" directory at the destination so that later
/// runs see the repository as present.
#[derive(Debug, Default)]
pub(crate) struct FakeSourceControl {
    operations: RefCell<Vec<String>>,
    failures: Vec<String>,
}

impl FakeSourceControl {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make operations whose name starts with prefix fail, e.g., "pull".
    pub(crate) fn failing(mut self, prefix: impl Into<String>) -> Self {
        self.failures.push(prefix.into());
        self
    }

    /// Every operation performed so far, in order.
    pub(crate) fn operations(&self) -> Vec<String> {
        self.operations.borrow().clone()
    }

    fn record(&self, operation: String) -> Result<(), SourceControlError> {
        let fails = self
            .failures
            .iter()
            .any(|prefix| operation.starts_with(prefix.as_str()));
        self.operations.borrow_mut().push(operation);

        if fails {
            return Err(SourceControlError::Git2(git2::Error::from_str("fake failure")));
        }

        Ok(())
    }
}

impl SourceControl for FakeSourceControl {
    fn clone_repo(&self, url: &str, path: &Path) -> Result<(), SourceControlError> {
        self.record(format!("clone {url} {}", path.display()))?;
        create_dir_all(path.join(".git")).map_err(|err| {
            SourceControlError::Git2(git2::Error::from_str(&err.to_string()))
        })
    }

    fn fetch(&self, path: &Path) -> Result<(), SourceControlError> {
        self.record(format!("fetch {}", path.display()))
    }

    fn checkout(&self, path: &Path, target: &CheckoutTarget) -> Result<(), SourceControlError> {
        self.record(format!("checkout {} {target}", path.display()))
    }

    fn pull(&self, path: &Path, branch: &str) -> Result<(), SourceControlError> {
        self.record(format!("pull {} {branch}", path.display()))
    }
}
