// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command execution.
//!
//! Every package manager call, build step, and version probe goes through the
//! [`CommandRunner`] trait. Commands carry their own working directory rather
//! than relying on the process-wide current directory, so nothing has to be
//! changed and restored around a build.
//!
//! No timeout is applied to any command. Interactive commands inherit the
//! terminal so the user can answer prompts, e.g., a sudo password prompt
//! during an install step.

use std::{
    ffi::{OsStr, OsString},
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
};
use tracing::debug;

/// Description of one external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syscall {
    program: OsString,
    args: Vec<OsString>,
    current_dir: Option<PathBuf>,
    forward_stdin: bool,
}

impl Syscall {
    /// Construct new invocation of target program.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            forward_stdin: false,
        }
    }

    /// Construct new invocation of a shell command line through `sh -c`.
    pub fn shell(line: impl AsRef<str>) -> Self {
        Self::new("sh").args(["-c", line.as_ref()])
    }

    /// Append an argument.
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a listing of arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run command from target directory.
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Hand the terminal's standard input to the command.
    pub fn forward_stdin(mut self) -> Self {
        self.forward_stdin = true;
        self
    }

    pub fn program(&self) -> &OsStr {
        self.program.as_os_str()
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    pub fn forwards_stdin(&self) -> bool {
        self.forward_stdin
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        command
    }
}

impl Display for Syscall {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.program.to_string_lossy().as_ref())?;
        for arg in &self.args {
            write!(fmt, " {}", arg.to_string_lossy())?;
        }

        Ok(())
    }
}

/// Layer of indirection for running external commands.
pub trait CommandRunner {
    /// Run command attached to the terminal, blocking until it exits.
    fn run_interactive(&self, syscall: &Syscall) -> Result<()>;

    /// Run command with captured output, returning its standard output.
    fn run_captured(&self, syscall: &Syscall) -> Result<String>;

    /// Resolve program name on the system search path.
    fn locate(&self, program: &str) -> Option<PathBuf>;
}

/// Run commands on the real system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run_interactive(&self, syscall: &Syscall) -> Result<()> {
        debug!("run {syscall}");
        let mut command = syscall.to_command();
        if !syscall.forward_stdin {
            command.stdin(Stdio::null());
        }

        let status = command
            .spawn()
            .and_then(|mut child| child.wait())
            .map_err(|err| SyscallError::Spawn {
                source: err,
                command: syscall.to_string(),
            })?;
        if !status.success() {
            return Err(SyscallError::Failed {
                command: syscall.to_string(),
                status,
                message: String::new(),
            });
        }

        Ok(())
    }

    fn run_captured(&self, syscall: &Syscall) -> Result<String> {
        debug!("run {syscall}");
        let mut command = syscall.to_command();
        if !syscall.forward_stdin {
            command.stdin(Stdio::null());
        }

        let output = command.output().map_err(|err| SyscallError::Spawn {
            source: err,
            command: syscall.to_string(),
        })?;
        let stdout = chomp(String::from_utf8_lossy(output.stdout.as_slice()).into_owned());
        let stderr = chomp(String::from_utf8_lossy(output.stderr.as_slice()).into_owned());

        if !output.status.success() {
            return Err(SyscallError::Failed {
                command: syscall.to_string(),
                status: output.status,
                message: stderr,
            });
        }

        Ok(stdout)
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

// INVARIANT: Chomp trailing newlines.
fn chomp(message: String) -> String {
    message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message)
}

/// External command error types.
#[derive(Debug, thiserror::Error)]
pub enum SyscallError {
    /// Command could not be started at all.
    #[error("failed to run command {command:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        command: String,
    },

    /// Command ran, but exited unsuccessfully.
    #[error("command {command:?} failed with {status}{}", format_message(message))]
    Failed {
        command: String,
        status: ExitStatus,
        message: String,
    },
}

fn format_message(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(":\n{message}")
    }
}

/// Friendly result alias :3
pub type Result<T, E = SyscallError> = std::result::Result<T, E>;
