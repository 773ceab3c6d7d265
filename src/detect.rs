// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tool detection.
//!
//! Answer two questions about an executable: is it on the search path, and
//! what version does it report? Version detection knows the output format of
//! a handful of common tools. Everything else gets a generic probe that tries
//! a few conventional version flags and keeps the first line of output.

use crate::syscall::{CommandRunner, Syscall, SyscallError, SystemRunner};

use std::path::PathBuf;
use tracing::{debug, instrument};

/// Version reported when a generic probe learns nothing.
pub const UNKNOWN_VERSION: &str = "unknown";

const VERSION_FLAGS: [&str; 3] = ["--version", "-v", "version"];

/// Detect presence and version of installed executables.
#[derive(Debug)]
pub struct ToolDetector<'r, R = SystemRunner>
where
    R: CommandRunner,
{
    runner: &'r R,
}

impl<'r, R> ToolDetector<'r, R>
where
    R: CommandRunner,
{
    /// Construct new detector probing through target runner.
    pub fn new(runner: &'r R) -> Self {
        Self { runner }
    }

    /// Check if executable resolves on the search path.
    pub fn is_installed(&self, binary: &str) -> bool {
        self.locate(binary).is_some()
    }

    /// Resolve absolute path of executable on the search path.
    pub fn locate(&self, binary: &str) -> Option<PathBuf> {
        self.runner.locate(binary)
    }

    /// Determine version string reported by executable.
    ///
    /// Known tools have their output parsed. Unknown tools fall back to a
    /// generic probe that never fails, but may answer [`UNKNOWN_VERSION`].
    ///
    /// # Errors
    ///
    /// - Return [`DetectError`] if a known tool's version command fails.
    #[instrument(skip(self), level = "debug")]
    pub fn version(&self, binary: &str) -> Result<String> {
        let (syscall, parse): (Syscall, fn(&str) -> String) = match binary {
            "go" => (Syscall::new("go").arg("version"), parse_go_version),
            "node" => (Syscall::new("node").arg("--version"), parse_node_version),
            "nvim" => (Syscall::new("nvim").arg("--version"), parse_nvim_version),
            "git" => (Syscall::new("git").arg("--version"), parse_git_version),
            _ => return Ok(self.probe_version(binary)),
        };

        let output = self
            .runner
            .run_captured(&syscall)
            .map_err(|err| DetectError { source: err, binary: binary.into() })?;

        Ok(parse(&output))
    }

    fn probe_version(&self, binary: &str) -> String {
        for flag in VERSION_FLAGS {
            match self.runner.run_captured(&Syscall::new(binary).arg(flag)) {
                Ok(output) => {
                    let line = output.lines().next().unwrap_or_default().trim();
                    if line.is_empty() {
                        return UNKNOWN_VERSION.into();
                    }
                    return line.into();
                }
                Err(error) => debug!("{binary} {flag} did not work: {error}"),
            }
        }

        UNKNOWN_VERSION.into()
    }
}

/// Parse `go version` output, e.g., "go version go1.21.0 darwin/arm64".
pub fn parse_go_version(output: &str) -> String {
    output
        .split_whitespace()
        .nth(2)
        .and_then(|word| word.strip_prefix("go"))
        .map(ToString::to_string)
        .unwrap_or_else(|| output.trim().into())
}

/// Parse `node --version` output, e.g., "v20.1.0".
pub fn parse_node_version(output: &str) -> String {
    let output = output.trim();
    output.strip_prefix('v').unwrap_or(output).into()
}

/// Parse `nvim --version` output, whose first line reads "NVIM v0.9.1".
pub fn parse_nvim_version(output: &str) -> String {
    output
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .map(|word| word.strip_prefix('v').unwrap_or(word).to_string())
        .unwrap_or_else(|| output.trim().into())
}

/// Parse `git --version` output, e.g., "git version 2.39.2".
pub fn parse_git_version(output: &str) -> String {
    output
        .split_whitespace()
        .nth(2)
        .map(ToString::to_string)
        .unwrap_or_else(|| output.trim().into())
}

/// Version command of a known tool failed.
#[derive(Debug, thiserror::Error)]
#[error("failed to detect version of {binary:?}")]
pub struct DetectError {
    #[source]
    source: SyscallError,
    binary: String,
}

/// Friendly result alias :3
pub type Result<T, E = DetectError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRunner;
    use simple_test_case::test_case;

    #[test_case(parse_go_version, "go version go1.21.0 darwin/arm64", "1.21.0"; "go")]
    #[test_case(parse_node_version, "v20.1.0", "20.1.0"; "node")]
    #[test_case(parse_nvim_version, "NVIM v0.9.1\nBuild type: Release", "0.9.1"; "nvim")]
    #[test_case(parse_git_version, "git version 2.39.2", "2.39.2"; "git")]
    #[test_case(parse_go_version, "weird", "weird"; "go_unexpected_format")]
    #[test]
    fn parse_known_version_output(parse: fn(&str) -> String, output: &str, expect: &str) {
        pretty_assertions::assert_eq!(parse(output), expect);
    }

    #[test]
    fn known_tool_uses_dedicated_parser() -> anyhow::Result<()> {
        let runner = FakeRunner::new().with_output("go version", "go version go1.22.3 linux/amd64");
        let detector = ToolDetector::new(&runner);
        assert_eq!(detector.version("go")?, "1.22.3");
        assert_eq!(runner.lines(), vec!["go version"]);

        Ok(())
    }

    #[test]
    fn known_tool_failure_is_an_error() {
        let runner = FakeRunner::new().failing("git --version");
        let detector = ToolDetector::new(&runner);
        assert!(detector.version("git").is_err());
    }

    #[test]
    fn generic_probe_keeps_first_line_of_first_working_flag() -> anyhow::Result<()> {
        let runner = FakeRunner::new()
            .failing("rg --version")
            .with_output("rg -v", "ripgrep 14.1.0\n-SIMD -AVX");
        let detector = ToolDetector::new(&runner);
        assert_eq!(detector.version("rg")?, "ripgrep 14.1.0");
        assert_eq!(runner.lines(), vec!["rg --version", "rg -v"]);

        Ok(())
    }

    #[test]
    fn generic_probe_answers_unknown_when_nothing_works() -> anyhow::Result<()> {
        let runner = FakeRunner::new().failing("mystery");
        let detector = ToolDetector::new(&runner);
        assert_eq!(detector.version("mystery")?, UNKNOWN_VERSION);
        assert_eq!(runner.lines().len(), VERSION_FLAGS.len());

        Ok(())
    }

    #[test]
    fn presence_follows_search_path() {
        let runner = FakeRunner::new().with_program("git");
        let detector = ToolDetector::new(&runner);
        assert!(detector.is_installed("git"));
        assert!(!detector.is_installed("fzf"));
    }
}
