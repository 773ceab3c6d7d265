// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Source control for source builds.
//!
//! Source builds need four things from source control: clone a remote
//! repository, fetch new history, checkout a branch or pinned revision, and
//! fast-forward a branch to its remote counterpart. The [`SourceControl`]
//! trait captures exactly that, and [`Git2SourceControl`] implements it with
//! libgit2.
//!
//! Network operations display their progress through a progress bar. If the
//! remote requires credentials, then the progress bar is suspended while the
//! user is prompted for them.

use crate::install::source::CheckoutTarget;

use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    build::{CheckoutBuilder, RepoBuilder},
    AutotagOption, BranchType, Config, FetchOptions, RemoteCallbacks, Repository,
};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::{Password, Text};
use std::{
    path::Path,
    time::{Duration, Instant},
};
use tracing::{debug, info, instrument};

/// Layer of indirection for source control operations.
pub trait SourceControl {
    /// Clone remote repository at URL into path.
    fn clone_repo(&self, url: &str, path: &Path) -> Result<()>;

    /// Fetch new history and tags from "origin".
    fn fetch(&self, path: &Path) -> Result<()>;

    /// Checkout branch or pinned revision.
    fn checkout(&self, path: &Path, target: &CheckoutTarget) -> Result<()>;

    /// Fast-forward local branch to its counterpart on "origin".
    fn pull(&self, path: &Path, branch: &str) -> Result<()>;
}

/// Source control through libgit2.
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2SourceControl;

impl SourceControl for Git2SourceControl {
    #[instrument(skip(self), level = "debug")]
    fn clone_repo(&self, url: &str, path: &Path) -> Result<()> {
        let bar = progress_bar(url)?;
        let result = with_fetch_options(bar.clone(), |fo| {
            RepoBuilder::new().fetch_options(fo).clone(url, path)?;
            Ok(())
        });
        bar.finish_and_clear();

        result
    }

    #[instrument(skip(self), level = "debug")]
    fn fetch(&self, path: &Path) -> Result<()> {
        let repo = Repository::open(path)?;
        let mut remote = repo.find_remote("origin")?;
        let message = remote.url().unwrap_or("origin").to_string();

        let bar = progress_bar(&message)?;
        let result = with_fetch_options(bar.clone(), |mut fo| {
            remote.fetch(&[] as &[&str], Some(&mut fo), None)?;
            Ok(())
        });
        bar.finish_and_clear();

        result
    }

    #[instrument(skip(self), level = "debug")]
    fn checkout(&self, path: &Path, target: &CheckoutTarget) -> Result<()> {
        let repo = Repository::open(path)?;
        match target {
            CheckoutTarget::Branch(branch) => {
                let local = match repo.find_branch(branch, BranchType::Local) {
                    Ok(local) => local,
                    Err(_) => {
                        debug!("create local branch {branch} from origin/{branch}");
                        let upstream = format!("origin/{branch}");
                        let commit = repo
                            .find_branch(&upstream, BranchType::Remote)?
                            .get()
                            .peel_to_commit()?;
                        let mut local = repo.branch(branch, &commit, false)?;
                        local.set_upstream(Some(&upstream))?;
                        local
                    }
                };

                let refname = local
                    .get()
                    .name()
                    .ok_or_else(|| SourceControlError::InvalidReference {
                        name: branch.clone(),
                    })?
                    .to_string();
                let commit = local.get().peel_to_commit()?;
                repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))?;
                repo.set_head(&refname)?;
            }
            CheckoutTarget::Revision(revision) => {
                let object = repo
                    .revparse_single(revision)
                    .or_else(|_| repo.revparse_single(&format!("origin/{revision}")))?;
                let commit = object.peel_to_commit()?;
                repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))?;
                repo.set_head_detached(commit.id())?;
            }
        }

        info!("checked out {target} in {:?}", path.display());
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn pull(&self, path: &Path, branch: &str) -> Result<()> {
        self.fetch(path)?;

        let repo = Repository::open(path)?;
        let upstream = repo.find_reference(&format!("refs/remotes/origin/{branch}"))?;
        let incoming = repo.reference_to_annotated_commit(&upstream)?;
        let (analysis, _) = repo.merge_analysis(&[&incoming])?;
        if analysis.is_up_to_date() {
            debug!("{branch} already up to date");
            return Ok(());
        }

        if !analysis.is_fast_forward() {
            return Err(SourceControlError::NotFastForward {
                branch: branch.into(),
            });
        }

        let refname = format!("refs/heads/{branch}");
        let mut reference = repo.find_reference(&refname)?;
        reference.set_target(incoming.id(), &format!("fast-forward {branch}"))?;
        repo.set_head(&refname)?;
        repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
        info!("fast-forwarded {branch} to {}", incoming.id());

        Ok(())
    }
}

fn progress_bar(message: &str) -> Result<ProgressBar> {
    let style = ProgressStyle::with_template(
        "{elapsed_precise:.green}  {msg:<50}  [{wide_bar:.yellow/blue}]",
    )?
    .progress_chars("-Cco.");
    let bar = ProgressBar::new(0);
    bar.set_style(style);
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));

    Ok(bar)
}

// INVARIANT: Fetch options only live as long as the operation using them.
fn with_fetch_options<T>(
    bar: ProgressBar,
    operation: impl FnOnce(FetchOptions<'_>) -> Result<T>,
) -> Result<T> {
    let prompter = IndicatifPrompter::new(bar);
    let authenticator = GitAuthenticator::default().set_prompter(prompter.clone());
    let config = Config::open_default()?;

    let mut throttle = Instant::now();
    let mut rc = RemoteCallbacks::new();
    rc.credentials(authenticator.credentials(&config));
    rc.transfer_progress(|progress| {
        let stats = progress.to_owned();
        if throttle.elapsed() > Duration::from_millis(10) {
            throttle = Instant::now();
            prompter.bar.set_length(stats.total_objects() as u64);
            prompter.bar.set_position(stats.received_objects() as u64);
        }
        true
    });

    let mut fo = FetchOptions::new();
    fo.remote_callbacks(rc);
    fo.download_tags(AutotagOption::All);
    operation(fo)
}

/// Git2 authentication prompter for progress bar.
#[derive(Debug, Clone)]
pub struct IndicatifPrompter {
    pub(crate) bar: ProgressBar,
}

impl IndicatifPrompter {
    /// Construct new progress bar authenticator.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Prompter for IndicatifPrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.bar.suspend(|| {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.bar
            .suspend(|| Password::new("password").without_confirmation().prompt().ok())
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required with ssh key at {}", ssh_key_path.display());
        self.bar
            .suspend(|| Password::new("passphrase").without_confirmation().prompt().ok())
    }
}

/// Source control error types.
#[derive(Debug, thiserror::Error)]
pub enum SourceControlError {
    /// Local branch diverged from its remote counterpart.
    #[error("cannot fast-forward {branch:?} to origin/{branch}")]
    NotFastForward { branch: String },

    /// Reference name is not valid UTF-8.
    #[error("invalid reference name for {name:?}")]
    InvalidReference { name: String },

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),

    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = SourceControlError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs::write;

    fn commit_file(repo: &Repository, file: &str, contents: &str) -> anyhow::Result<git2::Oid> {
        let workdir = repo.workdir().ok_or_else(|| anyhow::anyhow!("bare repository"))?;
        write(workdir.join(file), contents)?;

        let mut index = repo.index()?;
        index.add_path(Path::new(file))?;
        index.write()?;
        let tree = repo.find_tree(index.write_tree()?)?;
        let signature = Signature::now("devtool", "devtool@example.com")?;
        let parents = match repo.head() {
            Ok(head) => vec![head.peel_to_commit()?],
            Err(_) => Vec::new(),
        };
        let parents = parents.iter().collect::<Vec<_>>();

        Ok(repo.commit(Some("HEAD"), &signature, &signature, contents, &tree, &parents)?)
    }

    fn upstream() -> anyhow::Result<Repository> {
        let repo = Repository::init("upstream")?;
        repo.set_head("refs/heads/master")?;
        Ok(repo)
    }

    fn upstream_url() -> anyhow::Result<String> {
        Ok(std::env::current_dir()?.join("upstream").display().to_string())
    }

    #[sealed_test]
    fn clone_then_checkout_pinned_revision() -> anyhow::Result<()> {
        let origin = upstream()?;
        let first = commit_file(&origin, "VERSION", "1")?;
        commit_file(&origin, "VERSION", "2")?;
        origin.tag_lightweight("v1", &origin.find_object(first, None)?, false)?;

        let vcs = Git2SourceControl;
        vcs.clone_repo(&upstream_url()?, Path::new("clone"))?;
        assert_eq!(std::fs::read_to_string("clone/VERSION")?, "2");

        vcs.checkout(Path::new("clone"), &CheckoutTarget::Revision("v1".into()))?;
        assert_eq!(std::fs::read_to_string("clone/VERSION")?, "1");
        assert!(Repository::open("clone")?.head_detached()?);

        Ok(())
    }

    #[sealed_test]
    fn pull_fast_forwards_floating_branch() -> anyhow::Result<()> {
        let origin = upstream()?;
        commit_file(&origin, "VERSION", "1")?;

        let vcs = Git2SourceControl;
        vcs.clone_repo(&upstream_url()?, Path::new("clone"))?;
        vcs.checkout(Path::new("clone"), &CheckoutTarget::Branch("master".into()))?;

        let newest = commit_file(&origin, "VERSION", "2")?;
        vcs.pull(Path::new("clone"), "master")?;

        let clone = Repository::open("clone")?;
        assert_eq!(clone.head()?.peel_to_commit()?.id(), newest);
        assert_eq!(std::fs::read_to_string("clone/VERSION")?, "2");

        Ok(())
    }

    #[sealed_test]
    fn checkout_missing_revision_fails() -> anyhow::Result<()> {
        let origin = upstream()?;
        commit_file(&origin, "VERSION", "1")?;

        let vcs = Git2SourceControl;
        vcs.clone_repo(&upstream_url()?, Path::new("clone"))?;
        let result = vcs.checkout(Path::new("clone"), &CheckoutTarget::Revision("v9.9.9".into()));
        assert!(result.is_err());

        Ok(())
    }
}
