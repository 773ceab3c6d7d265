// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use devtool::{
    config::{Config, ConfigError, LogFormat, LoggingConfig, ToolSelection},
    detect::ToolDetector,
    dotfiles::DotfileDeployer,
    install::{vcs::Git2SourceControl, RunOptions, ToolRunner},
    path::{default_build_root, default_config_file, default_state_file},
    state::StateStore,
    syscall::SystemRunner,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::exit};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "devtool [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file instead of ~/.devtool.yaml.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Log what would happen without changing anything.
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self, config: Config) -> Result<()> {
        match self.command {
            Command::Install(opts) => run_install(config, opts, self.dry_run),
            Command::Status(opts) => run_status(config, opts),
            Command::Configure => run_configure(config, self.dry_run),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Install declared tools that are missing or out of date.
    #[command(override_usage = "devtool install [options] [pattern]")]
    Install(InstallOptions),

    /// Show recorded installation state of this machine.
    #[command(override_usage = "devtool status [options]")]
    Status(StatusOptions),

    /// Deploy dotfile mappings.
    #[command(override_usage = "devtool configure [options]")]
    Configure,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct InstallOptions {
    /// Glob pattern to match tool names against.
    #[arg(value_name = "pattern")]
    pub pattern: Option<String>,

    /// Reinstall tools even if they are current.
    #[arg(short, long)]
    pub force: bool,

    /// Comma separated listing of tools to install.
    #[arg(short, long, value_delimiter = ',', value_name = "tool")]
    pub tools: Vec<String>,

    /// Only install tools of target profile.
    #[arg(short, long, value_name = "profile")]
    pub profile: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct StatusOptions {
    /// Check that recorded tools are still on the search path.
    #[arg(long)]
    pub check: bool,
}

fn main() {
    let cli = Cli::parse();
    let loaded = load_config(cli.config.clone());
    let logging = match &loaded {
        Ok((config, _)) => config.logging.clone(),
        Err(_) => LoggingConfig::default(),
    };
    init_logging(cli.verbose, &logging);

    let result = loaded.and_then(|(config, missing)| {
        if let Some(path) = missing {
            warn!("no configuration file at {:?}, using default tool set", path.display());
        }
        cli.run(config)
    });

    if let Err(error) = result {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

// INVARIANT: Verbose flag beats RUST_LOG, which beats the configuration file.
fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(logging.level.as_deref().unwrap_or("info")))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    match logging.format {
        LogFormat::Compact => {
            let layer = fmt::layer().compact().with_target(false).without_time();
            tracing_subscriber::registry().with(layer).with(filter).init();
        }
        LogFormat::Pretty => {
            let layer = fmt::layer().pretty().with_target(false).without_time();
            tracing_subscriber::registry().with(layer).with(filter).init();
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<(Config, Option<PathBuf>)> {
    let path = match path {
        Some(path) => path,
        None => default_config_file()?,
    };

    match Config::load(&path) {
        Ok(config) => Ok((config, None)),
        Err(ConfigError::NotFound { path }) => Ok((Config::with_default_tools(), Some(path))),
        Err(error) => Err(error.into()),
    }
}

fn run_install(config: Config, opts: InstallOptions, dry_run: bool) -> Result<()> {
    let selection = ToolSelection {
        pattern: opts.pattern,
        tools: opts.tools,
        profile: opts.profile.clone(),
    };
    let tools = config.select(&selection)?;

    let mut store = StateStore::open(default_state_file()?);
    if let Some(profile) = opts.profile {
        if dry_run {
            info!("[dry run] would set active profile to {profile}");
        } else {
            store.set_active_profile(profile);
            store.save()?;
        }
    }

    let options = RunOptions {
        dry_run,
        force: opts.force,
        build_root: default_build_root()?,
    };
    let runner = SystemRunner;
    let vcs = Git2SourceControl;
    let mut installer = ToolRunner::new(
        &mut store,
        &runner,
        &vcs,
        config.package_manager.clone(),
        options,
    );
    installer.install_tools(&tools)?;

    Ok(())
}

fn run_status(config: Config, opts: StatusOptions) -> Result<()> {
    let store = StateStore::open(default_state_file()?);
    let state = store.state();
    println!("machine:  {} ({})", state.machine_id, state.hostname);
    println!("platform: {}/{}", state.os, state.arch);
    println!("profile:  {}", state.active_profile);
    println!("updated:  {}", state.last_updated.to_rfc3339());
    if let Some(last_backup) = state.last_backup {
        println!("backup:   {}", last_backup.to_rfc3339());
    }

    if state.tools.is_empty() {
        println!("\nno tools recorded");
        return Ok(());
    }

    let runner = SystemRunner;
    let detector = ToolDetector::new(&runner);
    println!(
        "\n{:<16} {:<10} {:<20} {:<18} {:<26} binary",
        "name", "installed", "version", "source", "installed at"
    );
    for (name, status) in &state.tools {
        let binary = config
            .tools
            .get(name)
            .map(|tool| tool.binary_name(name))
            .unwrap_or(name);
        let installed = match (status.installed, opts.check) {
            (false, _) => "no",
            (true, true) if !detector.is_installed(binary) => "drifted",
            (true, _) => "yes",
        };
        let binary_path = status
            .binary_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "-".into());

        println!(
            "{:<16} {:<10} {:<20} {:<18} {:<26} {}",
            name,
            installed,
            status.version,
            status.source.to_string(),
            status.installed_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            binary_path
        );
    }

    Ok(())
}

fn run_configure(config: Config, dry_run: bool) -> Result<()> {
    let mut store = StateStore::open(default_state_file()?);
    DotfileDeployer::new(&config.dotfiles, dry_run).deploy(&mut store)?;

    Ok(())
}
