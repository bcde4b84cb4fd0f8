// Copyright (c) 2025 the project contributors. Licensed under Apache License, Version 2.0.

//! Reference process entry point (C15, §4.14): layered configuration, logger
//! installation, default collaborator wiring, and the reactor loop itself.

use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;

use clap::Parser;
use hub_core::config::HubConfig;
use hub_core::hub::{Hub, HubCollaborators};
use hub_core::transport::LoopbackListener;

mod config_layers;

#[derive(Debug, Parser)]
#[command(name = "hub", about = "Single-process messaging hub")]
struct Cli {
    /// Path to a TOML configuration file, layered under environment and CLI overrides.
    #[arg(long, env = "HUB_CONFIG")]
    config: Option<PathBuf>,

    /// Hub's own identity. Overrides the config file and environment if given.
    #[arg(long)]
    uid: Option<u64>,

    #[arg(long, overrides_with = "no_listen")]
    listen: bool,

    #[arg(long, overrides_with = "listen")]
    no_listen: bool,

    /// 0 = error only, 4 = trace. Overrides the config file and environment if given.
    #[arg(long)]
    verbosity: Option<u8>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

fn install_logger(verbosity: u8, format: LogFormat) {
    let level = match verbosity {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

/// Refuses to start a second instance pointed at the same `path` (§6 `semaphore`). The
/// lock file is left behind on exit deliberately — a stale lock after a crash is a
/// problem for the operator to notice, not something this process should paper over by
/// deleting it on the way out.
fn acquire_semaphore(path: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    write!(file, "{}", std::process::id())
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let mut config = config_layers::load(cli.config.as_deref())?;
    if let Some(uid) = cli.uid {
        config.uid = uid;
    }
    if cli.no_listen {
        config.listen = false;
    } else if cli.listen {
        config.listen = true;
    }
    if let Some(verbosity) = cli.verbosity {
        config.verbosity = verbosity;
    }
    install_logger(config.verbosity, cli.log_format);

    if let Some(semaphore) = &config.semaphore {
        acquire_semaphore(semaphore).map_err(hub_core::error::HubError::from)?;
    }

    let resolved = config.resolve();
    tracing::info!(service = %resolved.service_name, kind = %resolved.service_type, "starting");

    let notifiers = build_notifiers(&resolved)?;
    let listener: Option<Box<dyn hub_core::transport::TransportListener>> =
        resolved.listen.then(|| Box::new(LoopbackListener::new()) as Box<dyn hub_core::transport::TransportListener>);
    let collaborators = HubCollaborators {
        identity: Box::new(hub_core::identity::IdentityMapping),
        codec: Box::new(hub_core::codec::LengthPrefixedCodec),
        hooks: Box::<hub_core::hooks::NoopHooks>::default(),
        listener,
    };

    let mut hub = Hub::configure(resolved, collaborators, notifiers)?;
    hub.setup()?;

    tracing::info!(uid = hub.uid().get(), "hub running");
    while hub.is_running() {
        hub.loop_once()?;
    }
    hub.cleanup();

    let info = hub.info();
    tracing::info!(?info, "hub stopped");
    std::process::exit(if info.healthy { 0 } else { 1 });
}

#[cfg(unix)]
fn build_notifiers(resolved: &hub_core::config::ResolvedConfig) -> miette::Result<hub_core::notifiers::NotifierSet> {
    let mut signals = vec![libc_sigint(), libc_sigterm()];
    if let Some(extra) = resolved.signal {
        signals.push(extra);
    }
    Ok(hub_core::notifiers::build_default(resolved.alarm_interval, &resolved.watch_path, &signals)?)
}

#[cfg(unix)]
fn libc_sigint() -> i32 { signal_hook::consts::SIGINT }

#[cfg(unix)]
fn libc_sigterm() -> i32 { signal_hook::consts::SIGTERM }
