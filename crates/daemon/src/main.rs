// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stargate Daemon (sgd)
//!
//! Background process federating the configured home-automation gateways
//! into one device model.
//!
//! Architecture:
//! - Gateway tasks: per-connection reader/sender pairs plus the watchdog
//! - Timer task: relative-delay callbacks for rules and polling
//! - Main task: signal handling and the periodic persistence checkpoint

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use sg_config::Config;
use sg_core::SystemClock;
use sg_house::{
    EmailConfig, EmailNotifyAdapter, House, NoOpNotifyAdapter, Notifier, NotifyAdapter, Reporter,
    ReportingConfig, Supervisor,
};
use sg_storage::Persistence;

/// What the command line asked for.
#[derive(Debug, PartialEq, Eq)]
enum Args {
    Run { config_path: String },
    Help,
    Version,
    Invalid(String),
}

fn parse_args(args: &[String]) -> Args {
    let mut config_path = "config.yaml".to_string();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--help" | "-h" | "help" => return Args::Help,
            "--version" | "-V" | "-v" => return Args::Version,
            "-c" | "--config" => match iter.next() {
                Some(path) => config_path = path.clone(),
                None => return Args::Invalid(format!("{arg} requires a path")),
            },
            other => return Args::Invalid(format!("unexpected argument '{other}'")),
        }
    }
    Args::Run { config_path }
}

fn print_help() {
    println!("sgd {}", env!("CARGO_PKG_VERSION"));
    println!("Stargate Daemon - federates home-automation gateways into one house");
    println!();
    println!("USAGE:");
    println!("    sgd [-c <config>]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config <path>    Configuration file (default: config.yaml)");
    println!("    -h, --help             Print help information");
    println!("    -v, --version          Print version information");
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config_path = match parse_args(&args) {
        Args::Help => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Args::Version => {
            println!("sgd {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Args::Invalid(message) => {
            eprintln!("error: {message}");
            eprintln!("Usage: sgd [-c <config>] [--help | --version]");
            return ExitCode::FAILURE;
        }
        Args::Run { config_path } => config_path,
    };

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(ref working_dir) = config.working_dir {
        if let Err(e) = std::env::set_current_dir(working_dir) {
            eprintln!("error: cannot chdir to {}: {e}", working_dir.display());
            return ExitCode::FAILURE;
        }
    }

    let _log_guard = match setup_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: cannot set up logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!(config = %config_path, "starting stargate daemon");
    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("daemon failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let clock = Arc::new(SystemClock);
    let persist = Arc::new(Persistence::open(
        &config.database.datafile,
        clock.clone(),
    )?);

    let notifier = build_notifier(&config);
    let reporter = Reporter::new(
        ReportingConfig {
            startup: config.reporting.startup.clone(),
            shutdown: config.reporting.shutdown.clone(),
            exception: config.reporting.exception.clone(),
        },
        Arc::clone(&notifier),
    );

    let house = House::new(
        &config.house.name,
        Arc::clone(&persist),
        notifier,
        clock,
    )?;

    // Route background-task failures to the exception reporting alias.
    let (supervisor, mut exceptions) = Supervisor::new();
    {
        let reporter = Arc::clone(&reporter);
        tokio::spawn(async move {
            while let Some(detail) = exceptions.recv().await {
                reporter.report_exception(&detail).await;
            }
        });
    }

    let plugins = sg_gateways::builtin_plugins();
    let loaded = sg_gateways::load_all(&house, &config.gateways, &plugins).await;
    if loaded == 0 {
        return Err("no gateways loaded".into());
    }
    info!(gateways = loaded, "gateways online");

    spawn_checkpoint(
        &supervisor,
        Arc::clone(&persist),
        config.database.checkpoint_interval,
    );

    reporter.report_startup().await;

    // Signal handling: INT/TERM/QUIT checkpoint and exit; HUP checkpoints
    // without exiting.
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;
    let mut sighup = signal(SignalKind::hangup())?;

    info!("stargate daemon ready");
    loop {
        tokio::select! {
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigquit.recv() => {
                info!("received SIGQUIT, shutting down");
                break;
            }
            _ = sighup.recv() => {
                info!("received SIGHUP, checkpointing");
                checkpoint(&persist);
            }
        }
    }

    // Flush a final checkpoint so time-in-state claims stay bounded across
    // the downtime, then say goodbye.
    checkpoint(&persist);
    reporter.report_shutdown().await;
    info!("stargate daemon stopped");
    Ok(())
}

fn build_notifier(config: &Config) -> Arc<Notifier> {
    let aliases: HashMap<String, Vec<(String, String)>> = config
        .notifications
        .recipients
        .iter()
        .map(|(alias, recipients)| (alias.clone(), recipients.clone()))
        .collect();

    let adapter: Arc<dyn NotifyAdapter> = match config.notifications.email {
        Some(ref email) => Arc::new(EmailNotifyAdapter::new(EmailConfig {
            smtp_host: email.smtp_host.clone(),
            sender: email.sender.clone(),
            use_ssl: email.use_ssl,
            credentials: email
                .authenticate
                .as_ref()
                .map(|auth| (auth.username.clone(), auth.password.clone())),
        })),
        None => Arc::new(NoOpNotifyAdapter),
    };
    Notifier::new(aliases, adapter)
}

fn checkpoint(persist: &Arc<Persistence>) {
    match persist.checkpoint_all() {
        Ok(devices) => info!(devices, "checkpoint complete"),
        Err(e) => warn!(error = %e, "checkpoint failed"),
    }
}

/// Spawn the periodic checkpoint task.
fn spawn_checkpoint(supervisor: &Supervisor, persist: Arc<Persistence>, interval_secs: u64) {
    let interval = Duration::from_secs(interval_secs.max(1));
    supervisor.spawn("checkpoint", async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so the startup burst
        // settles before the first checkpoint.
        timer.tick().await;
        loop {
            timer.tick().await;
            checkpoint(&persist);
        }
    });
}

fn setup_logging(
    config: &Config,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, std::io::Error> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            config
                .logging
                .filter_directives(&config.logging.console_level),
        )
    });
    let console_layer = fmt::layer().with_filter(console_filter);

    match config.logging.logfile_path(std::process::id()) {
        Some(logfile) => {
            let path = std::path::Path::new(&logfile);
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let directory = path.parent().filter(|p| !p.as_os_str().is_empty());
            let file_name = path
                .file_name()
                .ok_or_else(|| std::io::Error::other("logfile has no file name"))?;
            let appender = tracing_appender::rolling::never(
                directory.unwrap_or_else(|| std::path::Path::new(".")),
                file_name,
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let file_filter =
                EnvFilter::new(config.logging.filter_directives(&config.logging.level));
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(file_filter);

            tracing_subscriber::registry()
                .with(console_layer)
                .with(file_layer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(console_layer).init();
            Ok(None)
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
