#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod commands;
mod error_fmt;
mod logging;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::Result;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::commands::WatchArgs;
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn run(cli: Cli) -> Result<()> {
    let cfg = commands::load_config(cli.config.as_deref())?;
    logging::init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging);
    tracing::debug!(config = ?cli.config, "config loaded");

    match cli.cmd {
        Commands::Replay { trace, db } => commands::run_replay(&cfg, &trace, db, cli.json),
        Commands::Watch {
            source,
            sysfs_dir,
            sim_soc,
            sim_watts,
            interval_ms,
            max_ticks,
            db,
        } => {
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
                tracing::warn!(error = %e, "failed to install ctrl-c handler");
            }
            let args = WatchArgs {
                source,
                sysfs_dir,
                sim_soc,
                sim_watts,
                interval_ms,
                max_ticks,
                db,
            };
            commands::run_watch(&cfg, args, cli.json, &shutdown)
        }
        Commands::History { db, from, to } => commands::run_history(&cfg, db, from, to, cli.json),
        Commands::Trim { db, days } => commands::run_trim(&cfg, db, days, cli.json),
        Commands::SelfCheck => commands::self_check(&cfg, cli.json),
    }
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        tracing::error!(error = ?err, "command failed");
        std::process::exit(exit_code_for_error(&err));
    }
}
