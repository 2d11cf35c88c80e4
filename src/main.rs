mod allocator;
mod commands;
mod config;
mod error;
mod models;
mod rate_limit;
mod store;
#[cfg(test)]
mod testing;
mod validation;
mod web;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Stadium allocator: bookings and friendly matches for university sports facilities.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Debug logging and raw JSON output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service with the expiry sweeper and rate limiter
    Serve {
        /// Path to config file
        #[arg(short = 'c', long, default_value = "config.toml")]
        config: PathBuf,

        /// Listen address, overrides [server] addr (e.g. "0.0.0.0:3010")
        #[arg(short = 'a', long)]
        addr: Option<String>,
    },

    /// Purge bookings dated before today once and print how many were removed
    Sweep {
        /// Path to config file
        #[arg(short = 'c', long, default_value = "config.toml")]
        config: PathBuf,
    },

    /// Check whether a stadium slot is free
    ///
    /// Example:
    ///   availability --stadium main --date 2025-06-01 --time 16:00
    Availability {
        /// Path to config file
        #[arg(short = 'c', long, default_value = "config.toml")]
        config: PathBuf,

        /// Stadium id
        #[arg(short = 's', long)]
        stadium: String,

        /// Date (YYYY-MM-DD)
        #[arg(short = 'd', long)]
        date: String,

        /// Time (HH:MM)
        #[arg(short = 't', long)]
        time: String,
    },

    /// Show a user's bookings, newest first
    Bookings {
        /// Path to config file
        #[arg(short = 'c', long, default_value = "config.toml")]
        config: PathBuf,

        /// User id
        #[arg(short = 'u', long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match &cli.command {
        Command::Serve { config, addr } => {
            let cfg = config::load_config(config)?;
            let addr = addr.clone().unwrap_or_else(|| cfg.server.addr.clone());
            web::serve(cfg, &addr).await?;
        }
        Command::Sweep { config } => {
            commands::run_sweep(config).await?;
        }
        Command::Availability {
            config,
            stadium,
            date,
            time,
        } => {
            commands::run_availability(cli.verbose, config, stadium, date, time).await?;
        }
        Command::Bookings { config, user } => {
            commands::run_bookings(cli.verbose, config, user).await?;
        }
    }

    Ok(())
}
