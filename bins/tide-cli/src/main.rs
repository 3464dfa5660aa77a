//! tide-cli: Command-line tools for Tide staking.
//!
//! Share and penalty calculators, a scripted staking simulation, and a dump
//! of the effective configuration. All output is JSON on stdout.

mod sim;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tide_core::constants::{INITIAL_SHARE_PRICE, PERMILLE, TOKEN};
use tide_core::math::mul_div;
use tide_service::StakingConfig;
use tide_staking::penalty::penalty_permille;
use tide_staking::position::quote_shares;
use tracing::info;

/// Tide staking tools.
#[derive(Parser, Debug)]
#[command(name = "tide-cli", version, about = "Tide staking calculators and simulator")]
struct Cli {
    /// TOML configuration file (TIDE_* environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format ("text" or "json"); overrides the config
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Shares a new position would receive.
    Shares {
        /// Principal in whole tokens
        #[arg(long)]
        tokens: u64,
        #[arg(long)]
        lock_days: u64,
        /// Include the referrer's share credit
        #[arg(long)]
        referrer: bool,
        /// Share price in base units (defaults to the launch price)
        #[arg(long, default_value_t = INITIAL_SHARE_PRICE)]
        share_price: u128,
    },
    /// Penalty for leaving a position `days_in` days after its start.
    Penalty {
        /// Principal in whole tokens
        #[arg(long)]
        tokens: u64,
        #[arg(long)]
        lock_days: u64,
        #[arg(long)]
        days_in: u64,
    },
    /// Run a JSON staking script, or the built-in demo when none is given.
    Simulate {
        #[arg(long)]
        script: Option<PathBuf>,
    },
    /// Print the effective configuration.
    Config,
}

#[derive(Serialize)]
struct SharesOutput {
    base_shares: u128,
    bonus_shares: u128,
    shares: u128,
    referrer_shares: u128,
}

#[derive(Serialize)]
struct PenaltyOutput {
    permille: u128,
    penalty: u128,
    remaining: u128,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = StakingConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    init_logging(&config.log_level, &config.log_format);

    match cli.command {
        Command::Shares { tokens, lock_days, referrer, share_price } => {
            let q = quote_shares(tokens as u128 * TOKEN, lock_days, share_price, referrer)?;
            print_json(&SharesOutput {
                base_shares: q.base_shares,
                bonus_shares: q.bonus_shares,
                shares: q.shares(),
                referrer_shares: q.referrer_shares,
            })
        }
        Command::Penalty { tokens, lock_days, days_in } => print_json(&penalty_output(tokens, lock_days, days_in)?),
        Command::Simulate { script } => {
            let script = match script {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read {}", path.display()))?;
                    serde_json::from_str(&raw).with_context(|| format!("invalid script {}", path.display()))?
                }
                None => sim::demo_script()?,
            };
            info!(steps = script.steps.len(), "running simulation");
            let report = sim::run(&script, config)?;
            print_json(&report)
        }
        Command::Config => print_json(&config),
    }
}

/// Penalty for closing a `tokens` position `days_in` days after its start.
fn penalty_output(tokens: u64, lock_days: u64, days_in: u64) -> Result<PenaltyOutput> {
    let principal = tokens as u128 * TOKEN;
    // Position opened on day 0, active from day 1.
    let start: u64 = 1;
    let maturity = start.checked_add(lock_days).context("lock_days too large")?;
    let exit = start.checked_add(days_in).context("days_in too large")?;
    let permille = penalty_permille(lock_days, start, maturity, exit);
    let penalty = mul_div(principal, permille, PERMILLE)?;
    Ok(PenaltyOutput {
        permille,
        penalty,
        remaining: principal - penalty,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Logs go to stderr so stdout stays valid JSON.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}
