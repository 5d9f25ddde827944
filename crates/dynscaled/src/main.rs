//! dynscaled: the dynscale daemon.
//!
//! Runs provisioning cycles for every table in the state store that
//! matches a `[tables]` key of the configuration file, and offers a few
//! maintenance commands around the same store.
//!
//! # Usage
//!
//! ```text
//! dynscaled run --config dynscale.toml --data-dir /var/lib/dynscale
//! dynscaled check --config dynscale.toml --table orders
//! dynscaled capacity --table orders --read 100 --write 50
//! dynscaled sample --table orders --direction read --consumed 93.5
//! ```

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::info;

use dynscale_autoscale::{CircuitBreaker, FleetRunner, StoreProviders};
use dynscale_breaker::HttpCircuitBreaker;
use dynscale_core::{Direction, DynscaleConfig, TableStatus};
use dynscale_state::{MetricsSample, StateStore, TableCapacity};

#[derive(Parser)]
#[command(name = "dynscaled", about = "dynscale throughput autoscaler")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Read,
    Write,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Read => Direction::Read,
            DirectionArg::Write => Direction::Write,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Active,
    Updating,
    Creating,
    Deleting,
}

impl From<StatusArg> for TableStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Active => TableStatus::Active,
            StatusArg::Updating => TableStatus::Updating,
            StatusArg::Creating => TableStatus::Creating,
            StatusArg::Deleting => TableStatus::Deleting,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run provisioning cycles until interrupted.
    Run {
        /// Configuration file.
        #[arg(long, default_value = "dynscale.toml")]
        config: PathBuf,

        /// Data directory for persistent state.
        #[arg(long, default_value = "/var/lib/dynscale")]
        data_dir: PathBuf,

        /// Seconds between passes; overrides `global.check_interval_secs`.
        #[arg(long)]
        check_interval: Option<u64>,

        /// Log changes instead of applying them.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run a single pass and print the outcomes as JSON.
    Check {
        #[arg(long, default_value = "dynscale.toml")]
        config: PathBuf,

        #[arg(long, default_value = "/var/lib/dynscale")]
        data_dir: PathBuf,

        /// Only check this table.
        #[arg(long)]
        table: Option<String>,

        #[arg(long)]
        dry_run: bool,
    },

    /// Parse and validate a configuration file.
    Validate {
        #[arg(long, default_value = "dynscale.toml")]
        config: PathBuf,
    },

    /// Record a table's provisioned capacity.
    Capacity {
        #[arg(long, default_value = "/var/lib/dynscale")]
        data_dir: PathBuf,

        #[arg(long)]
        table: String,

        #[arg(long)]
        read: u64,

        #[arg(long)]
        write: u64,

        #[arg(long, value_enum, default_value_t = StatusArg::Active)]
        status: StatusArg,
    },

    /// Record one metrics sample for a table.
    Sample {
        #[arg(long, default_value = "/var/lib/dynscale")]
        data_dir: PathBuf,

        #[arg(long)]
        table: String,

        #[arg(long, value_enum)]
        direction: DirectionArg,

        /// Consumed capacity in percent of provisioned.
        #[arg(long)]
        consumed: f64,

        #[arg(long, default_value = "0")]
        throttled: u64,

        #[arg(long, default_value = "0")]
        throttled_by_provisioned: f64,

        #[arg(long, default_value = "0")]
        throttled_by_consumed: f64,

        /// Sample time as a Unix timestamp; defaults to now.
        #[arg(long)]
        epoch: Option<u64>,
    },

    /// Drop metrics samples older than the given age.
    Prune {
        #[arg(long, default_value = "/var/lib/dynscale")]
        data_dir: PathBuf,

        #[arg(long, default_value = "1440")]
        older_than_minutes: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run {
            config,
            data_dir,
            check_interval,
            dry_run,
        } => run(&config, &data_dir, check_interval, dry_run).await,
        Command::Check {
            config,
            data_dir,
            table,
            dry_run,
        } => check(&config, &data_dir, table.as_deref(), dry_run).await,
        Command::Validate { config } => validate(&config),
        Command::Capacity {
            data_dir,
            table,
            read,
            write,
            status,
        } => {
            let state = open_state(&data_dir)?;
            state.put_capacity(&TableCapacity {
                table_name: table.clone(),
                read_units: read,
                write_units: write,
                status: status.into(),
                updated_at: now(),
            })?;
            info!(%table, read, write, "capacity recorded");
            Ok(())
        }
        Command::Sample {
            data_dir,
            table,
            direction,
            consumed,
            throttled,
            throttled_by_provisioned,
            throttled_by_consumed,
            epoch,
        } => {
            let state = open_state(&data_dir)?;
            let sample = MetricsSample {
                table_name: table,
                direction: direction.into(),
                epoch: epoch.unwrap_or_else(now),
                consumed_percent: consumed,
                throttled_count: throttled,
                throttled_by_provisioned_percent: throttled_by_provisioned,
                throttled_by_consumed_percent: throttled_by_consumed,
            };
            state.put_metrics(&sample)?;
            info!(table = %sample.table_name, direction = %sample.direction, "sample recorded");
            Ok(())
        }
        Command::Prune {
            data_dir,
            older_than_minutes,
        } => {
            let state = open_state(&data_dir)?;
            let before = now().saturating_sub(older_than_minutes * 60);
            let removed = state.prune_metrics(before)?;
            info!(removed, "metrics pruned");
            Ok(())
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,dynscale=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(path: &Path, dry_run: bool) -> anyhow::Result<DynscaleConfig> {
    let mut config = DynscaleConfig::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    config.global.dry_run |= dry_run;
    Ok(config)
}

fn open_state(data_dir: &Path) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("dynscale.redb");
    let state = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");
    Ok(state)
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

async fn run(
    config_path: &Path,
    data_dir: &Path,
    check_interval: Option<u64>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let config = load_config(config_path, dry_run)?;
    let interval = Duration::from_secs(check_interval.unwrap_or(config.global.check_interval_secs));
    info!(
        tables = config.tables.len(),
        interval_secs = interval.as_secs(),
        dry_run = config.global.dry_run,
        "dynscale daemon starting"
    );

    let state = open_state(data_dir)?;
    let breaker = HttpCircuitBreaker::from_config(&config)?;
    let runner = FleetRunner::new(config, StoreProviders::new(state.clone()), state)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
        }
        let _ = shutdown_tx.send(true);
    });

    match breaker {
        Some(breaker) => {
            info!("circuit breaker enabled");
            drive(runner.with_breaker(breaker), interval, shutdown_rx).await;
        }
        None => drive(runner, interval, shutdown_rx).await,
    }

    info!("dynscale daemon stopped");
    Ok(())
}

async fn drive<B: CircuitBreaker>(
    runner: FleetRunner<StoreProviders, StateStore, B>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) {
    runner.run(interval, shutdown).await;
}

async fn check(
    config_path: &Path,
    data_dir: &Path,
    table: Option<&str>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let config = load_config(config_path, dry_run)?;
    let state = open_state(data_dir)?;
    let breaker = HttpCircuitBreaker::from_config(&config)?;
    let runner = FleetRunner::new(config, StoreProviders::new(state.clone()), state)?;

    let report = match breaker {
        Some(breaker) => check_with(&runner.with_breaker(breaker), table).await?,
        None => check_with(&runner, table).await?,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn check_with<B: CircuitBreaker>(
    runner: &FleetRunner<StoreProviders, StateStore, B>,
    table: Option<&str>,
) -> anyhow::Result<serde_json::Value> {
    let Some(table) = table else {
        return Ok(serde_json::to_value(runner.run_once().await?)?);
    };
    let targets = runner.targets()?;
    let Some(target) = targets.iter().find(|t| t.table_name == table) else {
        bail!("table {table} is not managed by any configuration key");
    };
    Ok(serde_json::to_value(runner.check_table(target).await?)?)
}

fn validate(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path, false)?;
    config.matcher()?;
    println!(
        "{}: ok ({} table keys)",
        config_path.display(),
        config.tables.len()
    );
    Ok(())
}
