//! GPUart CLI tool.
//!
//! Drives a GPUart session on the host reference layers and inspects runtime
//! configuration.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use gpuart_core::host::{host_runtime, ExecutorProbe};
use gpuart_core::observability::{LogConfig, LogLevel};
use gpuart_core::runtime::{GpuRuntime, RuntimeConfig, RuntimePreset};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "gpuart")]
#[command(version, about = "GPUart runtime lifecycle driver", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one init/start/schedule/stop/destroy session
    Run {
        /// Configuration preset (development, production, testing)
        #[arg(short, long, default_value = "development")]
        preset: String,

        /// Configuration file (.toml or .json), overrides the preset
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of scheduling triggers before stopping
        #[arg(short, long, default_value = "100")]
        ticks: u64,

        /// Trigger period in milliseconds, overrides the configuration
        #[arg(long)]
        period_ms: Option<u64>,
    },

    /// Print the effective configuration
    Config {
        /// Configuration preset (development, production, testing)
        #[arg(short, long, default_value = "development")]
        preset: String,

        /// Read overrides from the environment
        #[arg(long)]
        env: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: OutputFormat,
    },

    /// Validate a configuration file
    Check {
        /// Path to the configuration file
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Toml,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            preset,
            config,
            ticks,
            period_ms,
        } => {
            let mut config = load_config(&preset, config.as_deref())?;
            if let Some(ms) = period_ms {
                config.schedule_period = Duration::from_millis(ms);
            }
            config.validate()?;
            init_logging(&config, cli.verbose)?;
            cmd_run(config, ticks)?;
        }

        Commands::Config {
            preset,
            env,
            format,
        } => {
            let config = if env {
                RuntimeConfig::from_env()
            } else {
                load_config(&preset, None)?
            };
            cmd_config(&config, format)?;
        }

        Commands::Check { path } => {
            init_logging(&RuntimeConfig::default(), cli.verbose)?;
            cmd_check(&path)?;
        }
    }

    Ok(())
}

fn load_config(preset: &str, path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display())),
        None => {
            let preset: RuntimePreset = preset.parse().map_err(anyhow::Error::msg)?;
            Ok(preset.to_config())
        }
    }
}

fn init_logging(config: &RuntimeConfig, verbose: bool) -> anyhow::Result<()> {
    let mut logging = LogConfig::from_runtime(config);
    if verbose {
        logging.level = LogLevel::Debug;
    }
    logging.init()?;
    Ok(())
}

fn cmd_run(config: RuntimeConfig, ticks: u64) -> anyhow::Result<()> {
    let period = config.schedule_period;
    let (mut runtime, probe) = host_runtime(config)?;

    runtime.init()?;
    runtime.start()?;

    let driver = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build periodic driver")?;
    let outcome = driver.block_on(drive(&mut runtime, ticks, period));

    // Tear down even if a scheduling decision failed; the failure is still reported.
    let teardown = runtime.stop().and_then(|()| runtime.destroy());
    let triggered = session_outcome(outcome, teardown)?;

    print_summary(&runtime, &probe, triggered);
    Ok(())
}

/// Merge the driver result with the teardown result, keeping both failures.
fn session_outcome(
    outcome: anyhow::Result<u64>,
    teardown: gpuart_core::error::Result<()>,
) -> anyhow::Result<u64> {
    match (outcome, teardown) {
        (Ok(triggered), Ok(())) => Ok(triggered),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(teardown)) => Err(e.context(format!("teardown also failed: {}", teardown))),
    }
}

/// Trigger `schedule` every `period` until `ticks` triggers or Ctrl-C.
async fn drive(runtime: &mut GpuRuntime, ticks: u64, period: Duration) -> anyhow::Result<u64> {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut triggered = 0;
    while triggered < ticks {
        tokio::select! {
            _ = interval.tick() => {
                runtime.schedule()?;
                triggered += 1;
            }
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!("Ctrl-C handler failed: {}", e);
                }
                info!(triggered, "Interrupted, stopping session");
                break;
            }
        }
    }

    Ok(triggered)
}

fn print_summary(runtime: &GpuRuntime, probe: &ExecutorProbe, triggered: u64) {
    let stats = runtime.stats();

    println!("GPUart session");
    println!("==============\n");
    println!("  Final phase:          {}", runtime.phase());
    println!("  Triggers issued:      {}", triggered);
    println!("  Decisions forwarded:  {}", stats.schedules_completed);
    println!("  Decisions executed:   {}", probe.decisions_executed());
    println!("  Decisions failed:     {}", stats.schedules_failed);
    println!("  Running time:         {:?}", stats.running_time);
}

fn cmd_config(config: &RuntimeConfig, format: OutputFormat) -> anyhow::Result<()> {
    let text = match format {
        OutputFormat::Toml => config.to_toml()?,
        OutputFormat::Json => config.to_json()?,
    };
    println!("{}", text);
    Ok(())
}

fn cmd_check(path: &Path) -> anyhow::Result<()> {
    match RuntimeConfig::from_file(path) {
        Ok(config) => {
            println!("✓ {} is valid", path.display());
            println!("  allow_restart:      {}", config.allow_restart);
            println!("  worker_name:        {}", config.worker_name);
            println!("  event_queue_length: {}", config.event_queue_length);
            println!("  start_timeout:      {:?}", config.start_timeout);
            println!("  schedule_period:    {:?}", config.schedule_period);
            Ok(())
        }
        Err(e) => {
            println!("✗ {} is invalid: {}", path.display(), e);
            Err(e.into())
        }
    }
}
