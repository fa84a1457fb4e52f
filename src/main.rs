//! Command-line interface for the pqdemo drivers.
//!
//! # Usage Examples
//!
//! ```bash
//! # Publish 50 msgs/s with asynchronous acknowledgments
//! pqdemo publish 50
//!
//! # Publish at the default rate, blocking on each acknowledgment,
//! # configured from SOLACE_* environment variables
//! pqdemo publish-blocking --env
//!
//! # Consume with per-message acknowledgments from an explicit
//! # properties file
//! pqdemo consume -f ./config/consumer.properties
//!
//! # Consume inside broker transactions, writing a JSON run report
//! pqdemo consume-transacted --report ./run-report.json
//! ```
//!
//! Exit codes: 0 on normal shutdown; -1 when no configuration source
//! exists; -2 on a configuration I/O error; -3 on any other configuration
//! error; 1 when a queue bind or the driver itself fails.

use clap::{Args, Parser, Subcommand};
use pqdemo::config::{self, ConfigSource, Role};
use pqdemo::consumer;
use pqdemo::lifecycle::{self, ShutdownLatch};
use pqdemo::publisher::{self, PublishMode};
use pqdemo::stats::Counters;
use pqdemo_transport_sim::SimBroker;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pqdemo")]
#[command(about = "Rate-controlled demo clients for a partitioned-queue message broker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish persistent messages with asynchronous acknowledgments
    Publish(PublishArgs),

    /// Publish persistent messages, blocking on each acknowledgment
    PublishBlocking(PublishArgs),

    /// Receive from a queue, acknowledging each message after processing
    Consume(ConsumeArgs),

    /// Receive inside broker transactions committed in fixed-size batches
    ConsumeTransacted(ConsumeArgs),
}

#[derive(Args, Clone)]
struct PublishArgs {
    /// Publish rate in messages per second (1-1000); out-of-bounds or
    /// unparseable values fall back to the default
    rate: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Clone)]
struct ConsumeArgs {
    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Clone)]
struct CommonArgs {
    /// Read configuration from SOLACE_* environment variables
    #[arg(long)]
    env: bool,

    /// Explicit properties file
    #[arg(short = 'f', value_name = "PATH")]
    file: Option<PathBuf>,

    /// Write a JSON run report to this path on shutdown
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,
}

impl CommonArgs {
    fn source(&self) -> ConfigSource {
        if let Some(path) = &self.file {
            ConfigSource::File(path.clone())
        } else if self.env {
            ConfigSource::Env
        } else {
            ConfigSource::DefaultFile
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    std::process::exit(run(cli).await);
}

async fn run(cli: Cli) -> i32 {
    let (role, common) = match &cli.command {
        Commands::Publish(args) | Commands::PublishBlocking(args) => {
            (Role::Publisher, args.common.clone())
        }
        Commands::Consume(args) => (Role::Consumer, args.common.clone()),
        Commands::ConsumeTransacted(args) => (Role::TransactedConsumer, args.common.clone()),
    };

    let config = match config::load(role, &common.source()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("error reading configuration: {e}");
            return e.exit_code();
        }
    };
    let config = match &cli.command {
        Commands::Publish(args) | Commands::PublishBlocking(args) => {
            let rate = config::resolve_rate_argument(args.rate.as_deref(), role.default_rate());
            config.with_rate(rate)
        }
        _ => config,
    };

    // The built-in transport is the in-memory simulator; an adapter over a
    // vendor SDK implements the same contract and slots in here.
    let broker = SimBroker::new();
    broker.provision_queue(&config.queue_name, Some(&config.topic_prefix));
    let transport = broker.transport();

    let counters = Counters::new();
    let latch = ShutdownLatch::new();
    let _stdin_watcher = lifecycle::spawn_stdin_watcher(latch.clone());

    let outcome = match &cli.command {
        Commands::Publish(_) => {
            publisher::run_publisher(
                &transport,
                &config,
                PublishMode::NonBlocking,
                counters,
                latch,
            )
            .await
        }
        Commands::PublishBlocking(_) => {
            publisher::run_publisher(&transport, &config, PublishMode::Blocking, counters, latch)
                .await
        }
        Commands::Consume(_) => consumer::run_consumer(&transport, &config, counters, latch).await,
        Commands::ConsumeTransacted(_) => {
            consumer::run_transacted_consumer(&transport, &config, counters, latch).await
        }
    };

    match outcome {
        Ok(report) => {
            if let Some(path) = &common.report {
                if let Err(e) = report.write_to(path) {
                    tracing::error!("{e:#}");
                    return 1;
                }
            }
            0
        }
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Exiting.");
            1
        }
    }
}
