//! # distcalc CLI
//!
//! One binary for every distcalc role.
//!
//! ## Usage
//!
//! ```bash
//! # Start an orchestrator
//! distcalc orchestrator -b 0.0.0.0:8080
//!
//! # Start a worker that registers itself and sends heartbeats
//! distcalc worker -b 0.0.0.0:9001 --orchestrator http://127.0.0.1:8080 \
//!   --public-url http://127.0.0.1:9001
//!
//! # Submit an expression and wait for the answer
//! distcalc submit http://127.0.0.1:8080 "(1 + 2) * 3" --owner 7 --wait
//!
//! # Configure delays, inspect jobs and workers
//! distcalc set-delays http://127.0.0.1:8080 --owner 7 --delay "+=100" --delay "*=0"
//! distcalc result http://127.0.0.1:8080 3f2a9c0d17e4b6a1
//! distcalc workers http://127.0.0.1:8080
//! ```
//!
//! Client commands print raw JSON to stdout so they can be piped to `jq`.

use anyhow::Result;
use argh::FromArgs;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use distcalc_client::DistcalcClient;
use distcalc_orchestrator::{Orchestrator, OrchestratorConfig, RetryConfig};
use distcalc_worker::{Heartbeat, HeartbeatConfig, Worker, WorkerLimits};

/// Environment variable consulted when `--public-url` is not given.
const PUBLIC_URL_ENV: &str = "DISTCALC_PUBLIC_URL";

fn validate_http_url(url: &str, description: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Invalid {}: '{}' must start with http:// or https://",
            description,
            url
        ))
    }
}

/// Priority: CLI flag > environment > `http://<bind>`.
fn resolve_public_url(flag: Option<String>, env: Option<String>, bind: &str) -> String {
    flag.or(env).unwrap_or_else(|| format!("http://{}", bind))
}

/// Parses `OP=MILLIS`, e.g. `+=100`.
fn parse_delay(spec: &str) -> Result<(String, u64)> {
    let (op, ms) = spec
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Invalid delay '{}': expected OP=MILLIS", spec))?;
    let ms = ms
        .trim()
        .parse::<u64>()
        .map_err(|e| anyhow::anyhow!("Invalid delay '{}': {}", spec, e))?;
    Ok((op.trim().to_string(), ms))
}

fn parse_bind(bind: &str) -> Result<SocketAddr> {
    bind.parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {}", bind, e))
}

#[derive(FromArgs)]
/// distcalc - distributed arithmetic expression evaluator
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Orchestrator(OrchestratorArgs),
    Worker(WorkerArgs),
    Submit(SubmitArgs),
    JobResult(ResultArgs),
    SetDelays(SetDelaysArgs),
    Delays(DelaysArgs),
    Workers(WorkersArgs),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "orchestrator")]
/// start an orchestrator
struct OrchestratorArgs {
    /// address to bind the orchestrator's HTTP server to
    #[argh(option, short = 'b', default = "\"0.0.0.0:8080\".into()")]
    bind: String,

    /// milliseconds without a heartbeat before a worker is lost
    #[argh(option, long = "wait-timeout-ms", default = "10000")]
    wait_timeout_ms: u64,

    /// milliseconds between registry eviction sweeps
    #[argh(option, long = "sweep-interval-ms", default = "1000")]
    sweep_interval_ms: u64,

    /// timeout for each free_capacity probe in milliseconds
    #[argh(option, long = "probe-timeout-ms", default = "500")]
    probe_timeout_ms: u64,

    /// added to the operator delay to bound each execute call, in milliseconds
    #[argh(option, long = "dispatch-timeout-ms", default = "5000")]
    dispatch_timeout_ms: u64,

    /// jobs that may wait for dispatch
    #[argh(option, long = "queue-capacity", default = "128")]
    queue_capacity: usize,

    /// jobs evaluated at the same time
    #[argh(option, long = "max-concurrent-jobs", default = "64")]
    max_concurrent_jobs: usize,

    /// delay in milliseconds for owners that never set their own
    #[argh(option, long = "default-delay-ms", default = "500")]
    default_delay_ms: u64,

    /// re-enqueues allowed when no worker is available
    #[argh(option, long = "max-retries", default = "10")]
    max_retries: u32,
}

impl OrchestratorArgs {
    fn config(&self) -> OrchestratorConfig {
        OrchestratorConfig::new()
            .with_wait_timeout(Duration::from_millis(self.wait_timeout_ms))
            .with_sweep_interval(Duration::from_millis(self.sweep_interval_ms))
            .with_probe_timeout(Duration::from_millis(self.probe_timeout_ms))
            .with_dispatch_timeout(Duration::from_millis(self.dispatch_timeout_ms))
            .with_queue_capacity(self.queue_capacity)
            .with_max_concurrent_jobs(self.max_concurrent_jobs)
            .with_default_delay(Duration::from_millis(self.default_delay_ms))
            .with_retry(RetryConfig {
                max_retries: self.max_retries,
                ..RetryConfig::default()
            })
    }
}

// With --orchestrator the worker registers under its public URL and then
// sends heartbeats. Registration failure stops the worker.
#[derive(FromArgs)]
#[argh(subcommand, name = "worker")]
/// start a compute worker
struct WorkerArgs {
    /// address to bind the worker's HTTP server to
    #[argh(option, short = 'b', default = "\"0.0.0.0:9001\".into()")]
    bind: String,

    /// orchestrator to register with (http:// or https://)
    #[argh(option, long = "orchestrator")]
    orchestrator: Option<String>,

    /// URL the orchestrator uses to reach this worker (default: $DISTCALC_PUBLIC_URL, then http://<bind>)
    #[argh(option, long = "public-url")]
    public_url: Option<String>,

    /// operations allowed in flight at once
    #[argh(option, long = "max-in-flight", default = "10")]
    max_in_flight: u32,

    /// milliseconds between heartbeats
    #[argh(option, long = "heartbeat-interval-ms", default = "1000")]
    heartbeat_interval_ms: u64,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "submit")]
/// submit an expression
struct SubmitArgs {
    /// orchestrator URL
    #[argh(positional)]
    server_address: String,

    /// infix expression, e.g. "(1 + 2) * 3"
    #[argh(positional)]
    expression: String,

    /// owner id
    #[argh(option, long = "owner", default = "0")]
    owner: u64,

    /// poll until the job finishes and print its status
    #[argh(switch, short = 'w', long = "wait")]
    wait: bool,

    /// polling interval in milliseconds when waiting
    #[argh(option, long = "poll-interval-ms", default = "200")]
    poll_interval_ms: u64,

    /// give up waiting after this many milliseconds
    #[argh(option, long = "timeout-ms", default = "60000")]
    timeout_ms: u64,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "result")]
/// show the status of a job
struct ResultArgs {
    /// orchestrator URL
    #[argh(positional)]
    server_address: String,

    /// job id returned by submit
    #[argh(positional)]
    job_id: String,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "set-delays")]
/// set per-operator delays for an owner
struct SetDelaysArgs {
    /// orchestrator URL
    #[argh(positional)]
    server_address: String,

    /// owner id
    #[argh(option, long = "owner", default = "0")]
    owner: u64,

    /// OP=MILLIS, repeatable (e.g. --delay "+=100")
    #[argh(option, short = 'd', long = "delay")]
    delays: Vec<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "delays")]
/// show the per-operator delays of an owner
struct DelaysArgs {
    /// orchestrator URL
    #[argh(positional)]
    server_address: String,

    /// owner id
    #[argh(option, long = "owner", default = "0")]
    owner: u64,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "workers")]
/// list registered workers and their liveness
struct WorkersArgs {
    /// orchestrator URL
    #[argh(positional)]
    server_address: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Only the long-running roles log; client commands keep stdout clean.
    if matches!(cli.command, Commands::Orchestrator(_) | Commands::Worker(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Orchestrator(args) => run_orchestrator(args).await,
        Commands::Worker(args) => run_worker(args).await,
        Commands::Submit(args) => run_submit(args).await,
        Commands::JobResult(args) => {
            let client = client_for(&args.server_address)?;
            print_json(&client.result(&args.job_id).await?)
        }
        Commands::SetDelays(args) => run_set_delays(args).await,
        Commands::Delays(args) => {
            let client = client_for(&args.server_address)?;
            print_json(&client.delays(args.owner).await?)
        }
        Commands::Workers(args) => {
            let client = client_for(&args.server_address)?;
            print_json(&client.workers().await?)
        }
    }
}

async fn run_orchestrator(args: OrchestratorArgs) -> Result<()> {
    let addr = parse_bind(&args.bind)?;
    let config = args.config();
    tracing::info!("Starting distcalc orchestrator on {}", addr);
    tracing::info!(
        "Worker wait timeout {}ms, default delay {}ms",
        config.wait_timeout.as_millis(),
        config.default_delay.as_millis()
    );

    let orchestrator = Orchestrator::new(config).await?;
    distcalc_orchestrator::HttpServer::new(Arc::new(orchestrator))
        .run(addr)
        .await?;
    Ok(())
}

async fn run_worker(args: WorkerArgs) -> Result<()> {
    let addr = parse_bind(&args.bind)?;
    let limits = WorkerLimits::new().with_max_in_flight(args.max_in_flight);
    let worker = Arc::new(Worker::new(limits)?);
    tracing::info!(
        "Starting distcalc worker on {} (max in flight: {})",
        addr,
        args.max_in_flight
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    if let Some(orchestrator) = &args.orchestrator {
        validate_http_url(orchestrator, "orchestrator address")?;
        let public_url = resolve_public_url(
            args.public_url.clone(),
            std::env::var(PUBLIC_URL_ENV).ok(),
            &args.bind,
        );
        validate_http_url(&public_url, "public URL")?;

        let heartbeat = Heartbeat::new(
            orchestrator.clone(),
            public_url.clone(),
            HeartbeatConfig {
                interval: Duration::from_millis(args.heartbeat_interval_ms),
                ..HeartbeatConfig::default()
            },
        );
        if let Err(e) = heartbeat.register().await {
            tracing::error!("Failed to register with orchestrator {}: {}", orchestrator, e);
            return Err(e.into());
        }
        tracing::info!("Registered with {} as {}", orchestrator, public_url);
        heartbeat.spawn();
    }

    distcalc_worker::HttpServer::new(worker)
        .run_with_listener(listener)
        .await?;
    Ok(())
}

async fn run_submit(args: SubmitArgs) -> Result<()> {
    let client = client_for(&args.server_address)?;
    let job_id = client.submit(args.owner, &args.expression).await?;

    if !args.wait {
        return print_json(&serde_json::json!({ "job_id": job_id }));
    }

    let status = client
        .wait_for_result(
            &job_id,
            Duration::from_millis(args.poll_interval_ms),
            Duration::from_millis(args.timeout_ms),
        )
        .await?;
    print_json(&status)
}

async fn run_set_delays(args: SetDelaysArgs) -> Result<()> {
    if args.delays.is_empty() {
        return Err(anyhow::anyhow!("No delays given; use --delay OP=MILLIS"));
    }
    let delays = args
        .delays
        .iter()
        .map(|spec| parse_delay(spec))
        .collect::<Result<BTreeMap<String, u64>>>()?;

    let client = client_for(&args.server_address)?;
    print_json(&client.set_delays(args.owner, delays).await?)
}

fn client_for(server_address: &str) -> Result<DistcalcClient> {
    validate_http_url(server_address, "server address")?;
    Ok(DistcalcClient::new(server_address))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
