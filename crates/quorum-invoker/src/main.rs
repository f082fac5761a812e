//! Quorum invoker binary entry point.
//!
//! Usage: quorum-invoker --config <invoker.json> [--region <name>]... [--endpoint <url>]...

use clap::Parser;
use quorum_invoker::{
    wait_for_signal, FunctionInvoker, GatewayConfig, GatewayOverrides, HttpFunctionInvoker, IntakeLoop,
    InvokerConfig, InvokerResult, IpcChannel, LifecycleController, QuorumDispatcher,
    ShutdownReason, Stats,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Quorum invoker: fans requests out to 2F+1 remote function replicas.
#[derive(Parser, Debug)]
#[command(name = "quorum-invoker")]
#[command(about = "Quorum invocation gateway for replicated remote functions")]
struct Args {
    /// Path to the JSON invoker config (F, Uuids, FcnName, ThresholdOn, Threshold).
    #[arg(long, env = "INVOKER_CONFIG")]
    config: PathBuf,

    /// Path of the inbound Unix socket.
    #[arg(long, env = "INVOKER_SOCKET")]
    socket: Option<PathBuf>,

    /// Inbound receive timeout in milliseconds.
    #[arg(long, env = "INVOKER_RECV_TIMEOUT_MS")]
    recv_timeout_ms: Option<u64>,

    /// Target region; repeat for round-robin across regions.
    #[arg(long = "region")]
    regions: Vec<String>,

    /// Explicit invocation endpoint; repeat for several. Overrides --region.
    #[arg(long = "endpoint")]
    endpoints: Vec<String>,

    /// Bearer token sent with every invocation.
    #[arg(long, env = "INVOKER_AUTH_TOKEN")]
    auth_token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write JSONL logs to this file.
    #[arg(long, env = "INVOKER_LOG_FILE")]
    log_file: Option<PathBuf>,
}

fn gateway_overrides(args: &Args) -> GatewayOverrides {
    GatewayOverrides {
        socket_path: args.socket.clone(),
        recv_timeout_ms: args.recv_timeout_ms,
        regions: args.regions.clone(),
        endpoints: args.endpoints.clone(),
        auth_token: args.auth_token.clone(),
    }
}

#[tokio::main]
async fn main() -> InvokerResult<()> {
    let args = Args::parse();

    observability::init_with_config(observability::LogConfig {
        service_name: "quorum-invoker".into(),
        default_level: args.log_level.clone(),
        log_path: args.log_file.clone(),
        also_stderr: true,
    });

    let config = InvokerConfig::from_file(&args.config)?;
    let gateway = GatewayConfig::from_env().with_overrides(gateway_overrides(&args))?;

    info!(
        f = config.f,
        replicas = config.quorum_size(),
        function = %config.fcn_name,
        threshold_on = config.threshold_on,
        threshold = config.threshold,
        socket = %gateway.socket_path.display(),
        endpoints = ?gateway.endpoints,
        "Configuration loaded"
    );
    println!(
        "starting invoker (event) (synced) (f = {}) (uuids size = {})",
        config.f,
        config.uuids.len()
    );

    let clients = gateway
        .endpoints
        .iter()
        .map(|endpoint| {
            HttpFunctionInvoker::new(
                endpoint.as_str(),
                gateway.auth_token.as_deref(),
                gateway.request_timeout,
            )
            .map(|client| Arc::new(client) as Arc<dyn FunctionInvoker>)
        })
        .collect::<InvokerResult<Vec<_>>>()?;

    let stats = Arc::new(Stats::new());
    let channel = IpcChannel::bind(&gateway.socket_path, gateway.recv_timeout)?;
    let dispatcher = QuorumDispatcher::new(Arc::new(config), stats.clone());
    let mut intake = IntakeLoop::new(channel, dispatcher, clients, stats.clone())?;
    let lifecycle = LifecycleController::new(stats);

    let reason = tokio::select! {
        result = intake.run() => match result {
            Ok(reason) => reason,
            Err(e) => {
                error!(error = %e, "Invoker exited with error");
                return Err(e);
            }
        },
        signal = wait_for_signal() => ShutdownReason::Signal(signal?.to_string()),
    };

    if let Some(snapshot) = lifecycle.shutdown(&reason) {
        println!("{}", snapshot);
    }

    Ok(())
}
