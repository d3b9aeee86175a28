//! grpc-bootstrap daemon.
//!
//! Serves the standard gRPC health service on the configured transport, with
//! an HTTP gateway for it next to the RPC port, until SIGINT or SIGTERM.
//!
//! ```text
//! CLI / GRPC_* env ──┐
//! config.toml ───────┴─▶ BootstrapConfig ──▶ RpcServer::from_settings
//!                                               │ add_service(health)
//!                                               │ register_gateway([health])
//!                                               ▼
//!                                             run() ──▶ exit code
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use grpc_bootstrap::config::{load_config, BootstrapConfig, ConfigError, ObservabilityConfig};
use grpc_bootstrap::gateway::{health_handler, GatewayHandler, GatewayOptions};
use grpc_bootstrap::observability::{logging, metrics, MetricsInterceptor};
use grpc_bootstrap::rpc::{InterceptorChain, RequestIdInterceptor, TraceInterceptor};
use grpc_bootstrap::{BootstrapError, RpcServer};

const HEALTH_WATCH: &str = "/grpc.health.v1.Health/Watch";

/// gRPC server bootstrapper.
#[derive(Debug, Parser)]
#[command(name = "grpc-bootstrap")]
#[command(version)]
#[command(about = "gRPC server with an optional HTTP gateway")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Transport kind: tcp or unix.
    #[arg(long, env = "GRPC_TRANSPORT")]
    transport: Option<String>,

    /// Host for tcp, socket path for unix.
    #[arg(long, env = "GRPC_ADDRESS")]
    address: Option<String>,

    /// Primary port.
    #[arg(long, env = "GRPC_PORT")]
    port: Option<i64>,

    /// Gateway port; -1 derives port + 1, 0 disables the gateway.
    #[arg(long, env = "GRPC_GATEWAY_PORT", allow_negative_numbers = true)]
    gateway_port: Option<i64>,

    /// Host the gateway binds to.
    #[arg(long, env = "GRPC_GATEWAY_ADDRESS")]
    gateway_address: Option<String>,

    /// Do not register the HTTP gateway.
    #[arg(long)]
    no_gateway: bool,
}

impl Args {
    /// File settings (or defaults), overridden by flags and environment.
    fn load(&self) -> Result<BootstrapConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => BootstrapConfig::default(),
        };

        let server = &mut config.server;
        if let Some(transport) = &self.transport {
            server.transport = transport.clone();
        }
        if let Some(address) = &self.address {
            server.address = address.clone();
        }
        if let Some(port) = self.port {
            server.port = port;
        }
        if self.gateway_port.is_some() {
            server.gateway_port = self.gateway_port;
        }
        if self.gateway_address.is_some() {
            server.gateway_address = self.gateway_address.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match args.load() {
        Ok(config) => config,
        Err(e) => {
            let _ = logging::init(&ObservabilityConfig::default());
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "grpc-bootstrap starting");

    match serve(config, !args.no_gateway).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve(config: BootstrapConfig, with_gateway: bool) -> Result<(), BootstrapError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let interceptors = InterceptorChain::builder()
        .both(RequestIdInterceptor)
        .both(TraceInterceptor)
        .both(MetricsInterceptor)
        .streaming_method(HEALTH_WATCH)
        .build();

    let mut server = RpcServer::from_settings(&config.server, interceptors).await?;

    let (_reporter, health_service) = tonic_health::server::health_reporter();
    server.add_service(health_service);

    if with_gateway {
        let handlers: Vec<Box<dyn GatewayHandler>> = vec![Box::new(health_handler())];
        server.register_gateway(handlers, GatewayOptions::default())?;
    }

    server.run().await
}
