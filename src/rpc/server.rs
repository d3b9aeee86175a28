//! RPC server bootstrap.
//!
//! # Responsibilities
//! - Bind the primary listener from a validated configuration
//! - Collect services and apply the interceptor chain to them
//! - Register the optional gateway
//! - Run the accept loop until shutdown, then close the listener and remove
//!   the unix socket file
//!
//! # Lifecycle
//! ```text
//! RpcServer::bind ──▶ Constructed
//!     add_service / register_gateway
//! run / run_until ──▶ Running ──(first trigger)──▶ ShuttingDown ──▶ Terminated
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

use axum::Router;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tonic::server::NamedService;
use tonic::service::RoutesBuilder;
use tonic::transport::Server;
use tower::Service;

use crate::config::{validate_config, ConfigError, ServerConfig, ServerSettings};
use crate::error::{BootstrapError, RegistrationError, Result};
use crate::gateway::registration::{register_all, GatewayContext, GatewayHandler, GatewayTarget};
use crate::gateway::{Gateway, GatewayOptions};
use crate::lifecycle::shutdown::triggered;
use crate::lifecycle::{ServerState, Shutdown, StateTracker, TerminationSignals};
use crate::net::{Incoming, Listener};
use crate::rpc::interceptor::{InterceptorChain, RpcRequest};
use crate::rpc::layer::InterceptorLayer;

type ServeFuture = Pin<Box<dyn Future<Output = std::result::Result<(), tonic::transport::Error>> + Send>>;

/// A bound RPC server and everything it owns.
pub struct RpcServer {
    config: ServerConfig,
    listener: Listener,
    routes: RoutesBuilder,
    interceptors: InterceptorChain,
    gateway: Option<Gateway>,
    shutdown: Shutdown,
    shutdown_rx: broadcast::Receiver<()>,
    state: StateTracker,
}

impl std::fmt::Debug for RpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcServer")
            .field("config", &self.config)
            .field("listener", &self.listener.local_addr())
            .field("interceptors", &self.interceptors)
            .field("gateway_port", &self.gateway.as_ref().and_then(Gateway::port))
            .field("state", &self.state.current())
            .finish()
    }
}

impl RpcServer {
    /// Validate raw settings, then bind. Nothing is bound if validation fails.
    pub async fn from_settings(
        settings: &ServerSettings,
        interceptors: InterceptorChain,
    ) -> Result<Self> {
        let config = validate_config(settings).map_err(ConfigError::from)?;
        Self::bind(config, interceptors).await
    }

    /// Bind the primary listener and prepare the server.
    pub async fn bind(config: ServerConfig, interceptors: InterceptorChain) -> Result<Self> {
        let listener = Listener::bind(&config).await?;
        let shutdown = Shutdown::new();
        let shutdown_rx = shutdown.subscribe();

        tracing::debug!(
            unary_interceptors = interceptors.unary_len(),
            stream_interceptors = interceptors.stream_len(),
            "RPC server constructed"
        );

        Ok(Self {
            config,
            listener,
            routes: RoutesBuilder::default(),
            interceptors,
            gateway: None,
            shutdown,
            shutdown_rx,
            state: StateTracker::new(),
        })
    }

    /// Add a tonic service, e.g. a generated `FooServer::new(impl)`.
    pub fn add_service<S>(&mut self, service: S) -> &mut Self
    where
        S: Service<RpcRequest, Error = Infallible>
            + NamedService
            + Clone
            + Send
            + Sync
            + 'static,
        S::Response: axum::response::IntoResponse,
        S::Future: Send + 'static,
    {
        tracing::debug!(service = S::NAME, "Service added");
        self.routes.add_service(service);
        self
    }

    /// Register gateway handlers.
    ///
    /// Handlers run now, in order, against one multiplexer and a channel to
    /// this server. The gateway itself only starts with [`run`](Self::run).
    pub fn register_gateway(
        &mut self,
        handlers: Vec<Box<dyn GatewayHandler>>,
        options: GatewayOptions,
    ) -> Result<&mut Self> {
        if handlers.is_empty() {
            return Err(RegistrationError::EmptyHandlers.into());
        }

        let GatewayOptions {
            context,
            mux,
            dial,
            port,
        } = options;

        let context = context.unwrap_or_else(|| GatewayContext::new(self.shutdown.clone()));
        let mux = mux.unwrap_or_else(Router::new);
        let dial = dial.unwrap_or_default();
        let port = port
            .unwrap_or(self.config.gateway_port)
            .resolve(self.config.port);

        let target = GatewayTarget::connect_lazy(&self.config, dial)?;
        let mux = register_all(&handlers, &context, mux, &target)?;

        tracing::info!(
            handlers = handlers.len(),
            endpoint = target.endpoint(),
            port = ?port,
            "Gateway registered"
        );

        self.gateway = Some(Gateway::new(mux, self.config.gateway_address.clone(), port));
        Ok(self)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Local address of the primary listener.
    pub fn local_addr(&self) -> String {
        self.listener.local_addr()
    }

    /// Coordinator that stops the server when triggered.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Observe the server's state transitions.
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.watch()
    }

    /// Serve until SIGINT or SIGTERM.
    ///
    /// The signal listener runs on its own task and triggers the shutdown
    /// coordinator; later signals are ignored. The task is aborted when `run`
    /// returns.
    pub async fn run(self) -> Result<()> {
        let mut signals = TerminationSignals::install().map_err(BootstrapError::Signal)?;
        let shutdown = self.shutdown.clone();
        let signal_task = tokio::spawn(async move {
            let signal = signals.recv().await;
            tracing::info!(signal, "Caught signal");
            shutdown.trigger();
        });
        let _signal_guard = AbortOnDrop(signal_task.abort_handle());

        self.run_until(std::future::pending::<()>()).await
    }

    /// Serve until `signal` resolves or the shutdown handle is triggered.
    pub async fn run_until<F>(mut self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let primary_port = self.config.port;
        let gateway_task: Option<JoinHandle<Result<()>>> = match self.gateway.take() {
            Some(gateway) => match gateway.serve_address(primary_port) {
                Some(address) => Some(tokio::spawn(gateway.serve(address))),
                None => {
                    tracing::debug!(port = ?gateway.port(), "Gateway skipped");
                    None
                }
            },
            None => None,
        };

        // Abort the gateway however the select! below ends.
        let gateway_guard = gateway_task
            .as_ref()
            .map(|task| AbortOnDrop(task.abort_handle()));

        // `shutdown` stays bound so the coordinator's channel outlives the loop.
        let RpcServer {
            config,
            listener,
            routes,
            interceptors,
            shutdown,
            shutdown_rx,
            state,
            ..
        } = self;

        let mut server = Server::builder();
        if let Some(timeout) = config.limits.request_timeout() {
            server = server.timeout(timeout);
        }
        if let Some(limit) = config.limits.concurrency_limit_per_connection {
            server = server.concurrency_limit_per_connection(limit);
        }
        let router = server
            .layer(InterceptorLayer::new(interceptors))
            .add_routes(routes.routes());

        let (incoming, socket_file) = listener.into_incoming();
        let serve: ServeFuture = match incoming {
            Incoming::Tcp(stream) => Box::pin(router.serve_with_incoming(stream)),
            #[cfg(unix)]
            Incoming::Unix(stream) => Box::pin(router.serve_with_incoming(stream)),
        };

        state.advance(ServerState::Running);
        tracing::info!(
            transport = %config.transport,
            address = %config.bind_address(),
            "Start gRPC server"
        );

        let outcome = tokio::select! {
            result = serve => match result {
                Ok(()) => Ok(()),
                Err(e) => Err(BootstrapError::Serve(e)),
            },
            result = wait_gateway(gateway_task) => result,
            _ = signal => Ok(()),
            _ = triggered(shutdown_rx) => Ok(()),
        };

        state.advance(ServerState::ShuttingDown);
        tracing::info!("Shutting down the server");
        drop(gateway_guard);
        shutdown.trigger();

        // The serve future, and with it the listener, is gone once select! returns.
        if let Some(socket) = socket_file {
            socket.remove()?;
        }

        state.advance(ServerState::Terminated);
        outcome?;
        tracing::info!("Server stopped");
        Ok(())
    }
}

/// Resolve with the gateway's outcome, or never when there is no gateway.
async fn wait_gateway(task: Option<JoinHandle<Result<()>>>) -> Result<()> {
    let Some(task) = task else {
        return std::future::pending().await;
    };
    match task.await {
        Ok(result) => result,
        Err(join) => Err(BootstrapError::Gateway {
            address: "gateway task".to_string(),
            source: std::io::Error::other(join),
        }),
    }
}

/// Aborts a background task when dropped.
struct AbortOnDrop(tokio::task::AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
