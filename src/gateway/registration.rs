//! Gateway handler registration.
//!
//! A gateway handler populates the shared HTTP multiplexer with routes that
//! translate HTTP requests into RPC calls against the primary server. Every
//! handler receives the same [`GatewayTarget`]: the server's endpoint and a
//! lazily-connected channel dialed with the [`DialOptions`].

use std::path::PathBuf;
use std::time::Duration;

use axum::Router;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};

use crate::config::{GatewayPort, ServerConfig, Transport};
use crate::error::{HandlerError, RegistrationError};
use crate::lifecycle::Shutdown;

/// Context shared by all handlers of one registration.
#[derive(Debug, Clone)]
pub struct GatewayContext {
    shutdown: Shutdown,
}

impl GatewayContext {
    pub fn new(shutdown: Shutdown) -> Self {
        Self { shutdown }
    }

    /// Coordinator that fires when the server shuts down. Handlers that spawn
    /// background work should stop it when this fires.
    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }
}

/// Transport security used when dialing the primary server.
#[derive(Debug, Clone, Default)]
pub enum Credentials {
    /// Plaintext HTTP/2.
    #[default]
    Insecure,
    /// TLS with the given client configuration.
    Tls(ClientTlsConfig),
}

/// How the gateway dials the primary server.
#[derive(Debug, Clone, Default)]
pub struct DialOptions {
    pub credentials: Credentials,
    pub connect_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

impl DialOptions {
    /// Plaintext dialing with framework defaults.
    pub fn insecure() -> Self {
        Self::default()
    }
}

/// The primary server as seen by gateway handlers.
#[derive(Debug, Clone)]
pub struct GatewayTarget {
    endpoint: String,
    dial: DialOptions,
    channel: Channel,
}

impl GatewayTarget {
    /// Build a lazily-connected channel to the server described by `config`.
    pub fn connect_lazy(config: &ServerConfig, dial: DialOptions) -> Result<Self, RegistrationError> {
        let scheme = match dial.credentials {
            Credentials::Insecure => "http",
            Credentials::Tls(_) => "https",
        };
        // For unix sockets the authority is a placeholder; the connector dials the path.
        let uri = match config.transport {
            Transport::Tcp => format!("{scheme}://{}", config.endpoint()),
            Transport::Unix => format!("{scheme}://localhost"),
        };
        let invalid = |source| RegistrationError::InvalidEndpoint {
            endpoint: uri.clone(),
            source,
        };

        let mut endpoint = Endpoint::from_shared(uri.clone()).map_err(invalid)?;
        if let Some(timeout) = dial.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }
        if let Some(timeout) = dial.request_timeout {
            endpoint = endpoint.timeout(timeout);
        }
        if let Some(agent) = &dial.user_agent {
            endpoint = endpoint.user_agent(agent.clone()).map_err(invalid)?;
        }
        if let Credentials::Tls(tls) = &dial.credentials {
            endpoint = endpoint
                .tls_config(tls.clone())
                .map_err(RegistrationError::TlsConfig)?;
        }

        let channel = match config.transport {
            Transport::Tcp => endpoint.connect_lazy(),
            Transport::Unix => connect_unix_lazy(&endpoint, PathBuf::from(&config.address)),
        };

        Ok(Self {
            endpoint: config.endpoint(),
            dial,
            channel,
        })
    }

    /// Address of the primary server (`host:port` or `unix:<path>`).
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn dial_options(&self) -> &DialOptions {
        &self.dial
    }

    /// A handle on the shared channel. Cloning is cheap.
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }
}

#[cfg(unix)]
fn connect_unix_lazy(endpoint: &Endpoint, path: PathBuf) -> Channel {
    use hyper_util::rt::TokioIo;
    use tokio::net::UnixStream;

    endpoint.connect_with_connector_lazy(tower::service_fn(move |_: http::Uri| {
        let path = path.clone();
        async move { Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(path).await?)) }
    }))
}

#[cfg(not(unix))]
fn connect_unix_lazy(endpoint: &Endpoint, _path: PathBuf) -> Channel {
    endpoint.connect_lazy()
}

/// Registers translation routes on the gateway multiplexer.
pub trait GatewayHandler: Send + Sync {
    fn register(
        &self,
        ctx: &GatewayContext,
        mux: Router,
        target: &GatewayTarget,
    ) -> Result<Router, HandlerError>;
}

/// Build a handler from a closure.
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&GatewayContext, Router, &GatewayTarget) -> Result<Router, HandlerError>
        + Send
        + Sync
        + 'static,
{
    HandlerFn { f }
}

/// Handler returned by [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

impl<F> GatewayHandler for HandlerFn<F>
where
    F: Fn(&GatewayContext, Router, &GatewayTarget) -> Result<Router, HandlerError>
        + Send
        + Sync
        + 'static,
{
    fn register(
        &self,
        ctx: &GatewayContext,
        mux: Router,
        target: &GatewayTarget,
    ) -> Result<Router, HandlerError> {
        (self.f)(ctx, mux, target)
    }
}

/// Optional overrides for a registration. Unset fields take defaults.
#[derive(Debug, Default)]
pub struct GatewayOptions {
    /// Defaults to a context bound to the server's shutdown coordinator.
    pub context: Option<GatewayContext>,
    /// Defaults to an empty router.
    pub mux: Option<Router>,
    /// Defaults to [`DialOptions::insecure`].
    pub dial: Option<DialOptions>,
    /// Defaults to the configured gateway port.
    pub port: Option<GatewayPort>,
}

impl GatewayOptions {
    pub fn with_context(mut self, context: GatewayContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_mux(mut self, mux: Router) -> Self {
        self.mux = Some(mux);
        self
    }

    pub fn with_dial(mut self, dial: DialOptions) -> Self {
        self.dial = Some(dial);
        self
    }

    pub fn with_port(mut self, port: GatewayPort) -> Self {
        self.port = Some(port);
        self
    }
}

/// Run every handler in order against one multiplexer. The caller rejects an
/// empty list.
pub(crate) fn register_all(
    handlers: &[Box<dyn GatewayHandler>],
    ctx: &GatewayContext,
    mut mux: Router,
    target: &GatewayTarget,
) -> Result<Router, RegistrationError> {
    for (index, handler) in handlers.iter().enumerate() {
        mux = handler
            .register(ctx, mux, target)
            .map_err(|source| RegistrationError::Handler { index, source })?;
    }
    Ok(mux)
}
