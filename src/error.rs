//! Error taxonomy for the bootstrapper.
//!
//! Every variant is fatal for the server: nothing is retried locally. The
//! library returns these to the caller, and the daemon's `main` is the single
//! place that logs them and picks the exit code.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::config::Transport;

/// Boxed error returned by user-supplied gateway handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while starting, running or stopping a server.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Missing, unsupported or malformed configuration.
    #[error("invalid server configuration: {0}")]
    Config(#[from] ConfigError),

    /// Listener creation failed.
    #[error("failed to listen on {transport} {address}: {source}")]
    Bind {
        transport: Transport,
        address: String,
        #[source]
        source: io::Error,
    },

    /// Gateway registration failed.
    #[error("failed to register gateway: {0}")]
    Registration(#[from] RegistrationError),

    /// The termination signal handler could not be installed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] io::Error),

    /// The RPC accept loop stopped with an error.
    #[error("failed to serve: {0}")]
    Serve(#[source] tonic::transport::Error),

    /// The gateway could not bind or its accept loop stopped with an error.
    #[error("gateway server on {address} failed: {source}")]
    Gateway {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The unix socket file could not be removed on shutdown.
    #[error("failed to remove socket file {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors raised by [`RpcServer::register_gateway`](crate::rpc::RpcServer::register_gateway).
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("no gateway handlers were supplied")]
    EmptyHandlers,

    #[error("invalid gateway endpoint {endpoint}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("invalid gateway TLS configuration: {0}")]
    TlsConfig(#[source] tonic::transport::Error),

    #[error("gateway handler #{index} failed: {source}")]
    Handler {
        index: usize,
        #[source]
        source: HandlerError,
    },
}

pub type Result<T, E = BootstrapError> = std::result::Result<T, E>;
