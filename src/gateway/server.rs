//! Gateway HTTP server.
//!
//! # Responsibilities
//! - Hold the multiplexer populated by registration and the resolved port
//! - Decide whether the gateway runs at all
//! - Bind and serve the multiplexer with request tracing

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::schema::host_port;
use crate::error::BootstrapError;

/// A registered gateway, waiting for the server to run.
#[derive(Debug)]
pub struct Gateway {
    mux: Router,
    host: String,
    port: Option<u16>,
}

impl Gateway {
    pub fn new(mux: Router, host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            mux,
            host: host.into(),
            port,
        }
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Address to serve on, or `None` when the gateway must be skipped: it
    /// has no port, or its port collides with the primary server's.
    pub fn serve_address(&self, primary_port: u16) -> Option<String> {
        match self.port {
            Some(port) if port > 0 && port != primary_port => Some(host_port(&self.host, port)),
            _ => None,
        }
    }

    /// Bind and serve until the task is aborted.
    pub async fn serve(self, address: String) -> Result<(), BootstrapError> {
        let gateway_error = |source| BootstrapError::Gateway {
            address: address.clone(),
            source,
        };

        let listener = TcpListener::bind(&address).await.map_err(gateway_error)?;
        tracing::info!(address = %address, "Gateway server starting");

        let app = self.mux.layer(TraceLayer::new_for_http());
        axum::serve(listener, app).await.map_err(gateway_error)?;

        tracing::info!(address = %address, "Gateway server stopped");
        Ok(())
    }
}
