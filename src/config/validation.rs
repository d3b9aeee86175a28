//! Configuration validation.
//!
//! Turns raw [`ServerSettings`] into a [`ServerConfig`]. All problems are
//! collected so the operator sees every mistake at once; nothing is bound
//! until validation has passed.

use thiserror::Error;

use crate::config::schema::{GatewayPort, ServerConfig, ServerSettings, Transport};

/// Host the gateway binds to when the primary transport is a unix socket.
pub const DEFAULT_UNIX_GATEWAY_ADDRESS: &str = "127.0.0.1";

/// A single semantic problem in the server settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server transport is not set")]
    MissingTransport,

    #[error("transport is not supported: {0} (expected one of: unix, tcp)")]
    UnsupportedTransport(String),

    #[error("server address is not set")]
    MissingAddress,

    #[error("port must be between 1 and 65535, got {0}")]
    InvalidPort(i64),

    #[error("gateway port must be -1, 0 or between 1 and 65535, got {0}")]
    InvalidGatewayPort(i64),

    #[error("gateway address must not be empty")]
    EmptyGatewayAddress,
}

/// Validate raw settings, returning every error found.
pub fn validate_config(settings: &ServerSettings) -> Result<ServerConfig, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let transport = if settings.transport.trim().is_empty() {
        errors.push(ValidationError::MissingTransport);
        None
    } else {
        match settings.transport.parse::<Transport>() {
            Ok(t) => Some(t),
            Err(raw) => {
                errors.push(ValidationError::UnsupportedTransport(raw));
                None
            }
        }
    };

    let address = settings.address.trim();
    if address.is_empty() {
        errors.push(ValidationError::MissingAddress);
    }

    let port = match u16::try_from(settings.port) {
        Ok(p) if p > 0 => Some(p),
        _ => {
            errors.push(ValidationError::InvalidPort(settings.port));
            None
        }
    };

    let gateway_port = match settings.gateway_port {
        None | Some(-1) => Some(GatewayPort::Derived),
        Some(0) => Some(GatewayPort::Disabled),
        Some(raw) => match u16::try_from(raw) {
            Ok(p) => Some(GatewayPort::Fixed(p)),
            Err(_) => {
                errors.push(ValidationError::InvalidGatewayPort(raw));
                None
            }
        },
    };

    if matches!(settings.gateway_address.as_deref(), Some(a) if a.trim().is_empty()) {
        errors.push(ValidationError::EmptyGatewayAddress);
    }

    match (transport, port, gateway_port) {
        (Some(transport), Some(port), Some(gateway_port)) if errors.is_empty() => {
            let gateway_address = match (&settings.gateway_address, transport) {
                (Some(a), _) => a.trim().to_string(),
                (None, Transport::Tcp) => address.to_string(),
                (None, Transport::Unix) => DEFAULT_UNIX_GATEWAY_ADDRESS.to_string(),
            };
            Ok(ServerConfig {
                transport,
                address: address.to_string(),
                port,
                gateway_port,
                gateway_address,
                limits: settings.limits.clone(),
            })
        }
        _ => Err(errors),
    }
}
