//! Configuration schema definitions.
//!
//! [`BootstrapConfig`] is the raw, deserialized form. Its `server` section is
//! turned into a validated [`ServerConfig`] by
//! [`validate_config`](super::validation::validate_config); nothing downstream
//! of validation looks at the raw settings again.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Listener and gateway settings.
    pub server: ServerSettings,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Raw server settings as found in the config file or on the command line.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Transport kind, `tcp` or `unix` (case-insensitive).
    pub transport: String,

    /// Host for `tcp`, socket path for `unix`.
    pub address: String,

    /// Primary port. Also the base of the derived gateway port.
    pub port: i64,

    /// Gateway port. Absent or `-1` derives `port + 1`, `0` disables.
    pub gateway_port: Option<i64>,

    /// Host the gateway binds to. Defaults to `address` for `tcp`.
    pub gateway_address: Option<String>,

    /// Limits handed to the RPC framework.
    pub limits: LimitsConfig,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            transport: "tcp".to_string(),
            address: "127.0.0.1".to_string(),
            port: 50051,
            gateway_port: None,
            gateway_address: None,
            limits: LimitsConfig::default(),
        }
    }
}

/// Per-request limits. Unset fields leave the framework defaults in place.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Timeout applied to every RPC, in seconds.
    pub request_timeout_secs: Option<u64>,

    /// Maximum concurrent requests per connection.
    pub concurrency_limit_per_connection: Option<usize>,
}

impl LimitsConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Whether to expose the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Address of the Prometheus scrape endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "grpc_bootstrap=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Transport kinds the server can listen on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Unix domain socket; the address is a filesystem path.
    Unix,
    /// TCP; the address is a host name or IP literal.
    Tcp,
}

impl Transport {
    /// Every transport the server accepts.
    pub const SUPPORTED: [Transport; 2] = [Transport::Unix, Transport::Tcp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Unix => "unix",
            Transport::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SUPPORTED
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| s.to_string())
    }
}

/// Where the gateway listens, resolved from the raw `gateway_port` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GatewayPort {
    /// One above the primary port.
    #[default]
    Derived,
    /// An explicit port.
    Fixed(u16),
    /// No gateway port; a registered gateway is never started.
    Disabled,
}

impl GatewayPort {
    /// Resolve against the primary port. `None` means the gateway has no port.
    pub fn resolve(self, primary: u16) -> Option<u16> {
        match self {
            GatewayPort::Derived => primary.checked_add(1),
            GatewayPort::Fixed(port) => Some(port),
            GatewayPort::Disabled => None,
        }
    }
}

/// Validated, immutable server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub transport: Transport,
    pub address: String,
    pub port: u16,
    pub gateway_port: GatewayPort,
    pub gateway_address: String,
    pub limits: LimitsConfig,
}

impl ServerConfig {
    /// Address string handed to the OS: `host:port` for TCP, the path for unix.
    pub fn bind_address(&self) -> String {
        match self.transport {
            Transport::Tcp => host_port(&self.address, self.port),
            Transport::Unix => self.address.clone(),
        }
    }

    /// Address the gateway dials to reach this server, for logging and
    /// handlers: `host:port` for TCP, `unix:<path>` for unix.
    pub fn endpoint(&self) -> String {
        match self.transport {
            Transport::Tcp => host_port(&self.address, self.port),
            Transport::Unix => format!("unix:{}", self.address),
        }
    }
}

/// Join a host and port, bracketing bare IPv6 literals.
pub fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_parses_case_insensitively() {
        assert_eq!("TCP".parse::<Transport>(), Ok(Transport::Tcp));
        assert_eq!("Unix".parse::<Transport>(), Ok(Transport::Unix));
        assert_eq!("udp".parse::<Transport>(), Err("udp".to_string()));
        assert!("".parse::<Transport>().is_err());
    }

    #[test]
    fn derived_gateway_port_is_primary_plus_one() {
        assert_eq!(GatewayPort::Derived.resolve(50051), Some(50052));
        assert_eq!(GatewayPort::Derived.resolve(u16::MAX), None);
        assert_eq!(GatewayPort::Fixed(8080).resolve(50051), Some(8080));
        assert_eq!(GatewayPort::Disabled.resolve(50051), None);
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        assert_eq!(host_port("::1", 50051), "[::1]:50051");
        assert_eq!(host_port("[::1]", 50051), "[::1]:50051");
        assert_eq!(host_port("localhost", 80), "localhost:80");
    }

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [server]
            transport = "unix"
            address = "/tmp/app.sock"
        "#;
        let config: BootstrapConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.transport, "unix");
        assert_eq!(config.server.port, 50051);
        assert_eq!(config.server.gateway_port, None);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [server]
            transport = "tcp"
            address = "0.0.0.0"
            port = 9000
            gateway_port = -1
            gateway_address = "127.0.0.1"

            [server.limits]
            request_timeout_secs = 30
            concurrency_limit_per_connection = 64

            [observability]
            log_filter = "debug"
            log_format = "json"
            metrics_enabled = true
            metrics_address = "0.0.0.0:9100"
        "#;
        let config: BootstrapConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.gateway_port, Some(-1));
        assert_eq!(config.server.limits.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.server.limits.concurrency_limit_per_connection, Some(64));
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert!(config.observability.metrics_enabled);
    }
}
