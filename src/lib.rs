//! gRPC server bootstrap library.
//!
//! Validates listener settings, binds a tcp or unix socket, wraps services in
//! an interceptor chain, optionally serves an HTTP gateway next to the RPC
//! port, and tears everything down on SIGINT or SIGTERM.

pub mod config;
pub mod error;
pub mod gateway;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod rpc;

pub use config::{GatewayPort, ServerConfig, ServerSettings, Transport};
pub use error::{BootstrapError, RegistrationError};
pub use gateway::{GatewayHandler, GatewayOptions};
pub use lifecycle::{ServerState, Shutdown};
pub use rpc::{Interceptor, InterceptorChain, RpcServer};
