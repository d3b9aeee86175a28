//! HTTP-to-RPC gateway subsystem.
//!
//! # Data Flow
//! ```text
//! register_gateway(handlers, options)
//!     → registration.rs (defaults, target channel, handlers in order)
//!     → server.rs (mux + resolved port stored on the RpcServer)
//!
//! run()
//!     → server.rs (skip unless port set and distinct, then axum::serve)
//!     → HTTP request → handler route → RPC over the target channel
//!     → status.rs (RPC status → HTTP status + JSON body)
//! ```

pub mod health;
pub mod registration;
pub mod server;
pub mod status;

pub use health::{health_handler, HealthGateway};
pub use registration::{
    handler_fn, Credentials, DialOptions, GatewayContext, GatewayHandler, GatewayOptions,
    GatewayTarget, HandlerFn,
};
pub use server::Gateway;
pub use status::{grpc_to_http_status, status_response};
