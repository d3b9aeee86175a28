//! RPC server subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming connection (tcp or unix)
//!     → tonic transport (HTTP/2, limits)
//!     → layer.rs (InterceptedService, picks unary or stream chain by path)
//!     → interceptor.rs (Next::run walks the chain in registration order)
//!     → routed service
//! ```
//!
//! # Design Decisions
//! - Interceptors see the raw HTTP request so they can short-circuit with a status
//! - Streaming methods are declared on the chain; everything else is unary
//! - server.rs owns the listener, routes and lifecycle state

pub mod interceptor;
pub mod layer;
pub mod request_id;
pub mod server;
pub mod trace;

pub use interceptor::{
    from_fn, from_metadata_fn, CallKind, Interceptor, InterceptorChain, InterceptorChainBuilder,
    Next, RpcRequest, RpcResponse,
};
pub use layer::InterceptorLayer;
pub use request_id::{RequestId, RequestIdExt, RequestIdInterceptor, X_REQUEST_ID};
pub use server::RpcServer;
pub use trace::TraceInterceptor;
