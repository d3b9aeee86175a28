//! Per-call logging interceptor.

use std::time::Instant;

use async_trait::async_trait;

use crate::rpc::interceptor::{Interceptor, Next, RpcRequest, RpcResponse};
use crate::rpc::request_id::RequestIdExt;

/// Logs one structured line per call.
///
/// The gRPC status is only known here when the server answered with a
/// trailers-only response (errors, mostly); otherwise it travels in the
/// trailers and is logged as `pending`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceInterceptor;

#[async_trait]
impl Interceptor for TraceInterceptor {
    async fn intercept(&self, request: RpcRequest, next: Next) -> RpcResponse {
        let start = Instant::now();
        let method = request.uri().path().to_string();
        let request_id = request
            .request_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());

        tracing::debug!(request_id = %request_id, method = %method, "RPC started");

        let response = next.run(request).await;

        let grpc_status = response
            .headers()
            .get("grpc-status")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("pending")
            .to_string();

        tracing::info!(
            request_id = %request_id,
            method = %method,
            grpc_status = %grpc_status,
            latency_ms = start.elapsed().as_millis() as u64,
            "RPC finished"
        );

        response
    }
}
