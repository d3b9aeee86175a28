//! Metrics collection and exposition.
//!
//! # Metrics
//! - `grpc_server_requests_total` (counter): calls by method
//! - `grpc_server_request_duration_seconds` (histogram): time to response headers
//! - `grpc_server_requests_in_flight` (gauge): calls awaiting response headers

use std::net::SocketAddr;
use std::time::Instant;

use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::rpc::interceptor::{Interceptor, Next, RpcRequest, RpcResponse};

/// Install the Prometheus recorder with an HTTP scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

/// Holds one slot of the in-flight gauge; released on drop, so cancelled
/// calls are counted out too.
struct InFlight(metrics::Gauge);

impl InFlight {
    fn enter() -> Self {
        let gauge = metrics::gauge!("grpc_server_requests_in_flight");
        gauge.increment(1.0);
        Self(gauge)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.decrement(1.0);
    }
}

/// Records request counts and latency through the `metrics` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsInterceptor;

#[async_trait]
impl Interceptor for MetricsInterceptor {
    async fn intercept(&self, request: RpcRequest, next: Next) -> RpcResponse {
        let start = Instant::now();
        let method = request.uri().path().to_string();

        metrics::counter!("grpc_server_requests_total", "method" => method.clone()).increment(1);
        let in_flight = InFlight::enter();

        let response = next.run(request).await;

        drop(in_flight);
        metrics::histogram!("grpc_server_request_duration_seconds", "method" => method)
            .record(start.elapsed().as_secs_f64());

        response
    }
}
