//! Built-in gateway handler for the standard health service.
//!
//! `GET {path}` checks the server as a whole, `GET {path}/{service}` checks
//! one service. Both translate into `grpc.health.v1.Health/Check`.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tonic::transport::Channel;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

use crate::error::HandlerError;
use crate::gateway::registration::{GatewayContext, GatewayHandler, GatewayTarget};
use crate::gateway::status::status_response;

pub const DEFAULT_HEALTH_PATH: &str = "/v1/health";

/// Serves health checks over HTTP.
#[derive(Debug, Clone)]
pub struct HealthGateway {
    path: String,
}

impl HealthGateway {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for HealthGateway {
    fn default() -> Self {
        Self::new(DEFAULT_HEALTH_PATH)
    }
}

/// Health handler on [`DEFAULT_HEALTH_PATH`].
pub fn health_handler() -> HealthGateway {
    HealthGateway::default()
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
}

impl GatewayHandler for HealthGateway {
    fn register(
        &self,
        _ctx: &GatewayContext,
        mux: Router,
        target: &GatewayTarget,
    ) -> Result<Router, HandlerError> {
        if !self.path.starts_with('/') || self.path.ends_with('/') {
            return Err(format!("health path must start and not end with '/': {}", self.path).into());
        }

        let routes = Router::new()
            .route(&self.path, get(check_server))
            .route(&format!("{}/{{service}}", self.path), get(check_service))
            .with_state(HealthClient::new(target.channel()));

        tracing::debug!(path = %self.path, endpoint = target.endpoint(), "Health gateway registered");
        Ok(mux.merge(routes))
    }
}

async fn check_server(State(client): State<HealthClient<Channel>>) -> Response {
    check(client, String::new()).await
}

async fn check_service(
    State(client): State<HealthClient<Channel>>,
    Path(service): Path<String>,
) -> Response {
    check(client, service).await
}

async fn check(mut client: HealthClient<Channel>, service: String) -> Response {
    match client.check(HealthCheckRequest { service }).await {
        Ok(response) => {
            let status = ServingStatus::try_from(response.into_inner().status)
                .unwrap_or(ServingStatus::Unknown);
            Json(HealthBody {
                status: status.as_str_name(),
            })
            .into_response()
        }
        Err(status) => {
            tracing::debug!(code = ?status.code(), message = status.message(), "Health check failed");
            status_response(&status)
        }
    }
}
