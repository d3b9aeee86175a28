//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use grpc_bootstrap::{BootstrapError, InterceptorChain, RpcServer, ServerSettings, ServerState, Shutdown};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tonic::transport::{Channel, Endpoint};
use tonic_health::pb::health_client::HealthClient;

/// TCP settings on loopback with the gateway disabled.
pub fn tcp_settings(port: u16) -> ServerSettings {
    ServerSettings {
        transport: "tcp".to_string(),
        address: "127.0.0.1".to_string(),
        port: i64::from(port),
        gateway_port: Some(0),
        ..ServerSettings::default()
    }
}

/// Unix settings on `path` with the gateway disabled.
pub fn unix_settings(path: &Path) -> ServerSettings {
    ServerSettings {
        transport: "unix".to_string(),
        address: path.display().to_string(),
        port: 1,
        gateway_port: Some(0),
        ..ServerSettings::default()
    }
}

/// Bind a server with the health service and the given chain.
pub async fn health_server(settings: &ServerSettings, chain: InterceptorChain) -> RpcServer {
    let mut server = RpcServer::from_settings(settings, chain).await.unwrap();
    let (_reporter, service) = tonic_health::server::health_reporter();
    server.add_service(service);
    server
}

/// A server running on its own task.
pub struct Running {
    pub shutdown: Shutdown,
    pub state: watch::Receiver<ServerState>,
    pub task: JoinHandle<Result<(), BootstrapError>>,
}

impl Running {
    /// Trigger shutdown and wait for `run_until` to return.
    pub async fn stop(self) -> Result<(), BootstrapError> {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("server did not stop")
            .unwrap()
    }
}

/// Spawn `server` and wait until it is accepting.
pub async fn spawn(server: RpcServer) -> Running {
    let shutdown = server.shutdown_handle();
    let mut state = server.state();
    let task = tokio::spawn(server.run_until(std::future::pending()));
    wait_for(&mut state, ServerState::Running).await;
    Running {
        shutdown,
        state,
        task,
    }
}

/// Wait until the state reaches at least `target`.
pub async fn wait_for(state: &mut watch::Receiver<ServerState>, target: ServerState) {
    tokio::time::timeout(Duration::from_secs(5), state.wait_for(|s| *s >= target))
        .await
        .expect("state not reached")
        .unwrap();
}

/// Health client over TCP.
pub async fn tcp_health_client(port: u16) -> HealthClient<Channel> {
    let channel = Endpoint::from_shared(format!("http://127.0.0.1:{port}"))
        .unwrap()
        .connect()
        .await
        .unwrap();
    HealthClient::new(channel)
}

/// Health client over a unix socket.
#[cfg(unix)]
pub async fn unix_health_client(path: &Path) -> HealthClient<Channel> {
    HealthClient::new(unix_channel(path).await.unwrap())
}

/// Channel dialing a unix socket.
#[cfg(unix)]
pub async fn unix_channel(path: &Path) -> Result<Channel, tonic::transport::Error> {
    use hyper_util::rt::TokioIo;
    use tokio::net::UnixStream;

    let path: PathBuf = path.to_path_buf();
    Endpoint::from_static("http://localhost")
        .connect_with_connector(tower::service_fn(move |_: http::Uri| {
            let path = path.clone();
            async move { Ok::<_, std::io::Error>(TokioIo::new(UnixStream::connect(path).await?)) }
        }))
        .await
}

/// GET `url`, retrying while the gateway comes up.
pub async fn http_get(url: &str) -> reqwest::Response {
    for _ in 0..50 {
        if let Ok(response) = reqwest::get(url).await {
            return response;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("gateway at {url} never answered");
}
