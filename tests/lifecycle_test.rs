//! Server lifecycle: bind, serve, shut down, clean up.

mod common;

use std::time::Duration;

use grpc_bootstrap::config::ConfigError;
use grpc_bootstrap::gateway::{health_handler, GatewayHandler, GatewayOptions};
use grpc_bootstrap::{
    BootstrapError, GatewayPort, InterceptorChain, RpcServer, ServerSettings, ServerState,
};
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::HealthCheckRequest;

use common::*;

#[tokio::test]
async fn tcp_server_answers_health_checks() {
    let server = health_server(&tcp_settings(38801), InterceptorChain::empty()).await;
    assert_eq!(server.local_addr(), "127.0.0.1:38801");
    let running = spawn(server).await;

    let mut client = tcp_health_client(38801).await;
    let response = client
        .check(HealthCheckRequest {
            service: String::new(),
        })
        .await
        .unwrap();
    assert_eq!(response.into_inner().status, ServingStatus::Serving as i32);

    running.stop().await.unwrap();
}

#[tokio::test]
async fn shutdown_handle_stops_server_and_closes_listener() {
    let server = health_server(&tcp_settings(38802), InterceptorChain::empty()).await;
    let running = spawn(server).await;
    let mut state = running.state.clone();

    running.stop().await.unwrap();
    assert_eq!(*state.borrow_and_update(), ServerState::Terminated);

    let connect = tokio::net::TcpStream::connect("127.0.0.1:38802").await;
    assert!(connect.is_err(), "listener still open after shutdown");
}

#[tokio::test]
async fn trigger_before_run_is_not_lost() {
    let server = health_server(&tcp_settings(38803), InterceptorChain::empty()).await;
    server.shutdown_handle().trigger();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        server.run_until(std::future::pending()),
    )
    .await
    .expect("early trigger was lost");
    assert!(result.is_ok());
}

#[tokio::test]
async fn run_until_future_stops_server() {
    let server = health_server(&tcp_settings(38804), InterceptorChain::empty()).await;
    let mut state = server.state();
    assert_eq!(*state.borrow(), ServerState::Constructed);

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let task = tokio::spawn(server.run_until(async {
        let _ = rx.await;
    }));
    wait_for(&mut state, ServerState::Running).await;

    tx.send(()).unwrap();
    task.await.unwrap().unwrap();
    assert_eq!(*state.borrow(), ServerState::Terminated);
}

#[cfg(unix)]
#[tokio::test]
async fn unix_socket_serves_and_is_removed_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grpc.sock");

    let server = health_server(&unix_settings(&path), InterceptorChain::empty()).await;
    assert!(path.exists());
    let running = spawn(server).await;

    let mut client = unix_health_client(&path).await;
    let response = client
        .check(HealthCheckRequest {
            service: String::new(),
        })
        .await
        .unwrap();
    assert_eq!(response.into_inner().status, ServingStatus::Serving as i32);

    running.stop().await.unwrap();
    assert!(!path.exists(), "socket file left behind");
}

#[cfg(unix)]
#[tokio::test]
async fn existing_socket_path_fails_to_bind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taken.sock");
    std::fs::write(&path, b"").unwrap();

    let err = RpcServer::from_settings(&unix_settings(&path), InterceptorChain::empty())
        .await
        .unwrap_err();
    assert!(matches!(err, BootstrapError::Bind { .. }));
    assert!(path.exists());
}

#[tokio::test]
async fn occupied_port_fails_to_bind() {
    let _holder = std::net::TcpListener::bind("127.0.0.1:38805").unwrap();
    let err = RpcServer::from_settings(&tcp_settings(38805), InterceptorChain::empty())
        .await
        .unwrap_err();
    assert!(matches!(err, BootstrapError::Bind { .. }));
}

#[tokio::test]
async fn invalid_settings_fail_before_binding() {
    let cases = [
        ServerSettings {
            transport: String::new(),
            ..tcp_settings(38806)
        },
        ServerSettings {
            transport: "udp".to_string(),
            ..tcp_settings(38806)
        },
        ServerSettings {
            address: String::new(),
            ..tcp_settings(38806)
        },
        ServerSettings {
            port: 0,
            ..tcp_settings(38806)
        },
    ];

    for settings in &cases {
        let err = RpcServer::from_settings(settings, InterceptorChain::empty())
            .await
            .unwrap_err();
        assert!(
            matches!(err, BootstrapError::Config(ConfigError::Validation(_))),
            "unexpected error for {settings:?}: {err}"
        );
    }

    // Nothing was bound on the port.
    let rebind = std::net::TcpListener::bind("127.0.0.1:38806");
    assert!(rebind.is_ok());
}

#[cfg(unix)]
#[tokio::test]
async fn failed_startup_releases_socket_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("restart.sock");
    let settings = unix_settings(&path);

    let mut server = health_server(&settings, InterceptorChain::empty()).await;
    let err = server
        .register_gateway(Vec::new(), GatewayOptions::default())
        .unwrap_err();
    assert!(matches!(err, BootstrapError::Registration(_)));
    drop(server);
    assert!(!path.exists(), "socket file left behind after failed startup");

    // A restart binds the same path.
    let server = health_server(&settings, InterceptorChain::empty()).await;
    let running = spawn(server).await;
    running.stop().await.unwrap();
    assert!(!path.exists());
}

#[tokio::test]
async fn run_releases_signal_listener_on_error() {
    let _holder = std::net::TcpListener::bind("127.0.0.1:38808").unwrap();

    let mut server = health_server(&tcp_settings(38807), InterceptorChain::empty()).await;
    let handlers: Vec<Box<dyn GatewayHandler>> = vec![Box::new(health_handler())];
    server
        .register_gateway(
            handlers,
            GatewayOptions::default().with_port(GatewayPort::Fixed(38808)),
        )
        .unwrap();
    // The server's own coordinator and the signal task hold the only senders.
    let mut rx = server.shutdown_handle().subscribe();

    let result = tokio::time::timeout(Duration::from_secs(5), server.run())
        .await
        .expect("gateway bind failure did not stop the server");
    assert!(matches!(result, Err(BootstrapError::Gateway { .. })));

    let closed = tokio::time::timeout(Duration::from_secs(1), async {
        while rx.recv().await.is_ok() {}
    })
    .await;
    assert!(closed.is_ok(), "signal listener outlived the server");
}
