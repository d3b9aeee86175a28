//! Listener binding for the supported transports.
//!
//! # Responsibilities
//! - Bind TCP or unix-domain listeners from a validated [`ServerConfig`]
//! - Turn the listener into the incoming-connection stream the RPC server consumes
//! - Own the unix socket file so it is unlinked on shutdown, or on drop when
//!   the server never ran

use std::io;
use std::path::{Path, PathBuf};

use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tokio_stream::wrappers::TcpListenerStream;
#[cfg(unix)]
use tokio_stream::wrappers::UnixListenerStream;

use crate::config::{ServerConfig, Transport};
use crate::error::BootstrapError;

/// A bound, not-yet-accepting listener.
#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix { inner: UnixListener, socket: SocketFile },
}

impl Listener {
    /// Bind according to the configured transport.
    ///
    /// A unix socket path that already exists is refused rather than replaced.
    pub async fn bind(config: &ServerConfig) -> Result<Self, BootstrapError> {
        let address = config.bind_address();
        let bind_error = |source: io::Error| BootstrapError::Bind {
            transport: config.transport,
            address: address.clone(),
            source,
        };

        let listener = match config.transport {
            Transport::Tcp => Listener::Tcp(TcpListener::bind(&address).await.map_err(bind_error)?),
            Transport::Unix => bind_unix(Path::new(&address)).map_err(bind_error)?,
        };

        tracing::info!(
            transport = %config.transport,
            address = %listener.local_addr(),
            "Listener bound"
        );

        Ok(listener)
    }

    /// Human-readable local address (the resolved socket address for TCP).
    pub fn local_addr(&self) -> String {
        match self {
            Listener::Tcp(inner) => inner
                .local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "<unknown>".to_string()),
            #[cfg(unix)]
            Listener::Unix { socket, .. } => socket.path().display().to_string(),
        }
    }

    /// Path of the socket file, for unix listeners.
    pub fn socket_path(&self) -> Option<&Path> {
        match self {
            Listener::Tcp(_) => None,
            #[cfg(unix)]
            Listener::Unix { socket, .. } => Some(socket.path()),
        }
    }

    /// Split into an incoming-connection stream and the socket file to clean up.
    pub fn into_incoming(self) -> (Incoming, Option<SocketFile>) {
        match self {
            Listener::Tcp(inner) => (Incoming::Tcp(TcpListenerStream::new(inner)), None),
            #[cfg(unix)]
            Listener::Unix { inner, socket } => {
                (Incoming::Unix(UnixListenerStream::new(inner)), Some(socket))
            }
        }
    }
}

/// Stream of accepted connections.
#[derive(Debug)]
pub enum Incoming {
    Tcp(TcpListenerStream),
    #[cfg(unix)]
    Unix(UnixListenerStream),
}

#[cfg(unix)]
fn bind_unix(path: &Path) -> io::Result<Listener> {
    if path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            format!("socket path {} already exists", path.display()),
        ));
    }
    let inner = UnixListener::bind(path)?;
    Ok(Listener::Unix {
        inner,
        socket: SocketFile::new(path.to_path_buf()),
    })
}

#[cfg(not(unix))]
fn bind_unix(_path: &Path) -> io::Result<Listener> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "unix domain sockets are not available on this platform",
    ))
}

/// The file backing a bound unix socket.
///
/// [`remove`](SocketFile::remove) unlinks it and reports failures. A file
/// still owned when dropped is unlinked on a best-effort basis, so a server
/// that fails after binding does not block the next start.
#[derive(Debug)]
pub struct SocketFile {
    path: PathBuf,
    armed: bool,
}

impl SocketFile {
    #[cfg_attr(not(unix), allow(dead_code))]
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlink the file.
    pub fn remove(mut self) -> Result<(), BootstrapError> {
        self.armed = false;
        remove_socket_file(&self.path)
    }
}

impl Drop for SocketFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = remove_socket_file(&self.path) {
            tracing::warn!(error = %e, "Socket file left behind");
        }
    }
}

/// Remove the socket file backing a unix listener.
pub fn remove_socket_file(path: &Path) -> Result<(), BootstrapError> {
    tracing::debug!(path = %path.display(), "Removing socket file");
    std::fs::remove_file(path).map_err(|source| BootstrapError::Cleanup {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{validate_config, ServerSettings};

    fn config(transport: &str, address: &str, port: i64) -> ServerConfig {
        validate_config(&ServerSettings {
            transport: transport.to_string(),
            address: address.to_string(),
            port,
            ..ServerSettings::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn binds_tcp() {
        let listener = Listener::bind(&config("tcp", "127.0.0.1", 38711)).await.unwrap();
        assert_eq!(listener.local_addr(), "127.0.0.1:38711");
        assert!(listener.socket_path().is_none());
    }

    #[tokio::test]
    async fn tcp_port_in_use_is_bind_error() {
        let cfg = config("tcp", "127.0.0.1", 38712);
        let _first = Listener::bind(&cfg).await.unwrap();
        let err = Listener::bind(&cfg).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Bind { transport: Transport::Tcp, .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn binds_unix_and_removes_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("listener.sock");
        let listener = Listener::bind(&config("unix", path.to_str().unwrap(), 1)).await.unwrap();
        assert!(path.exists());

        let (_incoming, socket) = listener.into_incoming();
        let socket = socket.unwrap();
        assert_eq!(socket.path(), path);
        socket.remove().unwrap();
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dropped_listener_unlinks_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dropped.sock");
        let cfg = config("unix", path.to_str().unwrap(), 1);

        drop(Listener::bind(&cfg).await.unwrap());
        assert!(!path.exists());

        // The path is free again.
        let listener = Listener::bind(&cfg).await.unwrap();
        let (incoming, socket) = listener.into_incoming();
        drop(incoming);
        drop(socket);
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn removed_socket_is_not_unlinked_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("once.sock");
        let listener = Listener::bind(&config("unix", path.to_str().unwrap(), 1)).await.unwrap();
        let (_incoming, socket) = listener.into_incoming();
        socket.unwrap().remove().unwrap();

        // A file created afterwards at the same path is left alone.
        std::fs::write(&path, b"").unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn existing_unix_path_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stale.sock");
        std::fs::write(&path, b"").unwrap();

        let err = Listener::bind(&config("unix", path.to_str().unwrap(), 1)).await.unwrap_err();
        assert!(matches!(err, BootstrapError::Bind { transport: Transport::Unix, .. }));
    }

    #[test]
    fn removing_missing_socket_is_cleanup_error() {
        let err = remove_socket_file(Path::new("/nonexistent/dir/x.sock")).unwrap_err();
        assert!(matches!(err, BootstrapError::Cleanup { .. }));
    }
}
