//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig (tcp host:port | unix path)
//!     → listener.rs (bind)
//!     → Incoming stream handed to the RPC server
//!     → on shutdown: stream dropped, unix socket file removed
//!     → on drop without shutdown: SocketFile guard unlinks the socket
//! ```

pub mod listener;

pub use listener::{remove_socket_file, Incoming, Listener, SocketFile};
