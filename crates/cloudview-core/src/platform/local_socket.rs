//! Name-addressed local transport for the single-instance endpoint.
//!
//! # Platform Behavior
//! - **Unix**: a domain socket at [`SessionEndpoint::socket_path`]
//! - **Windows**: the named pipe [`SessionEndpoint::pipe_name`]
//!
//! Callers only see `connect`, `LocalListener::bind` and
//! `LocalListener::accept`; both stream types implement tokio's
//! `AsyncRead + AsyncWrite`.

use crate::ipc::endpoint::SessionEndpoint;
use std::io;

#[cfg(unix)]
pub use unix::{connect, AcceptedStream, LocalListener, LocalStream};
#[cfg(windows)]
pub use windows::{connect, AcceptedStream, LocalListener, LocalStream};

#[cfg(unix)]
mod unix {
    use super::*;
    use std::path::PathBuf;
    use tokio::net::{UnixListener, UnixStream};
    use tracing::debug;

    /// Client side of a connection.
    pub type LocalStream = UnixStream;
    /// Server side of an accepted connection.
    pub type AcceptedStream = UnixStream;

    /// Connect to the endpoint's socket. Fails immediately when no socket
    /// file exists or nobody is listening on it.
    pub async fn connect(endpoint: &SessionEndpoint) -> io::Result<LocalStream> {
        UnixStream::connect(endpoint.socket_path()).await
    }

    /// Listening socket. The socket file is removed on drop.
    #[derive(Debug)]
    pub struct LocalListener {
        inner: UnixListener,
        path: PathBuf,
    }

    impl LocalListener {
        /// Bind the endpoint's socket path.
        ///
        /// The caller must hold the session lock: any file already at the
        /// path is treated as left over from a dead instance and removed.
        pub fn bind(endpoint: &SessionEndpoint) -> io::Result<Self> {
            let path = endpoint.socket_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed stale socket {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
            let inner = UnixListener::bind(&path)?;
            Ok(Self { inner, path })
        }

        pub async fn accept(&mut self) -> io::Result<AcceptedStream> {
            let (stream, _addr) = self.inner.accept().await?;
            Ok(stream)
        }
    }

    impl Drop for LocalListener {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(windows)]
mod windows {
    use super::*;
    use tokio::net::windows::named_pipe::{
        ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions,
    };

    /// Client side of a connection.
    pub type LocalStream = NamedPipeClient;
    /// Server side of an accepted connection.
    pub type AcceptedStream = NamedPipeServer;

    /// Open the endpoint's named pipe. Fails immediately when no server
    /// instance of the pipe exists.
    pub async fn connect(endpoint: &SessionEndpoint) -> io::Result<LocalStream> {
        ClientOptions::new().open(endpoint.pipe_name())
    }

    /// Listening pipe. One unconnected pipe instance is always kept ready
    /// so clients never observe a gap between accepts.
    #[derive(Debug)]
    pub struct LocalListener {
        name: String,
        next: NamedPipeServer,
    }

    impl LocalListener {
        pub fn bind(endpoint: &SessionEndpoint) -> io::Result<Self> {
            let name = endpoint.pipe_name();
            let next = ServerOptions::new()
                .first_pipe_instance(true)
                .create(&name)?;
            Ok(Self { name, next })
        }

        /// The replacement instance is created before waiting, so a client
        /// that has connected is always handed back to the caller.
        pub async fn accept(&mut self) -> io::Result<AcceptedStream> {
            let fresh = ServerOptions::new().create(&self.name)?;
            self.next.connect().await?;
            Ok(std::mem::replace(&mut self.next, fresh))
        }
    }
}
