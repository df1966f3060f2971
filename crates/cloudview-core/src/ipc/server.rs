//! Server listener for the primary cloudview instance.
//!
//! Claims the session endpoint (lock file, then bind) and serves one
//! command per connection. Connections are handled one at a time on the
//! listener task: read a single frame with a bounded wait, decode it,
//! dispatch synchronously, hang up.
//!
//! The listener runs until its handle is shut down or dropped, which in
//! the application means process exit.

use super::endpoint::{SessionEndpoint, SessionLock};
use super::protocol::{read_frame, Command};
use crate::config::IpcConfig;
use crate::error::{CloudviewError, Result};
use crate::platform::LocalListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Host-side sink for commands received from other processes.
pub trait CommandHandler: Send + Sync + 'static {
    /// Open `paths` exactly as if they had been given on the command line.
    fn on_files_requested(&self, paths: Vec<PathBuf>);
}

/// Handle to a running listener. Dropping it stops the listener, removes
/// the endpoint and releases the session lock.
pub struct InstanceServerHandle {
    endpoint: SessionEndpoint,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl InstanceServerHandle {
    pub fn endpoint(&self) -> &SessionEndpoint {
        &self.endpoint
    }

    /// Stop accepting connections.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for InstanceServerHandle {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for InstanceServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceServerHandle")
            .field("endpoint", &self.endpoint)
            .field("running", &self.shutdown_tx.is_some())
            .finish()
    }
}

/// Listener for the session endpoint.
pub struct InstanceServer;

impl InstanceServer {
    /// Claim `endpoint` and start serving it in a background task.
    ///
    /// Fails with `EndpointInUse` if another process owns the session.
    pub async fn start<H: CommandHandler>(
        endpoint: &SessionEndpoint,
        handler: Arc<H>,
    ) -> Result<InstanceServerHandle> {
        Self::start_with_read_timeout(endpoint, handler, IpcConfig::FRAME_READ_TIMEOUT).await
    }

    /// As [`InstanceServer::start`] with a custom per-connection read bound.
    pub async fn start_with_read_timeout<H: CommandHandler>(
        endpoint: &SessionEndpoint,
        handler: Arc<H>,
        read_timeout: Duration,
    ) -> Result<InstanceServerHandle> {
        let lock = endpoint.acquire_lock()?;
        let listener = LocalListener::bind(endpoint).map_err(|e| CloudviewError::Io {
            message: format!("Failed to bind session endpoint {}: {}", endpoint, e),
            path: Some(endpoint.socket_path()),
            source: Some(e),
        })?;

        info!("Instance server listening on {}", endpoint);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task_handle = tokio::spawn(Self::accept_loop(
            listener,
            lock,
            handler,
            shutdown_rx,
            read_timeout,
        ));

        Ok(InstanceServerHandle {
            endpoint: endpoint.clone(),
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
        })
    }

    async fn accept_loop<H: CommandHandler>(
        mut listener: LocalListener,
        // Held for the lifetime of the loop; released when the task ends.
        _lock: SessionLock,
        handler: Arc<H>,
        mut shutdown_rx: oneshot::Receiver<()>,
        read_timeout: Duration,
    ) {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Instance server shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok(stream) => {
                            if let Err(e) = Self::handle_connection(stream, &*handler, read_timeout).await {
                                warn!("Instance connection ended with error: {}", e);
                            }
                        }
                        Err(e) => {
                            error!("Instance server accept error: {}", e);
                        }
                    }
                }
            }
        }
    }

    async fn handle_connection<S, H>(mut stream: S, handler: &H, read_timeout: Duration) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        H: CommandHandler + ?Sized,
    {
        let frame = tokio::time::timeout(read_timeout, read_frame(&mut stream))
            .await
            .map_err(|_| CloudviewError::Timeout(read_timeout))??;

        let Some(payload) = frame else {
            debug!("Peer closed without sending a command");
            return Ok(());
        };

        match Command::decode(&payload) {
            Ok(Command::Empty) => {
                debug!("Received empty command");
            }
            Ok(Command::OpenFiles(paths)) => {
                info!("Received request to open {} file(s)", paths.len());
                handler.on_files_requested(paths);
            }
            Err(e) => {
                warn!("Ignoring command from peer: {}", e);
            }
        }

        let _ = stream.shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::protocol::write_frame;
    use crate::platform;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::sync::mpsc;

    struct RecordingHandler {
        tx: mpsc::UnboundedSender<Vec<PathBuf>>,
    }

    impl CommandHandler for RecordingHandler {
        fn on_files_requested(&self, paths: Vec<PathBuf>) {
            let _ = self.tx.send(paths);
        }
    }

    fn recording() -> (Arc<RecordingHandler>, mpsc::UnboundedReceiver<Vec<PathBuf>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(RecordingHandler { tx }), rx)
    }

    /// Send one raw payload and wait for the server to hang up.
    async fn send_raw(endpoint: &SessionEndpoint, payload: &[u8]) {
        let mut stream = platform::connect(endpoint).await.unwrap();
        write_frame(&mut stream, payload).await.unwrap();
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_open_files_reaches_handler() {
        let dir = TempDir::new().unwrap();
        let endpoint = SessionEndpoint::in_dir(dir.path(), "open-files");
        let (handler, mut rx) = recording();
        let mut handle = InstanceServer::start(&endpoint, handler).await.unwrap();

        send_raw(&endpoint, b"OPEN_FILES\n/abs/a.las\n/abs/b.las").await;

        assert_eq!(
            rx.recv().await.unwrap(),
            vec![PathBuf::from("/abs/a.las"), PathBuf::from("/abs/b.las")]
        );
        handle.shutdown();
    }

    #[tokio::test]
    async fn test_unrecognized_payload_is_ignored_and_server_keeps_serving() {
        let dir = TempDir::new().unwrap();
        let endpoint = SessionEndpoint::in_dir(dir.path(), "garbage");
        let (handler, mut rx) = recording();
        let _handle = InstanceServer::start(&endpoint, handler).await.unwrap();

        send_raw(&endpoint, b"SELF_DESTRUCT").await;
        send_raw(&endpoint, b"").await;
        send_raw(&endpoint, b"OPEN_FILES\n/abs/after.las").await;

        // Only the valid command produced a request
        assert_eq!(rx.recv().await.unwrap(), vec![PathBuf::from("/abs/after.las")]);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_silent_peer_is_dropped_after_read_timeout() {
        let dir = TempDir::new().unwrap();
        let endpoint = SessionEndpoint::in_dir(dir.path(), "silent");
        let (handler, mut rx) = recording();
        let _handle =
            InstanceServer::start_with_read_timeout(&endpoint, handler, Duration::from_millis(50))
                .await
                .unwrap();

        // Connect and say nothing; the server must give up and move on
        let _silent = platform::connect(&endpoint).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        send_raw(&endpoint, b"OPEN_FILES\n/abs/next.las").await;
        assert_eq!(rx.recv().await.unwrap(), vec![PathBuf::from("/abs/next.las")]);
    }

    #[tokio::test]
    async fn test_second_server_on_same_endpoint_is_rejected() {
        let dir = TempDir::new().unwrap();
        let endpoint = SessionEndpoint::in_dir(dir.path(), "contended");
        let (first_handler, _rx1) = recording();
        let (second_handler, _rx2) = recording();

        let _first = InstanceServer::start(&endpoint, first_handler).await.unwrap();
        let second = InstanceServer::start(&endpoint, second_handler).await;

        assert!(matches!(second, Err(CloudviewError::EndpointInUse { .. })));
    }

    #[tokio::test]
    async fn test_endpoint_is_reusable_after_shutdown() {
        let dir = TempDir::new().unwrap();
        let endpoint = SessionEndpoint::in_dir(dir.path(), "reuse");
        let (handler, _rx) = recording();

        let handle = InstanceServer::start(&endpoint, handler.clone()).await.unwrap();
        drop(handle);
        // The aborted task drops the lock asynchronously
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(InstanceServer::start(&endpoint, handler).await.is_ok());
    }
}
