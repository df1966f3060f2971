//! Client probe: detect a running instance and hand it our files.
//!
//! The probe makes a single bounded connect attempt. A miss means nobody
//! owns the session endpoint and the caller should start its own instance.
//! A hit sends exactly one frame, half-closes, and waits a bounded time for
//! the server to hang up before abandoning the connection.

use super::endpoint::SessionEndpoint;
use super::protocol::{write_frame, Command};
use crate::config::IpcConfig;
use crate::error::{CloudviewError, Result};
use crate::platform;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

/// Result of probing a session endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Nothing answered within the connect timeout.
    NoInstance,
    /// A running instance accepted this command.
    Forwarded(Command),
}

/// Probe timeouts. Defaults come from [`IpcConfig`].
#[derive(Debug, Clone, Copy)]
pub struct InstanceClient {
    connect_timeout: Duration,
    disconnect_timeout: Duration,
}

impl Default for InstanceClient {
    fn default() -> Self {
        Self {
            connect_timeout: IpcConfig::CONNECT_TIMEOUT,
            disconnect_timeout: IpcConfig::DISCONNECT_TIMEOUT,
        }
    }
}

impl InstanceClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    /// Try to hand `command` to the instance listening on `endpoint`.
    ///
    /// A connect miss or timeout is not an error: it yields
    /// `ProbeOutcome::NoInstance`. Once connected the command is always
    /// sent, so a live instance is never mistaken for a missing one.
    /// Failures after the connection is up are reported as `InstanceLost`.
    pub async fn probe(&self, endpoint: &SessionEndpoint, command: Command) -> Result<ProbeOutcome> {
        let connect = tokio::time::timeout(self.connect_timeout, platform::connect(endpoint)).await;
        let mut stream = match connect {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                debug!("No instance at {}: {}", endpoint, e);
                return Ok(ProbeOutcome::NoInstance);
            }
            Err(_) => {
                debug!(
                    "No instance at {}: connect timed out after {:?}",
                    endpoint, self.connect_timeout
                );
                return Ok(ProbeOutcome::NoInstance);
            }
        };

        debug!("Found running instance at {}", endpoint);

        let payload = command.encode();
        write_frame(&mut stream, &payload)
            .await
            .map_err(|_| CloudviewError::InstanceLost {
                endpoint: endpoint.name().to_string(),
            })?;

        // Say goodbye and give the server a chance to close its side.
        let _ = stream.shutdown().await;
        let mut sink = Vec::new();
        match tokio::time::timeout(self.disconnect_timeout, stream.read_to_end(&mut sink)).await {
            Ok(_) => debug!("Instance at {} closed the connection", endpoint),
            Err(_) => warn!(
                "Instance at {} did not close within {:?}; abandoning connection",
                endpoint, self.disconnect_timeout
            ),
        }

        Ok(ProbeOutcome::Forwarded(command))
    }
}
