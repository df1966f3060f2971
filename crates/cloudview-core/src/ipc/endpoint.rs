//! Session endpoint naming and ownership.
//!
//! A session endpoint is the OS-level name one running viewer listens on.
//! The default name is scoped to the application and the current user; a
//! caller-supplied instance name lets independent sessions coexist.
//!
//! Ownership of an endpoint is claimed with an exclusive advisory lock on a
//! sibling `.lock` file before the listener binds, so two processes that both
//! miss their probe cannot both become the server.

use crate::config::{AppConfig, IpcConfig};
use crate::error::{CloudviewError, Result};
use crate::platform;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name and location of a session's local endpoint. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEndpoint {
    name: String,
    dir: PathBuf,
}

impl SessionEndpoint {
    /// Endpoint for this user's session, optionally narrowed to a named
    /// instance (`--server NAME`).
    pub fn for_session(instance_name: Option<&str>) -> Self {
        Self {
            name: Self::session_name(&platform::current_user(), instance_name),
            dir: platform::runtime_dir(),
        }
    }

    /// Endpoint with an explicit name rooted in `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>, name: &str) -> Self {
        Self {
            name: sanitize(name),
            dir: dir.into(),
        }
    }

    /// Build the endpoint name for `user` and an optional instance override.
    pub fn session_name(user: &str, instance_name: Option<&str>) -> String {
        let mut name = format!("{}-ipc-{}", AppConfig::IPC_NAME_PREFIX, sanitize(user));
        if let Some(instance) = instance_name.filter(|s| !s.is_empty()) {
            name.push('-');
            name.push_str(&sanitize(instance));
        }
        name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Unix domain socket path.
    pub fn socket_path(&self) -> PathBuf {
        self.dir
            .join(format!("{}{}", self.name, IpcConfig::SOCKET_SUFFIX))
    }

    /// Windows named pipe name.
    pub fn pipe_name(&self) -> String {
        format!(r"\\.\pipe\{}", self.name)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(format!("{}{}", self.name, IpcConfig::LOCK_SUFFIX))
    }

    /// Claim exclusive ownership of this endpoint without blocking.
    ///
    /// Returns `EndpointInUse` if another process (or another lock in this
    /// process) already owns it.
    pub fn acquire_lock(&self) -> Result<SessionLock> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| CloudviewError::io_with_path(e, &self.dir))?;

        let path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|e| CloudviewError::io_with_path(e, &path))?;

        file.try_lock_exclusive()
            .map_err(|_| CloudviewError::EndpointInUse {
                name: self.name.clone(),
            })?;

        debug!("Acquired session lock {}", path.display());
        Ok(SessionLock { file, path })
    }
}

impl std::fmt::Display for SessionEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Held for as long as this process owns the endpoint. Released on drop.
#[derive(Debug)]
pub struct SessionLock {
    file: File,
    path: PathBuf,
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        match FileExt::unlock(&self.file) {
            Ok(()) => debug!("Released session lock {}", self.path.display()),
            Err(e) => debug!("Could not unlock {}: {}", self.path.display(), e),
        }
    }
}

/// Keep endpoint names portable: anything outside `[A-Za-z0-9_-]` becomes `_`.
fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
