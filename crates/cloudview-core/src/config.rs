//! Centralized configuration for cloudview-core.
//!
//! Timeouts, wire limits and loader defaults live here so the coordination
//! and loading code never carries magic numbers.

use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "cloudview";
    /// Prefix of every session endpoint name.
    pub const IPC_NAME_PREFIX: &'static str = "cloudview";
}

/// Configuration for the single-instance endpoint and its wire protocol.
pub struct IpcConfig;

impl IpcConfig {
    /// How long a starting process waits to reach an existing instance.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(100);
    /// How long the probe waits for the peer to close after sending.
    pub const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Upper bound on reading the single frame of an accepted connection.
    pub const FRAME_READ_TIMEOUT: Duration = Duration::from_secs(10);
    /// Largest payload accepted by `read_frame` (64 MiB).
    pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;
    /// Marker token that opens an `OpenFiles` payload.
    pub const OPEN_FILES_MARKER: &'static str = "OPEN_FILES";
    pub const SOCKET_SUFFIX: &'static str = ".sock";
    pub const LOCK_SUFFIX: &'static str = ".lock";
}

/// Configuration for background geometry loading.
pub struct LoaderConfig;

impl LoaderConfig {
    /// Default per-file point cap.
    pub const DEFAULT_MAX_POINTS: u64 = 200_000_000;
    /// Granularity of progress reports from the bundled XYZ reader.
    pub const PROGRESS_STEP_PERCENT: u8 = 1;
    /// Name given to batch worker threads.
    pub const WORKER_NAME: &'static str = "cloudview-loader";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_reasonable() {
        assert!(IpcConfig::CONNECT_TIMEOUT < IpcConfig::DISCONNECT_TIMEOUT);
        assert!(IpcConfig::FRAME_READ_TIMEOUT > Duration::ZERO);
    }

    #[test]
    fn test_frame_limit_fits_u32_length_field() {
        assert!(IpcConfig::MAX_FRAME_SIZE <= u32::MAX as usize);
        assert!(IpcConfig::MAX_FRAME_SIZE >= 65_536);
    }
}
