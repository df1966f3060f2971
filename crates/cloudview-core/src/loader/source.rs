//! Collaborator interface for per-format geometry decoding.

use std::collections::TryReserveError;
use std::path::Path;
use thiserror::Error;

/// Why a single file could not be loaded. Never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// The source reported an explicit failure.
    #[error("{0}")]
    Failed(String),

    #[error("ran out of memory")]
    OutOfMemory,

    /// Malformed input, I/O trouble mid-decode, or a decoder panic.
    #[error("{0}")]
    Decode(String),
}

impl From<TryReserveError> for LoadError {
    fn from(_: TryReserveError) -> Self {
        LoadError::OutOfMemory
    }
}

impl From<std::io::Error> for LoadError {
    fn from(err: std::io::Error) -> Self {
        LoadError::Decode(err.to_string())
    }
}

/// Progress notifications a source emits while decoding one file.
pub trait LoadProgress {
    /// A new named step of the current load has begun.
    fn step_started(&self, description: &str);

    /// Percent complete (0-100) of the current step.
    fn progress(&self, percent: u8);
}

/// Decodes geometry files. Called from the batch worker thread.
pub trait GeometrySource: Send + Sync + 'static {
    /// Decoded dataset. Published to the host behind an `Arc` and treated
    /// as read-only from then on.
    type Geometry: Send + Sync + 'static;

    /// Make an empty geometry for `path`.
    fn create(&self, path: &Path) -> Self::Geometry;

    /// Populate `geometry` from `path`, keeping at most `max_points` points.
    fn load_file(
        &self,
        geometry: &mut Self::Geometry,
        path: &Path,
        max_points: u64,
        progress: &dyn LoadProgress,
    ) -> Result<(), LoadError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_reserve_failure_maps_to_out_of_memory() {
        let mut v: Vec<u64> = Vec::new();
        let err = v.try_reserve(usize::MAX).unwrap_err();
        assert_eq!(LoadError::from(err), LoadError::OutOfMemory);
    }
}
