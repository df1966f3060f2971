//! Headless viewer host: owns loaded geometry and runs load batches.
//!
//! Every batch gets its own worker; their events are funnelled into one
//! channel tagged with a batch id so the main loop handles them in order
//! per batch.

use cloudview_core::{
    BatchLoader, BatchSummary, CommandHandler, FileLoadRequest, LoadError, LoadEvent,
    LoadObserver, PointCloud, XyzSource,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub type BatchId = u64;
pub type HostEvent = (BatchId, LoadEvent<PointCloud>);

/// Loaded datasets plus bookkeeping for in-flight batches.
pub struct Viewer {
    source: Arc<XyzSource>,
    max_points_per_file: u64,
    geometries: Vec<Arc<PointCloud>>,
    events_tx: mpsc::UnboundedSender<HostEvent>,
    next_batch: BatchId,
    active_batches: usize,
}

impl Viewer {
    pub fn new(max_points_per_file: u64, events_tx: mpsc::UnboundedSender<HostEvent>) -> Self {
        Self {
            source: Arc::new(XyzSource),
            max_points_per_file,
            geometries: Vec::new(),
            events_tx,
            next_batch: 0,
            active_batches: 0,
        }
    }

    pub fn geometries(&self) -> &[Arc<PointCloud>] {
        &self.geometries
    }

    pub fn active_batches(&self) -> usize {
        self.active_batches
    }

    /// Files requested by another launch load with this viewer's point cap
    /// and are never deleted afterwards.
    pub fn remote_request(&self, paths: Vec<PathBuf>) -> FileLoadRequest {
        FileLoadRequest::new(paths).with_max_points(self.max_points_per_file)
    }

    /// Start loading `request` in the background.
    pub fn open_files(&mut self, request: FileLoadRequest) -> cloudview_core::Result<BatchId> {
        let batch = self.next_batch;
        let mut handle = BatchLoader::new(self.source.clone(), request).spawn()?;
        self.next_batch += 1;
        self.active_batches += 1;

        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = handle.events.recv().await {
                if tx.send((batch, event)).is_err() {
                    break;
                }
            }
        });

        debug!("Started load batch {}", batch);
        Ok(batch)
    }

    pub fn handle_event(&mut self, batch: BatchId, event: LoadEvent<PointCloud>) {
        if event.is_finished() {
            debug!("Load batch {} done", batch);
        }
        event.dispatch(self);
    }
}

impl LoadObserver<PointCloud> for Viewer {
    fn on_load_step_started(&mut self, _file_index: usize, description: &str) {
        info!("{}", description);
    }

    fn on_load_progress(&mut self, file_index: usize, percent: u8) {
        debug!("File {}: {}%", file_index, percent);
    }

    fn on_geometry_loaded(&mut self, _file_index: usize, path: &Path, geometry: Arc<PointCloud>) {
        match geometry.bounds() {
            Some((lo, hi)) => info!(
                "Loaded {} points from {} (bounds {:?} - {:?})",
                geometry.len(),
                path.display(),
                lo,
                hi
            ),
            None => info!("Loaded {}", path.display()),
        }
        if geometry.was_truncated() {
            warn!(
                "{} has more than {} points; the rest were skipped",
                path.display(),
                self.max_points_per_file
            );
        }
        self.geometries.push(geometry);
    }

    fn on_load_failed(&mut self, file_index: usize, path: &Path, error: &LoadError) {
        debug!("File {} ({}) failed: {}", file_index, path.display(), error);
    }

    fn on_batch_finished(&mut self, summary: &BatchSummary) {
        self.active_batches = self.active_batches.saturating_sub(1);
        info!(
            "Loaded {} of {} file(s); {} dataset(s) open",
            summary.loaded,
            summary.requested,
            self.geometries.len()
        );
    }
}

/// Hands file lists from later launches to the main loop.
pub struct OpenFilesBridge {
    tx: mpsc::UnboundedSender<Vec<PathBuf>>,
}

impl OpenFilesBridge {
    pub fn new(tx: mpsc::UnboundedSender<Vec<PathBuf>>) -> Self {
        Self { tx }
    }
}

impl CommandHandler for OpenFilesBridge {
    fn on_files_requested(&self, paths: Vec<PathBuf>) {
        if self.tx.send(paths).is_err() {
            warn!("Viewer is shutting down; dropping file request");
        }
    }
}
