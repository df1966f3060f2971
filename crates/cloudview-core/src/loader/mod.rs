//! Background batch loading of geometry files.
//!
//! A [`BatchLoader`] walks its request's files strictly in order on a
//! dedicated worker thread and reports back through an ordered event
//! channel. The receiving end is created before the worker starts, so no
//! event can be lost to a late subscriber.
//!
//! A file that fails to load (explicit failure, out of memory, decode error
//! or decoder panic) is reported and skipped; the batch always runs to the
//! end and always finishes with exactly one `LoadEvent::Finished`.

pub mod source;
pub mod types;
pub mod xyz;

pub use source::{GeometrySource, LoadError, LoadProgress};
pub use types::{BatchSummary, FileLoadRequest, LoadEvent, LoadObserver};
pub use xyz::{PointCloud, XyzSource};

use crate::config::LoaderConfig;
use crate::error::{CloudviewError, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Sender half of a batch's event stream.
pub type EventSender<G> = mpsc::UnboundedSender<LoadEvent<G>>;

/// Loads one request. Consumed by [`BatchLoader::spawn`] or
/// [`BatchLoader::run`], so it runs at most once.
pub struct BatchLoader<S: GeometrySource> {
    source: Arc<S>,
    request: FileLoadRequest,
}

/// Handle to a running batch.
pub struct BatchHandle<G> {
    /// Ordered events from the worker; ends after `Finished`.
    pub events: mpsc::UnboundedReceiver<LoadEvent<G>>,
    _thread: Option<thread::JoinHandle<BatchSummary>>,
}

impl<G> BatchHandle<G> {
    /// Feed every event of the batch to `observer` and return the summary.
    pub async fn drain<O>(mut self, observer: &mut O) -> BatchSummary
    where
        O: LoadObserver<G> + ?Sized,
    {
        while let Some(event) = self.events.recv().await {
            let finished = match &event {
                LoadEvent::Finished(summary) => Some(*summary),
                _ => None,
            };
            event.dispatch(observer);
            if let Some(summary) = finished {
                return summary;
            }
        }
        warn!("Load worker exited without finishing its batch");
        BatchSummary::default()
    }
}

impl<S: GeometrySource> BatchLoader<S> {
    pub fn new(source: Arc<S>, request: FileLoadRequest) -> Self {
        Self { source, request }
    }

    /// Start the batch on its own worker thread.
    pub fn spawn(self) -> Result<BatchHandle<S::Geometry>> {
        let (tx, rx) = mpsc::unbounded_channel();

        let thread = thread::Builder::new()
            .name(LoaderConfig::WORKER_NAME.into())
            .spawn(move || self.run(&tx))
            .map_err(|e| CloudviewError::Io {
                message: format!("Failed to spawn load worker: {}", e),
                path: None,
                source: Some(e),
            })?;

        Ok(BatchHandle {
            events: rx,
            _thread: Some(thread),
        })
    }

    /// Load every file in order on the calling thread, emitting events to
    /// `events`. A dropped receiver does not stop the batch.
    pub fn run(self, events: &EventSender<S::Geometry>) -> BatchSummary {
        let FileLoadRequest {
            files,
            max_points_per_file,
            remove_after_load,
        } = self.request;

        let mut summary = BatchSummary {
            requested: files.len(),
            ..BatchSummary::default()
        };
        info!("Loading {} file(s)", files.len());

        for (file_index, path) in files.into_iter().enumerate() {
            match Self::load_one(&self.source, file_index, &path, max_points_per_file, events) {
                Ok(geometry) => {
                    summary.loaded += 1;
                    debug!("Loaded {}", path.display());
                    let _ = events.send(LoadEvent::GeometryLoaded {
                        file_index,
                        path: path.clone(),
                        geometry,
                    });
                    if remove_after_load {
                        remove_loaded_file(&path);
                    }
                }
                Err(err) => {
                    summary.failed += 1;
                    match &err {
                        LoadError::Failed(reason) => {
                            error!("Could not load {}: {}", path.display(), reason)
                        }
                        LoadError::OutOfMemory => {
                            error!("Ran out of memory trying to load {}", path.display())
                        }
                        LoadError::Decode(message) => {
                            error!("Error loading {}: {}", path.display(), message)
                        }
                    }
                    let _ = events.send(LoadEvent::LoadFailed {
                        file_index,
                        path,
                        error: err,
                    });
                }
            }
        }

        info!(
            "Batch finished: {} loaded, {} failed",
            summary.loaded, summary.failed
        );
        let _ = events.send(LoadEvent::Finished(summary));
        summary
    }

    fn load_one(
        source: &S,
        file_index: usize,
        path: &Path,
        max_points: u64,
        events: &EventSender<S::Geometry>,
    ) -> std::result::Result<Arc<S::Geometry>, LoadError> {
        let relay = FileProgressRelay { events, file_index };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut geometry = source.create(path);
            source
                .load_file(&mut geometry, path, max_points, &relay)
                .map(|()| geometry)
        }));

        match outcome {
            Ok(result) => result.map(Arc::new),
            Err(payload) => Err(LoadError::Decode(panic_message(payload.as_ref()))),
        }
    }
}

/// Forwards a source's progress notifications, tagged with the current file.
struct FileProgressRelay<'a, G> {
    events: &'a EventSender<G>,
    file_index: usize,
}

impl<G> LoadProgress for FileProgressRelay<'_, G> {
    fn step_started(&self, description: &str) {
        let _ = self.events.send(LoadEvent::StepStarted {
            file_index: self.file_index,
            description: description.to_string(),
        });
    }

    fn progress(&self, percent: u8) {
        let _ = self.events.send(LoadEvent::Progress {
            file_index: self.file_index,
            percent,
        });
    }
}

/// Cleanup after a successful load is advisory: failure is logged, never
/// reported as a load error.
fn remove_loaded_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed {} after load", path.display()),
        Err(e) => warn!("Could not remove {} after load: {}", path.display(), e),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("decoder panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("decoder panicked: {}", s)
    } else {
        "decoder panicked".to_string()
    }
}
