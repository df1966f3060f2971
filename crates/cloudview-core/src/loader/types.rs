//! Request, event and observer types for batch loading.

use super::source::LoadError;
use crate::config::LoaderConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An ordered list of files to load in one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLoadRequest {
    pub files: Vec<PathBuf>,
    pub max_points_per_file: u64,
    /// Delete each file after it loads successfully.
    pub remove_after_load: bool,
}

impl FileLoadRequest {
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            max_points_per_file: LoaderConfig::DEFAULT_MAX_POINTS,
            remove_after_load: false,
        }
    }

    pub fn with_max_points(mut self, max_points_per_file: u64) -> Self {
        self.max_points_per_file = max_points_per_file;
        self
    }

    pub fn with_remove_after_load(mut self, remove: bool) -> Self {
        self.remove_after_load = remove;
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Totals reported with `LoadEvent::Finished`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub requested: usize,
    pub loaded: usize,
    pub failed: usize,
}

/// Events produced by a batch, in order. Every per-file event carries the
/// index of its file in the request; all events of file `i` precede those
/// of file `i + 1`, and `Finished` is always last.
#[derive(Debug)]
pub enum LoadEvent<G> {
    StepStarted {
        file_index: usize,
        description: String,
    },
    Progress {
        file_index: usize,
        percent: u8,
    },
    GeometryLoaded {
        file_index: usize,
        path: PathBuf,
        geometry: Arc<G>,
    },
    LoadFailed {
        file_index: usize,
        path: PathBuf,
        error: LoadError,
    },
    Finished(BatchSummary),
}

impl<G> LoadEvent<G> {
    /// Index of the file this event belongs to; `None` for `Finished`.
    pub fn file_index(&self) -> Option<usize> {
        match self {
            LoadEvent::StepStarted { file_index, .. }
            | LoadEvent::Progress { file_index, .. }
            | LoadEvent::GeometryLoaded { file_index, .. }
            | LoadEvent::LoadFailed { file_index, .. } => Some(*file_index),
            LoadEvent::Finished(_) => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, LoadEvent::Finished(_))
    }

    /// Route this event to the matching observer callback.
    pub fn dispatch<O>(self, observer: &mut O)
    where
        O: LoadObserver<G> + ?Sized,
    {
        match self {
            LoadEvent::StepStarted {
                file_index,
                description,
            } => observer.on_load_step_started(file_index, &description),
            LoadEvent::Progress {
                file_index,
                percent,
            } => observer.on_load_progress(file_index, percent),
            LoadEvent::GeometryLoaded {
                file_index,
                path,
                geometry,
            } => observer.on_geometry_loaded(file_index, &path, geometry),
            LoadEvent::LoadFailed {
                file_index,
                path,
                error,
            } => observer.on_load_failed(file_index, &path, &error),
            LoadEvent::Finished(summary) => observer.on_batch_finished(&summary),
        }
    }
}

/// Host application's view of a batch.
pub trait LoadObserver<G> {
    fn on_load_step_started(&mut self, _file_index: usize, _description: &str) {}

    fn on_load_progress(&mut self, _file_index: usize, _percent: u8) {}

    /// Takes shared ownership of a fully loaded geometry.
    fn on_geometry_loaded(&mut self, file_index: usize, path: &Path, geometry: Arc<G>);

    fn on_load_failed(&mut self, _file_index: usize, _path: &Path, _error: &LoadError) {}

    fn on_batch_finished(&mut self, _summary: &BatchSummary) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Tally {
        steps: Vec<String>,
        loaded: Vec<usize>,
        finished: Option<BatchSummary>,
    }

    impl LoadObserver<u32> for Tally {
        fn on_load_step_started(&mut self, _file_index: usize, description: &str) {
            self.steps.push(description.to_string());
        }

        fn on_geometry_loaded(&mut self, file_index: usize, _path: &Path, _geometry: Arc<u32>) {
            self.loaded.push(file_index);
        }

        fn on_batch_finished(&mut self, summary: &BatchSummary) {
            self.finished = Some(*summary);
        }
    }

    #[test]
    fn test_request_defaults() {
        let request = FileLoadRequest::new(vec![PathBuf::from("a.xyz")]);
        assert_eq!(request.max_points_per_file, LoaderConfig::DEFAULT_MAX_POINTS);
        assert!(!request.remove_after_load);
        assert_eq!(request.len(), 1);
    }

    #[test]
    fn test_dispatch_routes_events() {
        let mut tally = Tally::default();
        let summary = BatchSummary {
            requested: 1,
            loaded: 1,
            failed: 0,
        };

        LoadEvent::StepStarted {
            file_index: 0,
            description: "Reading".into(),
        }
        .dispatch(&mut tally);
        LoadEvent::Progress {
            file_index: 0,
            percent: 50,
        }
        .dispatch(&mut tally);
        LoadEvent::GeometryLoaded {
            file_index: 0,
            path: PathBuf::from("a.xyz"),
            geometry: Arc::new(7u32),
        }
        .dispatch(&mut tally);
        LoadEvent::<u32>::Finished(summary).dispatch(&mut tally);

        assert_eq!(tally.steps, vec!["Reading".to_string()]);
        assert_eq!(tally.loaded, vec![0]);
        assert_eq!(tally.finished, Some(summary));
    }

    #[test]
    fn test_finished_has_no_file_index() {
        let event = LoadEvent::<u32>::Finished(BatchSummary::default());
        assert!(event.is_finished());
        assert_eq!(event.file_index(), None);
    }
}
