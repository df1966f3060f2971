//! Plain-text XYZ point files.
//!
//! One point per line as whitespace-separated `x y z`; further columns
//! (intensity, colour, ...) are ignored. Blank lines and `#` comments are
//! skipped.

use super::source::{GeometrySource, LoadError, LoadProgress};
use crate::config::LoaderConfig;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Rough size of one text point line, used to pre-size the point buffer.
const BYTES_PER_LINE_ESTIMATE: u64 = 24;

/// A decoded point cloud.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    label: String,
    points: Vec<[f64; 3]>,
    truncated: bool,
}

impl PointCloud {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True if the file held more points than the load was allowed to keep.
    pub fn was_truncated(&self) -> bool {
        self.truncated
    }

    /// Axis-aligned bounding box as `(min, max)`.
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        let first = *self.points.first()?;
        Some(self.points.iter().fold((first, first), |(mut lo, mut hi), p| {
            for axis in 0..3 {
                lo[axis] = lo[axis].min(p[axis]);
                hi[axis] = hi[axis].max(p[axis]);
            }
            (lo, hi)
        }))
    }
}

/// [`GeometrySource`] for XYZ text files.
#[derive(Debug, Clone, Copy, Default)]
pub struct XyzSource;

impl GeometrySource for XyzSource {
    type Geometry = PointCloud;

    fn create(&self, path: &Path) -> PointCloud {
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        PointCloud::new(label)
    }

    fn load_file(
        &self,
        geometry: &mut PointCloud,
        path: &Path,
        max_points: u64,
        progress: &dyn LoadProgress,
    ) -> Result<(), LoadError> {
        let file = File::open(path)
            .map_err(|e| LoadError::Failed(format!("cannot open file: {}", e)))?;
        let total_bytes = file.metadata().map(|m| m.len()).unwrap_or(0);

        progress.step_started(&format!("Reading {}", path.display()));
        progress.progress(0);

        let estimate = (total_bytes / BYTES_PER_LINE_ESTIMATE).min(max_points);
        geometry
            .points
            .try_reserve(usize::try_from(estimate).unwrap_or(usize::MAX))?;

        let mut reader = BufReader::new(file);
        let mut line = String::new();
        let mut bytes_read = 0u64;
        let mut line_no = 0usize;
        let mut reported = 0u8;

        loop {
            line.clear();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                break;
            }
            bytes_read += n as u64;
            line_no += 1;

            let point = parse_point(&line)
                .map_err(|msg| LoadError::Decode(format!("line {}: {}", line_no, msg)))?;
            if let Some(point) = point {
                if geometry.points.len() as u64 >= max_points {
                    geometry.truncated = true;
                    break;
                }
                geometry.points.try_reserve(1)?;
                geometry.points.push(point);
            }

            let percent = percent_of(bytes_read, total_bytes);
            if percent >= reported.saturating_add(LoaderConfig::PROGRESS_STEP_PERCENT) {
                progress.progress(percent);
                reported = percent;
            }
        }

        if geometry.points.is_empty() {
            return Err(LoadError::Failed("no points found".to_string()));
        }
        if reported < 100 {
            progress.progress(100);
        }
        Ok(())
    }
}

fn parse_point(line: &str) -> Result<Option<[f64; 3]>, String> {
    let content = line.split('#').next().unwrap_or("").trim();
    if content.is_empty() {
        return Ok(None);
    }

    let mut fields = content.split_whitespace();
    let mut point = [0.0f64; 3];
    for (axis, value) in point.iter_mut().enumerate() {
        let field = fields
            .next()
            .ok_or_else(|| format!("expected 3 coordinates, found {}", axis))?;
        *value = field
            .parse()
            .map_err(|_| format!("invalid coordinate {:?}", field))?;
    }
    Ok(Some(point))
}

fn percent_of(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.saturating_mul(100) / total).min(100) as u8
}
