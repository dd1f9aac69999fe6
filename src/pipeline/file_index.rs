//! Resumable file-index resolution for batch outputs.
//!
//! Every processing stage writes a dense, zero-based sequence of files:
//! ```text
//! {data_dir}/New_data - 0.full.csv
//! {data_dir}/New_data - 1.full.csv
//! {data_dir}/New_data - 0.filtered.csv
//! ```
//! The first missing index ends a stage's sequence. Resolution only checks
//! existence and keeps no state between calls, so an interrupted run resumes
//! from whatever is on disk.

use std::path::{Path, PathBuf};

/// Upper bound on indices scanned per stage.
pub const MAX_SCAN_INDEX: usize = 1000;

/// File stem shared by every batch output.
const FILE_STEM: &str = "New_data";

/// A named pipeline phase owning one family of numbered files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stage<'a>(&'a str);

impl Stage<'static> {
    /// Raw, unfiltered batches.
    pub const FULL: Stage<'static> = Stage("full");
    /// Batches after classifier filtering.
    pub const FILTERED: Stage<'static> = Stage("filtered");
}

impl<'a> Stage<'a> {
    pub const fn new(name: &'a str) -> Self {
        Self(name)
    }

    pub fn as_str(&self) -> &'a str {
        self.0
    }
}

impl std::fmt::Display for Stage<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Locates batch output slots inside one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIndexResolver {
    data_dir: PathBuf,
    ext: String,
    max_index: usize,
}

impl FileIndexResolver {
    pub fn new(data_dir: impl Into<PathBuf>, ext: &str) -> Self {
        Self {
            data_dir: data_dir.into(),
            ext: ext.trim_start_matches('.').to_string(),
            max_index: MAX_SCAN_INDEX,
        }
    }

    /// Override the scan ceiling (mainly for tests).
    pub fn with_max_index(mut self, max_index: usize) -> Self {
        self.max_index = max_index;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the slot `(stage, index)`. An empty stage omits the stage segment.
    pub fn filename(&self, index: usize, stage: Stage<'_>) -> PathBuf {
        let name = if stage.as_str().is_empty() {
            format!("{FILE_STEM} - {index}.{}", self.ext)
        } else {
            format!("{FILE_STEM} - {index}.{stage}.{}", self.ext)
        };
        self.data_dir.join(name)
    }

    /// Last existing index of a stage.
    ///
    /// Returns `None` when the stage has no files, or `Some(0)` in that case if
    /// `allow_empty` is set (the first slot to create). When every index up to
    /// the ceiling exists, the last checked index is returned.
    pub fn latest_index(&self, stage: Stage<'_>, allow_empty: bool) -> Option<usize> {
        let mut last = None;
        for index in 0..self.max_index {
            if !self.filename(index, stage).exists() {
                break;
            }
            last = Some(index);
        }

        if last.is_some_and(|i| i + 1 == self.max_index) {
            tracing::warn!(
                stage = stage.as_str(),
                ceiling = self.max_index,
                "Scan ceiling reached without a gap, using last checked index"
            );
        }

        match last {
            None if allow_empty => Some(0),
            other => other,
        }
    }

    /// Path of the last existing slot, see [`latest_index`](Self::latest_index).
    pub fn latest_filename(&self, stage: Stage<'_>, allow_empty: bool) -> Option<PathBuf> {
        self.latest_index(stage, allow_empty)
            .map(|index| self.filename(index, stage))
    }

    /// First free index of a stage (0 for an empty stage).
    ///
    /// `None` once the stage fills every slot below the ceiling: the scan
    /// cannot see past it, so handing out a slot there would overwrite.
    pub fn next_index(&self, stage: Stage<'_>) -> Option<usize> {
        match self.latest_index(stage, false) {
            None => Some(0),
            Some(i) if i + 1 < self.max_index => Some(i + 1),
            Some(_) => None,
        }
    }

    /// Path a writer should create for the next batch of a stage.
    pub fn next_filename(&self, stage: Stage<'_>) -> Option<PathBuf> {
        self.next_index(stage).map(|index| self.filename(index, stage))
    }
}
