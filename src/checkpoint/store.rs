/*!
 * Durable checkpoint store.
 *
 * All mutations go through [`CheckpointStore::update`], which is the single
 * critical section of the pipeline: the change is applied to a copy, the copy
 * is written to a temp file and renamed over the checkpoint, and only then
 * does it become the in-memory state. Two concurrent chunk completions can
 * therefore never interleave into a torn file, and memory never runs ahead
 * of disk.
 *
 * Async callers go through [`CheckpointStore::run_blocking`] so the write
 * and `fsync` happen on tokio's blocking pool.
 */

use log::{debug, warn};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::CheckpointError;
use crate::file_utils::FileManager;

use super::models::{Checkpoint, CheckpointProgress, SegmentStatus};

/// A segment that still needs translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSegment {
    /// Segment id
    pub id: u64,
    /// Text to translate
    pub source_text: String,
}

/// Checkpoint file plus its in-memory image.
///
/// Clones share the same state and file.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
    state: Arc<Mutex<Checkpoint>>,
}

impl CheckpointStore {
    /// Persist a new checkpoint, replacing any previous file at `path`
    pub fn create<P: AsRef<Path>>(path: P, checkpoint: Checkpoint) -> Result<Self, CheckpointError> {
        let path = path.as_ref().to_path_buf();
        checkpoint.validate()?;
        write_checkpoint(&path, &checkpoint)?;
        Ok(Self {
            path,
            state: Arc::new(Mutex::new(checkpoint)),
        })
    }

    /// Load an existing checkpoint
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        let path = path.as_ref().to_path_buf();
        let checkpoint = read_checkpoint(&path)?;
        Ok(Self {
            path,
            state: Arc::new(Mutex::new(checkpoint)),
        })
    }

    /// Location of the checkpoint file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> Checkpoint {
        self.state.lock().clone()
    }

    /// Segment counts per status
    pub fn progress(&self) -> CheckpointProgress {
        self.state.lock().progress()
    }

    /// Apply `change` and persist the result as one critical section.
    ///
    /// On a write failure the in-memory state is left untouched.
    pub fn update<R>(&self, change: impl FnOnce(&mut Checkpoint) -> R) -> Result<R, CheckpointError> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        let result = change(&mut next);
        next.touch();
        write_checkpoint(&self.path, &next)?;
        *state = next;
        Ok(result)
    }

    /// Run a store operation on the blocking pool
    pub async fn run_blocking<R, F>(&self, operation: F) -> Result<R, CheckpointError>
    where
        F: FnOnce(&CheckpointStore) -> Result<R, CheckpointError> + Send + 'static,
        R: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || operation(&store))
            .await
            .map_err(|e| CheckpointError::Task(e.to_string()))?
    }

    /// Return segments interrupted mid-chunk to `pending`
    pub fn reset_interrupted(&self) -> Result<usize, CheckpointError> {
        let interrupted = self
            .state
            .lock()
            .segments
            .iter()
            .filter(|s| s.status == SegmentStatus::InProgress)
            .count();
        if interrupted == 0 {
            return Ok(0);
        }

        warn!("Resetting {} interrupted segment(s) to pending", interrupted);
        self.update(|checkpoint| {
            for segment in &mut checkpoint.segments {
                if segment.status == SegmentStatus::InProgress {
                    segment.status = SegmentStatus::Pending;
                }
            }
        })?;
        Ok(interrupted)
    }

    /// Segments the engine still has to translate, in document order
    pub fn pending_segments(&self) -> Vec<PendingSegment> {
        self.state
            .lock()
            .segments
            .iter()
            .filter(|s| s.needs_translation())
            .map(|s| PendingSegment {
                id: s.id,
                source_text: s.source_text.clone(),
            })
            .collect()
    }

    /// Record chunk membership and mark the segments as dispatched
    pub fn mark_in_progress(&self, chunk_id: usize, ids: &[u64]) -> Result<(), CheckpointError> {
        self.update(|checkpoint| {
            for id in ids {
                if let Some(segment) = checkpoint.segment_mut(*id) {
                    if segment.needs_translation() {
                        segment.status = SegmentStatus::InProgress;
                        segment.chunk_id = Some(chunk_id);
                    }
                }
            }
        })
    }

    /// Store the translations of one chunk, pairing them with ids by position.
    ///
    /// Returns the number of segments that changed to `done`.
    pub fn complete_chunk(&self, ids: &[u64], translations: Vec<String>) -> Result<usize, CheckpointError> {
        if ids.len() != translations.len() {
            return Err(CheckpointError::Invalid(format!(
                "{} translations for {} segments",
                translations.len(),
                ids.len()
            )));
        }

        self.update(|checkpoint| {
            let mut completed = 0;
            for (id, translation) in ids.iter().zip(translations) {
                let Some(segment) = checkpoint.segment_mut(*id) else {
                    warn!("Segment {} not found in checkpoint", id);
                    continue;
                };
                if segment.complete(translation) {
                    completed += 1;
                } else {
                    debug!("Segment {} already done, keeping its translation", id);
                }
            }
            completed
        })
    }

    /// Mark the segments of an exhausted chunk as failed
    pub fn fail_chunk(&self, ids: &[u64], error: &str) -> Result<(), CheckpointError> {
        self.update(|checkpoint| {
            for id in ids {
                if let Some(segment) = checkpoint.segment_mut(*id) {
                    segment.fail(error);
                }
            }
        })
    }

    /// Return the segments of an abandoned chunk to `pending`
    pub fn release_chunk(&self, ids: &[u64]) -> Result<(), CheckpointError> {
        self.update(|checkpoint| {
            for id in ids {
                if let Some(segment) = checkpoint.segment_mut(*id) {
                    if segment.status == SegmentStatus::InProgress {
                        segment.status = SegmentStatus::Pending;
                    }
                }
            }
        })
    }

    /// Record the parameters of the current run
    pub fn record_run_parameters(
        &self,
        model: &str,
        max_chunk_size: usize,
        max_concurrent: usize,
    ) -> Result<(), CheckpointError> {
        self.update(|checkpoint| {
            checkpoint.metadata.model = model.to_string();
            checkpoint.metadata.max_chunk_size = max_chunk_size;
            checkpoint.metadata.max_concurrent = max_concurrent;
        })
    }
}

/// Read and validate a checkpoint file
pub fn read_checkpoint(path: &Path) -> Result<Checkpoint, CheckpointError> {
    let content = fs::read(path).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let checkpoint: Checkpoint = serde_json::from_slice(&content)?;
    checkpoint.validate()?;
    Ok(checkpoint)
}

/// Serialize and atomically replace a checkpoint file
pub fn write_checkpoint(path: &Path, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
    let json = serde_json::to_vec_pretty(checkpoint)?;
    FileManager::write_atomic(path, &json).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })
}
