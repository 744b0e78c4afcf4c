/*!
 * Checkpoint and segment models.
 *
 * The checkpoint is the only persisted pipeline state: together with the
 * untouched source document it is enough to resume translation or to
 * produce the output document.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::errors::CheckpointError;

/// Current checkpoint file format version
pub const CHECKPOINT_VERSION: u32 = 1;

/// Translation state of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    /// Not yet translated
    Pending,
    /// Part of a chunk that has been dispatched
    InProgress,
    /// Translated and persisted
    Done,
    /// Its chunk exhausted all retries
    Failed,
}

impl fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SegmentStatus::Pending => "pending",
            SegmentStatus::InProgress => "in_progress",
            SegmentStatus::Done => "done",
            SegmentStatus::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// Address of a text node in the source package
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentLocation {
    /// Package part, e.g. `word/document.xml`
    pub part: String,
    /// Ordinal of the `<w:t>` element within the part
    pub node: usize,
}

impl fmt::Display for SegmentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.part, self.node)
    }
}

/// One unit of translatable text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Stable id, increasing in document order
    pub id: u64,
    /// Where the text lives in the source document
    pub location: SegmentLocation,
    /// Original text, never modified after extraction
    pub source_text: String,
    /// Translation, present once the segment is done
    #[serde(default)]
    pub translated_text: Option<String>,
    /// Translation state
    pub status: SegmentStatus,
    /// Chunk the segment was last dispatched in
    #[serde(default)]
    pub chunk_id: Option<usize>,
    /// Last error seen for a failed segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl Segment {
    /// Create a pending segment
    pub fn new(id: u64, location: SegmentLocation, source_text: impl Into<String>) -> Self {
        Self {
            id,
            location,
            source_text: source_text.into(),
            translated_text: None,
            status: SegmentStatus::Pending,
            chunk_id: None,
            last_error: None,
        }
    }

    /// Whether the engine should (re)translate this segment
    pub fn needs_translation(&self) -> bool {
        matches!(self.status, SegmentStatus::Pending | SegmentStatus::Failed)
    }

    /// Number of characters counted against the chunk budget
    pub fn char_len(&self) -> usize {
        self.source_text.chars().count()
    }

    /// Record a translation. A done segment keeps its first translation.
    ///
    /// Returns `false` when the segment was already done.
    pub fn complete(&mut self, translation: String) -> bool {
        if self.status == SegmentStatus::Done {
            return false;
        }
        self.translated_text = Some(translation);
        self.status = SegmentStatus::Done;
        self.last_error = None;
        true
    }

    /// Mark the segment as failed, unless it is already done
    pub fn fail(&mut self, error: impl Into<String>) {
        if self.status != SegmentStatus::Done {
            self.status = SegmentStatus::Failed;
            self.last_error = Some(error.into());
        }
    }

    /// Text to write into the output document, if any
    pub fn output_text(&self) -> Option<&str> {
        match self.status {
            SegmentStatus::Done => self.translated_text.as_deref(),
            _ => None,
        }
    }
}

/// Pipeline-level parameters stored with the segments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Input document as given to the extractor
    pub input_file: String,
    /// SHA-256 of the input document at extraction time
    pub source_hash: String,
    /// Source language
    pub source_language: String,
    /// Target language
    pub target_language: String,
    /// Model identifier used for the latest run
    pub model: String,
    /// Chunk character budget used for the latest run
    pub max_chunk_size: usize,
    /// Concurrency cap used for the latest run
    pub max_concurrent: usize,
    /// Extraction time
    pub created_at: DateTime<Utc>,
    /// Last persisted change
    pub updated_at: DateTime<Utc>,
}

/// Counts of segments per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckpointProgress {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub done: usize,
    pub failed: usize,
}

impl CheckpointProgress {
    /// Every segment is done
    pub fn is_complete(&self) -> bool {
        self.done == self.total
    }

    /// Completion percentage
    pub fn completion_percentage(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.done as f64 / self.total as f64) * 100.0
    }
}

impl fmt::Display for CheckpointProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} done ({:.1}%), {} pending, {} in progress, {} failed",
            self.done,
            self.total,
            self.completion_percentage(),
            self.pending,
            self.in_progress,
            self.failed
        )
    }
}

/// Persisted record of every segment of one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// File format version
    pub version: u32,
    /// Pipeline parameters
    pub metadata: CheckpointMetadata,
    /// Segments in document order
    pub segments: Vec<Segment>,
}

impl Checkpoint {
    /// Create a checkpoint from freshly extracted segments
    pub fn new(metadata: CheckpointMetadata, segments: Vec<Segment>) -> Self {
        Self {
            version: CHECKPOINT_VERSION,
            metadata,
            segments,
        }
    }

    /// Check the structural invariants
    pub fn validate(&self) -> Result<(), CheckpointError> {
        if self.version != CHECKPOINT_VERSION {
            return Err(CheckpointError::Invalid(format!(
                "unsupported version {}",
                self.version
            )));
        }

        let mut previous: Option<u64> = None;
        let mut locations = HashSet::with_capacity(self.segments.len());

        for segment in &self.segments {
            if previous.is_some_and(|prev| segment.id <= prev) {
                return Err(CheckpointError::Invalid(format!(
                    "segment ids are not strictly increasing at id {}",
                    segment.id
                )));
            }
            previous = Some(segment.id);

            if !locations.insert(&segment.location) {
                return Err(CheckpointError::Invalid(format!(
                    "location {} is used by more than one segment",
                    segment.location
                )));
            }

            if segment.status == SegmentStatus::Done && segment.translated_text.is_none() {
                return Err(CheckpointError::Invalid(format!(
                    "segment {} is done but has no translation",
                    segment.id
                )));
            }
        }

        Ok(())
    }

    /// Count segments per status
    pub fn progress(&self) -> CheckpointProgress {
        let mut progress = CheckpointProgress {
            total: self.segments.len(),
            ..Default::default()
        };
        for segment in &self.segments {
            match segment.status {
                SegmentStatus::Pending => progress.pending += 1,
                SegmentStatus::InProgress => progress.in_progress += 1,
                SegmentStatus::Done => progress.done += 1,
                SegmentStatus::Failed => progress.failed += 1,
            }
        }
        progress
    }

    /// Every segment is done
    pub fn is_complete(&self) -> bool {
        self.progress().is_complete()
    }

    /// Ids of failed segments, in document order
    pub fn failed_ids(&self) -> Vec<u64> {
        self.segments
            .iter()
            .filter(|s| s.status == SegmentStatus::Failed)
            .map(|s| s.id)
            .collect()
    }

    /// Mutable access to a segment by id
    pub fn segment_mut(&mut self, id: u64) -> Option<&mut Segment> {
        // Ids are strictly increasing, so the position can be found by search.
        self.segments
            .binary_search_by_key(&id, |s| s.id)
            .ok()
            .map(|index| &mut self.segments[index])
    }

    /// Segment by id
    pub fn segment(&self, id: u64) -> Option<&Segment> {
        self.segments
            .binary_search_by_key(&id, |s| s.id)
            .ok()
            .map(|index| &self.segments[index])
    }

    /// Refresh the modification timestamp
    pub fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
    }
}
