/*!
 * Extraction stage.
 *
 * Walks the translatable parts of the source document and records one
 * pending segment per text node that has at least one non-whitespace
 * character. Whitespace-only nodes are never segments, so the injector
 * leaves them untouched. Extraction always starts from scratch and
 * replaces any previous checkpoint atomically.
 */

use chrono::Utc;
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::checkpoint::{Checkpoint, CheckpointMetadata, CheckpointStore, Segment, SegmentLocation};
use crate::document::{DocxPackage, scan_text_nodes};
use crate::errors::{DocumentError, ExtractionError};
use crate::file_utils::FileManager;

/// Parameters recorded in the checkpoint metadata
#[derive(Debug, Clone)]
pub struct ExtractionParams {
    pub source_language: String,
    pub target_language: String,
    pub model: String,
    pub max_chunk_size: usize,
    pub max_concurrent: usize,
}

/// What an extraction produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Segments written to the checkpoint
    pub segments: usize,
    /// Parts that contained at least one segment
    pub parts: usize,
    /// Whitespace-only nodes passed over
    pub skipped_nodes: usize,
}

/// Builds a checkpoint from a source document
pub struct Extractor {
    input_file: PathBuf,
    checkpoint_path: PathBuf,
}

impl Extractor {
    /// Create an extractor for one input document
    pub fn new<P1: AsRef<Path>, P2: AsRef<Path>>(input_file: P1, checkpoint_path: P2) -> Self {
        Self {
            input_file: input_file.as_ref().to_path_buf(),
            checkpoint_path: checkpoint_path.as_ref().to_path_buf(),
        }
    }

    /// Collect segments in traversal order without touching the checkpoint file
    pub fn collect_segments(package: &DocxPackage) -> Result<(Vec<Segment>, ExtractionSummary), DocumentError> {
        let mut segments = Vec::new();
        let mut summary = ExtractionSummary {
            segments: 0,
            parts: 0,
            skipped_nodes: 0,
        };
        let mut next_id: u64 = 1;

        for part in package.text_parts() {
            let xml = package.part_xml(&part)?;
            let before = segments.len();

            for node in scan_text_nodes(xml) {
                if !node.is_translatable() {
                    summary.skipped_nodes += 1;
                    continue;
                }
                let location = SegmentLocation {
                    part: part.clone(),
                    node: node.index,
                };
                segments.push(Segment::new(next_id, location, node.text));
                next_id += 1;
            }

            let found = segments.len() - before;
            if found > 0 {
                summary.parts += 1;
                debug!("Part {} contributed {} segment(s)", part, found);
            }
        }

        summary.segments = segments.len();
        Ok((segments, summary))
    }

    /// Extract every segment and persist a fresh checkpoint.
    ///
    /// Either a complete, valid checkpoint is written or the previous file
    /// (if any) is left as it was.
    pub fn extract(&self, params: &ExtractionParams) -> Result<(CheckpointStore, ExtractionSummary), ExtractionError> {
        info!("Extracting segments from {:?}", self.input_file);

        let package = DocxPackage::open(&self.input_file)?;
        let source_hash = FileManager::hash_file(&self.input_file).map_err(|source| DocumentError::Io {
            path: self.input_file.clone(),
            source,
        })?;
        let (segments, summary) = Self::collect_segments(&package)?;

        let now = Utc::now();
        let metadata = CheckpointMetadata {
            input_file: self.input_file.to_string_lossy().to_string(),
            source_hash,
            source_language: params.source_language.clone(),
            target_language: params.target_language.clone(),
            model: params.model.clone(),
            max_chunk_size: params.max_chunk_size,
            max_concurrent: params.max_concurrent,
            created_at: now,
            updated_at: now,
        };

        let store = CheckpointStore::create(&self.checkpoint_path, Checkpoint::new(metadata, segments))?;

        info!(
            "Extracted {} segment(s) from {} part(s) into {:?}",
            summary.segments, summary.parts, self.checkpoint_path
        );
        Ok((store, summary))
    }
}
