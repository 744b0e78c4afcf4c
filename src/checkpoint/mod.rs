/*!
 * Checkpoint module: the durable, resumable record of every segment.
 *
 * This module provides:
 * - Segment and checkpoint models
 * - A store that serializes every mutation into one persisted critical section
 */

pub mod models;
pub mod store;

// Re-export main types
pub use models::{
    Checkpoint, CheckpointMetadata, CheckpointProgress, Segment, SegmentLocation, SegmentStatus,
};
pub use store::{CheckpointStore, PendingSegment, read_checkpoint, write_checkpoint};
