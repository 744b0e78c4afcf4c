/*!
 * Translation of checkpoint segments using a remote language model.
 *
 * It is split into several submodules:
 *
 * - `chunker`: packing pending segments into character-bounded chunks
 * - `batch`: the marker format a chunk travels in
 * - `core`: the `ChunkTranslator` seam and the provider-backed service
 * - `engine`: bounded concurrent dispatch, retries and checkpoint updates
 */

// Re-export main types for easier usage
pub use self::chunker::{Chunk, plan_chunks};
pub use self::core::{ChunkRequest, ChunkTranslator, TokenUsageStats, TranslationService};
pub use self::engine::{
    EngineOptions, FailedChunk, ProgressCallback, TranslationEngine, TranslationProgress,
    TranslationReport,
};

// Submodules
pub mod batch;
pub mod chunker;
pub mod core;
pub mod engine;
