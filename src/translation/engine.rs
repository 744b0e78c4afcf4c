/*!
 * Translation engine.
 *
 * Drives every pending segment of a checkpoint through a `ChunkTranslator`:
 *
 * 1. segments left `in_progress` by an interrupted run go back to `pending`
 * 2. pending segments are packed into chunks
 * 3. chunks are dispatched through a bounded `buffer_unordered` stream
 * 4. each chunk is retried with exponential backoff; its result is persisted
 *    before the chunk counts as settled
 *
 * Chunks that exhaust their retries are marked `failed` and reported; the
 * remaining chunks keep going. Only a checkpoint write failure aborts a run.
 */

use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::TranslationConfig;
use crate::cancellation::CancellationSignal;
use crate::checkpoint::CheckpointStore;
use crate::errors::{ChunkError, TranslationError};

use super::chunker::{Chunk, plan_chunks};
use super::core::{ChunkRequest, ChunkTranslator};

/// Tunables of one engine run
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Character budget per chunk
    pub max_chunk_size: usize,
    /// Chunks in flight at once
    pub max_concurrent: usize,
    /// Attempts after the first one
    pub retry_count: u32,
    /// Delay before the first retry, doubled on each further retry
    pub retry_backoff: Duration,
    /// Limit for a single remote call
    pub timeout: Duration,
}

impl EngineOptions {
    /// Take the engine tunables from the translation config
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            max_chunk_size: config.max_chunk_size,
            max_concurrent: config.max_concurrent,
            retry_count: config.retry_count,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            timeout: config.timeout(),
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from_config(&TranslationConfig::default())
    }
}

/// Progress snapshot passed to the progress callback after each chunk settles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationProgress {
    pub completed_segments: usize,
    pub total_segments: usize,
    pub completed_chunks: usize,
    pub total_chunks: usize,
}

/// Progress callback shared with the UI layer
pub type ProgressCallback = Arc<dyn Fn(TranslationProgress) + Send + Sync>;

/// A chunk that exhausted its retries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedChunk {
    pub chunk_id: usize,
    pub segment_ids: Vec<u64>,
    /// Last error seen
    pub error: String,
}

/// Outcome of one engine run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationReport {
    /// Segments in the checkpoint
    pub total_segments: usize,
    /// Segments already done when the run started
    pub previously_done: usize,
    /// Segments translated by this run
    pub translated: usize,
    /// Chunks planned by this run
    pub chunks: usize,
    /// Chunks that exhausted their retries
    pub failed_chunks: Vec<FailedChunk>,
    /// Whether chunks were left undone because the run was cancelled
    pub cancelled: bool,
}

impl TranslationReport {
    /// Whether every segment of the checkpoint is now done
    pub fn is_complete(&self) -> bool {
        !self.cancelled
            && self.failed_chunks.is_empty()
            && self.previously_done + self.translated >= self.total_segments
    }

    /// Ids of every segment in a failed chunk
    pub fn failed_segment_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .failed_chunks
            .iter()
            .flat_map(|chunk| chunk.segment_ids.iter().copied())
            .collect();
        ids.sort_unstable();
        ids
    }
}

enum ChunkOutcome {
    /// Translations stored; number of segments newly done
    Done(usize),
    /// Retries exhausted, segments marked failed
    Failed(FailedChunk),
    /// Never dispatched, or released back to pending after cancellation
    Skipped,
}

/// Translation engine
pub struct TranslationEngine<T: ChunkTranslator> {
    translator: Arc<T>,
    options: EngineOptions,
    cancel: CancellationSignal,
    progress: Option<ProgressCallback>,
}

impl<T: ChunkTranslator> TranslationEngine<T> {
    /// Create an engine around a translator
    pub fn new(translator: Arc<T>, options: EngineOptions) -> Self {
        Self {
            translator,
            options,
            cancel: CancellationSignal::new(),
            progress: None,
        }
    }

    /// Stop dispatching when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Report progress after every settled chunk
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Translate every segment of `store` that is not yet done
    pub async fn run(
        &self,
        store: &CheckpointStore,
        source_language: &str,
        target_language: &str,
    ) -> Result<TranslationReport, TranslationError> {
        store.reset_interrupted()?;

        let progress = store.progress();
        let pending = store.pending_segments();
        let chunks = plan_chunks(&pending, self.options.max_chunk_size);

        let mut report = TranslationReport {
            total_segments: progress.total,
            previously_done: progress.done,
            chunks: chunks.len(),
            ..Default::default()
        };

        if chunks.is_empty() {
            info!("All {} segment(s) already translated", progress.total);
            return Ok(report);
        }

        let concurrency = self.options.max_concurrent.max(1);
        info!(
            "Translating {} segment(s) in {} chunk(s), up to {} at once ({} already done)",
            pending.len(),
            chunks.len(),
            concurrency,
            progress.done
        );

        let total_chunks = chunks.len();
        let mut settled = 0;
        let mut skipped = 0;
        let mut outcomes = stream::iter(chunks)
            .map(|chunk| self.process_chunk(store, chunk, source_language, target_language))
            .buffer_unordered(concurrency);

        while let Some(outcome) = outcomes.next().await {
            match outcome? {
                ChunkOutcome::Done(count) => report.translated += count,
                ChunkOutcome::Failed(failed) => report.failed_chunks.push(failed),
                ChunkOutcome::Skipped => skipped += 1,
            }
            settled += 1;

            if let Some(callback) = &self.progress {
                callback(TranslationProgress {
                    completed_segments: report.previously_done + report.translated,
                    total_segments: report.total_segments,
                    completed_chunks: settled,
                    total_chunks,
                });
            }
        }

        report.failed_chunks.sort_by_key(|chunk| chunk.chunk_id);
        // A cancel that lands after the last chunk settled leaves nothing undone
        report.cancelled = skipped > 0;

        if report.cancelled {
            warn!(
                "Translation cancelled with {} of {} segment(s) done",
                report.previously_done + report.translated,
                report.total_segments
            );
        } else if !report.failed_chunks.is_empty() {
            warn!(
                "{} chunk(s) failed; rerun to retry {} segment(s)",
                report.failed_chunks.len(),
                report.failed_segment_ids().len()
            );
        } else {
            info!("Translated {} segment(s)", report.translated);
        }
        Ok(report)
    }

    async fn process_chunk(
        &self,
        store: &CheckpointStore,
        chunk: Chunk,
        source_language: &str,
        target_language: &str,
    ) -> Result<ChunkOutcome, TranslationError> {
        if self.cancel.is_cancelled() {
            return Ok(ChunkOutcome::Skipped);
        }

        let (chunk_id, ids) = (chunk.id, chunk.segment_ids.clone());
        store
            .run_blocking(move |store| store.mark_in_progress(chunk_id, &ids))
            .await?;
        debug!(
            "Dispatching chunk {} ({} segment(s), {} chars)",
            chunk.id,
            chunk.len(),
            chunk.char_count
        );

        let request = ChunkRequest {
            chunk_id: chunk.id,
            texts: chunk.texts,
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
        };
        let max_attempts = self.options.retry_count + 1;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match self.attempt(&request).await {
                Ok(translations) => {
                    let ids = chunk.segment_ids.clone();
                    let done = store
                        .run_blocking(move |store| store.complete_chunk(&ids, translations))
                        .await?;
                    debug!("Chunk {} done after {} attempt(s)", chunk.id, attempt);
                    return Ok(ChunkOutcome::Done(done));
                }
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= max_attempts {
                error!(
                    "Chunk {} failed after {} attempt(s): {}",
                    chunk.id, attempt, error
                );
                let message = error.to_string();
                let (ids, recorded) = (chunk.segment_ids.clone(), message.clone());
                store
                    .run_blocking(move |store| store.fail_chunk(&ids, &recorded))
                    .await?;
                return Ok(ChunkOutcome::Failed(FailedChunk {
                    chunk_id: chunk.id,
                    segment_ids: chunk.segment_ids,
                    error: message,
                }));
            }

            let delay = self.backoff_delay(attempt);
            warn!(
                "Chunk {} attempt {}/{} failed: {}. Retrying in {:?}",
                chunk.id, attempt, max_attempts, error, delay
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => {
                    debug!("Chunk {} released after cancellation", chunk.id);
                    let ids = chunk.segment_ids.clone();
                    store.run_blocking(move |store| store.release_chunk(&ids)).await?;
                    return Ok(ChunkOutcome::Skipped);
                }
            }
        }
    }

    /// One remote call, bounded by the timeout and validated
    async fn attempt(&self, request: &ChunkRequest) -> Result<Vec<String>, ChunkError> {
        let translations = tokio::time::timeout(
            self.options.timeout,
            self.translator.translate_chunk(request),
        )
        .await
        .map_err(|_| ChunkError::Timeout(self.options.timeout))??;

        validate_translations(&request.texts, &translations)?;
        Ok(translations)
    }

    /// Exponential backoff with up to 50% random jitter
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.options.retry_backoff.as_millis() as u64;
        let exponential = base.saturating_mul(1 << (attempt - 1).min(16));
        let jitter = rand::rng().random_range(0..=base / 2);
        Duration::from_millis(exponential.saturating_add(jitter))
    }
}

/// Reject responses that would misalign or blank out segments
pub fn validate_translations(sources: &[String], translations: &[String]) -> Result<(), ChunkError> {
    if sources.len() != translations.len() {
        return Err(ChunkError::CountMismatch {
            expected: sources.len(),
            actual: translations.len(),
        });
    }

    for (index, (source, translated)) in sources.iter().zip(translations).enumerate() {
        if translated.trim().is_empty() && !source.trim().is_empty() {
            return Err(ChunkError::EmptyTranslation(index));
        }
    }
    Ok(())
}
