/*!
 * Tests for the translation engine against a real checkpoint
 */

use anyhow::Result;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use docxlate::cancellation::CancellationSignal;
use docxlate::checkpoint::{CheckpointStore, SegmentStatus};
use docxlate::translation::{EngineOptions, TranslationEngine, TranslationProgress};

use crate::common;
use crate::common::mock_translators::{
    CancellingTranslator, ConcurrencyProbe, IdentityTranslator, MismatchedTranslator, PrefixTranslator,
};

fn options() -> EngineOptions {
    EngineOptions {
        max_chunk_size: 5000,
        max_concurrent: 2,
        retry_count: 1,
        retry_backoff: Duration::from_millis(1),
        timeout: Duration::from_secs(5),
    }
}

/// Test that a second run over a finished checkpoint makes no calls
#[tokio::test]
async fn test_run_withFinishedCheckpoint_shouldMakeNoCalls() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (_, store) = common::extract_checkpoint(temp_dir.path(), &["Hello", "World"])?;

    let first = TranslationEngine::new(Arc::new(PrefixTranslator::new("[vi] ")), options())
        .run(&store, "en", "vi")
        .await?;
    assert!(first.is_complete());
    assert_eq!(first.translated, 2);
    let translated = store.snapshot();

    let identity = Arc::new(IdentityTranslator::default());
    let second = TranslationEngine::new(identity.clone(), options())
        .run(&store, "en", "vi")
        .await?;

    assert_eq!(identity.calls.load(Ordering::SeqCst), 0);
    assert_eq!(second.chunks, 0);
    assert_eq!(second.previously_done, 2);
    assert!(second.is_complete());
    assert_eq!(store.snapshot().segments, translated.segments);
    Ok(())
}

/// Test that segments left in progress by a crash are translated again
#[tokio::test]
async fn test_run_withInterruptedSegments_shouldRetranslateThem() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (_, store) = common::extract_checkpoint(temp_dir.path(), &["Hello", "World"])?;
    store.mark_in_progress(0, &[1, 2])?;
    let store = CheckpointStore::open(store.path())?;

    let report = TranslationEngine::new(Arc::new(PrefixTranslator::new("[vi] ")), options())
        .run(&store, "en", "vi")
        .await?;

    assert_eq!(report.translated, 2);
    let checkpoint = store.snapshot();
    assert!(checkpoint.is_complete());
    assert_eq!(
        checkpoint.segments[0].translated_text.as_deref(),
        Some("[vi] Hello")
    );
    Ok(())
}

/// Test that the progress callback ends at the full count
#[tokio::test]
async fn test_run_withProgressCallback_shouldReportEverySettledChunk() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (_, store) = common::extract_checkpoint(temp_dir.path(), &["One", "Two", "Three", "Four"])?;
    let seen: Arc<Mutex<Vec<TranslationProgress>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let mut small_chunks = options();
    small_chunks.max_chunk_size = 3;
    TranslationEngine::new(Arc::new(PrefixTranslator::new("[vi] ")), small_chunks)
        .with_progress(Arc::new(move |progress: TranslationProgress| sink.lock().unwrap().push(progress)))
        .run(&store, "en", "vi")
        .await?;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 4);
    let last = seen.last().expect("at least one progress update");
    assert_eq!(last.completed_segments, 4);
    assert_eq!(last.total_segments, 4);
    assert_eq!(last.completed_chunks, last.total_chunks);
    assert!(seen.windows(2).all(|w| w[0].completed_segments <= w[1].completed_segments));
    Ok(())
}

/// Test that a response with the wrong number of entries fails the chunk after retries
#[tokio::test]
async fn test_run_withMismatchedResponses_shouldFailChunkAfterRetries() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (_, store) = common::extract_checkpoint(temp_dir.path(), &["Hello", "World"])?;
    let translator = Arc::new(MismatchedTranslator::default());

    let report = TranslationEngine::new(translator.clone(), options())
        .run(&store, "en", "vi")
        .await?;

    assert_eq!(translator.calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.failed_segment_ids(), vec![1, 2]);
    assert!(!report.is_complete());

    let checkpoint = store.snapshot();
    assert!(checkpoint.segments.iter().all(|s| s.status == SegmentStatus::Failed));
    assert!(checkpoint.segments.iter().all(|s| s.translated_text.is_none()));
    assert!(checkpoint.segments[0]
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("Expected 2 translations")));
    Ok(())
}

/// Test that a call exceeding the timeout counts as a failed attempt
#[tokio::test]
async fn test_run_withSlowTranslator_shouldTimeOut() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (_, store) = common::extract_checkpoint(temp_dir.path(), &["Hello"])?;

    let mut impatient = options();
    impatient.retry_count = 0;
    impatient.timeout = Duration::from_millis(20);
    let report = TranslationEngine::new(
        Arc::new(ConcurrencyProbe::new(Duration::from_millis(500))),
        impatient,
    )
    .run(&store, "en", "vi")
    .await?;

    assert_eq!(report.failed_chunks.len(), 1);
    assert!(report.failed_chunks[0].error.contains("timed out"));
    assert_eq!(store.snapshot().segments[0].status, SegmentStatus::Failed);
    Ok(())
}

/// Test that a cancel arriving after the last chunk settled does not mark the run cancelled
#[tokio::test]
async fn test_run_withCancelDuringLastChunk_shouldReportComplete() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (_, store) = common::extract_checkpoint(temp_dir.path(), &["Hello", "World"])?;
    let cancel = CancellationSignal::new();
    let translator = Arc::new(CancellingTranslator::new(cancel.clone()));

    let report = TranslationEngine::new(translator.clone(), options())
        .with_cancellation(cancel.clone())
        .run(&store, "en", "vi")
        .await?;

    assert!(cancel.is_cancelled());
    assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
    assert!(!report.cancelled);
    assert!(report.is_complete());
    assert!(store.snapshot().is_complete());
    Ok(())
}

/// Test that chunks never dispatched because of a cancel mark the run cancelled
#[tokio::test]
async fn test_run_withCancelBeforeDispatch_shouldReportCancelled() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (_, store) = common::extract_checkpoint(temp_dir.path(), &["Hello", "World"])?;
    let cancel = CancellationSignal::new();
    cancel.cancel();
    let identity = Arc::new(IdentityTranslator::default());

    let report = TranslationEngine::new(identity.clone(), options())
        .with_cancellation(cancel)
        .run(&store, "en", "vi")
        .await?;

    assert_eq!(identity.calls.load(Ordering::SeqCst), 0);
    assert!(report.cancelled);
    assert_eq!(store.progress().pending, 2);
    Ok(())
}
