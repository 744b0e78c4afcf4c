/*!
 * Tests for the checkpoint store
 */

use anyhow::Result;
use std::fs;

use docxlate::checkpoint::{CheckpointStore, SegmentStatus, read_checkpoint};
use docxlate::errors::CheckpointError;

use crate::common;

/// Test that a fresh checkpoint lists every segment as pending
#[test]
fn test_create_withExtractedDocument_shouldPersistPendingSegments() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (_, store) = common::extract_checkpoint(temp_dir.path(), &["Hello", "World"])?;

    let on_disk = read_checkpoint(store.path())?;
    assert_eq!(on_disk.segments.len(), 2);
    assert!(on_disk.segments.iter().all(|s| s.status == SegmentStatus::Pending));
    assert_eq!(on_disk, store.snapshot());
    Ok(())
}

/// Test that completed chunks are visible after reopening
#[test]
fn test_complete_chunk_withReopen_shouldKeepTranslations() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (_, store) = common::extract_checkpoint(temp_dir.path(), &["Hello", "World"])?;

    store.mark_in_progress(0, &[1, 2])?;
    let done = store.complete_chunk(&[1, 2], vec!["Xin chào".to_string(), "Thế giới".to_string()])?;
    assert_eq!(done, 2);

    let reopened = CheckpointStore::open(store.path())?;
    let checkpoint = reopened.snapshot();
    assert!(checkpoint.is_complete());
    assert_eq!(checkpoint.segments[0].translated_text.as_deref(), Some("Xin chào"));
    assert_eq!(checkpoint.segments[1].translated_text.as_deref(), Some("Thế giới"));
    assert_eq!(checkpoint.segments[1].chunk_id, Some(0));
    Ok(())
}

/// Test that a translation count mismatch never reaches the file
#[test]
fn test_complete_chunk_withWrongCount_shouldLeaveStateUntouched() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (_, store) = common::extract_checkpoint(temp_dir.path(), &["Hello", "World"])?;
    let before = fs::read_to_string(store.path())?;

    let result = store.complete_chunk(&[1, 2], vec!["only one".to_string()]);

    assert!(matches!(result, Err(CheckpointError::Invalid(_))));
    assert_eq!(fs::read_to_string(store.path())?, before);
    assert_eq!(store.progress().done, 0);
    Ok(())
}

/// Test that a done segment keeps its first translation
#[test]
fn test_complete_chunk_withDoneSegment_shouldNotOverwrite() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (_, store) = common::extract_checkpoint(temp_dir.path(), &["Hello"])?;

    store.complete_chunk(&[1], vec!["first".to_string()])?;
    let changed = store.complete_chunk(&[1], vec!["second".to_string()])?;

    assert_eq!(changed, 0);
    assert_eq!(
        store.snapshot().segments[0].translated_text.as_deref(),
        Some("first")
    );
    Ok(())
}

/// Test that interrupted segments go back to pending
#[test]
fn test_reset_interrupted_withInProgressSegments_shouldMakeThemPending() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (_, store) = common::extract_checkpoint(temp_dir.path(), &["Hello", "World", "Again"])?;
    store.mark_in_progress(0, &[1, 2])?;

    // A crash leaves the marks on disk; a new process sees them on open
    let reopened = CheckpointStore::open(store.path())?;
    assert_eq!(reopened.progress().in_progress, 2);

    assert_eq!(reopened.reset_interrupted()?, 2);
    assert_eq!(reopened.progress().pending, 3);
    assert_eq!(read_checkpoint(reopened.path())?.progress().pending, 3);
    Ok(())
}

/// Test that failed segments stay eligible for the next run
#[test]
fn test_fail_chunk_withError_shouldRecordAndStayPendingForNextRun() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (_, store) = common::extract_checkpoint(temp_dir.path(), &["Hello", "World"])?;

    store.mark_in_progress(0, &[2])?;
    store.fail_chunk(&[2], "connection reset")?;

    let checkpoint = store.snapshot();
    assert_eq!(checkpoint.segments[1].status, SegmentStatus::Failed);
    assert_eq!(checkpoint.segments[1].last_error.as_deref(), Some("connection reset"));
    assert_eq!(checkpoint.failed_ids(), vec![2]);

    let pending: Vec<u64> = store.pending_segments().iter().map(|s| s.id).collect();
    assert_eq!(pending, vec![1, 2]);
    Ok(())
}

/// Test that a released chunk is pending again
#[test]
fn test_release_chunk_withInProgressSegments_shouldMakeThemPending() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (_, store) = common::extract_checkpoint(temp_dir.path(), &["Hello"])?;

    store.mark_in_progress(4, &[1])?;
    store.release_chunk(&[1])?;

    assert_eq!(store.snapshot().segments[0].status, SegmentStatus::Pending);
    Ok(())
}

/// Test that a corrupt file is reported instead of silently restarting
#[test]
fn test_open_withCorruptFile_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "broken_checkpoint.json", "{ not json")?;

    assert!(matches!(
        CheckpointStore::open(&path),
        Err(CheckpointError::Serialization(_))
    ));
    Ok(())
}

/// Test the file format is the documented human-readable shape
#[test]
fn test_checkpoint_file_shouldUseDocumentedShape() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let (_, store) = common::extract_checkpoint(temp_dir.path(), &["Hello"])?;

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(store.path())?)?;
    let segment = &json["segments"][0];

    assert_eq!(json["version"], 1);
    assert_eq!(json["metadata"]["source_language"], "en");
    assert_eq!(segment["id"], 1);
    assert_eq!(segment["location"]["part"], "word/document.xml");
    assert_eq!(segment["location"]["node"], 0);
    assert_eq!(segment["source_text"], "Hello");
    assert_eq!(segment["status"], "pending");
    assert!(segment["translated_text"].is_null());
    Ok(())
}

/// Test that writes offloaded to the blocking pool reach both the file and every clone
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_run_blocking_withConcurrentCompletions_shouldPersistEveryChunk() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let texts: Vec<String> = (1..=16).map(|i| format!("Paragraph {}", i)).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let (_, store) = common::extract_checkpoint(temp_dir.path(), &refs)?;

    let writes = (1..=16u64).map(|id| {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .run_blocking(move |store| store.complete_chunk(&[id], vec![format!("Đoạn {}", id)]))
                .await
        })
    });
    for write in futures::future::join_all(writes).await {
        assert_eq!(write??, 1);
    }

    assert!(store.snapshot().is_complete());
    let on_disk = read_checkpoint(store.path())?;
    assert!(on_disk.is_complete());
    assert_eq!(on_disk.segments[15].translated_text.as_deref(), Some("Đoạn 16"));
    Ok(())
}
