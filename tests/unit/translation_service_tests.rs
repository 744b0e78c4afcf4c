/*!
 * Tests for the provider-backed translation service
 */

use anyhow::Result;

use docxlate::app_config::TranslationConfig;
use docxlate::errors::{ChunkError, ProviderError};
use docxlate::translation::{ChunkRequest, ChunkTranslator, TranslationService};

use crate::common::mock_translators::{MockErrorType, MockOpenAI};

fn request(texts: &[&str]) -> ChunkRequest {
    ChunkRequest {
        chunk_id: 0,
        texts: texts.iter().map(|s| s.to_string()).collect(),
        source_language: "en".to_string(),
        target_language: "fr".to_string(),
    }
}

/// Test that translations come back in order with the source padding
#[tokio::test]
async fn test_translate_chunk_withPaddedTexts_shouldKeepOrderAndPadding() -> Result<()> {
    let service = TranslationService::with_provider(MockOpenAI::new(), &TranslationConfig::default());

    let translations = service
        .translate_chunk(&request(&["Hello ", " world", "again"]))
        .await?;

    assert_eq!(translations, vec!["[fr] Hello ", " [fr] world", "[fr] again"]);
    Ok(())
}

/// Test that the request carries the system prompt and the marker batch
#[tokio::test]
async fn test_translate_chunk_shouldSendPromptAndMarkedBatch() -> Result<()> {
    let mock = MockOpenAI::new();
    let tracker = mock.tracker();
    let service = TranslationService::with_provider(mock, &TranslationConfig::default());

    service.translate_chunk(&request(&["Hello", "World"])).await?;

    let tracker = tracker.lock().unwrap();
    let sent = tracker.last_request.as_ref().expect("a request was sent");
    assert_eq!(sent.model, "gpt-4o-mini");
    assert_eq!(sent.temperature, Some(0.3));
    assert_eq!(sent.messages.len(), 2);
    assert_eq!(sent.messages[0].role, "system");
    assert!(sent.messages[0].content.contains("English"));
    assert!(sent.messages[0].content.contains("French"));
    assert_eq!(sent.messages[1].role, "user");
    assert_eq!(
        sent.messages[1].content,
        "<<ENTRY_0>>\nHello\n<<ENTRY_1>>\nWorld\n<<END>>"
    );
    Ok(())
}

/// Test that marker-like text inside a source survives the round trip intact
#[tokio::test]
async fn test_translate_chunk_withMarkerTextInSource_shouldKeepWholeEntry() -> Result<()> {
    let mock = MockOpenAI::new();
    let tracker = mock.tracker();
    let service = TranslationService::with_provider(mock, &TranslationConfig::default());

    let translations = service
        .translate_chunk(&request(&["Type <<END>> to finish", "see <<ENTRY_1>> below"]))
        .await?;

    assert_eq!(
        translations,
        vec!["[fr] Type <<END>> to finish", "[fr] see <<ENTRY_1>> below"]
    );
    let tracker = tracker.lock().unwrap();
    let sent = tracker.last_request.as_ref().expect("a request was sent");
    assert!(sent.messages[1].content.starts_with("<<ENTRY_X1_0>>\n"));
    assert!(sent.messages[1].content.ends_with("\n<<END_X1>>"));
    Ok(())
}

/// Test that a response cut short by a stray end marker is rejected
#[tokio::test]
async fn test_translate_chunk_withStrayEndMarker_shouldReject() {
    let mock = MockOpenAI::new();
    mock.respond_with("<<ENTRY_0>>\nXin <<END>> chào\n<<END>>");
    let service = TranslationService::with_provider(mock, &TranslationConfig::default());

    let result = service.translate_chunk(&request(&["Hello"])).await;

    assert!(matches!(result, Err(ChunkError::TrailingMarker)));
}

/// Test that token usage accumulates across calls
#[tokio::test]
async fn test_usage_withTwoCalls_shouldAccumulate() -> Result<()> {
    let service = TranslationService::with_provider(MockOpenAI::new(), &TranslationConfig::default());

    service.translate_chunk(&request(&["One"])).await?;
    service.translate_chunk(&request(&["Two"])).await?;

    let usage = service.usage();
    assert_eq!(usage.requests, 2);
    assert_eq!(usage.prompt_tokens, 24);
    assert_eq!(usage.completion_tokens, 16);
    assert_eq!(usage.total_tokens, 40);
    Ok(())
}

/// Test that a response with a missing entry is rejected
#[tokio::test]
async fn test_translate_chunk_withMissingEntry_shouldReportCountMismatch() {
    let mock = MockOpenAI::new();
    mock.respond_with("<<ENTRY_0>>\nseulement un\n<<END>>");
    let service = TranslationService::with_provider(mock, &TranslationConfig::default());

    let result = service.translate_chunk(&request(&["One", "Two"])).await;

    assert!(matches!(
        result,
        Err(ChunkError::CountMismatch { expected: 2, actual: 1 })
    ));
}

/// Test that provider errors keep their retry classification
#[tokio::test]
async fn test_translate_chunk_withProviderErrors_shouldClassifyRetries() {
    let mock = MockOpenAI::new();
    let tracker = mock.tracker();
    let service = TranslationService::with_provider(mock, &TranslationConfig::default());

    tracker.lock().unwrap().fail_next = Some(MockErrorType::Auth);
    let auth = service.translate_chunk(&request(&["Hello"])).await;
    match auth {
        Err(error @ ChunkError::Provider(ProviderError::AuthenticationError(_))) => {
            assert!(!error.is_retryable())
        }
        other => panic!("expected an authentication error, got {:?}", other),
    }

    tracker.lock().unwrap().fail_next = Some(MockErrorType::RateLimit);
    let limited = service.translate_chunk(&request(&["Hello"])).await;
    assert!(limited.is_err_and(|error| error.is_retryable()));

    // The mock recovers once the queued error is consumed
    assert!(service.translate_chunk(&request(&["Hello"])).await.is_ok());
    assert_eq!(tracker.lock().unwrap().call_count, 3);
    assert_eq!(service.usage().requests, 1);
}

/// Test the connection check through the blocking test runtime
#[test]
fn test_test_connection_withMockProvider_shouldSucceed() {
    let service = TranslationService::with_provider(MockOpenAI::new(), &TranslationConfig::default());

    let result = tokio_test::block_on(service.test_connection());

    assert!(result.is_ok());
}
