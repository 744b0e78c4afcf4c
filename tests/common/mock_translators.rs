/*!
 * Mock translators and providers for testing
 *
 * Nothing in here touches the network. The chunk translators plug into the
 * engine directly; `MockOpenAI` stands in for the HTTP client underneath
 * `TranslationService`.
 */

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use docxlate::cancellation::CancellationSignal;
use docxlate::errors::{ChunkError, ProviderError};
use docxlate::providers::Provider;
use docxlate::providers::openai::{
    OpenAIChoice, OpenAIMessage, OpenAIRequest, OpenAIResponse, TokenUsage,
};
use docxlate::translation::{ChunkRequest, ChunkTranslator};

/// Returns every text unchanged
#[derive(Debug, Default)]
pub struct IdentityTranslator {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ChunkTranslator for IdentityTranslator {
    async fn translate_chunk(&self, request: &ChunkRequest) -> Result<Vec<String>, ChunkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(request.texts.clone())
    }
}

/// Fires a cancellation signal from inside the call, then answers normally
#[derive(Debug)]
pub struct CancellingTranslator {
    cancel: CancellationSignal,
    pub calls: AtomicUsize,
}

impl CancellingTranslator {
    pub fn new(cancel: CancellationSignal) -> Self {
        Self {
            cancel,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChunkTranslator for CancellingTranslator {
    async fn translate_chunk(&self, request: &ChunkRequest) -> Result<Vec<String>, ChunkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cancel.cancel();
        Ok(request.texts.clone())
    }
}

/// Prefixes every text and records the chunks it saw
#[derive(Debug)]
pub struct PrefixTranslator {
    prefix: String,
    pub requests: Mutex<Vec<ChunkRequest>>,
}

impl PrefixTranslator {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Segment texts of every chunk received, sorted for stable comparison
    pub fn chunk_texts(&self) -> Vec<Vec<String>> {
        let mut chunks: Vec<Vec<String>> = self
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|request| request.texts.clone())
            .collect();
        chunks.sort();
        chunks
    }
}

#[async_trait]
impl ChunkTranslator for PrefixTranslator {
    async fn translate_chunk(&self, request: &ChunkRequest) -> Result<Vec<String>, ChunkError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(request
            .texts
            .iter()
            .map(|text| format!("{}{}", self.prefix, text))
            .collect())
    }
}

/// Sleeps inside every call and records the highest number of overlapping calls
#[derive(Debug)]
pub struct ConcurrencyProbe {
    delay: Duration,
    current: AtomicUsize,
    pub peak: AtomicUsize,
    pub calls: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ChunkTranslator for ConcurrencyProbe {
    async fn translate_chunk(&self, request: &ChunkRequest) -> Result<Vec<String>, ChunkError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(request.texts.iter().map(|text| format!("[vi] {}", text)).collect())
    }
}

/// Fails chunks containing `trigger` a set number of times, then succeeds
#[derive(Debug)]
pub struct FlakyTranslator {
    trigger: String,
    failures_left: AtomicUsize,
    auth_error: bool,
    pub attempts_on_trigger: AtomicUsize,
}

impl FlakyTranslator {
    /// Fail the first `failures` calls whose chunk contains `trigger`
    pub fn failing_times(trigger: &str, failures: usize) -> Self {
        Self {
            trigger: trigger.to_string(),
            failures_left: AtomicUsize::new(failures),
            auth_error: false,
            attempts_on_trigger: AtomicUsize::new(0),
        }
    }

    /// Fail every call whose chunk contains `trigger`
    pub fn always_failing(trigger: &str) -> Self {
        Self::failing_times(trigger, usize::MAX)
    }

    /// Fail with an authentication error, which is never retried
    pub fn rejecting_credentials(trigger: &str) -> Self {
        Self {
            auth_error: true,
            ..Self::always_failing(trigger)
        }
    }
}

#[async_trait]
impl ChunkTranslator for FlakyTranslator {
    async fn translate_chunk(&self, request: &ChunkRequest) -> Result<Vec<String>, ChunkError> {
        if request.texts.iter().any(|text| text.contains(&self.trigger)) {
            self.attempts_on_trigger.fetch_add(1, Ordering::SeqCst);
            let should_fail = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if should_fail {
                let error = if self.auth_error {
                    ProviderError::AuthenticationError("invalid key".to_string())
                } else {
                    ProviderError::ConnectionError("connection reset".to_string())
                };
                return Err(ChunkError::Provider(error));
            }
        }
        Ok(request.texts.iter().map(|text| format!("[vi] {}", text)).collect())
    }
}

/// Always answers with one translation too few
#[derive(Debug, Default)]
pub struct MismatchedTranslator {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ChunkTranslator for MismatchedTranslator {
    async fn translate_chunk(&self, request: &ChunkRequest) -> Result<Vec<String>, ChunkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut translations: Vec<String> =
            request.texts.iter().map(|text| format!("[vi] {}", text)).collect();
        translations.pop();
        Ok(translations)
    }
}

/// Type of error to simulate
#[derive(Debug, Clone, Copy, Default)]
pub enum MockErrorType {
    /// Authentication error (invalid API key)
    #[default]
    Auth,
    /// Connection error
    Connection,
    /// Rate limit error
    RateLimit,
}

/// Tracks mock API calls
#[derive(Debug, Default)]
pub struct ApiCallTracker {
    /// Count of mock API calls made
    pub call_count: usize,
    /// Last request received
    pub last_request: Option<OpenAIRequest>,
    /// Error to return on the next call
    pub fail_next: Option<MockErrorType>,
    /// Fixed response content overriding the echo behaviour
    pub raw_response: Option<String>,
}

/// Mock chat-completions provider that "translates" by prefixing every entry line
#[derive(Debug, Default)]
pub struct MockOpenAI {
    pub tracker: Arc<Mutex<ApiCallTracker>>,
}

impl MockOpenAI {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared handle to the call tracker, usable after the mock is moved into a service
    pub fn tracker(&self) -> Arc<Mutex<ApiCallTracker>> {
        self.tracker.clone()
    }

    /// Configure the mock to fail on the next call
    pub fn fail_next_call(&self, error_type: MockErrorType) {
        self.tracker.lock().unwrap().fail_next = Some(error_type);
    }

    /// Answer every call with `content` verbatim
    pub fn respond_with(&self, content: &str) {
        self.tracker.lock().unwrap().raw_response = Some(content.to_string());
    }

    fn echo(user_message: &str) -> String {
        user_message
            .lines()
            .map(|line| {
                if line.starts_with("<<") {
                    line.to_string()
                } else {
                    format!("[fr] {}", line.trim())
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl Provider for MockOpenAI {
    type Request = OpenAIRequest;
    type Response = OpenAIResponse;

    async fn complete(&self, request: OpenAIRequest) -> Result<OpenAIResponse, ProviderError> {
        let mut tracker = self.tracker.lock().unwrap();
        tracker.call_count += 1;
        tracker.last_request = Some(request.clone());

        if let Some(error_type) = tracker.fail_next.take() {
            return Err(match error_type {
                MockErrorType::Auth => ProviderError::AuthenticationError("Invalid API key".to_string()),
                MockErrorType::Connection => ProviderError::ConnectionError("Connection refused".to_string()),
                MockErrorType::RateLimit => ProviderError::RateLimitExceeded("Too many requests".to_string()),
            });
        }

        let user_message = request
            .messages
            .iter()
            .rev()
            .find(|message| message.role == "user")
            .map(|message| message.content.clone())
            .unwrap_or_default();
        let content = match &tracker.raw_response {
            Some(raw) => raw.clone(),
            None => Self::echo(&user_message),
        };

        Ok(OpenAIResponse {
            choices: vec![OpenAIChoice {
                message: OpenAIMessage {
                    role: "assistant".to_string(),
                    content,
                },
            }],
            usage: Some(TokenUsage {
                prompt_tokens: 12,
                completion_tokens: 8,
                total_tokens: 20,
            }),
        })
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn extract_text(response: &OpenAIResponse) -> String {
        response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .unwrap_or_default()
    }

    fn token_usage(response: &OpenAIResponse) -> (Option<u64>, Option<u64>) {
        match &response.usage {
            Some(usage) => (Some(usage.prompt_tokens), Some(usage.completion_tokens)),
            None => (None, None),
        }
    }
}
