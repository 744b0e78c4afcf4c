/*!
 * Core translation service implementation.
 *
 * This module contains the `ChunkTranslator` seam used by the engine and the
 * `TranslationService` that implements it on top of a chat-completions
 * provider.
 */

use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

use crate::app_config::TranslationConfig;
use crate::errors::{ChunkError, ProviderError};
use crate::language_utils;
use crate::providers::Provider;
use crate::providers::openai::{OpenAI, OpenAIRequest, OpenAIResponse};

use super::batch::{self, Batch};

/// One remote translation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRequest {
    /// Chunk being translated
    pub chunk_id: usize,
    /// Source texts, in segment order
    pub texts: Vec<String>,
    /// Source language as configured
    pub source_language: String,
    /// Target language as configured
    pub target_language: String,
}

/// Anything that can translate a chunk of texts.
///
/// Implementations must return one string per input text, in input order.
/// The engine does not trust that promise and validates every response.
#[async_trait]
pub trait ChunkTranslator: Send + Sync {
    /// Translate every text of `request`
    async fn translate_chunk(&self, request: &ChunkRequest) -> Result<Vec<String>, ChunkError>;
}

/// Token usage statistics for tracking API consumption
#[derive(Debug, Clone)]
pub struct TokenUsageStats {
    /// Number of prompt tokens
    pub prompt_tokens: u64,

    /// Number of completion tokens
    pub completion_tokens: u64,

    /// Total number of tokens
    pub total_tokens: u64,

    /// Number of successful remote calls
    pub requests: u64,

    /// Start time of token tracking
    pub start_time: Instant,

    /// Total time spent on API requests
    pub api_duration: Duration,

    /// Model name
    pub model: String,
}

impl Default for TokenUsageStats {
    fn default() -> Self {
        Self::with_model(String::new())
    }
}

impl TokenUsageStats {
    /// Create new token usage stats for a model
    pub fn with_model(model: String) -> Self {
        Self {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            requests: 0,
            start_time: Instant::now(),
            api_duration: Duration::from_secs(0),
            model,
        }
    }

    /// Add token usage numbers of one response
    pub fn add_token_usage(&mut self, prompt_tokens: Option<u64>, completion_tokens: Option<u64>) {
        if let Some(pt) = prompt_tokens {
            self.prompt_tokens += pt;
            self.total_tokens += pt;
        }

        if let Some(ct) = completion_tokens {
            self.completion_tokens += ct;
            self.total_tokens += ct;
        }
    }

    /// Calculate tokens per minute rate
    pub fn tokens_per_minute(&self) -> f64 {
        // Use the API duration for rate calculation, with fallback to elapsed time
        let duration_minutes = if self.api_duration.as_secs_f64() > 0.0 {
            self.api_duration.as_secs_f64() / 60.0
        } else {
            self.start_time.elapsed().as_secs_f64() / 60.0
        };

        if duration_minutes > 0.0 {
            self.total_tokens as f64 / duration_minutes
        } else {
            0.0
        }
    }

    /// Generate a summary of token usage
    pub fn summary(&self) -> String {
        let elapsed_minutes = self.start_time.elapsed().as_secs_f64() / 60.0;
        let api_minutes = self.api_duration.as_secs_f64() / 60.0;

        format!(
            "Token Usage Summary:\n\
             Model: {}\n\
             Requests: {}\n\
             Prompt tokens: {}\n\
             Completion tokens: {}\n\
             Total tokens: {}\n\
             Elapsed time: {:.2} minutes\n\
             API request time: {:.2} minutes\n\
             Tokens per minute: {:.2}",
            self.model,
            self.requests,
            self.prompt_tokens,
            self.completion_tokens,
            self.total_tokens,
            elapsed_minutes,
            api_minutes,
            self.tokens_per_minute()
        )
    }
}

/// Chunk translator backed by an OpenAI-compatible provider
pub struct TranslationService<P = OpenAI>
where
    P: Provider<Request = OpenAIRequest, Response = OpenAIResponse>,
{
    /// Provider implementation
    provider: P,

    /// Model identifier sent with every request
    model: String,

    /// Sampling temperature
    temperature: f32,

    /// System prompt with `{source_language}` and `{target_language}` placeholders
    prompt_template: String,

    /// Accumulated usage across every call of this service
    usage: Mutex<TokenUsageStats>,
}

impl TranslationService<OpenAI> {
    /// Create a service talking to the configured endpoint
    pub fn new(config: &TranslationConfig) -> Result<Self, ProviderError> {
        let client = OpenAI::new(
            config.api_key.clone(),
            config.endpoint.clone(),
            config.model.clone(),
            config.timeout(),
        )?;
        Ok(Self::with_provider(client, config))
    }
}

impl<P> TranslationService<P>
where
    P: Provider<Request = OpenAIRequest, Response = OpenAIResponse>,
{
    /// Create a service around an existing provider
    pub fn with_provider(provider: P, config: &TranslationConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            temperature: config.temperature,
            prompt_template: config.system_prompt.clone(),
            usage: Mutex::new(TokenUsageStats::with_model(config.model.clone())),
        }
    }

    /// Render the system prompt for a language pair
    pub fn system_prompt(&self, source_language: &str, target_language: &str) -> String {
        self.prompt_template
            .replace("{source_language}", &language_utils::display_name(source_language))
            .replace("{target_language}", &language_utils::display_name(target_language))
    }

    /// Usage accumulated so far
    pub fn usage(&self) -> TokenUsageStats {
        self.usage.lock().clone()
    }

    /// Check that the endpoint accepts our credentials
    pub async fn test_connection(&self) -> Result<(), ProviderError> {
        self.provider.test_connection().await
    }

    fn build_request(&self, request: &ChunkRequest, composed: &Batch) -> OpenAIRequest {
        OpenAIRequest::new(self.model.clone())
            .add_message(
                "system",
                self.system_prompt(&request.source_language, &request.target_language),
            )
            .add_message("user", composed.message())
            .temperature(self.temperature)
    }
}

#[async_trait]
impl<P> ChunkTranslator for TranslationService<P>
where
    P: Provider<Request = OpenAIRequest, Response = OpenAIResponse>,
{
    async fn translate_chunk(&self, request: &ChunkRequest) -> Result<Vec<String>, ChunkError> {
        let composed = batch::compose(&request.texts);
        let start_time = Instant::now();
        let response = self.provider.complete(self.build_request(request, &composed)).await?;
        let duration = start_time.elapsed();

        let (prompt_tokens, completion_tokens) = P::token_usage(&response);
        {
            let mut usage = self.usage.lock();
            usage.add_token_usage(prompt_tokens, completion_tokens);
            usage.api_duration += duration;
            usage.requests += 1;
        }
        debug!("Chunk {} answered in {:?}", request.chunk_id, duration);

        let translations = composed.parse(&P::extract_text(&response))?;
        Ok(request
            .texts
            .iter()
            .zip(translations)
            .map(|(source, translated)| batch::restore_padding(source, &translated))
            .collect())
    }
}
