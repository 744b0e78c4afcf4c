/*!
 * Error types for the docxlate application.
 *
 * This module contains custom error types for each pipeline stage,
 * using the thiserror crate for ergonomic error definitions.
 *
 * - `ConfigError`: bad or missing configuration, fatal and never retried
 * - `ExtractionError`: the input could not be read as a document
 * - `ChunkError`: one remote translation attempt for a chunk failed
 * - `TranslationError`: the engine itself could not continue
 * - `InjectionError`: the translated document could not be produced
 * - `AppError`: what the coordinator and the CLI surface to the user
 */

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),
}

/// Configuration problems detected before any work starts
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No API credential was supplied
    #[error("API key is missing; set it in the config file, pass --api-key or export OPENAI_API_KEY")]
    MissingApiKey,

    /// A numeric or textual parameter is out of range
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Name of the offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// Endpoint could not be parsed as a URL
    #[error("Invalid endpoint URL '{0}'")]
    InvalidEndpoint(String),

    /// Input document is missing or is not a file
    #[error("Input file does not exist: {0}")]
    InputNotFound(PathBuf),
}

/// Errors raised while reading or writing the word-processing package
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Filesystem failure
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The zip container is unreadable or could not be written
    #[error("Invalid document package: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// The package lacks the main document part
    #[error("Not a word-processing document: missing part '{0}'")]
    MissingPart(String),

    /// An XML part is not valid UTF-8
    #[error("Part '{0}' is not valid UTF-8")]
    InvalidEncoding(String),
}

/// Errors raised by the checkpoint store
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Filesystem failure
    #[error("Checkpoint I/O error on {path}: {source}")]
    Io {
        /// Checkpoint path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The checkpoint file could not be encoded or decoded
    #[error("Checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The checkpoint decoded but breaks an invariant
    #[error("Invalid checkpoint: {0}")]
    Invalid(String),

    /// A background checkpoint write panicked or was aborted
    #[error("Checkpoint task failed: {0}")]
    Task(String),
}

/// A single chunk translation attempt failed
#[derive(Error, Debug)]
pub enum ChunkError {
    /// The remote provider returned an error
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The remote call did not finish in time
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    /// A response marker could not be found
    #[error("Response is missing marker for entry {0}")]
    MissingMarker(usize),

    /// The response contained a different number of translations
    #[error("Expected {expected} translations but received {actual}")]
    CountMismatch {
        /// Number of segments submitted
        expected: usize,
        /// Number of strings returned
        actual: usize,
    },

    /// A translation came back empty for a non-empty source
    #[error("Translation for entry {0} is empty")]
    EmptyTranslation(usize),

    /// Batch markers appeared after the end of the batch
    #[error("Response has markers after the end marker")]
    TrailingMarker,
}

impl ChunkError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ChunkError::Provider(ProviderError::AuthenticationError(_))
        )
    }
}

/// Errors raised while building the checkpoint from a source document
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The document could not be parsed
    #[error("Failed to read document: {0}")]
    Document(#[from] DocumentError),

    /// The checkpoint could not be written
    #[error("Failed to write checkpoint: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Fatal errors of the translation engine
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Progress could not be persisted, so continuing would lose work
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Errors raised while writing the translated document
#[derive(Error, Debug)]
pub enum InjectionError {
    /// Not every segment has a translation
    #[error("Translation incomplete: {pending} pending and {failed} failed segments")]
    Incomplete {
        /// Segments still pending or in progress
        pending: usize,
        /// Segments whose chunk exhausted its retries
        failed: usize,
    },

    /// A segment's location no longer matches the source document
    #[error("Segment {id} does not match node {node} of '{part}' in the source document")]
    LocationMismatch {
        /// Segment id
        id: u64,
        /// Package part
        part: String,
        /// Node ordinal within the part
        node: usize,
    },

    /// Refusing to overwrite the input
    #[error("Output path {0} is the input document")]
    OutputIsInput(PathBuf),

    /// The package could not be read or written
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// The checkpoint could not be loaded
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Extraction stage failed
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Translation stage failed
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Injection stage failed
    #[error("Injection error: {0}")]
    Injection(#[from] InjectionError),

    /// Some segments could not be translated; the checkpoint can be resumed
    #[error("{} segment(s) failed to translate; rerun to resume", failed_segments.len())]
    PartialFailure {
        /// Ids of the failed segments
        failed_segments: Vec<u64>,
    },

    /// The run was cancelled before finishing; the checkpoint can be resumed
    #[error("Translation cancelled")]
    Cancelled,

    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// The remote provider could not be set up
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<CheckpointError> for AppError {
    fn from(error: CheckpointError) -> Self {
        Self::Translation(TranslationError::Checkpoint(error))
    }
}
