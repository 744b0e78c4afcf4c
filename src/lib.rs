/*!
 * # docxlate - resumable AI translation of Word documents
 *
 * A Rust library that translates `.docx` documents with an OpenAI-compatible
 * language model while keeping their layout intact.
 *
 * ## Features
 *
 * - Extract every text node of the document body, headers, footers,
 *   footnotes and endnotes into a durable JSON checkpoint
 * - Translate in character-bounded chunks with bounded concurrency,
 *   per-call timeouts and retries with exponential backoff
 * - Resume after a crash, a quota error or a cancellation without
 *   retranslating finished segments
 * - Write a translated copy that differs from the source only in the
 *   translated text nodes
 * - ISO 639-1 and ISO 639-3 language code support
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `document`: `.docx` package access and text-node rewriting
 * - `checkpoint`: Segment models and the persisted checkpoint store
 * - `extractor`: Builds a checkpoint from a source document
 * - `translation`: Chunk planning, wire format and the translation engine
 * - `injector`: Writes translations into a copy of the source document
 * - `pipeline`: The `DocumentTranslator` coordinator
 * - `providers`: Client for OpenAI-compatible chat-completions APIs
 * - `cancellation`: Cooperative cancellation shared across stages
 * - `file_utils`: File system operations
 * - `app_controller`: CLI-level controller with progress reporting
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod cancellation;
pub mod checkpoint;
pub mod document;
pub mod errors;
pub mod extractor;
pub mod file_utils;
pub mod injector;
pub mod language_utils;
pub mod pipeline;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::{Config, InjectionPolicy};
pub use cancellation::CancellationSignal;
pub use checkpoint::{Checkpoint, CheckpointProgress, CheckpointStore, Segment, SegmentStatus};
pub use errors::{AppError, ChunkError, ConfigError, InjectionError, TranslationError};
pub use extractor::Extractor;
pub use injector::Injector;
pub use language_utils::{get_language_name, languages_match, normalize_to_part2t};
pub use pipeline::{DocumentTranslator, TranslationTask};
pub use translation::{ChunkTranslator, TranslationEngine, TranslationReport, TranslationService};
