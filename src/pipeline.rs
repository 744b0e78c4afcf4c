/*!
 * Pipeline coordinator.
 *
 * `DocumentTranslator` owns one input document and runs the three stages
 * against it: extraction into a checkpoint, translation of the pending
 * segments, and injection into a new output document. An existing checkpoint
 * for the same source bytes and language pair is resumed instead of being
 * rebuilt, so rerunning after a crash, a quota error or a cancellation only
 * translates what is left.
 *
 * The coordinator can be driven in three ways:
 * - `translate()` blocks the calling thread on its own runtime
 * - `translate_async()` runs inside an existing runtime
 * - `spawn()` runs in the background and hands back a cancellable task
 */

use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::app_config::{Config, InjectionPolicy};
use crate::cancellation::CancellationSignal;
use crate::checkpoint::{CheckpointMetadata, CheckpointProgress, CheckpointStore, read_checkpoint};
use crate::errors::{AppError, ConfigError, InjectionError};
use crate::extractor::{ExtractionParams, ExtractionSummary, Extractor};
use crate::file_utils::FileManager;
use crate::injector::{InjectionSummary, Injector};
use crate::language_utils;
use crate::translation::{
    ChunkTranslator, EngineOptions, ProgressCallback, TranslationEngine, TranslationReport,
    TranslationService,
};

/// Translates one document end to end
pub struct DocumentTranslator<T: ChunkTranslator = TranslationService> {
    input_file: PathBuf,
    config: Config,
    checkpoint_path: PathBuf,
    output_path: PathBuf,
    translator: Arc<T>,
    cancel: CancellationSignal,
    progress: Option<ProgressCallback>,
}

impl DocumentTranslator<TranslationService> {
    /// Create a coordinator that translates through the configured endpoint.
    ///
    /// Fails fast on invalid configuration, including a missing API key.
    pub fn new<P: AsRef<Path>>(input_file: P, config: &Config) -> Result<Self, AppError> {
        config.validate()?;
        let translator = TranslationService::new(&config.translation)?;
        Self::with_translator(input_file, config, translator)
    }
}

impl<T: ChunkTranslator + 'static> DocumentTranslator<T> {
    /// Create a coordinator around any chunk translator
    pub fn with_translator<P: AsRef<Path>>(
        input_file: P,
        config: &Config,
        translator: T,
    ) -> Result<Self, AppError> {
        config.validate()?;

        let input_file = input_file.as_ref();
        if !FileManager::file_exists(input_file) {
            return Err(ConfigError::InputNotFound(input_file.to_path_buf()).into());
        }
        let input_file = FileManager::absolutize(input_file)?;
        let output_dir = FileManager::absolutize(&config.output_dir)?;
        FileManager::ensure_dir(&output_dir)?;

        let checkpoint_path = FileManager::checkpoint_path(&input_file, &output_dir);
        let output_path = FileManager::translated_path(&input_file, &output_dir);
        if output_path == input_file {
            return Err(InjectionError::OutputIsInput(output_path).into());
        }

        Ok(Self {
            input_file,
            config: config.clone(),
            checkpoint_path,
            output_path,
            translator: Arc::new(translator),
            cancel: CancellationSignal::new(),
            progress: None,
        })
    }

    /// Report engine progress to `callback`
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Signal that stops this translator's runs
    pub fn cancellation(&self) -> CancellationSignal {
        self.cancel.clone()
    }

    /// The translator used for remote calls
    pub fn translator(&self) -> Arc<T> {
        self.translator.clone()
    }

    /// Absolute path of the input document
    pub fn input_file(&self) -> &Path {
        &self.input_file
    }

    /// Absolute path of the translated document
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Absolute path of the checkpoint file
    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    /// Run extraction only, replacing any existing checkpoint
    pub fn extract(&self) -> Result<ExtractionSummary, AppError> {
        let (_, summary) = self.extractor().extract(&self.extraction_params())?;
        Ok(summary)
    }

    /// Translate the pending segments of an existing checkpoint
    pub async fn translate_segments(&self) -> Result<TranslationReport, AppError> {
        let store = CheckpointStore::open(&self.checkpoint_path)?;
        self.run_engine(&store).await
    }

    /// Write the output document from the checkpoint on disk
    pub fn inject(&self) -> Result<InjectionSummary, AppError> {
        Ok(self.injector().inject()?)
    }

    /// Segment counts of the checkpoint on disk
    pub fn status(&self) -> Result<CheckpointProgress, AppError> {
        Ok(read_checkpoint(&self.checkpoint_path)?.progress())
    }

    /// Load a resumable checkpoint or extract a fresh one
    pub fn prepare_checkpoint(&self) -> Result<CheckpointStore, AppError> {
        if FileManager::file_exists(&self.checkpoint_path) {
            match CheckpointStore::open(&self.checkpoint_path) {
                Ok(store) => {
                    if self.is_resumable(&store.snapshot().metadata)? {
                        let progress = store.progress();
                        info!("Resuming checkpoint {:?}: {}", self.checkpoint_path, progress);
                        let translation = &self.config.translation;
                        store.record_run_parameters(
                            &translation.model,
                            translation.max_chunk_size,
                            translation.max_concurrent,
                        )?;
                        return Ok(store);
                    }
                    warn!(
                        "Checkpoint {:?} belongs to a different source or language pair, extracting again",
                        self.checkpoint_path
                    );
                }
                Err(e) => warn!(
                    "Ignoring unreadable checkpoint {:?} ({}), extracting again",
                    self.checkpoint_path, e
                ),
            }
        }

        let (store, _) = self.extractor().extract(&self.extraction_params())?;
        Ok(store)
    }

    /// Run the full pipeline and return the output path.
    ///
    /// Returns `AppError::Cancelled` when stopped early and
    /// `AppError::PartialFailure` when some segments could not be translated.
    /// In both cases the checkpoint is left resumable.
    pub async fn translate_async(&self) -> Result<PathBuf, AppError> {
        info!("Translating {:?} -> {:?}", self.input_file, self.output_path);

        let store = self.prepare_checkpoint()?;
        let report = self.run_engine(&store).await?;
        if report.cancelled {
            return Err(AppError::Cancelled);
        }

        let checkpoint = store.snapshot();
        let failed_segments = checkpoint.failed_ids();
        if !failed_segments.is_empty() && self.config.injection == InjectionPolicy::Strict {
            return Err(AppError::PartialFailure { failed_segments });
        }

        let summary = self.injector().inject_checkpoint(&checkpoint)?;
        if !failed_segments.is_empty() {
            return Err(AppError::PartialFailure { failed_segments });
        }
        Ok(summary.output_path)
    }

    /// Blocking variant of [`translate_async`](Self::translate_async).
    ///
    /// Builds its own multi-threaded runtime, so it must not be called from
    /// within an async context.
    pub fn translate(&self) -> Result<PathBuf, AppError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.translate_async())
    }

    /// Run the pipeline on the current runtime in the background
    pub fn spawn(self) -> TranslationTask {
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move { self.translate_async().await });
        TranslationTask { handle, cancel }
    }

    async fn run_engine(&self, store: &CheckpointStore) -> Result<TranslationReport, AppError> {
        let mut engine = TranslationEngine::new(
            self.translator.clone(),
            EngineOptions::from_config(&self.config.translation),
        )
        .with_cancellation(self.cancel.clone());
        if let Some(callback) = &self.progress {
            engine = engine.with_progress(callback.clone());
        }

        Ok(engine
            .run(store, &self.config.source_language, &self.config.target_language)
            .await?)
    }

    fn is_resumable(&self, metadata: &CheckpointMetadata) -> Result<bool, AppError> {
        let source_hash = FileManager::hash_file(&self.input_file)?;
        Ok(metadata.source_hash == source_hash
            && language_utils::languages_match(&metadata.source_language, &self.config.source_language)
            && language_utils::languages_match(&metadata.target_language, &self.config.target_language))
    }

    fn extractor(&self) -> Extractor {
        Extractor::new(&self.input_file, &self.checkpoint_path)
    }

    fn injector(&self) -> Injector {
        Injector::new(
            &self.input_file,
            &self.checkpoint_path,
            &self.output_path,
            self.config.injection,
        )
    }

    fn extraction_params(&self) -> ExtractionParams {
        ExtractionParams {
            source_language: self.config.source_language.clone(),
            target_language: self.config.target_language.clone(),
            model: self.config.translation.model.clone(),
            max_chunk_size: self.config.translation.max_chunk_size,
            max_concurrent: self.config.translation.max_concurrent,
        }
    }
}

/// Handle to a pipeline running in the background
pub struct TranslationTask {
    handle: JoinHandle<Result<PathBuf, AppError>>,
    cancel: CancellationSignal,
}

impl TranslationTask {
    /// Ask the run to stop; the checkpoint stays resumable
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the run has finished
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run and return its result
    pub async fn join(self) -> Result<PathBuf, AppError> {
        self.handle
            .await
            .map_err(|e| AppError::Unknown(format!("Translation task failed: {}", e)))?
    }
}
