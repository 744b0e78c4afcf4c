use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::checkpoint::{CheckpointProgress, read_checkpoint};
use crate::errors::{AppError, ConfigError};
use crate::extractor::{ExtractionParams, ExtractionSummary, Extractor};
use crate::file_utils::FileManager;
use crate::injector::{InjectionSummary, Injector};
use crate::pipeline::DocumentTranslator;
use crate::translation::TranslationProgress;

// @module: Application controller for document translation

/// Where the files of one input document live
struct DocumentPaths {
    input_file: PathBuf,
    checkpoint_path: PathBuf,
    output_path: PathBuf,
}

/// Main application controller for document translation
pub struct Controller {
    // @field: App configuration
    config: Config,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Self {
        Self { config }
    }

    /// Configuration used by this controller
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Translate one document, showing a progress bar.
    ///
    /// Returns `Ok(None)` when the output already exists and `force_overwrite`
    /// is not set.
    pub async fn run(&self, input_file: PathBuf, force_overwrite: bool) -> Result<Option<PathBuf>, AppError> {
        let multi_progress = MultiProgress::new();
        self.run_with_progress(&input_file, &multi_progress, force_overwrite).await
    }

    async fn run_with_progress(
        &self,
        input_file: &Path,
        multi_progress: &MultiProgress,
        force_overwrite: bool,
    ) -> Result<Option<PathBuf>, AppError> {
        let start_time = Instant::now();

        let paths = self.document_paths(input_file)?;
        if FileManager::file_exists(&paths.output_path) && !force_overwrite {
            warn!(
                "Skipping {:?}, translation already exists (use -f to force overwrite)",
                paths.input_file
            );
            return Ok(None);
        }

        let progress_bar = multi_progress.add(ProgressBar::new(0));
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));

        let pb = progress_bar.clone();
        let translator = DocumentTranslator::new(&paths.input_file, &self.config)?.with_progress(Arc::new(
            move |progress: TranslationProgress| {
                pb.set_length(progress.total_segments as u64);
                pb.set_position(progress.completed_segments as u64);
                pb.set_message(format!(
                    "chunk {}/{}",
                    progress.completed_chunks, progress.total_chunks
                ));
            },
        ));

        info!(
            "🚀 docxlate: {} - {} ({} -> {})",
            self.config.translation.endpoint,
            self.config.translation.model,
            self.config.source_language,
            self.config.target_language
        );
        progress_bar.set_message("Translating");

        // Ctrl+C stops dispatching new chunks; the checkpoint stays resumable
        let cancel = translator.cancellation();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, waiting for in-flight chunks to finish…");
                cancel.cancel();
            }
        });

        let result = translator.translate_async().await;
        interrupt.abort();
        progress_bar.finish_and_clear();

        let usage = translator.translator().usage();
        if usage.requests > 0 {
            info!(
                "Tokens used: {} prompt + {} completion = {} in {} request(s)",
                usage.prompt_tokens, usage.completion_tokens, usage.total_tokens, usage.requests
            );
        }

        match &result {
            Ok(output_path) => info!(
                "Success: {} ({})",
                output_path.display(),
                Self::format_duration(start_time.elapsed())
            ),
            Err(AppError::PartialFailure { failed_segments }) => warn!(
                "{} segment(s) failed, checkpoint kept at {}",
                failed_segments.len(),
                translator.checkpoint_path().display()
            ),
            Err(AppError::Cancelled) => warn!(
                "Cancelled, rerun to resume from {}",
                translator.checkpoint_path().display()
            ),
            Err(_) => {}
        }

        result.map(Some)
    }

    /// Translate every document found under `input_dir`.
    ///
    /// Files that already have a translated output are skipped. A cancelled
    /// run stops the whole folder.
    pub async fn run_folder(&self, input_dir: PathBuf, force_overwrite: bool) -> Result<(), AppError> {
        let start_time = Instant::now();

        if !FileManager::dir_exists(&input_dir) {
            return Err(ConfigError::InputNotFound(input_dir).into());
        }

        let documents: Vec<PathBuf> = FileManager::find_files(&input_dir, "docx")?
            .into_iter()
            .filter(|path| !FileManager::is_translated_output(path))
            .collect();
        if documents.is_empty() {
            return Err(AppError::File(format!(
                "No .docx files found in directory: {:?}",
                input_dir
            )));
        }

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(documents.len() as u64));
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        folder_pb.set_style(template_result.progress_chars("█▓▒░"));
        folder_pb.set_message("Processing files");

        let mut success_count = 0;
        let mut error_count = 0;
        let mut skip_count = 0;

        for document in &documents {
            let file_name = document
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            match self.run_with_progress(document, &multi_progress, force_overwrite).await {
                Ok(Some(_)) => success_count += 1,
                Ok(None) => skip_count += 1,
                Err(AppError::Cancelled) => {
                    folder_pb.abandon_with_message("Cancelled");
                    return Err(AppError::Cancelled);
                }
                Err(e) => {
                    error!("Error processing file {}: {}", file_name, e);
                    error_count += 1;
                }
            }
            folder_pb.inc(1);
        }

        folder_pb.finish_with_message("Folder processing complete");
        info!(
            "Folder processing completed in {}: {} translated, {} skipped, {} errors",
            Self::format_duration(start_time.elapsed()),
            success_count,
            skip_count,
            error_count
        );
        Ok(())
    }

    /// Extract segments into a fresh checkpoint without translating
    pub fn extract(&self, input_file: &Path) -> Result<ExtractionSummary, AppError> {
        let paths = self.document_paths(input_file)?;
        let params = ExtractionParams {
            source_language: self.config.source_language.clone(),
            target_language: self.config.target_language.clone(),
            model: self.config.translation.model.clone(),
            max_chunk_size: self.config.translation.max_chunk_size,
            max_concurrent: self.config.translation.max_concurrent,
        };
        let (_, summary) = Extractor::new(&paths.input_file, &paths.checkpoint_path).extract(&params)?;
        info!(
            "Checkpoint written to {} ({} segments)",
            paths.checkpoint_path.display(),
            summary.segments
        );
        Ok(summary)
    }

    /// Write the output document from an existing checkpoint
    pub fn inject(&self, input_file: &Path) -> Result<InjectionSummary, AppError> {
        let paths = self.document_paths(input_file)?;
        let summary = Injector::new(
            &paths.input_file,
            &paths.checkpoint_path,
            &paths.output_path,
            self.config.injection,
        )
        .inject()?;
        info!("Success: {}", summary.output_path.display());
        Ok(summary)
    }

    /// Checkpoint progress of a document
    pub fn status(&self, input_file: &Path) -> Result<CheckpointProgress, AppError> {
        let paths = self.document_paths(input_file)?;
        Ok(read_checkpoint(&paths.checkpoint_path)?.progress())
    }

    fn document_paths(&self, input_file: &Path) -> Result<DocumentPaths, AppError> {
        if !FileManager::file_exists(input_file) {
            return Err(ConfigError::InputNotFound(input_file.to_path_buf()).into());
        }
        let input_file = FileManager::absolutize(input_file)?;
        let output_dir = FileManager::absolutize(&self.config.output_dir)?;
        FileManager::ensure_dir(&output_dir)?;

        Ok(DocumentPaths {
            checkpoint_path: FileManager::checkpoint_path(&input_file, &output_dir),
            output_path: FileManager::translated_path(&input_file, &output_dir),
            input_file,
        })
    }

    // Format duration in a human-readable format
    fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
