/*!
 * Injection stage.
 *
 * Re-reads the untouched source document and writes a copy in which every
 * node addressed by a done segment carries its translation. Nodes without a
 * segment, and nodes whose translation equals the source, are copied byte
 * for byte. The output is written through a temp file and renamed, so a
 * failed injection never leaves a partial file at the output path.
 */

use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::app_config::InjectionPolicy;
use crate::checkpoint::{Checkpoint, read_checkpoint};
use crate::document::{DocxPackage, replace_text_nodes, scan_text_nodes};
use crate::errors::InjectionError;

/// What an injection wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionSummary {
    /// Written document
    pub output_path: PathBuf,
    /// Nodes whose text was replaced
    pub replaced_nodes: usize,
    /// Segments that kept their source text because no translation exists
    pub untranslated_segments: usize,
}

/// Writes translated text back into a copy of the source document
pub struct Injector {
    input_file: PathBuf,
    checkpoint_path: PathBuf,
    output_path: PathBuf,
    policy: InjectionPolicy,
}

impl Injector {
    /// Create an injector
    pub fn new<P1: AsRef<Path>, P2: AsRef<Path>, P3: AsRef<Path>>(
        input_file: P1,
        checkpoint_path: P2,
        output_path: P3,
        policy: InjectionPolicy,
    ) -> Self {
        Self {
            input_file: input_file.as_ref().to_path_buf(),
            checkpoint_path: checkpoint_path.as_ref().to_path_buf(),
            output_path: output_path.as_ref().to_path_buf(),
            policy,
        }
    }

    /// Load the checkpoint read-only and write the output document
    pub fn inject(&self) -> Result<InjectionSummary, InjectionError> {
        let checkpoint = read_checkpoint(&self.checkpoint_path)?;
        self.inject_checkpoint(&checkpoint)
    }

    /// Write the output document from an already loaded checkpoint
    pub fn inject_checkpoint(&self, checkpoint: &Checkpoint) -> Result<InjectionSummary, InjectionError> {
        if same_file(&self.input_file, &self.output_path) {
            return Err(InjectionError::OutputIsInput(self.output_path.clone()));
        }

        let progress = checkpoint.progress();
        if !progress.is_complete() {
            match self.policy {
                InjectionPolicy::Strict => {
                    return Err(InjectionError::Incomplete {
                        pending: progress.pending + progress.in_progress,
                        failed: progress.failed,
                    });
                }
                InjectionPolicy::BestEffort => warn!(
                    "Writing best-effort output: {} segment(s) keep their source text",
                    progress.total - progress.done
                ),
            }
        }

        info!("Injecting translations into {:?}", self.output_path);
        let mut package = DocxPackage::open(&self.input_file)?;

        // part -> (node -> new text), only for nodes whose text actually changes
        let mut by_part: BTreeMap<&str, BTreeMap<usize, String>> = BTreeMap::new();
        let mut untranslated = 0;
        for segment in &checkpoint.segments {
            match segment.output_text() {
                Some(text) if text != segment.source_text => {
                    by_part
                        .entry(segment.location.part.as_str())
                        .or_default()
                        .insert(segment.location.node, text.to_string());
                }
                Some(_) => {}
                None => untranslated += 1,
            }
        }

        let mut replaced_nodes = 0;
        for (part, replacements) in &by_part {
            let xml = package.part_xml(part)?;
            self.verify_sources(checkpoint, part, xml)?;

            let (rewritten, missing) = replace_text_nodes(xml, replacements);
            if let Some(node) = missing.first() {
                let id = checkpoint
                    .segments
                    .iter()
                    .find(|s| s.location.part == *part && s.location.node == *node)
                    .map(|s| s.id)
                    .unwrap_or_default();
                return Err(InjectionError::LocationMismatch {
                    id,
                    part: part.to_string(),
                    node: *node,
                });
            }

            debug!("Rewriting {} node(s) in {}", replacements.len(), part);
            replaced_nodes += replacements.len();
            package.set_part(part, rewritten.into_bytes())?;
        }

        package.save(&self.output_path)?;

        info!(
            "Wrote {:?} ({} node(s) replaced)",
            self.output_path, replaced_nodes
        );
        Ok(InjectionSummary {
            output_path: self.output_path.clone(),
            replaced_nodes,
            untranslated_segments: untranslated,
        })
    }

    /// Every segment of `part` must still match the node it was extracted from
    fn verify_sources(&self, checkpoint: &Checkpoint, part: &str, xml: &str) -> Result<(), InjectionError> {
        let nodes = scan_text_nodes(xml);
        for segment in checkpoint.segments.iter().filter(|s| s.location.part == part) {
            let matches = nodes
                .get(segment.location.node)
                .is_some_and(|node| node.text == segment.source_text);
            if !matches {
                return Err(InjectionError::LocationMismatch {
                    id: segment.id,
                    part: part.to_string(),
                    node: segment.location.node,
                });
            }
        }
        Ok(())
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
