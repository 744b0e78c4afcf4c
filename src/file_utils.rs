use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

// @module: File and directory utilities

/// Suffix of checkpoint files derived from an input name
pub const CHECKPOINT_SUFFIX: &str = "_checkpoint.json";

/// Suffix of translated documents derived from an input name
pub const TRANSLATED_SUFFIX: &str = "_translated";

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> std::io::Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Resolve a possibly relative directory against the current directory
    pub fn absolutize<P: AsRef<Path>>(path: P) -> std::io::Result<PathBuf> {
        let path = path.as_ref();
        if path.is_absolute() {
            Ok(path.to_path_buf())
        } else {
            Ok(std::env::current_dir()?.join(path))
        }
    }

    fn file_stem<P: AsRef<Path>>(input_file: P) -> String {
        input_file
            .as_ref()
            .file_stem()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string()
    }

    // @generates: Checkpoint path for an input document
    pub fn checkpoint_path<P1: AsRef<Path>, P2: AsRef<Path>>(input_file: P1, output_dir: P2) -> PathBuf {
        output_dir
            .as_ref()
            .join(format!("{}{}", Self::file_stem(input_file), CHECKPOINT_SUFFIX))
    }

    // @generates: Output path for a translated document, keeping the input extension
    pub fn translated_path<P1: AsRef<Path>, P2: AsRef<Path>>(input_file: P1, output_dir: P2) -> PathBuf {
        let input_file = input_file.as_ref();
        let extension = input_file
            .extension()
            .map(|ext| ext.to_string_lossy().to_string())
            .unwrap_or_else(|| "docx".to_string());

        output_dir.as_ref().join(format!(
            "{}{}.{}",
            Self::file_stem(input_file),
            TRANSLATED_SUFFIX,
            extension
        ))
    }

    /// Find files with a specific extension in a directory
    pub fn find_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();
        let extension = extension.trim_start_matches('.');

        for entry in WalkDir::new(dir.as_ref()).follow_links(true).sort_by_file_name() {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() {
                if let Some(ext) = path.extension() {
                    if ext.to_string_lossy().eq_ignore_ascii_case(extension) {
                        result.push(path.to_path_buf());
                    }
                }
            }
        }

        Ok(result)
    }

    /// Whether a file name looks like output produced by a previous run
    pub fn is_translated_output<P: AsRef<Path>>(path: P) -> bool {
        Self::file_stem(path).ends_with(TRANSLATED_SUFFIX)
    }

    /// SHA-256 of a file, hex encoded
    pub fn hash_file<P: AsRef<Path>>(path: P) -> std::io::Result<String> {
        let mut file = fs::File::open(path.as_ref())?;
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; 8192];

        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(hasher
            .finalize()
            .iter()
            .map(|byte| format!("{:02x}", byte))
            .collect())
    }

    /// Create a temp file next to `path`, so the final rename stays on one filesystem
    pub fn temp_file_beside<P: AsRef<Path>>(path: P) -> std::io::Result<NamedTempFile> {
        let parent = match path.as_ref().parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir(&parent)?;
        NamedTempFile::new_in(parent)
    }

    /// Write bytes to `path` through a temp file and an atomic rename
    pub fn write_atomic<P: AsRef<Path>>(path: P, content: &[u8]) -> std::io::Result<()> {
        let path = path.as_ref();
        let mut temp = Self::temp_file_beside(path)?;
        temp.write_all(content)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}
