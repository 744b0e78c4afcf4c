/*!
 * Word-processing package (OOXML zip container) access.
 *
 * The package is loaded fully into memory; entries keep their original
 * order and compression method so that writing an untouched package
 * reproduces every part byte for byte.
 */

use log::debug;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::DocumentError;
use crate::file_utils::FileManager;

/// Main document part every word-processing package carries
pub const MAIN_DOCUMENT_PART: &str = "word/document.xml";

/// One entry of the zip container
#[derive(Debug, Clone)]
pub struct PackageEntry {
    /// Entry name inside the archive
    pub name: String,
    /// Decompressed content
    pub data: Vec<u8>,
    /// Compression used by the source archive
    pub compression: CompressionMethod,
    /// Whether the entry is a directory record
    pub is_dir: bool,
}

/// In-memory word-processing package
#[derive(Debug, Clone)]
pub struct DocxPackage {
    entries: Vec<PackageEntry>,
}

impl DocxPackage {
    /// Load a package from disk
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut archive = ZipArchive::new(BufReader::new(file))?;
        let mut entries = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data).map_err(|source| DocumentError::Io {
                path: path.to_path_buf(),
                source,
            })?;

            entries.push(PackageEntry {
                name: file.name().to_string(),
                compression: file.compression(),
                is_dir: file.is_dir(),
                data,
            });
        }

        let package = Self { entries };
        if package.entry(MAIN_DOCUMENT_PART).is_none() {
            return Err(DocumentError::MissingPart(MAIN_DOCUMENT_PART.to_string()));
        }

        debug!("Loaded package {:?} with {} entries", path, package.entries.len());
        Ok(package)
    }

    /// All entries in archive order
    pub fn entries(&self) -> &[PackageEntry] {
        &self.entries
    }

    fn entry(&self, name: &str) -> Option<&PackageEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Names of parts that can carry translatable text, in traversal order:
    /// the main document first, then headers, footers, footnotes and endnotes.
    pub fn text_parts(&self) -> Vec<String> {
        let mut secondary: Vec<String> = self
            .entries
            .iter()
            .filter(|e| !e.is_dir && is_secondary_text_part(&e.name))
            .map(|e| e.name.clone())
            .collect();
        secondary.sort();

        let mut parts = vec![MAIN_DOCUMENT_PART.to_string()];
        parts.extend(secondary);
        parts
    }

    /// XML content of a part
    pub fn part_xml(&self, name: &str) -> Result<&str, DocumentError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| DocumentError::MissingPart(name.to_string()))?;
        std::str::from_utf8(&entry.data).map_err(|_| DocumentError::InvalidEncoding(name.to_string()))
    }

    /// Replace the content of an existing part
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) -> Result<(), DocumentError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.name == name)
            .ok_or_else(|| DocumentError::MissingPart(name.to_string()))?;
        entry.data = data;
        Ok(())
    }

    /// Write the package atomically: a temp file in the target directory
    /// is renamed over `path` only once the archive is complete.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), DocumentError> {
        let path = path.as_ref();
        let io_error = |source: std::io::Error| DocumentError::Io {
            path: path.to_path_buf(),
            source,
        };

        let temp = FileManager::temp_file_beside(path).map_err(io_error)?;
        let mut writer = ZipWriter::new(temp);

        for entry in &self.entries {
            let compression = match entry.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = SimpleFileOptions::default().compression_method(compression);

            if entry.is_dir {
                writer.add_directory(entry.name.as_str(), options)?;
            } else {
                writer.start_file(entry.name.as_str(), options)?;
                writer.write_all(&entry.data).map_err(io_error)?;
            }
        }

        let temp = writer.finish()?;
        temp.as_file().sync_all().map_err(io_error)?;
        temp.persist(path).map_err(|e| io_error(e.error))?;

        debug!("Wrote package {:?}", path);
        Ok(())
    }
}

fn is_secondary_text_part(name: &str) -> bool {
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    if file.contains('/') || !file.ends_with(".xml") {
        return false;
    }
    file.starts_with("header")
        || file.starts_with("footer")
        || file == "footnotes.xml"
        || file == "endnotes.xml"
}
