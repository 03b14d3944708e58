//! Input document discovery and decoding.

use std::path::{Path, PathBuf};

use crate::error::AnalystError;

/// Plain-text documents (`*.txt`) directly inside `dir`, sorted by path.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, AnalystError> {
    if !dir.is_dir() {
        return Err(AnalystError::NoDocuments(dir.display().to_string()));
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    files.sort();
    Ok(files)
}

/// Reads a document as UTF-8, replacing undecodable bytes instead of failing.
pub fn read_document(path: &Path) -> Result<String, AnalystError> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// File stem used to name the document's output file.
pub fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}
