use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::foundation::error::{LayercastError, LayercastResult};

/// Source of raw font binaries, addressed by catalog-relative path.
pub trait FontStorage: Send + Sync {
    /// Read the whole font file at `path`.
    fn read_binary(&self, path: &str) -> LayercastResult<Vec<u8>>;
}

/// Reads fonts from a directory on disk (`./fonts` by default).
#[derive(Clone, Debug)]
pub struct FsFontStorage {
    root: PathBuf,
}

impl Default for FsFontStorage {
    fn default() -> Self {
        Self::new("fonts")
    }
}

impl FsFontStorage {
    /// Resolve font paths relative to `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FontStorage for FsFontStorage {
    fn read_binary(&self, path: &str) -> LayercastResult<Vec<u8>> {
        let rel = normalize_rel_path(path)?;
        let full = self.root.join(rel);
        let bytes = std::fs::read(&full).with_context(|| format!("read font {}", full.display()))?;
        Ok(bytes)
    }
}

/// Fonts held in memory, keyed by path. Handy for embedding and tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryFontStorage {
    files: HashMap<String, Arc<Vec<u8>>>,
}

impl InMemoryFontStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a file.
    pub fn with_file(mut self, path: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.files.insert(path.into(), Arc::new(bytes));
        self
    }
}

impl FontStorage for InMemoryFontStorage {
    fn read_binary(&self, path: &str) -> LayercastResult<Vec<u8>> {
        self.files
            .get(path)
            .map(|b| b.as_ref().clone())
            .ok_or_else(|| LayercastError::evaluation(format!("font file \"{path}\" not found")))
    }
}

/// Normalize and validate storage-relative font paths.
///
/// The normalized result uses `/` separators, removes `.` segments, and rejects absolute paths or
/// parent traversals (`..`).
pub(crate) fn normalize_rel_path(source: &str) -> LayercastResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(LayercastError::validation("font paths must be relative"));
    }
    if s.is_empty() {
        return Err(LayercastError::validation("font path must be non-empty"));
    }

    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(LayercastError::validation("font paths must not contain '..'"));
        }
        out.push(part);
    }

    if out.is_empty() {
        return Err(LayercastError::validation("font path must contain a file name"));
    }

    Ok(out.join("/"))
}

#[cfg(test)]
#[path = "../../tests/unit/fonts/storage.rs"]
mod tests;
