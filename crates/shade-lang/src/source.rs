//! Where shader source text comes from.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;

use async_trait::async_trait;
use shade_core::{ShadeError, ShadeResult};
use tokio::io::{AsyncBufRead, BufReader};

/// A line-readable stream of shader source.
pub type SourceReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// Opens shader sources by virtual path.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn open(&self, path: &str) -> ShadeResult<SourceReader>;
}

/// Normalizes a virtual path so equivalent spellings share one cache entry.
///
/// Strips a `local://` scheme, converts backslashes, drops empty and `.`
/// segments and resolves `..` against the preceding segment.
pub fn normalize_path(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let path = path.strip_prefix("local://").unwrap_or(path.as_str());

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// In-memory sources, keyed by normalized path.
#[derive(Debug, Clone, Default)]
pub struct MemorySources {
    files: HashMap<String, String>,
}

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: &str, source: impl Into<String>) {
        self.files.insert(normalize_path(path), source.into());
    }

    pub fn with(mut self, path: &str, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }
}

#[async_trait]
impl SourceProvider for MemorySources {
    async fn open(&self, path: &str) -> ShadeResult<SourceReader> {
        let source = self
            .files
            .get(&normalize_path(path))
            .ok_or_else(|| ShadeError::include("shader source not found", path))?;

        Ok(Box::new(Cursor::new(source.clone().into_bytes())))
    }
}

/// Sources read from a directory on disk.
#[derive(Debug, Clone)]
pub struct FileSystemSources {
    root: PathBuf,
}

impl FileSystemSources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SourceProvider for FileSystemSources {
    async fn open(&self, path: &str) -> ShadeResult<SourceReader> {
        let full_path = self.root.join(normalize_path(path));

        match tokio::fs::File::open(&full_path).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ShadeError::include(
                "shader source not found",
                full_path.display().to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }
}
