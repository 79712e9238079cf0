//! Named, sized byte sources.

use crate::error::Result;
use crate::size::ReadLimit;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Filesystem-style metadata for a source stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileMeta {
    /// Name recorded in the `filename` column.
    pub name: String,
    /// Declared size in bytes.
    pub size: u64,
}

impl FileMeta {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
        }
    }
}

/// A single-pass byte stream together with its metadata.
///
/// The declared size is trusted as-is; it is not checked against the number
/// of bytes the reader actually yields.
#[derive(Debug)]
pub struct SourceFile<R> {
    reader: R,
    meta: FileMeta,
}

impl<R> SourceFile<R> {
    pub fn new(reader: R, meta: FileMeta) -> Self {
        Self { reader, meta }
    }

    pub fn meta(&self) -> &FileMeta {
        &self.meta
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Declared size.
    pub fn size(&self) -> u64 {
        self.meta.size
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: AsyncRead + Unpin> SourceFile<R> {
    /// Read the remaining content into memory, stopping after `limit` bytes.
    pub async fn read_limited(&mut self, limit: ReadLimit) -> Result<Vec<u8>> {
        let capacity = self.meta.size.min(limit.bytes());
        let mut content = Vec::with_capacity(usize::try_from(capacity).unwrap_or(0));
        (&mut self.reader)
            .take(limit.bytes())
            .read_to_end(&mut content)
            .await?;
        Ok(content)
    }
}

impl SourceFile<File> {
    /// Open a file for reading, recording its path as the name and its
    /// current length as the declared size.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).await?;
        let metadata = file.metadata().await?;
        if metadata.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            )
            .into());
        }

        Ok(Self::new(
            file,
            FileMeta::new(path.to_string_lossy().into_owned(), metadata.len()),
        ))
    }
}
