//! Size-routed file saving.

use crate::error::{StoreError, StoreResult};
use crate::table::TableName;
use crate::writer::{FileStore, guarded};
use pgstash_core::{ReadLimit, SizeThreshold, SourceFile, StorageClass};
use std::path::Path;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Outcome of a successful save.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SavedFile {
    /// Surrogate key of the inserted row.
    pub id: i64,
    /// Where the content was stored.
    pub class: StorageClass,
    /// Size recorded in the row.
    pub size: u64,
}

/// Saves files into one table, inline or as large objects depending on size.
#[derive(Clone)]
pub struct FileSaver {
    store: FileStore,
    table: TableName,
    threshold: SizeThreshold,
    limit: ReadLimit,
}

impl FileSaver {
    /// Create a saver.
    ///
    /// A `limit` below `threshold` is not rejected here; every call to
    /// [`save`](Self::save) then fails with [`StoreError::InvalidLimit`]
    /// without touching the backend.
    pub fn new(
        store: FileStore,
        table: TableName,
        threshold: SizeThreshold,
        limit: ReadLimit,
    ) -> Self {
        if !limit.covers(threshold) {
            tracing::warn!(
                limit = limit.bytes(),
                threshold = threshold.bytes(),
                "Read limit is below the size threshold; every save will fail"
            );
        }
        Self {
            store,
            table,
            threshold,
            limit,
        }
    }

    /// Create a saver with the default 1 MiB threshold and 16 MiB limit.
    pub fn with_defaults(store: FileStore, table: TableName) -> Self {
        Self::new(store, table, SizeThreshold::default(), ReadLimit::default())
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn threshold(&self) -> SizeThreshold {
        self.threshold
    }

    pub fn limit(&self) -> ReadLimit {
        self.limit
    }

    /// Save a source stream.
    ///
    /// Files up to the threshold are read into memory (never more than the
    /// read limit) and inserted inline. Larger files are streamed into a
    /// large object without any read limit.
    #[instrument(skip_all, fields(file = %source.name(), size = source.size(), table = %self.table))]
    pub async fn save<R>(
        &self,
        source: &mut SourceFile<R>,
        cancel: &CancellationToken,
    ) -> StoreResult<SavedFile>
    where
        R: AsyncRead + Send + Unpin,
    {
        if !self.limit.covers(self.threshold) {
            return Err(StoreError::InvalidLimit {
                limit: self.limit.bytes(),
                required: self.threshold.bytes(),
            });
        }

        let class = self.threshold.classify(source.size());
        tracing::debug!(%class, threshold = self.threshold.bytes(), "Routing file");

        let saved = match class {
            StorageClass::LargeObject => {
                let id = self.store.write_large(&self.table, source, cancel).await?;
                SavedFile {
                    id,
                    class,
                    size: source.size(),
                }
            }
            StorageClass::Inline => {
                // The limit covers the threshold, so it also covers every inline size.
                let limit = self.limit;
                let content = guarded(cancel, async {
                    source.read_limited(limit).await.map_err(StoreError::from)
                })
                .await?;
                // A single autocommit INSERT: once sent, its outcome must be known.
                let id = self
                    .store
                    .write_inline(&self.table, source.name(), &content)
                    .await?;
                SavedFile {
                    id,
                    class,
                    size: content.len() as u64,
                }
            }
        };

        tracing::info!(id = saved.id, class = %saved.class, "File saved");
        Ok(saved)
    }

    /// Open the file at `path`, save it, and close it again whatever the
    /// outcome.
    pub async fn save_path(
        &self,
        path: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> StoreResult<SavedFile> {
        let mut source = SourceFile::open(path).await?;
        self.save(&mut source, cancel).await
    }
}
