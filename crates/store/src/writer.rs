//! Inline and large-object writers.

use crate::backend::{FileBackend, LargeObjectTx};
use crate::error::{StoreError, StoreResult};
use crate::table::TableName;
use pgstash_core::SourceFile;
use std::future::Future;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

/// Race a backend step against cancellation.
pub(crate) async fn guarded<T, F>(cancel: &CancellationToken, op: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StoreError::Cancelled),
        result = op => result,
    }
}

/// Convert a byte count to the `size` column type.
pub(crate) fn column_size(bytes: u64) -> StoreResult<i64> {
    i64::try_from(bytes)
        .map_err(|_| StoreError::Internal(format!("file size {bytes} exceeds BIGINT range")))
}

/// Writes file rows through a [`FileBackend`].
#[derive(Clone)]
pub struct FileStore {
    backend: Arc<dyn FileBackend>,
}

impl FileStore {
    pub fn new(backend: Arc<dyn FileBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn FileBackend> {
        &self.backend
    }

    /// Store `content` inline as a single row. The recorded size is the
    /// content length.
    pub async fn write_inline(
        &self,
        table: &TableName,
        filename: &str,
        content: &[u8],
    ) -> StoreResult<i64> {
        let size = column_size(content.len() as u64)?;
        let id = self
            .backend
            .insert_inline(table, filename, size, content)
            .await?;
        tracing::debug!(id, table = %table, filename, size, "Inline row inserted");
        Ok(id)
    }

    /// Stream `source` into a new large object and record it, all in one
    /// transaction.
    ///
    /// Any failure after `BEGIN` and before `COMMIT` rolls the transaction
    /// back; the result is [`StoreError::Aborted`], or
    /// [`StoreError::RollbackFailed`] when the rollback fails as well. A
    /// failed commit is returned as-is. The recorded size is the source's
    /// declared size.
    pub async fn write_large<R>(
        &self,
        table: &TableName,
        source: &mut SourceFile<R>,
        cancel: &CancellationToken,
    ) -> StoreResult<i64>
    where
        R: AsyncRead + Send + Unpin,
    {
        let size = column_size(source.size())?;
        let mut tx = guarded(cancel, self.backend.begin()).await?;

        match write_large_in(tx.as_mut(), table, source, size, cancel).await {
            Ok(id) => {
                // Commit is not raced against cancellation: its outcome must be known.
                tx.commit().await?;
                tracing::debug!(id, table = %table, filename = source.name(), size, "Large object committed");
                Ok(id)
            }
            Err(err) => Err(abort(tx, err).await),
        }
    }
}

async fn write_large_in<R>(
    tx: &mut dyn LargeObjectTx,
    table: &TableName,
    source: &mut SourceFile<R>,
    size: i64,
    cancel: &CancellationToken,
) -> StoreResult<i64>
where
    R: AsyncRead + Send + Unpin,
{
    let oid = guarded(cancel, tx.create_large_object()).await?;
    tracing::debug!(oid = oid.0, "Large object created");

    let declared = source.size();
    let copied = guarded(cancel, tx.append_from_reader(oid, source.reader_mut())).await?;
    if copied != declared {
        tracing::debug!(
            oid = oid.0,
            declared,
            copied,
            "Declared size differs from bytes copied; recording declared size"
        );
    }

    guarded(
        cancel,
        tx.insert_reference(table, source.name(), size, oid),
    )
    .await
}

/// Roll back and fold the rollback outcome into the returned error.
async fn abort(tx: Box<dyn LargeObjectTx>, err: StoreError) -> StoreError {
    match tx.rollback().await {
        Ok(()) => {
            tracing::warn!(error = %err, "Large object write rolled back");
            StoreError::Aborted {
                source: Box::new(err),
            }
        }
        Err(rollback) => {
            tracing::error!(error = %err, rollback_error = %rollback, "Large object rollback failed");
            StoreError::RollbackFailed {
                operation: Box::new(err),
                rollback: Box::new(rollback),
            }
        }
    }
}
