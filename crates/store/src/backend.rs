//! Backend traits consumed by the writers.

use crate::error::StoreResult;
use crate::table::{TableName, UncheckedTableName};
use async_trait::async_trait;
use sqlx::postgres::types::Oid;
use tokio::io::AsyncRead;

/// Catalog lookup used by table name validation.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Whether a table with exactly this schema and name exists.
    async fn table_exists(&self, table: &UncheckedTableName) -> StoreResult<bool>;
}

/// Row-level operations the file writers need.
#[async_trait]
pub trait FileBackend: Catalog {
    /// Insert a row with inline content. Returns the new row id.
    async fn insert_inline(
        &self,
        table: &TableName,
        filename: &str,
        size: i64,
        content: &[u8],
    ) -> StoreResult<i64>;

    /// Open a transaction for a large-object write.
    async fn begin(&self) -> StoreResult<Box<dyn LargeObjectTx>>;
}

/// A transaction in which a large object and its metadata row are written.
///
/// Dropping the transaction without calling [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) must roll it back.
#[async_trait]
pub trait LargeObjectTx: Send {
    /// Allocate a new, empty large object.
    async fn create_large_object(&mut self) -> StoreResult<Oid>;

    /// Open the object for writing, copy the reader into it in order, and
    /// close it. Returns the number of bytes copied.
    async fn append_from_reader(
        &mut self,
        oid: Oid,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StoreResult<u64>;

    /// Insert the metadata row referencing the object. Returns the new row id.
    async fn insert_reference(
        &mut self,
        table: &TableName,
        filename: &str,
        size: i64,
        oid: Oid,
    ) -> StoreResult<i64>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
