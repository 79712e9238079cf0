//! Database models mapping to the file table schema.

use pgstash_core::StorageClass;
use sqlx::FromRow;
use sqlx::postgres::types::Oid;

/// One stored file.
///
/// Exactly one of `small_content` and `large_content_id` is set; the table's
/// check constraint enforces it.
#[derive(Debug, Clone, FromRow)]
pub struct StoredFileRow {
    pub id: i64,
    pub filename: String,
    pub size: i64,
    pub small_content: Option<Vec<u8>>,
    pub large_content_id: Option<Oid>,
}

impl StoredFileRow {
    /// Storage class implied by which content column is set.
    pub fn storage_class(&self) -> Option<StorageClass> {
        match (&self.small_content, &self.large_content_id) {
            (Some(_), None) => Some(StorageClass::Inline),
            (None, Some(_)) => Some(StorageClass::LargeObject),
            _ => None,
        }
    }
}
