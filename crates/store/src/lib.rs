//! Size-routed file storage for PostgreSQL.
//!
//! Files up to a configured threshold are stored inline in a `bytea`
//! column; larger files are streamed into a large object that the row
//! references by `oid`. Large-object writes run in a single transaction so
//! that the object and its row are committed together or not at all.
//!
//! - [`table`]: checked and unchecked table names
//! - [`writer`]: inline and large-object writers
//! - [`saver`]: the size-routing entry point
//! - [`postgres`]: the PostgreSQL backend

pub mod backend;
pub mod error;
pub mod models;
pub mod postgres;
pub mod saver;
pub mod table;
pub mod writer;

pub use backend::{Catalog, FileBackend, LargeObjectTx};
pub use error::{StoreError, StoreResult};
pub use models::StoredFileRow;
pub use postgres::PostgresStore;
pub use saver::{FileSaver, SavedFile};
pub use sqlx::postgres::types::Oid;
pub use table::{TableName, UncheckedTableName};
pub use writer::FileStore;

use pgstash_core::config::{DatabaseConfig, StorageConfig};
use std::sync::Arc;

/// Connect to PostgreSQL from configuration.
pub async fn from_config(config: &DatabaseConfig) -> StoreResult<PostgresStore> {
    config.validate().map_err(StoreError::Config)?;

    if let Some(url) = &config.url {
        // URL takes precedence over individual fields
        PostgresStore::from_url(url, config.max_connections, config.statement_timeout_ms).await
    } else {
        PostgresStore::from_params(
            config.host.as_deref(),
            config.port,
            config.username.as_deref(),
            config.password.as_deref(),
            config.database.as_deref(),
            config.ssl_mode,
            config.max_connections,
            config.statement_timeout_ms,
        )
        .await
    }
}

/// Build a file saver for the configured table, creating the table first if
/// configured to.
///
/// A read limit below the size threshold is rejected before the database is
/// touched.
pub async fn saver_from_config(
    store: Arc<PostgresStore>,
    config: &StorageConfig,
) -> StoreResult<FileSaver> {
    config.validate().map_err(StoreError::Config)?;
    if !config.read_limit.covers(config.size_threshold) {
        return Err(StoreError::InvalidLimit {
            limit: config.read_limit.bytes(),
            required: config.size_threshold.bytes(),
        });
    }

    let unchecked = UncheckedTableName::with_schema(&config.schema, &config.table);
    let table = if config.create_table {
        store.ensure_table(unchecked).await?
    } else {
        unchecked.validate(store.as_ref()).await?
    };

    Ok(FileSaver::new(
        FileStore::new(store),
        table,
        config.size_threshold,
        config.read_limit,
    ))
}
