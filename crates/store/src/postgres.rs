//! PostgreSQL-backed file store.

use crate::backend::{Catalog, FileBackend, LargeObjectTx};
use crate::error::{StoreError, StoreResult};
use crate::models::StoredFileRow;
use crate::table::{TableName, UncheckedTableName, quote_identifier};
use async_trait::async_trait;
use pgstash_core::config::PgSslMode;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres, Transaction};
use std::str::FromStr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Chunk size for large-object reads and writes (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// `lo_open` mode flags from `libpq/libpq-fs.h`.
const INV_WRITE: i32 = 0x0002_0000;
const INV_READ: i32 = 0x0004_0000;

const SQL_TABLE_EXISTS: &str = r#"
    SELECT EXISTS(
        SELECT 1
        FROM information_schema.tables
        WHERE table_schema = $1 AND table_name = $2
    )
"#;

fn create_table_sql(table: &str, constraint: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id               BIGSERIAL PRIMARY KEY,
            filename         TEXT NOT NULL,
            size             BIGINT NOT NULL,
            small_content    BYTEA,
            large_content_id OID,
            CONSTRAINT {constraint} CHECK (num_nonnulls(small_content, large_content_id) = 1)
        )
        "#
    )
}

/// PostgreSQL-based file store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> StoreResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        tracing::info!("Connecting to PostgreSQL using connection URL");
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new store from individual connection parameters.
    ///
    /// Unset parameters fall back to the `PG*` environment variables.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: Option<&str>,
        port: Option<u16>,
        username: Option<&str>,
        password: Option<&str>,
        database: Option<&str>,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> StoreResult<Self> {
        let mut opts = PgConnectOptions::new();

        if let Some(host) = host {
            opts = opts.host(host);
        }

        if let Some(port) = port {
            opts = opts.port(port);
        }

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(database) = database {
            opts = opts.database(database);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = opts.get_host(),
            port = opts.get_port(),
            database = opts.get_database().unwrap_or("<default>"),
            username = opts.get_username(),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> StoreResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Create the table if it does not exist, then validate it.
    ///
    /// Only plain identifiers are accepted, since the name has to appear in
    /// DDL before the catalog can vouch for it.
    pub async fn ensure_table(&self, table: UncheckedTableName) -> StoreResult<TableName> {
        let Some(quoted) = table.quoted_for_ddl() else {
            return Err(table.into_error());
        };
        let constraint = quote_identifier(&format!("{}_chk", table.name()));

        sqlx::query(&create_table_sql(&quoted, &constraint))
            .execute(&self.pool)
            .await?;
        tracing::info!(table = %table, "Ensured file table exists");

        table.validate(self).await
    }

    /// Fetch a stored file row by id.
    pub async fn fetch_record(
        &self,
        table: &TableName,
        id: i64,
    ) -> StoreResult<Option<StoredFileRow>> {
        let row = sqlx::query_as::<_, StoredFileRow>(&format!(
            "SELECT id, filename, size, small_content, large_content_id FROM {} WHERE id = $1",
            table.quoted()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Whether a large object with this id exists.
    pub async fn large_object_exists(&self, oid: Oid) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM pg_largeobject_metadata WHERE oid = $1)",
        )
        .bind(oid)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Copy a large object's content into `writer`. Returns the number of
    /// bytes copied.
    pub async fn copy_large_object_to(
        &self,
        oid: Oid,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> StoreResult<u64> {
        // Descriptors only live inside a transaction.
        let mut tx = self.pool.begin().await?;

        let fd: i32 = sqlx::query_scalar("SELECT lo_open($1, $2)")
            .bind(oid)
            .bind(INV_READ)
            .fetch_one(&mut *tx)
            .await?;

        let mut copied = 0u64;
        loop {
            let chunk: Vec<u8> = sqlx::query_scalar("SELECT loread($1, $2)")
                .bind(fd)
                .bind(STREAM_CHUNK_SIZE as i32)
                .fetch_one(&mut *tx)
                .await?;
            if chunk.is_empty() {
                break;
            }
            writer.write_all(&chunk).await?;
            copied += chunk.len() as u64;
        }
        writer.flush().await?;

        let _: i32 = sqlx::query_scalar("SELECT lo_close($1)")
            .bind(fd)
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(copied)
    }
}

#[async_trait]
impl Catalog for PostgresStore {
    async fn table_exists(&self, table: &UncheckedTableName) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(SQL_TABLE_EXISTS)
            .bind(table.schema())
            .bind(table.name())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[async_trait]
impl FileBackend for PostgresStore {
    async fn insert_inline(
        &self,
        table: &TableName,
        filename: &str,
        size: i64,
        content: &[u8],
    ) -> StoreResult<i64> {
        let id: i64 = sqlx::query_scalar(&format!(
            "INSERT INTO {} (filename, size, small_content) VALUES ($1, $2, $3) RETURNING id",
            table.quoted()
        ))
        .bind(filename)
        .bind(size)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn begin(&self) -> StoreResult<Box<dyn LargeObjectTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLargeObjectTx { tx }))
    }
}

/// Large-object transaction on a pooled connection.
///
/// `sqlx::Transaction` rolls back on drop, which covers cancelled or
/// panicking callers.
struct PgLargeObjectTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LargeObjectTx for PgLargeObjectTx {
    async fn create_large_object(&mut self) -> StoreResult<Oid> {
        let oid: Oid = sqlx::query_scalar("SELECT lo_create($1)")
            .bind(Oid(0))
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(oid)
    }

    async fn append_from_reader(
        &mut self,
        oid: Oid,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StoreResult<u64> {
        let fd: i32 = sqlx::query_scalar("SELECT lo_open($1, $2)")
            .bind(oid)
            .bind(INV_WRITE)
            .fetch_one(&mut *self.tx)
            .await?;

        // On error the descriptor is left open; the rollback releases it.
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        let mut copied = 0u64;
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            let written: i32 = sqlx::query_scalar("SELECT lowrite($1, $2)")
                .bind(fd)
                .bind(&buf[..n])
                .fetch_one(&mut *self.tx)
                .await?;
            if written as usize != n {
                return Err(StoreError::Internal(format!(
                    "short large object write: {written} of {n} bytes"
                )));
            }
            copied += n as u64;
        }

        let _: i32 = sqlx::query_scalar("SELECT lo_close($1)")
            .bind(fd)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(copied)
    }

    async fn insert_reference(
        &mut self,
        table: &TableName,
        filename: &str,
        size: i64,
        oid: Oid,
    ) -> StoreResult<i64> {
        let id: i64 = sqlx::query_scalar(&format!(
            "INSERT INTO {} (filename, size, large_content_id) VALUES ($1, $2, $3) RETURNING id",
            table.quoted()
        ))
        .bind(filename)
        .bind(size)
        .bind(oid)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
