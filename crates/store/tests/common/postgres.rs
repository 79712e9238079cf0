//! PostgreSQL test utilities.

use pgstash_store::{PostgresStore, StoreError, StoreResult};
use std::sync::Arc;
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;

/// Stable prefix for Docker/container startup failures in Postgres test setup.
/// Tests use this marker to decide whether to skip due to unavailable Docker.
pub const POSTGRES_CONTAINER_START_ERR_PREFIX: &str = "postgres-container-start:";

/// PostgreSQL store wrapper that manages a testcontainer.
#[allow(dead_code)]
pub struct PostgresTestStore {
    pub store: Arc<PostgresStore>,
    _container: ContainerAsync<Postgres>,
}

#[allow(dead_code)]
impl PostgresTestStore {
    /// Create a new PostgreSQL test store with a testcontainer.
    pub async fn new() -> StoreResult<Self> {
        let container = Postgres::default()
            .with_tag("15-alpine")
            .start()
            .await
            .map_err(|e| {
                StoreError::Internal(format!(
                    "{} Failed to start PostgreSQL container: {e}",
                    POSTGRES_CONTAINER_START_ERR_PREFIX
                ))
            })?;

        let host = container.get_host().await.expect("Failed to get host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get port");

        // Default credentials from testcontainers-modules postgres
        let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

        let store = PostgresStore::from_url(&url, 5, None).await?;

        Ok(Self {
            store: Arc::new(store),
            _container: container,
        })
    }

    pub fn store(&self) -> Arc<PostgresStore> {
        self.store.clone()
    }
}

/// Try to create a PostgreSQL test store, skipping if Docker is unavailable
/// or SKIP_POSTGRES_TESTS is set.
///
/// Only container-start failures (Docker unavailable) cause a skip.
/// Connection errors still panic so real regressions are not silently
/// swallowed.
#[allow(dead_code)]
pub async fn postgres_or_skip() -> Option<PostgresTestStore> {
    if std::env::var("SKIP_POSTGRES_TESTS").is_ok() {
        return None;
    }
    match PostgresTestStore::new().await {
        Ok(store) => Some(store),
        Err(err) => {
            let msg = err.to_string();
            if msg.contains(POSTGRES_CONTAINER_START_ERR_PREFIX) {
                eprintln!("Skipping PostgreSQL test (Docker unavailable): {msg}");
                None
            } else {
                panic!("PostgreSQL test setup failed: {msg}");
            }
        }
    }
}
