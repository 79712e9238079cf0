//! In-memory backend with failure injection.
//!
//! Large objects are stored outside the transaction: a rolled-back write
//! leaves its object behind as an orphan while the metadata row is
//! discarded.

use async_trait::async_trait;
use pgstash_store::{
    Catalog, FileBackend, LargeObjectTx, Oid, StoreError, StoreResult, TableName,
    UncheckedTableName,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

/// A row as the backend stored it.
#[derive(Clone, Debug)]
pub struct MemoryRow {
    pub table: String,
    pub id: i64,
    pub filename: String,
    pub size: i64,
    pub small_content: Option<Vec<u8>>,
    pub large_content_id: Option<Oid>,
}

/// Which backend steps should fail.
#[derive(Clone, Default)]
pub struct Failures {
    pub insert_inline: bool,
    pub begin: bool,
    pub create: bool,
    pub append: bool,
    pub insert_reference: bool,
    pub commit: bool,
    pub rollback: bool,
    /// Cancel this token from inside the append step, then never finish it.
    pub cancel_during_append: Option<CancellationToken>,
    /// Persist the inline row, then cancel this token before replying.
    pub cancel_after_inline_insert: Option<CancellationToken>,
}

#[derive(Default)]
struct State {
    tables: HashSet<(String, String)>,
    rows: Vec<MemoryRow>,
    objects: HashMap<u32, Vec<u8>>,
    next_id: i64,
    next_oid: u32,
    commits: usize,
    rollbacks: usize,
}

#[derive(Default)]
struct Inner {
    state: Mutex<State>,
    failures: Mutex<Failures>,
    calls: AtomicUsize,
}

impl Inner {
    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn failures(&self) -> Failures {
        self.failures.lock().unwrap().clone()
    }
}

fn injected(step: &str) -> StoreError {
    StoreError::Internal(format!("injected {step} failure"))
}

/// In-memory [`FileBackend`] for routing and transaction tests.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

#[allow(dead_code)]
impl MemoryBackend {
    /// Backend whose catalog contains `public.<table>`.
    pub fn with_table(table: &str) -> Self {
        let backend = Self::default();
        backend
            .inner
            .state
            .lock()
            .unwrap()
            .tables
            .insert(("public".to_string(), table.to_string()));
        backend
    }

    pub fn set_failures(&self, failures: Failures) {
        *self.inner.failures.lock().unwrap() = failures;
    }

    /// Validate `public.<table>` against this backend's catalog.
    pub async fn checked(&self, table: &str) -> TableName {
        UncheckedTableName::new(table)
            .validate(self)
            .await
            .expect("table should exist in the memory catalog")
    }

    /// Number of backend calls made so far.
    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn rows(&self) -> Vec<MemoryRow> {
        self.inner.state.lock().unwrap().rows.clone()
    }

    pub fn row(&self, id: i64) -> Option<MemoryRow> {
        self.rows().into_iter().find(|row| row.id == id)
    }

    pub fn object(&self, oid: Oid) -> Option<Vec<u8>> {
        self.inner.state.lock().unwrap().objects.get(&oid.0).cloned()
    }

    pub fn object_ids(&self) -> Vec<Oid> {
        let mut ids: Vec<u32> = self
            .inner
            .state
            .lock()
            .unwrap()
            .objects
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(Oid).collect()
    }

    pub fn commits(&self) -> usize {
        self.inner.state.lock().unwrap().commits
    }

    pub fn rollbacks(&self) -> usize {
        self.inner.state.lock().unwrap().rollbacks
    }
}

#[async_trait]
impl Catalog for MemoryBackend {
    async fn table_exists(&self, table: &UncheckedTableName) -> StoreResult<bool> {
        self.inner.record_call();
        let state = self.inner.state.lock().unwrap();
        Ok(state
            .tables
            .contains(&(table.schema().to_string(), table.name().to_string())))
    }
}

#[async_trait]
impl FileBackend for MemoryBackend {
    async fn insert_inline(
        &self,
        table: &TableName,
        filename: &str,
        size: i64,
        content: &[u8],
    ) -> StoreResult<i64> {
        self.inner.record_call();
        let failures = self.inner.failures();
        if failures.insert_inline {
            return Err(injected("insert_inline"));
        }
        let id = {
            let mut state = self.inner.state.lock().unwrap();
            state.next_id += 1;
            let id = state.next_id;
            state.rows.push(MemoryRow {
                table: table.name().to_string(),
                id,
                filename: filename.to_string(),
                size,
                small_content: Some(content.to_vec()),
                large_content_id: None,
            });
            id
        };
        if let Some(token) = failures.cancel_after_inline_insert {
            token.cancel();
            tokio::task::yield_now().await;
        }
        Ok(id)
    }

    async fn begin(&self) -> StoreResult<Box<dyn LargeObjectTx>> {
        self.inner.record_call();
        if self.inner.failures().begin {
            return Err(injected("begin"));
        }
        Ok(Box::new(MemoryTx {
            inner: self.inner.clone(),
            pending: Vec::new(),
        }))
    }
}

struct MemoryTx {
    inner: Arc<Inner>,
    pending: Vec<MemoryRow>,
}

#[async_trait]
impl LargeObjectTx for MemoryTx {
    async fn create_large_object(&mut self) -> StoreResult<Oid> {
        self.inner.record_call();
        if self.inner.failures().create {
            return Err(injected("create"));
        }
        let mut state = self.inner.state.lock().unwrap();
        state.next_oid += 1;
        let oid = 16384 + state.next_oid;
        state.objects.insert(oid, Vec::new());
        Ok(Oid(oid))
    }

    async fn append_from_reader(
        &mut self,
        oid: Oid,
        reader: &mut (dyn AsyncRead + Send + Unpin),
    ) -> StoreResult<u64> {
        self.inner.record_call();
        let failures = self.inner.failures();
        if let Some(token) = failures.cancel_during_append {
            token.cancel();
            std::future::pending::<()>().await;
        }
        if failures.append {
            return Err(injected("append"));
        }

        let mut content = Vec::new();
        reader.read_to_end(&mut content).await?;
        let copied = content.len() as u64;

        let mut state = self.inner.state.lock().unwrap();
        state
            .objects
            .get_mut(&oid.0)
            .ok_or_else(|| StoreError::Internal(format!("no large object {}", oid.0)))?
            .extend_from_slice(&content);
        Ok(copied)
    }

    async fn insert_reference(
        &mut self,
        table: &TableName,
        filename: &str,
        size: i64,
        oid: Oid,
    ) -> StoreResult<i64> {
        self.inner.record_call();
        if self.inner.failures().insert_reference {
            return Err(injected("insert_reference"));
        }
        let mut state = self.inner.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        self.pending.push(MemoryRow {
            table: table.name().to_string(),
            id,
            filename: filename.to_string(),
            size,
            small_content: None,
            large_content_id: Some(oid),
        });
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.inner.record_call();
        if self.inner.failures().commit {
            return Err(injected("commit"));
        }
        let this = *self;
        let mut state = this.inner.state.lock().unwrap();
        state.commits += 1;
        state.rows.extend(this.pending);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.inner.record_call();
        let mut state = self.inner.state.lock().unwrap();
        state.rollbacks += 1;
        if self.inner.failures().rollback {
            return Err(injected("rollback"));
        }
        Ok(())
    }
}
