use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::foundation::error::{LayercastError, LayercastResult};
use crate::foundation::math::content_hash_hex;

/// Per-process sequence that keeps concurrent temp file names apart.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Outcome of a create-if-absent write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    /// This caller created the object.
    Written,
    /// An object already existed under the key; the stored bytes were left untouched.
    AlreadyExists,
}

/// Persistent content-addressed byte store.
///
/// Objects are immutable once written: `put_if_absent` never overwrites, which is what lets
/// concurrent writers race without locks.
pub trait DurableStore: Send + Sync {
    /// Read the object stored under `key`, `None` when absent.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, LayercastResult<Option<Vec<u8>>>>;

    /// Store `bytes` under `key` unless an object already exists.
    fn put_if_absent<'a>(
        &'a self,
        key: &'a str,
        bytes: &'a [u8],
    ) -> BoxFuture<'a, LayercastResult<PutOutcome>>;
}

/// Derive a durable key from arbitrary input (URLs, request descriptions).
pub fn content_key(namespace: &str, input: &str) -> String {
    format!("{namespace}-{}", content_hash_hex(input.as_bytes()))
}

/// `get_or_compute` over a [`DurableStore`] with best-effort persistence.
///
/// Store failures are logged and never propagated: a failed read is a miss, a failed write still
/// returns the freshly computed bytes.
#[derive(Clone)]
pub struct DurableCache {
    store: Arc<dyn DurableStore>,
}

impl std::fmt::Debug for DurableCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableCache").finish_non_exhaustive()
    }
}

impl DurableCache {
    /// Wrap a store.
    pub fn new(store: Arc<dyn DurableStore>) -> Self {
        Self { store }
    }

    /// The wrapped store.
    pub fn store(&self) -> &Arc<dyn DurableStore> {
        &self.store
    }

    /// Return the stored object for `key`, or compute and persist it.
    ///
    /// Only errors from `f` are returned. When a concurrent writer wins the race the computed bytes
    /// are still returned; both sides computed equivalent content for the same key.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, f: F) -> LayercastResult<Vec<u8>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = LayercastResult<Vec<u8>>>,
    {
        match self.store.get(key).await {
            Ok(Some(bytes)) => {
                tracing::debug!(key, len = bytes.len(), "durable cache hit");
                return Ok(bytes);
            }
            Ok(None) => tracing::debug!(key, "durable cache miss"),
            Err(err) => tracing::warn!(key, error = %err, "durable cache read failed, recomputing"),
        }

        let bytes = f().await?;

        match self.store.put_if_absent(key, &bytes).await {
            Ok(PutOutcome::Written) => tracing::debug!(key, len = bytes.len(), "durable cache stored"),
            Ok(PutOutcome::AlreadyExists) => {
                tracing::debug!(key, "durable cache write lost race, keeping existing object")
            }
            Err(err) => tracing::warn!(key, error = %err, "durable cache write failed"),
        }
        Ok(bytes)
    }
}

/// Filesystem-backed store: one file per key under `root`.
///
/// Writes go to a private temp file that is then hard-linked into place, so readers never observe
/// a partial object and the link fails with `AlreadyExists` when another writer got there first.
#[derive(Clone, Debug)]
pub struct FsDurableStore {
    root: PathBuf,
}

impl FsDurableStore {
    /// Store objects under `root` (created on first write).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let safe = !key.is_empty()
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
            && !key.starts_with('.');
        if safe {
            self.root.join(key)
        } else {
            self.root.join(content_hash_hex(key.as_bytes()))
        }
    }

    async fn read(&self, key: &str) -> LayercastResult<Option<Vec<u8>>> {
        let path = self.object_path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(LayercastError::cache(format!(
                "read {}: {err}",
                path.display()
            ))),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> LayercastResult<PutOutcome> {
        let path = self.object_path(key);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(PutOutcome::AlreadyExists);
        }
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("create durable cache dir {}", self.root.display()))?;

        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = self.root.join(format!(
            ".tmp-{}-{seq}-{}",
            std::process::id(),
            content_hash_hex(key.as_bytes())
        ));
        tokio::fs::write(&tmp, bytes)
            .await
            .with_context(|| format!("write temp object {}", tmp.display()))?;

        let linked = tokio::fs::hard_link(&tmp, &path).await;
        if let Err(err) = tokio::fs::remove_file(&tmp).await {
            tracing::debug!(tmp = %tmp.display(), error = %err, "temp object not removed");
        }
        match linked {
            Ok(()) => Ok(PutOutcome::Written),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Ok(PutOutcome::AlreadyExists)
            }
            Err(err) => Err(LayercastError::cache(format!(
                "publish {}: {err}",
                path.display()
            ))),
        }
    }
}

impl DurableStore for FsDurableStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, LayercastResult<Option<Vec<u8>>>> {
        self.read(key).boxed()
    }

    fn put_if_absent<'a>(
        &'a self,
        key: &'a str,
        bytes: &'a [u8],
    ) -> BoxFuture<'a, LayercastResult<PutOutcome>> {
        self.write(key, bytes).boxed()
    }
}

/// Process-local store with the same create-if-absent contract, for tests and single-node use.
#[derive(Debug, Default)]
pub struct InMemoryDurableStore {
    objects: Mutex<HashMap<String, Arc<Vec<u8>>>>,
}

impl InMemoryDurableStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    /// Return `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DurableStore for InMemoryDurableStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, LayercastResult<Option<Vec<u8>>>> {
        let found = self.objects.lock().get(key).map(|v| v.as_ref().clone());
        futures::future::ready(Ok(found)).boxed()
    }

    fn put_if_absent<'a>(
        &'a self,
        key: &'a str,
        bytes: &'a [u8],
    ) -> BoxFuture<'a, LayercastResult<PutOutcome>> {
        use std::collections::hash_map::Entry;

        let outcome = match self.objects.lock().entry(key.to_owned()) {
            Entry::Occupied(_) => PutOutcome::AlreadyExists,
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(bytes.to_vec()));
                PutOutcome::Written
            }
        };
        futures::future::ready(Ok(outcome)).boxed()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/durable.rs"]
mod tests;
