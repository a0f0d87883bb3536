use std::sync::Arc;
use std::time::Duration;

use crate::assets::fetch::Fetcher;
use crate::cache::durable::{DurableCache, content_key};
use crate::cache::memory::MemoryCache;
use crate::foundation::error::LayercastResult;

/// Remote bytes behind the two cache tiers.
///
/// Lookups go memory tier, then durable tier (keyed by a content hash of the URL), then the
/// fetcher. Durable failures never surface; see [`DurableCache::get_or_compute`].
pub struct SourceLoader {
    fetcher: Arc<dyn Fetcher>,
    memory: MemoryCache<Arc<[u8]>>,
    durable: Option<DurableCache>,
}

impl std::fmt::Debug for SourceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceLoader")
            .field("memory", &self.memory)
            .field("durable", &self.durable.is_some())
            .finish_non_exhaustive()
    }
}

impl SourceLoader {
    /// Loader over `fetcher`, with an optional durable tier behind the memory tier.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        durable: Option<DurableCache>,
        memory_capacity: usize,
        memory_ttl: Duration,
    ) -> Self {
        Self {
            fetcher,
            memory: MemoryCache::new(memory_capacity, memory_ttl),
            durable,
        }
    }

    /// Bytes behind `url`.
    pub async fn load(&self, url: &str) -> LayercastResult<Arc<[u8]>> {
        let key = content_key("src", url);
        self.memory
            .get_or_compute_async(&key, || async {
                let bytes = match &self.durable {
                    Some(durable) => {
                        durable
                            .get_or_compute(&key, || self.fetcher.fetch(url))
                            .await?
                    }
                    None => self.fetcher.fetch(url).await?,
                };
                Ok(Arc::from(bytes))
            })
            .await
    }

    /// Drop the memory tier; the durable tier is untouched.
    pub fn clear_memory(&self) {
        self.memory.clear();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layers/source.rs"]
mod tests;
