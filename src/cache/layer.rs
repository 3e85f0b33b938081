//! Cache layer that applies a caching strategy around network fetching.

use color_eyre::Result;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::storage::CacheStorage;
use super::types::{CacheResult, CachedEntry, RequestKey, ResponseSnapshot, Strategy};

/// Cache layer bound to a single bucket.
///
/// Storage failures never fail a fetch: they are logged and the request is
/// served as if the cache had missed.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  bucket: String,
}

impl<S: CacheStorage> CacheLayer<S> {
  pub fn new(storage: Arc<S>, bucket: impl Into<String>) -> Self {
    Self {
      storage,
      bucket: bucket.into(),
    }
  }

  pub fn bucket(&self) -> &str {
    &self.bucket
  }

  pub fn storage(&self) -> &Arc<S> {
    &self.storage
  }

  /// Fetch with the network-first strategy.
  ///
  /// 1. Fetch from network; on a response, store it and return it
  /// 2. On network failure, return the stored copy (offline mode)
  /// 3. With nothing stored, the network error propagates
  pub async fn network_first<F, Fut>(
    &self,
    key: &RequestKey,
    fetcher: F,
  ) -> Result<CacheResult<ResponseSnapshot>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ResponseSnapshot>>,
  {
    match fetcher().await {
      Ok(response) => {
        self.store(key, &response, Strategy::NetworkFirst);
        Ok(CacheResult::from_network(response))
      }
      Err(err) => match self.lookup(key) {
        Some(cached) => {
          debug!(url = %key.url, error = %err, "network failed, serving cached copy");
          Ok(CacheResult::offline(cached.response, cached.cached_at))
        }
        None => Err(err),
      },
    }
  }

  /// Fetch with the cache-first strategy.
  ///
  /// 1. Return the stored copy without touching the network
  /// 2. On a miss, fetch, store and return
  pub async fn cache_first<F, Fut>(
    &self,
    key: &RequestKey,
    fetcher: F,
  ) -> Result<CacheResult<ResponseSnapshot>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ResponseSnapshot>>,
  {
    if let Some(cached) = self.lookup(key) {
      return Ok(CacheResult::from_cache(cached.response, cached.cached_at));
    }

    let response = fetcher().await?;
    self.store(key, &response, Strategy::CacheFirst);
    Ok(CacheResult::from_network(response))
  }

  /// Store a response unconditionally, reporting storage errors.
  pub fn put(
    &self,
    key: &RequestKey,
    response: &ResponseSnapshot,
    strategy: Strategy,
  ) -> Result<()> {
    let entry = CachedEntry::new(key.clone(), response.clone(), strategy);
    self.storage.put(&self.bucket, &entry)
  }

  fn lookup(&self, key: &RequestKey) -> Option<CachedEntry> {
    match self.storage.get(&self.bucket, key) {
      Ok(found) => found,
      Err(e) => {
        warn!(url = %key.url, error = %e, "cache read failed");
        None
      }
    }
  }

  fn store(&self, key: &RequestKey, response: &ResponseSnapshot, strategy: Strategy) {
    if !response.is_success() {
      debug!(url = %key.url, status = response.status, "not caching unsuccessful response");
      return;
    }
    if let Err(e) = self.put(key, response, strategy) {
      warn!(url = %key.url, error = %e, "cache write failed");
    }
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      bucket: self.bucket.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, MemoryStorage};
  use color_eyre::eyre::eyre;
  use std::cell::Cell;

  fn key(url: &str) -> RequestKey {
    RequestKey {
      method: "GET".to_string(),
      url: url.to_string(),
    }
  }

  fn layer() -> CacheLayer<MemoryStorage> {
    CacheLayer::new(Arc::new(MemoryStorage::new()), "site-v1")
  }

  #[tokio::test]
  async fn test_network_first_prefers_network_and_updates_cache() {
    let layer = layer();
    let k = key("https://x/index.html");
    layer
      .put(&k, &ResponseSnapshot::new(200, "stale"), Strategy::NetworkFirst)
      .unwrap();

    let result = layer
      .network_first(&k, || async { Ok(ResponseSnapshot::new(200, "fresh")) })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.data.body, b"fresh");
    let stored = layer.storage().get("site-v1", &k).unwrap().unwrap();
    assert_eq!(stored.response.body, b"fresh");
  }

  #[tokio::test]
  async fn test_network_first_falls_back_to_cache() {
    let layer = layer();
    let k = key("https://x/app.js");
    layer
      .put(&k, &ResponseSnapshot::new(200, "cached"), Strategy::NetworkFirst)
      .unwrap();

    let result = layer
      .network_first(&k, || async { Err(eyre!("offline")) })
      .await
      .unwrap();

    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data.body, b"cached");
    assert!(result.cached_at.is_some());
  }

  #[tokio::test]
  async fn test_network_first_without_cache_propagates() {
    let layer = layer();
    let result = layer
      .network_first(&key("https://x/app.js"), || async { Err(eyre!("offline")) })
      .await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_cache_first_hit_skips_network() {
    let layer = layer();
    let k = key("https://x/logo.png");
    let stored = ResponseSnapshot::new(200, vec![1u8, 2, 3]);
    layer.put(&k, &stored, Strategy::CacheFirst).unwrap();

    let called = Cell::new(false);
    let result = layer
      .cache_first(&k, || {
        called.set(true);
        async { Ok(ResponseSnapshot::new(200, "network")) }
      })
      .await
      .unwrap();

    assert!(!called.get());
    assert_eq!(result.source, CacheSource::Cache);
    assert_eq!(result.data, stored);
  }

  #[tokio::test]
  async fn test_cache_first_miss_fetches_and_stores() {
    let layer = layer();
    let k = key("https://x/logo.png");

    let first = layer
      .cache_first(&k, || async { Ok(ResponseSnapshot::new(200, "png")) })
      .await
      .unwrap();
    assert_eq!(first.source, CacheSource::Network);

    let second = layer
      .cache_first(&k, || async { Err(eyre!("should not be called")) })
      .await
      .unwrap();
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(second.data.body, b"png");
  }

  #[tokio::test]
  async fn test_unsuccessful_responses_are_returned_but_not_stored() {
    let layer = layer();
    let k = key("https://x/missing.png");

    let result = layer
      .cache_first(&k, || async { Ok(ResponseSnapshot::new(404, "nope")) })
      .await
      .unwrap();

    assert_eq!(result.data.status, 404);
    assert!(layer.storage().get("site-v1", &k).unwrap().is_none());
  }
}
