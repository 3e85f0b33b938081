//! Core types for the offline cache: request identity, response snapshots and
//! the result wrapper returned by the caching strategies.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: Url,
}

impl Request {
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
    }
  }

  /// Cache identity of the request. The fragment never reaches the server
  /// and is not part of the key.
  pub fn key(&self) -> RequestKey {
    let mut url = self.url.clone();
    url.set_fragment(None);
    RequestKey {
      method: self.method.as_str().to_string(),
      url: url.to_string(),
    }
  }
}

/// Identity of a cached request (method + URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
  pub method: String,
  pub url: String,
}

impl RequestKey {
  /// Stable, fixed-length storage key.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_bytes());
    hasher.update(b" ");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// Snapshot of a network response (status, headers and full body).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl ResponseSnapshot {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  /// 2xx status.
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// Caching strategy applied to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
  /// Prefer the network, fall back to cache when offline
  NetworkFirst,
  /// Prefer the cache, fetch only on a miss
  CacheFirst,
}

impl Strategy {
  pub fn as_str(&self) -> &'static str {
    match self {
      Strategy::NetworkFirst => "network-first",
      Strategy::CacheFirst => "cache-first",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "network-first" => Some(Strategy::NetworkFirst),
      "cache-first" => Some(Strategy::CacheFirst),
      _ => None,
    }
  }
}

impl std::fmt::Display for Strategy {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// How far a bucket has progressed through the controller lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BucketStatus {
  /// Created, seeds not (fully) stored
  #[default]
  Open,
  /// Every seed was fetched and stored
  Installed,
  /// Activated and serving intercepted requests
  Active,
}

impl BucketStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      BucketStatus::Open => "open",
      BucketStatus::Installed => "installed",
      BucketStatus::Active => "active",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "open" => Some(BucketStatus::Open),
      "installed" => Some(BucketStatus::Installed),
      "active" => Some(BucketStatus::Active),
      _ => None,
    }
  }
}

impl std::fmt::Display for BucketStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A stored (request, response, strategy) tuple.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  pub key: RequestKey,
  pub response: ResponseSnapshot,
  pub strategy: Strategy,
  pub cached_at: DateTime<Utc>,
}

impl CachedEntry {
  pub fn new(key: RequestKey, response: ResponseSnapshot, strategy: Strategy) -> Self {
    Self {
      key,
      response,
      strategy,
      cached_at: Utc::now(),
    }
  }
}

/// Lightweight listing row for a cached entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySummary {
  pub method: String,
  pub url: String,
  pub status: u16,
  pub size: usize,
  pub strategy: Strategy,
  pub cached_at: DateTime<Utc>,
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }

  /// Network unavailable, serving a stored copy.
  pub fn offline(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at: Some(cached_at),
    }
  }

  /// Request was not intercepted and went straight to the network.
  pub fn passthrough(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Passthrough,
      cached_at: None,
    }
  }
}

/// Indicates where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  Network,
  Cache,
  Offline,
  Passthrough,
}

impl std::fmt::Display for CacheSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      CacheSource::Network => "network",
      CacheSource::Cache => "cache",
      CacheSource::Offline => "offline",
      CacheSource::Passthrough => "passthrough",
    };
    f.write_str(s)
  }
}
