//! Cache storage trait, SQLite implementation and an in-memory backend.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use super::types::{
  BucketStatus, CachedEntry, EntrySummary, RequestKey, ResponseSnapshot, Strategy,
};

/// Trait for cache storage backends.
///
/// A backend holds any number of named buckets, each mapping a request key to
/// one response snapshot. Writes replace whole entries.
pub trait CacheStorage: Send + Sync {
  /// Create the bucket if it does not exist yet.
  fn open_bucket(&self, name: &str) -> Result<()>;

  /// All bucket names, oldest first.
  fn bucket_names(&self) -> Result<Vec<String>>;

  /// Delete a bucket and everything in it. Returns false if it did not exist.
  fn delete_bucket(&self, name: &str) -> Result<bool>;

  /// Lifecycle status of a bucket, `None` if it does not exist.
  fn bucket_status(&self, name: &str) -> Result<Option<BucketStatus>>;

  /// Record a bucket's lifecycle status. Returns false if it does not exist.
  fn set_bucket_status(&self, name: &str, status: BucketStatus) -> Result<bool>;

  /// Look up a stored entry.
  fn get(&self, bucket: &str, key: &RequestKey) -> Result<Option<CachedEntry>>;

  /// Store an entry, replacing any previous one for the same key.
  fn put(&self, bucket: &str, entry: &CachedEntry) -> Result<()>;

  /// Remove a single entry.
  fn delete(&self, bucket: &str, key: &RequestKey) -> Result<bool>;

  /// List the entries of a bucket, ordered by URL.
  fn entries(&self, bucket: &str) -> Result<Vec<EntrySummary>>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the database at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Private database that disappears with the process.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("sitecache").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

const CACHE_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS buckets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    status TEXT NOT NULL DEFAULT 'open',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per (bucket, request); rows are replaced whole, never patched
CREATE TABLE IF NOT EXISTS entries (
    bucket TEXT NOT NULL,
    key_hash TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    strategy TEXT NOT NULL,
    cached_at TEXT NOT NULL,
    PRIMARY KEY (bucket, key_hash),
    FOREIGN KEY (bucket) REFERENCES buckets(name) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_entries_url ON entries(bucket, url);
"#;

impl CacheStorage for SqliteStorage {
  fn open_bucket(&self, name: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO buckets (name) VALUES (?)",
        params![name],
      )
      .map_err(|e| eyre!("Failed to open bucket {}: {}", name, e))?;

    Ok(())
  }

  fn bucket_names(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT name FROM buckets ORDER BY id")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get::<_, String>(0))
      .map_err(|e| eyre!("Failed to list buckets: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read bucket name: {}", e))?;

    Ok(names)
  }

  fn delete_bucket(&self, name: &str) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let deleted = conn
      .execute("DELETE FROM buckets WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to delete bucket {}: {}", name, e))?;

    Ok(deleted > 0)
  }

  fn bucket_status(&self, name: &str) -> Result<Option<BucketStatus>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let status: Option<String> = conn
      .query_row(
        "SELECT status FROM buckets WHERE name = ?",
        params![name],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read status of bucket {}: {}", name, e))?;

    status
      .map(|s| BucketStatus::parse(&s).ok_or_else(|| eyre!("Unknown bucket status '{}'", s)))
      .transpose()
  }

  fn set_bucket_status(&self, name: &str, status: BucketStatus) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let updated = conn
      .execute(
        "UPDATE buckets SET status = ? WHERE name = ?",
        params![status.as_str(), name],
      )
      .map_err(|e| eyre!("Failed to update status of bucket {}: {}", name, e))?;

    Ok(updated > 0)
  }

  fn get(&self, bucket: &str, key: &RequestKey) -> Result<Option<CachedEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT status, headers, body, strategy, cached_at FROM entries
         WHERE bucket = ? AND key_hash = ?",
      )
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(u16, String, Vec<u8>, String, String)> = stmt
      .query_row(params![bucket, key.cache_hash()], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
      })
      .optional()
      .map_err(|e| eyre!("Failed to read cache entry {}: {}", key.url, e))?;

    let Some((status, headers, body, strategy, cached_at)) = row else {
      return Ok(None);
    };

    let headers: Vec<(String, String)> = serde_json::from_str(&headers)
      .map_err(|e| eyre!("Failed to deserialize headers for {}: {}", key.url, e))?;

    Ok(Some(CachedEntry {
      key: key.clone(),
      response: ResponseSnapshot {
        status,
        headers,
        body,
      },
      strategy: parse_strategy(&strategy)?,
      cached_at: parse_datetime(&cached_at)?,
    }))
  }

  fn put(&self, bucket: &str, entry: &CachedEntry) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let headers = serde_json::to_string(&entry.response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO buckets (name) VALUES (?)",
        params![bucket],
      )
      .map_err(|e| eyre!("Failed to open bucket {}: {}", bucket, e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO entries
           (bucket, key_hash, method, url, status, headers, body, strategy, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
          bucket,
          entry.key.cache_hash(),
          entry.key.method,
          entry.key.url,
          entry.response.status,
          headers,
          entry.response.body,
          entry.strategy.as_str(),
          entry.cached_at.to_rfc3339(),
        ],
      )
      .map_err(|e| eyre!("Failed to store cache entry {}: {}", entry.key.url, e))?;

    Ok(())
  }

  fn delete(&self, bucket: &str, key: &RequestKey) -> Result<bool> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let deleted = conn
      .execute(
        "DELETE FROM entries WHERE bucket = ? AND key_hash = ?",
        params![bucket, key.cache_hash()],
      )
      .map_err(|e| eyre!("Failed to delete cache entry {}: {}", key.url, e))?;

    Ok(deleted > 0)
  }

  fn entries(&self, bucket: &str) -> Result<Vec<EntrySummary>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT method, url, status, length(body), strategy, cached_at FROM entries
         WHERE bucket = ?
         ORDER BY url",
      )
      .map_err(|e| eyre!("Failed to prepare entry query: {}", e))?;

    let rows = stmt
      .query_map(params![bucket], |row| {
        Ok((
          row.get::<_, String>(0)?,
          row.get::<_, String>(1)?,
          row.get::<_, u16>(2)?,
          row.get::<_, i64>(3)?,
          row.get::<_, String>(4)?,
          row.get::<_, String>(5)?,
        ))
      })
      .map_err(|e| eyre!("Failed to query entries: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read entry row: {}", e))?;

    rows
      .into_iter()
      .map(|(method, url, status, size, strategy, cached_at)| {
        Ok(EntrySummary {
          method,
          url,
          status,
          size: usize::try_from(size).unwrap_or(0),
          strategy: parse_strategy(&strategy)?,
          cached_at: parse_datetime(&cached_at)?,
        })
      })
      .collect()
  }
}

#[derive(Default)]
struct MemoryBucket {
  status: BucketStatus,
  entries: BTreeMap<String, CachedEntry>,
}

/// In-process storage with no persistence.
///
/// Used for `--ephemeral` runs and tests.
#[derive(Default)]
pub struct MemoryStorage {
  buckets: RwLock<Vec<(String, MemoryBucket)>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStorage for MemoryStorage {
  fn open_bucket(&self, name: &str) -> Result<()> {
    let mut buckets = self
      .buckets
      .write()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    if !buckets.iter().any(|(n, _)| n == name) {
      buckets.push((name.to_string(), MemoryBucket::default()));
    }
    Ok(())
  }

  fn bucket_names(&self) -> Result<Vec<String>> {
    let buckets = self
      .buckets
      .read()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(buckets.iter().map(|(n, _)| n.clone()).collect())
  }

  fn delete_bucket(&self, name: &str) -> Result<bool> {
    let mut buckets = self
      .buckets
      .write()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let before = buckets.len();
    buckets.retain(|(n, _)| n != name);
    Ok(buckets.len() != before)
  }

  fn bucket_status(&self, name: &str) -> Result<Option<BucketStatus>> {
    let buckets = self
      .buckets
      .read()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(buckets.iter().find(|(n, _)| n == name).map(|(_, b)| b.status))
  }

  fn set_bucket_status(&self, name: &str, status: BucketStatus) -> Result<bool> {
    let mut buckets = self
      .buckets
      .write()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    match buckets.iter_mut().find(|(n, _)| n == name) {
      Some((_, bucket)) => {
        bucket.status = status;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  fn get(&self, bucket: &str, key: &RequestKey) -> Result<Option<CachedEntry>> {
    let buckets = self
      .buckets
      .read()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(
      buckets
        .iter()
        .find(|(n, _)| n == bucket)
        .and_then(|(_, b)| b.entries.get(&key.cache_hash()))
        .cloned(),
    )
  }

  fn put(&self, bucket: &str, entry: &CachedEntry) -> Result<()> {
    let mut buckets = self
      .buckets
      .write()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let idx = match buckets.iter().position(|(n, _)| n == bucket) {
      Some(idx) => idx,
      None => {
        buckets.push((bucket.to_string(), MemoryBucket::default()));
        buckets.len() - 1
      }
    };
    buckets[idx]
      .1
      .entries
      .insert(entry.key.cache_hash(), entry.clone());
    Ok(())
  }

  fn delete(&self, bucket: &str, key: &RequestKey) -> Result<bool> {
    let mut buckets = self
      .buckets
      .write()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(
      buckets
        .iter_mut()
        .find(|(n, _)| n == bucket)
        .map(|(_, b)| b.entries.remove(&key.cache_hash()).is_some())
        .unwrap_or(false),
    )
  }

  fn entries(&self, bucket: &str) -> Result<Vec<EntrySummary>> {
    let buckets = self
      .buckets
      .read()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut rows: Vec<EntrySummary> = buckets
      .iter()
      .find(|(n, _)| n == bucket)
      .map(|(_, b)| b.entries.values().map(summarize).collect())
      .unwrap_or_default();
    rows.sort_by(|a, b| a.url.cmp(&b.url));
    Ok(rows)
  }
}

fn summarize(entry: &CachedEntry) -> EntrySummary {
  EntrySummary {
    method: entry.key.method.clone(),
    url: entry.key.url.clone(),
    status: entry.response.status,
    size: entry.response.body.len(),
    strategy: entry.strategy,
    cached_at: entry.cached_at,
  }
}

fn parse_strategy(s: &str) -> Result<Strategy> {
  Strategy::parse(s).ok_or_else(|| eyre!("Unknown cache strategy '{}'", s))
}

/// Parse a stored RFC 3339 timestamp.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(url: &str, body: &str) -> CachedEntry {
    CachedEntry::new(
      RequestKey {
        method: "GET".to_string(),
        url: url.to_string(),
      },
      ResponseSnapshot::new(200, body).with_header("content-type", "image/png"),
      Strategy::CacheFirst,
    )
  }

  fn backends() -> Vec<(&'static str, Box<dyn CacheStorage>)> {
    vec![
      ("sqlite", Box::new(SqliteStorage::open_in_memory().unwrap())),
      ("memory", Box::new(MemoryStorage::new())),
    ]
  }

  #[test]
  fn test_put_then_get_returns_snapshot() {
    for (name, storage) in backends() {
      let e = entry("https://stlouisdemojhs.com/applogo.png", "png-bytes");
      storage.put("site-v1", &e).unwrap();

      let got = storage.get("site-v1", &e.key).unwrap().expect(name);
      assert_eq!(got.response, e.response, "{name}");
      assert_eq!(got.strategy, Strategy::CacheFirst, "{name}");
      assert!(storage.get("site-v2", &e.key).unwrap().is_none(), "{name}");
    }
  }

  #[test]
  fn test_put_replaces_whole_entry() {
    for (name, storage) in backends() {
      storage.put("b", &entry("https://x/a.png", "old")).unwrap();
      storage.put("b", &entry("https://x/a.png", "new")).unwrap();

      let rows = storage.entries("b").unwrap();
      assert_eq!(rows.len(), 1, "{name}");
      assert_eq!(rows[0].size, 3, "{name}");
    }
  }

  #[test]
  fn test_delete_bucket_drops_its_entries() {
    for (name, storage) in backends() {
      storage.open_bucket("old").unwrap();
      storage.open_bucket("new").unwrap();
      storage.put("old", &entry("https://x/a.png", "a")).unwrap();

      assert_eq!(storage.bucket_names().unwrap(), vec!["old", "new"], "{name}");
      assert!(storage.delete_bucket("old").unwrap(), "{name}");
      assert!(!storage.delete_bucket("old").unwrap(), "{name}");
      assert_eq!(storage.bucket_names().unwrap(), vec!["new"], "{name}");
      assert!(storage.entries("old").unwrap().is_empty(), "{name}");
    }
  }

  #[test]
  fn test_bucket_status_defaults_to_open() {
    for (name, storage) in backends() {
      assert_eq!(storage.bucket_status("site-v1").unwrap(), None, "{name}");
      assert!(
        !storage.set_bucket_status("site-v1", BucketStatus::Installed).unwrap(),
        "{name}"
      );

      // A put that creates the bucket does not mark it installed
      storage.put("site-v1", &entry("https://x/a.png", "a")).unwrap();
      assert_eq!(
        storage.bucket_status("site-v1").unwrap(),
        Some(BucketStatus::Open),
        "{name}"
      );

      assert!(
        storage.set_bucket_status("site-v1", BucketStatus::Installed).unwrap(),
        "{name}"
      );
      storage.open_bucket("site-v1").unwrap();
      assert_eq!(
        storage.bucket_status("site-v1").unwrap(),
        Some(BucketStatus::Installed),
        "{name}"
      );

      storage.delete_bucket("site-v1").unwrap();
      storage.open_bucket("site-v1").unwrap();
      assert_eq!(
        storage.bucket_status("site-v1").unwrap(),
        Some(BucketStatus::Open),
        "{name}"
      );
    }
  }

  #[test]
  fn test_entries_sorted_by_url() {
    for (name, storage) in backends() {
      storage.put("b", &entry("https://x/z.png", "z")).unwrap();
      storage.put("b", &entry("https://x/a.png", "a")).unwrap();
      let urls: Vec<_> = storage
        .entries("b")
        .unwrap()
        .into_iter()
        .map(|r| r.url)
        .collect();
      assert_eq!(urls, vec!["https://x/a.png", "https://x/z.png"], "{name}");
    }
  }

  #[test]
  fn test_delete_single_entry() {
    for (name, storage) in backends() {
      let e = entry("https://x/a.png", "a");
      storage.put("b", &e).unwrap();
      assert!(storage.delete("b", &e.key).unwrap(), "{name}");
      assert!(!storage.delete("b", &e.key).unwrap(), "{name}");
      assert!(storage.get("b", &e.key).unwrap().is_none(), "{name}");
    }
  }
}
