//! The offline cache controller: install, fetch interception, activation.

use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use url::Url;

use super::clients::{ClientRegistry, WindowAction};
use super::messages::{ClientCommand, WorkerMessage};
use super::routing::{classify, intercepts};
use crate::cache::{
  BucketStatus, CacheLayer, CacheResult, CacheStorage, Request, ResponseSnapshot, Strategy,
};
use crate::net::{FetchMode, Fetcher};

/// Cache generation identity, fixed when the controller is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheVersion {
  pub label: String,
  pub version: String,
}

impl CacheVersion {
  pub fn new(label: impl Into<String>, version: impl Into<String>) -> Self {
    Self {
      label: label.into(),
      version: version.into(),
    }
  }

  /// Name of the bucket owned by this generation.
  pub fn bucket_name(&self) -> String {
    format!("{}-{}", self.label, self.version)
  }
}

/// Lifecycle of a controller instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Parsed,
  Installing,
  Installed,
  InstallFailed,
  Activating,
  Activated,
}

#[derive(Debug, Clone)]
pub struct SeedFailure {
  pub url: String,
  pub error: String,
}

#[derive(Debug, Clone)]
pub struct InstallReport {
  pub bucket: String,
  pub cached: Vec<String>,
  pub failures: Vec<SeedFailure>,
}

impl InstallReport {
  pub fn is_success(&self) -> bool {
    self.failures.is_empty()
  }
}

#[derive(Debug, Clone)]
pub struct ActivateReport {
  pub bucket: String,
  pub deleted: Vec<String>,
  /// Buckets that could not be deleted, with the reason
  pub failed: Vec<(String, String)>,
  pub claimed: usize,
}

/// Offline cache controller.
///
/// Owns one bucket (named from its [`CacheVersion`]) and the seed list. All
/// methods take `&self` so independent fetches can run concurrently.
pub struct OfflineController<S: CacheStorage, F: Fetcher> {
  cache: CacheLayer<S>,
  fetcher: Arc<F>,
  version: CacheVersion,
  seeds: Vec<Url>,
  clients: Arc<ClientRegistry>,
  state: Mutex<WorkerState>,
  skip_waiting: AtomicBool,
}

impl<S: CacheStorage, F: Fetcher> OfflineController<S, F> {
  pub fn new(
    storage: Arc<S>,
    fetcher: Arc<F>,
    version: CacheVersion,
    seeds: Vec<Url>,
    clients: Arc<ClientRegistry>,
  ) -> Self {
    let cache = CacheLayer::new(storage, version.bucket_name());
    Self {
      cache,
      fetcher,
      version,
      seeds,
      clients,
      state: Mutex::new(WorkerState::Parsed),
      skip_waiting: AtomicBool::new(false),
    }
  }

  pub fn version(&self) -> &CacheVersion {
    &self.version
  }

  pub fn bucket(&self) -> &str {
    self.cache.bucket()
  }

  pub fn seeds(&self) -> &[Url] {
    &self.seeds
  }

  pub fn clients(&self) -> &Arc<ClientRegistry> {
    &self.clients
  }

  pub fn state(&self) -> WorkerState {
    self
      .state
      .lock()
      .map(|s| *s)
      .unwrap_or(WorkerState::Parsed)
  }

  /// Whether install asked to activate without waiting for clients to close.
  pub fn skips_waiting(&self) -> bool {
    self.skip_waiting.load(Ordering::SeqCst)
  }

  fn set_state(&self, state: WorkerState) {
    if let Ok(mut s) = self.state.lock() {
      debug!(from = ?*s, to = ?state, "controller state");
      *s = state;
    }
  }

  /// Pick up the lifecycle recorded by an earlier process.
  ///
  /// Only a bucket whose install stored every seed counts; a bucket that
  /// merely exists leaves the controller in `Parsed`.
  pub fn resume(&self) -> Result<WorkerState> {
    if self.state() == WorkerState::Parsed {
      match self.cache.storage().bucket_status(self.bucket())? {
        Some(BucketStatus::Installed) => self.set_state(WorkerState::Installed),
        Some(BucketStatus::Active) => self.set_state(WorkerState::Activated),
        Some(BucketStatus::Open) | None => {}
      }
    }
    Ok(self.state())
  }

  /// Whether intercepted requests go through the cache.
  pub fn is_active(&self) -> bool {
    matches!(self.state(), WorkerState::Activating | WorkerState::Activated)
  }

  /// Populate the current bucket with the seed list.
  ///
  /// All seeds are fetched concurrently; every one that succeeds is stored
  /// even if others fail. The outcome is broadcast to clients and never
  /// retried here.
  pub async fn install(&self) -> Result<InstallReport> {
    self.set_state(WorkerState::Installing);
    let bucket = self.bucket().to_string();
    info!(bucket = %bucket, seeds = self.seeds.len(), "installing");

    if let Err(e) = self.cache.storage().open_bucket(&bucket) {
      error!(bucket = %bucket, error = %e, "install failed: cannot open bucket");
      self.set_state(WorkerState::InstallFailed);
      self.clients.broadcast(&WorkerMessage::install_failed());
      return Err(e);
    }

    let results = join_all(self.seeds.iter().map(|url| self.cache_seed(url))).await;

    let mut report = InstallReport {
      bucket,
      cached: Vec::new(),
      failures: Vec::new(),
    };
    for (url, result) in self.seeds.iter().zip(results) {
      match result {
        Ok(()) => report.cached.push(url.to_string()),
        Err(e) => {
          warn!(url = %url, error = %e, "seed failed");
          report.failures.push(SeedFailure {
            url: url.to_string(),
            error: e.to_string(),
          });
        }
      }
    }

    if report.is_success() {
      if let Err(e) = self.mark_installed(&report.bucket) {
        error!(bucket = %report.bucket, error = %e, "install failed: cannot record status");
        self.set_state(WorkerState::InstallFailed);
        self.clients.broadcast(&WorkerMessage::install_failed());
        return Err(e);
      }
      info!(bucket = %report.bucket, cached = report.cached.len(), "installed");
      self.set_state(WorkerState::Installed);
      self.clients.broadcast(&WorkerMessage::installed());
      self.skip_waiting.store(true, Ordering::SeqCst);
    } else {
      error!(
        bucket = %report.bucket,
        failed = report.failures.len(),
        "install failed"
      );
      self.set_state(WorkerState::InstallFailed);
      self.clients.broadcast(&WorkerMessage::install_failed());
    }

    Ok(report)
  }

  fn mark_installed(&self, bucket: &str) -> Result<()> {
    let storage = self.cache.storage();
    // Re-installing an active bucket keeps it active
    if storage.bucket_status(bucket)? != Some(BucketStatus::Active) {
      storage.set_bucket_status(bucket, BucketStatus::Installed)?;
    }
    Ok(())
  }

  async fn cache_seed(&self, url: &Url) -> Result<()> {
    let request = Request::get(url.clone());
    let response = self.fetcher.fetch(&request, FetchMode::Default).await?;
    if !response.is_success() {
      return Err(eyre!("HTTP {} for {}", response.status, url));
    }
    self.cache.put(&request.key(), &response, classify(url))
  }

  /// Handle one intercepted request.
  ///
  /// Until activation starts the controller does not control any fetch, so
  /// requests go straight to the network and nothing is written to its
  /// bucket. Errors only when the network fails and nothing is cached.
  pub async fn handle_fetch(&self, request: &Request) -> Result<CacheResult<ResponseSnapshot>> {
    if !self.is_active() || !intercepts(request) {
      let response = self.fetcher.fetch(request, FetchMode::Default).await?;
      return Ok(CacheResult::passthrough(response));
    }

    let key = request.key();
    let fetcher = &self.fetcher;
    let result = match classify(&request.url) {
      Strategy::NetworkFirst => {
        self
          .cache
          .network_first(&key, || fetcher.fetch(request, FetchMode::Revalidate))
          .await
      }
      Strategy::CacheFirst => {
        self
          .cache
          .cache_first(&key, || fetcher.fetch(request, FetchMode::Default))
          .await
      }
    };

    match &result {
      Ok(r) => debug!(url = %request.url, source = %r.source, status = r.data.status, "served"),
      Err(e) => debug!(url = %request.url, error = %e, "fetch failed"),
    }
    result
  }

  /// Drop every bucket except the current one, claim clients and announce
  /// the new version.
  ///
  /// Requires install to have run (successfully or not). A bucket that fails
  /// to delete is logged and skipped.
  pub async fn activate(&self) -> Result<ActivateReport> {
    match self.state() {
      WorkerState::Installed | WorkerState::InstallFailed | WorkerState::Activated => {}
      other => return Err(eyre!("Cannot activate while {:?}", other)),
    }
    self.set_state(WorkerState::Activating);

    let storage = self.cache.storage();
    let current = self.bucket().to_string();
    info!(bucket = %current, version = %self.version.version, "activating");

    if let Err(e) = storage.open_bucket(&current) {
      warn!(bucket = %current, error = %e, "could not ensure current bucket");
    }

    let mut report = ActivateReport {
      bucket: current.clone(),
      deleted: Vec::new(),
      failed: Vec::new(),
      claimed: 0,
    };

    let names = match storage.bucket_names() {
      Ok(names) => names,
      Err(e) => {
        warn!(error = %e, "could not list buckets, skipping cleanup");
        Vec::new()
      }
    };

    for name in names.into_iter().filter(|n| *n != current) {
      match storage.delete_bucket(&name) {
        Ok(_) => {
          info!(bucket = %name, "deleted stale bucket");
          report.deleted.push(name);
        }
        Err(e) => {
          warn!(bucket = %name, error = %e, "failed to delete stale bucket");
          report.failed.push((name, e.to_string()));
        }
      }
    }

    if let Err(e) = storage.set_bucket_status(&current, BucketStatus::Active) {
      warn!(bucket = %current, error = %e, "could not record active status");
    }

    report.claimed = self.clients.claim();
    self.set_state(WorkerState::Activated);
    self
      .clients
      .broadcast(&WorkerMessage::activated(&self.version.version));
    info!(
      bucket = %current,
      deleted = report.deleted.len(),
      claimed = report.claimed,
      "activated"
    );

    Ok(report)
  }

  /// Handle a command posted by a client.
  pub fn handle_message(&self, command: ClientCommand) -> WindowAction {
    match command {
      ClientCommand::LaunchApp { url } => {
        let target = url.unwrap_or_else(|| "/".to_string());
        debug!(url = %target, "launch requested");
        self.clients.open_window(&target)
      }
    }
  }

  /// Parse and handle a raw JSON command.
  pub fn handle_raw_message(&self, json: &str) -> Result<WindowAction> {
    let command: ClientCommand =
      serde_json::from_str(json).map_err(|e| eyre!("Invalid client message: {}", e))?;
    Ok(self.handle_message(command))
  }
}
