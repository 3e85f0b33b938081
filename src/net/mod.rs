//! Network access for the cache controller.

mod http;

use color_eyre::Result;
use futures::future::BoxFuture;

use crate::cache::{Request, ResponseSnapshot};

pub use http::HttpFetcher;

/// How the request should treat intermediary HTTP caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
  Default,
  /// Ask every intermediary to revalidate (used for network-first requests)
  Revalidate,
}

/// Something that can perform a network fetch.
///
/// An `Err` means the transport failed (offline, DNS, timeout). Any HTTP
/// status, including 4xx/5xx, is a successful fetch.
pub trait Fetcher: Send + Sync {
  fn fetch<'a>(
    &'a self,
    request: &'a Request,
    mode: FetchMode,
  ) -> BoxFuture<'a, Result<ResponseSnapshot>>;
}

#[cfg(test)]
pub mod testing {
  //! Scripted fetcher for tests.

  use super::*;
  use color_eyre::eyre::eyre;
  use futures::FutureExt;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  /// Fetcher that serves canned responses and counts calls.
  #[derive(Default)]
  pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, ResponseSnapshot>>,
    calls: AtomicUsize,
    modes: Mutex<Vec<FetchMode>>,
  }

  impl ScriptedFetcher {
    pub fn new() -> Self {
      Self::default()
    }

    pub fn route(&self, url: &str, response: ResponseSnapshot) {
      self
        .routes
        .lock()
        .unwrap()
        .insert(url.to_string(), response);
    }

    /// Make `url` fail at the transport level.
    pub fn offline(&self, url: &str) {
      self.routes.lock().unwrap().remove(url);
    }

    pub fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }

    pub fn modes(&self) -> Vec<FetchMode> {
      self.modes.lock().unwrap().clone()
    }
  }

  impl Fetcher for ScriptedFetcher {
    fn fetch<'a>(
      &'a self,
      request: &'a Request,
      mode: FetchMode,
    ) -> BoxFuture<'a, Result<ResponseSnapshot>> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self.modes.lock().unwrap().push(mode);
      let found = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
      let url = request.url.to_string();
      async move { found.ok_or_else(|| eyre!("network unreachable: {}", url)) }.boxed()
    }
  }
}
