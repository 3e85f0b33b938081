use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::{HeaderValue, CACHE_CONTROL, PRAGMA};
use std::time::Duration;
use tracing::debug;

use super::{FetchMode, Fetcher};
use crate::cache::{Request, ResponseSnapshot};
use crate::config::NetworkConfig;

/// `reqwest` backed fetcher.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new(config: &NetworkConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(config.user_agent.clone())
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }

  /// Build the outgoing request. Revalidating requests ask every
  /// intermediary cache to go back to the origin.
  fn build(&self, request: &Request, mode: FetchMode) -> Result<reqwest::Request> {
    let mut builder = self
      .client
      .request(request.method.clone(), request.url.clone());

    if mode == FetchMode::Revalidate {
      builder = builder
        .header(
          CACHE_CONTROL,
          HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        )
        .header(PRAGMA, HeaderValue::from_static("no-cache"));
    }

    builder
      .build()
      .map_err(|e| eyre!("Failed to build request for {}: {}", request.url, e))
  }

  async fn send(&self, request: &Request, mode: FetchMode) -> Result<ResponseSnapshot> {
    let outgoing = self.build(request, mode)?;
    let response = self
      .client
      .execute(outgoing)
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", request.url, e))?;

    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();

    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read body of {}: {}", request.url, e))?;

    debug!(url = %request.url, status, bytes = body.len(), "fetched");

    Ok(ResponseSnapshot {
      status,
      headers,
      body: body.to_vec(),
    })
  }
}

impl Fetcher for HttpFetcher {
  fn fetch<'a>(
    &'a self,
    request: &'a Request,
    mode: FetchMode,
  ) -> BoxFuture<'a, Result<ResponseSnapshot>> {
    self.send(request, mode).boxed()
  }
}
