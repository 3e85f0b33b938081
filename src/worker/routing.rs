//! Request routing: which requests are intercepted and which strategy they get.

use reqwest::Method;
use url::Url;

use crate::cache::{Request, Strategy};

/// Extensions whose content changes with each deployment.
const DYNAMIC_EXTENSIONS: [&str; 3] = [".js", ".css", ".html"];

/// Pick the caching strategy for a URL.
///
/// Code and markup (and the site root) go network-first so a deployment is
/// visible as soon as there is connectivity; everything else is cache-first.
/// Depends only on the URL path.
pub fn classify(url: &Url) -> Strategy {
  let path = url.path();
  if path == "/" || DYNAMIC_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
    Strategy::NetworkFirst
  } else {
    Strategy::CacheFirst
  }
}

/// Whether the controller handles this request at all.
///
/// Non-GET requests and non-http(s) schemes (browser extensions and the like)
/// bypass the cache entirely.
pub fn intercepts(request: &Request) -> bool {
  request.method == Method::GET && matches!(request.url.scheme(), "http" | "https")
}
