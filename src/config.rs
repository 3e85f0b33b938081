use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::worker::CacheVersion;

/// Critical URLs cached at install time, relative ones resolved against the origin.
pub const DEFAULT_SEEDS: [&str; 5] = [
  "/",
  "/manifest.json",
  "/applogo.png",
  "/loading Screen.png",
  "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700&family=Anton&family=Dancing+Script:wght@400;500;600;700&family=Playfair+Display:wght@400;500;600;700;800;900&display=swap",
];

/// Version baked in by the build (`SITECACHE_BUILD_VERSION=... cargo build`).
const BUILD_VERSION: Option<&str> = option_env!("SITECACHE_BUILD_VERSION");

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Site origin that relative seed URLs resolve against
  #[serde(default = "default_origin")]
  pub origin: String,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub network: NetworkConfig,
  #[serde(default)]
  pub list: ListConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      origin: default_origin(),
      cache: CacheConfig::default(),
      network: NetworkConfig::default(),
      list: ListConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Human-readable bucket prefix
  #[serde(default = "default_label")]
  pub label: String,
  /// Deployment version; falls back to the build version
  pub version: Option<String>,
  #[serde(default = "default_seeds")]
  pub seeds: Vec<String>,
  /// SQLite database path (default: $XDG_DATA_HOME/sitecache/cache.db)
  pub database: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      label: default_label(),
      version: None,
      seeds: default_seeds(),
      database: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  #[serde(default = "default_user_agent")]
  pub user_agent: String,
}

impl Default for NetworkConfig {
  fn default() -> Self {
    Self {
      timeout_secs: default_timeout_secs(),
      user_agent: default_user_agent(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListConfig {
  /// Terminal rows per list item
  #[serde(default = "default_row_height")]
  pub row_height: usize,
  #[serde(default = "default_overscan")]
  pub overscan: usize,
  #[serde(default = "default_items_per_page")]
  pub items_per_page: usize,
  #[serde(default = "default_transition_delay_ms")]
  pub transition_delay_ms: u64,
  #[serde(default = "default_scroll_debounce_ms")]
  pub scroll_debounce_ms: u64,
}

impl Default for ListConfig {
  fn default() -> Self {
    Self {
      row_height: default_row_height(),
      overscan: default_overscan(),
      items_per_page: default_items_per_page(),
      transition_delay_ms: default_transition_delay_ms(),
      scroll_debounce_ms: default_scroll_debounce_ms(),
    }
  }
}

fn default_origin() -> String {
  "https://stlouisdemojhs.com".to_string()
}

fn default_label() -> String {
  "st-louis-demo-jhs".to_string()
}

fn default_seeds() -> Vec<String> {
  DEFAULT_SEEDS.iter().map(|s| s.to_string()).collect()
}

fn default_timeout_secs() -> u64 {
  15
}

fn default_user_agent() -> String {
  format!("sitecache/{}", env!("CARGO_PKG_VERSION"))
}

fn default_row_height() -> usize {
  1
}

fn default_overscan() -> usize {
  5
}

fn default_items_per_page() -> usize {
  200
}

fn default_transition_delay_ms() -> u64 {
  100
}

fn default_scroll_debounce_ms() -> u64 {
  100
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./sitecache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/sitecache/config.yaml
  ///
  /// Without a file every setting takes its default.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("sitecache.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("sitecache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    Ok(config)
  }

  /// Resolve the cache generation.
  ///
  /// Checks SITECACHE_VERSION, then `cache.version`, then the build version,
  /// then the crate version.
  pub fn cache_version(&self) -> CacheVersion {
    let env = std::env::var("SITECACHE_VERSION").ok();
    self.cache_version_with(env)
  }

  fn cache_version_with(&self, env_version: Option<String>) -> CacheVersion {
    let version = env_version
      .filter(|v| !v.trim().is_empty())
      .or_else(|| self.cache.version.clone())
      .or_else(|| BUILD_VERSION.map(String::from))
      .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    CacheVersion::new(self.cache.label.clone(), version)
  }

  /// Seed URLs resolved against the origin.
  pub fn seed_urls(&self) -> Result<Vec<Url>> {
    let origin = self.origin_url()?;
    self
      .cache
      .seeds
      .iter()
      .map(|s| {
        origin
          .join(s)
          .map_err(|e| eyre!("Invalid seed URL '{}': {}", s, e))
      })
      .collect()
  }

  pub fn origin_url(&self) -> Result<Url> {
    Url::parse(&self.origin).map_err(|e| eyre!("Invalid origin '{}': {}", self.origin, e))
  }

  /// Resolve a user-supplied URL, allowing paths relative to the origin.
  pub fn resolve_url(&self, input: &str) -> Result<Url> {
    self
      .origin_url()?
      .join(input)
      .map_err(|e| eyre!("Invalid URL '{}': {}", input, e))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_file_uses_defaults() {
    let config = Config::from_yaml("{}").unwrap();
    assert_eq!(config.origin, "https://stlouisdemojhs.com");
    assert_eq!(config.cache.label, "st-louis-demo-jhs");
    assert_eq!(config.cache.seeds.len(), 5);
    assert_eq!(config.list.overscan, 5);
    assert_eq!(config.list.transition_delay_ms, 100);
  }

  #[test]
  fn test_partial_sections_keep_other_defaults() {
    let config = Config::from_yaml(
      r#"
origin: http://localhost:5173
cache:
  version: "2025-01-27-cache-fix-v1.0.2"
list:
  items_per_page: 50
"#,
    )
    .unwrap();

    assert_eq!(config.list.items_per_page, 50);
    assert_eq!(config.list.overscan, 5);
    assert_eq!(config.network.timeout_secs, 15);
    assert_eq!(
      config.cache_version_with(None).bucket_name(),
      "st-louis-demo-jhs-2025-01-27-cache-fix-v1.0.2"
    );
  }

  #[test]
  fn test_env_version_overrides_config() {
    let mut config = Config::default();
    config.cache.version = Some("from-config".to_string());

    assert_eq!(
      config.cache_version_with(Some("20250628".to_string())).version,
      "20250628"
    );
    assert_eq!(
      config.cache_version_with(Some("  ".to_string())).version,
      "from-config"
    );
  }

  #[test]
  fn test_seed_urls_resolve_against_origin() {
    let config = Config::default();
    let urls: Vec<String> = config
      .seed_urls()
      .unwrap()
      .into_iter()
      .map(String::from)
      .collect();

    assert_eq!(urls[0], "https://stlouisdemojhs.com/");
    assert_eq!(urls[3], "https://stlouisdemojhs.com/loading%20Screen.png");
    assert!(urls[4].starts_with("https://fonts.googleapis.com/css2?family=Inter"));
  }

  #[test]
  fn test_resolve_url_accepts_paths_and_absolute() {
    let config = Config::default();
    assert_eq!(
      config.resolve_url("/gallery").unwrap().as_str(),
      "https://stlouisdemojhs.com/gallery"
    );
    assert_eq!(
      config.resolve_url("https://cdn.example.org/a.png").unwrap().as_str(),
      "https://cdn.example.org/a.png"
    );
  }
}
