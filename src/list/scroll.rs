//! Per-route scroll position memory with debounced saving.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Staged {
  offset: usize,
  at: Instant,
}

/// Remembers the scroll offset of each route so that going back restores it.
///
/// Scroll events are staged with [`record`](Self::record) and only persisted
/// after the debounce interval passes without a newer event for that route.
#[derive(Debug)]
pub struct ScrollMemory {
  saved: HashMap<String, usize>,
  staged: HashMap<String, Staged>,
  debounce: Duration,
}

impl Default for ScrollMemory {
  fn default() -> Self {
    Self::new(Duration::from_millis(100))
  }
}

impl ScrollMemory {
  pub fn new(debounce: Duration) -> Self {
    Self {
      saved: HashMap::new(),
      staged: HashMap::new(),
      debounce,
    }
  }

  /// Save immediately, dropping anything staged for the route.
  pub fn save(&mut self, path: &str, offset: usize) {
    self.staged.remove(path);
    self.saved.insert(path.to_string(), offset);
  }

  pub fn restore(&self, path: &str) -> Option<usize> {
    self.saved.get(path).copied()
  }

  /// Forget a route (saved and staged).
  pub fn clear(&mut self, path: &str) {
    self.saved.remove(path);
    self.staged.remove(path);
  }

  /// Stage a scroll event for debounced saving.
  pub fn record(&mut self, path: &str, offset: usize, now: Instant) {
    self
      .staged
      .insert(path.to_string(), Staged { offset, at: now });
  }

  /// Persist staged offsets that have been quiet for the debounce interval.
  pub fn flush(&mut self, now: Instant) {
    let debounce = self.debounce;
    let ready: Vec<String> = self
      .staged
      .iter()
      .filter(|(_, s)| now.duration_since(s.at) >= debounce)
      .map(|(path, _)| path.clone())
      .collect();

    for path in ready {
      if let Some(s) = self.staged.remove(&path) {
        self.saved.insert(path, s.offset);
      }
    }
  }

  /// Persist everything staged right away (e.g. before leaving).
  pub fn flush_all(&mut self) {
    for (path, s) in self.staged.drain() {
      self.saved.insert(path, s.offset);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_save_restore_clear() {
    let mut mem = ScrollMemory::default();
    assert_eq!(mem.restore("/news"), None);
    mem.save("/news", 1200);
    assert_eq!(mem.restore("/news"), Some(1200));
    mem.clear("/news");
    assert_eq!(mem.restore("/news"), None);
  }

  #[test]
  fn test_record_is_debounced() {
    let mut mem = ScrollMemory::new(Duration::from_millis(100));
    let t0 = Instant::now();

    mem.record("/gallery", 10, t0);
    mem.record("/gallery", 40, t0 + Duration::from_millis(50));
    mem.flush(t0 + Duration::from_millis(120));
    // The second event restarted the quiet period
    assert_eq!(mem.restore("/gallery"), None);

    mem.flush(t0 + Duration::from_millis(150));
    assert_eq!(mem.restore("/gallery"), Some(40));
  }

  #[test]
  fn test_flush_all_persists_pending() {
    let mut mem = ScrollMemory::new(Duration::from_secs(60));
    mem.record("/", 7, Instant::now());
    mem.flush_all();
    assert_eq!(mem.restore("/"), Some(7));
  }
}
