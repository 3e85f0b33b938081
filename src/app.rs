use crate::cache::{CacheStorage, EntrySummary};
use crate::config::ListConfig;
use crate::event::{Event, EventHandler};
use crate::list::{Paginator, ScrollMemory, VirtualScroller, Viewport};
use crate::ui;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Terminal browser over the buckets of a cache database.
pub struct App<S: CacheStorage> {
  storage: Arc<S>,

  /// Bucket owned by the configured version
  current_bucket: String,

  /// All buckets on disk, oldest first
  buckets: Vec<String>,
  bucket_idx: usize,

  /// Entries of the selected bucket, one page at a time
  pages: Paginator<EntrySummary>,

  /// Scroll state within the current page
  scroller: VirtualScroller,

  /// Selected row within the current page
  selected: usize,

  /// Scroll offsets per bucket, restored when switching back
  scroll_memory: ScrollMemory,

  list_config: ListConfig,
  status: Option<String>,
  should_quit: bool,
}

impl<S: CacheStorage> App<S> {
  pub fn new(storage: Arc<S>, current_bucket: String, list_config: ListConfig) -> Result<Self> {
    let viewport = Viewport::new(0, list_config.row_height, list_config.overscan);
    let mut app = Self {
      storage,
      current_bucket,
      buckets: Vec::new(),
      bucket_idx: 0,
      pages: Self::paginator(Vec::new(), &list_config),
      scroller: VirtualScroller::new(viewport),
      selected: 0,
      scroll_memory: ScrollMemory::new(Duration::from_millis(list_config.scroll_debounce_ms)),
      list_config,
      status: None,
      should_quit: false,
    };
    app.reload()?;
    Ok(app)
  }

  fn paginator(entries: Vec<EntrySummary>, config: &ListConfig) -> Paginator<EntrySummary> {
    Paginator::new(entries, config.items_per_page)
      .with_transition_delay(Duration::from_millis(config.transition_delay_ms))
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(50));

    let result = async {
      while !self.should_quit {
        terminal.draw(|frame| ui::draw(frame, self))?;

        if let Some(event) = events.next().await {
          self.handle_event(event);
        } else {
          break;
        }
      }
      Ok::<_, color_eyre::Report>(())
    }
    .await;

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  /// Re-read bucket names and the selected bucket's entries.
  pub fn reload(&mut self) -> Result<()> {
    let selected_name = self.buckets.get(self.bucket_idx).cloned();
    self.buckets = self.storage.bucket_names()?;
    if !self.buckets.contains(&self.current_bucket) {
      self.buckets.push(self.current_bucket.clone());
    }

    let wanted = selected_name.unwrap_or_else(|| self.current_bucket.clone());
    self.bucket_idx = self
      .buckets
      .iter()
      .position(|b| *b == wanted)
      .unwrap_or(0);

    self.load_entries()
  }

  fn load_entries(&mut self) -> Result<()> {
    let entries = match self.buckets.get(self.bucket_idx) {
      Some(bucket) => self.storage.entries(bucket)?,
      None => Vec::new(),
    };
    debug!(bucket = ?self.bucket_name(), entries = entries.len(), "loaded entries");
    self.pages.set_items(entries);

    let restored = self
      .bucket_name()
      .and_then(|b| self.scroll_memory.restore(b))
      .unwrap_or(0);
    self.scroller.on_scroll(restored);
    self.selected = restored / self.list_config.row_height.max(1);
    self.clamp_selection();
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Resize => {}
      Event::Tick => self.tick(Instant::now()),
    }
  }

  fn tick(&mut self, now: Instant) {
    if self.pages.tick() {
      self.reset_page_position();
    }
    self.scroll_memory.flush(now);
  }

  pub fn handle_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.should_quit = true;
      }

      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),

      KeyCode::PageDown | KeyCode::Char('n') => {
        self.change_page(|p| p.next_page());
      }
      KeyCode::PageUp | KeyCode::Char('p') => {
        self.change_page(|p| p.prev_page());
      }
      KeyCode::Home | KeyCode::Char('g') => {
        self.change_page(|p| p.go_to_page(1));
      }
      KeyCode::End | KeyCode::Char('G') => {
        self.change_page(|p| {
          let last = p.total_pages();
          p.go_to_page(last)
        });
      }

      KeyCode::Tab => self.cycle_bucket(1),
      KeyCode::BackTab => self.cycle_bucket(-1),

      KeyCode::Char('r') => {
        if let Err(e) = self.reload() {
          warn!(error = %e, "reload failed");
          self.status = Some(format!("reload failed: {}", e));
        } else {
          self.status = None;
        }
      }
      _ => {}
    }
  }

  fn change_page(&mut self, f: impl FnOnce(&mut Paginator<EntrySummary>) -> bool) {
    let before = self.pages.current_page();
    if f(&mut self.pages) && !self.pages.is_loading() && self.pages.current_page() != before {
      // Zero-delay transitions commit immediately
      self.reset_page_position();
    }
  }

  fn reset_page_position(&mut self) {
    self.selected = 0;
    self.scroller.on_scroll(0);
    self.remember_scroll();
  }

  fn cycle_bucket(&mut self, delta: isize) {
    if self.buckets.is_empty() {
      return;
    }
    if let Some(bucket) = self.bucket_name().map(String::from) {
      self.scroll_memory.save(&bucket, self.scroller.scroll_top());
    }
    let len = self.buckets.len() as isize;
    self.bucket_idx = (self.bucket_idx as isize + delta).rem_euclid(len) as usize;

    if let Err(e) = self.load_entries() {
      warn!(error = %e, "failed to load bucket");
      self.status = Some(format!("failed to load bucket: {}", e));
    }
  }

  fn move_selection(&mut self, delta: isize) {
    let len = self.pages.current_items().len();
    if len == 0 {
      return;
    }
    self.selected = self.selected.saturating_add_signed(delta).min(len - 1);
    self.keep_selection_visible();
    self.remember_scroll();
  }

  fn clamp_selection(&mut self) {
    let len = self.pages.current_items().len();
    self.selected = self.selected.min(len.saturating_sub(1));
    self.keep_selection_visible();
  }

  fn keep_selection_visible(&mut self) {
    let h = self.list_config.row_height.max(1);
    let container = self.scroller.viewport().container_height;
    let top = self.selected * h;
    let bottom = top + h;

    if top < self.scroller.scroll_top() {
      self.scroller.on_scroll(top);
    } else if container > 0 && bottom > self.scroller.scroll_top() + container {
      self.scroller.on_scroll(bottom - container);
    }
  }

  fn remember_scroll(&mut self) {
    if let Some(bucket) = self.bucket_name().map(String::from) {
      self
        .scroll_memory
        .record(&bucket, self.scroller.scroll_top(), Instant::now());
    }
  }

  /// Called by the renderer with the real list height.
  pub fn set_list_height(&mut self, height: usize) {
    if self.scroller.viewport().container_height != height {
      self.scroller.set_container_height(height);
      self.keep_selection_visible();
    }
  }

  pub fn bucket_name(&self) -> Option<&str> {
    self.buckets.get(self.bucket_idx).map(String::as_str)
  }

  pub fn bucket_index(&self) -> usize {
    self.bucket_idx
  }

  pub fn bucket_count(&self) -> usize {
    self.buckets.len()
  }

  pub fn is_current_bucket(&self) -> bool {
    self.bucket_name() == Some(self.current_bucket.as_str())
  }

  pub fn pages(&self) -> &Paginator<EntrySummary> {
    &self.pages
  }

  pub fn scroller(&self) -> &VirtualScroller {
    &self.scroller
  }

  pub fn selected(&self) -> usize {
    self.selected
  }

  pub fn status(&self) -> Option<&str> {
    self.status.as_deref()
  }

  pub fn should_quit(&self) -> bool {
    self.should_quit
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CachedEntry, MemoryStorage, RequestKey, ResponseSnapshot, Strategy};

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn storage_with(bucket: &str, n: usize) -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());
    storage.open_bucket(bucket).unwrap();
    for i in 0..n {
      let entry = CachedEntry::new(
        RequestKey {
          method: "GET".to_string(),
          url: format!("https://stlouisdemojhs.com/gallery/{i:04}.jpg"),
        },
        ResponseSnapshot::new(200, vec![0u8; i]),
        Strategy::CacheFirst,
      );
      storage.put(bucket, &entry).unwrap();
    }
    storage
  }

  fn list_config() -> ListConfig {
    ListConfig {
      items_per_page: 10,
      transition_delay_ms: 0,
      ..ListConfig::default()
    }
  }

  #[test]
  fn test_opens_on_current_bucket() {
    let storage = storage_with("old", 3);
    storage.open_bucket("site-v2").unwrap();
    let app = App::new(storage, "site-v2".to_string(), list_config()).unwrap();

    assert_eq!(app.bucket_name(), Some("site-v2"));
    assert!(app.is_current_bucket());
    assert_eq!(app.bucket_count(), 2);
    assert!(app.pages().items().is_empty());
  }

  #[test]
  fn test_paging_resets_selection() {
    let storage = storage_with("site-v1", 25);
    let mut app = App::new(storage, "site-v1".to_string(), list_config()).unwrap();
    app.set_list_height(4);

    app.handle_key(key(KeyCode::Char('j')));
    app.handle_key(key(KeyCode::Char('j')));
    assert_eq!(app.selected(), 2);

    app.handle_key(key(KeyCode::PageDown));
    assert_eq!(app.pages().current_page(), 2);
    assert_eq!(app.selected(), 0);

    app.handle_key(key(KeyCode::End));
    assert_eq!(app.pages().current_page(), 3);
    assert_eq!(app.pages().current_items().len(), 5);
  }

  #[test]
  fn test_selection_scrolls_viewport() {
    let storage = storage_with("site-v1", 10);
    let mut app = App::new(storage, "site-v1".to_string(), list_config()).unwrap();
    app.set_list_height(3);

    for _ in 0..5 {
      app.handle_key(key(KeyCode::Down));
    }
    assert_eq!(app.selected(), 5);
    assert_eq!(app.scroller().scroll_top(), 3);

    for _ in 0..20 {
      app.handle_key(key(KeyCode::Down));
    }
    assert_eq!(app.selected(), 9);
  }

  #[test]
  fn test_switching_buckets_restores_scroll() {
    let storage = storage_with("site-v1", 10);
    storage.open_bucket("site-v2").unwrap();
    let mut app = App::new(storage, "site-v1".to_string(), list_config()).unwrap();
    app.set_list_height(3);

    for _ in 0..6 {
      app.handle_key(key(KeyCode::Down));
    }
    let offset = app.scroller().scroll_top();
    assert!(offset > 0);

    app.handle_key(key(KeyCode::Tab));
    assert_eq!(app.bucket_name(), Some("site-v2"));
    assert_eq!(app.scroller().scroll_top(), 0);

    app.handle_key(key(KeyCode::BackTab));
    assert_eq!(app.bucket_name(), Some("site-v1"));
    assert_eq!(app.scroller().scroll_top(), offset);
  }

  #[test]
  fn test_quit_keys() {
    let storage = storage_with("site-v1", 0);
    let mut app = App::new(storage, "site-v1".to_string(), list_config()).unwrap();
    assert!(!app.should_quit());
    app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
    assert!(app.should_quit());
  }
}
