//! Fixed-size pagination over a fully loaded sequence.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct PendingPage {
  target: usize,
  requested_at: Instant,
}

/// Paginator over an owned sequence.
///
/// Pages are 1-indexed. Out-of-range navigation is silently ignored. Page
/// changes go through a short cosmetic transition: `is_loading()` is true
/// until `tick()` commits the target page, and any navigation requested in
/// the meantime is dropped so pages are never skipped or double-advanced.
#[derive(Debug)]
pub struct Paginator<T> {
  items: Vec<T>,
  per_page: usize,
  current_page: usize,
  pending: Option<PendingPage>,
  transition_delay: Duration,
}

impl<T> Paginator<T> {
  /// Create a paginator. `items_per_page` of zero is treated as one.
  pub fn new(items: Vec<T>, items_per_page: usize) -> Self {
    Self {
      items,
      per_page: items_per_page.max(1),
      current_page: 1,
      pending: None,
      transition_delay: Duration::from_millis(100),
    }
  }

  pub fn with_transition_delay(mut self, delay: Duration) -> Self {
    self.transition_delay = delay;
    self
  }

  /// Start on `page` if it exists.
  pub fn with_initial_page(mut self, page: usize) -> Self {
    if (1..=self.total_pages()).contains(&page) {
      self.current_page = page;
    }
    self
  }

  pub fn items(&self) -> &[T] {
    &self.items
  }

  pub fn items_per_page(&self) -> usize {
    self.per_page
  }

  /// Replace the sequence, keeping the current page where possible.
  pub fn set_items(&mut self, items: Vec<T>) {
    self.items = items;
    self.pending = None;
    self.current_page = self.current_page.clamp(1, self.total_pages().max(1));
  }

  /// `ceil(len / per_page)`; zero for an empty sequence.
  pub fn total_pages(&self) -> usize {
    self.items.len().div_ceil(self.per_page)
  }

  /// Current page (1 when there are no pages at all).
  pub fn current_page(&self) -> usize {
    self.current_page
  }

  pub fn current_items(&self) -> &[T] {
    let start = (self.current_page - 1) * self.per_page;
    if start >= self.items.len() {
      return &[];
    }
    let end = (start + self.per_page).min(self.items.len());
    &self.items[start..end]
  }

  /// Index of the first item on the current page.
  pub fn page_offset(&self) -> usize {
    (self.current_page - 1) * self.per_page
  }

  pub fn has_next_page(&self) -> bool {
    self.current_page < self.total_pages()
  }

  pub fn has_prev_page(&self) -> bool {
    self.current_page > 1
  }

  /// A page transition is in flight.
  pub fn is_loading(&self) -> bool {
    self.pending.is_some()
  }

  pub fn next_page(&mut self) -> bool {
    if !self.has_next_page() {
      return false;
    }
    self.request(self.current_page + 1)
  }

  pub fn prev_page(&mut self) -> bool {
    if !self.has_prev_page() {
      return false;
    }
    self.request(self.current_page - 1)
  }

  pub fn go_to_page(&mut self, page: usize) -> bool {
    if page < 1 || page > self.total_pages() {
      return false;
    }
    self.request(page)
  }

  /// Infinite-scroll spelling of `next_page`.
  pub fn load_more(&mut self) -> bool {
    self.next_page()
  }

  /// Commit a pending transition once its delay has passed.
  ///
  /// Returns true if the page changed.
  pub fn tick(&mut self) -> bool {
    self.tick_at(Instant::now())
  }

  fn tick_at(&mut self, now: Instant) -> bool {
    match self.pending {
      Some(p) if now.duration_since(p.requested_at) >= self.transition_delay => {
        self.pending = None;
        self.current_page = p.target;
        true
      }
      _ => false,
    }
  }

  fn request(&mut self, target: usize) -> bool {
    if self.pending.is_some() {
      return false;
    }
    if self.transition_delay.is_zero() {
      self.current_page = target;
      return true;
    }
    self.pending = Some(PendingPage {
      target,
      requested_at: Instant::now(),
    });
    true
  }
}
