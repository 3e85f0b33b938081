//! Virtual window calculator for long fixed-height lists.
//!
//! Given a scroll offset, a viewport height and a fixed item height, work out
//! which contiguous slice of items has to be materialized. The window is
//! recomputed from scratch on every call; nothing is carried between scroll
//! events, so dropped or coalesced events cannot leave stale state behind.

use std::ops::RangeInclusive;

/// Scroll position and sizing of a list viewport, in pixels (or rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
  pub scroll_top: usize,
  pub container_height: usize,
  /// Fixed height of every item. Zero is treated as one.
  pub item_height: usize,
  /// Extra items materialized beyond each visible edge
  pub overscan: usize,
}

impl Viewport {
  pub fn new(container_height: usize, item_height: usize, overscan: usize) -> Self {
    Self {
      scroll_top: 0,
      container_height,
      item_height,
      overscan,
    }
  }

  fn item_height(&self) -> usize {
    self.item_height.max(1)
  }
}

/// One materialized item with its pixel extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualItem {
  pub index: usize,
  pub start: usize,
  pub end: usize,
}

/// The slice of a sequence to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualWindow {
  pub items: Vec<VirtualItem>,
  /// Height of the whole list, for sizing the scroll spacer
  pub total_height: usize,
}

impl VirtualWindow {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  /// Inclusive index range, `None` for an empty sequence.
  pub fn range(&self) -> Option<RangeInclusive<usize>> {
    match (self.items.first(), self.items.last()) {
      (Some(first), Some(last)) => Some(first.index..=last.index),
      _ => None,
    }
  }

  pub fn start_index(&self) -> Option<usize> {
    self.items.first().map(|i| i.index)
  }

  pub fn end_index(&self) -> Option<usize> {
    self.items.last().map(|i| i.index)
  }
}

/// Compute the window for a sequence of `len` items.
///
/// `start = floor(top / h) - overscan` and `end = ceil((top + height) / h) +
/// overscan`, both clamped to the sequence. Runs in O(window size).
pub fn compute_window(viewport: &Viewport, len: usize) -> VirtualWindow {
  let h = viewport.item_height();
  let total_height = len * h;
  if len == 0 {
    return VirtualWindow {
      items: Vec::new(),
      total_height,
    };
  }

  let last = len - 1;
  let first_visible = viewport.scroll_top / h;
  let last_visible = (viewport.scroll_top + viewport.container_height).div_ceil(h);

  let end = (last_visible + viewport.overscan).min(last);
  // Past the end (e.g. after the list shrank) start must not pass end
  let start = first_visible.saturating_sub(viewport.overscan).min(end);

  let items = (start..=end)
    .map(|index| VirtualItem {
      index,
      start: index * h,
      end: (index + 1) * h,
    })
    .collect();

  VirtualWindow { items, total_height }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
  Auto,
  Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
  Relative,
  Absolute,
}

/// Style hint for the scrolling container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerStyle {
  pub height: usize,
  pub overflow: Overflow,
  pub position: Position,
}

/// Style hint for the inner spacer that gives the scrollbar its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnerStyle {
  pub height: usize,
  pub position: Position,
}

/// Scroll state for one virtualized list.
#[derive(Debug, Clone)]
pub struct VirtualScroller {
  viewport: Viewport,
}

impl VirtualScroller {
  pub fn new(viewport: Viewport) -> Self {
    Self { viewport }
  }

  pub fn viewport(&self) -> &Viewport {
    &self.viewport
  }

  pub fn scroll_top(&self) -> usize {
    self.viewport.scroll_top
  }

  /// Record a scroll event.
  pub fn on_scroll(&mut self, scroll_top: usize) {
    self.viewport.scroll_top = scroll_top;
  }

  pub fn set_container_height(&mut self, height: usize) {
    self.viewport.container_height = height;
  }

  /// Jump so that `index` is at the top. Returns the new offset.
  pub fn scroll_to_index(&mut self, index: usize) -> usize {
    let offset = index * self.viewport.item_height();
    self.viewport.scroll_top = offset;
    offset
  }

  /// Largest offset that still fills the viewport.
  pub fn max_scroll(&self, len: usize) -> usize {
    (len * self.viewport.item_height()).saturating_sub(self.viewport.container_height)
  }

  /// Scroll by a signed number of units, clamped to the list.
  pub fn scroll_by(&mut self, delta: isize, len: usize) {
    let top = self.viewport.scroll_top.saturating_add_signed(delta);
    self.viewport.scroll_top = top.min(self.max_scroll(len));
  }

  pub fn window(&self, len: usize) -> VirtualWindow {
    compute_window(&self.viewport, len)
  }

  /// Pair each windowed entry with its item.
  pub fn visible<'a, T>(&self, items: &'a [T]) -> Vec<(VirtualItem, &'a T)> {
    self
      .window(items.len())
      .items
      .into_iter()
      .filter_map(|v| items.get(v.index).map(|item| (v, item)))
      .collect()
  }

  pub fn container_style(&self) -> ContainerStyle {
    ContainerStyle {
      height: self.viewport.container_height,
      overflow: Overflow::Auto,
      position: Position::Relative,
    }
  }

  pub fn inner_style(&self, len: usize) -> InnerStyle {
    InnerStyle {
      height: len * self.viewport.item_height(),
      position: Position::Relative,
    }
  }
}
