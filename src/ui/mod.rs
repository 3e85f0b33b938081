mod header;
mod utils;

use crate::app::App;
use crate::cache::{CacheStorage, Strategy};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

pub use utils::{human_size, truncate};

/// Main draw function
pub fn draw<S: CacheStorage>(frame: &mut Frame, app: &mut App<S>) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Entry list
      Constraint::Length(1), // Status bar
    ])
    .split(frame.area());

  header::draw_header(frame, chunks[0], app);
  draw_entries(frame, chunks[1], app);
  draw_status_bar(frame, chunks[2], app);
}

fn draw_entries<S: CacheStorage>(frame: &mut Frame, area: Rect, app: &mut App<S>) {
  let pages = app.pages();
  let title = format!(
    " {} ({} entries) ",
    app.bucket_name().unwrap_or("no bucket"),
    pages.items().len()
  );
  let border = if app.is_current_bucket() {
    Color::Blue
  } else {
    Color::DarkGray
  };
  let block = Block::default()
    .title(title)
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(border));

  let inner = block.inner(area);
  frame.render_widget(block, area);
  app.set_list_height(inner.height as usize);

  let page_items = app.pages().current_items();
  if page_items.is_empty() {
    let paragraph = Paragraph::new("Bucket is empty.").style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, inner);
    return;
  }

  let scroller = app.scroller();
  let scroll_top = scroller.scroll_top();
  let height = inner.height as usize;
  let offset = app.pages().page_offset();

  // Only the windowed slice is turned into widgets; overscan rows outside
  // the viewport are skipped.
  for (item, entry) in scroller.visible(page_items) {
    if item.start < scroll_top || item.start >= scroll_top + height {
      continue;
    }
    let y = inner.y + (item.start - scroll_top) as u16;
    let row = Rect::new(inner.x, y, inner.width, 1);

    let strategy_color = match entry.strategy {
      Strategy::NetworkFirst => Color::Yellow,
      Strategy::CacheFirst => Color::Green,
    };
    let url_width = (inner.width as usize).saturating_sub(42);
    let line = Line::from(vec![
      Span::styled(
        format!("{:>5} ", offset + item.index + 1),
        Style::default().fg(Color::DarkGray),
      ),
      Span::styled(
        format!("{:<14}", entry.strategy.as_str()),
        Style::default().fg(strategy_color),
      ),
      Span::raw(format!("{:>4} ", entry.status)),
      Span::raw(format!("{:>9} ", human_size(entry.size))),
      Span::styled(
        entry.cached_at.format("%m-%d %H:%M ").to_string(),
        Style::default().fg(Color::DarkGray),
      ),
      Span::styled(truncate(&entry.url, url_width), Style::default().fg(Color::Cyan)),
    ]);

    let style = if item.index == app.selected() {
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD)
    } else {
      Style::default()
    };
    frame.render_widget(Paragraph::new(line).style(style), row);
  }
}

fn draw_status_bar<S: CacheStorage>(frame: &mut Frame, area: Rect, app: &App<S>) {
  let (content, style) = match app.status() {
    Some(msg) => (format!(" {}", msg), Style::default().fg(Color::Red)),
    None => (
      " j/k:move  n/p:page  g/G:first/last  Tab:bucket  r:reload  q:quit".to_string(),
      Style::default().fg(Color::DarkGray),
    ),
  };

  frame.render_widget(Paragraph::new(content).style(style), area);
}
