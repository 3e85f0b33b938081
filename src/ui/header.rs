use crate::app::App;
use crate::cache::CacheStorage;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with bucket, page and transition state
pub fn draw_header<S: CacheStorage>(frame: &mut Frame, area: Rect, app: &App<S>) {
  let pages = app.pages();
  let page_label = if pages.total_pages() == 0 {
    "no pages".to_string()
  } else {
    format!("page {}/{}", pages.current_page(), pages.total_pages())
  };

  let mut spans = vec![
    Span::styled(" sitecache ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(
      format!(" {} ", app.bucket_name().unwrap_or("-")),
      Style::default().fg(Color::White),
    ),
  ];

  if app.is_current_bucket() {
    spans.push(Span::styled("[current] ", Style::default().fg(Color::Green)));
  } else {
    spans.push(Span::styled("[stale] ", Style::default().fg(Color::Red)));
  }

  spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
  spans.push(Span::styled(
    format!(" {} ", page_label),
    Style::default().fg(Color::Yellow).bold(),
  ));

  if pages.is_loading() {
    spans.push(Span::styled("loading...", Style::default().fg(Color::DarkGray)));
  }

  spans.push(Span::styled(
    format!("  bucket {}/{}", app_bucket_position(app), app.bucket_count()),
    Style::default().fg(Color::DarkGray),
  ));

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

fn app_bucket_position<S: CacheStorage>(app: &App<S>) -> usize {
  app.bucket_index() + usize::from(app.bucket_count() > 0)
}
