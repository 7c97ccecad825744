use super::{dashboard, document::document_lines, logs};
use crate::protocol::WidgetDocument;
use crate::tui::app::App;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// Full-screen extended view of one widget.
pub fn draw(f: &mut Frame, app: &App, area: Rect, id: &str, document: Option<&WidgetDocument>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(6),    // Document
            Constraint::Length(6), // Action log
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    let title = document
        .and_then(|d| d.title.clone())
        .unwrap_or_else(|| id.to_string());
    let block = Block::default()
        .title(Line::from(vec![
            Span::styled(
                format!(" {} ", title),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("(extended, Esc to return) ", Style::default().fg(Color::DarkGray)),
        ]))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let mut lines = match document {
        Some(doc) => document_lines(doc, chunks[0].width.saturating_sub(2)),
        None => vec![Line::from(Span::styled(
            "Loading...",
            Style::default().fg(Color::DarkGray),
        ))],
    };
    if let Some(doc) = document {
        for warning in &doc.warnings {
            lines.push(Line::from(Span::styled(
                format!("warning: {}", warning),
                Style::default().fg(Color::Yellow),
            )));
        }
    }

    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        chunks[0],
    );
    logs::draw(f, app, chunks[1]);
    dashboard::draw_status_bar(f, app, chunks[2]);
}
