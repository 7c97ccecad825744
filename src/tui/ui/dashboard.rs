use super::{document::document_lines, logs};
use crate::tui::app::{App, MessageLevel, WidgetPanel};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(6),    // Widget grid
            Constraint::Length(8), // Action log
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    draw_header(f, app, chunks[0]);
    draw_grid(f, app, chunks[1]);
    logs::draw(f, app, chunks[2]);
    draw_status_bar(f, app, chunks[3]);
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let failing = app
        .widgets
        .iter()
        .filter(|w| w.document.as_ref().is_some_and(|d| d.is_error()))
        .count();

    let mut spans = vec![
        Span::styled(
            " widget-deck ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("{} widgets ", app.widgets.len())),
    ];
    if failing > 0 {
        spans.push(Span::styled(
            format!("{} failing ", failing),
            Style::default().fg(Color::Red),
        ));
    }
    spans.push(Span::styled(
        "| ? for help",
        Style::default().fg(Color::DarkGray),
    ));
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_grid(f: &mut Frame, app: &App, area: Rect) {
    if app.widgets.is_empty() {
        let text = Paragraph::new("No widgets configured. Add some under `widgets:` in widget-deck.yaml.")
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(text, area);
        return;
    }

    let columns = app.columns();
    let row_count = app.widgets.len().div_ceil(columns);
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![Constraint::Ratio(1, row_count as u32); row_count])
        .split(area);

    for (row_idx, row_area) in rows.iter().enumerate() {
        let cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![Constraint::Ratio(1, columns as u32); columns])
            .split(*row_area);
        for (col_idx, cell) in cells.iter().enumerate() {
            let idx = row_idx * columns + col_idx;
            if let Some(panel) = app.widgets.get(idx) {
                draw_panel(f, panel, idx == app.selected, *cell);
            }
        }
    }
}

fn draw_panel(f: &mut Frame, panel: &WidgetPanel, selected: bool, area: Rect) {
    let title = panel
        .document
        .as_ref()
        .and_then(|d| d.title.clone())
        .unwrap_or_else(|| panel.id.clone());
    let is_error = panel.document.as_ref().is_some_and(|d| d.is_error());

    let border_color = match (selected, is_error) {
        (true, _) => Color::Cyan,
        (false, true) => Color::Red,
        (false, false) => Color::Blue,
    };
    let mut block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));
    if selected {
        block = block.title_style(Style::default().add_modifier(Modifier::BOLD));
    }
    if let Some(at) = panel.refreshed_at {
        block = block.title_bottom(
            Line::from(Span::styled(
                format!(" {} ", at.format("%H:%M:%S")),
                Style::default().fg(Color::DarkGray),
            ))
            .right_aligned(),
        );
    }

    let inner_width = area.width.saturating_sub(2);
    let lines = match &panel.document {
        Some(doc) => document_lines(doc, inner_width),
        None => vec![Line::from(Span::styled(
            "Loading...",
            Style::default().fg(Color::DarkGray),
        ))],
    };
    f.render_widget(Paragraph::new(lines).block(block), area);
}

pub(super) fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    if let Some(ref msg) = app.status_message {
        let color = match msg.level {
            MessageLevel::Info => Color::Blue,
            MessageLevel::Success => Color::Green,
            MessageLevel::Warning => Color::Yellow,
            MessageLevel::Error => Color::Red,
        };
        let paragraph = Paragraph::new(msg.text.as_str()).style(
            Style::default()
                .fg(color)
                .add_modifier(Modifier::BOLD)
                .bg(Color::DarkGray),
        );
        f.render_widget(paragraph, area);
        return;
    }

    let mut shortcuts = vec![
        Span::styled("[Tab]", Style::default().fg(Color::Cyan)),
        Span::raw(" select "),
        Span::styled("[r]", Style::default().fg(Color::Cyan)),
        Span::raw("efresh "),
        Span::styled("[a]", Style::default().fg(Color::Cyan)),
        Span::raw("ctions "),
        Span::styled("[Enter]", Style::default().fg(Color::Cyan)),
        Span::raw(" details "),
    ];
    if app.running_action.is_some() {
        shortcuts.push(Span::styled("[Esc]", Style::default().fg(Color::Cyan)));
        shortcuts.push(Span::raw(" cancel action "));
    }
    shortcuts.push(Span::styled("[q]", Style::default().fg(Color::Cyan)));
    shortcuts.push(Span::raw("uit"));

    let paragraph =
        Paragraph::new(Line::from(shortcuts)).style(Style::default().bg(Color::DarkGray));
    f.render_widget(paragraph, area);
}
