use crate::tui::app::{App, LogKind};
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Tail of the action log, newest at the bottom.
pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let visible = area.height.saturating_sub(2) as usize;
    let skip = app.action_log.len().saturating_sub(visible);

    let lines: Vec<Line> = app
        .action_log
        .iter()
        .skip(skip)
        .map(|line| {
            let style = match line.kind {
                LogKind::Info => Style::default().fg(Color::Green),
                LogKind::Stdout => Style::default(),
                LogKind::Stderr => Style::default().fg(Color::Yellow),
                LogKind::Error => Style::default().fg(Color::Red),
            };
            Line::from(vec![
                Span::styled(
                    format!("{} ", line.timestamp.format("%H:%M:%S")),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(line.message.clone(), style),
            ])
        })
        .collect();

    let title = match &app.running_action {
        Some(running) => format!(
            " Actions: running '{}' on {} ({}s, Esc to cancel) ",
            running.label,
            running.widget_id,
            running.started.elapsed().as_secs()
        ),
        None => " Actions ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    f.render_widget(Paragraph::new(lines).block(block), area);
}
