use crate::tui::app::{App, Overlay, View};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

pub mod dashboard;
pub mod detail;
pub mod document;
pub mod logs;

pub fn draw(f: &mut Frame, app: &App) {
    match &app.view {
        View::Dashboard => dashboard::draw(f, app, f.area()),
        View::Detail { id, document } => detail::draw(f, app, f.area(), id, document.as_ref()),
    }

    match &app.overlay {
        Overlay::None => {}
        Overlay::Help => draw_help(f),
        Overlay::ActionMenu { selected } => draw_action_menu(f, app, *selected),
        Overlay::Confirm { action } => {
            let text = vec![
                Line::from(vec![
                    Span::raw("Run "),
                    Span::styled(
                        action.label.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::raw("?"),
                ]),
                Line::from(Span::styled(
                    action.command.clone(),
                    Style::default().fg(Color::DarkGray),
                )),
                Line::from(""),
                Line::from("y = run, n = cancel"),
            ];
            draw_popup(f, " Confirm ", Color::Red, text, 50, 7);
        }
        Overlay::Password { action, input } => {
            let text = vec![
                Line::from(format!("'{}' needs sudo.", action.label)),
                Line::from(""),
                Line::from(vec![
                    Span::raw("Password: "),
                    Span::raw("*".repeat(input.chars().count())),
                ]),
            ];
            draw_popup(f, " sudo ", Color::Yellow, text, 50, 6);
        }
    }
}

fn draw_action_menu(f: &mut Frame, app: &App, selected: usize) {
    let actions = app
        .selected_panel()
        .and_then(|p| p.document.as_ref())
        .map(|d| d.actions.as_slice())
        .unwrap_or(&[]);

    let lines: Vec<Line> = actions
        .iter()
        .enumerate()
        .map(|(idx, action)| {
            let mut flags = Vec::new();
            if action.flags.danger {
                flags.push("danger");
            }
            if action.flags.sudo {
                flags.push("sudo");
            }
            if action.flags.refresh {
                flags.push("refresh");
            }
            let mut style = Style::default();
            if idx == selected {
                style = style.bg(Color::DarkGray).add_modifier(Modifier::BOLD);
            }
            let mut spans = vec![Span::styled(format!(" {} ", action.label), style)];
            if !flags.is_empty() {
                spans.push(Span::styled(
                    format!("[{}]", flags.join(",")),
                    Style::default().fg(Color::Yellow),
                ));
            }
            Line::from(spans)
        })
        .collect();

    let height = lines.len() as u16 + 2;
    draw_popup(f, " Actions (Enter to run) ", Color::Cyan, lines, 50, height);
}

fn draw_popup(
    f: &mut Frame,
    title: &str,
    color: Color,
    lines: Vec<Line>,
    width_pct: u16,
    height: u16,
) {
    let area = centered(f.area(), width_pct, height);
    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color));
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn centered(area: Rect, width_pct: u16, height: u16) -> Rect {
    let height = height.min(area.height);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(height),
            Constraint::Fill(1),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_pct) / 2),
            Constraint::Percentage(width_pct),
            Constraint::Percentage((100 - width_pct) / 2),
        ])
        .split(vertical[1])[1]
}

fn draw_help(f: &mut Frame) {
    let heading = |text: &'static str| {
        Line::from(Span::styled(
            text,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ))
    };

    let text = vec![
        Line::from(Span::styled(
            "widget-deck - Keyboard Shortcuts",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        heading("Global"),
        Line::from("  q         Quit"),
        Line::from("  ?         Toggle this help"),
        Line::from("  Ctrl+C    Force quit"),
        Line::from(""),
        heading("Dashboard"),
        Line::from("  Tab/←→↑↓  Select widget"),
        Line::from("  r         Refresh selected widget"),
        Line::from("  a         Open action menu"),
        Line::from("  Enter     Extended view of selected widget"),
        Line::from("  Esc       Cancel running action / leave extended view"),
        Line::from(""),
        heading("Actions"),
        Line::from("  Enter     Run highlighted action"),
        Line::from("  y / n     Confirm or cancel a dangerous action"),
        Line::from("  Esc       Close menu or password prompt"),
        Line::from(""),
        Line::from(Span::styled(
            "Press ? or Esc to close",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let area = centered(f.area(), 70, text.len() as u16 + 2);
    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));
    f.render_widget(Clear, area);
    f.render_widget(Paragraph::new(text).block(block), area);
}
