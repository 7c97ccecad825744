//! Rendering of widget documents into styled lines.

use crate::protocol::{
    glyphs, sanitize, Graph, GraphKind, GraphStyle, InlineElement, Paint, Progress, ProgressStyle,
    RenderRow, StatusLevel, Table, WidgetDocument,
};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

const BLOCK_LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
const BRAILLE_LEVELS: [char; 9] = [' ', '⡀', '⣀', '⣄', '⣤', '⣦', '⣶', '⣷', '⣿'];
const LINE_POINT: char = '•';
const PROGRESS_BAR_WIDTH: usize = 20;

/// Named colors accepted in markup and element colors.
pub fn named_color(name: &str) -> Option<Color> {
    let color = match name.trim().to_ascii_lowercase().as_str() {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" | "purple" => Color::Magenta,
        "cyan" => Color::Cyan,
        "white" => Color::White,
        "gray" | "grey" => Color::Gray,
        "darkgray" | "darkgrey" => Color::DarkGray,
        "lightred" | "orange" => Color::LightRed,
        "lightgreen" => Color::LightGreen,
        "lightyellow" => Color::LightYellow,
        "lightblue" => Color::LightBlue,
        "lightmagenta" => Color::LightMagenta,
        "lightcyan" => Color::LightCyan,
        _ => return None,
    };
    Some(color)
}

fn tag_style(tags: &[String]) -> Style {
    tags.iter().fold(Style::default(), |style, tag| match tag.as_str() {
        "bold" | "b" => style.add_modifier(Modifier::BOLD),
        "dim" => style.add_modifier(Modifier::DIM),
        "italic" | "i" => style.add_modifier(Modifier::ITALIC),
        "underline" | "u" => style.add_modifier(Modifier::UNDERLINED),
        other => match named_color(other) {
            Some(color) => style.fg(color),
            None => style,
        },
    })
}

/// Styled spans for sanitized markup. Literal text is shown as-is.
pub fn markup_spans(markup: &str, literal: bool) -> Vec<Span<'static>> {
    if literal {
        return vec![Span::raw(markup.to_string())];
    }
    sanitize::segments(markup)
        .into_iter()
        .map(|segment| Span::styled(segment.text, tag_style(&segment.tags)))
        .collect()
}

/// Color for a point `fraction` (0..=1) along a paint.
pub fn paint_color(paint: Option<&Paint>, fraction: f64) -> Color {
    match paint {
        None => Color::Cyan,
        Some(Paint::Color(name)) => named_color(name).unwrap_or(Color::Cyan),
        Some(Paint::Gradient(gradient)) => {
            let stops = gradient.stops();
            if stops.is_empty() {
                return Color::Cyan;
            }
            let fraction = if fraction.is_nan() {
                0.0
            } else {
                fraction.clamp(0.0, 1.0)
            };
            let idx = (fraction * (stops.len() - 1) as f64).round() as usize;
            named_color(&stops[idx.min(stops.len() - 1)]).unwrap_or(Color::Cyan)
        }
    }
}

pub fn status_color(level: StatusLevel) -> Color {
    match level {
        StatusLevel::Ok => Color::Green,
        StatusLevel::Info => Color::Blue,
        StatusLevel::Warn => Color::Yellow,
        StatusLevel::Error => Color::Red,
    }
}

/// All display lines of a document for a panel `width` cells wide.
pub fn document_lines(doc: &WidgetDocument, width: u16) -> Vec<Line<'static>> {
    let width = width.max(1) as usize;
    let mut lines = Vec::new();
    for row in &doc.rows {
        render_row(row, width, &mut lines);
    }
    if !doc.actions.is_empty() {
        let labels: Vec<String> = doc.actions.iter().map(|a| a.label.clone()).collect();
        lines.push(Line::from(Span::styled(
            format!("actions: {}", labels.join(", ")),
            Style::default().fg(Color::DarkGray),
        )));
    }
    lines
}

fn render_row(row: &RenderRow, width: usize, lines: &mut Vec<Line<'static>>) {
    let mut spans = Vec::new();
    if let Some(level) = row.status {
        spans.push(Span::styled("● ", Style::default().fg(status_color(level))));
    }
    spans.extend(markup_spans(&row.text, row.literal));

    match &row.element {
        None => lines.push(Line::from(spans)),
        Some(InlineElement::Progress(progress)) => render_progress(progress, spans, width, lines),
        Some(InlineElement::Sparkline(spark)) => {
            if !row.text.is_empty() {
                spans.push(Span::raw(" "));
            }
            let color = paint_color(spark.paint.as_ref(), 1.0);
            spans.push(Span::styled(
                glyphs::sparkline(&spark.values, spark.width),
                Style::default().fg(color),
            ));
            lines.push(Line::from(spans));
        }
        Some(InlineElement::MiniProgress(mini)) => {
            if !row.text.is_empty() {
                spans.push(Span::raw(" "));
            }
            let color = paint_color(mini.paint.as_ref(), mini.value / 100.0);
            spans.push(Span::styled(
                glyphs::bar(mini.value, mini.width),
                Style::default().fg(color),
            ));
            lines.push(Line::from(spans));
        }
        Some(InlineElement::Divider(divider)) => {
            let color = divider
                .color
                .as_deref()
                .and_then(named_color)
                .unwrap_or(Color::DarkGray);
            if !row.text.is_empty() || row.status.is_some() {
                lines.push(Line::from(spans));
            }
            lines.push(Line::from(Span::styled(
                divider.glyph.to_string().repeat(width),
                Style::default().fg(color),
            )));
        }
        Some(InlineElement::Graph(graph)) => {
            if !spans.is_empty() {
                lines.push(Line::from(spans));
            }
            render_graph(graph, width, lines);
        }
        Some(InlineElement::Table(table)) => {
            if !spans.is_empty() {
                lines.push(Line::from(spans));
            }
            render_table(table, width, lines);
        }
    }
}

fn render_progress(
    progress: &Progress,
    mut spans: Vec<Span<'static>>,
    width: usize,
    lines: &mut Vec<Line<'static>>,
) {
    let color = paint_color(progress.paint.as_ref(), progress.value / 100.0);
    let percent = Span::styled(
        format!(" {:>3.0}%", progress.value),
        Style::default().add_modifier(Modifier::BOLD),
    );
    match progress.style {
        ProgressStyle::Inline => {
            spans.push(Span::raw(" "));
            spans.push(Span::styled(
                glyphs::bar(progress.value, 10),
                Style::default().fg(color),
            ));
            spans.push(percent);
            lines.push(Line::from(spans));
        }
        ProgressStyle::Bar | ProgressStyle::Chart => {
            if !spans.is_empty() {
                lines.push(Line::from(spans));
            }
            let bar_width = width.saturating_sub(6).clamp(1, PROGRESS_BAR_WIDTH * 3);
            let mut bar = vec![Span::styled(
                glyphs::bar(progress.value, bar_width),
                Style::default().fg(color),
            )];
            bar.push(percent);
            lines.push(Line::from(bar));
        }
    }
}

fn render_graph(graph: &Graph, width: usize, lines: &mut Vec<Line<'static>>) {
    if let Some(label) = &graph.label {
        lines.push(Line::from(Span::styled(
            label.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
    }
    let width = (graph.width as usize).min(width).max(1);
    let rows = chart_rows(
        &graph.values,
        graph.range,
        width,
        graph.height as usize,
        graph.style,
        graph.kind,
    );
    let total = rows.len().max(1);
    for (i, row) in rows.into_iter().enumerate() {
        // Top rows take the high end of a gradient
        let fraction = 1.0 - i as f64 / total as f64;
        lines.push(Line::from(Span::styled(
            row,
            Style::default().fg(paint_color(graph.paint.as_ref(), fraction)),
        )));
    }
}

/// Text rows of a chart, top row first.
///
/// Uses the last `width` values, scaled to `range` or to their own extent.
pub fn chart_rows(
    values: &[f64],
    range: Option<(f64, f64)>,
    width: usize,
    height: usize,
    style: GraphStyle,
    kind: GraphKind,
) -> Vec<String> {
    let height = height.max(1);
    if values.is_empty() || width == 0 {
        return vec![String::new(); height];
    }
    let tail = &values[values.len().saturating_sub(width)..];
    let (min, max) = range.unwrap_or_else(|| {
        let min = tail.iter().copied().fold(f64::INFINITY, f64::min);
        let max = tail.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (min.min(0.0), max)
    });
    let span = max - min;
    let levels = if style == GraphStyle::Braille {
        &BRAILLE_LEVELS
    } else {
        &BLOCK_LEVELS
    };
    let steps = (levels.len() - 1) as f64;

    // Height of each column in eighths of a cell
    let scaled: Vec<f64> = tail
        .iter()
        .map(|v| {
            let fraction = if span <= f64::EPSILON {
                0.5
            } else {
                ((v - min) / span).clamp(0.0, 1.0)
            };
            fraction * height as f64 * steps
        })
        .collect();

    (0..height)
        .rev()
        .map(|row| {
            let floor = row as f64 * steps;
            scaled
                .iter()
                .map(|&eighths| {
                    let within = (eighths - floor).clamp(0.0, steps);
                    match kind {
                        GraphKind::Bar => levels[within.round() as usize],
                        GraphKind::Line => {
                            if within > 0.0 && within <= steps && eighths <= floor + steps {
                                LINE_POINT
                            } else {
                                ' '
                            }
                        }
                    }
                })
                .collect::<String>()
                .trim_end()
                .to_string()
        })
        .collect()
}

fn render_table(table: &Table, width: usize, lines: &mut Vec<Line<'static>>) {
    let columns = table
        .headers
        .len()
        .max(table.rows.iter().map(Vec::len).max().unwrap_or(0));
    if columns == 0 {
        return;
    }

    let mut widths = vec![0usize; columns];
    for cells in std::iter::once(&table.headers).chain(table.rows.iter()) {
        for (i, cell) in cells.iter().enumerate() {
            widths[i] = widths[i].max(sanitize::plain_text(cell).chars().count());
        }
    }
    // Shrink the widest columns until the table fits
    let gaps = columns.saturating_sub(1);
    while widths.iter().sum::<usize>() + gaps > width {
        let Some((idx, widest)) = widths.iter().copied().enumerate().max_by_key(|(_, w)| *w)
        else {
            break;
        };
        if widest <= 1 {
            break;
        }
        widths[idx] -= 1;
    }

    let header_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    lines.push(table_line(&table.headers, &widths, Some(header_style)));
    for cells in &table.rows {
        lines.push(table_line(cells, &widths, None));
    }
}

fn table_line(cells: &[String], widths: &[usize], style: Option<Style>) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" "));
        }
        let cell = cells.get(i).map(String::as_str).unwrap_or("");
        let mut used = 0;
        for segment in sanitize::segments(cell) {
            let room = width.saturating_sub(used);
            if room == 0 {
                break;
            }
            let text: String = segment.text.chars().take(room).collect();
            used += text.chars().count();
            let seg_style = style.unwrap_or_default().patch(tag_style(&segment.tags));
            spans.push(Span::styled(text, seg_style));
        }
        if used < *width {
            spans.push(Span::raw(" ".repeat(width - used)));
        }
    }
    Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Gradient, ProtocolParser};

    fn plain(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn markup_becomes_styles() {
        let spans = markup_spans("[bold]CPU[/] [[0]] [red]hot[/]", false);
        assert_eq!(spans[0].content, "CPU");
        assert!(spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(spans[1].content, " [0] ");
        assert_eq!(spans[2].style.fg, Some(Color::Red));
    }

    #[test]
    fn literal_text_is_untouched() {
        let spans = markup_spans("[bold]oops[/][/]", true);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].content, "[bold]oops[/][/]");
    }

    #[test]
    fn gradient_picks_stops_by_fraction() {
        let warm = Paint::Gradient(Gradient::Preset("warm".into()));
        assert_eq!(paint_color(Some(&warm), 0.0), Color::Green);
        assert_eq!(paint_color(Some(&warm), 1.0), Color::Red);
        assert_eq!(paint_color(Some(&warm), f64::NAN), Color::Green);
        assert_eq!(paint_color(None, 0.3), Color::Cyan);
    }

    #[test]
    fn bar_chart_fills_from_bottom() {
        let rows = chart_rows(
            &[0.0, 50.0, 100.0],
            Some((0.0, 100.0)),
            10,
            2,
            GraphStyle::Blocks,
            GraphKind::Bar,
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], "  █");
        assert_eq!(rows[1], " ██");
    }

    #[test]
    fn chart_uses_latest_values() {
        let values: Vec<f64> = (0..50).map(f64::from).collect();
        let rows = chart_rows(&values, None, 10, 3, GraphStyle::Bars, GraphKind::Bar);
        assert!(rows.iter().all(|r| r.chars().count() <= 10));
        assert_eq!(rows[2].chars().count(), 10);
    }

    #[test]
    fn empty_chart_has_blank_rows() {
        let rows = chart_rows(&[], None, 10, 4, GraphStyle::Braille, GraphKind::Line);
        assert_eq!(rows, vec![String::new(); 4]);
    }

    #[test]
    fn document_renders_each_kind() {
        let raw = "row: [status:warn] Load [progress:75:inline]\n\
                   row: [divider:=]\n\
                   [table:Mount|Use]\n\
                   [tablerow:/|61%]\n\
                   action: Clean:true";
        let doc = ProtocolParser::new().parse(raw, None, None);
        let lines = document_lines(&doc, 20);
        let text: Vec<String> = lines.iter().map(plain).collect();

        assert!(text[0].starts_with("● Load "));
        assert!(text[0].ends_with(" 75%"));
        assert_eq!(text[1], "=".repeat(20));
        assert!(text[2].starts_with("Mount"));
        assert!(text[3].starts_with("/"));
        assert_eq!(text.last().unwrap(), "actions: Clean");
    }

    #[test]
    fn wide_tables_are_shrunk() {
        let table = Table {
            headers: vec!["A".repeat(30), "B".into()],
            rows: vec![],
        };
        let mut lines = Vec::new();
        render_table(&table, 12, &mut lines);
        assert_eq!(plain(&lines[0]).chars().count(), 12);
    }
}
