//! Inline elements inside `row:` content.
//!
//! Elements are matched by an ordered rule table. Each match is extracted into
//! the row and removed from the display text. A row keeps its first status
//! and its first structured element; later ones are dropped. Unrecognised
//! or unparseable brackets stay in the text and are escaped by the
//! sanitizer.
//!
//! Numeric parameters are clamped into range, never rejected.

use super::document::{
    Divider, Graph, GraphKind, GraphStyle, InlineElement, MiniProgress, Paint, Progress,
    ProgressStyle, RenderRow, Sparkline, StatusLevel,
};
use super::sanitize::{sanitize_or_literal, strip_controls};
use crate::storage::{Aggregation, SeriesKey, TimeRange, TimeSeriesRepository};
use regex::{Captures, Regex};
use std::sync::OnceLock;

pub const SPARKLINE_WIDTH: (i64, i64) = (5, 100);
pub const MINI_PROGRESS_WIDTH: (i64, i64) = (3, 20);
pub const DEFAULT_MINI_PROGRESS_WIDTH: i64 = 10;
pub const GRAPH_WIDTH: (i64, i64) = (10, 200);
pub const DEFAULT_GRAPH_WIDTH: i64 = 40;
pub const GRAPH_HEIGHT: (i64, i64) = (3, 30);
pub const DEFAULT_GRAPH_HEIGHT: i64 = 8;

/// Shown in place of a `datafetch` value that cannot be resolved.
pub const PLACEHOLDER: &str = "--";

/// Storage access for one parse call.
#[derive(Clone, Copy, Default)]
pub(crate) struct Context<'a> {
    pub repo: Option<&'a dyn TimeSeriesRepository>,
    pub scope: Option<&'a str>,
}

enum Extracted {
    Status(StatusLevel),
    Element(InlineElement),
    Text(String),
}

type Extractor = fn(&[&str], &Context<'_>) -> Option<Extracted>;

struct Rule {
    name: &'static str,
    regex: Regex,
    extract: Extractor,
}

impl Rule {
    fn new(name: &'static str, extract: Extractor) -> Self {
        let pattern = format!(r"(?i)\[{}(?::([^\[\]]*))?\]", regex::escape(name));
        Self {
            name,
            regex: Regex::new(&pattern).expect("valid element pattern"),
            extract,
        }
    }
}

fn rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            Rule::new("status", status),
            Rule::new("progress", progress),
            Rule::new("sparkline", sparkline),
            Rule::new("miniprogress", mini_progress),
            Rule::new("divider", divider),
            Rule::new("graph", |a, _| graph(a, GraphKind::Bar)),
            Rule::new("linegraph", |a, _| graph(a, GraphKind::Line)),
            Rule::new("history_graph", |a, c| history_graph(a, c, GraphKind::Bar)),
            Rule::new("history_sparkline", history_sparkline),
            Rule::new("history_line", |a, c| history_graph(a, c, GraphKind::Line)),
            Rule::new("datafetch", datafetch),
        ]
    })
}

/// Parse one row's content.
pub(crate) fn parse_row(content: &str, ctx: &Context<'_>) -> RenderRow {
    let mut row = RenderRow::default();
    let mut residual = content.to_string();

    for rule in rules() {
        if !rule.regex.is_match(&residual) {
            continue;
        }
        residual = rule
            .regex
            .replace_all(&residual, |caps: &Captures<'_>| {
                let args: Vec<&str> = caps
                    .get(1)
                    .map(|m| m.as_str().split(':').map(str::trim).collect())
                    .unwrap_or_default();
                match (rule.extract)(&args, ctx) {
                    Some(Extracted::Status(status)) => {
                        row.status.get_or_insert(status);
                        String::new()
                    }
                    Some(Extracted::Element(element)) => {
                        if row.element.is_none() {
                            row.element = Some(element);
                        }
                        String::new()
                    }
                    Some(Extracted::Text(text)) => text,
                    None => caps[0].to_string(),
                }
            })
            .into_owned();
    }

    let (text, literal) = sanitize_or_literal(residual.trim());
    row.text = text;
    row.literal = literal;
    row
}

/// Substitute nested sparklines and mini-progress bars in a table cell with
/// their glyph text.
pub(crate) fn substitute_cell(cell: &str) -> String {
    let mut text = cell.to_string();
    for rule in rules()
        .iter()
        .filter(|r| matches!(r.name, "sparkline" | "miniprogress"))
    {
        text = rule
            .regex
            .replace_all(&text, |caps: &Captures<'_>| {
                let args: Vec<&str> = caps
                    .get(1)
                    .map(|m| m.as_str().split(':').map(str::trim).collect())
                    .unwrap_or_default();
                match (rule.extract)(&args, &Context::default()) {
                    Some(Extracted::Element(InlineElement::Sparkline(s))) => {
                        super::glyphs::sparkline(&s.values, s.width)
                    }
                    Some(Extracted::Element(InlineElement::MiniProgress(m))) => {
                        super::glyphs::bar(m.value, m.width)
                    }
                    _ => caps[0].to_string(),
                }
            })
            .into_owned();
    }
    text
}

fn arg<'a>(args: &[&'a str], index: usize) -> Option<&'a str> {
    args.get(index).copied().filter(|s| !s.is_empty())
}

/// Integer parameter clamped to `bounds`. Unparseable values take `default`.
fn clamp_int(token: Option<&str>, bounds: (i64, i64), default: i64) -> i64 {
    token
        .and_then(|t| {
            t.parse::<i64>().ok().or_else(|| {
                t.parse::<f64>()
                    .ok()
                    .filter(|f| !f.is_nan())
                    .map(|f| f as i64)
            })
        })
        .map(|v| v.clamp(bounds.0, bounds.1))
        .unwrap_or_else(|| default.clamp(bounds.0, bounds.1))
}

/// Percentage clamped to `[0, 100]`. Unparseable values are `0`.
fn clamp_percent(token: Option<&str>) -> f64 {
    match token.and_then(|t| t.parse::<f64>().ok()) {
        Some(v) if v.is_nan() => 0.0,
        Some(v) => v.clamp(0.0, 100.0),
        None => 0.0,
    }
}

/// Comma-separated numbers. Non-numeric entries become `0.0`.
pub(crate) fn parse_series(text: &str) -> Vec<f64> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    text.split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .unwrap_or(0.0)
        })
        .collect()
}

/// `min-max` or `min,max`. Both bounds must parse or the range is ignored.
pub(crate) fn parse_range(text: &str) -> Option<(f64, f64)> {
    let text = text.trim();
    let (lo, hi) = match text.split_once(',') {
        Some(pair) => pair,
        None => {
            // Skip a leading sign so `-5-10` splits after the first number
            let split = text.get(1..)?.find('-')? + 1;
            (&text[..split], &text[split + 1..])
        }
    };
    let lo = lo.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
    let hi = hi.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(if lo <= hi { (lo, hi) } else { (hi, lo) })
}

fn status(args: &[&str], _: &Context<'_>) -> Option<Extracted> {
    StatusLevel::parse(arg(args, 0)?).map(Extracted::Status)
}

fn progress(args: &[&str], _: &Context<'_>) -> Option<Extracted> {
    if args.is_empty() {
        return None;
    }
    let value = clamp_percent(args.first().copied());
    let mut style = ProgressStyle::default();
    let mut paint = None;
    for token in args.iter().skip(1).copied().filter(|t| !t.is_empty()) {
        match token.to_ascii_lowercase().as_str() {
            "inline" => style = ProgressStyle::Inline,
            "chart" => style = ProgressStyle::Chart,
            _ if paint.is_none() => paint = Paint::parse(token),
            _ => {}
        }
    }
    Some(Extracted::Element(InlineElement::Progress(Progress {
        value,
        paint,
        style,
    })))
}

fn sparkline_element(values: Vec<f64>, paint: Option<&str>, width: Option<&str>) -> Sparkline {
    let default_width = values.len() as i64;
    Sparkline {
        width: clamp_int(width, SPARKLINE_WIDTH, default_width) as usize,
        values,
        paint: paint.and_then(Paint::parse),
    }
}

fn sparkline(args: &[&str], _: &Context<'_>) -> Option<Extracted> {
    let values = parse_series(args.first()?);
    let spark = sparkline_element(values, arg(args, 1), arg(args, 2));
    Some(Extracted::Element(InlineElement::Sparkline(spark)))
}

fn mini_progress(args: &[&str], _: &Context<'_>) -> Option<Extracted> {
    if args.is_empty() {
        return None;
    }
    Some(Extracted::Element(InlineElement::MiniProgress(MiniProgress {
        value: clamp_percent(args.first().copied()),
        width: clamp_int(arg(args, 1), MINI_PROGRESS_WIDTH, DEFAULT_MINI_PROGRESS_WIDTH) as usize,
        paint: arg(args, 2).and_then(Paint::parse),
    })))
}

fn divider(args: &[&str], _: &Context<'_>) -> Option<Extracted> {
    let glyph = arg(args, 0)
        .and_then(|s| s.chars().find(|c| !c.is_control()))
        .unwrap_or('─');
    Some(Extracted::Element(InlineElement::Divider(Divider {
        glyph,
        color: arg(args, 1).map(str::to_ascii_lowercase),
    })))
}

fn default_style(kind: GraphKind) -> GraphStyle {
    match kind {
        GraphKind::Bar => GraphStyle::Bars,
        GraphKind::Line => GraphStyle::Braille,
    }
}

fn label(token: Option<&str>) -> Option<String> {
    token
        .map(strip_controls)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn graph(args: &[&str], kind: GraphKind) -> Option<Extracted> {
    let values = parse_series(args.first()?);
    Some(Extracted::Element(InlineElement::Graph(Graph {
        kind,
        values,
        paint: arg(args, 1).and_then(Paint::parse),
        label: label(arg(args, 2)),
        range: arg(args, 3).and_then(parse_range),
        width: clamp_int(arg(args, 4), GRAPH_WIDTH, DEFAULT_GRAPH_WIDTH) as u16,
        height: clamp_int(arg(args, 5), GRAPH_HEIGHT, DEFAULT_GRAPH_HEIGHT) as u16,
        style: arg(args, 6)
            .and_then(GraphStyle::parse)
            .unwrap_or_else(|| default_style(kind)),
        source: None,
    })))
}

/// Storage key and mandatory time range of a `history_*` element.
fn history_source(args: &[&str]) -> Option<(SeriesKey, TimeRange)> {
    let key = SeriesKey::parse(arg(args, 0)?)?;
    let range = arg(args, 1)?.parse::<TimeRange>().ok()?;
    Some((key, range))
}

fn fetch_series(ctx: &Context<'_>, key: &SeriesKey, range: &TimeRange) -> Vec<f64> {
    let Some(repo) = ctx.repo else {
        return Vec::new();
    };
    repo.series(ctx.scope, key, range).unwrap_or_else(|e| {
        tracing::debug!("Series {} unavailable: {}", key, e);
        Vec::new()
    })
}

fn history_graph(args: &[&str], ctx: &Context<'_>, kind: GraphKind) -> Option<Extracted> {
    let (key, range) = history_source(args)?;
    let values = fetch_series(ctx, &key, &range);
    Some(Extracted::Element(InlineElement::Graph(Graph {
        kind,
        values,
        paint: arg(args, 2).and_then(Paint::parse),
        label: label(arg(args, 3)),
        range: None,
        width: clamp_int(arg(args, 4), GRAPH_WIDTH, DEFAULT_GRAPH_WIDTH) as u16,
        height: clamp_int(arg(args, 5), GRAPH_HEIGHT, DEFAULT_GRAPH_HEIGHT) as u16,
        style: default_style(kind),
        source: Some(key.to_string()),
    })))
}

fn history_sparkline(args: &[&str], ctx: &Context<'_>) -> Option<Extracted> {
    let (key, range) = history_source(args)?;
    let values = fetch_series(ctx, &key, &range);
    let spark = sparkline_element(values, arg(args, 2), arg(args, 3));
    Some(Extracted::Element(InlineElement::Sparkline(spark)))
}

/// One decimal below 100, none at or above. The cut-off applies to the value
/// after rounding, so 99.96 shows as `100`.
pub fn format_value(value: f64) -> String {
    let tenths = (value * 10.0).round() / 10.0;
    if tenths.abs() < 100.0 {
        format!("{:.1}", value)
    } else {
        format!("{:.0}", value)
    }
}

fn datafetch(args: &[&str], ctx: &Context<'_>) -> Option<Extracted> {
    arg(args, 0)?;
    Some(Extracted::Text(
        resolve_datafetch(args, ctx)
            .map(format_value)
            .unwrap_or_else(|| PLACEHOLDER.to_string()),
    ))
}

fn resolve_datafetch(args: &[&str], ctx: &Context<'_>) -> Option<f64> {
    let key = SeriesKey::parse(arg(args, 0)?)?;
    let aggregation = match arg(args, 1) {
        Some(token) => token.parse::<Aggregation>().ok()?,
        None => Aggregation::Latest,
    };
    let repo = ctx.repo?;

    let result = if aggregation.requires_range() {
        let range = arg(args, 2)?.parse::<TimeRange>().ok()?;
        repo.aggregated(ctx.scope, &key, &range)
            .map(|agg| agg.get(aggregation))
    } else {
        repo.latest(ctx.scope, &key)
    };

    result.unwrap_or_else(|e| {
        tracing::debug!("datafetch {} failed: {}", key, e);
        None
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(content: &str) -> RenderRow {
        parse_row(content, &Context::default())
    }

    #[test]
    fn status_is_extracted_and_stripped() {
        let r = row("[status:ok] CPU: 10%");
        assert_eq!(r.status, Some(StatusLevel::Ok));
        assert_eq!(r.text, "CPU: 10%");
        assert!(r.element.is_none());
    }

    #[test]
    fn unknown_status_stays_as_escaped_text() {
        let r = row("[status:purple] hi");
        assert_eq!(r.status, None);
        assert_eq!(r.text, "[[status:purple]] hi");
    }

    #[test]
    fn progress_is_clamped() {
        for (input, expected) in [("150", 100.0), ("-20", 0.0), ("42.5", 42.5), ("abc", 0.0)] {
            let r = row(&format!("[progress:{input}]"));
            match r.element {
                Some(InlineElement::Progress(p)) => assert_eq!(p.value, expected),
                other => panic!("expected progress, got {:?}", other),
            }
        }
    }

    #[test]
    fn progress_style_keywords_win_over_gradients() {
        let r = row("[progress:50:inline]");
        let Some(InlineElement::Progress(p)) = r.element else {
            panic!("expected progress");
        };
        assert_eq!(p.style, ProgressStyle::Inline);
        assert_eq!(p.paint, None);

        let r = row("[progress:50:fire:chart]");
        let Some(InlineElement::Progress(p)) = r.element else {
            panic!("expected progress");
        };
        assert_eq!(p.style, ProgressStyle::Chart);
        assert!(matches!(p.paint, Some(Paint::Gradient(_))));
    }

    #[test]
    fn sparkline_coerces_and_clamps_width() {
        let r = row("[sparkline:1,x,3:green:500]");
        let Some(InlineElement::Sparkline(s)) = r.element else {
            panic!("expected sparkline");
        };
        assert_eq!(s.values, vec![1.0, 0.0, 3.0]);
        assert_eq!(s.width, 100);
        assert_eq!(s.paint, Some(Paint::Color("green".into())));

        let r = row("[sparkline:1,2]");
        let Some(InlineElement::Sparkline(s)) = r.element else {
            panic!("expected sparkline");
        };
        assert_eq!(s.width, 5);
    }

    #[test]
    fn mini_progress_width_bounds() {
        let r = row("[miniprogress:30:1]");
        let Some(InlineElement::MiniProgress(m)) = r.element else {
            panic!("expected miniprogress");
        };
        assert_eq!(m.width, 3);
        let r = row("[miniprogress:30]");
        let Some(InlineElement::MiniProgress(m)) = r.element else {
            panic!("expected miniprogress");
        };
        assert_eq!(m.width, 10);
    }

    #[test]
    fn graph_fields_are_positional_and_clamped() {
        let r = row("[graph:1,2,3:warm:Load:0-100:5:99:blocks]");
        let Some(InlineElement::Graph(g)) = r.element else {
            panic!("expected graph");
        };
        assert_eq!(g.kind, GraphKind::Bar);
        assert_eq!(g.label.as_deref(), Some("Load"));
        assert_eq!(g.range, Some((0.0, 100.0)));
        assert_eq!(g.width, 10);
        assert_eq!(g.height, 30);
        assert_eq!(g.style, GraphStyle::Blocks);
    }

    #[test]
    fn range_requires_both_bounds() {
        assert_eq!(parse_range("0,50"), Some((0.0, 50.0)));
        assert_eq!(parse_range("-5-10"), Some((-5.0, 10.0)));
        assert_eq!(parse_range("10-x"), None);
        assert_eq!(parse_range("100"), None);
    }

    #[test]
    fn only_first_structured_element_is_kept() {
        let r = row("[sparkline:1,2,3] and [progress:40]");
        assert!(matches!(r.element, Some(InlineElement::Progress(_))));
        assert_eq!(r.text, "and");
    }

    #[test]
    fn datafetch_without_storage_is_placeholder() {
        let r = row("Avg: [datafetch:memory.used_pct:avg:1h]%");
        assert_eq!(r.text, "Avg: --%");
    }

    #[test]
    fn history_without_range_is_not_an_element() {
        let r = row("[history_graph:cpu.usage]");
        assert!(r.element.is_none());
        assert_eq!(r.text, "[[history_graph:cpu.usage]]");
    }

    #[test]
    fn cells_substitute_glyphs() {
        assert_eq!(substitute_cell("[miniprogress:50:4]"), "██░░");
        assert_eq!(substitute_cell("x [progress:50]"), "x [progress:50]");
    }

    #[test]
    fn value_formatting() {
        assert_eq!(format_value(42.345), "42.3");
        assert_eq!(format_value(-7.0), "-7.0");
        assert_eq!(format_value(100.4), "100");
        assert_eq!(format_value(1234.6), "1235");
    }

    #[test]
    fn value_rounding_up_to_hundred_drops_decimal() {
        assert_eq!(format_value(99.96), "100");
        assert_eq!(format_value(-99.96), "-100");
        assert_eq!(format_value(99.94), "99.9");
        assert_eq!(format_value(-99.94), "-99.9");
    }
}
