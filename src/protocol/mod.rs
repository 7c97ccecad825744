//! Widget output protocol.
//!
//! A widget prints directives, one per line:
//!
//! ```text
//! title: CPU
//! refresh: 2
//! row: [status:ok] Load [progress:42:warm]
//! [table:Mount|Use]
//! [tablerow:/|[miniprogress:61]]
//! action: [danger,sudo,timeout=30] Restart:systemctl restart foo
//! datastore: cpu,core=0 usage=42.5
//! ```
//!
//! Parsing is total. Unknown lines and malformed display directives are
//! dropped; malformed `datastore:` lines are dropped and reported through
//! [`ProtocolParser::soft_warnings`].

mod action;
mod datastore;
mod document;
mod elements;
pub mod glyphs;
pub mod sanitize;
mod table;

pub use action::{ActionFlags, ActionSpec};
pub use datastore::{persist, FieldValue, StoreDirective};
pub use document::{
    Divider, Gradient, Graph, GraphKind, GraphStyle, InlineElement, MiniProgress, Paint, Progress,
    ProgressStyle, RenderRow, Sparkline, StatusLevel, Table, WidgetDocument, GRADIENT_PRESETS,
};
pub use elements::{
    format_value, DEFAULT_GRAPH_HEIGHT, DEFAULT_GRAPH_WIDTH, DEFAULT_MINI_PROGRESS_WIDTH,
    GRAPH_HEIGHT, GRAPH_WIDTH, MINI_PROGRESS_WIDTH, PLACEHOLDER, SPARKLINE_WIDTH,
};

use crate::storage::TimeSeriesRepository;
use elements::Context;
use table::PendingTable;

/// Parses widget output into a [`WidgetDocument`].
///
/// Holds the soft warnings of the most recent parse. Storage access is passed
/// per call so parsers for different widgets never share state.
#[derive(Debug, Default)]
pub struct ProtocolParser {
    warnings: Vec<String>,
}

impl ProtocolParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse raw script output.
    ///
    /// `repo` resolves `datafetch` and `history_*` elements; without it they
    /// render as placeholders and empty series. `scope` selects the widget's
    /// series in the repository.
    pub fn parse(
        &mut self,
        raw: &str,
        repo: Option<&dyn TimeSeriesRepository>,
        scope: Option<&str>,
    ) -> WidgetDocument {
        self.warnings.clear();
        let ctx = Context { repo, scope };
        let mut doc = WidgetDocument::default();
        let mut pending: Option<PendingTable> = None;

        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(cells) = table::parse_row(line) {
                if let Some(table) = pending.as_mut() {
                    table.push(cells);
                }
                continue;
            }

            finish_table(&mut pending, &mut doc);

            if let Some(headers) = table::parse_header(line) {
                pending = Some(PendingTable::new(doc.rows.len(), headers));
            } else if let Some(rest) = strip_prefix_ci(line, "title:") {
                let (title, literal) = sanitize::sanitize_or_literal(rest.trim());
                doc.title = Some(if literal {
                    title
                } else {
                    sanitize::plain_text(&title)
                });
            } else if let Some(rest) = strip_prefix_ci(line, "refresh:") {
                if let Ok(secs) = rest.trim().parse::<u64>() {
                    doc.refresh = Some(secs);
                }
            } else if let Some(rest) = strip_prefix_ci(line, "row:") {
                doc.rows.push(elements::parse_row(rest, &ctx));
            } else if let Some(rest) = strip_prefix_ci(line, "action:") {
                if let Some(action) = ActionSpec::parse(rest) {
                    doc.actions.push(action);
                }
            } else if let Some(rest) = strip_prefix_ci(line, "datastore:") {
                match StoreDirective::parse(rest) {
                    Ok(directive) => doc.store.push(directive),
                    Err(reason) => {
                        let warning = format!(
                            "Dropped malformed datastore line '{}': {}",
                            sanitize::strip_controls(rest.trim()),
                            reason
                        );
                        tracing::warn!("{}", warning);
                        self.warnings.push(warning);
                    }
                }
            }
        }

        finish_table(&mut pending, &mut doc);
        doc.warnings = self.warnings.clone();
        doc
    }

    /// Parse output that may not be valid UTF-8.
    pub fn parse_bytes(
        &mut self,
        raw: &[u8],
        repo: Option<&dyn TimeSeriesRepository>,
        scope: Option<&str>,
    ) -> WidgetDocument {
        self.parse(&String::from_utf8_lossy(raw), repo, scope)
    }

    /// Best-effort recoveries made during the most recent parse, in order.
    pub fn soft_warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Insert an accumulated table at the position its header appeared.
fn finish_table(pending: &mut Option<PendingTable>, doc: &mut WidgetDocument) {
    if let Some(done) = pending.take() {
        let row = RenderRow {
            element: Some(InlineElement::Table(done.table)),
            ..Default::default()
        };
        let at = done.position.min(doc.rows.len());
        doc.rows.insert(at, row);
    }
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}
