//! `[table:...]` / `[tablerow:...]` blocks.

use super::document::Table;
use super::elements::substitute_cell;
use super::sanitize::{escape_all, sanitize, strip_controls};
use regex::Regex;
use std::sync::OnceLock;

fn header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\[table:(.*)\]$").expect("valid table regex"))
}

fn row_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\[tablerow:(.*)\]$").expect("valid tablerow regex"))
}

/// Column headers if `line` opens a table.
pub(crate) fn parse_header(line: &str) -> Option<Vec<String>> {
    header_regex()
        .captures(line)
        .map(|caps| split_cells(&caps[1]))
}

/// Cells if `line` is a table row.
pub(crate) fn parse_row(line: &str) -> Option<Vec<String>> {
    row_regex().captures(line).map(|caps| split_cells(&caps[1]))
}

fn split_cells(body: &str) -> Vec<String> {
    body.split('|').map(|cell| render_cell(cell.trim())).collect()
}

/// Nested glyph substitution, then sanitization. A cell that fails
/// sanitization is escaped entirely so it shows literally.
fn render_cell(cell: &str) -> String {
    let substituted = substitute_cell(cell);
    sanitize(&substituted).unwrap_or_else(|_| escape_all(&strip_controls(&substituted)))
}

/// A table being accumulated, remembering where it opened.
#[derive(Debug)]
pub(crate) struct PendingTable {
    pub position: usize,
    pub table: Table,
}

impl PendingTable {
    pub fn new(position: usize, headers: Vec<String>) -> Self {
        Self {
            position,
            table: Table {
                headers,
                rows: Vec::new(),
            },
        }
    }

    /// Append a row, padding or truncating to the header width.
    pub fn push(&mut self, mut cells: Vec<String>) {
        let width = self.table.headers.len();
        if width > 0 {
            cells.resize(width, String::new());
        }
        self.table.rows.push(cells);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_rows() {
        assert_eq!(
            parse_header("[table:Mount|Size|Use]"),
            Some(vec!["Mount".into(), "Size".into(), "Use".into()])
        );
        assert_eq!(
            parse_row("[TableRow: / | 20G |[miniprogress:50:4]]"),
            Some(vec!["/".into(), "20G".into(), "██░░".into()])
        );
        assert_eq!(parse_header("row: [table:x]"), None);
    }

    #[test]
    fn cells_are_sanitized() {
        assert_eq!(
            parse_row("[tablerow:[kworker/0]|\x1b[1mbold]"),
            Some(vec!["[[kworker/0]]".into(), "bold".into()])
        );
    }

    #[test]
    fn rows_are_padded_to_header_width() {
        let mut pending = PendingTable::new(0, vec!["A".into(), "B".into()]);
        pending.push(vec!["1".into()]);
        pending.push(vec!["1".into(), "2".into(), "3".into()]);
        assert_eq!(pending.table.rows[0], vec!["1", ""]);
        assert_eq!(pending.table.rows[1], vec!["1", "2"]);
    }
}
