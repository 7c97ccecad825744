use widget_deck::protocol::{glyphs, sanitize, InlineElement, RenderRow, StatusLevel, WidgetDocument};

/// Abstraction over user-facing output.
///
/// Command modules use this trait instead of `println!`/`eprintln!` so tests
/// and JSON mode can capture or silence it.
pub trait UserOutput: Send + Sync {
    /// Regular output line on stdout.
    fn status(&self, message: &str);

    fn success(&self, message: &str);

    fn warning(&self, message: &str);

    fn error(&self, message: &str);

    fn blank(&self);
}

/// Standard CLI output: stdout for results, stderr for problems.
pub struct CliOutput;

impl UserOutput for CliOutput {
    fn status(&self, message: &str) {
        println!("{}", message);
    }

    fn success(&self, message: &str) {
        println!("\x1b[32m{}\x1b[0m", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("\x1b[33m{}\x1b[0m", message);
    }

    fn error(&self, message: &str) {
        eprintln!("\x1b[31m{}\x1b[0m", message);
    }

    fn blank(&self) {
        println!();
    }
}

/// Plain-text rendering of a document for `deck run`.
pub fn document_text(doc: &WidgetDocument) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(title) = &doc.title {
        lines.push(format!("== {} ==", title));
    }
    for row in &doc.rows {
        lines.extend(row_text(row));
    }
    for action in &doc.actions {
        let mut flags = Vec::new();
        if action.flags.danger {
            flags.push("danger".to_string());
        }
        if action.flags.sudo {
            flags.push("sudo".to_string());
        }
        if action.flags.refresh {
            flags.push("refresh".to_string());
        }
        if let Some(t) = action.timeout {
            flags.push(format!("timeout={}", t));
        }
        let flags = if flags.is_empty() {
            String::new()
        } else {
            format!(" [{}]", flags.join(","))
        };
        lines.push(format!("action: {}{} -> {}", action.label, flags, action.command));
    }
    for warning in &doc.warnings {
        lines.push(format!("warning: {}", warning));
    }
    lines
}

fn row_text(row: &RenderRow) -> Vec<String> {
    let mut head = String::new();
    if let Some(level) = row.status {
        head.push_str(match level {
            StatusLevel::Ok => "[ok] ",
            StatusLevel::Info => "[info] ",
            StatusLevel::Warn => "[warn] ",
            StatusLevel::Error => "[error] ",
        });
    }
    if row.literal {
        head.push_str(&row.text);
    } else {
        head.push_str(&sanitize::plain_text(&row.text));
    }

    let mut out = Vec::new();
    match &row.element {
        None => out.push(head),
        Some(InlineElement::Progress(p)) => {
            out.push(format!("{} {} {:.0}%", head, glyphs::bar(p.value, 20), p.value))
        }
        Some(InlineElement::Sparkline(s)) => {
            out.push(format!("{} {}", head, glyphs::sparkline(&s.values, s.width)))
        }
        Some(InlineElement::MiniProgress(m)) => {
            out.push(format!("{} {}", head, glyphs::bar(m.value, m.width)))
        }
        Some(InlineElement::Divider(d)) => {
            if !head.is_empty() {
                out.push(head);
            }
            out.push(d.glyph.to_string().repeat(40));
        }
        Some(InlineElement::Graph(g)) => {
            if let Some(label) = &g.label {
                out.push(format!("{} {}", head, label).trim().to_string());
            } else if !head.is_empty() {
                out.push(head);
            }
            out.push(glyphs::sparkline(&g.values, g.width as usize));
        }
        Some(InlineElement::Table(t)) => {
            if !head.is_empty() {
                out.push(head);
            }
            let plain = |cells: &[String]| {
                cells
                    .iter()
                    .map(|c| sanitize::plain_text(c))
                    .collect::<Vec<_>>()
                    .join(" | ")
            };
            out.push(plain(&t.headers));
            out.extend(t.rows.iter().map(|r| plain(r)));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use widget_deck::ProtocolParser;

    #[test]
    fn renders_rows_and_actions() {
        let raw = "title: Disk\nrow: [status:ok] [bold]root[/] [progress:50]\naction: [danger,timeout=5] Wipe:rm x";
        let doc = ProtocolParser::new().parse(raw, None, None);
        let lines = document_text(&doc);
        assert_eq!(lines[0], "== Disk ==");
        assert!(lines[1].starts_with("[ok] root"));
        assert!(lines[1].ends_with("50%"));
        assert_eq!(lines[2], "action: Wipe [danger,timeout=5] -> rm x");
    }
}
