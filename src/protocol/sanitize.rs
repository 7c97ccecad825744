//! Display text sanitization and the style markup subset.
//!
//! Script output may contain terminal escape sequences and bracketed text
//! (`[kworker/0:1]`) that would otherwise be read as markup. Sanitized text
//! keeps only the allowed style tags; every other bracket is doubled.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

const STYLE_TAGS: &[&str] = &[
    "bold",
    "dim",
    "italic",
    "underline",
    "reverse",
    "black",
    "red",
    "green",
    "yellow",
    "blue",
    "magenta",
    "cyan",
    "white",
    "gray",
    "grey",
    "darkgray",
    "lightred",
    "lightgreen",
    "lightyellow",
    "lightblue",
    "lightmagenta",
    "lightcyan",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("closing tag '[{0}]' has no matching opening tag")]
    UnbalancedClose(String),
}

fn escape_sequence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)?|\x1b[\x40-\x5f]",
        )
        .expect("valid escape sequence regex")
    })
}

/// Remove ANSI/OSC escape sequences and control characters. Tabs become
/// spaces.
pub fn strip_controls(text: &str) -> String {
    escape_sequence_regex()
        .replace_all(text, "")
        .chars()
        .filter_map(|c| match c {
            '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

/// Double every bracket so nothing is read as markup.
pub fn escape_all(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '[' => out.push_str("[["),
            ']' => out.push_str("]]"),
            c => out.push(c),
        }
    }
    out
}

/// Whether `inner` (text between brackets) is an opening style tag. A tag may
/// combine words, e.g. `bold red`.
pub fn is_style_tag(inner: &str) -> bool {
    let mut words = inner.split_whitespace().peekable();
    words.peek().is_some()
        && words.all(|w| STYLE_TAGS.contains(&w.to_ascii_lowercase().as_str()))
}

fn is_closing_tag(inner: &str) -> bool {
    match inner.strip_prefix('/') {
        Some("") => true,
        Some(rest) => is_style_tag(rest),
        None => false,
    }
}

/// Strip control sequences and escape everything but allowed style tags.
///
/// Fails when a closing tag has nothing to close; callers then show the
/// control-stripped text literally.
pub fn sanitize(text: &str) -> Result<String, SanitizeError> {
    let clean = strip_controls(text);
    let mut out = String::with_capacity(clean.len());
    let mut depth = 0usize;
    let mut rest = clean.as_str();

    while let Some(c) = rest.chars().next() {
        match c {
            '[' => {
                let tag = rest[1..]
                    .find(|ch| ch == ']' || ch == '[')
                    .filter(|&end| rest[1..].as_bytes()[end] == b']')
                    .map(|end| &rest[1..1 + end]);

                match tag {
                    Some(inner) if is_style_tag(inner) => {
                        depth += 1;
                        out.push('[');
                        out.push_str(inner);
                        out.push(']');
                        rest = &rest[inner.len() + 2..];
                    }
                    Some(inner) if is_closing_tag(inner) => {
                        if depth == 0 {
                            return Err(SanitizeError::UnbalancedClose(inner.to_string()));
                        }
                        depth -= 1;
                        out.push('[');
                        out.push_str(inner);
                        out.push(']');
                        rest = &rest[inner.len() + 2..];
                    }
                    _ => {
                        out.push_str("[[");
                        rest = &rest[1..];
                    }
                }
            }
            ']' => {
                out.push_str("]]");
                rest = &rest[1..];
            }
            c => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    Ok(out)
}

/// Sanitize, falling back to literal text. Returns `(text, literal)`.
pub fn sanitize_or_literal(text: &str) -> (String, bool) {
    match sanitize(text) {
        Ok(safe) => (safe, false),
        Err(e) => {
            tracing::debug!("Showing text literally: {}", e);
            (strip_controls(text), true)
        }
    }
}

/// A run of text with the style tags active over it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub tags: Vec<String>,
}

/// Split sanitized markup into styled segments.
pub fn segments(markup: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut rest = markup;

    let flush = |current: &mut String, stack: &[String], segments: &mut Vec<Segment>| {
        if !current.is_empty() {
            segments.push(Segment {
                text: std::mem::take(current),
                tags: stack.to_vec(),
            });
        }
    };

    while let Some(c) = rest.chars().next() {
        if rest.starts_with("[[") {
            current.push('[');
            rest = &rest[2..];
        } else if rest.starts_with("]]") {
            current.push(']');
            rest = &rest[2..];
        } else if c == '[' {
            match rest.find(']') {
                Some(end) => {
                    let inner = &rest[1..end];
                    flush(&mut current, &stack, &mut segments);
                    if inner.starts_with('/') {
                        stack.pop();
                    } else {
                        stack.push(inner.to_ascii_lowercase());
                    }
                    rest = &rest[end + 1..];
                }
                None => {
                    current.push('[');
                    rest = &rest[1..];
                }
            }
        } else {
            current.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    flush(&mut current, &stack, &mut segments);
    segments
}

/// Markup with tags removed and escapes resolved.
pub fn plain_text(markup: &str) -> String {
    segments(markup).into_iter().map(|s| s.text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_ansi_and_controls() {
        let input = "\x1b[31mred\x1b[0m\x07 \x1b]0;title\x07done\tok";
        assert_eq!(strip_controls(input), "red done ok");
    }

    #[test]
    fn escapes_unknown_brackets() {
        assert_eq!(sanitize("[kworker/0:1] idle").unwrap(), "[[kworker/0:1]] idle");
        assert_eq!(sanitize("a ] b [").unwrap(), "a ]] b [[");
    }

    #[test]
    fn keeps_style_tags() {
        assert_eq!(sanitize("[bold]Title[/]").unwrap(), "[bold]Title[/]");
        assert_eq!(
            sanitize("[bold red]Alert[/bold red]").unwrap(),
            "[bold red]Alert[/bold red]"
        );
    }

    #[test]
    fn unbalanced_close_fails_and_falls_back() {
        assert!(matches!(
            sanitize("oops[/]"),
            Err(SanitizeError::UnbalancedClose(_))
        ));
        let (text, literal) = sanitize_or_literal("oops[/]\x1b[1m");
        assert!(literal);
        assert_eq!(text, "oops[/]");
    }

    #[test]
    fn segments_track_nested_tags() {
        let segs = segments("a [bold]b [red]c[/] d[/] [[e]]");
        assert_eq!(
            segs,
            vec![
                Segment { text: "a ".into(), tags: vec![] },
                Segment { text: "b ".into(), tags: vec!["bold".into()] },
                Segment { text: "c".into(), tags: vec!["bold".into(), "red".into()] },
                Segment { text: " d".into(), tags: vec!["bold".into()] },
                Segment { text: " [e]".into(), tags: vec![] },
            ]
        );
        assert_eq!(plain_text("[bold]CPU[/] [[0]]"), "CPU [0]");
    }
}
