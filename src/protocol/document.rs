//! The structured render model produced by the parser.

use super::action::ActionSpec;
use super::datastore::StoreDirective;
use serde::Serialize;

/// Gradient presets recognised by name.
pub const GRADIENT_PRESETS: &[&str] = &["cool", "warm", "spectrum", "grayscale", "fire", "ocean"];

/// Status indicator shown at the start of a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Ok,
    Info,
    Warn,
    Error,
}

impl StatusLevel {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "ok" => Some(StatusLevel::Ok),
            "info" => Some(StatusLevel::Info),
            "warn" | "warning" => Some(StatusLevel::Warn),
            "error" => Some(StatusLevel::Error),
            _ => None,
        }
    }
}

/// A color gradient, either a named preset or explicit stops (`red→yellow`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gradient {
    Preset(String),
    Stops(Vec<String>),
}

impl Gradient {
    /// Recognise a preset name or an arrow-separated list of stops.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        let lower = token.to_ascii_lowercase();
        if GRADIENT_PRESETS.contains(&lower.as_str()) {
            return Some(Gradient::Preset(lower));
        }
        if token.contains('→') || token.contains("->") {
            let stops: Vec<String> = token
                .replace("->", "→")
                .split('→')
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
            if !stops.is_empty() {
                return Some(Gradient::Stops(stops));
            }
        }
        None
    }

    /// Color names from low to high.
    pub fn stops(&self) -> Vec<String> {
        match self {
            Gradient::Stops(stops) => stops.clone(),
            Gradient::Preset(name) => {
                let stops: &[&str] = match name.as_str() {
                    "cool" => &["blue", "cyan", "green"],
                    "warm" => &["green", "yellow", "red"],
                    "spectrum" => &["blue", "cyan", "green", "yellow", "red", "magenta"],
                    "grayscale" => &["darkgray", "gray", "white"],
                    "fire" => &["yellow", "lightred", "red"],
                    "ocean" => &["blue", "lightblue", "cyan"],
                    _ => &["white"],
                };
                stops.iter().map(|s| s.to_string()).collect()
            }
        }
    }
}

/// Coloring for an element: a plain named color or a gradient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Paint {
    Color(String),
    Gradient(Gradient),
}

impl Paint {
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        Some(match Gradient::parse(token) {
            Some(gradient) => Paint::Gradient(gradient),
            None => Paint::Color(token.to_ascii_lowercase()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStyle {
    #[default]
    Bar,
    Inline,
    Chart,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    /// Always within `[0, 100]`.
    pub value: f64,
    pub paint: Option<Paint>,
    pub style: ProgressStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sparkline {
    pub values: Vec<f64>,
    pub paint: Option<Paint>,
    pub width: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MiniProgress {
    pub value: f64,
    pub width: usize,
    pub paint: Option<Paint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Divider {
    pub glyph: char,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphKind {
    Bar,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphStyle {
    Bars,
    Braille,
    Blocks,
}

impl GraphStyle {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "bars" => Some(GraphStyle::Bars),
            "braille" => Some(GraphStyle::Braille),
            "blocks" => Some(GraphStyle::Blocks),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Graph {
    pub kind: GraphKind,
    pub values: Vec<f64>,
    pub paint: Option<Paint>,
    pub label: Option<String>,
    /// Fixed y-axis bounds; auto-scaled when absent.
    pub range: Option<(f64, f64)>,
    pub width: u16,
    pub height: u16,
    pub style: GraphStyle,
    /// Series key when the values came from storage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// The structured element a row may carry in addition to its status.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InlineElement {
    Progress(Progress),
    Sparkline(Sparkline),
    MiniProgress(MiniProgress),
    Divider(Divider),
    Graph(Graph),
    Table(Table),
}

/// One display line.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RenderRow {
    /// Residual display text. Safe markup unless `literal` is set.
    pub text: String,
    /// Sanitization failed; `text` must be shown verbatim, without markup.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub literal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<InlineElement>,
}

impl RenderRow {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: StatusLevel) -> Self {
        self.status = Some(status);
        self
    }
}

/// Everything one script run produced.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct WidgetDocument {
    pub title: Option<String>,
    /// Refresh interval suggested by the script, in seconds.
    pub refresh: Option<u64>,
    pub rows: Vec<RenderRow>,
    pub actions: Vec<ActionSpec>,
    #[serde(rename = "datastore")]
    pub store: Vec<StoreDirective>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl WidgetDocument {
    /// Uniform failure display: a titled block with an error row and dimmed
    /// detail lines.
    pub fn error(title: impl Into<String>, message: impl Into<String>, detail: &str) -> Self {
        let message = message.into();
        let mut rows = vec![RenderRow::text(super::sanitize::escape_all(&message))
            .with_status(StatusLevel::Error)];
        rows.extend(
            detail
                .lines()
                .map(str::trim_end)
                .filter(|l| !l.is_empty())
                .take(10)
                .map(|l| {
                    let clean = super::sanitize::strip_controls(l);
                    RenderRow::text(format!("[dim]{}[/]", super::sanitize::escape_all(&clean)))
                }),
        );
        Self {
            title: Some(title.into()),
            rows,
            error: Some(message),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
