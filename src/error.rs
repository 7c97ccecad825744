// Allow unused_assignments at module level because thiserror's generated code
// for struct variants triggers false positive warnings - the fields ARE used
// in the Display impl but rustc's lint pass doesn't see this.
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::io;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Widget not found: {0}")]
    #[diagnostic(
        code(deck::widget::not_found),
        help("List configured widgets with `deck list` or add it under 'widgets:' in widget-deck.yaml")
    )]
    WidgetNotFound(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(
        code(deck::config::validation),
        help("Check the 'settings:' and 'widgets:' sections of widget-deck.yaml")
    )]
    Validation(String),

    #[error("Invalid time range '{0}'")]
    #[diagnostic(
        code(deck::storage::time_range),
        help("Use a duration such as 30s, 15m, 1h, 24h, 7d or a sample count such as last_20")
    )]
    InvalidTimeRange(String),

    #[error("Storage error: {0}")]
    #[diagnostic(
        code(deck::storage::error),
        help("See recovery suggestions based on the specific error type")
    )]
    Storage(#[from] rusqlite::Error),

    #[error("Terminal error: {0}")]
    #[diagnostic(code(deck::tui::terminal))]
    Terminal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::WidgetNotFound(name) => Some(format!(
                "No widget named '{}' is configured. Run `deck list` to see the configured widgets.",
                name
            )),
            Error::Config(msg) if msg.contains("Could not find") => Some(
                "Create widget-deck.yaml in the current directory or pass --config <path>".to_string(),
            ),
            Error::Config(_) | Error::Validation(_) | Error::Yaml(_) => {
                Some("Check widget-deck.yaml for typos and run `deck list`".to_string())
            }
            Error::InvalidTimeRange(_) => Some(
                "Time ranges are a number followed by s, m, h or d (e.g. 1h), or last_N".to_string(),
            ),
            Error::Storage(e) => {
                let err_str = e.to_string();
                if err_str.contains("database is locked") {
                    Some(
                        "Another deck instance may be writing metrics. Close it or point settings.storage at a different file.".to_string(),
                    )
                } else if err_str.contains("malformed") {
                    Some(
                        "The metrics database is corrupted. Move it aside; a fresh one is created on the next start.".to_string(),
                    )
                } else {
                    Some(
                        "If the issue persists, remove the metrics database configured in settings.storage".to_string(),
                    )
                }
            }
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}
