//! Configuration parsing and types.
//!
//! This module provides the configuration system for widget-deck,
//! organized into focused submodules:
//!
//! - `types` - Core config structure (`Config`, `Settings`, `WidgetConfig`)
//! - `duration` - Human-readable durations and the `Seconds` value
//! - `parser` - YAML config discovery and parsing
//! - `validation` - Config validation

mod duration;
mod parser;
mod types;
mod validation;

pub use duration::*;
pub use parser::*;
pub use types::*;

use std::path::{Path, PathBuf};

/// Expand a leading `~` to the user's home directory.
pub(crate) fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s == "~" {
        dirs::home_dir().unwrap_or_else(|| path.to_path_buf())
    } else if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            home.join(rest)
        } else {
            path.to_path_buf()
        }
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_tilde_subpath() {
        let result = expand_tilde(Path::new("~/.config/widget-deck"));
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join(".config/widget-deck"));
    }

    #[test]
    fn expand_tilde_relative_unchanged() {
        let result = expand_tilde(Path::new("widgets"));
        assert_eq!(result, PathBuf::from("widgets"));
    }

    #[test]
    fn expand_tilde_mid_path_unchanged() {
        let result = expand_tilde(Path::new("foo/~/bar"));
        assert_eq!(result, PathBuf::from("foo/~/bar"));
    }
}
