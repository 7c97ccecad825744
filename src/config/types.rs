//! Core configuration types.
//!
//! This module contains the root [`Config`] struct and the per-widget
//! [`WidgetConfig`] entries of `widget-deck.yaml`.

use super::{expand_tilde, Seconds};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Fallback refresh interval when neither config nor widget suggests one.
pub const DEFAULT_REFRESH_SECS: u64 = 5;
/// Timeout for widget refresh scripts when none is configured.
pub const DEFAULT_SCRIPT_TIMEOUT_SECS: u64 = 10;
/// Timeout for actions when neither the action nor config sets one.
pub const DEFAULT_ACTION_TIMEOUT_SECS: u64 = 60;
/// How long stored samples are kept.
pub const DEFAULT_RETENTION_SECS: u64 = 7 * 86_400;

/// Root configuration structure for widget-deck.yaml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,

    /// Widgets keyed by identifier. Ordered so the dashboard layout is stable.
    #[serde(default)]
    pub widgets: BTreeMap<String, WidgetConfig>,
}

/// Global dashboard settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Allow custom (non-bundled) widgets to run without a pinned fingerprint.
    /// Bundled widgets always require one.
    #[serde(default)]
    pub dev_mode: bool,

    /// Directory holding the widgets shipped with the dashboard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundled_root: Option<PathBuf>,

    /// Directories holding user widgets.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_roots: Vec<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_refresh: Option<Seconds>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_timeout: Option<Seconds>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_timeout: Option<Seconds>,

    /// SQLite file for `datastore:` samples. Storage elements render
    /// placeholders when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<PathBuf>,

    /// Age after which stored samples are pruned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<Seconds>,
}

/// One configured widget.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WidgetConfig {
    /// Script path, absolute or relative to the custom roots / bundled root.
    pub path: PathBuf,

    /// Pinned SHA-256 of the script contents (hex).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<Seconds>,

    /// Script timeout; `0` means unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Seconds>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    /// Per-action overrides keyed by action label.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub actions: BTreeMap<String, ActionOverride>,
}

/// Config-side overrides for an action exposed by a widget.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ActionOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Seconds>,
}

impl Settings {
    pub fn bundled_root(&self) -> PathBuf {
        self.bundled_root
            .as_deref()
            .map(expand_tilde)
            .unwrap_or_else(default_bundled_root)
    }

    pub fn custom_roots(&self) -> Vec<PathBuf> {
        if self.custom_roots.is_empty() {
            return default_custom_root().into_iter().collect();
        }
        self.custom_roots.iter().map(|p| expand_tilde(p)).collect()
    }

    pub fn storage_path(&self) -> Option<PathBuf> {
        self.storage.as_deref().map(expand_tilde)
    }

    pub fn default_refresh_secs(&self) -> u64 {
        self.default_refresh
            .as_ref()
            .and_then(Seconds::as_secs)
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_REFRESH_SECS)
    }

    pub fn default_timeout_secs(&self) -> u64 {
        self.default_timeout
            .as_ref()
            .and_then(Seconds::as_secs)
            .unwrap_or(DEFAULT_SCRIPT_TIMEOUT_SECS)
    }

    pub fn action_timeout_secs(&self) -> Option<u64> {
        self.action_timeout.as_ref().and_then(Seconds::as_secs)
    }

    pub fn retention_secs(&self) -> u64 {
        self.retention
            .as_ref()
            .and_then(Seconds::as_secs)
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_RETENTION_SECS)
    }
}

impl Config {
    /// Resolve a widget's script path.
    ///
    /// Absolute paths are used as-is. Relative paths are looked up in the
    /// custom roots first, then the bundled root. When no candidate exists the
    /// bundled-root join is returned so validation reports a useful path.
    pub fn resolve_widget_path(&self, widget: &WidgetConfig) -> PathBuf {
        let path = expand_tilde(&widget.path);
        if path.is_absolute() {
            return path;
        }

        for root in self.settings.custom_roots() {
            let candidate = root.join(&path);
            if candidate.exists() {
                return candidate;
            }
        }

        self.settings.bundled_root().join(path)
    }

    /// Allow-listed roots: the bundled root followed by the custom roots.
    pub fn allowed_roots(&self) -> (PathBuf, Vec<PathBuf>) {
        (self.settings.bundled_root(), self.settings.custom_roots())
    }

    /// Timeout for a widget refresh script, in seconds (`0` = unbounded).
    pub fn script_timeout_secs(&self, widget: &WidgetConfig) -> u64 {
        widget
            .timeout
            .as_ref()
            .and_then(Seconds::as_secs)
            .unwrap_or_else(|| self.settings.default_timeout_secs())
    }

    /// Config-side timeout for an action: widget override, then the global
    /// action timeout. The action's own `timeout=` flag still wins over both.
    pub fn configured_action_timeout(&self, widget_id: &str, label: &str) -> Option<u64> {
        self.widgets
            .get(widget_id)
            .and_then(|w| w.actions.get(label))
            .and_then(|o| o.timeout.as_ref())
            .and_then(Seconds::as_secs)
            .or_else(|| self.settings.action_timeout_secs())
    }
}

/// Bundled widgets live next to the executable, falling back to the source
/// tree during development.
fn default_bundled_root() -> PathBuf {
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("widgets")))
    {
        if dir.is_dir() {
            return dir;
        }
    }
    Path::new(env!("CARGO_MANIFEST_DIR")).join("widgets")
}

fn default_custom_root() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("widget-deck").join("widgets"))
}
