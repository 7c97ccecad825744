use super::Config;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory and its parents.
pub const CONFIG_FILE_NAME: &str = "widget-deck.yaml";

pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }

    /// Find config file starting from current directory, then the user
    /// config directory.
    pub fn find_config_file(&self) -> Result<PathBuf> {
        let current_dir = std::env::current_dir()?;
        if let Some(found) = Self::find_config_in_dir(&current_dir) {
            return Ok(found);
        }

        if let Some(user_config) =
            dirs::config_dir().map(|d| d.join("widget-deck").join(CONFIG_FILE_NAME))
        {
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        Err(Error::Config(format!(
            "Could not find {} in current directory, any parent, or the user config directory",
            CONFIG_FILE_NAME
        )))
    }

    pub fn find_config_in_dir(dir: &Path) -> Option<PathBuf> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        // Try alternate name
        let alt_path = dir.join("widget-deck.yml");
        if alt_path.exists() {
            return Some(alt_path);
        }

        dir.parent().and_then(Self::find_config_in_dir)
    }

    /// Load config from file path
    pub fn load_config<P: AsRef<Path>>(&self, path: P) -> Result<Config> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let mut config = self.parse_config(&content)?;

        // Relative roots are anchored at the config file, not the shell's cwd.
        if let Some(base) = path.as_ref().parent() {
            anchor_roots(&mut config, base);
        }

        Ok(config)
    }

    /// Parse config from YAML string
    pub fn parse_config(&self, content: &str) -> Result<Config> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| Error::Parse(format!("Failed to parse YAML config: {}", e)))?;

        Ok(config)
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

fn anchor_roots(config: &mut Config, base: &Path) {
    let anchor = |p: &mut PathBuf| {
        if p.is_relative() && !p.starts_with("~") {
            *p = base.join(&*p);
        }
    };
    if let Some(root) = config.settings.bundled_root.as_mut() {
        anchor(root);
    }
    for root in config.settings.custom_roots.iter_mut() {
        anchor(root);
    }
    if let Some(storage) = config.settings.storage.as_mut() {
        anchor(storage);
    }
}
