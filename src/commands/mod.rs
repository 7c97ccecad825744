mod checksum;
mod list;
mod run;
mod tui;
mod validate;

pub use checksum::run_checksum;
pub use list::run_list;
pub use run::run_widget;
pub use tui::run_tui;
pub use validate::run_validate;

use std::path::PathBuf;
use std::sync::Arc;
use widget_deck::{Config, Parser as ConfigParser, SqliteRepository, TimeSeriesRepository};

/// Locate, load and validate the config, applying `--dev`.
pub fn load_config(path: Option<PathBuf>, dev: bool) -> anyhow::Result<Config> {
    let parser = ConfigParser::new();
    let config_path = match path {
        Some(path) => path,
        None => parser.find_config_file()?,
    };
    tracing::debug!("Using config {}", config_path.display());

    let mut config = parser.load_config(&config_path)?;
    config.validate()?;
    if dev {
        config.settings.dev_mode = true;
    }
    Ok(config)
}

/// Open the configured sample store, if any.
pub fn open_repository(config: &Config) -> anyhow::Result<Option<Arc<dyn TimeSeriesRepository>>> {
    match config.settings.storage_path() {
        Some(path) => {
            let repo = SqliteRepository::open(&path)?;
            Ok(Some(Arc::new(repo)))
        }
        None => Ok(None),
    }
}
