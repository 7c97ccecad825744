use super::{load_config, open_repository};
use std::path::PathBuf;
use std::sync::Arc;
use widget_deck::{ActionRunner, WidgetRunner};

pub async fn run_tui(config_path: Option<PathBuf>, dev: bool) -> anyhow::Result<()> {
    let config = Arc::new(load_config(config_path, dev)?);
    let repo = open_repository(&config)?;

    let runner = Arc::new(WidgetRunner::new(Arc::clone(&config), repo));
    let actions = ActionRunner::new(config);
    widget_deck::tui::run(runner, actions).await
}
