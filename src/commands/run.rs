use super::{load_config, open_repository};
use crate::output::{document_text, UserOutput};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use widget_deck::refresh::EXTENDED_FLAG;
use widget_deck::{Error, WidgetRunner};

/// Refresh one widget and print the result. Exits non-zero when the widget
/// produced an error document.
pub async fn run_widget(
    config_path: Option<PathBuf>,
    dev: bool,
    widget: &str,
    json: bool,
    extended: bool,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let config = Arc::new(load_config(config_path, dev)?);
    if !config.widgets.contains_key(widget) {
        return Err(Error::WidgetNotFound(widget.to_string()).into());
    }
    let repo = open_repository(&config)?;
    let runner = WidgetRunner::new(config, repo);

    // Ctrl-C stops the script the same way a timeout would
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let args = if extended {
        vec![EXTENDED_FLAG.to_string()]
    } else {
        Vec::new()
    };
    let document = runner.refresh_with_args(widget, &args, &cancel).await;
    interrupt.abort();

    if json {
        out.status(&serde_json::to_string_pretty(&document)?);
    } else {
        for line in document_text(&document) {
            out.status(&line);
        }
    }

    if let Some(error) = &document.error {
        anyhow::bail!("Widget '{}' failed: {}", widget, error);
    }
    Ok(())
}
