use crate::output::UserOutput;
use serde::Serialize;
use std::sync::Arc;
use widget_deck::{Config, WidgetRunner};

#[derive(Serialize)]
struct WidgetListing {
    id: String,
    path: String,
    allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    origin: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

/// List configured widgets with their validation status.
pub fn run_list(config: Config, json: bool, out: &dyn UserOutput) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let runner = WidgetRunner::new(Arc::clone(&config), None);

    let mut listings = Vec::new();
    for (id, widget) in &config.widgets {
        let verdict = runner.validate_widget(id)?;
        listings.push(WidgetListing {
            id: id.clone(),
            path: config.resolve_widget_path(widget).display().to_string(),
            allowed: verdict.is_accepted(),
            origin: verdict.validated().map(|s| s.origin().to_string()),
            reason: verdict.rejection().map(|r| r.to_string()),
        });
    }

    if json {
        out.status(&serde_json::to_string_pretty(&listings)?);
        return Ok(());
    }

    if listings.is_empty() {
        out.status("No widgets configured.");
        return Ok(());
    }

    out.status(&format!("Widgets: {}", listings.len()));
    for listing in &listings {
        match (&listing.origin, &listing.reason) {
            (Some(origin), _) => out.status(&format!(
                "  ✓ {} ({}) {}",
                listing.id, origin, listing.path
            )),
            (None, reason) => {
                out.status(&format!("  ✗ {} {}", listing.id, listing.path));
                if let Some(reason) = reason {
                    out.status(&format!("      {}", reason));
                }
            }
        }
    }
    if config.settings.dev_mode {
        out.blank();
        out.warning("dev mode is on: custom widgets run without a pinned fingerprint");
    }
    Ok(())
}
