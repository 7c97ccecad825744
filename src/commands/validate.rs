use crate::output::UserOutput;
use std::path::PathBuf;
use widget_deck::{Config, Validator};

/// Print the validator's verdict for a script.
///
/// Uses the roots from the config when one is found, otherwise the default
/// roots.
pub fn run_validate(
    config: Option<Config>,
    dev: bool,
    path: PathBuf,
    sha256: Option<&str>,
    out: &dyn UserOutput,
) -> anyhow::Result<()> {
    let path = resolve_script(config.as_ref(), path);
    let config = config.unwrap_or_default();
    let validator = Validator::from_config(&config);
    let dev_mode = dev || config.settings.dev_mode;

    let verdict = validator.validate(&path, sha256, dev_mode);
    match verdict.validated() {
        Some(script) => {
            out.success(&format!("✓ {} is allowed", script.path().display()));
            out.status(&format!("  origin: {}", script.origin()));
            Ok(())
        }
        None => {
            let reason = verdict
                .rejection()
                .map(|r| r.to_string())
                .unwrap_or_default();
            out.error(&format!("✗ {} rejected", verdict.requested_path().display()));
            out.status(&format!("  {}", reason));
            print_roots(&validator, out);
            anyhow::bail!("Validation failed")
        }
    }
}

fn print_roots(validator: &Validator, out: &dyn UserOutput) {
    out.blank();
    out.status("Allowed roots:");
    out.status(&format!("  bundled: {}", validator.bundled_root().display()));
    for root in validator.custom_roots() {
        out.status(&format!("  custom:  {}", root.display()));
    }
}

/// Resolve the script argument like a widget path would be.
fn resolve_script(config: Option<&Config>, path: PathBuf) -> PathBuf {
    if path.is_absolute() || path.exists() {
        return path;
    }
    match config {
        Some(config) => config.resolve_widget_path(&widget_deck::config::WidgetConfig {
            path,
            ..Default::default()
        }),
        None => path,
    }
}
