use crate::output::UserOutput;
use std::path::Path;
use widget_deck::validator::sha256_file;

/// Print the SHA-256 of a script and how to pin it.
pub fn run_checksum(path: &Path, out: &dyn UserOutput) -> anyhow::Result<()> {
    let digest = sha256_file(path)
        .map_err(|e| anyhow::anyhow!("Failed to read '{}': {}", path.display(), e))?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "my-widget".to_string());

    out.status(&format!("{}  {}", digest, path.display()));
    out.blank();
    out.status("Pin it in widget-deck.yaml:");
    out.status("widgets:");
    out.status(&format!("  {}:", name));
    out.status(&format!("    path: {}", path.display()));
    out.status(&format!("    sha256: \"{}\"", digest));
    Ok(())
}
