//! Refresh orchestration.
//!
//! Ties the validator, execution engine and protocol parser together:
//! [`WidgetRunner`] performs one Validate -> Execute -> Parse pass,
//! [`Scheduler`] repeats it per widget on its own interval, and
//! [`ActionRunner`] runs the actions a widget exposes.

mod action;
mod runner;
mod scheduler;

pub use action::{ActionEvent, ActionReport, ActionRunner};
pub use runner::{WidgetRunner, EXTENDED_FLAG};
pub use scheduler::{Scheduler, WidgetUpdate, PRUNE_INTERVAL};

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    use crate::config::{Config, Settings, WidgetConfig};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Write an executable `/bin/sh` script into `dir`.
    pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Dev-mode config with an empty bundled root and one custom root.
    pub fn dev_config(root: &Path) -> Config {
        let bundled = root.join("bundled");
        let custom = root.join("custom");
        fs::create_dir_all(&bundled).unwrap();
        fs::create_dir_all(&custom).unwrap();
        Config {
            settings: Settings {
                dev_mode: true,
                bundled_root: Some(bundled),
                custom_roots: vec![custom],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn add_widget(config: &mut Config, id: &str, script: &str) -> PathBuf {
        let custom = config.settings.custom_roots[0].clone();
        let path = write_script(&custom, &format!("{}.sh", id), script);
        config.widgets.insert(
            id.to_string(),
            WidgetConfig {
                path: path.clone(),
                ..Default::default()
            },
        );
        path
    }
}
