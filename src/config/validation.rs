use super::{Config, Seconds};
use crate::error::{Error, Result};

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        check_seconds("settings.default_refresh", self.settings.default_refresh.as_ref())?;
        check_seconds("settings.default_timeout", self.settings.default_timeout.as_ref())?;
        check_seconds("settings.action_timeout", self.settings.action_timeout.as_ref())?;
        check_seconds("settings.retention", self.settings.retention.as_ref())?;

        for (name, widget) in &self.widgets {
            if name.trim().is_empty() {
                return Err(Error::Validation(
                    "Widget identifiers cannot be empty".to_string(),
                ));
            }

            if widget.path.as_os_str().is_empty() {
                return Err(Error::Validation(format!(
                    "Widget '{}' has no path. Add: path: my-widget.sh",
                    name
                )));
            }

            if let Some(ref digest) = widget.sha256 {
                if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(Error::Validation(format!(
                        "Widget '{}' has an invalid sha256 '{}'. Expected 64 hex characters; compute it with `deck checksum <path>`",
                        name, digest
                    )));
                }
            }

            check_seconds(&format!("widgets.{}.refresh", name), widget.refresh.as_ref())?;
            if widget.refresh.as_ref().and_then(Seconds::as_secs) == Some(0) {
                return Err(Error::Validation(format!(
                    "Widget '{}' has refresh 0. Use a positive interval such as 5 or \"5s\"",
                    name
                )));
            }
            check_seconds(&format!("widgets.{}.timeout", name), widget.timeout.as_ref())?;

            for (label, action) in &widget.actions {
                check_seconds(
                    &format!("widgets.{}.actions.{}.timeout", name, label),
                    action.timeout.as_ref(),
                )?;
            }
        }

        Ok(())
    }
}

fn check_seconds(field: &str, value: Option<&Seconds>) -> Result<()> {
    match value {
        Some(v) if v.as_secs().is_none() => Err(Error::Validation(format!(
            "'{}' has an invalid duration {:?}. Use formats like 5, '5s', '1m', '2h'",
            field, v
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Parser;

    #[test]
    fn valid_config_passes() {
        let yaml = r#"
settings:
  default_refresh: 5
widgets:
  cpu:
    path: cpu.sh
    refresh: "2s"
    timeout: 0
"#;
        let config = Parser::new().parse_config(yaml).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_digest() {
        let yaml = r#"
widgets:
  cpu:
    path: cpu.sh
    sha256: "abc"
"#;
        let config = Parser::new().parse_config(yaml).unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("invalid sha256"));
    }

    #[test]
    fn rejects_zero_refresh_and_bad_durations() {
        let zero = Parser::new()
            .parse_config("widgets:\n  cpu:\n    path: cpu.sh\n    refresh: 0\n")
            .unwrap();
        assert!(zero.validate().is_err());

        let garbage = Parser::new()
            .parse_config("widgets:\n  cpu:\n    path: cpu.sh\n    timeout: soon\n")
            .unwrap();
        let err = garbage.validate().unwrap_err().to_string();
        assert!(err.contains("widgets.cpu.timeout"));
    }

    #[test]
    fn rejects_empty_path() {
        let config = Parser::new()
            .parse_config("widgets:\n  cpu:\n    path: \"\"\n")
            .unwrap();
        assert!(config.validate().is_err());
    }
}
