use serde::Serialize;

/// Behaviour flags of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ActionFlags {
    /// Ask for confirmation before running.
    pub danger: bool,
    /// Run through sudo.
    pub sudo: bool,
    /// Refresh the owning widget after the action completes.
    pub refresh: bool,
}

/// A user-triggered command exposed by a widget.
///
/// Written as `action: [flags] Label:command`, where flags are any of
/// `danger`, `sudo`, `refresh` and `timeout=N` separated by commas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSpec {
    pub label: String,
    pub command: String,
    pub flags: ActionFlags,
    /// Seconds; `0` means unbounded, `None` defers to configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl ActionSpec {
    pub fn new(label: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            command: command.into(),
            flags: ActionFlags::default(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    /// Parse the text after `action:`. Returns `None` for malformed input.
    pub fn parse(text: &str) -> Option<Self> {
        let mut rest = text.trim();
        let mut flags = ActionFlags::default();
        let mut timeout = None;

        if let Some(after_open) = rest.strip_prefix('[') {
            let close = after_open.find(']')?;
            for flag in after_open[..close].split(',') {
                let flag = flag.trim().to_ascii_lowercase();
                match flag.as_str() {
                    "danger" => flags.danger = true,
                    "sudo" => flags.sudo = true,
                    "refresh" => flags.refresh = true,
                    other => {
                        if let Some(value) = other.strip_prefix("timeout=") {
                            timeout = value.trim().parse::<u64>().ok();
                        }
                    }
                }
            }
            rest = after_open[close + 1..].trim_start();
        }

        let (label, command) = rest.split_once(':')?;
        let (label, command) = (label.trim(), command.trim());
        if label.is_empty() || command.is_empty() {
            return None;
        }

        Some(Self {
            label: label.to_string(),
            command: command.to_string(),
            flags,
            timeout,
        })
    }
}
