//! Minimal child environment.
//!
//! Widget scripts and actions never inherit the dashboard's environment. Only
//! the variables below are passed through, with `PATH` pinned to system
//! directories.

use tokio::process::Command;

pub const PINNED_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";

const FALLBACK_USER: &str = "nobody";
const FALLBACK_LANG: &str = "C.UTF-8";

/// The complete environment handed to child processes.
pub fn minimal_environment() -> Vec<(&'static str, String)> {
    let home = std::env::var("HOME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| dirs::home_dir().map(|p| p.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "/".to_string());
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| FALLBACK_USER.to_string());
    let lang = std::env::var("LANG").unwrap_or_else(|_| FALLBACK_LANG.to_string());

    vec![
        ("PATH", PINNED_PATH.to_string()),
        ("HOME", home),
        ("USER", user),
        ("LANG", lang),
    ]
}

/// Replace the command's environment with [`minimal_environment`].
pub fn apply(cmd: &mut Command) {
    cmd.env_clear();
    cmd.envs(minimal_environment());
}
